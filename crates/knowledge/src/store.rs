//! JSON-file knowledge store with lexical retrieval.
//!
//! The collection is read from disk on the first retrieval and cached for the
//! life of the process. Concurrent first callers share one load; a failed load
//! is not cached, so the next call tries again.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use workshop_core::error::KnowledgeError;
use workshop_core::knowledge::{KnowledgeEntry, KnowledgeSource, RetrievedSnippet};

use crate::text::{build_excerpt, tokenize};

pub struct KnowledgeStore {
    path: PathBuf,
    entries: OnceCell<Arc<Vec<KnowledgeEntry>>>,
}

impl KnowledgeStore {
    /// A store backed by the JSON array at `path`. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: OnceCell::new(),
        }
    }

    /// A store that never touches the filesystem.
    pub fn from_entries(entries: Vec<KnowledgeEntry>) -> Self {
        Self {
            path: PathBuf::from("<memory>"),
            entries: OnceCell::new_with(Some(Arc::new(entries))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The cached collection, loading it on first use.
    pub async fn entries(&self) -> Result<Arc<Vec<KnowledgeEntry>>, KnowledgeError> {
        self.entries
            .get_or_try_init(|| load_entries(&self.path))
            .await
            .cloned()
    }
}

async fn load_entries(path: &Path) -> Result<Arc<Vec<KnowledgeEntry>>, KnowledgeError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        let reason = if e.kind() == std::io::ErrorKind::NotFound {
            format!(
                "Knowledge base file is missing. Populate {} to enable retrieval.",
                path.display()
            )
        } else {
            e.to_string()
        };
        KnowledgeError::DataUnavailable {
            path: path.to_path_buf(),
            reason,
        }
    })?;

    let entries: Vec<KnowledgeEntry> =
        serde_json::from_str(&content).map_err(|e| KnowledgeError::DataUnavailable {
            path: path.to_path_buf(),
            reason: format!("invalid knowledge base JSON: {e}"),
        })?;

    info!(path = %path.display(), count = entries.len(), "Knowledge base loaded");
    Ok(Arc::new(entries))
}

/// Score every entry against `query` and keep the best `top_k`.
///
/// Score is the number of distinct query tokens present in the entry's title
/// or content. Zero-score entries are dropped; ties keep collection order.
pub fn rank(entries: &[KnowledgeEntry], query: &str, top_k: usize) -> Vec<RetrievedSnippet> {
    let query_tokens: HashSet<String> = tokenize(query).into_iter().collect();
    if query_tokens.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<RetrievedSnippet> = entries
        .iter()
        .filter_map(|entry| {
            let entry_tokens: HashSet<String> =
                tokenize(&format!("{} {}", entry.title, entry.content))
                    .into_iter()
                    .collect();
            let score = query_tokens.intersection(&entry_tokens).count();
            (score > 0).then(|| RetrievedSnippet {
                entry: entry.clone(),
                score,
                excerpt: build_excerpt(&entry.content, &query_tokens),
            })
        })
        .collect();

    // `sort_by` is stable.
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(top_k.max(1));
    scored
}

#[async_trait]
impl KnowledgeSource for KnowledgeStore {
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedSnippet>, KnowledgeError> {
        let entries = self.entries().await?;
        let snippets = rank(&entries, query, top_k);
        debug!(query, top_k, hits = snippets.len(), "Knowledge retrieval");
        Ok(snippets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, title: &str, content: &str) -> KnowledgeEntry {
        KnowledgeEntry {
            id: id.into(),
            title: title.into(),
            content: content.into(),
        }
    }

    fn sample() -> Vec<KnowledgeEntry> {
        vec![
            entry("a", "Debugging", "Intro. Check the logs first."),
            entry("b", "Deploying", "Push to main and watch the pipeline."),
            entry("c", "Logs and metrics", "Logs, logs, logs. Metrics too."),
        ]
    }

    #[test]
    fn scores_distinct_query_tokens() {
        let entries = vec![entry("a", "Debugging", "Intro. Check the logs first.")];
        let snippets = rank(&entries, "logs", 3);
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].score, 1);
        assert_eq!(snippets[0].excerpt, "Check the logs first.");
    }

    #[test]
    fn repeated_terms_count_once() {
        let hits = rank(&sample(), "logs logs", 5);
        assert!(hits.iter().all(|s| s.score == 1));
    }

    #[test]
    fn higher_score_first_and_ties_keep_order() {
        let hits = rank(&sample(), "logs metrics", 5);
        let ids: Vec<_> = hits.iter().map(|s| s.entry.id.as_str()).collect();
        assert_eq!(ids, ["c", "a"]);
        assert_eq!(hits[0].score, 2);

        let hits = rank(&sample(), "the", 5);
        let ids: Vec<_> = hits.iter().map(|s| s.entry.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn title_tokens_count_toward_score() {
        let hits = rank(&sample(), "deploying", 3);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry.id, "b");
        // No content sentence matches, so the first sentence is used.
        assert_eq!(hits[0].excerpt, "Push to main and watch the pipeline.");
    }

    #[test]
    fn never_returns_more_than_top_k() {
        let hits = rank(&sample(), "the logs pipeline metrics", 2);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn unmatched_entries_are_never_padded_in() {
        let hits = rank(&sample(), "logs", 5);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|s| s.score > 0));
    }

    #[test]
    fn empty_query_tokens_yield_nothing() {
        assert!(rank(&sample(), "?!", 3).is_empty());
        assert!(rank(&sample(), "", 3).is_empty());
        assert!(rank(&[], "logs", 3).is_empty());
    }

    #[test]
    fn query_token_order_does_not_matter() {
        let a = rank(&sample(), "metrics logs pipeline", 5);
        let b = rank(&sample(), "pipeline logs metrics", 5);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn loads_file_once_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge-base.json");
        std::fs::write(
            &path,
            r#"[{"id":"a","title":"Debugging","content":"Check the logs first."}]"#,
        )
        .unwrap();

        let store = KnowledgeStore::new(&path);
        let hits = store.retrieve("logs", 3).await.unwrap();
        assert_eq!(hits.len(), 1);

        // Later edits are not observed.
        std::fs::write(&path, "[]").unwrap();
        let hits = store.retrieve("logs", 3).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn empty_collection_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge-base.json");
        std::fs::write(&path, "[]").unwrap();
        let store = KnowledgeStore::new(&path);
        assert!(store.retrieve("anything", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_data_unavailable_and_retried() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge-base.json");
        let store = KnowledgeStore::new(&path);

        let err = store.retrieve("logs", 3).await.unwrap_err();
        match &err {
            KnowledgeError::DataUnavailable { reason, .. } => {
                assert!(reason.contains("Knowledge base file is missing"));
            }
            other => panic!("expected DataUnavailable, got {other:?}"),
        }

        std::fs::write(
            &path,
            r#"[{"id":"a","title":"Debugging","content":"Check the logs first."}]"#,
        )
        .unwrap();
        assert_eq!(store.retrieve("logs", 3).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_file_is_data_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge-base.json");
        std::fs::write(&path, r#"{"not":"an array"}"#).unwrap();
        let err = KnowledgeStore::new(&path).retrieve("x", 1).await.unwrap_err();
        assert!(matches!(err, KnowledgeError::DataUnavailable { .. }));
    }

    #[tokio::test]
    async fn concurrent_first_calls_share_one_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge-base.json");
        std::fs::write(&path, r#"[{"id":"a","title":"T","content":"logs."}]"#).unwrap();
        let store = Arc::new(KnowledgeStore::new(&path));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.entries().await.unwrap() })
            })
            .collect();

        let mut loaded = Vec::new();
        for handle in handles {
            loaded.push(handle.await.unwrap());
        }
        assert!(loaded.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[tokio::test]
    async fn from_entries_skips_the_filesystem() {
        let store = KnowledgeStore::from_entries(sample());
        assert_eq!(store.entries().await.unwrap().len(), 3);
        assert_eq!(store.retrieve("pipeline", 3).await.unwrap()[0].entry.id, "b");
    }
}
