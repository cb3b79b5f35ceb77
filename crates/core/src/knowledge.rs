//! Knowledge base and workshop module types.
//!
//! The retrieval engine and the module catalog live in `workshop-knowledge`;
//! tools depend only on the traits defined here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::KnowledgeError;

/// One document of the static knowledge collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: String,
    pub title: String,
    pub content: String,
}

/// A knowledge entry scored against a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievedSnippet {
    #[serde(flatten)]
    pub entry: KnowledgeEntry,

    /// Number of distinct query tokens also present in the entry
    pub score: usize,

    /// First sentence mentioning a query token, else the first sentence
    pub excerpt: String,
}

/// Title shown for a module whose markdown has no heading.
pub const DEFAULT_MODULE_TITLE: &str = "Workshop Module";

/// A workshop module as read from its markdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkshopModule {
    pub slug: String,

    /// First heading, if the markdown has one
    pub heading: Option<String>,

    pub summary: String,
}

impl WorkshopModule {
    /// Listing entry titled by the heading, else by `fallback`.
    pub fn listing(&self, fallback: &str) -> ModuleListing {
        ModuleListing {
            slug: self.slug.clone(),
            title: self.heading.clone().unwrap_or_else(|| fallback.to_string()),
            summary: self.summary.clone(),
        }
    }
}

/// A workshop module as shown in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleListing {
    pub slug: String,
    pub title: String,
    pub summary: String,
}

/// Lexical retrieval over the knowledge collection.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// Return at most `top_k` snippets with a positive score, best first.
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedSnippet>, KnowledgeError>;
}

/// The ordered collection of workshop modules.
#[async_trait]
pub trait ModuleCatalog: Send + Sync {
    async fn list_modules(&self) -> Result<Vec<WorkshopModule>, KnowledgeError>;

    /// Raw markdown for one module.
    async fn read_module(&self, slug: &str) -> Result<String, KnowledgeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_flattens_entry_fields() {
        let snippet = RetrievedSnippet {
            entry: KnowledgeEntry {
                id: "a".into(),
                title: "Debugging".into(),
                content: "Check the logs first.".into(),
            },
            score: 1,
            excerpt: "Check the logs first.".into(),
        };
        let json = serde_json::to_value(&snippet).unwrap();
        assert_eq!(json["id"], "a");
        assert_eq!(json["title"], "Debugging");
        assert_eq!(json["score"], 1);
        assert_eq!(json["excerpt"], "Check the logs first.");
        assert!(json.get("entry").is_none());
    }

    #[test]
    fn listing_title_falls_back_only_without_heading() {
        let headed = WorkshopModule {
            slug: "01-intro".into(),
            heading: Some("Intro".into()),
            summary: "Welcome.".into(),
        };
        assert_eq!(headed.listing(DEFAULT_MODULE_TITLE).title, "Intro");

        let bare = WorkshopModule {
            heading: None,
            ..headed
        };
        let listing = bare.listing(DEFAULT_MODULE_TITLE);
        assert_eq!(listing.title, "Workshop Module");
        assert_eq!(listing.slug, "01-intro");
        assert_eq!(listing.summary, "Welcome.");
    }
}
