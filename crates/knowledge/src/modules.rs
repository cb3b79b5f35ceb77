//! Workshop modules stored as markdown files in one directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use workshop_core::error::KnowledgeError;
use workshop_core::knowledge::{ModuleCatalog, WorkshopModule};

pub struct WorkshopDirectory {
    dir: PathBuf,
}

impl WorkshopDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn unavailable(&self, e: std::io::Error) -> KnowledgeError {
        KnowledgeError::ModulesUnavailable {
            path: self.dir.clone(),
            reason: e.to_string(),
        }
    }
}

/// Only plain file-stem slugs are served.
fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Read the heading and summary out of one module's markdown.
pub fn describe_module(slug: &str, markdown: &str) -> WorkshopModule {
    let mut lines = markdown.lines();

    let heading = lines
        .clone()
        .find(|line| line.starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim().to_string())
        .filter(|heading| !heading.is_empty());

    let summary = lines
        .find(|line| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|line| line.trim().to_string())
        .unwrap_or_default();

    WorkshopModule {
        slug: slug.to_string(),
        heading,
        summary,
    }
}

#[async_trait]
impl ModuleCatalog for WorkshopDirectory {
    async fn list_modules(&self) -> Result<Vec<WorkshopModule>, KnowledgeError> {
        let mut reader = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| self.unavailable(e))?;

        let mut files = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(|e| self.unavailable(e))? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "md") {
                files.push(path);
            }
        }
        files.sort();

        let mut modules = Vec::with_capacity(files.len());
        for path in files {
            let Some(slug) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let markdown = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| self.unavailable(e))?;
            modules.push(describe_module(slug, &markdown));
        }

        debug!(dir = %self.dir.display(), count = modules.len(), "Listed workshop modules");
        Ok(modules)
    }

    async fn read_module(&self, slug: &str) -> Result<String, KnowledgeError> {
        if !is_valid_slug(slug) {
            return Err(KnowledgeError::ModuleNotFound(slug.to_string()));
        }

        let path = self.dir.join(format!("{slug}.md"));
        match tokio::fs::read_to_string(&path).await {
            Ok(markdown) => Ok(markdown),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(KnowledgeError::ModuleNotFound(slug.to_string()))
            }
            Err(e) => Err(self.unavailable(e)),
        }
    }
}
