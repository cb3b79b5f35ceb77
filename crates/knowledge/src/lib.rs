//! Knowledge retrieval and workshop module catalog.
//!
//! - [`KnowledgeStore`]: lazily-loaded JSON collection with lexical scoring
//! - [`WorkshopDirectory`]: markdown modules on disk
//! - [`text`]: tokenizer and sentence splitter shared by both

pub mod modules;
pub mod store;
pub mod text;

pub use modules::{WorkshopDirectory, describe_module};
pub use store::{KnowledgeStore, rank};
pub use text::{build_excerpt, split_sentences, tokenize};
