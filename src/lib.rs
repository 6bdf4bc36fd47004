//! Block Model - schema synthesis and content-tree extraction
//!
//! This crate turns an editing client's block-type catalogue into
//! versioned attribute-set schemas, and turns comment-delimited block
//! markup into fully materialized, schema-tagged block-instance trees.

pub mod core;
pub mod error;
pub mod extract;
pub mod markup;
pub mod parse;
pub mod schema;
mod tests;

// Re-export commonly used types
pub use crate::core::registry::{BlockTypeRegistry, RegistrySnapshot};
pub use crate::core::ContentId;
pub use crate::error::ExtractError;
pub use crate::extract::{BlockInstance, ExtractionEngine, MaterializedContent};
pub use crate::parse::{DelimiterParser, MarkupParser, ParsedBlock};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
