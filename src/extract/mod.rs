//! Content extraction engine
//!
//! Walks a parsed block tree, resolves each block's stored attributes
//! against the best-matching synthesized schema version, extracts
//! markup-sourced attributes, substitutes reusable-block references and
//! produces a fully materialized, schema-tagged block-instance tree.

pub mod block;
pub mod engine;
pub(crate) mod validate;

pub use block::{BlockInstance, ParentContext};
pub use engine::{
    is_stale, DynamicRenderer, ExtractionEngine, MaterializedContent, NoDynamicBlocks,
    NoReusableBlocks, ReusableBlockResolver,
};
