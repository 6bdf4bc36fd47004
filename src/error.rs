//! Extraction error taxonomy
//!
//! Failures are isolated per content item: batch extraction returns a
//! per-item `Result` instead of failing the whole batch. Each variant
//! declares whether its message is safe to show to end users; internal
//! faults (parser, collaborator fetches) are logged with detail and
//! surfaced generically.

use crate::core::registry::RegistryError;
use crate::core::ContentId;

/// Per-content-item extraction error.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The block-type catalogue has never been pushed. Recoverable and
    /// user-actionable.
    #[error(transparent)]
    RegistryNotSourced(#[from] RegistryError),

    /// An encountered block name has no registry entry, so its attributes
    /// cannot be typed or extracted. Fatal for the content item.
    #[error("unknown block type {0:?}")]
    UnknownBlockType(String),

    /// A reusable block transitively references itself.
    #[error("cyclic reusable block reference involving content {0}")]
    CyclicReusableReference(ContentId),

    /// A cached materialization no longer matches the live source markup.
    /// Recoverable by re-running extraction.
    #[error("materialized content for {0} is stale")]
    StaleContent(ContentId),

    /// The stored markup could not be parsed into a block tree.
    #[error("failed to parse stored content markup")]
    MarkupParse(#[source] anyhow::Error),

    /// Fetching a reusable block's stored markup failed.
    #[error("failed to fetch reusable block content {id}")]
    ReusableFetch {
        id: ContentId,
        #[source]
        source: anyhow::Error,
    },
}

impl ExtractError {
    /// Whether the error message may be shown to end users. Internal
    /// faults are not client-safe and should be surfaced generically.
    pub fn client_safe(&self) -> bool {
        match self {
            ExtractError::RegistryNotSourced(_)
            | ExtractError::UnknownBlockType(_)
            | ExtractError::CyclicReusableReference(_)
            | ExtractError::StaleContent(_) => true,
            ExtractError::MarkupParse(_) | ExtractError::ReusableFetch { .. } => false,
        }
    }
}
