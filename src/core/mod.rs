//! Core content-model abstractions and types
//!
//! This module defines the block-type data model reported by the content
//! editing client and the process-wide registry that stores it.

pub mod block_type;
pub mod registry;

use serde::{Deserialize, Serialize};

/// Identifier of a content item in the hosting CMS.
///
/// Content ids are supplied by the host storage layer; this crate never
/// generates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub i64);

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ContentId {
    fn from(id: i64) -> Self {
        ContentId(id)
    }
}
