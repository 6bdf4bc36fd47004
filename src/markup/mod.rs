//! Embedded-markup access for attribute extraction
//!
//! Block attributes can be sourced from the block's own HTML fragment via
//! CSS-like selector rules. This module provides a compact, span-preserving
//! HTML fragment parser and the selector subset those rules need. Slices
//! returned for inner/outer markup come straight from the original source,
//! so extraction never re-serializes (and never normalizes) stored markup.

pub mod dom;
pub mod selector;

pub use dom::{Document, NodeRef};
pub use selector::{Selector, SelectorError};
