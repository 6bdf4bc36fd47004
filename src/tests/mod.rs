//! Cross-module test suite
//!
//! Unit tests live next to the code they cover; this module holds the
//! scenarios that span schema synthesis, parsing and extraction.

#[cfg(test)]
mod schema_tests;
