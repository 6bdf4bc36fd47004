//! Block-type registry - process-wide catalogue of block-type definitions
//!
//! The editing client pushes its whole block-type catalogue at session
//! start; request-time extraction reads it many times. The registry is
//! therefore replace-wholesale shared state: a push installs a new
//! immutable snapshot atomically, readers take a snapshot reference and
//! never observe a partially-updated mapping.
//!
//! Schema-version reduction is pure per block type, so each snapshot
//! precomputes the version catalogue for every definition it holds; the
//! cache is invalidated by being part of the snapshot that gets replaced.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::block_type::{BlockTypeDefinition, FREEFORM_BLOCK_NAME};
use crate::schema::versions::{reduce, AttributeSetVersion};

/// Registry error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    /// The editing client has not reported its block-type catalogue yet.
    /// Recoverable and user-actionable, distinct from an empty catalogue.
    #[error("block type registry has not been sourced yet; open the content editor or push the catalogue first")]
    NotSourced,
}

/// Immutable registry state installed by one catalogue push.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    types: BTreeMap<String, BlockTypeDefinition>,
    versions: BTreeMap<String, Arc<Vec<AttributeSetVersion>>>,
}

impl RegistrySnapshot {
    /// Build a snapshot from a client-reported definition list.
    ///
    /// Later duplicates win, so pushing the same list twice yields the
    /// same snapshot. Unnamed markup materializes as `core/freeform`, so a
    /// minimal definition for it is injected when the client catalogue
    /// lacks one.
    pub fn from_definitions(definitions: Vec<BlockTypeDefinition>) -> Self {
        let mut types = normalize(definitions);

        types
            .entry(FREEFORM_BLOCK_NAME.to_string())
            .or_insert_with(|| BlockTypeDefinition::opaque(FREEFORM_BLOCK_NAME));

        let versions = types
            .iter()
            .map(|(name, definition)| (name.clone(), Arc::new(reduce(definition))))
            .collect();

        Self { types, versions }
    }

    /// Look up a definition by block-type name.
    pub fn get(&self, name: &str) -> Option<&BlockTypeDefinition> {
        self.types.get(name)
    }

    /// Synthesized attribute-set versions for a block type, oldest first.
    pub fn versions_for(&self, name: &str) -> Option<&[AttributeSetVersion]> {
        self.versions.get(name).map(|versions| versions.as_slice())
    }

    /// All definitions, keyed by name.
    pub fn types(&self) -> &BTreeMap<String, BlockTypeDefinition> {
        &self.types
    }

    /// Number of registered block types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Convert a client-reported definition list into a lookup keyed by
/// block-type name. A definition replaces any earlier one with the same
/// name.
pub fn normalize(definitions: Vec<BlockTypeDefinition>) -> BTreeMap<String, BlockTypeDefinition> {
    definitions
        .into_iter()
        .map(|definition| (definition.name.clone(), definition))
        .collect()
}

/// Process-wide block-type registry.
///
/// Cloning is cheap and all clones share the same state, in the manner of
/// a handle.
#[derive(Clone, Default)]
pub struct BlockTypeRegistry {
    inner: Arc<RwLock<Option<Arc<RegistrySnapshot>>>>,
}

impl BlockTypeRegistry {
    /// Create a registry with no catalogue sourced yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole catalogue. No merge semantics: previous state is
    /// discarded, and in-flight readers keep the snapshot they already
    /// took.
    pub fn set(&self, definitions: Vec<BlockTypeDefinition>) {
        let snapshot = Arc::new(RegistrySnapshot::from_definitions(definitions));
        *self.inner.write() = Some(snapshot);
    }

    /// Take the current snapshot.
    ///
    /// Fails with [`RegistryError::NotSourced`] when no catalogue has been
    /// pushed, so callers can distinguish "no blocks exist" from
    /// "catalogue unknown".
    pub fn get(&self) -> Result<Arc<RegistrySnapshot>, RegistryError> {
        self.inner
            .read()
            .as_ref()
            .cloned()
            .ok_or(RegistryError::NotSourced)
    }

    /// Drop the catalogue, returning the registry to its unsourced state.
    pub fn clear(&self) {
        *self.inner.write() = None;
    }

    /// Whether a catalogue has been sourced.
    pub fn is_sourced(&self) -> bool {
        self.inner.read().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition(name: &str) -> BlockTypeDefinition {
        serde_json::from_value(json!({
            "name": name,
            "attributes": { "content": { "type": "string" } }
        }))
        .unwrap()
    }

    #[test]
    fn unsourced_registry_is_distinct_from_empty() {
        let registry = BlockTypeRegistry::new();
        assert!(matches!(registry.get(), Err(RegistryError::NotSourced)));

        registry.set(vec![]);
        let snapshot = registry.get().unwrap();
        // Only the injected freeform definition is present.
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.get(FREEFORM_BLOCK_NAME).is_some());
    }

    #[test]
    fn set_replaces_wholesale() {
        let registry = BlockTypeRegistry::new();
        registry.set(vec![definition("demo/a"), definition("demo/b")]);
        registry.set(vec![definition("demo/c")]);

        let snapshot = registry.get().unwrap();
        assert!(snapshot.get("demo/a").is_none());
        assert!(snapshot.get("demo/c").is_some());
    }

    #[test]
    fn set_is_idempotent() {
        let registry = BlockTypeRegistry::new();
        registry.set(vec![definition("demo/a"), definition("demo/b")]);
        let first = registry.get().unwrap();

        registry.set(vec![definition("demo/a"), definition("demo/b")]);
        let second = registry.get().unwrap();

        assert_eq!(first.types(), second.types());
    }

    #[test]
    fn later_duplicate_name_wins() {
        let mut replacement = definition("demo/a");
        replacement.attributes.clear();

        let registry = BlockTypeRegistry::new();
        registry.set(vec![definition("demo/a"), replacement.clone()]);

        let snapshot = registry.get().unwrap();
        assert_eq!(snapshot.get("demo/a"), Some(&replacement));
    }

    #[test]
    fn clear_returns_to_unsourced() {
        let registry = BlockTypeRegistry::new();
        registry.set(vec![definition("demo/a")]);
        assert!(registry.is_sourced());

        registry.clear();
        assert!(!registry.is_sourced());
        assert!(matches!(registry.get(), Err(RegistryError::NotSourced)));
    }

    #[test]
    fn snapshot_precomputes_versions() {
        let registry = BlockTypeRegistry::new();
        registry.set(vec![definition("demo/a")]);

        let snapshot = registry.get().unwrap();
        let versions = snapshot.versions_for("demo/a").unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].name, "DemoAAttributes");
        // The injected freeform type has no attribute schema.
        assert!(snapshot.versions_for(FREEFORM_BLOCK_NAME).unwrap().is_empty());
    }

    #[test]
    fn readers_keep_their_snapshot_across_replaces() {
        let registry = BlockTypeRegistry::new();
        registry.set(vec![definition("demo/a")]);
        let held = registry.get().unwrap();

        registry.set(vec![definition("demo/b")]);

        assert!(held.get("demo/a").is_some());
        assert!(registry.get().unwrap().get("demo/a").is_none());
    }

    #[test]
    fn concurrent_readers_and_writers() {
        use std::thread;

        let registry = BlockTypeRegistry::new();
        registry.set(vec![definition("demo/a")]);

        let mut handles = vec![];
        for i in 0..8 {
            let registry = registry.clone();
            handles.push(thread::spawn(move || {
                if i % 2 == 0 {
                    registry.set(vec![definition("demo/a"), definition("demo/b")]);
                } else {
                    let snapshot = registry.get().unwrap();
                    assert!(snapshot.get("demo/a").is_some());
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
