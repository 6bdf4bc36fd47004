//! Block-type definitions as reported by the content-editing client
//!
//! A block type is a named schema for one kind of content block: a current
//! attribute map plus an ordered list of deprecated historical attribute
//! maps. The client pushes its whole catalogue as JSON whenever it starts
//! an editing session, so every type here round-trips serde_json.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Block type assigned to markup that carries no block name at all.
pub const FREEFORM_BLOCK_NAME: &str = "core/freeform";

/// Block type denoting a reference to a shared, separately stored block.
/// Its `ref` attribute holds the content id of the referenced item.
pub const REUSABLE_BLOCK_NAME: &str = "core/block";

/// Declared primitive kind of a single attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    String,
    Boolean,
    Number,
    Integer,
    Array,
    Object,
}

/// How an attribute value is derived from the block's embedded markup when
/// it is not explicitly present in the stored attribute bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeSourceKind {
    /// Inner markup of the selected element.
    Html,
    /// Value of a named attribute on the selected element.
    Attribute,
    /// Plain text content of the selected element.
    Text,
    /// Tag name of the selected element.
    Tag,
    /// One extracted sub-record per element matched by the selector.
    Query,
}

/// One attribute's type contract within a block-type schema version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDeclaration {
    /// Declared kind. Clients may send kinds this engine does not model
    /// (or a list of kinds); those deserialize as `None` and the attribute
    /// is handled by the best-effort typing rules.
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient_kind",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<AttributeKind>,

    /// Literal default value. Presence makes the synthesized field
    /// non-nullable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Markup extraction rule, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<AttributeSourceKind>,

    /// CSS-like selector scoping the extraction to an element of the
    /// block's markup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    /// Attribute name, for `source: attribute`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,

    /// Child tag name, for multiline `source: html` extraction.
    #[serde(default, deserialize_with = "lenient_multiline", skip_serializing_if = "Option::is_none")]
    pub multiline: Option<String>,

    /// Nested attribute schema, for `source: query`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<BTreeMap<String, AttributeDeclaration>>,

    /// Item schema, for arrays of typed items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<AttributeDeclaration>>,
}

impl AttributeDeclaration {
    /// Structural identity used by schema-version reduction: two
    /// declarations are interchangeable iff they declare the same kind and
    /// agree on whether a default is present. The default value itself and
    /// all extraction parameters are not compared.
    pub fn version_key(&self) -> (Option<AttributeKind>, bool) {
        (self.kind, self.default.is_some())
    }
}

/// One deprecated historical schema of a block type.
///
/// Clients attach other bookkeeping to deprecation entries (save/migrate
/// hooks); only the attribute map matters here, and it may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DeprecatedBlockType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, AttributeDeclaration>>,
}

/// A named schema for one kind of content block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockTypeDefinition {
    /// Unique namespaced identifier, e.g. `"core/paragraph"`.
    pub name: String,

    /// Current attribute schema.
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeDeclaration>,

    /// Historical schemas, in client-declared order (newest deprecation
    /// first, as the editing client lists them).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deprecated: Vec<DeprecatedBlockType>,
}

impl BlockTypeDefinition {
    /// Definition with the given name and no attribute schema at all.
    pub fn opaque(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            deprecated: Vec::new(),
        }
    }
}

/// Accepts a plain kind string, but degrades anything else (unknown kind
/// names, multi-kind lists, null) to `None` instead of rejecting the whole
/// catalogue push.
fn lenient_kind<'de, D>(deserializer: D) -> Result<Option<AttributeKind>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value::<AttributeKind>(v).ok()))
}

/// `multiline` is a tag name, but some client payloads use `true` for
/// legacy multiline text fields; anything that is not a string is ignored.
fn lenient_multiline<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::String(tag) => Some(tag),
        _ => None,
    }))
}
