//! Block-instance materialization
//!
//! One [`BlockInstance`] is one node of a materialized content tree:
//! resolved attributes tagged with the schema version they matched, the
//! block's own markup, reconstructed serialized markup and its inner
//! blocks. This module holds the per-block resolution rules; the tree
//! walk itself lives in [`crate::extract::engine`].

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::core::block_type::{AttributeDeclaration, AttributeKind, AttributeSourceKind};
use crate::core::ContentId;
use crate::extract::validate::validates_against;
use crate::markup::{Document, NodeRef, Selector};
use crate::parse::ParsedBlock;
use crate::schema::versions::AttributeSetVersion;

/// Synthetic attribute naming the schema version the stored attributes
/// matched.
pub const VERSION_MARKER: &str = "__version";

/// Lightweight description of a block's parent, usable for lookups but
/// carrying no ownership.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParentContext {
    /// Parent block's type name.
    pub name: String,
    /// Parent block's sibling position.
    pub order: usize,
}

/// One node of a materialized content tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInstance {
    /// Block type name.
    pub name: String,
    /// Content item this block belongs to.
    pub post_id: ContentId,
    /// Resolved attributes, including the [`VERSION_MARKER`] entry when a
    /// schema version exists for this block type.
    pub attributes: Map<String, Value>,
    /// Name of the matched attribute-set version, `None` for block types
    /// without an attribute schema.
    pub attributes_version: Option<String>,
    /// The block's raw embedded markup, with a single leading/trailing
    /// newline stripped.
    pub original_content: String,
    /// Serialized markup rebuilt around the inner blocks' own markup.
    pub save_content: String,
    /// Child blocks, in source order.
    pub inner_blocks: Vec<BlockInstance>,
    /// Zero-based sibling position.
    pub order: usize,
    /// Owning block, `None` at the root.
    pub parent: Option<ParentContext>,
    /// Whether a server-side renderer exists for this block name.
    pub is_dynamic: bool,
    /// Server-rendered output, when dynamic.
    pub dynamic_content: Option<String>,
}

/// Strip one leading and one trailing newline. Not recursive: `"\n\nx"`
/// keeps its second newline.
pub(crate) fn strip_newlines(html: &str) -> &str {
    let html = html.strip_prefix('\n').unwrap_or(html);
    html.strip_suffix('\n').unwrap_or(html)
}

/// Rebuild a block's serialized markup by walking its content fragments
/// and splicing each placeholder with the corresponding inner block's own
/// reconstructed markup, recursively.
pub(crate) fn save_content(data: &ParsedBlock) -> String {
    let mut result = String::new();
    let mut inner_index = 0;

    for fragment in &data.inner_content {
        match fragment {
            Some(literal) => result.push_str(strip_newlines(literal)),
            None => {
                if let Some(inner) = data.inner_blocks.get(inner_index) {
                    result.push_str(&save_content(inner));
                }
                inner_index += 1;
            }
        }
    }

    result
}

/// Resolve a block's attributes against its schema versions.
///
/// Versions are tried newest first; the first one the stored attributes
/// structurally validate against wins, and markup-sourced attributes are
/// extracted for that version (stored values take precedence on
/// collision). When nothing validates the stored attributes are returned
/// as-is, tagged with the current version. Never fails.
pub(crate) fn resolve_attributes(
    data: &ParsedBlock,
    block_type_name: &str,
    versions: &[AttributeSetVersion],
    document: &Document,
) -> (Map<String, Value>, Option<String>) {
    for version in versions.iter().rev() {
        if validates_against(&data.attrs, &version.declarations) {
            let mut attributes = source_attributes(
                Scope::Document(document),
                &version.declarations,
                block_type_name,
            );
            for (name, value) in &data.attrs {
                attributes.insert(name.clone(), value.clone());
            }
            attributes.insert(
                VERSION_MARKER.to_string(),
                Value::String(version.name.clone()),
            );
            return (attributes, Some(version.name.clone()));
        }
    }

    // Best-effort fallback: raw stored attributes tagged with the current
    // schema version.
    let mut attributes = data.attrs.clone();
    match versions.last() {
        Some(current) => {
            attributes.insert(
                VERSION_MARKER.to_string(),
                Value::String(current.name.clone()),
            );
            (attributes, Some(current.name.clone()))
        }
        None => (attributes, None),
    }
}

/// Extraction context: either the whole markup fragment or one element of
/// it (for `query` sub-records).
#[derive(Clone, Copy)]
pub(crate) enum Scope<'a> {
    Document(&'a Document),
    Element(NodeRef<'a>),
}

impl<'a> Scope<'a> {
    fn select_first(&self, selector: &Selector) -> Option<NodeRef<'a>> {
        match self {
            Scope::Document(document) => document.select_first(selector),
            Scope::Element(element) => element.select_first(selector),
        }
    }

    fn select(&self, selector: &Selector) -> Vec<NodeRef<'a>> {
        match self {
            Scope::Document(document) => document.select(selector),
            Scope::Element(element) => element.select(selector),
        }
    }

    fn inner_html(&self) -> String {
        match self {
            Scope::Document(document) => document.source().to_string(),
            Scope::Element(element) => element.inner_html().to_string(),
        }
    }

    fn plain_text(&self) -> String {
        match self {
            Scope::Document(document) => document.plain_text(),
            Scope::Element(element) => element.plain_text(),
        }
    }

    /// Element standing for the scope itself when a rule has no selector.
    fn context_element(&self) -> Option<NodeRef<'a>> {
        match self {
            Scope::Document(document) => document.first_element(),
            Scope::Element(element) => Some(*element),
        }
    }

    fn child_elements(&self) -> Vec<NodeRef<'a>> {
        match self {
            Scope::Document(document) => document.root_elements(),
            Scope::Element(element) => element.child_elements(),
        }
    }
}

/// Extract markup-sourced attributes for one declaration map.
///
/// Best-effort throughout: an attribute that cannot be sourced is simply
/// absent from the result, or takes its declared default.
pub(crate) fn source_attributes(
    scope: Scope<'_>,
    declarations: &BTreeMap<String, AttributeDeclaration>,
    block_type_name: &str,
) -> Map<String, Value> {
    let mut result = Map::new();

    for (name, declaration) in declarations {
        let source = match declaration.source {
            Some(source) => source,
            None => continue,
        };

        let selector = match &declaration.selector {
            Some(raw) => match Selector::parse(raw) {
                Ok(selector) => Some(selector),
                Err(error) => {
                    log::warn!(
                        "invalid selector for attribute {:?} in block type {:?}: {}",
                        name,
                        block_type_name,
                        error
                    );
                    None
                }
            },
            None => None,
        };

        let extracted = extract_one(scope, source, declaration, selector.as_ref(), block_type_name);

        match extracted {
            Some(value) if !is_empty_value(&value) => {
                result.insert(name.clone(), value);
            }
            _ => {
                // Empty extraction results fall back to the declared
                // default, when one exists.
                if let Some(default) = &declaration.default {
                    result.insert(name.clone(), default.clone());
                }
            }
        }
    }

    result
}

fn extract_one(
    scope: Scope<'_>,
    source: AttributeSourceKind,
    declaration: &AttributeDeclaration,
    selector: Option<&Selector>,
    block_type_name: &str,
) -> Option<Value> {
    match source {
        AttributeSourceKind::Html => {
            if let Some(tag) = &declaration.multiline {
                let children = match selector {
                    Some(selector) => scope.select_first(selector)?.child_elements(),
                    None => scope.child_elements(),
                };
                let mut html = String::new();
                for child in children {
                    if child.tag() == tag.to_ascii_lowercase() {
                        html.push_str(child.outer_html());
                    }
                }
                Some(Value::String(html))
            } else {
                let html = match selector {
                    Some(selector) => scope.select_first(selector)?.inner_html().to_string(),
                    None => scope.inner_html(),
                };
                Some(Value::String(html))
            }
        }
        AttributeSourceKind::Attribute => {
            let attribute = declaration.attribute.as_ref()?;
            let element = match selector {
                Some(selector) => scope.select_first(selector)?,
                None => scope.context_element()?,
            };
            element
                .attr(attribute)
                .map(|value| coerce(declaration.kind, value))
        }
        AttributeSourceKind::Text => {
            let text = match selector {
                Some(selector) => scope.select_first(selector)?.plain_text(),
                None => scope.plain_text(),
            };
            Some(coerce(declaration.kind, &text))
        }
        AttributeSourceKind::Tag => {
            let element = match selector {
                Some(selector) => scope.select_first(selector)?,
                None => scope.context_element()?,
            };
            Some(Value::String(element.tag().to_string()))
        }
        AttributeSourceKind::Query => {
            let query = declaration.query.as_ref()?;
            let selector = selector?;
            let records = scope
                .select(selector)
                .into_iter()
                .map(|element| {
                    Value::Object(source_attributes(
                        Scope::Element(element),
                        query,
                        block_type_name,
                    ))
                })
                .collect();
            Some(Value::Array(records))
        }
    }
}

/// Best-effort coercion of an extracted string toward the declared kind.
/// Anything that does not parse stays a string.
fn coerce(kind: Option<AttributeKind>, raw: &str) -> Value {
    match kind {
        Some(AttributeKind::Integer) => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        Some(AttributeKind::Number) => raw
            .trim()
            .parse::<f64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        Some(AttributeKind::Boolean) => match raw.trim() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        _ => Value::String(raw.to_string()),
    }
}

/// "No value" for default-substitution purposes: absent, empty string or
/// an empty query result.
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::String(string) => string.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Null => true,
        _ => false,
    }
}
