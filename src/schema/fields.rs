//! Attribute type mapping
//!
//! Maps a single declared attribute type to a semantic field type. The
//! mapping is best-effort: an attribute whose type cannot be determined is
//! omitted from the synthesized field set with a logged warning, never an
//! error.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::block_type::{AttributeDeclaration, AttributeKind};

/// Semantic type of a synthesized attribute field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldType {
    /// Text value.
    String,
    /// Boolean value.
    Boolean,
    /// 64-bit floating point number.
    Float,
    /// 64-bit integer.
    Int,
    /// Homogeneous list of the given element type.
    List(Box<FieldType>),
    /// Object synthesized from a `query` sub-schema.
    Object(BTreeMap<String, FieldDef>),
    /// Opaque array scalar: serialized-JSON passthrough, consumers must
    /// not assume element shape.
    AttributesArray,
    /// Opaque object scalar with the same passthrough semantics.
    AttributesObject,
}

/// One synthesized field of an attribute-set version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDef {
    pub field_type: FieldType,
    /// `false` iff the declaration carries a default value.
    pub nullable: bool,
    /// Deprecation reason, set once the attribute disappears from a newer
    /// schema version without a breaking change.
    pub deprecated: Option<String>,
}

/// Map one attribute declaration to a synthesized field.
///
/// Returns `None` when no type can be determined; `block_type_name` is
/// only used to make the diagnostic for that case useful.
pub fn map_declaration(
    attribute_name: &str,
    declaration: &AttributeDeclaration,
    block_type_name: &str,
) -> Option<FieldDef> {
    let field_type = map_field_type(attribute_name, declaration, block_type_name)?;

    Some(FieldDef {
        field_type,
        nullable: declaration.default.is_none(),
        deprecated: None,
    })
}

fn map_field_type(
    attribute_name: &str,
    declaration: &AttributeDeclaration,
    block_type_name: &str,
) -> Option<FieldType> {
    match declaration.kind {
        Some(AttributeKind::String) => Some(FieldType::String),
        Some(AttributeKind::Boolean) => Some(FieldType::Boolean),
        Some(AttributeKind::Number) => Some(FieldType::Float),
        Some(AttributeKind::Integer) => Some(FieldType::Int),
        Some(AttributeKind::Array) => Some(map_array(attribute_name, declaration, block_type_name)),
        Some(AttributeKind::Object) => Some(FieldType::AttributesObject),
        None if declaration.source.is_some() => Some(FieldType::String),
        None => {
            log::warn!(
                "could not determine type of attribute {:?} in block type {:?}",
                attribute_name,
                block_type_name
            );
            None
        }
    }
}

fn map_array(
    attribute_name: &str,
    declaration: &AttributeDeclaration,
    block_type_name: &str,
) -> FieldType {
    // A query sub-schema yields a list of a synthesized object type. The
    // sub-schema is mapped field-by-field, without its own versioning.
    if let Some(query) = &declaration.query {
        let sub_fields = query
            .iter()
            .filter_map(|(sub_name, sub_declaration)| {
                map_declaration(sub_name, sub_declaration, block_type_name)
                    .map(|field| (sub_name.clone(), field))
            })
            .collect();
        return FieldType::List(Box::new(FieldType::Object(sub_fields)));
    }

    if let Some(items) = &declaration.items {
        if let Some(item_type) = map_field_type(attribute_name, items, block_type_name) {
            return FieldType::List(Box::new(item_type));
        }
    }

    FieldType::AttributesArray
}
