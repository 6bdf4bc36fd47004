//! Schema version reduction
//!
//! Given a block type's current attribute schema plus its deprecation
//! history, produces an ordered list of synthesized attribute-set schema
//! versions. Consecutive historical schemas that differ only in
//! non-breaking ways collapse into one version; a breaking change (an
//! attribute changing its declared type or required-ness) starts a new
//! one. Attributes that disappear along the way are never deleted from the
//! synthesized set, only marked deprecated.
//!
//! Reduction is a pure function of the definition and is computed once per
//! registry snapshot (see [`crate::core::registry::RegistrySnapshot`]).

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::block_type::{AttributeDeclaration, BlockTypeDefinition};
use crate::schema::fields::{map_declaration, FieldDef};

/// Reason attached to fields that dropped out of a newer schema version.
const DEPRECATION_REASON: &str = "Attribute is not present in the latest block type schema.";

/// One synthesized, independently nameable schema covering a contiguous
/// span of a block type's history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeSetVersion {
    /// Deterministic name: `<PascalName>Attributes` for the first emitted
    /// version, `<PascalName>AttributesV<N>` for later ones.
    pub name: String,
    /// Synthesized typed fields, including retained deprecated ones.
    pub fields: BTreeMap<String, FieldDef>,
    /// Accumulated raw declarations for this span. Used for structural
    /// validation of stored attributes and for markup-sourced extraction.
    pub declarations: BTreeMap<String, AttributeDeclaration>,
}

/// Shape the query API needs to expose a block type's attributes without
/// loss: nothing, a single object type, or a union of one object type per
/// version.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributesTypeShape<'a> {
    /// Block type has no attribute schema at all.
    None,
    /// Exactly one version.
    Single(&'a AttributeSetVersion),
    /// More than one version; `name` is the union type's name.
    Union {
        name: String,
        members: &'a [AttributeSetVersion],
    },
}

/// Format a block type name as a Pascal-case type name with a `Block`
/// suffix, e.g. `core/paragraph` → `CoreParagraphBlock`.
pub fn format_block_name(block_name: &str) -> String {
    let pascal = pascal_case(block_name);

    if pascal.ends_with("Block") {
        pascal
    } else {
        pascal + "Block"
    }
}

/// Name of the first emitted attribute-set version for a block type,
/// e.g. `demo/box` → `DemoBoxAttributes`.
pub fn format_attributes_name(block_name: &str) -> String {
    pascal_case(block_name) + "Attributes"
}

fn pascal_case(block_name: &str) -> String {
    block_name
        .split(['/', '?', '_', '=', '-'])
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Reduce a block type's schema history into ordered attribute-set
/// versions, oldest first. The last version always reflects the current
/// (non-deprecated) schema. A block type with no attributes anywhere in
/// its history yields an empty list.
pub fn reduce(block_type: &BlockTypeDefinition) -> Vec<AttributeSetVersion> {
    // Chronological order: deprecations are client-declared newest-first,
    // so the reversed list runs oldest → newest, with the current schema
    // last.
    let mut chronology: Vec<&BTreeMap<String, AttributeDeclaration>> = block_type
        .deprecated
        .iter()
        .rev()
        .filter_map(|deprecation| deprecation.attributes.as_ref())
        .collect();
    chronology.push(&block_type.attributes);

    let mut versions: Vec<AttributeSetVersion> = Vec::new();
    let mut fields: BTreeMap<String, FieldDef> = BTreeMap::new();
    let mut declarations: BTreeMap<String, AttributeDeclaration> = BTreeMap::new();
    let mut previous: Option<&BTreeMap<String, AttributeDeclaration>> = None;

    for (index, current) in chronology.iter().enumerate() {
        if let Some(previous) = previous {
            if is_breaking(previous, current) && !fields.is_empty() {
                versions.push(snapshot(block_type, versions.len(), &fields, &declarations));
            }
        }

        let mapped: BTreeMap<String, FieldDef> = current
            .iter()
            .filter_map(|(name, declaration)| {
                map_declaration(name, declaration, &block_type.name)
                    .map(|field| (name.clone(), field))
            })
            .collect();

        // Names dropped by this version survive in the accumulation with a
        // deprecation marker; they are never silently deleted once seen.
        for (name, field) in fields.iter_mut() {
            if !mapped.contains_key(name) && field.deprecated.is_none() {
                field.deprecated = Some(DEPRECATION_REASON.to_string());
            }
        }

        fields.extend(mapped);
        declarations.extend(
            current
                .iter()
                .map(|(name, declaration)| (name.clone(), declaration.clone())),
        );

        if index == chronology.len() - 1 && !fields.is_empty() {
            versions.push(snapshot(block_type, versions.len(), &fields, &declarations));
        }

        previous = Some(current);
    }

    versions
}

/// Exposure shape for a reduced version list.
pub fn attributes_type_shape<'a>(
    block_type_name: &str,
    versions: &'a [AttributeSetVersion],
) -> AttributesTypeShape<'a> {
    match versions {
        [] => AttributesTypeShape::None,
        [single] => AttributesTypeShape::Single(single),
        _ => AttributesTypeShape::Union {
            name: format_attributes_name(block_type_name) + "Union",
            members: versions,
        },
    }
}

// The unsuffixed name goes to the first (oldest) emission, so "no suffix"
// does NOT mean "current schema". Consumers resolving a union member must
// key on the version name; the current schema is the last list entry.
fn snapshot(
    block_type: &BlockTypeDefinition,
    emitted: usize,
    fields: &BTreeMap<String, FieldDef>,
    declarations: &BTreeMap<String, AttributeDeclaration>,
) -> AttributeSetVersion {
    let base = format_attributes_name(&block_type.name);
    let name = if emitted == 0 {
        base
    } else {
        format!("{}V{}", base, emitted)
    };

    AttributeSetVersion {
        name,
        fields: fields.clone(),
        declarations: declarations.clone(),
    }
}

/// A change between two consecutive schema versions is breaking iff an
/// attribute name present in both has a different `(kind, has_default)`
/// identity. Added and removed names are not breaking.
fn is_breaking(
    previous: &BTreeMap<String, AttributeDeclaration>,
    current: &BTreeMap<String, AttributeDeclaration>,
) -> bool {
    current.iter().any(|(name, declaration)| {
        previous
            .get(name)
            .map_or(false, |old| old.version_key() != declaration.version_key())
    })
}
