//! Schema synthesis over realistic catalogues
//!
//! Version reduction and field mapping have their own unit tests; these
//! scenarios push whole catalogues through the registry and check the
//! synthesized schemas across block types and longer histories.

use serde_json::json;

use crate::core::block_type::BlockTypeDefinition;
use crate::core::registry::BlockTypeRegistry;
use crate::schema::fields::FieldType;
use crate::schema::versions::{attributes_type_shape, AttributesTypeShape};

fn definition(value: serde_json::Value) -> BlockTypeDefinition {
    serde_json::from_value(value).unwrap()
}

fn catalogue() -> Vec<BlockTypeDefinition> {
    vec![
        definition(json!({
            "name": "core/paragraph",
            "attributes": {
                "content": { "type": "string", "source": "html", "selector": "p" },
                "dropCap": { "type": "boolean", "default": false }
            }
        })),
        definition(json!({
            "name": "core/gallery",
            "attributes": {
                "images": {
                    "type": "array",
                    "source": "query",
                    "selector": "img",
                    "query": {
                        "url": { "type": "string", "source": "attribute", "attribute": "src" },
                        "alt": { "type": "string", "source": "attribute", "attribute": "alt", "default": "" }
                    }
                },
                "columns": { "type": "integer" }
            }
        })),
        definition(json!({
            "name": "core/quote",
            "attributes": {
                "value": { "type": "string", "source": "html", "selector": "blockquote", "multiline": "p" },
                "citation": { "type": "string", "source": "html", "selector": "cite" }
            },
            "deprecated": [
                { "attributes": {
                    "value": { "type": "string", "source": "html", "selector": "blockquote", "multiline": "p" },
                    "citation": { "type": "string", "source": "html", "selector": "footer" },
                    "style": { "type": "number" }
                } }
            ]
        })),
    ]
}

#[test]
fn whole_catalogue_synthesizes_per_type_schemas() {
    let registry = BlockTypeRegistry::new();
    registry.set(catalogue());
    let snapshot = registry.get().unwrap();

    let paragraph = snapshot.versions_for("core/paragraph").unwrap();
    assert_eq!(paragraph.len(), 1);
    assert_eq!(paragraph[0].name, "CoreParagraphAttributes");
    assert!(!paragraph[0].fields["dropCap"].nullable);
    assert!(paragraph[0].fields["content"].nullable);

    let gallery = snapshot.versions_for("core/gallery").unwrap();
    match &gallery[0].fields["images"].field_type {
        FieldType::List(inner) => match inner.as_ref() {
            FieldType::Object(sub) => {
                assert_eq!(sub["url"].field_type, FieldType::String);
                assert!(!sub["alt"].nullable);
            }
            other => panic!("expected record element, got {other:?}"),
        },
        other => panic!("expected list, got {other:?}"),
    }
    assert_eq!(gallery[0].fields["columns"].field_type, FieldType::Int);

    // Selector changes are not breaking; the quote history collapses and
    // keeps the dropped style field as deprecated.
    let quote = snapshot.versions_for("core/quote").unwrap();
    assert_eq!(quote.len(), 1);
    assert!(quote[0].fields["style"].deprecated.is_some());
    assert!(quote[0].fields["citation"].deprecated.is_none());
}

#[test]
fn two_breaking_changes_yield_three_versions() {
    let registry = BlockTypeRegistry::new();
    registry.set(vec![definition(json!({
        "name": "demo/embed",
        "attributes": {
            "ratio": { "type": "number" },
            "url": { "type": "string" }
        },
        "deprecated": [
            { "attributes": {
                "ratio": { "type": "string" },
                "url": { "type": "string" }
            } },
            { "attributes": {
                "ratio": { "type": "string" },
                "url": { "type": "string", "default": "" }
            } }
        ]
    }))]);
    let snapshot = registry.get().unwrap();

    let versions = snapshot.versions_for("demo/embed").unwrap();
    let names: Vec<&str> = versions.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "DemoEmbedAttributes",
            "DemoEmbedAttributesV1",
            "DemoEmbedAttributesV2"
        ]
    );

    // Oldest version: url still carried a default, ratio was a string.
    assert!(!versions[0].fields["url"].nullable);
    assert_eq!(versions[0].fields["ratio"].field_type, FieldType::String);
    // Current version: ratio became numeric.
    assert_eq!(versions[2].fields["ratio"].field_type, FieldType::Float);
    assert!(versions[2].fields["url"].nullable);

    match attributes_type_shape("demo/embed", versions) {
        AttributesTypeShape::Union { name, members } => {
            assert_eq!(name, "DemoEmbedAttributesUnion");
            assert_eq!(members.len(), 3);
        }
        other => panic!("expected union, got {other:?}"),
    }
}

#[test]
fn version_names_are_unique_within_a_type() {
    let registry = BlockTypeRegistry::new();
    registry.set(catalogue());
    let snapshot = registry.get().unwrap();

    for (name, _) in snapshot.types() {
        let versions = snapshot.versions_for(name).unwrap();
        let mut seen = std::collections::BTreeSet::new();
        for version in versions {
            assert!(seen.insert(&version.name), "duplicate version name in {name}");
        }
    }
}
