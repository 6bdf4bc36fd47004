//! Structural validation of stored attributes
//!
//! Decides whether a stored attribute record fits one attribute-set
//! schema version: every stored key must be declared (additional
//! properties are forbidden, which is what lets newer schema versions be
//! told apart from older ones) and every typed declaration must match the
//! stored value's JSON kind. Declarations without a determinable kind
//! accept any value.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::core::block_type::{AttributeDeclaration, AttributeKind};

/// Whether `attributes` structurally matches the declaration map of one
/// schema version.
pub(crate) fn validates_against(
    attributes: &Map<String, Value>,
    declarations: &BTreeMap<String, AttributeDeclaration>,
) -> bool {
    attributes.iter().all(|(name, value)| {
        declarations
            .get(name)
            .map_or(false, |declaration| kind_matches(declaration.kind, value))
    })
}

fn kind_matches(kind: Option<AttributeKind>, value: &Value) -> bool {
    match kind {
        None => true,
        Some(AttributeKind::String) => value.is_string(),
        Some(AttributeKind::Boolean) => value.is_boolean(),
        Some(AttributeKind::Number) => value.is_number(),
        Some(AttributeKind::Integer) => is_integral(value),
        Some(AttributeKind::Array) => value.is_array(),
        Some(AttributeKind::Object) => value.is_object(),
    }
}

fn is_integral(value: &Value) -> bool {
    match value {
        Value::Number(number) => {
            number.is_i64()
                || number.is_u64()
                || number.as_f64().map_or(false, |float| float.fract() == 0.0)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn declarations(value: serde_json::Value) -> BTreeMap<String, AttributeDeclaration> {
        serde_json::from_value(value).unwrap()
    }

    fn attributes(value: serde_json::Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn additional_properties_are_forbidden() {
        let schema = declarations(json!({ "color": { "type": "string" } }));

        assert!(validates_against(&attributes(json!({ "color": "blue" })), &schema));
        assert!(!validates_against(
            &attributes(json!({ "color": "blue", "size": 3 })),
            &schema
        ));
    }

    #[test]
    fn missing_attributes_are_allowed() {
        let schema = declarations(json!({
            "color": { "type": "string" },
            "size": { "type": "integer" }
        }));
        assert!(validates_against(&attributes(json!({})), &schema));
    }

    #[test]
    fn kinds_are_checked() {
        let schema = declarations(json!({
            "flag": { "type": "boolean" },
            "count": { "type": "integer" },
            "ratio": { "type": "number" },
            "data": { "type": "array" },
            "anything": {}
        }));

        assert!(validates_against(
            &attributes(json!({ "flag": true, "count": 3, "ratio": 0.5, "data": [] })),
            &schema
        ));
        assert!(validates_against(&attributes(json!({ "count": 3.0 })), &schema));
        assert!(validates_against(&attributes(json!({ "anything": [1, "x"] })), &schema));

        assert!(!validates_against(&attributes(json!({ "flag": "yes" })), &schema));
        assert!(!validates_against(&attributes(json!({ "count": 3.5 })), &schema));
        assert!(!validates_against(&attributes(json!({ "ratio": "0.5" })), &schema));
    }
}
