//! Schema synthesis
//!
//! Turns block-type definitions (current attributes plus deprecation
//! history) into stable, typed attribute-set schema versions that the
//! query API can expose without breaking existing stored content.

pub mod fields;
pub mod versions;

pub use fields::{map_declaration, FieldDef, FieldType};
pub use versions::{
    attributes_type_shape, format_attributes_name, format_block_name, reduce, AttributeSetVersion,
    AttributesTypeShape,
};
