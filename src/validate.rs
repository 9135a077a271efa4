//! Field Validator
//!
//! Pure functions from a record to its [`ErrorMap`]. Every rule is checked on
//! every call so all problems surface together. Two rules share the
//! `properties` slot; when both fire the later one wins.

use crate::schema::{Connection, Entity, ErrorMap, Field, Mapping};

pub const NAME_REQUIRED: &str = "Name required.";
pub const TABLE_REQUIRED: &str = "Table required.";
pub const PROPERTY_TYPES_REQUIRED: &str = "Specify types for all selected properties.";
pub const PROPERTY_SELECTION_REQUIRED: &str = "Select at least one property";
pub const PRIMARY_KEY_REQUIRED: &str = "Specify primary key.";
pub const SOURCE_REQUIRED: &str = "Specify source.";
pub const TARGET_REQUIRED: &str = "Specify target.";

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, str::is_empty)
}

/// Rules shared by entities and connections
pub fn validate_mapping(mapping: &Mapping) -> ErrorMap {
    let mut errors = ErrorMap::new();
    let has_table = mapping.has_table();

    if is_blank(mapping.name.as_deref()) {
        errors.insert(Field::Name, NAME_REQUIRED);
    }
    if !has_table {
        errors.insert(Field::Table, TABLE_REQUIRED);
    }

    let mut properties = mapping.properties.values();
    if properties.clone().any(|p| p.checked && p.ty.is_none()) {
        errors.insert(Field::Properties, PROPERTY_TYPES_REQUIRED);
    }
    if has_table && properties.all(|p| !p.checked) {
        errors.insert(Field::Properties, PROPERTY_SELECTION_REQUIRED);
    }

    if has_table && is_blank(mapping.primary_key.as_deref()) {
        errors.insert(Field::PrimaryKey, PRIMARY_KEY_REQUIRED);
    }
    errors
}

pub fn validate_entity(entity: &Entity) -> ErrorMap {
    validate_mapping(&entity.mapping)
}

/// Mapping rules plus the source/target key columns
pub fn validate_connection(connection: &Connection) -> ErrorMap {
    let mut errors = validate_mapping(&connection.mapping);
    if connection.mapping.has_table() {
        if is_blank(connection.source.as_deref()) {
            errors.insert(Field::Source, SOURCE_REQUIRED);
        }
        if is_blank(connection.target.as_deref()) {
            errors.insert(Field::Target, TARGET_REQUIRED);
        }
    }
    errors
}
