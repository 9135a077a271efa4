//! Mapping record types
//!
//! Entities (graph nodes) and connections (sub-records of graph edges) share
//! one [`Mapping`] core: a name, a bound data source, a primary key and the
//! set of source columns mapped onto typed properties.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::source::DataSourceId;

/// Identifier of an entity (graph node)
pub type EntityId = String;

/// Identifier of a relation (graph edge)
pub type RelationId = String;

/// Identifier of a connection inside a relation
pub type ConnectionId = String;

/// Identifier of a property inside a mapping
pub type PropertyId = String;

/// Label shown for records without a name
pub const UNTITLED: &str = "Untitled";

/// Generate a fresh record identifier
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Target data type of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Text,
    Int,
    Double,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Int => "int",
            Self::Double => "double",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One source column mapped (or not) onto a target field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Source column, fixed when the table is bound
    pub col: String,
    /// Position of `col` in the source's column list
    #[serde(default)]
    pub position: usize,
    /// Target field name (defaults to `col` when empty)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<PropertyType>,
    #[serde(default)]
    pub checked: bool,
}

impl Property {
    pub fn new(col: impl Into<String>, position: usize, ty: Option<PropertyType>) -> Self {
        Self {
            col: col.into(),
            position,
            name: None,
            ty,
            checked: true,
        }
    }

    /// Name of the target field this property maps to
    pub fn target_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.col,
        }
    }
}

/// Properties of a mapping keyed by property id
pub type PropertyMap = BTreeMap<PropertyId, Property>;

/// Record fields that can carry a validation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Name,
    Table,
    Properties,
    PrimaryKey,
    Source,
    Target,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Table => "table",
            Self::Properties => "properties",
            Self::PrimaryKey => "primaryKey",
            Self::Source => "source",
            Self::Target => "target",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-field validation messages of one record.
///
/// A slot holding an empty message counts as "no error".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorMap(BTreeMap<Field, String>);

impl ErrorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the message for a field, replacing any earlier one
    pub fn insert(&mut self, field: Field, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str).filter(|m| !m.is_empty())
    }

    /// True iff at least one slot holds a non-empty message
    pub fn has_error(&self) -> bool {
        self.0.values().any(|m| !m.is_empty())
    }

    /// Non-empty messages in field order
    pub fn messages(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0
            .iter()
            .filter(|(_, m)| !m.is_empty())
            .map(|(f, m)| (*f, m.as_str()))
    }

    pub fn len(&self) -> usize {
        self.messages().count()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_error()
    }
}

impl<const N: usize> From<[(Field, &str); N]> for ErrorMap {
    fn from(entries: [(Field, &str); N]) -> Self {
        Self(entries.into_iter().map(|(f, m)| (f, m.to_string())).collect())
    }
}

/// Fields shared by entities and connections
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Bound data source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<DataSourceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<PropertyId>,
    #[serde(default)]
    pub properties: PropertyMap,
    /// Derived cache, refreshed by each validation pass
    #[serde(default)]
    pub error: ErrorMap,
}

impl Mapping {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn label(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => UNTITLED,
        }
    }

    pub fn has_table(&self) -> bool {
        self.table.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn has_error(&self) -> bool {
        self.error.has_error()
    }

    /// Drop the table binding together with everything derived from it
    pub fn unbind(&mut self) {
        self.table = None;
        self.primary_key = None;
        self.properties.clear();
    }

    /// Whether a property maps the given source column
    pub fn has_column(&self, col: &str) -> bool {
        self.properties.values().any(|p| p.col == col)
    }
}

/// Graph node payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(flatten)]
    pub mapping: Mapping,
}

impl Entity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            mapping: Mapping::named(name),
        }
    }
}

/// One named mapping carried by a relation edge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(flatten)]
    pub mapping: Mapping,
    /// Swap which endpoint is labelled source and which target
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub reversed: bool,
    /// Column holding the source entity's key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Column holding the target entity's key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl Connection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            mapping: Mapping::named(name),
            ..Self::default()
        }
    }
}

/// Patch-style update of the fields every mapping has.
///
/// `None` leaves a field untouched; `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingPatch {
    pub name: Option<Option<String>>,
    pub table: Option<Option<DataSourceId>>,
    pub primary_key: Option<Option<PropertyId>>,
    pub properties: Option<PropertyMap>,
}

impl MappingPatch {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(Some(name.into()));
        self
    }

    pub fn table(mut self, table: Option<DataSourceId>) -> Self {
        self.table = Some(table);
        self
    }

    pub fn primary_key(mut self, key: Option<PropertyId>) -> Self {
        self.primary_key = Some(key);
        self
    }

    pub fn properties(mut self, properties: PropertyMap) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn apply(self, mapping: &mut Mapping) {
        if let Some(name) = self.name {
            mapping.name = name;
        }
        if let Some(table) = self.table {
            mapping.table = table;
        }
        if let Some(key) = self.primary_key {
            mapping.primary_key = key;
        }
        if let Some(properties) = self.properties {
            mapping.properties = properties;
        }
    }
}

/// Patch-style update of a connection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionPatch {
    pub mapping: MappingPatch,
    pub reversed: Option<bool>,
    pub source: Option<Option<String>>,
    pub target: Option<Option<String>>,
}

impl ConnectionPatch {
    pub fn source(mut self, col: Option<String>) -> Self {
        self.source = Some(col);
        self
    }

    pub fn target(mut self, col: Option<String>) -> Self {
        self.target = Some(col);
        self
    }

    pub fn reversed(mut self, reversed: bool) -> Self {
        self.reversed = Some(reversed);
        self
    }

    pub fn apply(self, connection: &mut Connection) {
        self.mapping.apply(&mut connection.mapping);
        if let Some(reversed) = self.reversed {
            connection.reversed = reversed;
        }
        if let Some(source) = self.source {
            connection.source = source;
        }
        if let Some(target) = self.target {
            connection.target = target;
        }
    }
}

impl From<MappingPatch> for ConnectionPatch {
    fn from(mapping: MappingPatch) -> Self {
        Self {
            mapping,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_map_ignores_empty_messages() {
        let mut errors = ErrorMap::new();
        errors.insert(Field::Name, "");
        assert!(!errors.has_error());
        assert_eq!(errors.get(Field::Name), None);

        errors.insert(Field::Table, "Table required.");
        assert!(errors.has_error());
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.messages().collect::<Vec<_>>(),
            vec![(Field::Table, "Table required.")]
        );
    }

    #[test]
    fn test_error_map_serializes_field_names() {
        let errors = ErrorMap::from([(Field::PrimaryKey, "Specify primary key.")]);
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json, serde_json::json!({"primaryKey": "Specify primary key."}));
    }

    #[test]
    fn test_labels() {
        assert_eq!(Mapping::default().label(), UNTITLED);
        assert_eq!(Mapping::named("").label(), UNTITLED);
        assert_eq!(Mapping::named("Gene").label(), "Gene");
    }

    #[test]
    fn test_patch_clears_and_sets() {
        let mut mapping = Mapping::named("Gene");
        mapping.primary_key = Some("p1".into());

        MappingPatch::default()
            .table(Some("ds1".into()))
            .primary_key(None)
            .apply(&mut mapping);

        assert_eq!(mapping.name.as_deref(), Some("Gene"));
        assert_eq!(mapping.table.as_deref(), Some("ds1"));
        assert_eq!(mapping.primary_key, None);
    }

    #[test]
    fn test_connection_json_shape() {
        let mut connection = Connection::named("encodes");
        connection.source = Some("gene_id".into());
        let json = serde_json::to_value(&connection).unwrap();
        assert_eq!(json["name"], "encodes");
        assert_eq!(json["source"], "gene_id");
        assert!(json.get("reversed").is_none());

        let back: Connection = serde_json::from_value(json).unwrap();
        assert_eq!(back, connection);
    }

    #[test]
    fn test_property_target_name_falls_back_to_column() {
        let mut property = Property::new("gene_id", 0, Some(PropertyType::Text));
        assert_eq!(property.target_name(), "gene_id");
        property.name = Some("id".into());
        assert_eq!(property.target_name(), "id");
    }
}
