//! Property editing rules
//!
//! Operations the property table and record form perform on a [`Mapping`]:
//! binding a table, selecting properties, choosing the primary key, and the
//! two-phase (draft, then commit) edits used for free-text fields.

use serde::Serialize;

use crate::error::{MapperError, Result};
use crate::schema::{new_id, Connection, Mapping, Property, PropertyId, PropertyMap, PropertyType};
use crate::source::DataSource;

/// Header checkbox state of the property table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionState {
    All,
    Indeterminate,
    None,
}

/// Tri-state selection; an empty property set reads as `All`
pub fn selection_state(mapping: &Mapping) -> SelectionState {
    let mut values = mapping.properties.values();
    if values.clone().all(|p| p.checked) {
        SelectionState::All
    } else if values.any(|p| p.checked) {
        SelectionState::Indeterminate
    } else {
        SelectionState::None
    }
}

pub fn selected_count(mapping: &Mapping) -> usize {
    mapping.properties.values().filter(|p| p.checked).count()
}

/// One row of the property table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyRow<'a> {
    pub id: &'a PropertyId,
    #[serde(flatten)]
    pub property: &'a Property,
    pub primary_key: bool,
}

/// Properties in source column order
pub fn property_rows(mapping: &Mapping) -> Vec<PropertyRow<'_>> {
    let mut rows: Vec<_> = mapping
        .properties
        .iter()
        .map(|(id, property)| PropertyRow {
            id,
            property,
            primary_key: mapping.primary_key.as_ref() == Some(id),
        })
        .collect();
    rows.sort_by(|a, b| {
        a.property
            .position
            .cmp(&b.property.position)
            .then_with(|| a.property.col.cmp(&b.property.col))
    });
    rows
}

/// Everything the property table renders for one record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyTable<'a> {
    pub rows: Vec<PropertyRow<'a>>,
    pub selected: usize,
    pub selection: SelectionState,
}

pub fn property_table(mapping: &Mapping) -> PropertyTable<'_> {
    PropertyTable {
        rows: property_rows(mapping),
        selected: selected_count(mapping),
        selection: selection_state(mapping),
    }
}

/// Properties for every column of `source`, all selected, all `default_type`
pub fn properties_for(source: &DataSource, default_type: PropertyType) -> PropertyMap {
    source
        .columns
        .iter()
        .enumerate()
        .map(|(i, col)| (new_id(), Property::new(col.clone(), i, Some(default_type))))
        .collect()
}

/// Bind a data source, replacing the property set wholesale.
///
/// Any earlier customisation is discarded and the primary key is cleared
/// since it referred to a property that no longer exists.
pub fn bind_table(mapping: &mut Mapping, source: &DataSource, default_type: PropertyType) {
    mapping.properties = properties_for(source, default_type);
    mapping.table = Some(source.id.clone());
    mapping.primary_key = None;
}

/// Bind a connection's table; key columns missing from the new source are cleared
pub fn bind_connection_table(
    connection: &mut Connection,
    source: &DataSource,
    default_type: PropertyType,
) {
    bind_table(&mut connection.mapping, source, default_type);
    for column in [&mut connection.source, &mut connection.target] {
        if column.as_ref().is_some_and(|c| !source.columns.contains(c)) {
            *column = None;
        }
    }
}

fn property_mut<'a>(mapping: &'a mut Mapping, id: &str) -> Result<&'a mut Property> {
    mapping
        .properties
        .get_mut(id)
        .ok_or_else(|| MapperError::PropertyNotFound(id.to_string()))
}

/// Select or deselect one property; deselecting the primary key clears it
pub fn set_checked(mapping: &mut Mapping, id: &str, checked: bool) -> Result<()> {
    property_mut(mapping, id)?.checked = checked;
    if !checked && mapping.primary_key.as_deref() == Some(id) {
        mapping.primary_key = None;
    }
    Ok(())
}

pub fn toggle_checked(mapping: &mut Mapping, id: &str) -> Result<bool> {
    let checked = !property_mut(mapping, id)?.checked;
    set_checked(mapping, id, checked)?;
    Ok(checked)
}

/// Header checkbox: select or deselect every property
pub fn set_all_checked(mapping: &mut Mapping, checked: bool) {
    for property in mapping.properties.values_mut() {
        property.checked = checked;
    }
    if !checked {
        mapping.primary_key = None;
    }
}

/// Designate the primary key; only selected properties qualify
pub fn set_primary_key(mapping: &mut Mapping, id: &str) -> Result<()> {
    if !property_mut(mapping, id)?.checked {
        return Err(MapperError::PrimaryKeyUnchecked(id.to_string()));
    }
    mapping.primary_key = Some(id.to_string());
    Ok(())
}

pub fn set_type(mapping: &mut Mapping, id: &str, ty: Option<PropertyType>) -> Result<()> {
    property_mut(mapping, id)?.ty = ty;
    Ok(())
}

pub fn rename_property(mapping: &mut Mapping, id: &str, name: impl Into<String>) -> Result<()> {
    property_mut(mapping, id)?.name = Some(name.into());
    Ok(())
}

/// Which key column of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Source,
    Target,
}

/// Choose the column holding the source or target entity's key
pub fn set_endpoint_column(
    connection: &mut Connection,
    endpoint: Endpoint,
    col: Option<String>,
) -> Result<()> {
    if let Some(col) = &col {
        if !connection.mapping.has_column(col) {
            return Err(MapperError::UnknownColumn(col.clone()));
        }
    }
    match endpoint {
        Endpoint::Source => connection.source = col,
        Endpoint::Target => connection.target = col,
    }
    Ok(())
}

/// A field value being edited locally.
///
/// Typing only updates the draft; [`FieldDraft::commit`] yields the value to
/// write back, and only when it differs from what the record held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDraft<T> {
    original: T,
    value: T,
}

impl<T: Clone + PartialEq> FieldDraft<T> {
    pub fn begin(current: T) -> Self {
        Self {
            original: current.clone(),
            value: current,
        }
    }

    pub fn set(&mut self, value: T) {
        self.value = value;
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn is_dirty(&self) -> bool {
        self.value != self.original
    }

    /// Finish editing; `None` when nothing changed
    pub fn commit(self) -> Option<T> {
        self.is_dirty().then_some(self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceFile;

    fn source(columns: &[&str]) -> DataSource {
        DataSource {
            id: "ds1".into(),
            file: SourceFile::named("genes.csv"),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            sample_row: Vec::new(),
        }
    }

    fn bound(columns: &[&str]) -> Mapping {
        let mut mapping = Mapping::named("Gene");
        bind_table(&mut mapping, &source(columns), PropertyType::Text);
        mapping
    }

    fn id_of(mapping: &Mapping, col: &str) -> PropertyId {
        mapping
            .properties
            .iter()
            .find(|(_, p)| p.col == col)
            .map(|(id, _)| id.clone())
            .unwrap()
    }

    #[test]
    fn test_bind_table_creates_one_checked_property_per_column() {
        let mapping = bound(&["a", "b"]);
        assert_eq!(mapping.table.as_deref(), Some("ds1"));
        assert_eq!(mapping.properties.len(), 2);
        assert!(mapping.properties.values().all(|p| p.checked && p.ty == Some(PropertyType::Text)));

        let rows = property_rows(&mapping);
        let cols: Vec<_> = rows.iter().map(|r| r.property.col.as_str()).collect();
        assert_eq!(cols, vec!["a", "b"]);
    }

    #[test]
    fn test_rebinding_discards_customisation() {
        let mut mapping = bound(&["a", "b"]);
        let a = id_of(&mapping, "a");
        rename_property(&mut mapping, &a, "alpha").unwrap();
        set_primary_key(&mut mapping, &a).unwrap();

        bind_table(&mut mapping, &source(&["x"]), PropertyType::Int);
        assert_eq!(mapping.properties.len(), 1);
        assert!(!mapping.properties.contains_key(&a));
        assert_eq!(mapping.primary_key, None);
        assert!(mapping.properties.values().all(|p| p.name.is_none()));
    }

    #[test]
    fn test_unchecking_primary_key_clears_it() {
        let mut mapping = bound(&["a", "b"]);
        let (a, b) = (id_of(&mapping, "a"), id_of(&mapping, "b"));
        set_primary_key(&mut mapping, &a).unwrap();

        set_checked(&mut mapping, &b, false).unwrap();
        assert_eq!(mapping.primary_key.as_deref(), Some(a.as_str()));

        assert!(!toggle_checked(&mut mapping, &a).unwrap());
        assert_eq!(mapping.primary_key, None);
    }

    #[test]
    fn test_primary_key_requires_checked_property() {
        let mut mapping = bound(&["a"]);
        let a = id_of(&mapping, "a");
        set_checked(&mut mapping, &a, false).unwrap();
        let err = set_primary_key(&mut mapping, &a).unwrap_err();
        assert!(matches!(err, MapperError::PrimaryKeyUnchecked(_)));
        assert!(matches!(
            set_primary_key(&mut mapping, "nope").unwrap_err(),
            MapperError::PropertyNotFound(_)
        ));
    }

    #[test]
    fn test_selection_state_and_toggle_all() {
        let mut mapping = bound(&["a", "b"]);
        let (a, b) = (id_of(&mapping, "a"), id_of(&mapping, "b"));
        assert_eq!(selection_state(&mapping), SelectionState::All);

        set_primary_key(&mut mapping, &a).unwrap();
        set_checked(&mut mapping, &b, false).unwrap();
        assert_eq!(selection_state(&mapping), SelectionState::Indeterminate);
        let table = property_table(&mapping);
        assert_eq!(table.selected, 1);
        assert_eq!(table.selection, SelectionState::Indeterminate);
        assert!(table.rows[0].primary_key);

        set_all_checked(&mut mapping, true);
        assert_eq!(selection_state(&mapping), SelectionState::All);
        assert_eq!(mapping.primary_key.as_deref(), Some(a.as_str()));

        set_all_checked(&mut mapping, false);
        assert_eq!(selection_state(&mapping), SelectionState::None);
        assert_eq!(mapping.primary_key, None);
    }

    #[test]
    fn test_endpoint_columns_must_exist() {
        let mut connection = Connection::named("encodes");
        let links = source(&["gene_id", "protein_id"]);
        bind_connection_table(&mut connection, &links, PropertyType::Text);

        set_endpoint_column(&mut connection, Endpoint::Source, Some("gene_id".into())).unwrap();
        let err = set_endpoint_column(&mut connection, Endpoint::Target, Some("nope".into()))
            .unwrap_err();
        assert!(matches!(err, MapperError::UnknownColumn(c) if c == "nope"));
        assert_eq!(connection.source.as_deref(), Some("gene_id"));
        assert_eq!(connection.target, None);
    }

    #[test]
    fn test_rebinding_connection_drops_stale_key_columns() {
        let mut connection = Connection::new();
        let links = source(&["gene_id", "protein_id"]);
        bind_connection_table(&mut connection, &links, PropertyType::Text);
        connection.source = Some("gene_id".into());
        connection.target = Some("protein_id".into());

        let scores = source(&["gene_id", "score"]);
        bind_connection_table(&mut connection, &scores, PropertyType::Text);
        assert_eq!(connection.source.as_deref(), Some("gene_id"));
        assert_eq!(connection.target, None);
    }

    #[test]
    fn test_draft_commits_only_changes() {
        let mut draft = FieldDraft::begin(Some("Gene".to_string()));
        draft.set(Some("Gen".to_string()));
        draft.set(Some("Gene".to_string()));
        assert_eq!(draft.clone().commit(), None);

        draft.set(Some("Genes".to_string()));
        assert!(draft.is_dirty());
        assert_eq!(draft.commit(), Some(Some("Genes".to_string())));
    }
}
