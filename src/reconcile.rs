//! Source-Binding Reconciler
//!
//! Runs after every change to the data source registry. Records bound to a
//! source that is gone lose their table, primary key and properties; the
//! next validation pass then reports them as incomplete.

use tracing::debug;

use crate::graph::{GraphChange, RecordRef, SchemaGraph};
use crate::source::DataSourceRegistry;

/// Unbind every record whose table is not in `registry`
pub fn reconcile(graph: &mut SchemaGraph, registry: &DataSourceRegistry) -> Vec<GraphChange> {
    let live = registry.ids();
    let is_stale = |table: &Option<String>| {
        table
            .as_deref()
            .is_some_and(|t| !t.is_empty() && !live.contains(t))
    };

    let mut changes = Vec::new();

    for (id, entity) in graph.entities_mut() {
        if is_stale(&entity.mapping.table) {
            debug!(entity = %id, table = ?entity.mapping.table, "unbinding removed data source");
            entity.mapping.unbind();
            changes.push(RecordRef::entity(id.clone()).updated());
        }
    }

    for (relation, connection_id, connection) in graph.connections_mut() {
        if is_stale(&connection.mapping.table) {
            debug!(
                %relation,
                connection = %connection_id,
                table = ?connection.mapping.table,
                "unbinding removed data source"
            );
            connection.mapping.unbind();
            changes.push(RecordRef::connection(relation.clone(), connection_id.clone()).updated());
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::bind_table;
    use crate::schema::{Connection, Entity, PropertyType};
    use crate::source::{DataSource, SourceFile};

    fn source(id: &str) -> DataSource {
        DataSource {
            id: id.into(),
            file: SourceFile::named(format!("{id}.csv")),
            columns: vec!["id".into(), "name".into()],
            sample_row: vec!["1".into(), "x".into()],
        }
    }

    #[test]
    fn test_removed_source_unbinds_entities_and_connections() {
        let mut registry = DataSourceRegistry::new();
        registry.add(source("ds1")).unwrap();
        registry.add(source("ds2")).unwrap();

        let mut graph = SchemaGraph::new();
        let (a, _) = graph.create_entity(Entity::named("Gene"));
        let (b, _) = graph.create_entity(Entity::named("Protein"));
        let (rel, conn, _) = graph.create_relation(&a, &b, Connection::named("encodes")).unwrap();

        let ds1 = registry.get("ds1").unwrap().clone();
        let ds2 = registry.get("ds2").unwrap().clone();
        graph
            .update_mapping(&RecordRef::entity(a.clone()), |m| {
                bind_table(m, &ds1, PropertyType::Text);
                m.primary_key = m.properties.keys().next().cloned();
                Ok(())
            })
            .unwrap();
        graph
            .update_mapping(&RecordRef::entity(b.clone()), |m| {
                bind_table(m, &ds2, PropertyType::Text);
                Ok(())
            })
            .unwrap();
        graph
            .update_mapping(&RecordRef::connection(rel.clone(), conn.clone()), |m| {
                bind_table(m, &ds1, PropertyType::Text);
                Ok(())
            })
            .unwrap();

        registry.remove("ds1").unwrap();
        let changes = reconcile(&mut graph, &registry);
        assert_eq!(changes.len(), 2);

        let gene = &graph.entity(&a).unwrap().mapping;
        assert_eq!(gene.table, None);
        assert_eq!(gene.primary_key, None);
        assert!(gene.properties.is_empty());
        assert_eq!(gene.name.as_deref(), Some("Gene"));

        let encodes = &graph.connection(&rel, &conn).unwrap().mapping;
        assert_eq!(encodes.table, None);
        assert!(encodes.properties.is_empty());

        let protein = &graph.entity(&b).unwrap().mapping;
        assert_eq!(protein.table.as_deref(), Some("ds2"));
        assert_eq!(protein.properties.len(), 2);
    }

    #[test]
    fn test_unbound_records_untouched() {
        let registry = DataSourceRegistry::new();
        let (mut graph, _) = SchemaGraph::seeded();
        assert!(reconcile(&mut graph, &registry).is_empty());
    }
}
