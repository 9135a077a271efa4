//! Editing session
//!
//! One [`EditorSession`] owns the graph, the data source registry and the
//! validation coordinator of a single open editor. Every mutation goes
//! through it so the coordinator sees each [`GraphChange`] and the
//! reconciler runs after each registry change.
//!
//! The session reads time from tokio's clock, so tests can drive the
//! debounce window with a paused runtime.

pub mod driver;

pub use driver::{drive, spawn_ingest, SessionEvent, ValidityStatus};

use std::time::Instant;
use tracing::debug;

use crate::config::MapperConfig;
use crate::coordinator::{CoordinatorState, ValidationCoordinator, ValidationReport};
use crate::edit::{self, Endpoint, FieldDraft, PropertyTable};
use crate::error::{MapperError, Result};
use crate::graph::{GraphChange, RecordRef, SchemaGraph, SchemaSnapshot};
use crate::reconcile::reconcile;
use crate::schema::{
    Connection, ConnectionId, ConnectionPatch, Entity, EntityId, ErrorMap, Mapping, MappingPatch,
    Property, PropertyType, RelationId,
};
use crate::source::{DataSource, DataSourceRegistry};

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

#[derive(Debug)]
pub struct EditorSession {
    config: MapperConfig,
    graph: SchemaGraph,
    registry: DataSourceRegistry,
    coordinator: ValidationCoordinator,
}

impl EditorSession {
    /// A fresh session holding one unconfigured entity
    pub fn new(config: MapperConfig) -> Self {
        let (graph, _) = SchemaGraph::seeded();
        Self::with_graph(config, graph)
    }

    /// A session over an existing graph, e.g. one rebuilt from a snapshot
    pub fn with_graph(config: MapperConfig, graph: SchemaGraph) -> Self {
        let coordinator = ValidationCoordinator::new(&config.validation);
        Self {
            config,
            graph,
            registry: DataSourceRegistry::new(),
            coordinator,
        }
    }

    /// Rebuild an exported schema over `sources`. Records bound to a source
    /// not among them are unbound.
    pub fn restore<I>(config: MapperConfig, snapshot: SchemaSnapshot, sources: I) -> Result<Self>
    where
        I: IntoIterator<Item = DataSource>,
    {
        let graph = SchemaGraph::from_snapshot(snapshot)?;
        let mut session = Self::with_graph(config, graph);
        session.add_data_sources(sources)?;
        Ok(session)
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn graph(&self) -> &SchemaGraph {
        &self.graph
    }

    pub fn registry(&self) -> &DataSourceRegistry {
        &self.registry
    }

    fn notify(&mut self, change: &GraphChange) {
        self.coordinator.notify(change, now());
    }

    fn notify_all(&mut self, changes: &[GraphChange]) {
        let at = now();
        for change in changes {
            self.coordinator.notify(change, at);
        }
    }

    // ========== Data sources ==========

    /// Register an uploaded source and reconcile the graph against the new set
    pub fn add_data_source(&mut self, source: DataSource) -> Result<()> {
        self.add_data_sources([source])
    }

    /// Register several sources, then reconcile once against the full set.
    ///
    /// Reconciliation runs even when registration fails part way, so the
    /// graph never refers to a source the registry lacks.
    pub fn add_data_sources<I>(&mut self, sources: I) -> Result<()>
    where
        I: IntoIterator<Item = DataSource>,
    {
        let registry = &mut self.registry;
        let added = sources
            .into_iter()
            .try_for_each(|source| registry.add(source).map(drop));
        self.reconcile();
        added
    }

    /// Remove a source; records bound to it are unbound
    pub fn remove_data_source(&mut self, id: &str) -> Result<DataSource> {
        let (source, _) = self.registry.remove(id)?;
        self.reconcile();
        Ok(source)
    }

    /// Unbind every record whose source is not registered; returns how many
    pub fn reconcile(&mut self) -> usize {
        let changes = reconcile(&mut self.graph, &self.registry);
        debug!(unbound = changes.len(), "records reconciled");
        self.notify_all(&changes);
        changes.len()
    }

    // ========== Graph structure ==========

    pub fn create_entity(&mut self, entity: Entity) -> EntityId {
        let (id, change) = self.graph.create_entity(entity);
        self.notify(&change);
        id
    }

    pub fn create_relation(
        &mut self,
        source: &str,
        target: &str,
        connection: Connection,
    ) -> Result<(RelationId, ConnectionId)> {
        let (relation, id, change) = self.graph.create_relation(source, target, connection)?;
        self.notify(&change);
        Ok((relation, id))
    }

    /// Drag from an entity to empty space: a new entity joined to `origin`
    pub fn spawn_entity_from(
        &mut self,
        origin: &str,
    ) -> Result<(EntityId, RelationId, ConnectionId)> {
        if !self.graph.contains_entity(origin) {
            return Err(MapperError::EntityNotFound(origin.to_string()));
        }
        let entity = self.create_entity(Entity::new());
        let (relation, connection) = self.create_relation(origin, &entity, Connection::new())?;
        Ok((entity, relation, connection))
    }

    /// Drag between two existing entities
    pub fn connect(&mut self, source: &str, target: &str) -> Result<(RelationId, ConnectionId)> {
        self.create_relation(source, target, Connection::new())
    }

    pub fn delete_entity(&mut self, id: &str) -> Result<()> {
        let changes = self.graph.delete_entity(id)?;
        self.notify_all(&changes);
        Ok(())
    }

    pub fn delete_relation(&mut self, id: &str) -> Result<()> {
        let change = self.graph.delete_relation(id)?;
        self.notify(&change);
        Ok(())
    }

    pub fn patch_entity(&mut self, id: &str, patch: MappingPatch) -> Result<()> {
        let change = self.graph.patch_entity(id, patch)?;
        self.notify(&change);
        Ok(())
    }

    pub fn patch_connection(
        &mut self,
        relation: &str,
        connection: &str,
        patch: ConnectionPatch,
    ) -> Result<()> {
        let change = self.graph.patch_connection(relation, connection, patch)?;
        self.notify(&change);
        Ok(())
    }

    // ========== Connection set ==========

    pub fn add_connection(&mut self, relation: &str) -> Result<ConnectionId> {
        let (id, change) = self.graph.add_connection(relation, Connection::new())?;
        self.notify(&change);
        Ok(id)
    }

    /// Remove a connection; returns false when this deleted the whole relation
    pub fn remove_connection(&mut self, relation: &str, connection: &str) -> Result<bool> {
        let change = self.graph.remove_connection(relation, connection)?;
        let kept = !matches!(change, GraphChange::RelationDeleted(_));
        self.notify(&change);
        Ok(kept)
    }

    /// Flip which endpoint a connection labels as source; returns the new flag
    pub fn toggle_reversed(&mut self, relation: &str, connection: &str) -> Result<bool> {
        let mut reversed = false;
        let change = self.graph.update_connection(relation, connection, |c| {
            c.reversed = !c.reversed;
            reversed = c.reversed;
            Ok(())
        })?;
        self.notify(&change);
        Ok(reversed)
    }

    pub fn set_endpoint_column(
        &mut self,
        relation: &str,
        connection: &str,
        endpoint: Endpoint,
        col: Option<String>,
    ) -> Result<()> {
        let change = self.graph.update_connection(relation, connection, |c| {
            edit::set_endpoint_column(c, endpoint, col)
        })?;
        self.notify(&change);
        Ok(())
    }

    // ========== Property editing ==========

    /// Bind a registered source to a record, replacing its properties
    pub fn bind_table(&mut self, record: &RecordRef, source: &str) -> Result<()> {
        let source = self
            .registry
            .get(source)
            .ok_or_else(|| MapperError::DataSourceNotFound(source.to_string()))?;
        let default_type = self.config.properties.default_type;

        let change = match record {
            RecordRef::Entity(_) => self.graph.update_mapping(record, |m| {
                edit::bind_table(m, source, default_type);
                Ok(())
            })?,
            RecordRef::Connection { relation, connection } => {
                self.graph.update_connection(relation, connection, |c| {
                    edit::bind_connection_table(c, source, default_type);
                    Ok(())
                })?
            }
        };
        self.notify(&change);
        Ok(())
    }

    fn edit_mapping<T, F>(&mut self, record: &RecordRef, edit: F) -> Result<T>
    where
        F: FnOnce(&mut Mapping) -> Result<T>,
    {
        let value = edit(self.graph.mapping_mut(record)?)?;
        debug!(%record, "property edited");
        self.notify(&record.updated());
        Ok(value)
    }

    pub fn set_checked(&mut self, record: &RecordRef, property: &str, checked: bool) -> Result<()> {
        self.edit_mapping(record, |m| edit::set_checked(m, property, checked))
    }

    pub fn toggle_checked(&mut self, record: &RecordRef, property: &str) -> Result<bool> {
        self.edit_mapping(record, |m| edit::toggle_checked(m, property))
    }

    /// Header checkbox
    pub fn set_all_checked(&mut self, record: &RecordRef, checked: bool) -> Result<()> {
        self.edit_mapping(record, |m| {
            edit::set_all_checked(m, checked);
            Ok(())
        })
    }

    pub fn set_primary_key(&mut self, record: &RecordRef, property: &str) -> Result<()> {
        self.edit_mapping(record, |m| edit::set_primary_key(m, property))
    }

    pub fn set_type(
        &mut self,
        record: &RecordRef,
        property: &str,
        ty: Option<PropertyType>,
    ) -> Result<()> {
        self.edit_mapping(record, |m| edit::set_type(m, property, ty))
    }

    // ========== Two-phase field edits ==========

    /// Start editing a record's name
    pub fn begin_name(&self, record: &RecordRef) -> Result<FieldDraft<Option<String>>> {
        Ok(FieldDraft::begin(self.graph.mapping(record)?.name.clone()))
    }

    /// Write a name draft back; returns whether the record changed
    pub fn commit_name(
        &mut self,
        record: &RecordRef,
        draft: FieldDraft<Option<String>>,
    ) -> Result<bool> {
        // the record must still exist even when the draft is clean
        self.graph.mapping(record)?;
        match draft.commit() {
            Some(name) => self.edit_mapping(record, |m| {
                m.name = name;
                Ok(true)
            }),
            None => Ok(false),
        }
    }

    fn property(&self, record: &RecordRef, property: &str) -> Result<&Property> {
        self.graph
            .mapping(record)?
            .properties
            .get(property)
            .ok_or_else(|| MapperError::PropertyNotFound(property.to_string()))
    }

    /// Start editing a property's target name
    pub fn begin_property_name(
        &self,
        record: &RecordRef,
        property: &str,
    ) -> Result<FieldDraft<String>> {
        let property = self.property(record, property)?;
        Ok(FieldDraft::begin(property.name.clone().unwrap_or_default()))
    }

    /// Write a property name draft back; returns whether the property changed
    pub fn commit_property_name(
        &mut self,
        record: &RecordRef,
        property: &str,
        draft: FieldDraft<String>,
    ) -> Result<bool> {
        // the property must still exist even when the draft is clean
        self.property(record, property)?;
        match draft.commit() {
            Some(name) => self.edit_mapping(record, |m| {
                edit::rename_property(m, property, name)?;
                Ok(true)
            }),
            None => Ok(false),
        }
    }

    // ========== Views ==========

    pub fn property_table(&self, record: &RecordRef) -> Result<PropertyTable<'_>> {
        Ok(edit::property_table(self.graph.mapping(record)?))
    }

    /// Cached errors of a record as of the last validation pass
    pub fn errors(&self, record: &RecordRef) -> Result<&ErrorMap> {
        Ok(&self.graph.mapping(record)?.error)
    }

    pub fn label(&self, record: &RecordRef) -> Result<&str> {
        Ok(self.graph.mapping(record)?.label())
    }

    pub fn endpoint_labels(&self, relation: &str, connection: &str) -> Result<(&str, &str)> {
        self.graph.endpoint_labels(relation, connection)
    }

    // ========== Validation ==========

    pub fn is_valid(&self) -> bool {
        self.coordinator.is_valid()
    }

    /// Last schema exported by a valid pass
    pub fn schema(&self) -> Option<&SchemaSnapshot> {
        self.coordinator.schema()
    }

    pub fn state(&self) -> CoordinatorState {
        self.coordinator.state()
    }

    pub fn passes(&self) -> u64 {
        self.coordinator.passes()
    }

    /// When the pending validation pass is due
    pub fn deadline(&self) -> Option<Instant> {
        self.coordinator.deadline()
    }

    /// Run the pending pass if the debounce window has elapsed
    pub fn poll(&mut self) -> Result<Option<ValidationReport>> {
        self.coordinator.poll(&mut self.graph, now())
    }

    /// Wait out the debounce window and run the pending pass
    pub async fn settle(&mut self) -> Result<Option<ValidationReport>> {
        let mut report = None;
        while let Some(deadline) = self.deadline() {
            tokio::time::sleep_until(deadline.into()).await;
            if let Some(r) = self.poll()? {
                report = Some(r);
            }
        }
        Ok(report)
    }

    /// Validate immediately, dropping any pending pass
    pub fn validate_now(&mut self) -> Result<ValidationReport> {
        self.coordinator.cancel();
        self.coordinator.run_pass(&mut self.graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Field;
    use crate::source::SourceFile;
    use crate::validate::{NAME_REQUIRED, TABLE_REQUIRED};

    fn source(id: &str, columns: &[&str]) -> DataSource {
        DataSource {
            id: id.into(),
            file: SourceFile::named(format!("{id}.csv")),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            sample_row: Vec::new(),
        }
    }

    fn seed(session: &EditorSession) -> EntityId {
        session.graph().entities().next().map(|(id, _)| id.clone()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_session_is_invalid_after_first_pass() {
        let mut session = EditorSession::new(MapperConfig::default());
        let id = seed(&session);
        let entity = RecordRef::entity(id.clone());
        assert_eq!(session.state(), CoordinatorState::Idle);

        session.patch_entity(&id, MappingPatch::default().table(None)).unwrap();
        let report = session.settle().await.unwrap().unwrap();
        assert!(!report.valid);

        let errors = session.errors(&entity).unwrap();
        assert_eq!(errors.get(Field::Name), Some(NAME_REQUIRED));
        assert_eq!(errors.get(Field::Table), Some(TABLE_REQUIRED));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_edit_does_not_arm_timer() {
        let mut session = EditorSession::new(MapperConfig::default());
        let entity = RecordRef::entity(seed(&session));
        assert!(session.set_primary_key(&entity, "missing").is_err());
        assert!(session.bind_table(&entity, "ds-missing").is_err());
        assert_eq!(session.state(), CoordinatorState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_entity_from_creates_relation() {
        let mut session = EditorSession::new(MapperConfig::default());
        let origin = seed(&session);
        session.patch_entity(&origin, MappingPatch::default().name("Gene")).unwrap();

        let (entity, relation, connection) = session.spawn_entity_from(&origin).unwrap();
        assert_eq!(session.graph().entity_count(), 2);
        assert_eq!(session.graph().endpoints(&relation).unwrap(), (&origin, &entity));
        assert_eq!(session.endpoint_labels(&relation, &connection).unwrap(), ("Gene", "Untitled"));

        assert!(session.toggle_reversed(&relation, &connection).unwrap());
        assert_eq!(session.endpoint_labels(&relation, &connection).unwrap(), ("Untitled", "Gene"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bind_table_uses_configured_default_type() {
        let mut config = MapperConfig::default();
        config.properties.default_type = PropertyType::Int;
        let mut session = EditorSession::new(config);
        session.add_data_source(source("ds1", &["a", "b"])).unwrap();

        let entity = RecordRef::entity(seed(&session));
        session.bind_table(&entity, "ds1").unwrap();
        let table = session.property_table(&entity).unwrap();
        assert_eq!(table.selected, 2);
        assert!(table.rows.iter().all(|r| r.property.ty == Some(PropertyType::Int)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_draft_commits_nothing() {
        let mut session = EditorSession::new(MapperConfig::default());
        let entity = RecordRef::entity(seed(&session));

        let draft = session.begin_name(&entity).unwrap();
        assert!(!session.commit_name(&entity, draft).unwrap());
        assert_eq!(session.state(), CoordinatorState::Idle);

        let mut draft = session.begin_name(&entity).unwrap();
        draft.set(Some("Gene".into()));
        assert!(session.commit_name(&entity, draft).unwrap());
        assert_eq!(session.label(&entity).unwrap(), "Gene");
        assert_eq!(session.state(), CoordinatorState::PendingRecheck);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_property_draft_on_removed_property_fails() {
        let mut session = EditorSession::new(MapperConfig::default());
        session.add_data_source(source("ds1", &["a"])).unwrap();
        session.add_data_source(source("ds2", &["b"])).unwrap();
        let entity = RecordRef::entity(seed(&session));
        session.bind_table(&entity, "ds1").unwrap();
        let property = session.property_table(&entity).unwrap().rows[0].id.clone();

        let draft = session.begin_property_name(&entity, &property).unwrap();
        session.bind_table(&entity, "ds2").unwrap();
        let err = session.commit_property_name(&entity, &property, draft).unwrap_err();
        assert!(matches!(err, MapperError::PropertyNotFound(id) if id == property));

        let ghost = RecordRef::entity("ghost");
        let draft = FieldDraft::begin(String::new());
        let err = session.commit_property_name(&ghost, &property, draft).unwrap_err();
        assert!(matches!(err, MapperError::EntityNotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sources_registered_together_reconcile_once() {
        let mut session = EditorSession::new(MapperConfig::default());
        let gene = seed(&session);
        session.add_data_sources([source("ds1", &["a"]), source("ds2", &["b"])]).unwrap();
        let protein = session.create_entity(Entity::named("Protein"));
        session.bind_table(&RecordRef::entity(gene.clone()), "ds1").unwrap();
        session.bind_table(&RecordRef::entity(protein.clone()), "ds2").unwrap();

        // a duplicate aborts registration but the graph is still reconciled
        let err = session
            .add_data_sources([source("ds1", &["a"]), source("ds3", &["c"])])
            .unwrap_err();
        assert!(matches!(err, MapperError::DuplicateDataSource(id) if id == "ds1"));
        assert!(!session.registry().contains("ds3"));
        assert_eq!(session.reconcile(), 0);

        session.remove_data_source("ds2").unwrap();
        let protein = &session.graph().entity(&protein).unwrap().mapping;
        assert_eq!(protein.table, None);
        let gene = &session.graph().entity(&gene).unwrap().mapping;
        assert_eq!(gene.table.as_deref(), Some("ds1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_validate_now_cancels_pending_pass() {
        let mut session = EditorSession::new(MapperConfig::default());
        session.create_entity(Entity::named("Protein"));
        assert!(session.deadline().is_some());

        let report = session.validate_now().unwrap();
        assert_eq!(report.pass, 1);
        assert_eq!(session.deadline(), None);
        assert_eq!(session.settle().await.unwrap(), None);
    }
}
