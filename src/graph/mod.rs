//! Schema Graph Store
//!
//! Entities are nodes and relations are edges of a petgraph `StableDiGraph`;
//! payloads live in id-keyed maps next to it, with index maps for O(1)
//! lookup. Every mutation returns the [`GraphChange`]s it caused so the
//! session can notify the validation coordinator.
//!
//! Topology (which entities an edge joins) is owned by the diagram layer;
//! the store only records it.

pub mod connections;
pub mod export;

pub use connections::{ConnectionSet, Relation};
pub use export::{EntityRecord, RelationRecord, SchemaSnapshot};

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

use crate::error::{MapperError, Result};
use crate::schema::{
    new_id, Connection, ConnectionId, ConnectionPatch, Entity, EntityId, Mapping, MappingPatch,
    RelationId,
};

/// A structural or payload change to the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphChange {
    EntityCreated(EntityId),
    EntityUpdated(EntityId),
    EntityDeleted(EntityId),
    RelationCreated(RelationId),
    RelationDeleted(RelationId),
    ConnectionAdded { relation: RelationId, connection: ConnectionId },
    ConnectionUpdated { relation: RelationId, connection: ConnectionId },
    ConnectionRemoved { relation: RelationId, connection: ConnectionId },
}

/// Address of one mapping record: an entity or a connection of a relation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordRef {
    Entity(EntityId),
    Connection { relation: RelationId, connection: ConnectionId },
}

impl RecordRef {
    pub fn entity(id: impl Into<EntityId>) -> Self {
        Self::Entity(id.into())
    }

    pub fn connection(
        relation: impl Into<RelationId>,
        connection: impl Into<ConnectionId>,
    ) -> Self {
        Self::Connection {
            relation: relation.into(),
            connection: connection.into(),
        }
    }

    /// The change reported when this record's payload is edited
    pub fn updated(&self) -> GraphChange {
        match self {
            Self::Entity(id) => GraphChange::EntityUpdated(id.clone()),
            Self::Connection { relation, connection } => GraphChange::ConnectionUpdated {
                relation: relation.clone(),
                connection: connection.clone(),
            },
        }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(id) => write!(f, "entity:{}", id),
            Self::Connection { relation, connection } => {
                write!(f, "connection:{}:{}", relation, connection)
            }
        }
    }
}

/// The mutable entity/relation graph of one editing session
#[derive(Debug, Default)]
pub struct SchemaGraph {
    /// Topology: node weights are entity ids, edge weights relation ids
    pub(crate) graph: StableDiGraph<EntityId, RelationId>,

    pub(crate) entities: HashMap<EntityId, Entity>,

    pub(crate) relations: HashMap<RelationId, Relation>,

    pub(crate) node_indices: HashMap<EntityId, NodeIndex>,

    pub(crate) edge_indices: HashMap<RelationId, EdgeIndex>,
}

impl SchemaGraph {
    /// An empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// The graph a new session starts from: one unconfigured entity
    pub fn seeded() -> (Self, EntityId) {
        let mut graph = Self::new();
        let (id, _) = graph.create_entity(Entity::new());
        (graph, id)
    }

    // ========== Read accessors ==========

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    pub fn entity(&self, id: &str) -> Result<&Entity> {
        self.entities
            .get(id)
            .ok_or_else(|| MapperError::EntityNotFound(id.to_string()))
    }

    pub fn relation(&self, id: &str) -> Result<&Relation> {
        self.relations
            .get(id)
            .ok_or_else(|| MapperError::RelationNotFound(id.to_string()))
    }

    pub fn connection(&self, relation: &str, connection: &str) -> Result<&Connection> {
        self.relation(relation)?
            .connections
            .get(connection)
            .ok_or_else(|| MapperError::ConnectionNotFound {
                relation: relation.to_string(),
                connection: connection.to_string(),
            })
    }

    pub fn contains_entity(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn contains_relation(&self, id: &str) -> bool {
        self.relations.contains_key(id)
    }

    /// Entities in node index order
    pub fn entities(&self) -> impl Iterator<Item = (&EntityId, &Entity)> {
        self.graph
            .node_indices()
            .filter_map(|idx| self.graph.node_weight(idx))
            .filter_map(|id| self.entities.get_key_value(id))
    }

    /// Relations in edge index order
    pub fn relations(&self) -> impl Iterator<Item = (&RelationId, &Relation)> {
        self.graph
            .edge_indices()
            .filter_map(|idx| self.graph.edge_weight(idx))
            .filter_map(|id| self.relations.get_key_value(id))
    }

    /// Source and target entity of a relation
    pub fn endpoints(&self, relation: &str) -> Result<(&EntityId, &EntityId)> {
        let idx = self
            .edge_indices
            .get(relation)
            .ok_or_else(|| MapperError::RelationNotFound(relation.to_string()))?;
        let (source, target) = self
            .graph
            .edge_endpoints(*idx)
            .ok_or_else(|| MapperError::RelationNotFound(relation.to_string()))?;
        match (self.graph.node_weight(source), self.graph.node_weight(target)) {
            (Some(s), Some(t)) => Ok((s, t)),
            _ => Err(MapperError::RelationNotFound(relation.to_string())),
        }
    }

    /// Relations touching an entity, either direction
    pub fn incident_relations(&self, entity: &str) -> Vec<&RelationId> {
        let Some(&idx) = self.node_indices.get(entity) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .chain(self.graph.edges_directed(idx, Direction::Incoming))
            .filter(|e| seen.insert(e.id()))
            .map(|e| e.weight())
            .collect()
    }

    /// Labels of the entities a connection's source/target columns refer to,
    /// swapped when the connection is reversed
    pub fn endpoint_labels(&self, relation: &str, connection: &str) -> Result<(&str, &str)> {
        let reversed = self.connection(relation, connection)?.reversed;
        let (source, target) = self.endpoints(relation)?;
        let source = self.entity(source)?.mapping.label();
        let target = self.entity(target)?.mapping.label();
        Ok(if reversed { (target, source) } else { (source, target) })
    }

    pub fn mapping(&self, record: &RecordRef) -> Result<&Mapping> {
        match record {
            RecordRef::Entity(id) => Ok(&self.entity(id)?.mapping),
            RecordRef::Connection { relation, connection } => {
                Ok(&self.connection(relation, connection)?.mapping)
            }
        }
    }

    /// Every record address currently in the graph
    pub fn records(&self) -> Vec<RecordRef> {
        let entities = self.entities().map(|(id, _)| RecordRef::entity(id.clone()));
        let connections = self.relations().flat_map(|(rid, relation)| {
            relation
                .connections
                .ids()
                .map(move |cid| RecordRef::connection(rid.clone(), cid.clone()))
        });
        entities.chain(connections).collect()
    }

    // ========== Structural mutations ==========

    /// Add an entity under a fresh id
    pub fn create_entity(&mut self, entity: Entity) -> (EntityId, GraphChange) {
        let id = new_id();
        let change = self.insert_entity(id.clone(), entity);
        (id, change)
    }

    pub(crate) fn insert_entity(&mut self, id: EntityId, entity: Entity) -> GraphChange {
        if let Some(&idx) = self.node_indices.get(&id) {
            debug_assert!(self.graph.contains_node(idx));
        } else {
            let idx = self.graph.add_node(id.clone());
            self.node_indices.insert(id.clone(), idx);
        }
        self.entities.insert(id.clone(), entity);
        debug!(entity = %id, "entity created");
        GraphChange::EntityCreated(id)
    }

    /// Add a relation from `source` to `target` carrying one connection
    pub fn create_relation(
        &mut self,
        source: &str,
        target: &str,
        connection: Connection,
    ) -> Result<(RelationId, ConnectionId, GraphChange)> {
        let relation_id = new_id();
        let connection_id = new_id();
        let relation = Relation::new(connection_id.clone(), connection);
        let change = self.insert_relation(relation_id.clone(), source, target, relation)?;
        Ok((relation_id, connection_id, change))
    }

    pub(crate) fn insert_relation(
        &mut self,
        id: RelationId,
        source: &str,
        target: &str,
        relation: Relation,
    ) -> Result<GraphChange> {
        let source_idx = *self
            .node_indices
            .get(source)
            .ok_or_else(|| MapperError::EntityNotFound(source.to_string()))?;
        let target_idx = *self
            .node_indices
            .get(target)
            .ok_or_else(|| MapperError::EntityNotFound(target.to_string()))?;

        if let Some(old) = self.edge_indices.remove(&id) {
            self.graph.remove_edge(old);
        }
        let idx = self.graph.add_edge(source_idx, target_idx, id.clone());
        self.edge_indices.insert(id.clone(), idx);
        self.relations.insert(id.clone(), relation);
        debug!(relation = %id, source, target, "relation created");
        Ok(GraphChange::RelationCreated(id))
    }

    /// Delete an entity and every relation touching it
    pub fn delete_entity(&mut self, id: &str) -> Result<Vec<GraphChange>> {
        let idx = *self
            .node_indices
            .get(id)
            .ok_or_else(|| MapperError::EntityNotFound(id.to_string()))?;

        let incident: Vec<RelationId> = self.incident_relations(id).into_iter().cloned().collect();
        let mut changes = Vec::with_capacity(incident.len() + 1);
        for relation in incident {
            changes.push(self.delete_relation(&relation)?);
        }

        self.graph.remove_node(idx);
        self.node_indices.remove(id);
        self.entities.remove(id);
        debug!(entity = id, "entity deleted");
        changes.push(GraphChange::EntityDeleted(id.to_string()));
        Ok(changes)
    }

    pub fn delete_relation(&mut self, id: &str) -> Result<GraphChange> {
        let idx = self
            .edge_indices
            .remove(id)
            .ok_or_else(|| MapperError::RelationNotFound(id.to_string()))?;
        self.graph.remove_edge(idx);
        self.relations.remove(id);
        debug!(relation = id, "relation deleted");
        Ok(GraphChange::RelationDeleted(id.to_string()))
    }

    // ========== Connection set ==========

    /// Add a connection to an existing relation under a fresh id
    pub fn add_connection(
        &mut self,
        relation: &str,
        connection: Connection,
    ) -> Result<(ConnectionId, GraphChange)> {
        let id = new_id();
        let rel = self
            .relations
            .get_mut(relation)
            .ok_or_else(|| MapperError::RelationNotFound(relation.to_string()))?;
        rel.connections.insert(id.clone(), connection);
        debug!(relation, connection = %id, "connection added");
        Ok((
            id.clone(),
            GraphChange::ConnectionAdded {
                relation: relation.to_string(),
                connection: id,
            },
        ))
    }

    /// Remove a connection; removing the last one deletes the relation
    pub fn remove_connection(&mut self, relation: &str, connection: &str) -> Result<GraphChange> {
        let rel = self
            .relations
            .get_mut(relation)
            .ok_or_else(|| MapperError::RelationNotFound(relation.to_string()))?;
        if !rel.connections.contains(connection) {
            return Err(MapperError::ConnectionNotFound {
                relation: relation.to_string(),
                connection: connection.to_string(),
            });
        }
        if rel.connections.len() == 1 {
            return self.delete_relation(relation);
        }
        rel.connections.remove(connection);
        debug!(relation, connection, "connection removed");
        Ok(GraphChange::ConnectionRemoved {
            relation: relation.to_string(),
            connection: connection.to_string(),
        })
    }

    // ========== Payload mutations ==========

    pub fn patch_entity(&mut self, id: &str, patch: MappingPatch) -> Result<GraphChange> {
        let entity = self
            .entities
            .get_mut(id)
            .ok_or_else(|| MapperError::EntityNotFound(id.to_string()))?;
        patch.apply(&mut entity.mapping);
        debug!(entity = id, "entity patched");
        Ok(GraphChange::EntityUpdated(id.to_string()))
    }

    pub fn patch_connection(
        &mut self,
        relation: &str,
        connection: &str,
        patch: ConnectionPatch,
    ) -> Result<GraphChange> {
        let record = RecordRef::connection(relation, connection);
        self.update_connection(relation, connection, |c| {
            patch.apply(c);
            Ok(())
        })?;
        Ok(record.updated())
    }

    /// Apply `edit` to one connection
    pub fn update_connection<F>(
        &mut self,
        relation: &str,
        connection: &str,
        edit: F,
    ) -> Result<GraphChange>
    where
        F: FnOnce(&mut Connection) -> Result<()>,
    {
        let target = self.connection_mut(relation, connection)?;
        edit(target)?;
        debug!(relation, connection, "connection updated");
        Ok(GraphChange::ConnectionUpdated {
            relation: relation.to_string(),
            connection: connection.to_string(),
        })
    }

    /// Apply `edit` to the mapping fields of any record
    pub fn update_mapping<F>(&mut self, record: &RecordRef, edit: F) -> Result<GraphChange>
    where
        F: FnOnce(&mut Mapping) -> Result<()>,
    {
        edit(self.mapping_mut(record)?)?;
        debug!(%record, "record updated");
        Ok(record.updated())
    }

    pub(crate) fn mapping_mut(&mut self, record: &RecordRef) -> Result<&mut Mapping> {
        match record {
            RecordRef::Entity(id) => self
                .entities
                .get_mut(id)
                .map(|e| &mut e.mapping)
                .ok_or_else(|| MapperError::EntityNotFound(id.clone())),
            RecordRef::Connection { relation, connection } => {
                Ok(&mut self.connection_mut(relation, connection)?.mapping)
            }
        }
    }

    fn connection_mut(&mut self, relation: &str, connection: &str) -> Result<&mut Connection> {
        self.relations
            .get_mut(relation)
            .ok_or_else(|| MapperError::RelationNotFound(relation.to_string()))?
            .connections
            .get_mut(connection)
            .ok_or_else(|| MapperError::ConnectionNotFound {
                relation: relation.to_string(),
                connection: connection.to_string(),
            })
    }

    pub(crate) fn entities_mut(&mut self) -> impl Iterator<Item = (&EntityId, &mut Entity)> {
        self.entities.iter_mut()
    }

    pub(crate) fn connections_mut(
        &mut self,
    ) -> impl Iterator<Item = (&RelationId, &ConnectionId, &mut Connection)> {
        self.relations.iter_mut().flat_map(|(rid, relation)| {
            relation
                .connections
                .iter_mut()
                .map(move |(cid, connection)| (rid, cid, connection))
        })
    }
}
