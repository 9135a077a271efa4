//! Exported schema snapshots
//!
//! The snapshot handed to the run-import consumer once the graph is valid:
//! every entity and relation payload plus topology, sorted by id so equal
//! graphs produce equal fingerprints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Relation, SchemaGraph};
use crate::checksum::Checksum;
use crate::error::Result;
use crate::schema::{Entity, EntityId, RelationId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    pub data: Entity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationRecord {
    pub id: RelationId,
    pub source: EntityId,
    pub target: EntityId,
    pub data: Relation,
}

/// Serialized graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub entities: Vec<EntityRecord>,
    pub relations: Vec<RelationRecord>,
    /// Checksum of `entities` and `relations`
    pub fingerprint: Checksum,
    pub captured_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct Body<'a> {
    entities: &'a [EntityRecord],
    relations: &'a [RelationRecord],
}

fn fingerprint(entities: &[EntityRecord], relations: &[RelationRecord]) -> Result<Checksum> {
    Ok(Checksum::of(&Body { entities, relations })?)
}

impl SchemaSnapshot {
    /// Whether the fingerprint still matches the body
    pub fn verify(&self) -> bool {
        self.fingerprint.matches(&Body {
            entities: &self.entities,
            relations: &self.relations,
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl SchemaGraph {
    /// Snapshot topology and payloads
    pub fn export(&self) -> Result<SchemaSnapshot> {
        let mut entities: Vec<EntityRecord> = self
            .entities()
            .map(|(id, entity)| EntityRecord {
                id: id.clone(),
                data: entity.clone(),
            })
            .collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));

        let mut relations = Vec::with_capacity(self.relation_count());
        for (id, relation) in self.relations() {
            let (source, target) = self.endpoints(id)?;
            relations.push(RelationRecord {
                id: id.clone(),
                source: source.clone(),
                target: target.clone(),
                data: relation.clone(),
            });
        }
        relations.sort_by(|a, b| a.id.cmp(&b.id));

        let fingerprint = fingerprint(&entities, &relations)?;
        Ok(SchemaSnapshot {
            entities,
            relations,
            fingerprint,
            captured_at: Utc::now(),
        })
    }

    /// Rebuild a graph from a snapshot, keeping its ids
    pub fn from_snapshot(snapshot: SchemaSnapshot) -> Result<Self> {
        let mut graph = Self::new();
        for record in snapshot.entities {
            graph.insert_entity(record.id, record.data);
        }
        for record in snapshot.relations {
            graph.insert_relation(record.id, &record.source, &record.target, record.data)?;
        }
        Ok(graph)
    }
}
