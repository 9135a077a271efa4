//! Connection sets carried by relation edges
//!
//! A relation is an ordered, non-empty map from connection id to
//! [`Connection`]. Only [`SchemaGraph`](super::SchemaGraph) removes entries,
//! so it can delete the edge instead of emptying the set.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::schema::{Connection, ConnectionId};

/// Ordered map of connections, never empty once built
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSet {
    entries: Vec<(ConnectionId, Connection)>,
}

impl ConnectionSet {
    /// A set holding one connection
    pub fn single(id: ConnectionId, connection: Connection) -> Self {
        Self {
            entries: vec![(id, connection)],
        }
    }

    pub fn get(&self, id: &str) -> Option<&Connection> {
        self.entries.iter().find(|(cid, _)| cid == id).map(|(_, c)| c)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Connection> {
        self.entries.iter_mut().find(|(cid, _)| cid == id).map(|(_, c)| c)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ConnectionId> {
        self.entries.iter().map(|(id, _)| id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConnectionId, &Connection)> {
        self.entries.iter().map(|(id, c)| (id, c))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ConnectionId, &mut Connection)> {
        self.entries.iter_mut().map(|(id, c)| (&*id, c))
    }

    /// Append a connection, replacing an existing entry with the same id in place
    pub(crate) fn insert(&mut self, id: ConnectionId, connection: Connection) {
        match self.get_mut(&id) {
            Some(existing) => *existing = connection,
            None => self.entries.push((id, connection)),
        }
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<Connection> {
        let pos = self.entries.iter().position(|(cid, _)| cid == id)?;
        Some(self.entries.remove(pos).1)
    }
}

/// Graph edge payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Relation {
    pub connections: ConnectionSet,
}

impl Relation {
    pub fn new(id: ConnectionId, connection: Connection) -> Self {
        Self {
            connections: ConnectionSet::single(id, connection),
        }
    }

    pub fn has_error(&self) -> bool {
        self.connections.iter().any(|(_, c)| c.mapping.has_error())
    }
}

impl Serialize for ConnectionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, connection) in &self.entries {
            map.serialize_entry(id, connection)?;
        }
        map.end()
    }
}

struct ConnectionSetVisitor;

impl<'de> Visitor<'de> for ConnectionSetVisitor {
    type Value = ConnectionSet;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a non-empty map of connection id to connection")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut set = ConnectionSet {
            entries: Vec::with_capacity(access.size_hint().unwrap_or(1)),
        };
        while let Some((id, connection)) = access.next_entry::<ConnectionId, Connection>()? {
            set.insert(id, connection);
        }
        if set.is_empty() {
            return Err(serde::de::Error::invalid_length(0, &self));
        }
        Ok(set)
    }
}

impl<'de> Deserialize<'de> for ConnectionSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ConnectionSetVisitor)
    }
}
