//! Schema Mapper
//!
//! The editing core of a graph-based schema mapping tool: uploaded CSV
//! files become data sources, entities (graph nodes) and relation
//! connections (sub-records of graph edges) map their columns onto typed
//! properties, and a debounced validator keeps every record's error map
//! and a global validity flag up to date.
//!
//! ## Features
//!
//! - **Data Source Registry**: header line plus one sample row per upload
//! - **Schema Graph Store**: petgraph topology with id-keyed payloads
//! - **Field Validator**: pure per-record rules, all surfaced together
//! - **Validation Coordinator**: cancel-and-restart debounce, then one pass
//! - **Source-Binding Reconciler**: unbinds records whose source was removed
//! - **Exported schema**: fingerprinted snapshot whenever the graph is valid
//!
//! ## Architecture
//!
//! ```text
//! upload ──► source::ingest ──► DataSourceRegistry ──► reconcile
//!                                                         │
//! editor ──► EditorSession ──► SchemaGraph ──► GraphChange ┴─► ValidationCoordinator
//!                                                                   │ (500 ms quiet)
//!                                                                   ▼
//!                                                validate ──► ErrorMap / validity / SchemaSnapshot
//! ```

pub mod checksum;
pub mod config;
pub mod coordinator;
pub mod edit;
pub mod error;
pub mod graph;
pub mod reconcile;
pub mod schema;
pub mod session;
pub mod source;
pub mod validate;

pub use checksum::Checksum;
pub use config::MapperConfig;
pub use coordinator::{CoordinatorState, ValidationCoordinator, ValidationReport};
pub use error::{MapperError, Result};
pub use graph::{GraphChange, RecordRef, SchemaGraph, SchemaSnapshot};
pub use schema::{Connection, Entity, ErrorMap, Field, Mapping, Property, PropertyType};
pub use session::EditorSession;
pub use source::{DataSource, DataSourceRegistry};
