//! Error types for the schema mapper
//!
//! Incomplete configuration is never an error here: it lives as data in each
//! record's [`ErrorMap`](crate::schema::ErrorMap). These variants cover
//! lookups of ids that do not exist and edits the editor would not offer.

use thiserror::Error;

/// Result type for mapper operations
pub type Result<T> = std::result::Result<T, MapperError>;

/// Schema mapper errors
#[derive(Error, Debug)]
pub enum MapperError {
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Relation not found: {0}")]
    RelationNotFound(String),

    #[error("Connection {connection} not found on relation {relation}")]
    ConnectionNotFound { relation: String, connection: String },

    #[error("Property not found: {0}")]
    PropertyNotFound(String),

    #[error("Data source not found: {0}")]
    DataSourceNotFound(String),

    #[error("Data source already registered: {0}")]
    DuplicateDataSource(String),

    #[error("Property {0} must be selected before it can be the primary key")]
    PrimaryKeyUnchecked(String),

    #[error("Column {0} is not one of the record's properties")]
    UnknownColumn(String),

    #[error("{file}: expected a header line and a sample line")]
    IncompletePreview { file: String },

    #[error("Invalid data source spec {0:?} (expected id=path)")]
    InvalidSourceSpec(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}
