//! Data Source Registry
//!
//! Holds the uploaded tabular sources in commit order. A source is the
//! header line and first data line of one file; nothing else is read.

pub mod ingest;

pub use ingest::{ingest_file, parse_preview, read_preview, SourcePreview};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

use crate::error::{MapperError, Result};

/// Identifier of a data source
pub type DataSourceId = String;

/// Opaque handle on the file a source was read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Display name (file name without directories)
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl SourceFile {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            path: Some(path),
        }
    }
}

/// One uploaded tabular source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    pub id: DataSourceId,
    pub file: SourceFile,
    pub columns: Vec<String>,
    /// `sample_row[i]` is the first value of `columns[i]`
    pub sample_row: Vec<String>,
}

impl DataSource {
    pub fn new(id: impl Into<DataSourceId>, file: SourceFile, preview: SourcePreview) -> Self {
        Self {
            id: id.into(),
            file,
            columns: preview.columns,
            sample_row: preview.sample_row,
        }
    }

    /// Column/sample pairs; a short sample row yields empty cells
    pub fn preview(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().enumerate().map(|(i, col)| {
            let sample = self.sample_row.get(i).map(String::as_str).unwrap_or("");
            (col.as_str(), sample)
        })
    }
}

/// `id=path` pair naming a file to register under a fixed id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub id: DataSourceId,
    pub path: PathBuf,
}

impl FromStr for SourceSpec {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('=') {
            Some((id, path)) if !id.is_empty() && !path.is_empty() => Ok(Self {
                id: id.to_string(),
                path: PathBuf::from(path),
            }),
            _ => Err(MapperError::InvalidSourceSpec(s.to_string())),
        }
    }
}

/// Change to the registry's set of sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryChange {
    Added(DataSourceId),
    Removed(DataSourceId),
}

/// The set of uploaded sources, in the order they were committed
#[derive(Debug, Default)]
pub struct DataSourceRegistry {
    sources: Vec<DataSource>,
}

impl DataSourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source
    pub fn add(&mut self, source: DataSource) -> Result<RegistryChange> {
        if self.contains(&source.id) {
            return Err(MapperError::DuplicateDataSource(source.id));
        }
        info!(
            id = %source.id,
            file = %source.file.name,
            columns = source.columns.len(),
            "data source added"
        );
        let id = source.id.clone();
        self.sources.push(source);
        Ok(RegistryChange::Added(id))
    }

    /// Remove a source by id
    pub fn remove(&mut self, id: &str) -> Result<(DataSource, RegistryChange)> {
        let pos = self
            .sources
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| MapperError::DataSourceNotFound(id.to_string()))?;
        let source = self.sources.remove(pos);
        info!(id = %source.id, file = %source.file.name, "data source removed");
        Ok((source, RegistryChange::Removed(id.to_string())))
    }

    pub fn get(&self, id: &str) -> Option<&DataSource> {
        self.sources.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> HashSet<&str> {
        self.sources.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataSource> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
