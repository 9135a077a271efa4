//! Re-checking an exported schema against data files on disk

use std::path::{Path, PathBuf};

use schema_mapper::config::IngestConfig;
use schema_mapper::graph::RecordRef;
use schema_mapper::schema::{Field, MappingPatch};
use schema_mapper::source::{ingest_file, DataSource};
use schema_mapper::validate::TABLE_REQUIRED;
use schema_mapper::{EditorSession, MapperConfig, SchemaSnapshot};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    genes: PathBuf,
    proteins: PathBuf,
    schema: PathBuf,
    gene: String,
    protein: String,
}

async fn load(id: &str, path: &Path) -> DataSource {
    let mut source = ingest_file(path, &IngestConfig::default()).await.unwrap();
    source.id = id.to_string();
    source
}

fn complete(session: &mut EditorSession, id: &str, name: &str, table: &str) {
    let record = RecordRef::entity(id);
    session.patch_entity(id, MappingPatch::default().name(name)).unwrap();
    session.bind_table(&record, table).unwrap();
    let key = session
        .property_table(&record)
        .unwrap()
        .rows
        .iter()
        .find(|row| row.property.col == "id")
        .map(|row| row.id.clone())
        .unwrap();
    session.set_primary_key(&record, &key).unwrap();
}

/// A valid two-entity schema bound to two sources, exported to disk
async fn exported_schema() -> Fixture {
    let dir = TempDir::new().unwrap();
    let genes = dir.path().join("genes.csv");
    let proteins = dir.path().join("proteins.csv");
    std::fs::write(&genes, "id,symbol\nENSG01,BRCA1\n").unwrap();
    std::fs::write(&proteins, "id,length\nP38398,1863\n").unwrap();

    let mut session = EditorSession::new(MapperConfig::default());
    let gene = session.graph().entities().next().map(|(id, _)| id.clone()).unwrap();
    session
        .add_data_sources([load("ds1", &genes).await, load("ds2", &proteins).await])
        .unwrap();
    complete(&mut session, &gene, "Gene", "ds1");
    let protein = session.create_entity(Default::default());
    complete(&mut session, &protein, "Protein", "ds2");
    assert!(session.validate_now().unwrap().valid);

    let schema = dir.path().join("schema.json");
    std::fs::write(&schema, session.schema().unwrap().to_json().unwrap()).unwrap();

    Fixture {
        _dir: dir,
        genes,
        proteins,
        schema,
        gene,
        protein,
    }
}

fn read_schema(path: &Path) -> SchemaSnapshot {
    SchemaSnapshot::from_json(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn table_of<'a>(session: &'a EditorSession, id: &str) -> Option<&'a str> {
    session.graph().entity(id).unwrap().mapping.table.as_deref()
}

#[tokio::test]
async fn test_schema_over_two_sources_stays_valid() {
    let fx = exported_schema().await;
    let sources = vec![load("ds1", &fx.genes).await, load("ds2", &fx.proteins).await];

    let mut session =
        EditorSession::restore(MapperConfig::default(), read_schema(&fx.schema), sources).unwrap();
    let report = session.validate_now().unwrap();

    assert!(report.valid, "{report:?}");
    assert_eq!(table_of(&session, &fx.gene), Some("ds1"));
    assert_eq!(table_of(&session, &fx.protein), Some("ds2"));
    assert!(session.schema().unwrap().verify());
}

#[tokio::test]
async fn test_omitted_source_unbinds_its_records() {
    let fx = exported_schema().await;
    let sources = vec![load("ds1", &fx.genes).await];

    let mut session =
        EditorSession::restore(MapperConfig::default(), read_schema(&fx.schema), sources).unwrap();
    let report = session.validate_now().unwrap();

    assert!(!report.valid);
    assert_eq!(report.entities_with_errors, 1);
    assert_eq!(table_of(&session, &fx.gene), Some("ds1"));

    let protein = &session.graph().entity(&fx.protein).unwrap().mapping;
    assert_eq!(protein.table, None);
    assert_eq!(protein.primary_key, None);
    assert!(protein.properties.is_empty());
    assert_eq!(protein.error.get(Field::Table), Some(TABLE_REQUIRED));
}

#[tokio::test]
async fn test_no_sources_unbinds_everything() {
    let fx = exported_schema().await;

    let mut session =
        EditorSession::restore(MapperConfig::default(), read_schema(&fx.schema), Vec::new())
            .unwrap();
    let report = session.validate_now().unwrap();

    assert!(!report.valid);
    assert_eq!(report.entities_with_errors, 2);
    assert_eq!(table_of(&session, &fx.gene), None);
    assert_eq!(table_of(&session, &fx.protein), None);
    assert!(session.schema().is_none());
}
