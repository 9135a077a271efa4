//! Schema Mapper CLI
//!
//! Inspect CSV previews, check an exported schema against data files, and
//! manage configuration.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use schema_mapper::graph::{RecordRef, SchemaSnapshot};
use schema_mapper::source::{ingest_file, SourceSpec};
use schema_mapper::{EditorSession, MapperConfig};

#[derive(Parser)]
#[command(name = "schema-mapper")]
#[command(about = "Map CSV data sources onto a typed entity/relation schema")]
struct Cli {
    /// Config file to load (optional)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the columns and first row of CSV files
    Inspect {
        /// Files to read
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Validate an exported schema against its data sources
    Check {
        /// Exported schema (JSON)
        #[arg(short, long)]
        schema: PathBuf,

        /// Data source as id=path; repeat for each source
        #[arg(long = "source")]
        sources: Vec<SourceSpec>,

        /// Write the re-exported schema here when it is valid
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// View and manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Initialize a new config file
    Init {
        /// Output path
        #[arg(short, long, default_value = "mapper.toml")]
        output: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns false when the checked schema is invalid
async fn run(cli: Cli) -> Result<bool> {
    let config = MapperConfig::load_from(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Inspect { files } => {
            for path in files {
                let source = ingest_file(&path, &config.ingest)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?;
                println!("📄 {} ({} columns)", source.file.name, source.columns.len());
                for (col, sample) in source.preview() {
                    println!("  {:<24} {}", col, sample);
                }
                println!();
            }
            Ok(true)
        }

        Commands::Check {
            schema,
            sources,
            output,
        } => check(config, schema, sources, output).await,

        Commands::Config { command } => {
            match command {
                ConfigCommands::Show { json } => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&config)?);
                    } else {
                        println!("{}", toml::to_string_pretty(&config)?);
                    }
                }
                ConfigCommands::Init { output } => {
                    MapperConfig::default().save(&output)?;
                    println!("✅ Created config file: {}", output);
                }
            }
            Ok(true)
        }
    }
}

async fn check(
    config: MapperConfig,
    schema: PathBuf,
    sources: Vec<SourceSpec>,
    output: Option<PathBuf>,
) -> Result<bool> {
    let json = std::fs::read_to_string(&schema)
        .with_context(|| format!("reading {}", schema.display()))?;
    let snapshot = SchemaSnapshot::from_json(&json)?;
    if !snapshot.verify() {
        println!("⚠️  Fingerprint mismatch: {} was edited after export", schema.display());
    }
    let mut registered = Vec::with_capacity(sources.len());
    for spec in sources {
        let mut source = ingest_file(&spec.path, &config.ingest)
            .await
            .with_context(|| format!("reading {}", spec.path.display()))?;
        source.id = spec.id;
        registered.push(source);
    }

    // every source is registered before records bound elsewhere are unbound
    let mut session = EditorSession::restore(config, snapshot, registered)?;
    let report = session.validate_now()?;

    for record in session.graph().records() {
        let errors = session.errors(&record)?;
        let label = match &record {
            RecordRef::Entity(_) => session.label(&record)?.to_string(),
            RecordRef::Connection { relation, connection } => {
                let (source, target) = session.endpoint_labels(relation, connection)?;
                format!("{} ({} -> {})", session.label(&record)?, source, target)
            }
        };

        if errors.has_error() {
            println!("❌ {}", label);
            for (field, message) in errors.messages() {
                println!("   └─ {}: {}", field, message);
            }
        } else {
            println!("✅ {}", label);
        }
    }

    println!();
    if report.valid {
        println!("✅ Schema is valid");
        if let (Some(path), Some(snapshot)) = (output, session.schema()) {
            std::fs::write(&path, snapshot.to_json()?)?;
            println!("   Exported to {}", path.display());
        }
    } else {
        println!(
            "❌ Schema is invalid: {} entities and {} connections need attention",
            report.entities_with_errors, report.connections_with_errors
        );
    }
    Ok(report.valid)
}
