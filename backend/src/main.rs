//! PEItrack CLI - PEI technical-report records over a SharePoint Excel table
//!
//! # Main Commands
//!
//! ```bash
//! peitrack serve                       # Start HTTP server (port 3000)
//! peitrack history 123                 # History records of unit 123
//! peitrack latest 123                  # Most recent record of unit 123
//! peitrack append record.json          # Validate and append a record
//! peitrack update <id> changes.json    # Update the record keyed by IdRegistro
//! ```
//!
//! # Maintenance Commands
//!
//! ```bash
//! peitrack headers --table history     # How live headers resolve
//! peitrack normalize "Periodo PEI "    # Normalized key of a header
//! peitrack migrate-ids --write         # Backfill empty IdRegistro cells
//! ```
//!
//! Every command accepts `--fixture <snapshot.json>` to run against a local
//! table snapshot instead of the live workbook; writes are saved back to it.

use clap::{Parser, Subcommand, ValueEnum};
use peitrack::history::ColumnStatus;
use peitrack::logging::{init_logging, LogConfig, LogFormat};
use peitrack::migrate::{backfill_ids, BackfillOptions};
use peitrack::server::{start_server, AppState};
use peitrack::{normalize, GraphTableClient, Ledger, MemoryTable, Record, SchemaMap, Settings, TableBackend};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "peitrack")]
#[command(about = "Record keeping for PEI technical reports in a SharePoint Excel table", long_about = None)]
struct Cli {
    /// Use a local table snapshot instead of the live workbook
    #[arg(long, global = true)]
    fixture: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Show the history records of one unit
    History {
        /// Unit code (Id_UE)
        codigo: String,
    },

    /// Show the most recent record of one unit
    Latest {
        /// Unit code (Id_UE)
        codigo: String,
    },

    /// Check JSON records against the business rules
    Validate {
        /// Input JSON file (one record or an array of records)
        input: PathBuf,
    },

    /// Validate and append a record to the history table
    Append {
        /// Input JSON file (one record)
        input: PathBuf,
    },

    /// Update the history record keyed by IdRegistro
    Update {
        /// IdRegistro of the row to update
        id: String,
        /// Input JSON file with the fields to change
        input: PathBuf,
    },

    /// List executing units
    Units {
        /// Only units assigned to this officer
        #[arg(short, long)]
        responsable: Option<String>,
    },

    /// Show how the live headers of a table resolve
    Headers {
        /// Which table to inspect
        #[arg(short, long, value_enum, default_value_t = TableChoice::History)]
        table: TableChoice,
    },

    /// Print the normalized key of a header
    Normalize {
        /// Header text
        text: String,
    },

    /// Give every history row without an IdRegistro a fresh one
    MigrateIds {
        /// Write the identifiers (dry run otherwise)
        #[arg(long)]
        write: bool,

        /// Pause between writes, in milliseconds
        #[arg(long, default_value = "150")]
        pause_ms: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TableChoice {
    Units,
    History,
}

/// Store plus the snapshot path to save back to, if any.
struct Backend {
    store: TableBackend,
    fixture: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_verbosity(cli.verbose).with_format(cli.log_format);
    if let Err(e) = init_logging(&log_config) {
        eprintln!("Could not initialise logging: {}", e);
    }

    let result = run(cli).await;

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    // Loads .env as well
    let settings = Settings::from_env()?;

    match cli.command {
        Commands::Normalize { text } => cmd_normalize(&settings, &text),

        Commands::Validate { input } => cmd_validate(&input),

        command => {
            let backend = connect(&settings, cli.fixture).await?;
            let schema = Arc::new(SchemaMap::load(settings.schema_path.as_deref())?);
            let ledger = Ledger::new(backend.store, schema, settings.tables.clone())
                .with_author(settings.updated_by.clone());

            match command {
                Commands::Serve { port } => {
                    let state = match backend.fixture {
                        Some(path) => AppState::new(ledger).with_fixture(path),
                        None => AppState::new(ledger),
                    };
                    start_server(port, state).await
                }
                Commands::History { codigo } => cmd_history(&ledger, &codigo).await,
                Commands::Latest { codigo } => cmd_latest(&ledger, &codigo).await,
                Commands::Append { input } => {
                    cmd_append(&ledger, &input).await?;
                    save_fixture(&ledger, backend.fixture.as_deref())
                }
                Commands::Update { id, input } => {
                    cmd_update(&ledger, &id, &input).await?;
                    save_fixture(&ledger, backend.fixture.as_deref())
                }
                Commands::Units { responsable } => cmd_units(&ledger, responsable.as_deref()).await,
                Commands::Headers { table } => cmd_headers(&ledger, table).await,
                Commands::MigrateIds { write, pause_ms } => {
                    cmd_migrate(&ledger, write, pause_ms).await?;
                    save_fixture(&ledger, backend.fixture.as_deref())
                }
                Commands::Normalize { .. } | Commands::Validate { .. } => Ok(()),
            }
        }
    }
}

async fn connect(settings: &Settings, fixture: Option<PathBuf>) -> Result<Backend, Box<dyn std::error::Error>> {
    match fixture {
        Some(path) => {
            eprintln!("📄 Using fixture: {}", path.display());
            let memory = MemoryTable::from_path(&path)?;
            Ok(Backend {
                store: TableBackend::Memory(memory),
                fixture: Some(path),
            })
        }
        None => {
            let client = GraphTableClient::connect(&settings.graph()?).await?;
            Ok(Backend {
                store: TableBackend::Graph(client),
                fixture: None,
            })
        }
    }
}

fn save_fixture(ledger: &Ledger<TableBackend>, fixture: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    if let (Some(path), Some(memory)) = (fixture, ledger.store().as_memory()) {
        memory.save(path)?;
        eprintln!("💾 Fixture saved to: {}", path.display());
    }
    Ok(())
}

fn read_json(input: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(input)?;
    Ok(serde_json::from_str(&content)?)
}

fn read_record(input: &Path) -> Result<Record, Box<dyn std::error::Error>> {
    Ok(serde_json::from_value(read_json(input)?)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_normalize(settings: &Settings, text: &str) -> Result<(), Box<dyn std::error::Error>> {
    let schema = SchemaMap::load(settings.schema_path.as_deref())?;
    let key = normalize(text);
    match schema.resolve_internal(&key) {
        Some(field) => println!("{} -> {}", key, field),
        None => println!("{} (no alias)", key),
    }
    Ok(())
}

fn cmd_validate(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("✔️  Validating: {}", input.display());

    let records: Vec<Record> = match read_json(input)? {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()?,
        other => vec![serde_json::from_value(other)?],
    };

    let mut valid = 0;
    let mut invalid = 0;

    for (i, record) in records.iter().enumerate() {
        let errors = peitrack::validate(record);
        if errors.is_empty() {
            valid += 1;
        } else {
            invalid += 1;
            eprintln!("\n❌ Record {} invalid:", i);
            for err in &errors {
                eprintln!("   - {}", err);
            }
        }
    }

    eprintln!("\n📊 Results: {} valid, {} invalid", valid, invalid);

    if invalid > 0 {
        std::process::exit(1);
    }

    Ok(())
}

async fn cmd_history(ledger: &Ledger<TableBackend>, codigo: &str) -> Result<(), Box<dyn std::error::Error>> {
    let records = ledger.history(codigo).await?;
    eprintln!("📋 {} records for unit {}", records.len(), codigo);
    print_json(&records)
}

async fn cmd_latest(ledger: &Ledger<TableBackend>, codigo: &str) -> Result<(), Box<dyn std::error::Error>> {
    match ledger.latest(codigo).await? {
        Some(record) => print_json(&record),
        None => Err(format!("No history for unit {}", codigo).into()),
    }
}

async fn cmd_append(ledger: &Ledger<TableBackend>, input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let record = read_record(input)?;
    let written = ledger.submit(record).await?;
    eprintln!("✅ Appended record {}", written.text(peitrack::Field::IdRegistro));
    print_json(&written)
}

async fn cmd_update(ledger: &Ledger<TableBackend>, id: &str, input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let updates = read_record(input)?;
    let row = ledger.update(id, updates).await?;
    eprintln!("✅ Updated {} (row {})", id, row);
    Ok(())
}

async fn cmd_units(ledger: &Ledger<TableBackend>, responsable: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let directory = ledger.directory().await?;
    let units = match responsable {
        Some(name) => directory.units_for(name),
        None => directory.units().iter().collect(),
    };

    eprintln!("📋 {} units\n", units.len());
    for unit in units {
        println!("  {}", unit.label());
        if !unit.responsable.is_empty() {
            println!("     Responsable: {}", unit.responsable);
        }
        let options = unit.articulacion_options();
        if !options.is_empty() {
            println!("     Articulación: {}", options.join(", "));
        }
    }
    Ok(())
}

async fn cmd_headers(ledger: &Ledger<TableBackend>, table: TableChoice) -> Result<(), Box<dyn std::error::Error>> {
    let name = match table {
        TableChoice::Units => ledger.tables().units.clone(),
        TableChoice::History => ledger.tables().history.clone(),
    };
    let report = ledger.header_report(&name).await?;

    eprintln!("📋 Columns of {} ({}):\n", name, report.len());
    for column in report {
        let status = match &column.status {
            ColumnStatus::Resolved(field) => format!("-> {}", field),
            ColumnStatus::Duplicate(field) => format!("duplicate of {} (ignored)", field),
            ColumnStatus::Placeholder => "placeholder (dropped)".to_string(),
            ColumnStatus::Unresolved => "no alias (dropped)".to_string(),
        };
        println!("  {:>3}  {:<40} {:<35} {}", column.position, column.header, column.key.as_str(), status);
    }
    Ok(())
}

async fn cmd_migrate(ledger: &Ledger<TableBackend>, write: bool, pause_ms: u64) -> Result<(), Box<dyn std::error::Error>> {
    let options = BackfillOptions {
        dry_run: !write,
        pause: Duration::from_millis(pause_ms),
        ..BackfillOptions::default()
    };
    let report = backfill_ids(ledger.store(), &ledger.tables().history, ledger.schema(), &options).await?;

    eprintln!("\n📊 Rows: {}", report.total_rows);
    eprintln!("   Missing IdRegistro: {}", report.missing);
    if report.dry_run {
        eprintln!("   Dry run, nothing written. Re-run with --write to apply.");
    } else {
        eprintln!("   Written: {}", report.written);
    }
    print_json(&report)
}
