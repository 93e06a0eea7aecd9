//! # PEItrack - PEI technical-report records over a SharePoint Excel table
//!
//! PEItrack keeps the history of PEI technical reports in an Excel table
//! that lives in a SharePoint drive. The table's headers are edited by hand
//! (accents, stray spaces, renamed columns), so every read and write goes
//! through a reconciliation layer that maps live headers to stable field
//! names.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Excel table │────▶│  TableStore │────▶│ SchemaMap + │────▶│   Records   │
//! │ (SharePoint)│◀────│ (Graph/mem) │◀────│   adapter   │◀────│ (validated) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use peitrack::{GraphTableClient, Ledger, SchemaMap, Settings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::from_env()?;
//!     let store = GraphTableClient::connect(&settings.graph()?).await?;
//!     let schema = Arc::new(SchemaMap::load(settings.schema_path.as_deref())?);
//!     let ledger = Ledger::new(store, schema, settings.tables.clone());
//!     println!("{:?}", ledger.latest("123").await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Cells, field names, records, tables
//! - [`schema`] - Key normalization and the alias table
//! - [`table`] - Remote table store (Graph and in-memory)
//! - [`history`] - Read-path header reconciliation
//! - [`writer`] - Append and update-by-key
//! - [`validation`] - Business rules
//! - [`form`] - Choice lists and form drafts
//! - [`directory`] - Executing units and responsible officers
//! - [`ledger`] - The flows the form and CLI drive
//! - [`migrate`] - Update-key backfill
//! - [`config`] - Environment settings
//! - [`logging`] - Tracing subscriber setup
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Reconciliation
pub mod schema;
pub mod history;
pub mod writer;

// Remote store
pub mod table;

// Business rules
pub mod validation;
pub mod form;
pub mod directory;

// Orchestration
pub mod ledger;
pub mod migrate;

// Settings
pub mod config;
pub mod logging;

// HTTP API
pub mod api;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError,
    LedgerError,
    SchemaError,
    ServerError,
    TransportError,
    ValidationError,
    WriteError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    Cell,
    Coercion,
    Field,
    FieldName,
    Record,
    RemoteTable,
};

// =============================================================================
// Re-exports - Schema
// =============================================================================

pub use schema::{
    normalize,
    FieldAlias,
    NormalizedKey,
    SchemaDocument,
    SchemaMap,
    IDENTIFIER_FIELD,
    UPDATE_KEY_HEADER,
};

// =============================================================================
// Re-exports - Read and write paths
// =============================================================================

pub use history::{history_for, latest, ColumnStatus, HeaderResolution, HistoryAdapter};
pub use writer::{RecordWriter, RowPatch};

// =============================================================================
// Re-exports - Stores
// =============================================================================

pub use table::{GraphTableClient, MemoryTable, TableBackend, TableStore};

// =============================================================================
// Re-exports - Validation and form
// =============================================================================

pub use validation::{ensure_valid, is_valid, validate};
pub use form::{FormDraft, Estado, Vigencia, TipoPei, EtapaRevision};
pub use directory::{Unit, UnitDirectory};

// =============================================================================
// Re-exports - Orchestration
// =============================================================================

pub use ledger::Ledger;
pub use migrate::{backfill_ids, BackfillOptions, BackfillReport};
pub use config::{GraphSettings, Settings, TableNames};

// Server
pub mod server {
    pub use crate::api::server::{start_server, AppState};
}
