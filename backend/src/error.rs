//! Error types for the record-keeping core.
//!
//! This module defines one error type per concern:
//!
//! - [`TransportError`] - Remote table calls (network, HTTP status, payload shape)
//! - [`SchemaError`] - Header/alias reconciliation failures
//! - [`WriteError`] - Append and update-by-identifier failures
//! - [`ValidationError`] - Business-rule rejection of a candidate record
//! - [`ConfigError`] - Environment configuration problems
//! - [`LedgerError`] - Top-level orchestration errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries. Every message carries
//! the underlying cause, since header drift is the expected failure mode.

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors from the remote tabular store.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request never produced a response (network, DNS, timeout).
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// The store answered with a non-success status.
    #[error("HTTP {status} from {url}: {body}")]
    Http { url: String, status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("Unexpected response from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    /// The named table does not exist in the store.
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// A row index outside the table was addressed.
    #[error("Row index {index} out of range for table '{table}' ({len} rows)")]
    RowOutOfRange { table: String, index: usize, len: usize },
}

// =============================================================================
// Schema Errors
// =============================================================================

/// Errors while reconciling remote headers with internal field names.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// No live column resolves to the identifying field; the batch cannot be joined.
    #[error("No column resolves to the identifying field '{field}' (expected header key '{expected}'); headers seen: [{}]", headers.join(", "))]
    MissingIdentifier {
        field: String,
        expected: String,
        headers: Vec<String>,
    },

    /// One internal field name registered against two different external keys.
    #[error("Internal field '{internal}' aliased to both '{first}' and '{second}'")]
    ConflictingAlias {
        internal: String,
        first: String,
        second: String,
    },

    /// An alias entry normalizes to an empty key.
    #[error("Alias entry for '{0}' has an empty key after normalization")]
    EmptyAlias(String),

    /// Schema document could not be parsed.
    #[error("Invalid schema document: {0}")]
    InvalidDocument(#[from] serde_json::Error),

    /// Schema document could not be read.
    #[error("Schema document IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Write Errors
// =============================================================================

/// Errors on the append and update paths.
#[derive(Debug, Error)]
pub enum WriteError {
    /// No row carries the requested update key.
    #[error("No row with {column}={identifier} in the table")]
    NotFound { column: String, identifier: String },

    /// The table has no column matching the update key.
    #[error("Table has no '{column}' column (required to update rows)")]
    MissingUpdateColumn { column: String },

    /// The record has no value for the identifying field.
    #[error("Record has no value for the identifying field '{field}'")]
    MissingIdentifier { field: String },

    /// The table returned no column headers.
    #[error("Could not read columns of table '{table}'")]
    NoColumns { table: String },

    /// Remote call failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Business-rule rejection of a candidate record.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// One or more rules failed; all messages are kept.
    #[error("Record rejected: {}", errors.join("; "))]
    Rejected { errors: Vec<String> },
}

impl ValidationError {
    /// All collected messages.
    pub fn messages(&self) -> &[String] {
        match self {
            Self::Rejected { errors } => errors,
        }
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading settings from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("Missing {0} environment variable")]
    MissingVar(String),

    /// A variable is set but unusable.
    #[error("Invalid value for {name}: {message}")]
    InvalidVar { name: String, message: String },
}

// =============================================================================
// Ledger Errors (top-level)
// =============================================================================

/// Top-level errors returned by [`crate::ledger::Ledger`].
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Remote read failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Header reconciliation failed.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Write path failed.
    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    /// Candidate record rejected.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Settings problem.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Ledger error.
    #[error("{0}")]
    Ledger(#[from] LedgerError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Requested resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for write operations.
pub type WriteResult<T> = Result<T, WriteError>;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
