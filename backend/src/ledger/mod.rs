//! The record-keeping flows the form and the CLI drive.
//!
//! A [`Ledger`] owns a store and shares an immutable [`SchemaMap`]. Every
//! operation re-reads what it needs from the store; nothing remote is
//! cached between calls.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use peitrack::ledger::Ledger;
//!
//! let ledger = Ledger::new(store, Arc::new(schema), settings.tables.clone());
//! let draft = ledger.prefill("123").await?;
//! let written = ledger.submit(record).await?;
//! ledger.update(&written.text(Field::IdRegistro), updates).await?;
//! ```

use chrono::Local;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::config::TableNames;
use crate::directory::UnitDirectory;
use crate::error::{LedgerResult, WriteError};
use crate::form::FormDraft;
use crate::history::{history_for, latest, HeaderResolution, HistoryAdapter};
use crate::models::{Field, Record};
use crate::schema::{SchemaMap, IDENTIFIER_FIELD, UPDATE_KEY_HEADER};
use crate::table::TableStore;
use crate::validation::{ensure_valid, validate};
use crate::writer::{RecordWriter, RowPatch};

/// Format of the `last_updated` stamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Author stamped when the caller does not name one.
pub const DEFAULT_AUTHOR: &str = "peitrack";

pub struct Ledger<S> {
    store: S,
    schema: Arc<SchemaMap>,
    tables: TableNames,
    author: String,
}

impl<S: TableStore> Ledger<S> {
    pub fn new(store: S, schema: Arc<SchemaMap>, tables: TableNames) -> Self {
        Self {
            store,
            schema,
            tables,
            author: DEFAULT_AUTHOR.to_string(),
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn schema(&self) -> &SchemaMap {
        &self.schema
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    fn writer(&self) -> RecordWriter<'_, S> {
        RecordWriter::new(&self.store, &self.schema)
    }

    async fn read_records(&self, table: &str) -> LedgerResult<Vec<Record>> {
        let remote = self.store.read_table(table).await?;
        Ok(HistoryAdapter::new(&self.schema).adapt_table(&remote)?)
    }

    /// Every history record.
    pub async fn all_history(&self) -> LedgerResult<Vec<Record>> {
        self.read_records(&self.tables.history).await
    }

    /// History records of one unit, in table order.
    pub async fn history(&self, codigo: &str) -> LedgerResult<Vec<Record>> {
        let records = self.all_history().await?;
        let found = history_for(&records, codigo);
        info!(codigo, rows = found.len(), "history lookup");
        Ok(found)
    }

    /// Most recent history record of one unit.
    pub async fn latest(&self, codigo: &str) -> LedgerResult<Option<Record>> {
        let records = self.history(codigo).await?;
        Ok(latest(&records).cloned())
    }

    /// Form draft seeded from the unit's latest record, or the defaults
    /// when it has none.
    pub async fn prefill(&self, codigo: &str) -> LedgerResult<FormDraft> {
        Ok(self
            .latest(codigo)
            .await?
            .map(|record| FormDraft::from_record(&record))
            .unwrap_or_default())
    }

    pub async fn directory(&self) -> LedgerResult<UnitDirectory> {
        let records = self.read_records(&self.tables.units).await?;
        Ok(UnitDirectory::from_records(&records))
    }

    /// Rule violations for `record`; empty when it may be written.
    pub fn check(&self, record: &Record) -> Vec<String> {
        validate(record)
    }

    /// Validate, stamp and append a new history record. Returns the record
    /// as written, including its fresh `id_registro`.
    pub async fn submit(&self, record: Record) -> LedgerResult<Record> {
        require_identifier(&record)?;
        ensure_valid(&record)?;

        let record = if record.is_blank(Field::IdRegistro) {
            record.with(Field::IdRegistro, Uuid::new_v4().to_string())
        } else {
            record
        };
        let record = self.stamp(record);

        self.writer().append(&self.tables.history, &record).await?;
        info!(
            codigo = %record.text(Field::Codigo),
            id_registro = %record.text(Field::IdRegistro),
            "record submitted"
        );
        Ok(record)
    }

    /// Merge `updates` into the history row keyed by `id_registro`. The
    /// merged row, as rebuilt from the row read right before the write,
    /// must keep its `codigo` and pass validation. Returns the row index
    /// written.
    pub async fn update(&self, id_registro: &str, updates: Record) -> LedgerResult<usize> {
        let table = &self.tables.history;
        let updates = self.stamp(updates.without(Field::IdRegistro));
        let writer = self.writer();
        let adapter = HistoryAdapter::new(&self.schema);

        let (headers, patch) = writer.plan(table, UPDATE_KEY_HEADER, id_registro, &updates).await?;
        let check = |patch: &RowPatch| -> LedgerResult<()> {
            let merged = adapter
                .adapt(&headers, std::slice::from_ref(&patch.values))?
                .into_iter()
                .next()
                .unwrap_or_default();
            require_identifier(&merged)?;
            ensure_valid(&merged)?;
            Ok(())
        };

        writer
            .commit_checked(table, UPDATE_KEY_HEADER, &headers, patch, &updates, check)
            .await
    }

    /// How each live header of `table` resolves.
    pub async fn header_report(&self, table: &str) -> LedgerResult<Vec<HeaderResolution>> {
        let headers = self.store.list_columns(table).await?;
        Ok(HistoryAdapter::new(&self.schema).resolve_headers(&headers))
    }

    /// Set `last_updated`, and `updated_by` unless the caller named one.
    fn stamp(&self, record: Record) -> Record {
        let record = record.with(Field::LastUpdated, Local::now().format(TIMESTAMP_FORMAT).to_string());
        if record.is_blank(Field::UpdatedBy) {
            record.with(Field::UpdatedBy, self.author.as_str())
        } else {
            record
        }
    }
}

fn require_identifier(record: &Record) -> Result<(), WriteError> {
    if record.is_blank(IDENTIFIER_FIELD) {
        return Err(WriteError::MissingIdentifier {
            field: IDENTIFIER_FIELD.to_string(),
        });
    }
    Ok(())
}
