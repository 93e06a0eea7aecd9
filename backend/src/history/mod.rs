//! Read path: raw remote table to internal records.
//!
//! Headers are normalized, placeholder columns dropped, and the rest
//! resolved to internal field names through the [`SchemaMap`]. Columns the
//! schema does not know are ignored here (the write path keeps them).
//! The identifying column must resolve, otherwise the whole batch fails.
//!
//! # Example
//!
//! ```rust,ignore
//! use peitrack::history::HistoryAdapter;
//! use peitrack::schema::SchemaMap;
//!
//! let schema = SchemaMap::builtin()?;
//! let records = HistoryAdapter::new(&schema).adapt(&headers, &rows)?;
//! let mine = history_for(&records, "123");
//! let last = latest(&mine);
//! ```

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{SchemaError, SchemaResult};
use crate::models::{fit_row, Cell, Coercion, Field, FieldName, Record, RemoteTable};
use crate::schema::{is_placeholder_header, NormalizedKey, SchemaMap, IDENTIFIER_FIELD};

/// What happened to one live column on the read path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "field", rename_all = "snake_case")]
pub enum ColumnStatus {
    /// Mapped to an internal field.
    Resolved(FieldName),
    /// Maps to a field an earlier column already claimed; ignored.
    Duplicate(FieldName),
    /// Auto-generated label; ignored.
    Placeholder,
    /// Unknown to the schema; ignored on read, preserved on write.
    Unresolved,
}

/// Resolution report for one header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderResolution {
    pub position: usize,
    pub header: String,
    pub key: NormalizedKey,
    #[serde(flatten)]
    pub status: ColumnStatus,
}

/// Records plus what the adapter had to do to produce them.
#[derive(Debug, Clone)]
pub struct HistoryBatch {
    pub records: Vec<Record>,
    pub columns: Vec<HeaderResolution>,
    /// Row indices whose identifier could not be read as a whole number
    /// and was kept as trimmed text.
    pub raw_identifiers: Vec<usize>,
}

/// Adapts remote tables to [`Record`]s against one schema.
#[derive(Debug, Clone, Copy)]
pub struct HistoryAdapter<'a> {
    schema: &'a SchemaMap,
}

impl<'a> HistoryAdapter<'a> {
    pub fn new(schema: &'a SchemaMap) -> Self {
        Self { schema }
    }

    /// Adapt headers plus rows into records. Fails when no column resolves
    /// to the identifying field.
    pub fn adapt(&self, headers: &[String], rows: &[Vec<Cell>]) -> SchemaResult<Vec<Record>> {
        Ok(self.adapt_with_report(headers, rows)?.records)
    }

    pub fn adapt_table(&self, table: &RemoteTable) -> SchemaResult<Vec<Record>> {
        self.adapt(&table.headers, &table.rows)
    }

    /// Classify every live header, in order.
    pub fn resolve_headers(&self, headers: &[String]) -> Vec<HeaderResolution> {
        let mut claimed: Vec<FieldName> = Vec::new();

        headers
            .iter()
            .enumerate()
            .map(|(position, header)| {
                let key = NormalizedKey::new(header);
                let status = if is_placeholder_header(header) {
                    ColumnStatus::Placeholder
                } else {
                    match self.schema.resolve_internal(key.as_str()) {
                        Some(name) if claimed.contains(name) => ColumnStatus::Duplicate(name.clone()),
                        Some(name) => {
                            claimed.push(name.clone());
                            ColumnStatus::Resolved(name.clone())
                        }
                        None => ColumnStatus::Unresolved,
                    }
                };

                HeaderResolution {
                    position,
                    header: header.clone(),
                    key,
                    status,
                }
            })
            .collect()
    }

    /// Same as [`HistoryAdapter::adapt`], keeping the column report.
    pub fn adapt_with_report(
        &self,
        headers: &[String],
        rows: &[Vec<Cell>],
    ) -> SchemaResult<HistoryBatch> {
        let columns = self.resolve_headers(headers);
        log_column_report(&columns);

        let bound: Vec<(usize, FieldName)> = columns
            .iter()
            .filter_map(|c| match &c.status {
                ColumnStatus::Resolved(name) => Some((c.position, name.clone())),
                _ => None,
            })
            .collect();

        let identifier = FieldName::Known(IDENTIFIER_FIELD);
        if !bound.iter().any(|(_, name)| *name == identifier) {
            return Err(SchemaError::MissingIdentifier {
                field: IDENTIFIER_FIELD.name().to_string(),
                expected: self.schema.external_key(IDENTIFIER_FIELD).to_string(),
                headers: columns.iter().map(|c| c.key.to_string()).collect(),
            });
        }

        let mut raw_identifiers = Vec::new();
        let records = rows
            .iter()
            .enumerate()
            .map(|(row_idx, raw)| {
                let row = fit_row(raw, headers.len());
                bound
                    .iter()
                    .map(|(position, name)| {
                        let cell = &row[*position];
                        let value = if *name == identifier {
                            match cell.as_identifier() {
                                Coercion::Parsed(code) => Cell::Text(code),
                                Coercion::Raw(code) => {
                                    raw_identifiers.push(row_idx);
                                    Cell::text(code)
                                }
                                Coercion::Missing => Cell::Empty,
                            }
                        } else {
                            cell.clone()
                        };
                        (name.clone(), value)
                    })
                    .collect::<Record>()
            })
            .collect::<Vec<_>>();

        if !raw_identifiers.is_empty() {
            debug!(rows = raw_identifiers.len(), "identifiers kept as raw text");
        }
        info!(rows = records.len(), fields = bound.len(), "adapted remote table");

        Ok(HistoryBatch {
            records,
            columns,
            raw_identifiers,
        })
    }
}

fn log_column_report(columns: &[HeaderResolution]) {
    for column in columns {
        match &column.status {
            ColumnStatus::Resolved(_) => {}
            ColumnStatus::Placeholder => {
                debug!(position = column.position, header = %column.header, "dropping placeholder column")
            }
            ColumnStatus::Unresolved => {
                debug!(position = column.position, key = %column.key, "column unknown to schema")
            }
            ColumnStatus::Duplicate(name) => warn!(
                position = column.position,
                header = %column.header,
                field = %name,
                "field already bound to an earlier column, ignoring"
            ),
        }
    }
}

/// Comparison form of an identifier value (`"123.0"` and `"123"` agree).
pub fn identifier_key(value: &str) -> String {
    Cell::text(value).as_identifier().into_string()
}

/// Records whose identifying field matches `codigo`.
pub fn history_for(records: &[Record], codigo: &str) -> Vec<Record> {
    let wanted = identifier_key(codigo);
    records
        .iter()
        .filter(|r| {
            r.get(IDENTIFIER_FIELD)
                .map(|c| c.as_identifier().into_string() == wanted)
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

/// Most recent record: greatest reception date, unparseable dates counting
/// as oldest, later rows winning ties.
pub fn latest(records: &[Record]) -> Option<&Record> {
    records
        .iter()
        .enumerate()
        .max_by_key(|(position, record)| {
            let received = record
                .get(Field::FechaRecepcion)
                .and_then(|c| c.as_date().parsed());
            (received, *position)
        })
        .map(|(_, record)| record)
}
