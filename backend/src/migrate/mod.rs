//! One-off backfill of the `IdRegistro` update key.
//!
//! Rows written before the update key existed have an empty `IdRegistro`
//! cell and cannot be updated in place. The backfill gives each of them a
//! fresh UUID and, when the columns exist, stamps `LastUpdated` and
//! `UpdatedBy`. It is a dry run unless asked to write; writes are whole-row
//! replacements spaced by a pause to stay under the store's throttling.

use chrono::Local;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{WriteError, WriteResult};
use crate::ledger::TIMESTAMP_FORMAT;
use crate::models::{fit_row, Cell, Field};
use crate::schema::{SchemaMap, UPDATE_KEY_HEADER};
use crate::table::TableStore;
use crate::writer::find_column;

/// Author stamped on backfilled rows.
pub const MIGRATION_AUTHOR: &str = "migration_script";

const PROGRESS_EVERY: usize = 20;

#[derive(Debug, Clone)]
pub struct BackfillOptions {
    pub dry_run: bool,
    /// Pause after each write.
    pub pause: Duration,
    pub author: String,
}

impl Default for BackfillOptions {
    fn default() -> Self {
        Self {
            dry_run: true,
            pause: Duration::from_millis(150),
            author: MIGRATION_AUTHOR.to_string(),
        }
    }
}

/// One row that received (or would receive) an identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub row: usize,
    pub id_registro: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    pub total_rows: usize,
    pub missing: usize,
    pub written: usize,
    pub dry_run: bool,
    pub assignments: Vec<Assignment>,
}

/// Give every row of `table` with an empty update key a fresh identifier.
pub async fn backfill_ids<S: TableStore>(
    store: &S,
    table: &str,
    schema: &SchemaMap,
    options: &BackfillOptions,
) -> WriteResult<BackfillReport> {
    let headers = store.list_columns(table).await?;
    if headers.is_empty() {
        return Err(WriteError::NoColumns {
            table: table.to_string(),
        });
    }

    let key_column = find_column(&headers, UPDATE_KEY_HEADER).ok_or_else(|| WriteError::MissingUpdateColumn {
        column: UPDATE_KEY_HEADER.to_string(),
    })?;
    let updated_column = find_column(&headers, schema.external_key(Field::LastUpdated).as_str());
    let author_column = find_column(&headers, schema.external_key(Field::UpdatedBy).as_str());
    if updated_column.is_none() || author_column.is_none() {
        warn!(table, "audit columns missing, only the update key will be filled");
    }

    let rows = store.read_all_rows(table).await?;
    let pending: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row.get(key_column).map_or(true, Cell::is_blank))
        .map(|(index, _)| index)
        .collect();

    info!(
        table,
        total = rows.len(),
        missing = pending.len(),
        dry_run = options.dry_run,
        "backfilling update keys"
    );

    let mut report = BackfillReport {
        total_rows: rows.len(),
        missing: pending.len(),
        dry_run: options.dry_run,
        ..BackfillReport::default()
    };

    for index in pending {
        let id_registro = Uuid::new_v4().to_string();
        let mut row = fit_row(&rows[index], headers.len());
        row[key_column] = Cell::text(id_registro.as_str());
        if let Some(column) = updated_column {
            row[column] = Cell::text(Local::now().format(TIMESTAMP_FORMAT).to_string());
        }
        if let Some(column) = author_column {
            row[column] = Cell::text(options.author.as_str());
        }

        if options.dry_run {
            info!(row = index, id_registro = %id_registro, "would assign update key");
        } else {
            store.replace_row(table, index, &row).await?;
            report.written += 1;
            if report.written % PROGRESS_EVERY == 0 {
                info!(written = report.written, of = report.missing, "backfill progress");
            }
            if !options.pause.is_zero() {
                tokio::time::sleep(options.pause).await;
            }
        }

        report.assignments.push(Assignment { row: index, id_registro });
    }

    info!(table, written = report.written, "backfill finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RemoteTable;
    use crate::table::MemoryTable;

    fn store() -> MemoryTable {
        MemoryTable::new().with_table(
            "hist",
            RemoteTable::new(
                vec!["Id_UE".into(), "IdRegistro".into(), "LastUpdated".into(), "UpdatedBy".into()],
                vec![
                    vec![Cell::text("1"), Cell::text("keep-me")],
                    vec![Cell::text("2")],
                    vec![Cell::text("3"), Cell::text("  ")],
                ],
            ),
        )
    }

    fn write_options() -> BackfillOptions {
        BackfillOptions {
            dry_run: false,
            pause: Duration::ZERO,
            ..BackfillOptions::default()
        }
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let store = store();
        let schema = SchemaMap::builtin().unwrap();
        let report = backfill_ids(&store, "hist", &schema, &BackfillOptions::default())
            .await
            .unwrap();

        assert_eq!(report.total_rows, 3);
        assert_eq!(report.missing, 2);
        assert_eq!(report.written, 0);
        assert_eq!(report.assignments.len(), 2);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_backfill_fills_blank_keys_only() {
        let store = store();
        let schema = SchemaMap::builtin().unwrap();
        let report = backfill_ids(&store, "hist", &schema, &write_options()).await.unwrap();

        assert_eq!(report.written, 2);
        let rows = store.table("hist").unwrap().rows;
        assert_eq!(rows[0][1], Cell::text("keep-me"));
        assert_eq!(rows[0][3], Cell::Empty);
        assert_eq!(rows[1][1].to_string(), report.assignments[0].id_registro);
        assert_eq!(rows[2][3], Cell::text(MIGRATION_AUTHOR));
        assert!(!rows[2][2].is_blank());
        assert!(Uuid::parse_str(&rows[2][1].to_string()).is_ok());
    }

    #[tokio::test]
    async fn test_requires_update_key_column() {
        let store = MemoryTable::new().with_table(
            "hist",
            RemoteTable::new(vec!["Id_UE".into()], vec![vec![Cell::text("1")]]),
        );
        let schema = SchemaMap::builtin().unwrap();
        let result = backfill_ids(&store, "hist", &schema, &write_options()).await;
        assert!(matches!(result, Err(WriteError::MissingUpdateColumn { .. })));
    }
}
