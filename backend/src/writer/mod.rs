//! Write path: internal records to positional rows.
//!
//! Rows are always laid out against the headers the table has *now*, read
//! right before the write. Columns the record has nothing for, including
//! columns unknown to the schema, are written empty on append and kept as
//! they were on update. Updates replace the whole row; partial writes are
//! never issued.
//!
//! # Example
//!
//! ```rust,ignore
//! use peitrack::writer::RecordWriter;
//!
//! let writer = RecordWriter::new(&store, &schema);
//! writer.append("table_name_hist", &record).await?;
//! let index = writer.update_by_key("table_name_hist", "IdRegistro", "abc-1", &updates).await?;
//! ```

use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::{WriteError, WriteResult};
use crate::models::{fit_row, Cell, Record};
use crate::schema::{normalize, NormalizedKey, SchemaMap};
use crate::table::TableStore;

/// A located row and the full replacement for it.
#[derive(Debug, Clone, PartialEq)]
pub struct RowPatch {
    /// 0-based data-row index.
    pub index: usize,
    /// Position of the update-key column.
    pub key_column: usize,
    /// Trimmed identifier the row was located by.
    pub identifier: String,
    /// The existing row, padded to header width.
    pub current: Vec<Cell>,
    /// The row to write back.
    pub values: Vec<Cell>,
}

/// External key -> value, with recognized fields winning over extras that
/// land on the same key.
fn external_values<'r>(record: &'r Record, schema: &SchemaMap) -> HashMap<NormalizedKey, &'r Cell> {
    let mut values = HashMap::new();
    // Known fields iterate before extras.
    for (name, cell) in record.iter() {
        let key = schema.resolve_external(name);
        if let Some(previous) = values.get(&key) {
            if *previous != cell {
                debug!(key = %key, field = %name, "value for column already set, keeping the first");
            }
            continue;
        }
        values.insert(key, cell);
    }
    values
}

/// Lay `record` out against `headers`. The result always has one cell per
/// header; headers the record has no value for get [`Cell::Empty`].
pub fn build_row(record: &Record, headers: &[String], schema: &SchemaMap) -> Vec<Cell> {
    let values = external_values(record, schema);
    headers
        .iter()
        .map(|header| {
            values
                .get(normalize(header).as_str())
                .map(|cell| (*cell).clone())
                .unwrap_or_default()
        })
        .collect()
}

/// Lay `updates` over an existing row. Cells for headers the updates do not
/// mention are kept.
pub fn overlay_row(current: &[Cell], updates: &Record, headers: &[String], schema: &SchemaMap) -> Vec<Cell> {
    let values = external_values(updates, schema);
    let mut row = fit_row(current, headers.len());
    for (position, header) in headers.iter().enumerate() {
        if let Some(cell) = values.get(normalize(header).as_str()) {
            row[position] = (*cell).clone();
        }
    }
    row
}

/// Position of the column whose normalized header equals the normalized
/// `column`.
pub fn find_column(headers: &[String], column: &str) -> Option<usize> {
    let wanted = normalize(column);
    headers.iter().position(|h| normalize(h) == wanted)
}

/// First row whose cell at `key_column`, trimmed, equals `identifier`.
/// Case-sensitive, no numeric tolerance.
pub fn locate_row(rows: &[Vec<Cell>], key_column: usize, identifier: &str) -> Option<usize> {
    rows.iter()
        .position(|row| row.get(key_column).map(Cell::trimmed).as_deref() == Some(identifier))
}

/// Find the row keyed by `identifier` and compute its replacement.
pub fn plan_update(
    key_header: &str,
    identifier: &str,
    updates: &Record,
    headers: &[String],
    rows: &[Vec<Cell>],
    schema: &SchemaMap,
) -> WriteResult<RowPatch> {
    let key_column = find_column(headers, key_header).ok_or_else(|| WriteError::MissingUpdateColumn {
        column: key_header.to_string(),
    })?;

    let identifier = identifier.trim();
    let index = locate_row(rows, key_column, identifier).ok_or_else(|| WriteError::NotFound {
        column: key_header.to_string(),
        identifier: identifier.to_string(),
    })?;

    let current = fit_row(&rows[index], headers.len());
    let values = overlay_row(&current, updates, headers, schema);

    Ok(RowPatch {
        index,
        key_column,
        identifier: identifier.to_string(),
        current,
        values,
    })
}

/// Appends and keyed updates against one store.
#[derive(Debug, Clone, Copy)]
pub struct RecordWriter<'a, S> {
    store: &'a S,
    schema: &'a SchemaMap,
}

impl<'a, S: TableStore> RecordWriter<'a, S> {
    pub fn new(store: &'a S, schema: &'a SchemaMap) -> Self {
        Self { store, schema }
    }

    async fn live_headers(&self, table: &str) -> WriteResult<Vec<String>> {
        let headers = self.store.list_columns(table).await?;
        if headers.is_empty() {
            return Err(WriteError::NoColumns {
                table: table.to_string(),
            });
        }
        Ok(headers)
    }

    /// Append `record` as a new row. Returns the row as written.
    pub async fn append(&self, table: &str, record: &Record) -> WriteResult<Vec<Cell>> {
        let headers = self.live_headers(table).await?;
        let row = build_row(record, &headers, self.schema);
        let filled = row.iter().filter(|c| !c.is_blank()).count();

        self.store.append_row(table, &row).await?;
        info!(table, columns = headers.len(), filled, "record appended");
        Ok(row)
    }

    /// Read the table and locate the row to update. Nothing is written.
    pub async fn plan(
        &self,
        table: &str,
        key_header: &str,
        identifier: &str,
        updates: &Record,
    ) -> WriteResult<(Vec<String>, RowPatch)> {
        let headers = self.live_headers(table).await?;
        let rows = self.store.read_all_rows(table).await?;
        let patch = plan_update(key_header, identifier, updates, &headers, &rows, self.schema)?;
        debug!(table, index = patch.index, identifier = %patch.identifier, "update target located");
        Ok((headers, patch))
    }

    /// Write a planned update. The rows are read again first: if the
    /// identifier is no longer at the planned index the row is located once
    /// more, and if it is gone the update fails with `NotFound`.
    pub async fn commit(
        &self,
        table: &str,
        key_header: &str,
        headers: &[String],
        planned: RowPatch,
        updates: &Record,
    ) -> WriteResult<usize> {
        self.commit_checked(table, key_header, headers, planned, updates, |_| Ok(()))
            .await
    }

    /// [`RecordWriter::commit`], with `check` run on the replacement built
    /// from the re-read row. Nothing is written when it fails.
    pub async fn commit_checked<E, F>(
        &self,
        table: &str,
        key_header: &str,
        headers: &[String],
        planned: RowPatch,
        updates: &Record,
        check: F,
    ) -> Result<usize, E>
    where
        E: From<WriteError>,
        F: Fn(&RowPatch) -> Result<(), E>,
    {
        let rows = self.store.read_all_rows(table).await.map_err(WriteError::from)?;

        let still_there = rows
            .get(planned.index)
            .and_then(|row| row.get(planned.key_column))
            .map(Cell::trimmed)
            .is_some_and(|id| id == planned.identifier);

        let patch = if still_there {
            let current = fit_row(&rows[planned.index], headers.len());
            let values = overlay_row(&current, updates, headers, self.schema);
            RowPatch {
                current,
                values,
                ..planned
            }
        } else {
            warn!(
                table,
                planned = planned.index,
                identifier = %planned.identifier,
                "row moved since it was located, locating again"
            );
            plan_update(key_header, &planned.identifier, updates, headers, &rows, self.schema)?
        };

        check(&patch)?;

        self.store
            .replace_row(table, patch.index, &patch.values)
            .await
            .map_err(WriteError::from)?;
        info!(table, index = patch.index, identifier = %patch.identifier, "record updated");
        Ok(patch.index)
    }

    /// Update the row whose `key_header` cell equals `identifier`, merging
    /// `updates` over it. Returns the index written.
    pub async fn update_by_key(
        &self,
        table: &str,
        key_header: &str,
        identifier: &str,
        updates: &Record,
    ) -> WriteResult<usize> {
        let (headers, patch) = self.plan(table, key_header, identifier, updates).await?;
        self.commit(table, key_header, &headers, patch, updates).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryAdapter;
    use crate::models::{Field, RemoteTable};
    use crate::schema::UPDATE_KEY_HEADER;
    use crate::table::MemoryTable;
    use crate::test_support::{history_headers, HISTORY};
    use proptest::prelude::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn store_with(rows: Vec<Vec<Cell>>) -> MemoryTable {
        MemoryTable::new().with_table(HISTORY, RemoteTable::new(history_headers(), rows))
    }

    fn history_row(codigo: &str, estado: &str, id: &str) -> Vec<Cell> {
        let schema = SchemaMap::builtin().unwrap();
        let record = Record::new()
            .with(Field::Codigo, codigo)
            .with(Field::Estado, estado)
            .with(Field::Periodo, "2025-2027")
            .with(Field::IdRegistro, id);
        build_row(&record, &history_headers(), &schema)
    }

    #[test]
    fn test_build_row_follows_live_order() {
        let schema = SchemaMap::builtin().unwrap();
        let record = Record::new()
            .with(Field::Codigo, "123")
            .with(Field::Estado, "Emitido")
            .with(Field::Anio, "2025");

        let row = build_row(&record, &headers(&["Estado ", "Año", "Id_UE"]), &schema);
        assert_eq!(row, vec![Cell::text("Emitido"), Cell::text("2025"), Cell::text("123")]);
    }

    #[test]
    fn test_build_row_unknown_column_is_empty() {
        let schema = SchemaMap::builtin().unwrap();
        let record = Record::new().with(Field::Codigo, "123");
        let live = headers(&["Id_UE", "Columna nueva", "Estado"]);

        let row = build_row(&record, &live, &schema);
        assert_eq!(row.len(), live.len());
        assert_eq!(row[1], Cell::Empty);
        assert_eq!(row[1].to_wire(), serde_json::json!(""));
    }

    #[test]
    fn test_build_row_identity_fallback_for_extras() {
        let schema = SchemaMap::builtin().unwrap();
        let record = Record::new().with("Observación", "revisar");
        let row = build_row(&record, &headers(&["Id_UE", "observacion"]), &schema);
        assert_eq!(row, vec![Cell::Empty, Cell::text("revisar")]);
    }

    #[test]
    fn test_plan_update_merges_over_existing_row() {
        let schema = SchemaMap::builtin().unwrap();
        let live = headers(&["Id_UE", "Estado", "Libre", "IdRegistro"]);
        let rows = vec![
            vec![Cell::text("1"), Cell::text("En proceso"), Cell::text("x"), Cell::text("aaa")],
            vec![Cell::text("2"), Cell::text("En proceso"), Cell::text("y"), Cell::text(" abc-1 ")],
        ];
        let updates = Record::new().with(Field::Estado, "Emitido");

        let patch = plan_update(UPDATE_KEY_HEADER, "abc-1", &updates, &live, &rows, &schema).unwrap();
        assert_eq!(patch.index, 1);
        assert_eq!(
            patch.values,
            vec![Cell::text("2"), Cell::text("Emitido"), Cell::text("y"), Cell::text(" abc-1 ")]
        );
    }

    #[test]
    fn test_identifier_match_is_case_sensitive() {
        let schema = SchemaMap::builtin().unwrap();
        let live = headers(&["IdRegistro"]);
        let rows = vec![vec![Cell::text("ABC-1")]];
        let result = plan_update(UPDATE_KEY_HEADER, "abc-1", &Record::new(), &live, &rows, &schema);
        assert!(matches!(result, Err(WriteError::NotFound { .. })));
    }

    #[test]
    fn test_plan_update_without_key_column() {
        let schema = SchemaMap::builtin().unwrap();
        let result = plan_update(
            UPDATE_KEY_HEADER,
            "abc-1",
            &Record::new(),
            &headers(&["Id_UE"]),
            &[vec![Cell::text("1")]],
            &schema,
        );
        assert!(matches!(result, Err(WriteError::MissingUpdateColumn { .. })));
    }

    #[tokio::test]
    async fn test_update_unknown_identifier_writes_nothing() {
        let schema = SchemaMap::builtin().unwrap();
        let store = store_with(vec![history_row("1", "En proceso", "id-1"), history_row("2", "Emitido", "id-2")]);
        let writer = RecordWriter::new(&store, &schema);

        let err = writer
            .update_by_key(HISTORY, UPDATE_KEY_HEADER, "abc-1", &Record::new().with(Field::Estado, "Emitido"))
            .await
            .unwrap_err();

        assert!(matches!(err, WriteError::NotFound { ref identifier, .. } if identifier == "abc-1"));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_append_then_update() {
        let schema = SchemaMap::builtin().unwrap();
        let store = store_with(vec![history_row("1", "En proceso", "id-1")]);
        let writer = RecordWriter::new(&store, &schema);

        let record = Record::new()
            .with(Field::Codigo, "77")
            .with(Field::Estado, "En proceso")
            .with(Field::IdRegistro, "id-77");
        let row = writer.append(HISTORY, &record).await.unwrap();
        assert_eq!(row.len(), history_headers().len());

        let index = writer
            .update_by_key(HISTORY, UPDATE_KEY_HEADER, "id-77", &Record::new().with(Field::Estado, "Emitido"))
            .await
            .unwrap();
        assert_eq!(index, 1);

        let table = store.table(HISTORY).unwrap();
        let records = HistoryAdapter::new(&schema).adapt_table(&table).unwrap();
        assert_eq!(records[1].text(Field::Codigo), "77");
        assert_eq!(records[1].text(Field::Estado), "Emitido");
        assert_eq!(records[0].text(Field::Estado), "En proceso");
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_commit_relocates_moved_row() {
        let schema = SchemaMap::builtin().unwrap();
        let store = store_with(vec![history_row("1", "En proceso", "id-1"), history_row("2", "En proceso", "id-2")]);
        let writer = RecordWriter::new(&store, &schema);
        let updates = Record::new().with(Field::Estado, "Emitido");

        let (live, patch) = writer.plan(HISTORY, UPDATE_KEY_HEADER, "id-2", &updates).await.unwrap();
        assert_eq!(patch.index, 1);

        // Another client inserts a row above the target.
        store.insert_row_at(HISTORY, 0, history_row("9", "En proceso", "id-9")).unwrap();

        let index = writer.commit(HISTORY, UPDATE_KEY_HEADER, &live, patch, &updates).await.unwrap();
        assert_eq!(index, 2);

        let records = HistoryAdapter::new(&schema)
            .adapt_table(&store.table(HISTORY).unwrap())
            .unwrap();
        assert_eq!(records[1].text(Field::Estado), "En proceso");
        assert_eq!(records[2].text(Field::Codigo), "2");
        assert_eq!(records[2].text(Field::Estado), "Emitido");
    }

    #[tokio::test]
    async fn test_commit_fails_when_row_vanished() {
        let schema = SchemaMap::builtin().unwrap();
        let store = store_with(vec![history_row("1", "En proceso", "id-1")]);
        let writer = RecordWriter::new(&store, &schema);
        let updates = Record::new().with(Field::Estado, "Emitido");

        let (live, patch) = writer.plan(HISTORY, UPDATE_KEY_HEADER, "id-1", &updates).await.unwrap();
        store.remove_row(HISTORY, 0).unwrap();

        let result = writer.commit(HISTORY, UPDATE_KEY_HEADER, &live, patch, &updates).await;
        assert!(matches!(result, Err(WriteError::NotFound { .. })));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_commit_checks_the_reread_row() {
        let schema = SchemaMap::builtin().unwrap();
        let store = store_with(vec![history_row("1", "En proceso", "id-1")]);
        let writer = RecordWriter::new(&store, &schema);
        let updates = Record::new().with(Field::Comentario, "revisado");

        let (live, patch) = writer.plan(HISTORY, UPDATE_KEY_HEADER, "id-1", &updates).await.unwrap();

        // Another client issues the report after the row was located.
        let mut table = store.table(HISTORY).unwrap();
        table.rows[0] = history_row("1", "Emitido", "id-1");
        store.insert_table(HISTORY, table);

        #[derive(Debug)]
        #[allow(dead_code)]
        enum Outcome {
            Rejected(Cell),
            Write(WriteError),
        }
        impl From<WriteError> for Outcome {
            fn from(err: WriteError) -> Self {
                Outcome::Write(err)
            }
        }

        let estado = find_column(&live, "Estado").unwrap();
        let result = writer
            .commit_checked(HISTORY, UPDATE_KEY_HEADER, &live, patch, &updates, |patch| {
                match &patch.values[estado] {
                    Cell::Text(s) if s == "Emitido" => Err(Outcome::Rejected(patch.values[estado].clone())),
                    _ => Ok(()),
                }
            })
            .await;

        assert!(matches!(result, Err(Outcome::Rejected(ref cell)) if *cell == Cell::text("Emitido")));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_append_to_table_without_columns() {
        let schema = SchemaMap::builtin().unwrap();
        let store = MemoryTable::new().with_table(HISTORY, RemoteTable::default());
        let result = RecordWriter::new(&store, &schema)
            .append(HISTORY, &Record::new().with(Field::Codigo, "1"))
            .await;
        assert!(matches!(result, Err(WriteError::NoColumns { .. })));
    }

    fn text_value() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9 ]{0,12}[A-Za-z0-9]"
    }

    proptest! {
        #[test]
        fn prop_build_then_adapt_round_trips(
            codigo in 1u32..10_000_000,
            estado in text_value(),
            periodo in "[0-9]{4}-[0-9]{4}",
            comentario in text_value(),
            expediente in proptest::option::of(text_value()),
        ) {
            let schema = SchemaMap::builtin().unwrap();
            let mut record = Record::new()
                .with(Field::Codigo, codigo.to_string())
                .with(Field::Estado, estado)
                .with(Field::Periodo, periodo)
                .with(Field::Comentario, comentario);
            if let Some(expediente) = expediente {
                record = record.with(Field::Expediente, expediente);
            }

            let live = history_headers();
            let row = build_row(&record, &live, &schema);
            let adapted = HistoryAdapter::new(&schema).adapt(&live, &[row]).unwrap();

            prop_assert_eq!(adapted.len(), 1);
            for (name, cell) in record.iter() {
                prop_assert_eq!(adapted[0].get_name(name), Some(cell));
            }
        }
    }
}
