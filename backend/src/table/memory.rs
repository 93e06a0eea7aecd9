//! In-memory tables.
//!
//! Backs `--fixture` runs and every write-path test. A snapshot file holds
//! several named tables:
//!
//! ```json
//! { "tables": { "table_name_hist": { "headers": ["Id_UE"], "rows": [["123"]] } } }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::TableStore;
use crate::error::{TransportError, TransportResult};
use crate::models::{fit_row, Cell, RemoteTable};

/// On-disk snapshot of several tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub tables: BTreeMap<String, RemoteTable>,
}

/// Named tables behind a lock, with a count of write calls.
#[derive(Debug, Default)]
pub struct MemoryTable {
    tables: Mutex<BTreeMap<String, RemoteTable>>,
    writes: AtomicUsize,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MemoryTable::insert_table`].
    pub fn with_table(self, name: &str, table: RemoteTable) -> Self {
        self.insert_table(name, table);
        self
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            tables: Mutex::new(snapshot.tables),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn from_path(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&content)?)
    }

    /// Current contents, for saving back to disk.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tables: self.lock().clone(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn insert_table(&self, name: &str, table: RemoteTable) {
        self.lock().insert(name.to_string(), table);
    }

    pub fn table(&self, name: &str) -> Option<RemoteTable> {
        self.lock().get(name).cloned()
    }

    /// Insert a row at `index` without counting it as a write. Stands in
    /// for another client editing the table.
    pub fn insert_row_at(&self, name: &str, index: usize, row: Vec<Cell>) -> TransportResult<()> {
        let mut tables = self.lock();
        let table = tables
            .get_mut(name)
            .ok_or_else(|| TransportError::TableNotFound(name.to_string()))?;
        let row = fit_row(&row, table.width());
        let index = index.min(table.rows.len());
        table.rows.insert(index, row);
        Ok(())
    }

    /// Remove the row at `index` without counting it as a write.
    pub fn remove_row(&self, name: &str, index: usize) -> TransportResult<Vec<Cell>> {
        let mut tables = self.lock();
        let table = tables
            .get_mut(name)
            .ok_or_else(|| TransportError::TableNotFound(name.to_string()))?;
        if index >= table.rows.len() {
            return Err(TransportError::RowOutOfRange {
                table: name.to_string(),
                index,
                len: table.rows.len(),
            });
        }
        Ok(table.rows.remove(index))
    }

    /// Number of append and replace calls served.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, RemoteTable>> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_table_mut<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut RemoteTable) -> TransportResult<T>,
    ) -> TransportResult<T> {
        let mut tables = self.lock();
        let table = tables
            .get_mut(name)
            .ok_or_else(|| TransportError::TableNotFound(name.to_string()))?;
        f(table)
    }

    fn read<T>(&self, name: &str, f: impl FnOnce(&RemoteTable) -> T) -> TransportResult<T> {
        let tables = self.lock();
        tables
            .get(name)
            .map(f)
            .ok_or_else(|| TransportError::TableNotFound(name.to_string()))
    }
}

impl TableStore for MemoryTable {
    async fn list_columns(&self, table: &str) -> TransportResult<Vec<String>> {
        self.read(table, |t| t.headers.clone())
    }

    async fn read_all_rows(&self, table: &str) -> TransportResult<Vec<Vec<Cell>>> {
        self.read(table, |t| t.rows.clone())
    }

    async fn append_row(&self, table: &str, row: &[Cell]) -> TransportResult<()> {
        self.with_table_mut(table, |t| {
            t.rows.push(fit_row(row, t.width()));
            Ok(())
        })?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        debug!(table, "appended row in memory");
        Ok(())
    }

    async fn replace_row(&self, table: &str, index: usize, row: &[Cell]) -> TransportResult<()> {
        self.with_table_mut(table, |t| {
            let len = t.rows.len();
            let width = t.width();
            let slot = t.rows.get_mut(index).ok_or_else(|| TransportError::RowOutOfRange {
                table: table.to_string(),
                index,
                len,
            })?;
            *slot = fit_row(row, width);
            Ok(())
        })?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        debug!(table, index, "replaced row in memory");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryTable {
        MemoryTable::new().with_table(
            "hist",
            RemoteTable::new(
                vec!["Id_UE".into(), "Estado".into()],
                vec![vec![Cell::text("1"), Cell::text("En proceso")]],
            ),
        )
    }

    #[tokio::test]
    async fn test_append_and_replace_count_writes() {
        let store = sample();
        store.append_row("hist", &[Cell::text("2")]).await.unwrap();
        store
            .replace_row("hist", 0, &[Cell::text("1"), Cell::text("Emitido")])
            .await
            .unwrap();

        let table = store.table("hist").unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], vec![Cell::text("2"), Cell::Empty]);
        assert_eq!(table.rows[0][1], Cell::text("Emitido"));
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_table_and_row() {
        let store = sample();
        assert!(matches!(
            store.list_columns("nope").await,
            Err(TransportError::TableNotFound(_))
        ));
        assert!(matches!(
            store.replace_row("hist", 5, &[]).await,
            Err(TransportError::RowOutOfRange { index: 5, len: 1, .. })
        ));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_json() {
        let store = MemoryTable::from_json(
            r#"{"tables": {"hist": {"headers": ["Id_UE", "Año"], "rows": [[123.0, "2024"]]}}}"#,
        )
        .unwrap();
        let table = store.read_table("hist").await.unwrap();
        assert_eq!(table.rows[0], vec![Cell::Number(123.0), Cell::text("2024")]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        store.save(&path).unwrap();
        let reloaded = MemoryTable::from_path(&path).unwrap();
        assert_eq!(reloaded.table("hist"), Some(table));
    }
}
