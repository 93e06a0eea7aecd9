//! Remote tabular store capability.
//!
//! - [`TableStore`] - the four operations the core relies on
//! - [`GraphTableClient`] - Excel table in a SharePoint drive, over Microsoft Graph
//! - [`MemoryTable`] - in-process tables for fixtures and tests
//! - [`TableBackend`] - runtime choice between the two
//!
//! Rows are positional: values line up with `list_columns` order and row
//! indices are 0-based over data rows (the header row is not counted).

pub mod graph;
pub mod memory;

use std::future::Future;

use crate::error::TransportResult;
use crate::models::{Cell, RemoteTable};

pub use graph::GraphTableClient;
pub use memory::MemoryTable;

/// A store of named tables with ordered columns and whole-row writes.
pub trait TableStore: Send + Sync {
    /// Column headers, in table order.
    fn list_columns(&self, table: &str) -> impl Future<Output = TransportResult<Vec<String>>> + Send;

    /// Every data row. Rows may be shorter than the header list.
    fn read_all_rows(&self, table: &str) -> impl Future<Output = TransportResult<Vec<Vec<Cell>>>> + Send;

    /// Add one row at the end.
    fn append_row(&self, table: &str, row: &[Cell]) -> impl Future<Output = TransportResult<()>> + Send;

    /// Overwrite the full row at `index`.
    fn replace_row(
        &self,
        table: &str,
        index: usize,
        row: &[Cell],
    ) -> impl Future<Output = TransportResult<()>> + Send;

    /// Headers and rows in two round trips.
    fn read_table(&self, table: &str) -> impl Future<Output = TransportResult<RemoteTable>> + Send {
        async move {
            let headers = self.list_columns(table).await?;
            let rows = self.read_all_rows(table).await?;
            Ok(RemoteTable::new(headers, rows))
        }
    }
}

/// Store picked at start-up: the live workbook or a local snapshot.
#[derive(Debug)]
pub enum TableBackend {
    Graph(GraphTableClient),
    Memory(MemoryTable),
}

impl TableBackend {
    pub fn as_memory(&self) -> Option<&MemoryTable> {
        match self {
            Self::Memory(memory) => Some(memory),
            Self::Graph(_) => None,
        }
    }
}

impl TableStore for TableBackend {
    async fn list_columns(&self, table: &str) -> TransportResult<Vec<String>> {
        match self {
            Self::Graph(client) => client.list_columns(table).await,
            Self::Memory(memory) => memory.list_columns(table).await,
        }
    }

    async fn read_all_rows(&self, table: &str) -> TransportResult<Vec<Vec<Cell>>> {
        match self {
            Self::Graph(client) => client.read_all_rows(table).await,
            Self::Memory(memory) => memory.read_all_rows(table).await,
        }
    }

    async fn append_row(&self, table: &str, row: &[Cell]) -> TransportResult<()> {
        match self {
            Self::Graph(client) => client.append_row(table, row).await,
            Self::Memory(memory) => memory.append_row(table, row).await,
        }
    }

    async fn replace_row(&self, table: &str, index: usize, row: &[Cell]) -> TransportResult<()> {
        match self {
            Self::Graph(client) => client.replace_row(table, index, row).await,
            Self::Memory(memory) => memory.replace_row(table, index, row).await,
        }
    }
}
