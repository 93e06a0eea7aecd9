//! Schema reconciliation between spreadsheet headers and internal fields.
//!
//! - [`normalize`] - header text to canonical key
//! - [`SchemaMap`] - alias tables in both directions
//! - [`is_placeholder_header`] - auto-generated column labels

pub mod map;
pub mod normalize;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::Field;

pub use map::{FieldAlias, SchemaDocument, SchemaMap};
pub use normalize::{normalize, NormalizedKey};

/// The identifying (join) field every adapted record must carry.
pub const IDENTIFIER_FIELD: Field = Field::Codigo;

/// Header of the durable per-row update key.
pub const UPDATE_KEY_HEADER: &str = "IdRegistro";

static EXCEL_AUTO_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Column[0-9]+$").expect("Invalid placeholder pattern"));

/// Labels a spreadsheet or dataframe made up for a column nobody named:
/// blank headers, `Unnamed: N` and Excel's `ColumnN`.
pub fn is_placeholder_header(header: &str) -> bool {
    let header = header.trim();
    header.is_empty() || header.starts_with("Unnamed") || EXCEL_AUTO_HEADER.is_match(header)
}
