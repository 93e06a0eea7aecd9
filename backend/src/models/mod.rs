//! Domain models for the record-keeping core.
//!
//! - [`Cell`] - Typed spreadsheet value
//! - [`Coercion`] - Tagged best-effort conversion result
//! - [`Field`] - Recognized internal field names
//! - [`FieldName`] - A recognized field or an extra, forward-compatible name
//! - [`Record`] - One entity/event keyed by internal field names
//! - [`RemoteTable`] - Headers plus rows, as read from the store

pub mod cell;

use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::schema::normalize;

pub use cell::{Cell, Coercion};

// =============================================================================
// Field
// =============================================================================

/// Internal stable field names known to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    /// Identifying field (executing-unit code).
    Codigo,
    Nombre,
    Anio,
    Ng1,
    Ng2,
    FechaRecepcion,
    Periodo,
    Vigencia,
    TipoPei,
    Estado,
    ResponsableInstitucional,
    CantidadRevisiones,
    FechaDerivacion,
    EtapaRevision,
    Comentario,
    Articulacion,
    Expediente,
    FechaIt,
    NumeroIt,
    FechaOficio,
    NumeroOficio,
    IdSector,
    NombreSector,
    IdPliego,
    NombrePliego,
    IdDepartamento,
    NombreDepartamento,
    IdProvincia,
    NombreProvincia,
    Id4Distrito,
    NombreDistrito,
    /// Durable per-row update key.
    IdRegistro,
    LastUpdated,
    UpdatedBy,
}

impl Field {
    pub const ALL: [Field; 34] = [
        Field::Codigo,
        Field::Nombre,
        Field::Anio,
        Field::Ng1,
        Field::Ng2,
        Field::FechaRecepcion,
        Field::Periodo,
        Field::Vigencia,
        Field::TipoPei,
        Field::Estado,
        Field::ResponsableInstitucional,
        Field::CantidadRevisiones,
        Field::FechaDerivacion,
        Field::EtapaRevision,
        Field::Comentario,
        Field::Articulacion,
        Field::Expediente,
        Field::FechaIt,
        Field::NumeroIt,
        Field::FechaOficio,
        Field::NumeroOficio,
        Field::IdSector,
        Field::NombreSector,
        Field::IdPliego,
        Field::NombrePliego,
        Field::IdDepartamento,
        Field::NombreDepartamento,
        Field::IdProvincia,
        Field::NombreProvincia,
        Field::Id4Distrito,
        Field::NombreDistrito,
        Field::IdRegistro,
        Field::LastUpdated,
        Field::UpdatedBy,
    ];

    /// Canonical internal name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Codigo => "codigo",
            Self::Nombre => "nombre",
            Self::Anio => "anio",
            Self::Ng1 => "ng1",
            Self::Ng2 => "ng2",
            Self::FechaRecepcion => "fecha_recepcion",
            Self::Periodo => "periodo",
            Self::Vigencia => "vigencia",
            Self::TipoPei => "tipo_pei",
            Self::Estado => "estado",
            Self::ResponsableInstitucional => "responsable_institucional",
            Self::CantidadRevisiones => "cantidad_revisiones",
            Self::FechaDerivacion => "fecha_derivacion",
            Self::EtapaRevision => "etapa_revision",
            Self::Comentario => "comentario",
            Self::Articulacion => "articulacion",
            Self::Expediente => "expediente",
            Self::FechaIt => "fecha_it",
            Self::NumeroIt => "numero_it",
            Self::FechaOficio => "fecha_oficio",
            Self::NumeroOficio => "numero_oficio",
            Self::IdSector => "id_sector",
            Self::NombreSector => "nombre_sector",
            Self::IdPliego => "id_pliego",
            Self::NombrePliego => "nombre_pliego",
            Self::IdDepartamento => "id_departamento",
            Self::NombreDepartamento => "nombre_departamento",
            Self::IdProvincia => "id_provincia",
            Self::NombreProvincia => "nombre_provincia",
            Self::Id4Distrito => "id_4distrito",
            Self::NombreDistrito => "nombre_distrito",
            Self::IdRegistro => "id_registro",
            Self::LastUpdated => "last_updated",
            Self::UpdatedBy => "updated_by",
        }
    }

    /// Look a field up by any accepted internal spelling.
    ///
    /// The input is normalized first, so `"año"`, `"Anio"` and `"anio"`
    /// all land on [`Field::Anio`].
    pub fn from_name(raw: &str) -> Option<Self> {
        let key = normalize(raw);
        if key == "ano" {
            return Some(Self::Anio);
        }
        Self::ALL.iter().copied().find(|f| f.name() == key)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// FieldName
// =============================================================================

/// A recognized field, or an extra name kept for forward compatibility.
///
/// Extras hold the normalized spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldName {
    Known(Field),
    Extra(String),
}

impl FieldName {
    pub fn parse(raw: &str) -> Self {
        match Field::from_name(raw) {
            Some(field) => Self::Known(field),
            None => Self::Extra(normalize(raw)),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(field) => field.name(),
            Self::Extra(name) => name,
        }
    }

    pub fn field(&self) -> Option<Field> {
        match self {
            Self::Known(field) => Some(*field),
            Self::Extra(_) => None,
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FieldName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl From<Field> for FieldName {
    fn from(field: Field) -> Self {
        Self::Known(field)
    }
}

impl From<&str> for FieldName {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

// =============================================================================
// Record
// =============================================================================

/// One logical entity/event in internal field names.
///
/// Records are values: builders take `self` and return a new record, and
/// [`Record::merged`] produces a fresh record instead of editing in place.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Cell>", into = "BTreeMap<String, Cell>")]
pub struct Record {
    values: BTreeMap<FieldName, Cell>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy with `name` set to `value`.
    pub fn with(mut self, name: impl Into<FieldName>, value: impl Into<Cell>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Return a copy without `name`.
    pub fn without(mut self, name: impl Into<FieldName>) -> Self {
        self.values.remove(&name.into());
        self
    }

    pub fn get(&self, field: Field) -> Option<&Cell> {
        self.values.get(&FieldName::Known(field))
    }

    pub fn get_name(&self, name: &FieldName) -> Option<&Cell> {
        self.values.get(name)
    }

    /// Trimmed display value, empty when absent.
    pub fn text(&self, field: Field) -> String {
        self.get(field).map(Cell::trimmed).unwrap_or_default()
    }

    /// Absent, empty, or whitespace only.
    pub fn is_blank(&self, field: Field) -> bool {
        self.get(field).map_or(true, Cell::is_blank)
    }

    pub fn contains(&self, name: &FieldName) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldName, &Cell)> {
        self.values.iter()
    }

    /// Entries whose names are not recognized fields.
    pub fn extras(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.values.iter().filter_map(|(name, cell)| match name {
            FieldName::Extra(extra) => Some((extra.as_str(), cell)),
            FieldName::Known(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// New record with `updates` laid over this one.
    pub fn merged(&self, updates: &Record) -> Record {
        let mut values = self.values.clone();
        for (name, cell) in &updates.values {
            values.insert(name.clone(), cell.clone());
        }
        Record { values }
    }
}

impl From<BTreeMap<String, Cell>> for Record {
    fn from(map: BTreeMap<String, Cell>) -> Self {
        let values = map
            .into_iter()
            .map(|(name, cell)| (FieldName::parse(&name), cell))
            .filter(|(name, _)| !name.as_str().is_empty())
            .collect();
        Record { values }
    }
}

impl From<Record> for BTreeMap<String, Cell> {
    fn from(record: Record) -> Self {
        record
            .values
            .into_iter()
            .map(|(name, cell)| (name.as_str().to_string(), cell))
            .collect()
    }
}

impl FromIterator<(FieldName, Cell)> for Record {
    fn from_iter<I: IntoIterator<Item = (FieldName, Cell)>>(iter: I) -> Self {
        Record {
            values: iter.into_iter().collect(),
        }
    }
}

// =============================================================================
// RemoteTable
// =============================================================================

/// Ordered headers plus rows, each row padded or cut to the header width.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RemoteTable {
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Cell>>,
}

impl RemoteTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = headers.len();
        let rows = rows.iter().map(|row| fit_row(row, width)).collect();
        Self { headers, rows }
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }
}

/// Copy of `row` right-padded with empty cells (or cut) to `width`.
pub fn fit_row(row: &[Cell], width: usize) -> Vec<Cell> {
    let mut fitted: Vec<Cell> = row.iter().take(width).cloned().collect();
    fitted.resize(width, Cell::Empty);
    fitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_names_are_normalized_forms() {
        for field in Field::ALL {
            assert_eq!(normalize(field.name()), field.name());
            assert_eq!(Field::from_name(field.name()), Some(field));
        }
    }

    #[test]
    fn test_year_spellings() {
        assert_eq!(Field::from_name("año"), Some(Field::Anio));
        assert_eq!(Field::from_name("Anio"), Some(Field::Anio));
        assert_eq!(Field::from_name("desconocido"), None);
    }

    #[test]
    fn test_field_name_extra_bucket() {
        assert_eq!(FieldName::parse("Estado "), FieldName::Known(Field::Estado));
        assert_eq!(
            FieldName::parse("Observación"),
            FieldName::Extra("observacion".into())
        );
    }

    #[test]
    fn test_record_merge_is_non_destructive() {
        let prior = Record::new()
            .with(Field::Codigo, "123")
            .with(Field::Estado, "En proceso");
        let updates = Record::new().with(Field::Estado, "Emitido");

        let merged = prior.merged(&updates);
        assert_eq!(merged.text(Field::Estado), "Emitido");
        assert_eq!(merged.text(Field::Codigo), "123");
        assert_eq!(prior.text(Field::Estado), "En proceso");
    }

    #[test]
    fn test_record_from_form_json() {
        let record: Record = serde_json::from_value(json!({
            "codigo": "123",
            "año": "2025",
            "cantidad_revisiones": 2,
            "observacion": "nota",
            "fecha_it": null
        }))
        .unwrap();

        assert_eq!(record.text(Field::Anio), "2025");
        assert_eq!(record.get(Field::CantidadRevisiones), Some(&Cell::Number(2.0)));
        assert_eq!(record.get(Field::FechaIt), Some(&Cell::Empty));
        assert_eq!(record.extras().collect::<Vec<_>>(), vec![("observacion", &Cell::text("nota"))]);
    }

    #[test]
    fn test_remote_table_pads_short_rows() {
        let table = RemoteTable::new(
            vec!["A".into(), "B".into(), "C".into()],
            vec![vec![Cell::text("1")], vec![Cell::text("1"), Cell::text("2"), Cell::text("3"), Cell::text("4")]],
        );
        assert_eq!(table.rows[0], vec![Cell::text("1"), Cell::Empty, Cell::Empty]);
        assert_eq!(table.rows[1].len(), 3);
    }
}
