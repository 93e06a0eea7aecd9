//! Executing units and the officers responsible for them.
//!
//! Built from the units table, adapted with the same schema as the history
//! table.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::form::articulation_options;
use crate::history::identifier_key;
use crate::models::{Field, Record};

/// One executing unit (unidad ejecutora).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub codigo: String,
    pub nombre: String,
    pub responsable: String,
    pub nivel_gobierno: String,
    pub sector: String,
    pub departamento: String,
}

impl Unit {
    pub fn from_record(record: &Record) -> Self {
        Self {
            codigo: record.text(Field::Codigo),
            nombre: record.text(Field::Nombre),
            responsable: record.text(Field::ResponsableInstitucional),
            nivel_gobierno: record.text(Field::Ng1),
            sector: record.text(Field::NombreSector),
            departamento: record.text(Field::NombreDepartamento),
        }
    }

    /// `codigo - nombre - departamento`, as offered in the unit picker.
    pub fn label(&self) -> String {
        format!("{} - {} - {}", self.codigo, self.nombre, self.departamento)
    }

    /// Plans the unit can articulate with, by its government level.
    pub fn articulacion_options(&self) -> &'static [&'static str] {
        articulation_options(&self.nivel_gobierno)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UnitDirectory {
    units: Vec<Unit>,
}

impl UnitDirectory {
    /// Units without a code are skipped.
    pub fn from_records(records: &[Record]) -> Self {
        Self {
            units: records
                .iter()
                .map(Unit::from_record)
                .filter(|u| !u.codigo.is_empty())
                .collect(),
        }
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Distinct, non-empty responsible officers, sorted.
    pub fn responsables(&self) -> Vec<String> {
        self.units
            .iter()
            .filter(|u| !u.responsable.is_empty())
            .map(|u| u.responsable.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Units assigned to `responsable` (exact match after trimming).
    pub fn units_for(&self, responsable: &str) -> Vec<&Unit> {
        let responsable = responsable.trim();
        self.units.iter().filter(|u| u.responsable == responsable).collect()
    }

    /// Unit by code, with the same numeric tolerance as history lookups.
    pub fn find(&self, codigo: &str) -> Option<&Unit> {
        let wanted = identifier_key(codigo);
        self.units.iter().find(|u| identifier_key(&u.codigo) == wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(codigo: &str, nombre: &str, responsable: &str) -> Record {
        Record::new()
            .with(Field::Codigo, codigo)
            .with(Field::Nombre, nombre)
            .with(Field::ResponsableInstitucional, responsable)
            .with(Field::NombreDepartamento, "Lima")
    }

    fn directory() -> UnitDirectory {
        UnitDirectory::from_records(&[
            unit("1001", "Ministerio A", "Rosa Quispe"),
            unit("1002", "Ministerio B", "Ana Torres"),
            unit("1003", "Municipalidad C", "Rosa Quispe"),
            unit("1004", "Gobierno D", " "),
            unit("", "Sin código", "Ana Torres"),
        ])
    }

    #[test]
    fn test_responsables_distinct_sorted() {
        assert_eq!(directory().responsables(), vec!["Ana Torres", "Rosa Quispe"]);
    }

    #[test]
    fn test_units_for_responsable() {
        let dir = directory();
        let codes: Vec<_> = dir.units_for("Rosa Quispe ").iter().map(|u| u.codigo.as_str()).collect();
        assert_eq!(codes, vec!["1001", "1003"]);
        assert!(dir.units_for("Nadie").is_empty());
        assert_eq!(dir.len(), 4);
    }

    #[test]
    fn test_find_and_label() {
        let dir = directory();
        let found = dir.find("1002.0").unwrap();
        assert_eq!(found.label(), "1002 - Ministerio B - Lima");
        assert_eq!(found.responsable, "Ana Torres");
        assert!(dir.find("9999").is_none());
    }

    #[test]
    fn test_articulacion_follows_nivel_gobierno() {
        let record = unit("2001", "Gobierno Regional E", "Ana Torres").with(Field::Ng1, "Gobierno regional");
        let regional = Unit::from_record(&record);
        assert_eq!(regional.articulacion_options(), ["PEDN 2050", "PDRC"]);

        let unknown = Unit::from_record(&unit("2002", "Entidad F", "Ana Torres"));
        assert!(unknown.articulacion_options().is_empty());
    }
}
