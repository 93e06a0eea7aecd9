//! Bidirectional alias tables between internal field names and
//! normalized spreadsheet header keys.
//!
//! The map is built once from a [`SchemaDocument`] (the built-in table or a
//! JSON file) and then only read. Many internal spellings may point at the
//! same external key; the first one registered becomes the canonical
//! internal name for the reverse direction. One internal name pointing at
//! two external keys is rejected when the map is built.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use super::normalize::NormalizedKey;
use crate::error::{SchemaError, SchemaResult};
use crate::models::{Field, FieldName};

/// Built-in alias table for the PEI history workbook, in registration order.
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("codigo", "id_ue"),
    ("nombre", "nombre_unidad_ejecutora"),
    ("año", "ano"),
    ("anio", "ano"),
    ("ng1", "n_g_1"),
    ("ng2", "n_g_2"),
    ("fecha_recepcion", "fecha_de_recepcion"),
    ("periodo", "periodo_pei"),
    ("vigencia", "vigencia"),
    ("tipo_pei", "tipo_de_pei"),
    ("estado", "estado"),
    ("responsable_institucional", "responsable_institucional"),
    ("cantidad_revisiones", "cantidad_de_revisiones"),
    ("fecha_derivacion", "fecha_de_derivacion"),
    ("etapa_revision", "etapas_de_revision"),
    ("comentario", "comentario_adicional_emisor_de_i_t"),
    ("articulacion", "articulacion"),
    ("expediente", "expediente"),
    ("fecha_it", "fecha_de_i_t"),
    ("numero_it", "numero_de_i_t"),
    ("fecha_oficio", "fecha_oficio"),
    ("numero_oficio", "numero_oficio"),
    ("id_sector", "id_sector"),
    ("nombre_sector", "nombre_sector"),
    ("id_pliego", "id_pliego"),
    ("nombre_pliego", "nombre_pliego"),
    ("id_departamento", "id_departamento"),
    ("nombre_departamento", "nombre_departamento"),
    ("id_provincia", "id_provincia"),
    ("nombre_provincia", "nombre_provincia"),
    ("id_4distrito", "id_4distrito"),
    ("nombre_distrito", "nombre_distrito"),
    ("id_registro", "idregistro"),
    ("last_updated", "lastupdated"),
    ("updated_by", "updatedby"),
];

/// One internal name pointing at one normalized external key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAlias {
    pub internal: String,
    pub external: NormalizedKey,
}

impl FieldAlias {
    pub fn new(internal: impl Into<String>, external: &str) -> Self {
        Self {
            internal: internal.into(),
            external: NormalizedKey::new(external),
        }
    }
}

/// Serialized form of a schema map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDocument {
    /// Free-form description of the workbook this document targets.
    #[serde(default)]
    pub description: String,
    pub aliases: Vec<FieldAlias>,
}

/// Immutable alias tables, shared by reference across readers and writers.
#[derive(Debug, Clone)]
pub struct SchemaMap {
    aliases: Vec<FieldAlias>,
    to_external: HashMap<FieldName, NormalizedKey>,
    to_internal: HashMap<NormalizedKey, FieldName>,
}

impl SchemaMap {
    /// Build a map from aliases in registration order.
    pub fn new(aliases: impl IntoIterator<Item = FieldAlias>) -> SchemaResult<Self> {
        let mut map = Self {
            aliases: Vec::new(),
            to_external: HashMap::new(),
            to_internal: HashMap::new(),
        };

        for alias in aliases {
            map.register(alias)?;
        }

        Ok(map)
    }

    /// The alias table the PEI workbook was authored against.
    pub fn builtin() -> SchemaResult<Self> {
        Self::new(
            BUILTIN_ALIASES
                .iter()
                .map(|(internal, external)| FieldAlias::new(*internal, external)),
        )
    }

    pub fn from_document(document: SchemaDocument) -> SchemaResult<Self> {
        Self::new(document.aliases)
    }

    pub fn from_json(json: &str) -> SchemaResult<Self> {
        let document: SchemaDocument = serde_json::from_str(json)?;
        Self::from_document(document)
    }

    pub fn from_path(path: &Path) -> SchemaResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load from `path` when given, otherwise the built-in table.
    pub fn load(path: Option<&Path>) -> SchemaResult<Self> {
        match path {
            Some(p) => {
                debug!(path = %p.display(), "loading schema document");
                Self::from_path(p)
            }
            None => Self::builtin(),
        }
    }

    fn register(&mut self, alias: FieldAlias) -> SchemaResult<()> {
        let name = FieldName::parse(&alias.internal);
        if name.as_str().is_empty() || alias.external.is_empty() {
            return Err(SchemaError::EmptyAlias(alias.internal));
        }

        match self.to_external.get(&name) {
            Some(existing) if *existing != alias.external => {
                return Err(SchemaError::ConflictingAlias {
                    internal: alias.internal,
                    first: existing.to_string(),
                    second: alias.external.to_string(),
                });
            }
            Some(_) => {}
            None => {
                self.to_external.insert(name.clone(), alias.external.clone());
            }
        }

        match self.to_internal.get(&alias.external) {
            Some(canonical) if *canonical != name => {
                debug!(
                    external = %alias.external,
                    canonical = %canonical,
                    alias = %name,
                    "external key already has a canonical internal name"
                );
            }
            Some(_) => {}
            None => {
                self.to_internal.insert(alias.external.clone(), name);
            }
        }

        self.aliases.push(alias);
        Ok(())
    }

    /// External key for an internal name. Unmapped names fall back to
    /// their own normalized form.
    pub fn resolve_external(&self, name: &FieldName) -> NormalizedKey {
        self.to_external
            .get(name)
            .cloned()
            .unwrap_or_else(|| NormalizedKey::new(name.as_str()))
    }

    /// External key for a recognized field.
    pub fn external_key(&self, field: Field) -> NormalizedKey {
        self.resolve_external(&FieldName::Known(field))
    }

    /// Canonical internal name for a normalized header key, if the column
    /// is known to the application.
    pub fn resolve_internal(&self, key: &str) -> Option<&FieldName> {
        self.to_internal.get(key)
    }

    /// Aliases in registration order.
    pub fn aliases(&self) -> &[FieldAlias] {
        &self.aliases
    }

    pub fn to_document(&self) -> SchemaDocument {
        SchemaDocument {
            description: String::new(),
            aliases: self.aliases.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_builtin_is_consistent() {
        let schema = SchemaMap::builtin().unwrap();
        assert_eq!(schema.aliases().len(), BUILTIN_ALIASES.len());
        assert_eq!(schema.external_key(Field::Codigo).as_str(), "id_ue");
        assert_eq!(schema.external_key(Field::Comentario).as_str(), "comentario_adicional_emisor_de_i_t");
    }

    #[test]
    fn test_every_field_has_builtin_alias() {
        let schema = SchemaMap::builtin().unwrap();
        for field in Field::ALL {
            let key = schema.external_key(field);
            assert_eq!(
                schema.resolve_internal(key.as_str()),
                Some(&FieldName::Known(field)),
                "{field} does not round-trip"
            );
        }
    }

    #[test]
    fn test_many_internal_names_one_external() {
        let schema = SchemaMap::builtin().unwrap();
        assert_eq!(schema.resolve_external(&FieldName::parse("año")).as_str(), "ano");
        assert_eq!(schema.resolve_external(&FieldName::parse("anio")).as_str(), "ano");
        assert_eq!(schema.resolve_internal("ano"), Some(&FieldName::Known(Field::Anio)));
    }

    #[test]
    fn test_first_registered_wins_on_reverse_collision() {
        let schema = SchemaMap::new(vec![
            FieldAlias::new("observacion", "nota"),
            FieldAlias::new("comentario", "nota"),
        ])
        .unwrap();
        assert_eq!(
            schema.resolve_internal("nota"),
            Some(&FieldName::Extra("observacion".into()))
        );
        assert_eq!(schema.external_key(Field::Comentario).as_str(), "nota");
    }

    #[test]
    fn test_one_internal_two_externals_rejected() {
        let result = SchemaMap::new(vec![
            FieldAlias::new("estado", "estado"),
            FieldAlias::new("Estado", "estado_actual"),
        ]);
        assert!(matches!(result, Err(SchemaError::ConflictingAlias { .. })));
    }

    #[test]
    fn test_identity_fallback() {
        let schema = SchemaMap::new(Vec::new()).unwrap();
        let key = schema.resolve_external(&FieldName::parse("Fecha de I.T"));
        assert_eq!(key.as_str(), "fecha_de_i_t");
        assert_eq!(schema.resolve_internal("fecha_de_i_t"), None);
    }

    #[test]
    fn test_load_document_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"aliases": [{{"internal": "codigo", "external": "Código UE"}}]}}"#
        )
        .unwrap();

        let schema = SchemaMap::load(Some(file.path())).unwrap();
        assert_eq!(schema.external_key(Field::Codigo).as_str(), "codigo_ue");
        assert_eq!(schema.resolve_internal("codigo_ue"), Some(&FieldName::Known(Field::Codigo)));
    }

    #[test]
    fn test_empty_alias_rejected() {
        let result = SchemaMap::new(vec![FieldAlias::new("codigo", "¿?")]);
        assert!(matches!(result, Err(SchemaError::EmptyAlias(_))));
    }
}
