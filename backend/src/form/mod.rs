//! Form draft seeded from a prior record.
//!
//! Choice fields in the history table were typed by hand over the years
//! (`en_proceso`, `EMITIDO`, `Revision DNCP`...). [`FormDraft::from_record`]
//! maps them leniently onto the labels the form offers, falling back to the
//! form defaults, so the latest record can seed a new one.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{Cell, Field, Record};
use crate::schema::normalize;

/// A closed set of labels offered by a form select.
pub trait Choice: Sized + Copy + Default + 'static {
    const ALL: &'static [Self];

    /// Label as written to the table.
    fn label(self) -> &'static str;

    /// Extra spellings accepted besides the label itself.
    fn aliases(self) -> &'static [&'static str] {
        &[]
    }

    /// Match `raw` ignoring case, accents, spacing and underscores.
    fn parse_lenient(raw: &str) -> Option<Self> {
        let key = normalize(raw);
        if key.is_empty() {
            return None;
        }
        Self::ALL.iter().copied().find(|choice| {
            normalize(choice.label()) == key || choice.aliases().iter().any(|a| normalize(a) == key)
        })
    }

    /// [`Choice::parse_lenient`] over a cell, with the default on no match.
    fn from_cell(cell: Option<&Cell>) -> Self {
        cell.and_then(|c| Self::parse_lenient(&c.trimmed())).unwrap_or_default()
    }
}

macro_rules! choice_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.label())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                <$ty>::parse_lenient(&raw)
                    .ok_or_else(|| serde::de::Error::custom(format!("unknown option '{raw}'")))
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Estado {
    #[default]
    EnProceso,
    Emitido,
}

impl Choice for Estado {
    const ALL: &'static [Self] = &[Self::EnProceso, Self::Emitido];

    fn label(self) -> &'static str {
        match self {
            Self::EnProceso => "En proceso",
            Self::Emitido => "Emitido",
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::EnProceso => &["proceso"],
            Self::Emitido => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Vigencia {
    #[default]
    Si,
    No,
}

impl Choice for Vigencia {
    const ALL: &'static [Self] = &[Self::Si, Self::No];

    fn label(self) -> &'static str {
        match self {
            Self::Si => "Sí",
            Self::No => "No",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TipoPei {
    #[default]
    Formulado,
    Ampliado,
    Actualizado,
}

impl Choice for TipoPei {
    const ALL: &'static [Self] = &[Self::Formulado, Self::Ampliado, Self::Actualizado];

    fn label(self) -> &'static str {
        match self {
            Self::Formulado => "Formulado",
            Self::Ampliado => "Ampliado",
            Self::Actualizado => "Actualizado",
        }
    }
}

/// Review stage of a PEI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EtapaRevision {
    #[default]
    ItEmitido,
    ParaEmisionIt,
    RevisionDncp,
    RevisionDnse,
    RevisionDnpe,
    SubsanacionPliego,
}

impl Choice for EtapaRevision {
    const ALL: &'static [Self] = &[
        Self::ItEmitido,
        Self::ParaEmisionIt,
        Self::RevisionDncp,
        Self::RevisionDnse,
        Self::RevisionDnpe,
        Self::SubsanacionPliego,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::ItEmitido => "IT Emitido",
            Self::ParaEmisionIt => "Para emisión de IT",
            Self::RevisionDncp => "Revisión DNCP",
            Self::RevisionDnse => "Revisión DNSE",
            Self::RevisionDnpe => "Revisión DNPE",
            Self::SubsanacionPliego => "Subsanación del pliego",
        }
    }
}

choice_serde!(Estado);
choice_serde!(Vigencia);
choice_serde!(TipoPei);
choice_serde!(EtapaRevision);

/// Articulation plans a unit can align to, by government level.
pub fn articulation_options(nivel_gobierno: &str) -> &'static [&'static str] {
    match nivel_gobierno.trim() {
        "Gobierno regional" => &["PEDN 2050", "PDRC"],
        "Gobierno nacional" => &["PEDN 2050", "PESEM NO vigente", "PESEM vigente"],
        "Municipalidad distrital" | "Municipalidad provincial" => {
            &["PEDN 2050", "PDRC", "PDLC Provincial", "PDLC Distrital"]
        }
        _ => &[],
    }
}

/// Editable part of a history record, with the form's defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FormDraft {
    pub tipo_pei: TipoPei,
    pub etapa_revision: EtapaRevision,
    pub fecha_recepcion: Option<NaiveDate>,
    pub articulacion: String,
    pub fecha_derivacion: Option<NaiveDate>,
    pub periodo: String,
    pub cantidad_revisiones: u32,
    pub comentario: String,
    pub vigencia: Vigencia,
    pub estado: Estado,
    pub expediente: String,
    pub fecha_it: Option<NaiveDate>,
    pub numero_it: String,
    pub fecha_oficio: Option<NaiveDate>,
    pub numero_oficio: String,
}

impl FormDraft {
    /// Seed a draft from an existing record. Unreadable values fall back to
    /// the defaults.
    pub fn from_record(record: &Record) -> Self {
        let date = |field| record.get(field).and_then(|c| c.as_date().parsed());

        Self {
            tipo_pei: TipoPei::from_cell(record.get(Field::TipoPei)),
            etapa_revision: EtapaRevision::from_cell(record.get(Field::EtapaRevision)),
            fecha_recepcion: date(Field::FechaRecepcion),
            articulacion: record.text(Field::Articulacion),
            fecha_derivacion: date(Field::FechaDerivacion),
            periodo: record.text(Field::Periodo),
            cantidad_revisiones: record.get(Field::CantidadRevisiones).map_or(0, count),
            comentario: record.text(Field::Comentario),
            vigencia: Vigencia::from_cell(record.get(Field::Vigencia)),
            estado: Estado::from_cell(record.get(Field::Estado)),
            expediente: record.text(Field::Expediente),
            fecha_it: date(Field::FechaIt),
            numero_it: record.text(Field::NumeroIt),
            fecha_oficio: date(Field::FechaOficio),
            numero_oficio: record.text(Field::NumeroOficio),
        }
    }
}

fn count(cell: &Cell) -> u32 {
    match cell {
        Cell::Number(n) if n.is_finite() && *n >= 0.0 && n.fract() == 0.0 => *n as u32,
        Cell::Text(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_choices() {
        assert_eq!(Estado::parse_lenient("en_proceso"), Some(Estado::EnProceso));
        assert_eq!(Estado::parse_lenient("  EMITIDO "), Some(Estado::Emitido));
        assert_eq!(Estado::parse_lenient("proceso"), Some(Estado::EnProceso));
        assert_eq!(Vigencia::parse_lenient("si"), Some(Vigencia::Si));
        assert_eq!(EtapaRevision::parse_lenient("revision  dncp"), Some(EtapaRevision::RevisionDncp));
        assert_eq!(
            EtapaRevision::parse_lenient("Subsanacion del pliego"),
            Some(EtapaRevision::SubsanacionPliego)
        );
        assert_eq!(TipoPei::parse_lenient("otro"), None);
    }

    #[test]
    fn test_from_record_with_defaults() {
        let record = Record::new()
            .with(Field::Estado, "en_proceso")
            .with(Field::Vigencia, "NO")
            .with(Field::TipoPei, "desconocido")
            .with(Field::FechaRecepcion, "15/03/2024")
            .with(Field::FechaIt, "None")
            .with(Field::CantidadRevisiones, 3.0)
            .with(Field::Periodo, " 2025-2027 ");

        let draft = FormDraft::from_record(&record);
        assert_eq!(draft.estado, Estado::EnProceso);
        assert_eq!(draft.vigencia, Vigencia::No);
        assert_eq!(draft.tipo_pei, TipoPei::Formulado);
        assert_eq!(draft.etapa_revision, EtapaRevision::ItEmitido);
        assert_eq!(draft.fecha_recepcion, NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(draft.fecha_it, None);
        assert_eq!(draft.cantidad_revisiones, 3);
        assert_eq!(draft.periodo, "2025-2027");
    }

    #[test]
    fn test_serde_labels() {
        let json = serde_json::to_value(FormDraft::default()).unwrap();
        assert_eq!(json["etapa_revision"], "IT Emitido");
        let back: FormDraft = serde_json::from_value(serde_json::json!({
            "estado": "emitido",
            "periodo": "2025-2027"
        }))
        .unwrap();
        assert_eq!(back.estado, Estado::Emitido);
        assert_eq!(back.tipo_pei, TipoPei::Formulado);
    }

    #[test]
    fn test_articulation_by_level() {
        assert_eq!(articulation_options("Gobierno regional"), ["PEDN 2050", "PDRC"]);
        assert_eq!(articulation_options("Municipalidad provincial").len(), 4);
        assert!(articulation_options("Otro").is_empty());
    }
}
