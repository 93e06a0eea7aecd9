//! Business rules a record must pass before it is written.
//!
//! Every rule runs on every record; the result lists all violations at
//! once so the form can show them together. Rules never touch the record.
//!
//! # Rules
//!
//! - `periodo` is required and looks like `2025-2027` (two four-digit years;
//!   the order of the years is not checked)
//! - when `estado` is exactly `Emitido`, `expediente`, `numero_it` and
//!   `fecha_it` must each be filled in
//!
//! # Example
//!
//! ```rust,ignore
//! use peitrack::validation::validate;
//!
//! let errors = validate(&record);
//! if !errors.is_empty() {
//!     // block the write and show every message
//! }
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ValidationError;
use crate::models::{Cell, Field, Record};

static PERIODO_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{4}$").expect("Invalid periodo pattern"));

/// Status value that requires the technical-report details.
pub const ESTADO_EMITIDO: &str = "Emitido";

/// Fields required once a report is issued, with the message for each.
const EMITIDO_REQUIRED: [(Field, &str); 3] = [
    (Field::Expediente, "Para Estado=Emitido debes completar Expediente (SGD)."),
    (Field::NumeroIt, "Para Estado=Emitido debes completar Número de I.T."),
    (Field::FechaIt, "Para Estado=Emitido debes completar Fecha de I.T."),
];

/// Check `record` against every rule. An empty list means valid.
pub fn validate(record: &Record) -> Vec<String> {
    let mut errors = Vec::new();

    let periodo = record.text(Field::Periodo);
    if periodo.is_empty() {
        errors.push("Periodo PEI es obligatorio.".to_string());
    } else if !PERIODO_PATTERN.is_match(&periodo) {
        errors.push("Periodo PEI debe tener el formato YYYY-YYYY (ej. 2028-2033).".to_string());
    }

    if is_emitido(record) {
        for (field, message) in EMITIDO_REQUIRED {
            if record.is_blank(field) {
                errors.push(message.to_string());
            }
        }
    }

    errors
}

pub fn is_valid(record: &Record) -> bool {
    validate(record).is_empty()
}

/// [`validate`] as a `Result`, for callers that propagate with `?`.
pub fn ensure_valid(record: &Record) -> Result<(), ValidationError> {
    let errors = validate(record);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Rejected { errors })
    }
}

/// Exact, case-sensitive comparison with the issued status.
fn is_emitido(record: &Record) -> bool {
    matches!(record.get(Field::Estado), Some(Cell::Text(estado)) if estado == ESTADO_EMITIDO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_single_missing_field_single_error() {
        let errors = validate(&record(json!({
            "periodo": "2025-2027",
            "estado": "Emitido",
            "expediente": "",
            "numero_it": "X1",
            "fecha_it": "2025-01-01"
        })));
        assert_eq!(errors, vec!["Para Estado=Emitido debes completar Expediente (SGD)."]);
    }

    #[test]
    fn test_errors_accumulate() {
        let errors = validate(&record(json!({
            "periodo": "2025",
            "estado": "Emitido",
            "expediente": "  "
        })));
        assert_eq!(errors.len(), 4);
        assert!(errors[0].contains("YYYY-YYYY"));
    }

    #[test]
    fn test_periodo_required() {
        let errors = validate(&Record::new().with(Field::Estado, "En proceso"));
        assert_eq!(errors, vec!["Periodo PEI es obligatorio."]);
        assert!(is_valid(&Record::new().with(Field::Periodo, " 2028-2033 ")));
    }

    #[test]
    fn test_periodo_pattern_is_literal() {
        assert!(is_valid(&Record::new().with(Field::Periodo, "2030-2025")));
        assert!(!is_valid(&Record::new().with(Field::Periodo, "2025/2027")));
        assert!(!is_valid(&Record::new().with(Field::Periodo, "2025-2027-2029")));
        assert!(!is_valid(&Record::new().with(Field::Periodo, "٢٠٢٥-٢٠٢٧")));
    }

    #[test]
    fn test_estado_match_is_exact() {
        let base = Record::new().with(Field::Periodo, "2025-2027");
        assert!(is_valid(&base.clone().with(Field::Estado, "emitido")));
        assert!(!is_valid(&base.with(Field::Estado, "Emitido")));
    }

    #[test]
    fn test_issued_record_with_date_cell() {
        let fecha = chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let record = Record::new()
            .with(Field::Periodo, "2025-2027")
            .with(Field::Estado, ESTADO_EMITIDO)
            .with(Field::Expediente, "EXP-1")
            .with(Field::NumeroIt, "X1")
            .with(Field::FechaIt, fecha);
        assert!(ensure_valid(&record).is_ok());
    }

    #[test]
    fn test_ensure_valid_keeps_messages() {
        let err = ensure_valid(&Record::new()).unwrap_err();
        assert_eq!(err.messages(), ["Periodo PEI es obligatorio."]);
    }
}
