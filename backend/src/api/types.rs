//! REST API payloads.
//!
//! Records travel as flat JSON objects keyed by internal field name
//! (`{"codigo": "123", "estado": "Emitido", ...}`); unknown keys are kept
//! as extras and written to any column whose header matches them.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::directory::Unit;
use crate::error::{LedgerError, SchemaError, ServerError, WriteError};
use crate::models::Record;

/// Query string of `GET /api/units`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnitsQuery {
    pub responsable: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitEntry {
    #[serde(flatten)]
    pub unit: Unit,
    /// `codigo - nombre - departamento`
    pub label: String,
    /// Choices for the `articulacion` field of this unit's records.
    pub articulacion_options: &'static [&'static str],
}

impl From<&Unit> for UnitEntry {
    fn from(unit: &Unit) -> Self {
        Self {
            label: unit.label(),
            articulacion_options: unit.articulacion_options(),
            unit: unit.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub codigo: String,
    pub count: usize,
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResponse {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub status: String,
    pub id_registro: String,
    pub record: Record,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResponse {
    pub status: String,
    pub id_registro: String,
    pub row: usize,
}

/// Status code for a failed request.
pub fn status_for(error: &ServerError) -> StatusCode {
    match error {
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::NotFound(_) => StatusCode::NOT_FOUND,
        ServerError::Ledger(ledger) => match ledger {
            LedgerError::Validation(_) | LedgerError::Write(WriteError::MissingIdentifier { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            LedgerError::Write(WriteError::NotFound { .. }) => StatusCode::NOT_FOUND,
            LedgerError::Write(WriteError::Transport(_)) | LedgerError::Transport(_) => StatusCode::BAD_GATEWAY,
            LedgerError::Write(_) | LedgerError::Schema(SchemaError::MissingIdentifier { .. }) => {
                StatusCode::BAD_GATEWAY
            }
            LedgerError::Schema(_) | LedgerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

/// Create an error response. Validation failures also list every message.
pub fn error_response(error: &ServerError) -> Value {
    let errors = match error {
        ServerError::Ledger(LedgerError::Validation(rejected)) => rejected.messages().to_vec(),
        _ => Vec::new(),
    };
    json!({
        "status": "error",
        "error": error.to_string(),
        "errors": errors,
    })
}
