//! HTTP server for the PEI form.
//!
//! Every handler goes through the shared [`Ledger`], so reads always reflect
//! the live table and writes are validated before they reach it.
//!
//! # API Endpoints
//!
//! | Method | Path                           | Description                               |
//! |--------|--------------------------------|-------------------------------------------|
//! | GET    | `/health`                      | Health check                              |
//! | GET    | `/api/units`                   | Executing units (`?responsable=` filter)  |
//! | GET    | `/api/responsables`            | Distinct responsible officers             |
//! | GET    | `/api/history/{codigo}`        | History records of one unit               |
//! | GET    | `/api/history/{codigo}/latest` | Most recent record of one unit            |
//! | GET    | `/api/history/{codigo}/draft`  | Form draft prefilled from the latest      |
//! | POST   | `/api/validate`                | Rule check without writing                |
//! | POST   | `/api/records`                 | Append a new history record               |
//! | PATCH  | `/api/records/{id}`            | Update the record keyed by `IdRegistro`   |

use axum::{
    extract::{Path, Query, State},
    http::{header, Method, StatusCode},
    response::Json,
    routing::{get, patch, post},
    Router,
};
use serde_json::{json, Value};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use super::types::{
    error_response, status_for, HistoryResponse, SubmitResponse, UnitEntry, UnitsQuery, UpdateResponse,
    ValidationResponse,
};
use crate::error::ServerError;
use crate::form::FormDraft;
use crate::ledger::Ledger;
use crate::models::{Field, Record};
use crate::table::TableBackend;

/// Shared handler state.
pub struct AppState {
    pub ledger: Ledger<TableBackend>,
    /// Snapshot file rewritten after each write when serving a fixture.
    pub fixture: Option<PathBuf>,
}

impl AppState {
    pub fn new(ledger: Ledger<TableBackend>) -> Self {
        Self { ledger, fixture: None }
    }

    pub fn with_fixture(mut self, path: PathBuf) -> Self {
        self.fixture = Some(path);
        self
    }

    fn persist(&self) {
        let (Some(path), Some(memory)) = (&self.fixture, self.ledger.store().as_memory()) else {
            return;
        };
        if let Err(e) = memory.save(path) {
            warn!(path = %path.display(), error = %e, "could not save fixture");
        }
    }
}

type Shared = Arc<AppState>;
type ApiError = (StatusCode, Json<Value>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn reject(error: impl Into<ServerError>) -> ApiError {
    let error = error.into();
    let status = status_for(&error);
    if status.is_server_error() {
        error!(status = status.as_u16(), %error, "request failed");
    } else {
        warn!(status = status.as_u16(), %error, "request rejected");
    }
    (status, Json(error_response(&error)))
}

/// Routes over `state`, without CORS.
pub fn router(state: Shared) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/units", get(units))
        .route("/api/responsables", get(responsables))
        .route("/api/history/{codigo}", get(history))
        .route("/api/history/{codigo}/latest", get(latest))
        .route("/api/history/{codigo}/draft", get(draft))
        .route("/api/validate", post(validate))
        .route("/api/records", post(submit))
        .route("/api/records/{id}", patch(update))
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(port: u16, state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    let app = router(Arc::new(state)).layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "peitrack server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "peitrack",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn units(State(state): State<Shared>, Query(query): Query<UnitsQuery>) -> ApiResult<Vec<UnitEntry>> {
    let directory = state.ledger.directory().await.map_err(reject)?;
    let entries = match query.responsable.as_deref().filter(|r| !r.trim().is_empty()) {
        Some(responsable) => directory.units_for(responsable).into_iter().map(UnitEntry::from).collect(),
        None => directory.units().iter().map(UnitEntry::from).collect(),
    };
    Ok(Json(entries))
}

async fn responsables(State(state): State<Shared>) -> ApiResult<Vec<String>> {
    let directory = state.ledger.directory().await.map_err(reject)?;
    Ok(Json(directory.responsables()))
}

async fn history(State(state): State<Shared>, Path(codigo): Path<String>) -> ApiResult<HistoryResponse> {
    let records = state.ledger.history(&codigo).await.map_err(reject)?;
    Ok(Json(HistoryResponse {
        count: records.len(),
        codigo,
        records,
    }))
}

async fn latest(State(state): State<Shared>, Path(codigo): Path<String>) -> ApiResult<Record> {
    match state.ledger.latest(&codigo).await.map_err(reject)? {
        Some(record) => Ok(Json(record)),
        None => Err(reject(ServerError::NotFound(format!("no history for unit {codigo}")))),
    }
}

async fn draft(State(state): State<Shared>, Path(codigo): Path<String>) -> ApiResult<FormDraft> {
    let draft = state.ledger.prefill(&codigo).await.map_err(reject)?;
    Ok(Json(draft))
}

async fn validate(State(state): State<Shared>, Json(record): Json<Record>) -> Json<ValidationResponse> {
    Json(ValidationResponse::from_errors(state.ledger.check(&record)))
}

async fn submit(State(state): State<Shared>, Json(record): Json<Record>) -> ApiResult<SubmitResponse> {
    let written = state.ledger.submit(record).await.map_err(reject)?;
    state.persist();

    Ok(Json(SubmitResponse {
        status: "created".into(),
        id_registro: written.text(Field::IdRegistro),
        record: written,
    }))
}

async fn update(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(updates): Json<Record>,
) -> ApiResult<UpdateResponse> {
    if id.trim().is_empty() {
        return Err(reject(ServerError::BadRequest("empty IdRegistro".into())));
    }

    let row = state.ledger.update(&id, updates).await.map_err(reject)?;
    state.persist();

    Ok(Json(UpdateResponse {
        status: "updated".into(),
        id_registro: id,
        row,
    }))
}
