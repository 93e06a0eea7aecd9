//! HTTP API module.
//!
//! This module provides the HTTP server and the JSON payloads it exchanges
//! with the form front end.

pub mod server;
pub mod types;

pub use server::{router, start_server, AppState};
pub use types::*;
