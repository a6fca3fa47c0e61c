//! Reference JSON REST API for the agenda event service.
//!
//! Exposes an axum [`Router`] over an in-memory, multi-organization
//! [`MemoryBackend`]. It speaks the same contract the `agenda-client`
//! `HttpRemote` consumes and is used as a local development server and as
//! the counterpart in end-to-end client tests.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = agenda_api::router(AppState::new(&config));
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod error;
pub mod events;
pub mod memory;

use std::sync::Arc;

use axum::{Router, routing::{get, patch}};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

pub use auth::AccessConfig;
pub use error::ApiError;
pub use memory::MemoryBackend;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `AGENDA_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                    String,
  pub port:                    u16,
  /// Bearer token every request must present.
  pub token:                   String,
  /// Organizations served; empty serves any.
  pub organizations:           Vec<String>,
  /// Organizations that may read but not write.
  pub read_only_organizations: Vec<String>,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                    "127.0.0.1".to_string(),
      port:                    8080,
      token:                   String::new(),
      organizations:           Vec::new(),
      read_only_organizations: Vec::new(),
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState {
  pub backend: Arc<MemoryBackend>,
  pub access:  Arc<AccessConfig>,
}

impl AppState {
  pub fn new(config: &ServerConfig) -> Self {
    Self {
      backend: Arc::new(MemoryBackend::new()),
      access:  Arc::new(AccessConfig {
        token:                   config.token.clone(),
        organizations:           config.organizations.clone(),
        read_only_organizations: config.read_only_organizations.clone(),
      }),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router for `state`.
pub fn router(state: AppState) -> Router {
  Router::new()
    .route(
      "/events",
      get(events::list).post(events::create).delete(events::delete_many),
    )
    .route("/events/{id}", patch(events::update).delete(events::delete_one))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
