//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler. Rendered as `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("missing or invalid bearer token")]
  Unauthorized,

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The payload parsed but breaks a rule, e.g. `endAt <= startAt`.
  #[error("unprocessable: {0}")]
  Unprocessable(String),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
      ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let message = match &self {
      ApiError::Unauthorized => "unauthorized".to_string(),
      ApiError::Forbidden(m)
      | ApiError::NotFound(m)
      | ApiError::BadRequest(m)
      | ApiError::Unprocessable(m) => m.clone(),
    };
    (self.status(), Json(json!({ "error": message }))).into_response()
  }
}
