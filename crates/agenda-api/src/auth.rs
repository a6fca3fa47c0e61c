//! Bearer-token and organization checks.
//!
//! Every route is scoped by `?org=<id>`. [`OrgAccess`] is the extractor that
//! proves the caller presented the server token and may see that
//! organization; writes additionally call [`OrgAccess::ensure_writable`].

use axum::{
  extract::{FromRequestParts, Query},
  http::{HeaderMap, header, request::Parts},
};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

const FORBIDDEN_ORG: &str = "Você não tem acesso a esta organização.";
const READ_ONLY_ORG: &str = "Sua organização não permite alterar a agenda.";

/// Who may call the API, and on which organizations.
#[derive(Debug, Clone, Default)]
pub struct AccessConfig {
  pub token:                   String,
  /// Empty means every organization is served.
  pub organizations:           Vec<String>,
  pub read_only_organizations: Vec<String>,
}

impl AccessConfig {
  fn allows(&self, org_id: &str) -> bool {
    self.organizations.is_empty() || self.organizations.iter().any(|o| o == org_id)
  }

  fn is_read_only(&self, org_id: &str) -> bool {
    self.read_only_organizations.iter().any(|o| o == org_id)
  }
}

/// Check `Authorization: Bearer <token>` against the configured token.
pub fn verify_bearer(headers: &HeaderMap, config: &AccessConfig) -> Result<(), ApiError> {
  let presented = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .ok_or(ApiError::Unauthorized)?;

  if config.token.is_empty() || presented != config.token {
    return Err(ApiError::Unauthorized);
  }
  Ok(())
}

#[derive(Debug, Deserialize)]
struct OrgQuery {
  org: String,
}

/// An authenticated caller acting on one organization.
#[derive(Debug, Clone)]
pub struct OrgAccess {
  pub org_id:    String,
  pub read_only: bool,
}

impl OrgAccess {
  pub fn ensure_writable(&self) -> Result<(), ApiError> {
    if self.read_only {
      return Err(ApiError::Forbidden(READ_ONLY_ORG.into()));
    }
    Ok(())
  }
}

impl FromRequestParts<AppState> for OrgAccess {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState,
  ) -> Result<Self, Self::Rejection> {
    verify_bearer(&parts.headers, &state.access)?;

    let Query(OrgQuery { org }) = Query::<OrgQuery>::from_request_parts(parts, state)
      .await
      .map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if org.trim().is_empty() {
      return Err(ApiError::BadRequest("missing org".into()));
    }
    if !state.access.allows(&org) {
      return Err(ApiError::Forbidden(FORBIDDEN_ORG.into()));
    }

    Ok(OrgAccess { read_only: state.access.is_read_only(&org), org_id: org })
  }
}
