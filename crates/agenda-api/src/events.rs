//! Handlers for `/events` endpoints.
//!
//! | Method   | Path            | Notes |
//! |----------|-----------------|-------|
//! | `GET`    | `/events`       | `?org=<id>` |
//! | `POST`   | `/events`       | Body: [`EventDraft`]; 201 |
//! | `DELETE` | `/events`       | Bulk; `?org=<id>[&year][&month][&start][&end]`; 204 |
//! | `PATCH`  | `/events/{id}`  | Body: [`EventPatch`]; 404 if not found |
//! | `DELETE` | `/events/{id}`  | 204; 404 if not found |

use agenda_core::{
  bulk::BulkDeleteFilter,
  model::{Event, EventDraft, EventId, EventPatch},
};
use axum::{
  Json,
  extract::{
    Path,
    Query,
    State,
    rejection::{JsonRejection, QueryRejection},
  },
  http::StatusCode,
  response::IntoResponse,
};

use crate::{AppState, auth::OrgAccess, error::ApiError};

fn body_error(rejection: JsonRejection) -> ApiError {
  if rejection.status() == StatusCode::UNPROCESSABLE_ENTITY {
    ApiError::Unprocessable(rejection.body_text())
  } else {
    ApiError::BadRequest(rejection.body_text())
  }
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /events?org=<id>`
pub async fn list(State(state): State<AppState>, access: OrgAccess) -> Json<Vec<Event>> {
  Json(state.backend.list(&access.org_id))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /events?org=<id>`
pub async fn create(
  State(state): State<AppState>,
  access: OrgAccess,
  body: Result<Json<EventDraft>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
  access.ensure_writable()?;
  let Json(draft) = body.map_err(body_error)?;
  let event = state.backend.create(&access.org_id, draft)?;
  tracing::info!(org = %access.org_id, id = %event.id, "event created");
  Ok((StatusCode::CREATED, Json(event)))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PATCH /events/{id}?org=<id>`
pub async fn update(
  State(state): State<AppState>,
  access: OrgAccess,
  Path(id): Path<EventId>,
  body: Result<Json<EventPatch>, JsonRejection>,
) -> Result<Json<Event>, ApiError> {
  access.ensure_writable()?;
  let Json(patch) = body.map_err(body_error)?;
  let event = state.backend.update(&access.org_id, &id, &patch)?;
  tracing::info!(org = %access.org_id, %id, "event updated");
  Ok(Json(event))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /events/{id}?org=<id>`
pub async fn delete_one(
  State(state): State<AppState>,
  access: OrgAccess,
  Path(id): Path<EventId>,
) -> Result<StatusCode, ApiError> {
  access.ensure_writable()?;
  state.backend.delete(&access.org_id, &id)?;
  tracing::info!(org = %access.org_id, %id, "event deleted");
  Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /events?org=<id>[&year=..][&month=..][&start=..][&end=..]`
///
/// No filter fields deletes every event of the organization.
pub async fn delete_many(
  State(state): State<AppState>,
  access: OrgAccess,
  filter: Result<Query<BulkDeleteFilter>, QueryRejection>,
) -> Result<StatusCode, ApiError> {
  access.ensure_writable()?;
  let Query(filter) = filter.map_err(|e| ApiError::BadRequest(e.body_text()))?;
  let removed = state.backend.bulk_delete(&access.org_id, &filter);
  tracing::info!(org = %access.org_id, scope = %filter.scope(), removed, "bulk delete");
  Ok(StatusCode::NO_CONTENT)
}
