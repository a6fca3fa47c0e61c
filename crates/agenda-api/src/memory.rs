//! In-memory, per-organization event storage.
//!
//! Holds the canonical server-side state for the reference API. Also owns
//! the notification records: they are created from the draft's
//! [`NotificationLead`] and follow the event when it moves.

use std::{
  collections::HashMap,
  sync::{Mutex, MutexGuard, PoisonError},
};

use agenda_core::{
  bulk::BulkDeleteFilter,
  guard::validate_range,
  model::{
    Event,
    EventDraft,
    EventId,
    EventPatch,
    Notification,
    NotificationLead,
    NotificationStatus,
  },
};
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::error::ApiError;

const TITLE_REQUIRED: &str = "O título do evento é obrigatório.";
const RANGE_INVALID: &str = "O término do evento deve ser após o início.";

#[derive(Default)]
pub struct MemoryBackend {
  orgs: Mutex<HashMap<String, Vec<Event>>>,
}

fn validate(title: &str, start_at: NaiveDateTime, end_at: NaiveDateTime) -> Result<(), ApiError> {
  if title.trim().is_empty() {
    return Err(ApiError::Unprocessable(TITLE_REQUIRED.into()));
  }
  validate_range(start_at, end_at).map_err(|_| ApiError::Unprocessable(RANGE_INVALID.into()))
}

/// The PENDING reminder implied by `lead`, if any.
fn schedule(lead: NotificationLead, event: &Event, org_id: &str) -> Option<Notification> {
  let lead = lead.duration()?;
  Some(Notification {
    id:           Uuid::new_v4().to_string(),
    send_at:      event.start_at - lead,
    status:       NotificationStatus::Pending,
    recipient_id: event.assignee_id.clone().unwrap_or_else(|| org_id.to_owned()),
  })
}

fn not_found(id: &EventId) -> ApiError { ApiError::NotFound(format!("event {id}")) }

impl MemoryBackend {
  pub fn new() -> Self { Self::default() }

  fn orgs(&self) -> MutexGuard<'_, HashMap<String, Vec<Event>>> {
    self.orgs.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Store `event` as-is, replacing any event with the same id.
  pub fn insert(&self, org_id: &str, event: Event) {
    let mut orgs = self.orgs();
    let events = orgs.entry(org_id.to_owned()).or_default();
    events.retain(|e| e.id != event.id);
    events.push(event);
  }

  /// Every event of the organization, ordered by start.
  pub fn list(&self, org_id: &str) -> Vec<Event> {
    let mut events = self.orgs().get(org_id).cloned().unwrap_or_default();
    events.sort_by(|a, b| a.start_at.cmp(&b.start_at).then_with(|| a.id.cmp(&b.id)));
    events
  }

  pub fn create(&self, org_id: &str, draft: EventDraft) -> Result<Event, ApiError> {
    validate(&draft.title, draft.start_at, draft.end_at)?;

    let lead = draft.notification;
    let mut event = Event {
      id:            EventId::new(Uuid::new_v4().to_string()),
      title:         draft.title,
      description:   draft.description,
      start_at:      draft.start_at,
      end_at:        draft.end_at,
      color:         draft.color,
      assignee_id:   draft.assignee_id,
      categories:    draft.categories,
      notifications: Vec::new(),
    };
    let reminder = schedule(lead, &event, org_id);
    event.notifications.extend(reminder);

    self.orgs().entry(org_id.to_owned()).or_default().push(event.clone());
    Ok(event)
  }

  /// Apply `patch`. A new lead replaces the pending reminders; otherwise a
  /// moved start shifts them by the same amount.
  pub fn update(&self, org_id: &str, id: &EventId, patch: &EventPatch) -> Result<Event, ApiError> {
    let mut orgs = self.orgs();
    let slot = orgs
      .get_mut(org_id)
      .and_then(|events| events.iter_mut().find(|e| &e.id == id))
      .ok_or_else(|| not_found(id))?;

    let mut next = slot.patched(patch);
    validate(&next.title, next.start_at, next.end_at)?;

    let pending = NotificationStatus::Pending;
    if let Some(lead) = patch.notification {
      next.notifications.retain(|n| n.status != pending);
      let reminder = schedule(lead, &next, org_id);
      next.notifications.extend(reminder);
    } else {
      let delta = next.start_at - slot.start_at;
      for n in next.notifications.iter_mut().filter(|n| n.status == pending) {
        n.send_at += delta;
      }
    }

    *slot = next.clone();
    Ok(next)
  }

  pub fn delete(&self, org_id: &str, id: &EventId) -> Result<(), ApiError> {
    let mut orgs = self.orgs();
    let events = orgs.get_mut(org_id).ok_or_else(|| not_found(id))?;
    let before = events.len();
    events.retain(|e| &e.id != id);
    if events.len() == before {
      return Err(not_found(id));
    }
    Ok(())
  }

  /// Remove every event matching `filter`; returns how many were removed.
  pub fn bulk_delete(&self, org_id: &str, filter: &BulkDeleteFilter) -> usize {
    let mut orgs = self.orgs();
    let Some(events) = orgs.get_mut(org_id) else { return 0 };
    let before = events.len();
    events.retain(|e| !filter.matches(e));
    before - events.len()
  }
}
