//! Calendar data model shared by the core, the HTTP client and the reference
//! server.
//!
//! Timestamps are naive local date-times. No timezone arithmetic happens
//! anywhere in the workspace.

use std::fmt;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

// ─── Identity ────────────────────────────────────────────────────────────────

/// Opaque, server-assigned event identifier. Unique within an organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for EventId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for EventId {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

impl From<String> for EventId {
  fn from(s: String) -> Self { Self(s) }
}

// ─── Categories ──────────────────────────────────────────────────────────────

/// A denormalised `{name, color}` label. Categories have no lifecycle of
/// their own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
  pub name:  String,
  pub color: String,
}

// ─── Notifications ───────────────────────────────────────────────────────────

/// Delivery state of a notification record. Owned by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
  #[default]
  Pending,
  Sent,
  Failed,
}

/// A reminder attached to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
  pub id:           String,
  pub send_at:      NaiveDateTime,
  pub status:       NotificationStatus,
  pub recipient_id: String,
}

/// How long before the event start a reminder should be sent. Accepted by
/// `POST /events` and `PATCH /events/{id}`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationLead {
  #[default]
  None,
  #[serde(rename = "MINUTES_15")]
  #[strum(to_string = "minutes_15", serialize = "15m")]
  Minutes15,
  #[serde(rename = "HOUR_1")]
  #[strum(to_string = "hour_1", serialize = "1h")]
  Hour1,
  #[serde(rename = "DAY_1")]
  #[strum(to_string = "day_1", serialize = "1d")]
  Day1,
}

impl NotificationLead {
  /// The offset before `startAt`, or `None` when no reminder is wanted.
  pub fn duration(self) -> Option<Duration> {
    match self {
      Self::None => None,
      Self::Minutes15 => Some(Duration::minutes(15)),
      Self::Hour1 => Some(Duration::hours(1)),
      Self::Day1 => Some(Duration::days(1)),
    }
  }
}

// ─── Event ───────────────────────────────────────────────────────────────────

/// The central entity. Exists only once the server has assigned its `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
  pub id:            EventId,
  pub title:         String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description:   Option<String>,
  pub start_at:      NaiveDateTime,
  pub end_at:        NaiveDateTime,
  #[serde(default)]
  pub color:         String,
  /// Only used for view filtering.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub assignee_id:   Option<String>,
  #[serde(default)]
  pub categories:    Vec<Category>,
  #[serde(default)]
  pub notifications: Vec<Notification>,
}

impl Event {
  /// A copy of `self` with every field present in `patch` replaced.
  ///
  /// Notifications are not touched; their lifecycle belongs to the server.
  pub fn patched(&self, patch: &EventPatch) -> Event {
    let mut next = self.clone();
    if let Some(title) = &patch.title {
      next.title = title.clone();
    }
    if let Some(description) = &patch.description {
      next.description = description.clone();
    }
    if let Some(start_at) = patch.start_at {
      next.start_at = start_at;
    }
    if let Some(end_at) = patch.end_at {
      next.end_at = end_at;
    }
    if let Some(color) = &patch.color {
      next.color = color.clone();
    }
    if let Some(assignee_id) = &patch.assignee_id {
      next.assignee_id = assignee_id.clone();
    }
    if let Some(categories) = &patch.categories {
      next.categories = categories.clone();
    }
    next
  }

  /// The rendered `[startAt, endAt]` pair.
  pub fn range(&self) -> (NaiveDateTime, NaiveDateTime) {
    (self.start_at, self.end_at)
  }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Body of `POST /events`. The server assigns `id` and notification records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
  pub title:        String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description:  Option<String>,
  pub start_at:     NaiveDateTime,
  pub end_at:       NaiveDateTime,
  #[serde(default)]
  pub color:        String,
  #[serde(default)]
  pub notification: NotificationLead,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub assignee_id:  Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub categories:   Vec<Category>,
}

impl EventDraft {
  /// Convenience constructor with all optional fields set to their defaults.
  pub fn new(
    title: impl Into<String>,
    start_at: NaiveDateTime,
    end_at: NaiveDateTime,
  ) -> Self {
    Self {
      title: title.into(),
      description: None,
      start_at,
      end_at,
      color: String::new(),
      notification: NotificationLead::None,
      assignee_id: None,
      categories: Vec::new(),
    }
  }
}

/// Body of `PATCH /events/{id}`. Absent fields are left unchanged; for the
/// nullable fields `Some(None)` travels as `null` and clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title:        Option<String>,
  #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
  pub description:  Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub start_at:     Option<NaiveDateTime>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub end_at:       Option<NaiveDateTime>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub color:        Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub notification: Option<NotificationLead>,
  #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
  pub assignee_id:  Option<Option<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub categories:   Option<Vec<Category>>,
}

impl EventPatch {
  /// A patch that only moves the event to `[start_at, end_at]`.
  pub fn reschedule(start_at: NaiveDateTime, end_at: NaiveDateTime) -> Self {
    Self {
      start_at: Some(start_at),
      end_at: Some(end_at),
      ..Self::default()
    }
  }
}

/// A present key, `null` included, becomes `Some`; a missing key falls back
/// to the field default.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  Option::<T>::deserialize(deserializer).map(Some)
}

// ─── Credentials ─────────────────────────────────────────────────────────────

/// Bearer token and organization id, passed explicitly into every remote
/// operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
  pub token:  String,
  pub org_id: String,
}

impl Credentials {
  pub fn new(token: impl Into<String>, org_id: impl Into<String>) -> Self {
    Self { token: token.into(), org_id: org_id.into() }
  }

  /// Fails with [`crate::Error::Auth`] when either half is blank.
  pub fn ensure(&self) -> crate::Result<()> {
    if self.token.trim().is_empty() {
      return Err(crate::Error::Auth("missing token".into()));
    }
    if self.org_id.trim().is_empty() {
      return Err(crate::Error::Auth("missing organization id".into()));
    }
    Ok(())
  }
}
