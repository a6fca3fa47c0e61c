//! [`CalendarController`]: one calendar view's gesture handlers.
//!
//! A drag or resize walks a fixed path:
//!
//! ```text
//! IDLE -> VALIDATING -> (invalid) IDLE, error surfaced, nothing touched
//!                    -> (valid)   OPTIMISTIC_APPLIED, overlay shadowed, busy
//! OPTIMISTIC_APPLIED -> (server ok)    IDLE, canonical updated, committed
//!                    -> (server error) IDLE, rolled back, error surfaced
//! ```
//!
//! Every error is caught here, reported to the [`Notifier`] and returned to
//! the caller. The overlay entry and the busy flag are owned by a
//! [`PendingMutation`] so they are released exactly once on every path,
//! including when the gesture future is dropped mid-flight.

use chrono::NaiveDateTime;

use crate::{
  Error, Result,
  bulk::{self, BulkDeleteParams, BulkDeleteScope, PreparedBulkDelete},
  guard::validate_range,
  inflight::{BusyGuard, InFlightTracker},
  model::{Credentials, Event, EventDraft, EventId, EventPatch},
  notify::{Notifier, Severity},
  overlay::{OptimisticOverlay, SnapshotToken},
  remote::EventRemote,
  store::EventStore,
};

/// Which gesture produced a reschedule. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Gesture {
  Move,
  Resize,
}

// ─── Pending mutation ────────────────────────────────────────────────────────

/// An applied optimistic patch plus the busy flag for its event.
///
/// Dropping it without [`PendingMutation::commit`] rolls the overlay back,
/// then clears the busy flag.
struct PendingMutation<'a> {
  overlay: &'a OptimisticOverlay,
  token:   Option<SnapshotToken>,
  _busy:   BusyGuard<'a>,
}

impl PendingMutation<'_> {
  fn commit(mut self) {
    if let Some(token) = self.token.take() {
      self.overlay.commit(token.event_id());
    }
  }
}

impl Drop for PendingMutation<'_> {
  fn drop(&mut self) {
    if let Some(token) = self.token.take()
      && let Some(previous) = self.overlay.rollback(&token)
    {
      tracing::warn!(id = %previous.id, "optimistic change rolled back");
    }
  }
}

// ─── Controller ──────────────────────────────────────────────────────────────

pub struct CalendarController<R, N> {
  store:    EventStore<R>,
  overlay:  OptimisticOverlay,
  inflight: InFlightTracker,
  notifier: N,
}

impl<R: EventRemote, N: Notifier> CalendarController<R, N> {
  pub fn new(store: EventStore<R>, notifier: N) -> Self {
    Self {
      store,
      overlay: OptimisticOverlay::new(),
      inflight: InFlightTracker::new(),
      notifier,
    }
  }

  pub fn store(&self) -> &EventStore<R> { &self.store }

  pub fn overlay(&self) -> &OptimisticOverlay { &self.overlay }

  pub fn inflight(&self) -> &InFlightTracker { &self.inflight }

  // ── View ──────────────────────────────────────────────────────────────

  /// The events to draw: canonical with pending patches applied, optionally
  /// limited to one assignee.
  pub fn render(&self, org_id: &str, assignee: Option<&str>) -> Vec<Event> {
    let mut view = self.overlay.project(&self.store.events(org_id));
    if let Some(assignee) = assignee {
      view.retain(|e| e.assignee_id.as_deref() == Some(assignee));
    }
    view
  }

  /// Busy events are drawn dimmed and refuse gestures.
  pub fn is_busy(&self, id: &EventId) -> bool { self.inflight.is_busy(id) }

  // ── Loading ───────────────────────────────────────────────────────────

  pub async fn refresh(&self, creds: &Credentials) -> Result<Vec<Event>> {
    let result = self.store.fetch_all(creds).await;
    if let Err(e) = &result {
      self.report(creds, e).await;
    }
    result
  }

  // ── Gestures ──────────────────────────────────────────────────────────

  /// `onDrop(event, newStart, newEnd)`
  pub async fn on_drop(
    &self,
    creds: &Credentials,
    id: &EventId,
    start_at: NaiveDateTime,
    end_at: NaiveDateTime,
  ) -> Result<Event> {
    self.reschedule(Gesture::Move, creds, id, start_at, end_at).await
  }

  /// `onResize(event, newStart, newEnd)`
  pub async fn on_resize(
    &self,
    creds: &Credentials,
    id: &EventId,
    start_at: NaiveDateTime,
    end_at: NaiveDateTime,
  ) -> Result<Event> {
    self.reschedule(Gesture::Resize, creds, id, start_at, end_at).await
  }

  async fn reschedule(
    &self,
    gesture: Gesture,
    creds: &Credentials,
    id: &EventId,
    start_at: NaiveDateTime,
    end_at: NaiveDateTime,
  ) -> Result<Event> {
    let result = self.try_reschedule(gesture, creds, id, start_at, end_at).await;
    match &result {
      Ok(_) => self.notifier.notify("Evento atualizado.", Severity::Success),
      Err(e) => {
        tracing::warn!(%gesture, %id, error = %e, "reschedule rejected");
        self.report(creds, e).await;
      }
    }
    result
  }

  async fn try_reschedule(
    &self,
    gesture: Gesture,
    creds: &Credentials,
    id: &EventId,
    start_at: NaiveDateTime,
    end_at: NaiveDateTime,
  ) -> Result<Event> {
    // Everything up to the network call runs without suspending.
    validate_range(start_at, end_at)?;
    creds.ensure()?;
    let canonical = self
      .store
      .get(&creds.org_id, id)
      .ok_or_else(|| Error::NotFound(id.clone()))?;

    let patch = EventPatch::reschedule(start_at, end_at);
    let busy = self.inflight.track(id)?;
    let (token, _) = self.overlay.begin(&canonical, &patch)?;
    let pending = PendingMutation {
      overlay: &self.overlay,
      token:   Some(token),
      _busy:   busy,
    };
    tracing::debug!(%gesture, %id, %start_at, %end_at, "optimistic change applied");

    let updated = self.store.update(creds, id, &patch).await?;
    pending.commit();
    Ok(updated)
  }

  /// Delete one event. The event is busy for the duration of the call; no
  /// optimistic removal is drawn.
  pub async fn delete_event(&self, creds: &Credentials, id: &EventId) -> Result<()> {
    let result: Result<()> = async {
      creds.ensure()?;
      let _busy = self.inflight.track(id)?;
      self.store.delete(creds, id).await
    }
    .await;
    match &result {
      Ok(()) => self.notifier.notify("Evento excluído.", Severity::Success),
      Err(e) => self.report(creds, e).await,
    }
    result
  }

  /// Create an event from a submitted form. It appears only once the server
  /// has assigned its id.
  pub async fn create_event(&self, creds: &Credentials, draft: &EventDraft) -> Result<Event> {
    let result: Result<Event> = async {
      validate_range(draft.start_at, draft.end_at)?;
      self.store.create(creds, draft).await
    }
    .await;
    match &result {
      Ok(_) => self.notifier.notify("Evento criado.", Severity::Success),
      Err(e) => self.report(creds, e).await,
    }
    result
  }

  // ── Bulk delete ───────────────────────────────────────────────────────

  /// First phase: the filter and the text for the confirmation modal.
  pub fn prepare_bulk_delete(
    &self,
    scope: BulkDeleteScope,
    params: &BulkDeleteParams,
  ) -> Result<PreparedBulkDelete> {
    let result = bulk::prepare(scope, params);
    if let Err(e) = &result {
      self.notifier.notify(&e.user_message(), Severity::Warning);
    }
    result
  }

  /// Second phase, after the user confirmed `prepared.message`. Refetches
  /// the canonical list once the server accepts the deletion, after any
  /// fetch that was already running.
  pub async fn bulk_delete(
    &self,
    creds: &Credentials,
    prepared: PreparedBulkDelete,
  ) -> Result<Vec<Event>> {
    if let Err(e) = self.store.bulk_delete(creds, prepared).await {
      self.report(creds, &e).await;
      return Err(e);
    }
    self.notifier.notify("Eventos excluídos.", Severity::Success);
    let result = self.store.refetch(creds).await;
    if let Err(e) = &result {
      self.report(creds, e).await;
    }
    result
  }

  // ── Errors ────────────────────────────────────────────────────────────

  /// Surface `error` to the user. An unknown id means our list is out of
  /// date, so it is refetched.
  async fn report(&self, creds: &Credentials, error: &Error) {
    let severity = match error {
      Error::Range { .. } | Error::ConcurrentMutation(_) | Error::InvalidScope(_) => {
        Severity::Warning
      }
      _ => Severity::Error,
    };
    self.notifier.notify(&error.user_message(), severity);

    if error.wants_refresh() {
      self.store.invalidate(&creds.org_id);
      if let Err(e) = self.store.refetch(creds).await {
        tracing::warn!(org = %creds.org_id, error = %e, "refresh after missing event failed");
      }
    }
  }
}
