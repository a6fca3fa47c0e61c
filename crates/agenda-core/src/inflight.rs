//! Tracking of events whose mutation is awaiting a server round-trip.
//!
//! Busy events are rendered dimmed and refuse further gestures until the
//! pending request settles. [`InFlightTracker::track`] hands out a
//! [`BusyGuard`] whose `Drop` is the single `clear_busy` for that request, so
//! the success path, the failure path and a dropped future all release the
//! id exactly once.

use std::{
  collections::HashSet,
  sync::{Mutex, MutexGuard, PoisonError},
};

use crate::{Error, Result, model::EventId};

/// Set of event ids with a mutation in flight. Scoped to one calendar view.
#[derive(Debug, Default)]
pub struct InFlightTracker {
  ids: Mutex<HashSet<EventId>>,
}

impl InFlightTracker {
  pub fn new() -> Self { Self::default() }

  fn ids(&self) -> MutexGuard<'_, HashSet<EventId>> {
    self.ids.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Idempotent add. Returns `true` if the id was not already busy.
  pub fn mark_busy(&self, id: &EventId) -> bool { self.ids().insert(id.clone()) }

  /// Idempotent remove. Returns `true` if the id was busy.
  pub fn clear_busy(&self, id: &EventId) -> bool { self.ids().remove(id) }

  pub fn is_busy(&self, id: &EventId) -> bool { self.ids().contains(id) }

  pub fn busy_count(&self) -> usize { self.ids().len() }

  /// Mark `id` busy for the lifetime of the returned guard.
  ///
  /// Fails with [`Error::ConcurrentMutation`] if `id` is already busy; the
  /// existing entry is left untouched.
  pub fn track(&self, id: &EventId) -> Result<BusyGuard<'_>> {
    if !self.mark_busy(id) {
      return Err(Error::ConcurrentMutation(id.clone()));
    }
    Ok(BusyGuard { tracker: self, id: id.clone() })
  }
}

/// Clears its event id from the tracker when dropped.
#[must_use = "dropping the guard immediately clears the busy flag"]
#[derive(Debug)]
pub struct BusyGuard<'a> {
  tracker: &'a InFlightTracker,
  id:      EventId,
}

impl BusyGuard<'_> {
  pub fn id(&self) -> &EventId { &self.id }
}

impl Drop for BusyGuard<'_> {
  fn drop(&mut self) {
    self.tracker.clear_busy(&self.id);
  }
}
