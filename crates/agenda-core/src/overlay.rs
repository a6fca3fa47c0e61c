//! View-only projection of pending mutations over the canonical events.
//!
//! A drag or resize records an [`OptimisticEntry`] holding the pre-gesture
//! event and the proposed one. While the entry exists the proposed event is
//! rendered in place of the canonical one, including over the results of a
//! fetch that lands mid-flight. [`OptimisticOverlay::commit`] and
//! [`OptimisticOverlay::rollback`] both remove the entry; the difference is
//! only whether the canonical store was updated first.

use std::{
  collections::HashMap,
  sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicU64, Ordering},
  },
};

use crate::{
  Error, Result,
  model::{Event, EventId, EventPatch},
};

/// Identifies one `begin` call so a late rollback cannot discard a newer
/// entry for the same event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotToken {
  event_id: EventId,
  seq:      u64,
}

impl SnapshotToken {
  pub fn event_id(&self) -> &EventId { &self.event_id }
}

/// Working copy of one event for the duration of a pending mutation.
#[derive(Debug, Clone)]
pub struct OptimisticEntry {
  seq:          u64,
  pub previous: Event,
  pub proposed: Event,
}

#[derive(Debug, Default)]
pub struct OptimisticOverlay {
  entries:  Mutex<HashMap<EventId, OptimisticEntry>>,
  next_seq: AtomicU64,
}

impl OptimisticOverlay {
  pub fn new() -> Self { Self::default() }

  fn entries(&self) -> MutexGuard<'_, HashMap<EventId, OptimisticEntry>> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Shadow `canonical` with `patch` applied and return the merged view.
  ///
  /// Never suspends. Fails with [`Error::ConcurrentMutation`] when the event
  /// already has a pending entry, leaving that entry untouched.
  pub fn begin(
    &self,
    canonical: &Event,
    patch: &EventPatch,
  ) -> Result<(SnapshotToken, Event)> {
    let mut entries = self.entries();
    if entries.contains_key(&canonical.id) {
      return Err(Error::ConcurrentMutation(canonical.id.clone()));
    }

    let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
    let proposed = canonical.patched(patch);
    entries.insert(canonical.id.clone(), OptimisticEntry {
      seq,
      previous: canonical.clone(),
      proposed: proposed.clone(),
    });

    let token = SnapshotToken { event_id: canonical.id.clone(), seq };
    Ok((token, proposed))
  }

  /// Drop the entry for `id` after the canonical store took the server's
  /// confirmed value. Returns `false` if nothing was pending.
  pub fn commit(&self, id: &EventId) -> bool { self.entries().remove(id).is_some() }

  /// Drop the entry created by `token` and return the pre-gesture event.
  ///
  /// Returns `None` if that entry is already gone (committed, or replaced by
  /// a later `begin`).
  pub fn rollback(&self, token: &SnapshotToken) -> Option<Event> {
    let mut entries = self.entries();
    let current = entries
      .get(&token.event_id)
      .is_some_and(|entry| entry.seq == token.seq);
    if !current {
      return None;
    }
    entries.remove(&token.event_id).map(|entry| entry.previous)
  }

  pub fn is_pending(&self, id: &EventId) -> bool { self.entries().contains_key(id) }

  /// The proposed event for `id`, if a mutation is pending.
  pub fn proposed(&self, id: &EventId) -> Option<Event> {
    self.entries().get(id).map(|entry| entry.proposed.clone())
  }

  /// Render `canonical` with every pending entry applied on top.
  ///
  /// Pending entries take precedence over canonical values for the same id.
  /// Entries whose event is absent from `canonical` are not resurrected.
  pub fn project(&self, canonical: &[Event]) -> Vec<Event> {
    let entries = self.entries();
    canonical
      .iter()
      .map(|event| match entries.get(&event.id) {
        Some(entry) => entry.proposed.clone(),
        None => event.clone(),
      })
      .collect()
  }

  pub fn len(&self) -> usize { self.entries().len() }

  pub fn is_empty(&self) -> bool { self.entries().is_empty() }
}
