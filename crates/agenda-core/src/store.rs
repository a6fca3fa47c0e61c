//! [`EventStore`]: the canonical, server-confirmed event list.
//!
//! The store changes its canonical list only after the remote confirms a
//! call. Lists are kept per organization in a [`TtlCache`]; confirmed
//! single-event mutations patch the cached list in place, while a bulk
//! delete invalidates it because the client cannot tell what was removed.
//!
//! Every confirmed mutation bumps a per-organization revision. A fetch that
//! started before the latest confirmed mutation is discarded on arrival, so a
//! slow list response never puts back an older version of a changed event.

use std::{
  collections::HashMap,
  sync::{Mutex, MutexGuard, PoisonError},
  time::Duration,
};

use tokio::sync::Notify;

use crate::{
  Error, Result,
  bulk::{self, PreparedBulkDelete},
  cache::TtlCache,
  model::{Credentials, Event, EventDraft, EventId, EventPatch},
  remote::EventRemote,
};

/// How long a fetched list is considered fresh by [`EventStore::ensure_fresh`].
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

struct State {
  lists:    TtlCache<String, Vec<Event>>,
  /// Organizations with a fetch in flight.
  fetching: Vec<String>,
  /// Confirmed mutations per organization.
  revision: HashMap<String, u64>,
}

impl State {
  fn revision(&self, org_id: &str) -> u64 {
    self.revision.get(org_id).copied().unwrap_or_default()
  }

  fn bump(&mut self, org_id: &str) {
    *self.revision.entry(org_id.to_owned()).or_default() += 1;
  }
}

pub struct EventStore<R> {
  remote:     R,
  state:      Mutex<State>,
  /// Signalled whenever a fetch slot is released.
  fetch_done: Notify,
}

/// Clears the organization's fetching flag on every exit path.
struct FetchSlot<'a, R> {
  store:  &'a EventStore<R>,
  org_id: String,
}

impl<R> Drop for FetchSlot<'_, R> {
  fn drop(&mut self) {
    self.store.state().fetching.retain(|org| org != &self.org_id);
    self.store.fetch_done.notify_waiters();
  }
}

impl<R> EventStore<R> {
  pub fn new(remote: R) -> Self { Self::with_ttl(remote, DEFAULT_TTL) }

  pub fn with_ttl(remote: R, ttl: Duration) -> Self {
    Self {
      remote,
      state: Mutex::new(State {
        lists:    TtlCache::new(ttl),
        fetching: Vec::new(),
        revision: HashMap::new(),
      }),
      fetch_done: Notify::new(),
    }
  }

  pub fn remote(&self) -> &R { &self.remote }

  fn state(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  /// The canonical list for `org_id`, stale or not. Empty before the first
  /// fetch.
  pub fn events(&self, org_id: &str) -> Vec<Event> {
    self.state().lists.peek(org_id).cloned().unwrap_or_default()
  }

  pub fn get(&self, org_id: &str, id: &EventId) -> Option<Event> {
    self
      .state()
      .lists
      .peek(org_id)
      .and_then(|events| events.iter().find(|e| &e.id == id).cloned())
  }

  pub fn is_fresh(&self, org_id: &str) -> bool {
    self.state().lists.is_fresh(org_id)
  }

  pub fn is_fetching(&self, org_id: &str) -> bool {
    self.state().fetching.iter().any(|org| org == org_id)
  }

  /// Mark the organization's list stale so the next
  /// [`Self::ensure_fresh`] refetches.
  pub fn invalidate(&self, org_id: &str) {
    self.state().lists.invalidate(org_id);
  }

  /// Replace (or insert) one event in the canonical list.
  fn apply_confirmed(&self, org_id: &str, event: Event) {
    let mut state = self.state();
    state.bump(org_id);
    state.lists.update(org_id, |events| {
      match events.iter_mut().find(|e| e.id == event.id) {
        Some(slot) => *slot = event,
        None => events.push(event),
      }
    });
  }
}

impl<R: EventRemote> EventStore<R> {
  // ── Fetch ─────────────────────────────────────────────────────────────

  /// Replace the canonical list for the organization wholesale.
  ///
  /// Not re-entrant: a second call for the same organization while one is in
  /// flight fails with [`Error::FetchInProgress`] instead of racing it.
  ///
  /// If a mutation was confirmed while the list was in flight the response is
  /// dropped, the cached list is marked stale and returned as is.
  pub async fn fetch_all(&self, creds: &Credentials) -> Result<Vec<Event>> {
    creds.ensure()?;
    let (_slot, started_at) = {
      let mut state = self.state();
      if state.fetching.contains(&creds.org_id) {
        return Err(Error::FetchInProgress(creds.org_id.clone()));
      }
      state.fetching.push(creds.org_id.clone());
      let slot = FetchSlot { store: self, org_id: creds.org_id.clone() };
      (slot, state.revision(&creds.org_id))
    };

    tracing::debug!(org = %creds.org_id, "fetching events");
    let events = self.remote.list(creds).await?;
    tracing::debug!(org = %creds.org_id, count = events.len(), "events fetched");

    let mut state = self.state();
    let org = creds.org_id.as_str();
    if state.revision(org) != started_at
      && let Some(current) = state.lists.peek(org).cloned()
    {
      tracing::debug!(org, "discarding list older than a confirmed mutation");
      state.lists.invalidate(org);
      return Ok(current);
    }
    state.lists.set(creds.org_id.clone(), events.clone());
    Ok(events)
  }

  /// Fetch after the caller changed the server, waiting out a fetch that is
  /// already in flight instead of failing with [`Error::FetchInProgress`].
  /// The list returned was requested after this call began.
  pub async fn refetch(&self, creds: &Credentials) -> Result<Vec<Event>> {
    loop {
      let released = self.fetch_done.notified();
      match self.fetch_all(creds).await {
        Err(Error::FetchInProgress(_)) => {
          tracing::debug!(org = %creds.org_id, "waiting for in-flight fetch");
          released.await;
        }
        result => return result,
      }
    }
  }

  /// Return the cached list if fresh, otherwise fetch.
  pub async fn ensure_fresh(&self, creds: &Credentials) -> Result<Vec<Event>> {
    creds.ensure()?;
    let cached = self.state().lists.get(creds.org_id.as_str()).cloned();
    match cached {
      Some(events) => Ok(events),
      None => self.fetch_all(creds).await,
    }
  }

  // ── Mutations ─────────────────────────────────────────────────────────

  /// Create an event; it joins the canonical list with its server id.
  pub async fn create(&self, creds: &Credentials, draft: &EventDraft) -> Result<Event> {
    creds.ensure()?;
    let created = self.remote.create(creds, draft).await?;
    tracing::info!(org = %creds.org_id, id = %created.id, "event created");

    let mut state = self.state();
    state.bump(&creds.org_id);
    let inserted = state
      .lists
      .update(creds.org_id.as_str(), |events| events.push(created.clone()));
    if inserted.is_none() {
      state.lists.set(creds.org_id.clone(), vec![created.clone()]);
      state.lists.invalidate(creds.org_id.as_str());
    }
    Ok(created)
  }

  /// Apply a partial patch; the canonical copy becomes the server's reply.
  pub async fn update(
    &self,
    creds: &Credentials,
    id: &EventId,
    patch: &EventPatch,
  ) -> Result<Event> {
    creds.ensure()?;
    let updated = self.remote.update(creds, id, patch).await?;
    tracing::info!(org = %creds.org_id, id = %updated.id, "event updated");
    self.apply_confirmed(&creds.org_id, updated.clone());
    Ok(updated)
  }

  pub async fn delete(&self, creds: &Credentials, id: &EventId) -> Result<()> {
    creds.ensure()?;
    self.remote.delete(creds, id).await?;
    tracing::info!(org = %creds.org_id, id = %id, "event deleted");
    let mut state = self.state();
    state.bump(&creds.org_id);
    state
      .lists
      .update(creds.org_id.as_str(), |events| events.retain(|e| &e.id != id));
    Ok(())
  }

  /// Run a confirmed bulk delete and mark the list stale. The caller must
  /// refetch to observe the effect.
  pub async fn bulk_delete(
    &self,
    creds: &Credentials,
    prepared: PreparedBulkDelete,
  ) -> Result<()> {
    bulk::execute(&self.remote, creds, prepared).await?;
    let mut state = self.state();
    state.bump(&creds.org_id);
    state.lists.invalidate(creds.org_id.as_str());
    Ok(())
  }
}
