//! Scenario tests for `EventStore` and `CalendarController` against a
//! scripted in-memory remote.

use std::{
  collections::VecDeque,
  future::Future,
  sync::{Arc, Mutex},
  time::Duration,
};

use chrono::{NaiveDate, NaiveDateTime};
use tokio::sync::oneshot;

use crate::{
  Error, Result,
  bulk::{BulkDeleteFilter, BulkDeleteParams, BulkDeleteScope},
  controller::CalendarController,
  model::{Credentials, Event, EventDraft, EventId, EventPatch},
  notify::{Notifier, Severity},
  remote::EventRemote,
  store::EventStore,
};

// ─── Mock remote ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Failure {
  Network,
  Permission,
  Validation,
}

impl Failure {
  fn into_error(self) -> Error {
    match self {
      Failure::Network => Error::Network {
        status:         None,
        server_message: None,
        detail:         "connection reset".into(),
      },
      Failure::Permission => Error::Permission { server_message: None },
      Failure::Validation => Error::Validation {
        status:  Some(422),
        message: "title must not be empty".into(),
      },
    }
  }
}

#[derive(Default)]
struct MockRemote {
  server:      Mutex<Vec<Event>>,
  calls:       Mutex<Vec<&'static str>>,
  failures:    Mutex<VecDeque<Failure>>,
  hold_update: Mutex<Option<oneshot::Receiver<()>>>,
  hold_list:   Mutex<Option<oneshot::Receiver<()>>>,
  next_id:     Mutex<u32>,
}

impl MockRemote {
  fn with_events(events: Vec<Event>) -> Self {
    let remote = Self::default();
    *remote.server.lock().unwrap() = events;
    remote
  }

  fn fail_next(&self, failure: Failure) {
    self.failures.lock().unwrap().push_back(failure);
  }

  /// Park the next `update` until the returned sender fires.
  fn hold_next_update(&self) -> oneshot::Sender<()> {
    let (tx, rx) = oneshot::channel();
    *self.hold_update.lock().unwrap() = Some(rx);
    tx
  }

  fn hold_next_list(&self) -> oneshot::Sender<()> {
    let (tx, rx) = oneshot::channel();
    *self.hold_list.lock().unwrap() = Some(rx);
    tx
  }

  fn count(&self, call: &str) -> usize {
    self.calls.lock().unwrap().iter().filter(|c| **c == call).count()
  }

  fn record(&self, call: &'static str) -> Result<()> {
    self.calls.lock().unwrap().push(call);
    match self.failures.lock().unwrap().pop_front() {
      Some(failure) => Err(failure.into_error()),
      None => Ok(()),
    }
  }
}

impl EventRemote for MockRemote {
  fn list<'a>(
    &'a self,
    _creds: &'a Credentials,
  ) -> impl Future<Output = Result<Vec<Event>>> + Send + 'a {
    async move {
      // Answered with the server state as of the request.
      let snapshot = self.server.lock().unwrap().clone();
      let hold = self.hold_list.lock().unwrap().take();
      if let Some(rx) = hold {
        let _ = rx.await;
      }
      self.record("list")?;
      Ok(snapshot)
    }
  }

  fn create<'a>(
    &'a self,
    _creds: &'a Credentials,
    draft: &'a EventDraft,
  ) -> impl Future<Output = Result<Event>> + Send + 'a {
    async move {
      self.record("create")?;
      let mut next_id = self.next_id.lock().unwrap();
      *next_id += 1;
      let event = Event {
        id:            EventId::new(format!("srv-{next_id}")),
        title:         draft.title.clone(),
        description:   draft.description.clone(),
        start_at:      draft.start_at,
        end_at:        draft.end_at,
        color:         draft.color.clone(),
        assignee_id:   draft.assignee_id.clone(),
        categories:    draft.categories.clone(),
        notifications: vec![],
      };
      self.server.lock().unwrap().push(event.clone());
      Ok(event)
    }
  }

  fn update<'a>(
    &'a self,
    _creds: &'a Credentials,
    id: &'a EventId,
    patch: &'a EventPatch,
  ) -> impl Future<Output = Result<Event>> + Send + 'a {
    async move {
      let hold = self.hold_update.lock().unwrap().take();
      if let Some(rx) = hold {
        let _ = rx.await;
      }
      self.record("update")?;
      let mut server = self.server.lock().unwrap();
      let slot = server
        .iter_mut()
        .find(|e| &e.id == id)
        .ok_or_else(|| Error::NotFound(id.clone()))?;
      *slot = slot.patched(patch);
      Ok(slot.clone())
    }
  }

  fn delete<'a>(
    &'a self,
    _creds: &'a Credentials,
    id: &'a EventId,
  ) -> impl Future<Output = Result<()>> + Send + 'a {
    async move {
      self.record("delete")?;
      self.server.lock().unwrap().retain(|e| &e.id != id);
      Ok(())
    }
  }

  fn bulk_delete<'a>(
    &'a self,
    _creds: &'a Credentials,
    filter: &'a BulkDeleteFilter,
  ) -> impl Future<Output = Result<()>> + Send + 'a {
    async move {
      self.record("bulk_delete")?;
      self.server.lock().unwrap().retain(|e| !filter.matches(e));
      Ok(())
    }
  }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Toasts(Mutex<Vec<(String, Severity)>>);

impl Notifier for Toasts {
  fn notify(&self, message: &str, severity: Severity) {
    self.0.lock().unwrap().push((message.to_owned(), severity));
  }
}

impl Toasts {
  fn last(&self) -> Option<(String, Severity)> { self.0.lock().unwrap().last().cloned() }
}

type Controller = CalendarController<MockRemote, Arc<Toasts>>;

const ORG: &str = "org-1";

fn creds() -> Credentials { Credentials::new("token", ORG) }

fn at(day: u32, hour: u32) -> NaiveDateTime {
  NaiveDate::from_ymd_opt(2024, 3, day)
    .unwrap()
    .and_hms_opt(hour, 0, 0)
    .unwrap()
}

fn event(id: &str, day: u32, start: u32, end: u32) -> Event {
  Event {
    id:            EventId::new(id),
    title:         format!("event {id}"),
    description:   None,
    start_at:      at(day, start),
    end_at:        at(day, end),
    color:         "#2255aa".into(),
    assignee_id:   None,
    categories:    vec![],
    notifications: vec![],
  }
}

async fn loaded(events: Vec<Event>) -> (Controller, Arc<Toasts>) {
  let toasts = Arc::new(Toasts::default());
  let controller = CalendarController::new(
    EventStore::new(MockRemote::with_events(events)),
    toasts.clone(),
  );
  controller.refresh(&creds()).await.unwrap();
  (controller, toasts)
}

fn remote(c: &Controller) -> &MockRemote { c.store().remote() }

fn rendered(c: &Controller, id: &str) -> Event {
  c.render(ORG, None)
    .into_iter()
    .find(|e| e.id.as_str() == id)
    .unwrap()
}

// ─── Gestures ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn successful_drop_stores_exact_range() {
  let (c, toasts) = loaded(vec![event("a", 15, 9, 10)]).await;
  let id = EventId::new("a");

  let updated = c.on_drop(&creds(), &id, at(16, 14), at(16, 15)).await.unwrap();
  assert_eq!(updated.range(), (at(16, 14), at(16, 15)));

  let canonical = c.store().get(ORG, &id).unwrap();
  assert_eq!(canonical.range(), (at(16, 14), at(16, 15)));
  assert_eq!(rendered(&c, "a").range(), (at(16, 14), at(16, 15)));
  assert!(!c.is_busy(&id));
  assert!(c.overlay().is_empty());
  assert_eq!(toasts.last().unwrap().1, Severity::Success);
}

#[tokio::test]
async fn rejected_update_rolls_back_and_clears_busy() {
  for failure in [Failure::Network, Failure::Permission, Failure::Validation] {
    let (c, toasts) = loaded(vec![event("a", 15, 9, 10)]).await;
    let id = EventId::new("a");
    remote(&c).fail_next(failure);

    let err = c.on_resize(&creds(), &id, at(15, 9), at(15, 12)).await.unwrap_err();
    assert!(!matches!(err, Error::Range { .. }), "{failure:?}");

    assert_eq!(rendered(&c, "a").range(), (at(15, 9), at(15, 10)), "{failure:?}");
    assert!(!c.is_busy(&id), "{failure:?}");
    assert_eq!(c.inflight().busy_count(), 0);
    assert!(c.overlay().is_empty());

    let (message, severity) = toasts.last().unwrap();
    assert_eq!(severity, Severity::Error);
    assert_eq!(message, err.user_message());
  }
}

#[tokio::test]
async fn permission_error_keeps_status_403() {
  let (c, toasts) = loaded(vec![event("a", 15, 9, 10)]).await;
  remote(&c).fail_next(Failure::Permission);

  let err = c
    .on_drop(&creds(), &EventId::new("a"), at(15, 11), at(15, 12))
    .await
    .unwrap_err();
  assert_eq!(err.status(), Some(403));
  assert!(toasts.last().unwrap().0.contains("administrador"));
}

#[tokio::test]
async fn invalid_range_never_reaches_network_or_overlay() {
  let (c, toasts) = loaded(vec![event("a", 15, 9, 10)]).await;
  let id = EventId::new("a");

  for (start, end) in [(at(15, 12), at(15, 12)), (at(15, 12), at(15, 11))] {
    let err = c.on_drop(&creds(), &id, start, end).await.unwrap_err();
    assert!(matches!(err, Error::Range { .. }));
  }

  assert_eq!(remote(&c).count("update"), 0);
  assert!(c.overlay().is_empty());
  assert!(!c.is_busy(&id));
  assert_eq!(rendered(&c, "a").range(), (at(15, 9), at(15, 10)));
  assert_eq!(toasts.last().unwrap().1, Severity::Warning);
}

#[tokio::test]
async fn missing_credentials_fail_before_dispatch() {
  let (c, _) = loaded(vec![event("a", 15, 9, 10)]).await;
  let err = c
    .on_drop(&Credentials::new("", ORG), &EventId::new("a"), at(15, 11), at(15, 12))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Auth(_)));
  assert_eq!(remote(&c).count("update"), 0);
  assert!(c.overlay().is_empty());
}

#[tokio::test]
async fn busy_event_refuses_second_gesture() {
  let (c, _) = loaded(vec![event("a", 15, 9, 10)]).await;
  let creds = creds();
  let id = EventId::new("a");
  let release = remote(&c).hold_next_update();

  let (first, ()) = tokio::join!(
    c.on_drop(&creds, &id, at(15, 11), at(15, 12)),
    async {
      assert!(c.is_busy(&id));
      assert_eq!(rendered(&c, "a").range(), (at(15, 11), at(15, 12)));

      let second = c.on_drop(&creds, &id, at(15, 20), at(15, 21)).await;
      assert!(matches!(second, Err(Error::ConcurrentMutation(_))));
      // The first gesture's optimistic state is untouched.
      assert_eq!(rendered(&c, "a").range(), (at(15, 11), at(15, 12)));
      assert!(c.is_busy(&id));

      release.send(()).unwrap();
    }
  );

  assert_eq!(first.unwrap().range(), (at(15, 11), at(15, 12)));
  assert!(!c.is_busy(&id));
  assert_eq!(remote(&c).count("update"), 1);
}

#[tokio::test]
async fn different_events_mutate_independently() {
  let (c, _) = loaded(vec![event("a", 15, 9, 10), event("b", 15, 11, 12)]).await;
  let creds = creds();
  let (a_id, b_id) = (EventId::new("a"), EventId::new("b"));
  let release = remote(&c).hold_next_update();

  let (a, b) = tokio::join!(
    c.on_drop(&creds, &a_id, at(15, 13), at(15, 14)),
    async {
      // "a" is parked on the remote; "b" goes straight through.
      let b = c.on_drop(&creds, &b_id, at(15, 15), at(15, 16)).await;
      release.send(()).unwrap();
      b
    }
  );
  assert!(a.is_ok());
  assert!(b.is_ok());
  assert_eq!(c.inflight().busy_count(), 0);
}

#[tokio::test]
async fn pending_patch_wins_over_concurrent_fetch() {
  let (c, _) = loaded(vec![event("a", 15, 9, 10)]).await;
  let creds = creds();
  let id = EventId::new("a");
  let release = remote(&c).hold_next_update();

  let (result, ()) = tokio::join!(
    c.on_drop(&creds, &id, at(15, 11), at(15, 12)),
    async {
      // The server has not applied the move yet, so this fetch is stale.
      c.refresh(&creds).await.unwrap();
      assert_eq!(rendered(&c, "a").range(), (at(15, 11), at(15, 12)));
      release.send(()).unwrap();
    }
  );
  result.unwrap();
  assert_eq!(rendered(&c, "a").range(), (at(15, 11), at(15, 12)));
}

#[tokio::test]
async fn dropped_gesture_future_releases_event() {
  let (c, _) = loaded(vec![event("a", 15, 9, 10)]).await;
  let id = EventId::new("a");
  let _release = remote(&c).hold_next_update();

  let outcome = tokio::time::timeout(
    Duration::from_millis(20),
    c.on_drop(&creds(), &id, at(15, 11), at(15, 12)),
  )
  .await;
  assert!(outcome.is_err());

  assert!(!c.is_busy(&id));
  assert!(c.overlay().is_empty());
  assert_eq!(rendered(&c, "a").range(), (at(15, 9), at(15, 10)));
}

#[tokio::test]
async fn unknown_event_is_refetched() {
  let (c, toasts) = loaded(vec![event("a", 15, 9, 10)]).await;
  // Another session deleted the event after our fetch.
  remote(&c).server.lock().unwrap().clear();

  let err = c
    .on_drop(&creds(), &EventId::new("a"), at(15, 11), at(15, 12))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound(_)));
  assert_eq!(remote(&c).count("list"), 2);
  assert!(c.render(ORG, None).is_empty());
  assert!(toasts.last().unwrap().0.contains("não existe"));
}

// ─── Store ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn fetch_is_not_reentrant() {
  let store = EventStore::new(MockRemote::with_events(vec![event("a", 15, 9, 10)]));
  let creds = creds();
  let release = store.remote().hold_next_list();

  let (first, ()) = tokio::join!(store.fetch_all(&creds), async {
    assert!(store.is_fetching(ORG));
    let second = store.fetch_all(&creds).await;
    assert!(matches!(second, Err(Error::FetchInProgress(_))));
    release.send(()).unwrap();
  });
  assert_eq!(first.unwrap().len(), 1);
  assert!(!store.is_fetching(ORG));
  assert_eq!(store.remote().count("list"), 1);
}

#[tokio::test]
async fn fetch_older_than_a_confirmed_move_is_discarded() {
  let store = EventStore::new(MockRemote::with_events(vec![event("a", 15, 9, 10)]));
  let creds = creds();
  let id = EventId::new("a");
  store.fetch_all(&creds).await.unwrap();
  let release = store.remote().hold_next_list();

  let (fetched, ()) = tokio::join!(store.fetch_all(&creds), async {
    let patch = EventPatch::reschedule(at(15, 13), at(15, 14));
    store.update(&creds, &id, &patch).await.unwrap();
    release.send(()).unwrap();
  });

  // The response predates the move; the confirmed range is kept.
  assert_eq!(fetched.unwrap()[0].range(), (at(15, 13), at(15, 14)));
  assert_eq!(store.get(ORG, &id).unwrap().range(), (at(15, 13), at(15, 14)));
  assert!(!store.is_fresh(ORG));

  store.ensure_fresh(&creds).await.unwrap();
  assert_eq!(store.remote().count("list"), 3);
  assert_eq!(store.get(ORG, &id).unwrap().range(), (at(15, 13), at(15, 14)));
}

#[tokio::test]
async fn refetch_waits_out_a_running_fetch() {
  let store = EventStore::new(MockRemote::with_events(vec![event("a", 15, 9, 10)]));
  let creds = creds();
  let release = store.remote().hold_next_list();

  let (first, second, ()) = tokio::join!(
    store.fetch_all(&creds),
    store.refetch(&creds),
    async {
      tokio::task::yield_now().await;
      assert!(store.is_fetching(ORG));
      release.send(()).unwrap();
    }
  );
  assert!(first.is_ok());
  assert_eq!(second.unwrap().len(), 1);
  assert_eq!(store.remote().count("list"), 2);
  assert!(!store.is_fetching(ORG));
}

#[tokio::test]
async fn failed_fetch_releases_slot_and_keeps_list() {
  let store = EventStore::new(MockRemote::with_events(vec![event("a", 15, 9, 10)]));
  store.fetch_all(&creds()).await.unwrap();
  store.remote().fail_next(Failure::Network);

  assert!(store.fetch_all(&creds()).await.is_err());
  assert!(!store.is_fetching(ORG));
  assert_eq!(store.events(ORG).len(), 1);
}

#[tokio::test]
async fn ensure_fresh_uses_cache_until_invalidated() {
  let store = EventStore::new(MockRemote::with_events(vec![event("a", 15, 9, 10)]));
  store.ensure_fresh(&creds()).await.unwrap();
  store.ensure_fresh(&creds()).await.unwrap();
  assert_eq!(store.remote().count("list"), 1);

  store.invalidate(ORG);
  store.ensure_fresh(&creds()).await.unwrap();
  assert_eq!(store.remote().count("list"), 2);
}

#[tokio::test]
async fn organizations_are_kept_apart() {
  let store = EventStore::new(MockRemote::with_events(vec![event("a", 15, 9, 10)]));
  store.fetch_all(&creds()).await.unwrap();
  assert!(store.events("org-2").is_empty());
  assert!(!store.is_fresh("org-2"));
  assert!(store.is_fresh(ORG));
}

#[tokio::test]
async fn create_joins_canonical_with_server_id() {
  let (c, _) = loaded(vec![]).await;
  let draft = EventDraft::new("Planning", at(18, 9), at(18, 10));

  let created = c.create_event(&creds(), &draft).await.unwrap();
  assert_eq!(created.id.as_str(), "srv-1");
  assert_eq!(c.render(ORG, None), vec![created]);
}

#[tokio::test]
async fn create_surfaces_validation_verbatim() {
  let (c, toasts) = loaded(vec![]).await;
  remote(&c).fail_next(Failure::Validation);

  let err = c
    .create_event(&creds(), &EventDraft::new("", at(18, 9), at(18, 10)))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Validation { .. }));
  assert_eq!(toasts.last().unwrap().0, "title must not be empty");
  assert!(c.render(ORG, None).is_empty());
}

#[tokio::test]
async fn delete_clears_busy_on_both_paths() {
  let (c, _) = loaded(vec![event("a", 15, 9, 10), event("b", 15, 11, 12)]).await;

  remote(&c).fail_next(Failure::Network);
  assert!(c.delete_event(&creds(), &EventId::new("a")).await.is_err());
  assert!(!c.is_busy(&EventId::new("a")));
  assert_eq!(c.render(ORG, None).len(), 2);

  c.delete_event(&creds(), &EventId::new("a")).await.unwrap();
  assert!(!c.is_busy(&EventId::new("a")));
  assert_eq!(c.render(ORG, None).len(), 1);
}

#[tokio::test]
async fn render_filters_by_assignee() {
  let mut mine = event("a", 15, 9, 10);
  mine.assignee_id = Some("ana".into());
  let (c, _) = loaded(vec![mine, event("b", 15, 11, 12)]).await;

  let view = c.render(ORG, Some("ana"));
  assert_eq!(view.len(), 1);
  assert_eq!(view[0].id.as_str(), "a");
}

// ─── Bulk delete ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn bulk_delete_refetches_afterwards() {
  let (c, _) = loaded(vec![
    event("a", 15, 9, 10),
    event("b", 15, 14, 15),
    event("c", 16, 9, 10),
  ])
  .await;

  let prepared = c
    .prepare_bulk_delete(BulkDeleteScope::Day, &BulkDeleteParams {
      start_date: NaiveDate::from_ymd_opt(2024, 3, 15),
      ..Default::default()
    })
    .unwrap();
  assert!(prepared.message.contains("15/03/2024"));

  let remaining = c.bulk_delete(&creds(), prepared).await.unwrap();
  assert_eq!(remaining.len(), 1);
  assert_eq!(remaining[0].id.as_str(), "c");
  assert_eq!(remote(&c).count("list"), 2);
  assert!(c.store().is_fresh(ORG));
}

#[tokio::test]
async fn bulk_delete_during_a_refresh_still_succeeds() {
  let (c, toasts) = loaded(vec![event("a", 15, 9, 10), event("b", 16, 9, 10)]).await;
  let creds = creds();
  let prepared = c
    .prepare_bulk_delete(BulkDeleteScope::All, &BulkDeleteParams::default())
    .unwrap();
  let release = remote(&c).hold_next_list();

  let (refreshed, deleted, ()) = tokio::join!(
    c.refresh(&creds),
    c.bulk_delete(&creds, prepared),
    async {
      while remote(&c).count("bulk_delete") == 0 {
        tokio::task::yield_now().await;
      }
      release.send(()).unwrap();
    }
  );

  // The refresh was requested before the delete; its answer is dropped.
  assert!(refreshed.is_ok());
  assert!(deleted.unwrap().is_empty());
  assert_eq!(remote(&c).count("list"), 3);
  assert!(c.render(ORG, None).is_empty());
  assert!(c.store().is_fresh(ORG));
  assert_eq!(toasts.last().unwrap().1, Severity::Success);
}

#[tokio::test]
async fn failed_bulk_delete_keeps_list_and_reports() {
  let (c, toasts) = loaded(vec![event("a", 15, 9, 10)]).await;
  remote(&c).fail_next(Failure::Permission);

  let prepared = c
    .prepare_bulk_delete(BulkDeleteScope::All, &BulkDeleteParams::default())
    .unwrap();
  let err = c.bulk_delete(&creds(), prepared).await.unwrap_err();
  assert_eq!(err.status(), Some(403));
  assert_eq!(remote(&c).count("list"), 1);
  assert_eq!(c.render(ORG, None).len(), 1);
  assert_eq!(toasts.last().unwrap().1, Severity::Error);
}

#[tokio::test]
async fn bad_scope_is_reported_without_network() {
  let (c, toasts) = loaded(vec![]).await;
  let result = c.prepare_bulk_delete(BulkDeleteScope::Month, &BulkDeleteParams {
    year: Some(2024),
    ..Default::default()
  });
  assert!(matches!(result, Err(Error::InvalidScope(_))));
  assert_eq!(remote(&c).count("bulk_delete"), 0);
  assert_eq!(toasts.last().unwrap().1, Severity::Warning);
}
