//! Local alerts: the toast sink and the reminder scan.
//!
//! [`NotificationScheduler`] polls the canonical events on a fixed interval
//! and raises an alert for every PENDING notification due within the next
//! minute. It never writes to the store and never touches the network.

use std::{
  collections::HashSet,
  sync::{Mutex, MutexGuard, PoisonError},
  time::Duration,
};

use chrono::{Local, NaiveDateTime};
use tokio::{
  sync::watch,
  time::{self, MissedTickBehavior},
};

use crate::model::{Event, EventId, NotificationStatus};

/// How often the scheduler scans.
pub const SCAN_INTERVAL: Duration = Duration::from_secs(60);

/// A notification is due when `0 < sendAt - now < DUE_WINDOW_MS`.
pub const DUE_WINDOW_MS: i64 = 60_000;

// ─── Sink ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
  Info,
  Success,
  Warning,
  Error,
}

/// Fire-and-forget toast display.
pub trait Notifier: Send + Sync {
  fn notify(&self, message: &str, severity: Severity);
}

impl<N: Notifier + ?Sized> Notifier for std::sync::Arc<N> {
  fn notify(&self, message: &str, severity: Severity) {
    (**self).notify(message, severity);
  }
}

// ─── Scan ────────────────────────────────────────────────────────────────────

/// A reminder that fell inside the due window during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueNotification {
  pub event_id:        EventId,
  pub event_title:     String,
  pub notification_id: String,
  pub send_at:         NaiveDateTime,
  pub recipient_id:    String,
}

impl DueNotification {
  pub fn message(&self) -> String {
    format!("Lembrete: {} às {}", self.event_title, self.send_at.format("%H:%M"))
  }

  fn key(&self) -> (EventId, String) {
    (self.event_id.clone(), self.notification_id.clone())
  }
}

/// Every PENDING notification with `0 < sendAt - now < DUE_WINDOW_MS`. Pure.
pub fn due_notifications(events: &[Event], now: NaiveDateTime) -> Vec<DueNotification> {
  events
    .iter()
    .flat_map(|event| {
      event
        .notifications
        .iter()
        .filter(|n| n.status == NotificationStatus::Pending)
        .filter(move |n| {
          let delta = n.send_at - now;
          delta > chrono::Duration::zero() && delta.num_milliseconds() < DUE_WINDOW_MS
        })
        .map(move |n| DueNotification {
          event_id:        event.id.clone(),
          event_title:     event.title.clone(),
          notification_id: n.id.clone(),
          send_at:         n.send_at,
          recipient_id:    n.recipient_id.clone(),
        })
    })
    .collect()
}

type Clock = Box<dyn Fn() -> NaiveDateTime + Send + Sync>;

pub struct NotificationScheduler {
  interval: Duration,
  clock:    Clock,
  /// Keys alerted while still inside the due window.
  alerted:  Mutex<HashSet<(EventId, String)>>,
}

impl Default for NotificationScheduler {
  fn default() -> Self { Self::new(SCAN_INTERVAL) }
}

impl NotificationScheduler {
  pub fn new(interval: Duration) -> Self {
    Self {
      interval,
      clock: Box::new(|| Local::now().naive_local()),
      alerted: Mutex::new(HashSet::new()),
    }
  }

  /// Replace the wall clock, e.g. with a fixed instant in tests.
  pub fn with_clock(
    mut self,
    clock: impl Fn() -> NaiveDateTime + Send + Sync + 'static,
  ) -> Self {
    self.clock = Box::new(clock);
    self
  }

  pub fn interval(&self) -> Duration { self.interval }

  fn alerted(&self) -> MutexGuard<'_, HashSet<(EventId, String)>> {
    self.alerted.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// One scan pass. Returns the notifications to alert now.
  ///
  /// A notification already alerted by an earlier pass is skipped while it
  /// stays due; it is forgotten once it leaves the window or stops being
  /// PENDING.
  pub fn scan(&self, events: &[Event], now: NaiveDateTime) -> Vec<DueNotification> {
    let due = due_notifications(events, now);
    let due_keys: HashSet<_> = due.iter().map(DueNotification::key).collect();

    let mut alerted = self.alerted();
    alerted.retain(|key| due_keys.contains(key));
    due
      .into_iter()
      .filter(|n| alerted.insert(n.key()))
      .collect()
  }

  /// Scan every interval until `shutdown` flips to `true` or its sender is
  /// dropped. `events` is read afresh on each pass.
  pub async fn run<F, N>(&self, events: F, sink: &N, mut shutdown: watch::Receiver<bool>)
  where
    F: Fn() -> Vec<Event>,
    N: Notifier + ?Sized,
  {
    let mut ticker = time::interval(self.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      tokio::select! {
        _ = ticker.tick() => {
          let now = (self.clock)();
          let fired = self.scan(&events(), now);
          if !fired.is_empty() {
            tracing::debug!(count = fired.len(), "raising reminder alerts");
          }
          for due in fired {
            sink.notify(&due.message(), Severity::Info);
          }
        }
        changed = shutdown.changed() => {
          if changed.is_err() || *shutdown.borrow() {
            tracing::debug!("notification scheduler stopped");
            break;
          }
        }
      }
    }
  }
}
