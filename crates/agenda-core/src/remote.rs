//! The `EventRemote` trait: the network boundary behind the event store.
//!
//! Implemented by `agenda-client` over HTTP and by test doubles. Every
//! method is a suspension point; nothing else in this crate awaits.

use std::future::Future;

use crate::{
  Result,
  bulk::BulkDeleteFilter,
  model::{Credentials, Event, EventDraft, EventId, EventPatch},
};

/// Abstraction over the remote persistence service.
///
/// Implementations map transport and HTTP failures onto the
/// [`crate::Error`] taxonomy, keeping 403 distinct as
/// [`crate::Error::Permission`] and unknown ids as
/// [`crate::Error::NotFound`].
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait EventRemote: Send + Sync {
  /// `GET /events?org={orgId}`
  fn list<'a>(
    &'a self,
    creds: &'a Credentials,
  ) -> impl Future<Output = Result<Vec<Event>>> + Send + 'a;

  /// `POST /events`. The returned event carries the server-assigned id.
  fn create<'a>(
    &'a self,
    creds: &'a Credentials,
    draft: &'a EventDraft,
  ) -> impl Future<Output = Result<Event>> + Send + 'a;

  /// `PATCH /events/{id}` with partial-patch semantics.
  fn update<'a>(
    &'a self,
    creds: &'a Credentials,
    id: &'a EventId,
    patch: &'a EventPatch,
  ) -> impl Future<Output = Result<Event>> + Send + 'a;

  /// `DELETE /events/{id}`
  fn delete<'a>(
    &'a self,
    creds: &'a Credentials,
    id: &'a EventId,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  /// `DELETE /events` with filter fields. The server does not report which
  /// events were removed.
  fn bulk_delete<'a>(
    &'a self,
    creds: &'a Credentials,
    filter: &'a BulkDeleteFilter,
  ) -> impl Future<Output = Result<()>> + Send + 'a;
}
