//! Async HTTP implementation of [`EventRemote`] over the agenda JSON API.

use std::{future::Future, time::Duration};

use agenda_core::{
  Error, Result,
  bulk::BulkDeleteFilter,
  model::{Credentials, Event, EventDraft, EventId, EventPatch},
  remote::EventRemote,
};
use anyhow::Context as _;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the agenda API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub timeout:  Duration,
}

impl ApiConfig {
  pub fn new(base_url: impl Into<String>) -> Self {
    Self { base_url: base_url.into(), timeout: DEFAULT_TIMEOUT }
  }
}

/// [`EventRemote`] backed by `reqwest`.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpRemote {
  client: Client,
  config: ApiConfig,
}

/// Shape of an error body: `{"error": "..."}`.
#[derive(Deserialize)]
struct ErrorBody {
  error: String,
}

impl HttpRemote {
  pub fn new(config: ApiConfig) -> anyhow::Result<Self> {
    let client = Client::builder()
      .timeout(config.timeout)
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  pub fn config(&self) -> &ApiConfig { &self.config }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
  }

  /// A request carrying the bearer token and the `org` query parameter.
  fn request(&self, method: Method, path: &str, creds: &Credentials) -> RequestBuilder {
    self
      .client
      .request(method, self.url(path))
      .bearer_auth(&creds.token)
      .query(&[("org", creds.org_id.as_str())])
  }
}

// ─── Response mapping ─────────────────────────────────────────────────────────

/// Send `req`, mapping transport failures and non-success statuses onto the
/// core taxonomy. `id` turns a 404 into [`Error::NotFound`].
async fn send(req: RequestBuilder, what: &str, id: Option<&EventId>) -> Result<Response> {
  tracing::debug!(request = what, "sending");
  let resp = req.send().await.map_err(|e| Error::Network {
    status:         None,
    server_message: None,
    detail:         format!("{what}: {e}"),
  })?;

  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  let body = resp.text().await.unwrap_or_default();
  Err(status_error(status, &body, what, id))
}

async fn decode<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T> {
  let status = resp.status();
  resp.json().await.map_err(|e| Error::Network {
    status:         Some(status.as_u16()),
    server_message: None,
    detail:         format!("{what}: invalid response body: {e}"),
  })
}

/// Map an HTTP failure onto [`Error`]. 403 always stays distinct.
pub fn status_error(status: StatusCode, body: &str, what: &str, id: Option<&EventId>) -> Error {
  let server_message = serde_json::from_str::<ErrorBody>(body)
    .ok()
    .map(|b| b.error)
    .filter(|m| !m.trim().is_empty());

  match (status.as_u16(), id) {
    (401, _) => Error::Auth(server_message.unwrap_or_else(|| "token rejected".into())),
    (403, _) => Error::Permission { server_message },
    (404, Some(id)) => Error::NotFound(id.clone()),
    (400 | 422, _) => Error::Validation {
      status:  Some(status.as_u16()),
      message: server_message.unwrap_or_else(|| status.to_string()),
    },
    (code, _) => Error::Network {
      status: Some(code),
      server_message,
      detail: format!("{what} → {status}"),
    },
  }
}

// ─── EventRemote ──────────────────────────────────────────────────────────────

impl EventRemote for HttpRemote {
  /// `GET /events?org=<id>`
  fn list<'a>(
    &'a self,
    creds: &'a Credentials,
  ) -> impl Future<Output = Result<Vec<Event>>> + Send + 'a {
    async move {
      let resp = send(self.request(Method::GET, "/events", creds), "GET /events", None).await?;
      decode(resp, "GET /events").await
    }
  }

  /// `POST /events?org=<id>`
  fn create<'a>(
    &'a self,
    creds: &'a Credentials,
    draft: &'a EventDraft,
  ) -> impl Future<Output = Result<Event>> + Send + 'a {
    async move {
      let req = self.request(Method::POST, "/events", creds).json(draft);
      let resp = send(req, "POST /events", None).await?;
      decode(resp, "POST /events").await
    }
  }

  /// `PATCH /events/{id}?org=<id>`
  fn update<'a>(
    &'a self,
    creds: &'a Credentials,
    id: &'a EventId,
    patch: &'a EventPatch,
  ) -> impl Future<Output = Result<Event>> + Send + 'a {
    async move {
      let req = self
        .request(Method::PATCH, &format!("/events/{id}"), creds)
        .json(patch);
      let resp = send(req, "PATCH /events/{id}", Some(id)).await?;
      decode(resp, "PATCH /events/{id}").await
    }
  }

  /// `DELETE /events/{id}?org=<id>`
  fn delete<'a>(
    &'a self,
    creds: &'a Credentials,
    id: &'a EventId,
  ) -> impl Future<Output = Result<()>> + Send + 'a {
    async move {
      let req = self.request(Method::DELETE, &format!("/events/{id}"), creds);
      send(req, "DELETE /events/{id}", Some(id)).await?;
      Ok(())
    }
  }

  /// `DELETE /events?org=<id>[&year][&month][&start][&end]`
  fn bulk_delete<'a>(
    &'a self,
    creds: &'a Credentials,
    filter: &'a BulkDeleteFilter,
  ) -> impl Future<Output = Result<()>> + Send + 'a {
    async move {
      let req = self.request(Method::DELETE, "/events", creds).query(filter);
      send(req, "DELETE /events", None).await?;
      Ok(())
    }
  }
}
