//! Error types for `agenda-core`.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::model::EventId;

const PERMISSION_MESSAGE: &str =
  "Você não tem permissão para esta ação. Contate o administrador da sua \
   organização.";
const NOT_FOUND_MESSAGE: &str = "Este evento não existe mais.";
const NETWORK_FALLBACK: &str =
  "Não foi possível concluir a operação. Tente novamente.";
const RANGE_MESSAGE: &str = "O término do evento deve ser após o início.";
const BUSY_MESSAGE: &str =
  "Aguarde a alteração anterior deste evento ser concluída.";
const FETCH_BUSY_MESSAGE: &str =
  "A agenda ainda está sendo carregada. Aguarde e tente novamente.";
const AUTH_MESSAGE: &str = "Sessão inválida. Entre novamente.";

#[derive(Debug, Error)]
pub enum Error {
  /// `end <= start`; raised before any overlay or network activity.
  #[error("invalid range: end {end} is not after start {start}")]
  Range {
    start: NaiveDateTime,
    end:   NaiveDateTime,
  },

  #[error("event {0} already has a mutation in flight")]
  ConcurrentMutation(EventId),

  #[error("missing credentials: {0}")]
  Auth(String),

  /// HTTP 403.
  #[error("permission denied")]
  Permission { server_message: Option<String> },

  #[error("event not found: {0}")]
  NotFound(EventId),

  /// Transport failure, timeout, or an unexpected status code.
  #[error("network error: {detail}")]
  Network {
    status:         Option<u16>,
    server_message: Option<String>,
    detail:         String,
  },

  /// The server rejected the payload.
  #[error("validation failed: {message}")]
  Validation {
    status:  Option<u16>,
    message: String,
  },

  #[error("a fetch is already in progress for organization {0}")]
  FetchInProgress(String),

  #[error("invalid bulk delete scope: {0}")]
  InvalidScope(String),
}

impl Error {
  /// The HTTP status code behind this error, when it came from the server.
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Permission { .. } => Some(403),
      Self::NotFound(_) => Some(404),
      Self::Network { status, .. } | Self::Validation { status, .. } => *status,
      _ => None,
    }
  }

  /// Whether the caller should refetch the canonical list after this error.
  pub fn wants_refresh(&self) -> bool { matches!(self, Self::NotFound(_)) }

  /// Human-readable text for the notification sink. Server-supplied text is
  /// preferred over the generic fallback.
  pub fn user_message(&self) -> String {
    match self {
      Self::Range { .. } => RANGE_MESSAGE.into(),
      Self::ConcurrentMutation(_) => BUSY_MESSAGE.into(),
      Self::Auth(_) => AUTH_MESSAGE.into(),
      Self::Permission { .. } => PERMISSION_MESSAGE.into(),
      Self::NotFound(_) => NOT_FOUND_MESSAGE.into(),
      Self::Network { server_message, .. } => server_message
        .clone()
        .unwrap_or_else(|| NETWORK_FALLBACK.into()),
      Self::Validation { message, .. } => message.clone(),
      Self::FetchInProgress(_) => FETCH_BUSY_MESSAGE.into(),
      Self::InvalidScope(reason) => reason.clone(),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
