//! Bulk deletion by day, date range, month, year or everything.
//!
//! Deletion is two-phase. [`prepare`] turns the user's scope selection into a
//! [`PreparedBulkDelete`] carrying the request filter and the confirmation
//! text to show in a second modal. Only after the user confirms does the
//! caller hand it to [`execute`], which consumes it. The server does not say
//! which events it removed, so the caller refetches afterwards.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  model::{Credentials, Event},
  remote::EventRemote,
};

const MONTHS_PT: [&str; 12] = [
  "janeiro", "fevereiro", "março", "abril", "maio", "junho", "julho",
  "agosto", "setembro", "outubro", "novembro", "dezembro",
];

// ─── Scope and parameters ────────────────────────────────────────────────────

/// Granularity of a bulk deletion.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BulkDeleteScope {
  /// A single day or an inclusive range of days.
  Day,
  Month,
  Year,
  All,
}

/// The date fields picked in the bulk-delete form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkDeleteParams {
  pub start_date: Option<NaiveDate>,
  /// Last day of a range; `None` means a single day.
  pub end_date:   Option<NaiveDate>,
  pub year:       Option<i32>,
  /// 1-based month.
  pub month:      Option<u32>,
}

// ─── Filter ──────────────────────────────────────────────────────────────────

/// Request filter for `DELETE /events`. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDeleteFilter {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub year:  Option<i32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub month: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "wire_millis")]
  pub start: Option<NaiveDateTime>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "wire_millis")]
  pub end:   Option<NaiveDateTime>,
}

impl BulkDeleteFilter {
  pub fn is_empty(&self) -> bool { *self == Self::default() }

  /// The scope this filter expresses.
  pub fn scope(&self) -> BulkDeleteScope {
    match (self.start, self.year, self.month) {
      (Some(_), ..) => BulkDeleteScope::Day,
      (None, Some(_), Some(_)) => BulkDeleteScope::Month,
      (None, Some(_), None) => BulkDeleteScope::Year,
      _ if self.end.is_some() => BulkDeleteScope::Day,
      _ => BulkDeleteScope::All,
    }
  }

  /// Whether `event` falls under this filter, judged by its start time.
  /// Every present field must hold.
  pub fn matches(&self, event: &Event) -> bool {
    let at = event.start_at;
    self.start.is_none_or(|start| at >= start)
      && self.end.is_none_or(|end| at <= end)
      && self.year.is_none_or(|year| at.year() == year)
      && self.month.is_none_or(|month| at.month() == month)
  }
}

/// `Option<NaiveDateTime>` as `YYYY-MM-DDTHH:MM:SS.mmm`.
mod wire_millis {
  use chrono::NaiveDateTime;
  use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

  const WRITE: &str = "%Y-%m-%dT%H:%M:%S%.3f";
  const READ: &str = "%Y-%m-%dT%H:%M:%S%.f";

  pub fn serialize<S: Serializer>(
    value: &Option<NaiveDateTime>,
    serializer: S,
  ) -> Result<S::Ok, S::Error> {
    match value {
      Some(dt) => serializer.collect_str(&dt.format(WRITE)),
      None => serializer.serialize_none(),
    }
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Option<NaiveDateTime>, D::Error> {
    Option::<String>::deserialize(deserializer)?
      .map(|s| NaiveDateTime::parse_from_str(&s, READ).map_err(D::Error::custom))
      .transpose()
  }
}

// ─── Building ────────────────────────────────────────────────────────────────

fn day_start(date: NaiveDate) -> NaiveDateTime { date.and_time(NaiveTime::MIN) }

fn day_end(date: NaiveDate) -> NaiveDateTime {
  // 23:59:59.999 always exists.
  date.and_time(
    NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN),
  )
}

fn require<T>(value: Option<T>, what: &str) -> Result<T> {
  value.ok_or_else(|| Error::InvalidScope(format!("{what} is required")))
}

fn check_month(month: u32) -> Result<u32> {
  if (1..=12).contains(&month) {
    Ok(month)
  } else {
    Err(Error::InvalidScope(format!("month {month} is out of range")))
  }
}

/// Map a scope selection to a request filter. Pure.
///
/// - `Day`: `start`/`end` span `00:00:00.000` of the first day to
///   `23:59:59.999` of the last day (the same day when no end is given).
/// - `Month`/`Year`: only `year` (and `month`) are set.
/// - `All`: the empty filter.
pub fn build_filter(
  scope: BulkDeleteScope,
  params: &BulkDeleteParams,
) -> Result<BulkDeleteFilter> {
  match scope {
    BulkDeleteScope::Day => {
      let first = require(params.start_date, "start date")?;
      let last = params.end_date.unwrap_or(first);
      if last < first {
        return Err(Error::InvalidScope(format!(
          "end date {last} is before start date {first}"
        )));
      }
      Ok(BulkDeleteFilter {
        start: Some(day_start(first)),
        end: Some(day_end(last)),
        ..BulkDeleteFilter::default()
      })
    }
    BulkDeleteScope::Month => Ok(BulkDeleteFilter {
      year: Some(require(params.year, "year")?),
      month: Some(check_month(require(params.month, "month")?)?),
      ..BulkDeleteFilter::default()
    }),
    BulkDeleteScope::Year => Ok(BulkDeleteFilter {
      year: Some(require(params.year, "year")?),
      ..BulkDeleteFilter::default()
    }),
    BulkDeleteScope::All => Ok(BulkDeleteFilter::default()),
  }
}

fn dmy(dt: NaiveDateTime) -> String { dt.format("%d/%m/%Y").to_string() }

/// The sentence shown in the confirmation modal.
///
/// A day range whose endpoints fall on the same date reads as a single day.
pub fn confirm_message(scope: BulkDeleteScope, filter: &BulkDeleteFilter) -> String {
  const ASK: &str = "Tem certeza que deseja excluir todos os eventos";
  const UNDO: &str = "Esta ação não pode ser desfeita.";

  match scope {
    BulkDeleteScope::Day => match (filter.start, filter.end) {
      (Some(start), Some(end)) if start.date() != end.date() => {
        format!("{ASK} dos dias {} a {}? {UNDO}", dmy(start), dmy(end))
      }
      (Some(day), _) | (None, Some(day)) => {
        format!("{ASK} do dia {}? {UNDO}", dmy(day))
      }
      (None, None) => confirm_message(BulkDeleteScope::All, filter),
    },
    BulkDeleteScope::Month => {
      let month = filter
        .month
        .and_then(|m| MONTHS_PT.get(m.wrapping_sub(1) as usize))
        .copied()
        .unwrap_or("?");
      let year = filter.year.map(|y| y.to_string()).unwrap_or_default();
      format!("{ASK} de {month} de {year}? {UNDO}")
    }
    BulkDeleteScope::Year => {
      let year = filter.year.map(|y| y.to_string()).unwrap_or_default();
      format!("{ASK} do ano de {year}? {UNDO}")
    }
    BulkDeleteScope::All => "Tem certeza que deseja excluir TODOS os eventos da \
                             organização? Esta ação é irreversível e remove \
                             todos os eventos, de todos os períodos."
      .to_owned(),
  }
}

// ─── Executing ───────────────────────────────────────────────────────────────

/// A filter paired with the confirmation text the user must accept first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedBulkDelete {
  pub scope:   BulkDeleteScope,
  pub filter:  BulkDeleteFilter,
  pub message: String,
}

/// Build the filter and its confirmation message in one step.
pub fn prepare(
  scope: BulkDeleteScope,
  params: &BulkDeleteParams,
) -> Result<PreparedBulkDelete> {
  let filter = build_filter(scope, params)?;
  let message = confirm_message(scope, &filter);
  Ok(PreparedBulkDelete { scope, filter, message })
}

/// Send the deletion. The caller must already hold the user's confirmation
/// of `prepared.message`; this does not ask again.
pub async fn execute<R: EventRemote>(
  remote: &R,
  creds: &Credentials,
  prepared: PreparedBulkDelete,
) -> Result<()> {
  creds.ensure()?;
  tracing::debug!(org = %creds.org_id, scope = %prepared.scope, "dispatching bulk delete");
  match remote.bulk_delete(creds, &prepared.filter).await {
    Ok(()) => {
      tracing::info!(org = %creds.org_id, scope = %prepared.scope, "bulk delete confirmed");
      Ok(())
    }
    Err(e) => {
      tracing::warn!(org = %creds.org_id, scope = %prepared.scope, error = %e, "bulk delete failed");
      Err(e)
    }
  }
}
