//! Synchronous range validation for proposed event times.
//!
//! Two events may overlap freely (shared calendars); only the internal
//! consistency of a single event is checked here.

use chrono::NaiveDateTime;

use crate::{Error, Result};

/// Fails with [`Error::Range`] unless `end_at` is strictly after `start_at`.
pub fn validate_range(start_at: NaiveDateTime, end_at: NaiveDateTime) -> Result<()> {
  if end_at <= start_at {
    return Err(Error::Range { start: start_at, end: end_at });
  }
  Ok(())
}
