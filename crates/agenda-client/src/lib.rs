//! HTTP client side of the agenda service.
//!
//! [`HttpRemote`] implements [`agenda_core::remote::EventRemote`] over the
//! JSON API; the `agenda` binary drives a
//! [`agenda_core::controller::CalendarController`] with it.

pub mod client;

pub use client::{ApiConfig, DEFAULT_TIMEOUT, HttpRemote};
