//! Core types and engines for the agenda calendar scheduler.
//!
//! This crate holds everything between a UI gesture and the network: range
//! validation, the optimistic overlay, in-flight tracking, the canonical
//! event store, bulk-delete filters and the notification scan. It has no
//! HTTP dependencies; the remote service is reached through the
//! [`remote::EventRemote`] trait.

pub mod bulk;
pub mod cache;
pub mod controller;
pub mod error;
pub mod guard;
pub mod inflight;
pub mod model;
pub mod notify;
pub mod overlay;
pub mod remote;
pub mod store;

pub use error::{Error, Result};

#[cfg(test)]
mod tests;
