//! A small typed cache with TTL-on-read and explicit invalidation.
//!
//! Entries remember when they were fetched. [`TtlCache::get`] treats an
//! expired entry as missing, while [`TtlCache::peek`] still returns it so a
//! stale value can keep rendering until the refetch lands.

use std::{borrow::Borrow, collections::HashMap, hash::Hash, time::Duration};

use tokio::time::Instant;

/// A cached value with its fetch time.
#[derive(Debug, Clone)]
pub struct Cached<V> {
  pub value:       V,
  pub fetched_at:  Instant,
  pub invalidated: bool,
}

impl<V> Cached<V> {
  fn is_fresh(&self, ttl: Duration) -> bool {
    !self.invalidated && self.fetched_at.elapsed() < ttl
  }
}

#[derive(Debug)]
pub struct TtlCache<K, V> {
  ttl:     Duration,
  entries: HashMap<K, Cached<V>>,
}

impl<K: Eq + Hash, V> TtlCache<K, V> {
  pub fn new(ttl: Duration) -> Self {
    Self { ttl, entries: HashMap::new() }
  }

  pub fn ttl(&self) -> Duration { self.ttl }

  /// The value for `key` if present and younger than the TTL.
  pub fn get<Q>(&self, key: &Q) -> Option<&V>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self
      .entries
      .get(key)
      .filter(|cached| cached.is_fresh(self.ttl))
      .map(|cached| &cached.value)
  }

  /// The value for `key` regardless of age.
  pub fn peek<Q>(&self, key: &Q) -> Option<&V>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.entries.get(key).map(|cached| &cached.value)
  }

  pub fn is_fresh<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.get(key).is_some()
  }

  /// Store `value` and restart its TTL.
  pub fn set(&mut self, key: K, value: V) {
    self.entries.insert(key, Cached {
      value,
      fetched_at: Instant::now(),
      invalidated: false,
    });
  }

  /// Mutate a present entry in place without restarting its TTL. Returns
  /// `None` if `key` is absent.
  pub fn update<Q, R>(&mut self, key: &Q, f: impl FnOnce(&mut V) -> R) -> Option<R>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.entries.get_mut(key).map(|cached| f(&mut cached.value))
  }

  /// Mark `key` stale. The value stays readable through [`Self::peek`].
  pub fn invalidate<Q>(&mut self, key: &Q)
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    if let Some(cached) = self.entries.get_mut(key) {
      cached.invalidated = true;
    }
  }

  /// Remove `key` entirely.
  pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.entries.remove(key).map(|cached| cached.value)
  }
}
