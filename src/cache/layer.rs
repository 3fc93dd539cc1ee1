//! Keyed query cache with staleness, invalidation and in-flight coalescing.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

use super::traits::CacheResult;

/// Last successful fetch for a key.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
  pub data: T,
  pub fetched_at: DateTime<Utc>,
  /// Set by a mutation; the next read goes to the network
  pub invalidated: bool,
}

type SharedFetch<T> = Shared<BoxFuture<'static, Result<T, String>>>;

struct InFlight<T> {
  generation: u64,
  future: SharedFetch<T>,
}

struct Inner<T> {
  entries: HashMap<String, CacheEntry<T>>,
  in_flight: HashMap<String, InFlight<T>>,
  /// Generation counter at the last invalidation of each key. Fetches numbered
  /// below it carry pre-mutation data.
  invalidated_below: HashMap<String, u64>,
  next_generation: u64,
}

/// Cache shared by every query and mutation of the client.
///
/// Cloning is cheap; clones see the same entries.
pub struct QueryCache<T> {
  inner: Arc<Mutex<Inner<T>>>,
  /// How long before cached data is considered stale
  stale_time: Duration,
}

fn lock<T>(inner: &Mutex<Inner<T>>) -> MutexGuard<'_, Inner<T>> {
  // Nothing panics while holding the lock, and the map stays usable if it does.
  inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T> QueryCache<T>
where
  T: Clone + Send + Sync + 'static,
{
  pub fn new(stale_time: Duration) -> Self {
    Self {
      inner: Arc::new(Mutex::new(Inner {
        entries: HashMap::new(),
        in_flight: HashMap::new(),
        invalidated_below: HashMap::new(),
        next_generation: 0,
      })),
      stale_time,
    }
  }

  /// Check if cached data is stale based on its fetch timestamp.
  fn is_stale_at(&self, fetched_at: DateTime<Utc>) -> bool {
    Utc::now()
      .signed_duration_since(fetched_at)
      .to_std()
      .map(|age| age > self.stale_time)
      .unwrap_or(false)
  }

  /// Current entry for `key`, without fetching.
  #[cfg(test)]
  pub fn peek(&self, key: &str) -> Option<CacheEntry<T>> {
    lock(&self.inner).entries.get(key).cloned()
  }

  /// True when a read of `key` would go to the network.
  pub fn is_stale(&self, key: &str) -> bool {
    match lock(&self.inner).entries.get(key) {
      Some(entry) => entry.invalidated || self.is_stale_at(entry.fetched_at),
      None => true,
    }
  }

  pub fn is_invalidated(&self, key: &str) -> bool {
    lock(&self.inner)
      .entries
      .get(key)
      .is_some_and(|entry| entry.invalidated)
  }

  #[cfg(test)]
  pub fn is_fetching(&self, key: &str) -> bool {
    lock(&self.inner).in_flight.contains_key(key)
  }

  /// Mark `key` invalid so the next read refetches.
  ///
  /// A fetch already in flight is detached: later readers start a new request
  /// instead of joining it. The detached fetch still writes its result when it
  /// lands, whatever order that happens in, but leaves the entry invalid.
  pub fn invalidate(&self, key: &str) {
    let mut inner = lock(&self.inner);
    if let Some(entry) = inner.entries.get_mut(key) {
      entry.invalidated = true;
    }
    let generation = inner.next_generation;
    inner.invalidated_below.insert(key.to_string(), generation);
    inner.in_flight.remove(key);
    debug!(key, "cache entry invalidated");
  }

  /// Cache-first read.
  ///
  /// 1. Fresh, valid entry - return it without calling `fetcher`
  /// 2. Fetch in flight for `key` - wait for that one
  /// 3. Otherwise call `fetcher` and store its result
  ///
  /// A failed fetch leaves the existing entry untouched.
  pub async fn fetch<F, Fut>(&self, key: &str, fetcher: F) -> Result<CacheResult<T>, String>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    {
      let inner = lock(&self.inner);
      if let Some(entry) = inner.entries.get(key) {
        if !entry.invalidated && !self.is_stale_at(entry.fetched_at) {
          return Ok(CacheResult::from_cache(entry.data.clone()));
        }
      }
    }

    self.fetch_network(key, fetcher).await
  }

  /// Network read regardless of freshness; still joins a fetch in flight.
  pub async fn refetch<F, Fut>(&self, key: &str, fetcher: F) -> Result<CacheResult<T>, String>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    self.fetch_network(key, fetcher).await
  }

  async fn fetch_network<F, Fut>(&self, key: &str, fetcher: F) -> Result<CacheResult<T>, String>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    let (future, joined) = {
      let mut inner = lock(&self.inner);
      match inner.in_flight.get(key) {
        Some(in_flight) => (in_flight.future.clone(), true),
        None => {
          let generation = inner.next_generation;
          inner.next_generation += 1;

          let future = self.store_on_completion(key, generation, fetcher());
          inner.in_flight.insert(
            key.to_string(),
            InFlight {
              generation,
              future: future.clone(),
            },
          );
          (future, false)
        }
      }
    };

    if joined {
      debug!(key, "joining in-flight fetch");
    }

    let data = future.await?;
    Ok(if joined {
      CacheResult::from_shared(data)
    } else {
      CacheResult::from_network(data)
    })
  }

  /// Wrap a fetch so its result is written exactly once, by whichever caller
  /// drives it to completion.
  fn store_on_completion<Fut>(&self, key: &str, generation: u64, fetch: Fut) -> SharedFetch<T>
  where
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    let inner = Arc::clone(&self.inner);
    let key = key.to_string();

    async move {
      let result = fetch.await;

      let mut guard = lock(&inner);
      if guard
        .in_flight
        .get(&key)
        .is_some_and(|f| f.generation == generation)
      {
        guard.in_flight.remove(&key);
      }

      // Last writer wins, but a fetch that started before an invalidation
      // cannot mark the entry valid again.
      if let Ok(data) = &result {
        let predates_invalidation = guard
          .invalidated_below
          .get(&key)
          .is_some_and(|&below| generation < below);
        guard.entries.insert(
          key.clone(),
          CacheEntry {
            data: data.clone(),
            fetched_at: Utc::now(),
            invalidated: predates_invalidation,
          },
        );
      }

      result
    }
    .boxed()
    .shared()
  }
}

impl<T> Clone for QueryCache<T> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
      stale_time: self.stale_time,
    }
  }
}
