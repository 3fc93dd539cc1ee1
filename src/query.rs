//! Async query abstraction for data fetching with caching support.
//!
//! Inspired by TanStack Query, this module provides a `Query<T>` type that
//! observes one key of a [`QueryCache`], encapsulating loading states, error
//! handling and the background refetch triggers of a [`QueryPolicy`].
//!
//! # Example
//!
//! ```ignore
//! let api = client.clone();
//! let mut query = Query::new("items", cache.clone(), policy, move || {
//!     let api = api.clone();
//!     async move { api.list().await.map_err(|e| e.to_string()) }
//! });
//!
//! // Mount
//! query.fetch();
//!
//! // In event loop tick
//! query.tick();
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::debug;

use crate::cache::{CacheResult, CacheSource, QueryCache, QueryPolicy};

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// First fetch in progress, no data yet
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed with an error
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }
}

/// A boxed future that returns a Result<T, String>
type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;

/// A factory function that creates futures for fetching data
type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// Observer of one cache key.
///
/// Query<T> encapsulates:
/// - The fetching logic (via a closure)
/// - Loading/success/error states
/// - Async result handling via channels
/// - Focus, interval and invalidation refetch triggers
pub struct Query<T> {
  key: String,
  cache: QueryCache<T>,
  policy: QueryPolicy,
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<CacheResult<T>, String>>>,
  last_source: Option<CacheSource>,
  /// When the last request was started, for interval polling
  started_at: Option<Instant>,
}

impl<T: Clone + Send + Sync + 'static> Query<T> {
  /// Create a new query over `key` with the given fetcher function.
  ///
  /// The fetcher is a closure that returns a future. It is only awaited when the
  /// cache decides a network call is needed.
  pub fn new<F, Fut>(key: impl Into<String>, cache: QueryCache<T>, policy: QueryPolicy, fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    Self {
      key: key.into(),
      cache,
      policy,
      state: QueryState::Idle,
      fetcher: Box::new(move || Box::pin(fetcher())),
      receiver: None,
      last_source: None,
      started_at: None,
    }
  }

  pub fn key(&self) -> &str {
    &self.key
  }

  /// Get the current state of the query.
  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  /// Check if any request is outstanding, including background refetches.
  pub fn is_fetching(&self) -> bool {
    self.receiver.is_some()
  }

  /// Where the last settled result came from.
  pub fn last_source(&self) -> Option<CacheSource> {
    self.last_source
  }

  /// Check if the cached data is stale or invalidated.
  pub fn is_stale(&self) -> bool {
    self.cache.is_stale(&self.key)
  }

  /// Read through the cache if not already fetching.
  ///
  /// Fresh cached data settles without a network call.
  pub fn fetch(&mut self) {
    if self.is_fetching() {
      return;
    }
    self.start_fetch(false);
  }

  /// Go to the network even if the cached data is fresh.
  pub fn refetch(&mut self) {
    // Drop any pending result; the cache still stores it when it lands
    self.receiver = None;
    self.start_fetch(true);
  }

  /// Terminal regained focus.
  pub fn on_focus(&mut self) {
    if self.policy.refetch_on_focus {
      debug!(key = %self.key, "refetch on focus");
      self.refetch();
    }
  }

  /// Drive background triggers. Returns `true` if a request was started.
  ///
  /// - refetch interval elapsed since the last request
  /// - the cache entry was invalidated by a mutation
  pub fn tick(&mut self) -> bool {
    if self.is_fetching() || matches!(self.state, QueryState::Idle) {
      return false;
    }

    let interval_due = match (self.policy.refetch_interval, self.started_at) {
      (Some(interval), Some(started)) => started.elapsed() >= interval,
      _ => false,
    };

    if interval_due {
      debug!(key = %self.key, "refetch on interval");
      self.refetch();
      return true;
    }

    if self.cache.is_invalidated(&self.key) {
      debug!(key = %self.key, "refetch after invalidation");
      self.start_fetch(false);
      return true;
    }

    false
  }

  /// Poll for results from a pending fetch.
  ///
  /// Returns `true` if the state changed (data arrived or error occurred).
  /// Call this in your event loop tick handler.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    // Try to receive without blocking
    match receiver.try_recv() {
      Ok(Ok(result)) => {
        self.state = QueryState::Success(result.data);
        self.last_source = Some(result.source);
        self.receiver = None;
        true
      }
      Ok(Err(error)) => {
        self.state = QueryState::Error(error);
        self.receiver = None;
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        // Sender dropped without sending - treat as error
        self.state = QueryState::Error("Query was cancelled".to_string());
        self.receiver = None;
        true
      }
    }
  }

  /// Internal: start the fetch operation
  fn start_fetch(&mut self, force: bool) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.started_at = Some(Instant::now());

    // Background refetches keep showing the previous data
    if !self.state.is_success() {
      self.state = QueryState::Loading;
    }

    let cache = self.cache.clone();
    let key = self.key.clone();
    let future = (self.fetcher)();
    tokio::spawn(async move {
      let result = if force {
        cache.refetch(&key, move || future).await
      } else {
        cache.fetch(&key, move || future).await
      };
      // Ignore send errors - receiver may have been dropped
      let _ = tx.send(result);
    });
  }
}

#[cfg(test)]
impl<T> Query<T> {
  pub fn data(&self) -> Option<&T> {
    match &self.state {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn is_loading(&self) -> bool {
    matches!(self.state, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    self.state.is_success()
  }

  pub fn is_error(&self) -> bool {
    matches!(self.state, QueryState::Error(_))
  }

  pub fn error(&self) -> Option<&str> {
    match &self.state {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("key", &self.key)
      .field("state", &self.state)
      .field("policy", &self.policy)
      .field("started_at", &self.started_at)
      .finish_non_exhaustive()
  }
}
