//! Core types for the caching system.

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from a fetch this caller started.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
    }
  }

  /// Create a new cache result from a fetch another caller started.
  pub fn from_shared(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Shared,
    }
  }

  /// Create a new cache result from a fresh cached entry.
  pub fn from_cache(data: T) -> Self {
    Self {
      data,
      source: CacheSource::CacheFresh,
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Joined a fetch already in flight for the same key
  Shared,
  /// Data from cache, still considered fresh
  CacheFresh,
}
