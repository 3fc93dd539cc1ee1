use std::time::Duration;

use crate::config::ClientConfig;

/// When a cached query is considered stale and what refetches it in the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPolicy {
  /// Reads within this window after a fetch are served from cache
  pub stale_time: Duration,
  /// Refetch when the terminal regains focus, fresh or not
  pub refetch_on_focus: bool,
  /// Poll the server at this period, fresh or not
  pub refetch_interval: Option<Duration>,
}

impl Default for QueryPolicy {
  fn default() -> Self {
    Self {
      stale_time: Duration::from_secs(5 * 60),
      refetch_on_focus: true,
      refetch_interval: Some(Duration::from_secs(10)),
    }
  }
}

impl From<&ClientConfig> for QueryPolicy {
  fn from(config: &ClientConfig) -> Self {
    Self {
      stale_time: config.stale_time(),
      refetch_on_focus: config.refetch_on_focus,
      refetch_interval: config.refetch_interval(),
    }
  }
}
