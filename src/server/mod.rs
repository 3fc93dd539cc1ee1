//! Item API server: axum routes over a file-backed document store.

mod error;
mod routes;
mod service;

pub use routes::router;
pub use service::ItemService;

use color_eyre::{eyre::eyre, Result};
use std::future::Future;
use std::io;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::db::FileStore;

/// Bind the configured address and serve until the process is stopped.
pub async fn serve(config: &ServerConfig) -> Result<()> {
  let store = FileStore::open(&config.db_path)?;
  info!(path = %store.path().display(), "using document store");

  let app = router(ItemService::new(store));

  let addr = format!("{}:{}", config.host, config.port);
  let listener = TcpListener::bind(&addr)
    .await
    .map_err(|e| eyre!("Failed to bind {}: {}", addr, e))?;

  info!("Server running on http://{}", listener.local_addr()?);

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_on(tokio::signal::ctrl_c()))
    .await
    .map_err(|e| eyre!("Server error: {}", e))?;

  info!("server stopped");
  Ok(())
}

/// Resolves when `signal` fires. If the handler could not be installed the
/// server keeps running until killed.
async fn shutdown_on<F>(signal: F)
where
  F: Future<Output = io::Result<()>>,
{
  match signal.await {
    Ok(()) => info!("shutdown requested"),
    Err(e) => {
      warn!(error = %e, "failed to listen for ctrl-c, graceful shutdown disabled");
      std::future::pending::<()>().await;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[tokio::test]
  async fn test_signal_fires_shutdown() {
    let done = tokio::time::timeout(
      Duration::from_millis(100),
      shutdown_on(async { Ok(()) }),
    )
    .await;
    assert!(done.is_ok());
  }

  #[tokio::test]
  async fn test_failed_signal_keeps_serving() {
    let done = tokio::time::timeout(
      Duration::from_millis(50),
      shutdown_on(async { Err(io::Error::other("no signal driver")) }),
    )
    .await;
    assert!(done.is_err());
  }
}
