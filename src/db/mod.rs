//! File-backed document store.
//!
//! The whole document is read on every request and rewritten on every mutation.
//! Writes overwrite the file in place, so a crash mid-write can leave it truncated.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::model::Document;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("failed to access {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("failed to parse {path}: {source}")]
  Json {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// Read-all / write-all access to the persisted document.
///
/// There is no locking between a `read_all` and the following `write_all`;
/// callers that read-modify-write can lose updates when they interleave.
pub trait DocumentStore: Send + Sync + 'static {
  fn read_all(&self) -> impl Future<Output = Result<Document, StoreError>> + Send;

  fn write_all(&self, document: &Document) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// JSON file on local disk.
#[derive(Debug, Clone)]
pub struct FileStore {
  path: PathBuf,
}

impl FileStore {
  /// Open the store at `path`, creating the parent directory if needed.
  /// The file itself is created by the first write.
  pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
    let path = path.into();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
        path: parent.to_path_buf(),
        source,
      })?;
    }

    Ok(Self { path })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl DocumentStore for FileStore {
  async fn read_all(&self) -> Result<Document, StoreError> {
    let bytes = match tokio::fs::read(&self.path).await {
      Ok(bytes) => bytes,
      Err(e) if e.kind() == ErrorKind::NotFound => {
        debug!(path = %self.path.display(), "no document yet, starting empty");
        return Ok(Document::default());
      }
      Err(source) => {
        return Err(StoreError::Io {
          path: self.path.clone(),
          source,
        })
      }
    };

    serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
      path: self.path.clone(),
      source,
    })
  }

  async fn write_all(&self, document: &Document) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(document).map_err(|source| StoreError::Json {
      path: self.path.clone(),
      source,
    })?;

    tokio::fs::write(&self.path, bytes)
      .await
      .map_err(|source| StoreError::Io {
        path: self.path.clone(),
        source,
      })?;

    debug!(path = %self.path.display(), items = document.items.len(), "document written");
    Ok(())
  }
}
