//! Item operations as read-modify-write sequences over a [`DocumentStore`].

use chrono::Utc;
use tracing::{debug, info};

use super::error::ApiError;
use crate::db::DocumentStore;
use crate::model::{Item, ItemInput};

/// Source of item ids.
pub trait IdClock: Send + Sync + 'static {
  fn next_id(&self) -> i64;
}

/// Wall-clock epoch milliseconds. Two creates inside the same tick share an id.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl IdClock for SystemClock {
  fn next_id(&self) -> i64 {
    Utc::now().timestamp_millis()
  }
}

/// Stateless handlers for the four item operations.
///
/// Every call reads the full document, and mutating calls write it back.
/// Nothing serializes concurrent calls.
pub struct ItemService<S, C = SystemClock> {
  store: S,
  clock: C,
}

impl<S: DocumentStore> ItemService<S> {
  pub fn new(store: S) -> Self {
    Self::with_clock(store, SystemClock)
  }
}

impl<S: DocumentStore, C: IdClock> ItemService<S, C> {
  pub fn with_clock(store: S, clock: C) -> Self {
    Self { store, clock }
  }

  #[cfg(test)]
  pub fn store(&self) -> &S {
    &self.store
  }

  pub async fn list(&self) -> Result<Vec<Item>, ApiError> {
    let document = self.store.read_all().await?;
    Ok(document.items)
  }

  pub async fn create(&self, input: ItemInput) -> Result<Item, ApiError> {
    let mut document = self.store.read_all().await?;

    let item = Item {
      id: self.clock.next_id(),
      title: input.title,
      extra: Default::default(),
    };
    document.items.push(item.clone());

    self.store.write_all(&document).await?;
    info!(id = item.id, "item created");
    Ok(item)
  }

  /// Replace the title of the first item with `id`, keeping its other fields.
  pub async fn update(&self, id: Option<i64>, input: ItemInput) -> Result<Item, ApiError> {
    let mut document = self.store.read_all().await?;

    let index = id
      .and_then(|id| document.items.iter().position(|item| item.id == id))
      .ok_or(ApiError::NotFound)?;
    let item = &mut document.items[index];
    item.title = input.title;
    let updated = item.clone();

    self.store.write_all(&document).await?;
    info!(id = updated.id, "item updated");
    Ok(updated)
  }

  /// Remove every item with `id`. Unknown ids are not an error; the document is
  /// rewritten either way.
  pub async fn delete(&self, id: Option<i64>) -> Result<(), ApiError> {
    let mut document = self.store.read_all().await?;

    let before = document.items.len();
    document.items.retain(|item| Some(item.id) != id);
    let removed = before - document.items.len();

    self.store.write_all(&document).await?;
    debug!(?id, removed, "delete applied");
    Ok(())
  }
}
