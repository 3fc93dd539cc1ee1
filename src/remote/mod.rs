//! Typed access to the item API.

mod client;

pub use client::ItemsClient;

use color_eyre::Result;
use std::future::Future;

use crate::model::Item;

/// The four item calls. Each is one request/response round trip with no retry.
pub trait ItemsApi: Clone + Send + Sync + 'static {
  fn list(&self) -> impl Future<Output = Result<Vec<Item>>> + Send;

  fn create(&self, title: String) -> impl Future<Output = Result<Item>> + Send;

  fn update(&self, id: i64, title: String) -> impl Future<Output = Result<Item>> + Send;

  fn delete(&self, id: i64) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
pub mod fake {
  //! In-memory [`ItemsApi`] for cache and view tests.

  use super::*;
  use color_eyre::eyre::eyre;
  use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
  use std::sync::{Arc, Mutex};
  use std::time::Duration;

  #[derive(Clone, Default)]
  pub struct FakeApi {
    items: Arc<Mutex<Vec<Item>>>,
    next_id: Arc<AtomicI64>,
    list_calls: Arc<AtomicUsize>,
    fail_deletes: Arc<AtomicBool>,
    fail_lists: Arc<AtomicBool>,
    latency: Arc<Mutex<Duration>>,
    list_lag: Arc<Mutex<Duration>>,
  }

  impl FakeApi {
    pub fn with_items(items: Vec<Item>) -> Self {
      let next = items.iter().map(|i| i.id).max().unwrap_or(0) + 1;
      let api = Self::default();
      *api.items.lock().unwrap() = items;
      api.next_id.store(next, Ordering::SeqCst);
      api
    }

    pub fn items(&self) -> Vec<Item> {
      self.items.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
      self.list_calls.load(Ordering::SeqCst)
    }

    pub fn fail_deletes(&self, fail: bool) {
      self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_lists(&self, fail: bool) {
      self.fail_lists.store(fail, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
      *self.latency.lock().unwrap() = latency;
    }

    /// Lists read the items at once but answer only after `lag`, so a
    /// write can land in between.
    pub fn set_list_lag(&self, lag: Duration) {
      *self.list_lag.lock().unwrap() = lag;
    }

    async fn delay(&self) {
      let latency = *self.latency.lock().unwrap();
      if !latency.is_zero() {
        tokio::time::sleep(latency).await;
      }
    }
  }

  impl ItemsApi for FakeApi {
    async fn list(&self) -> Result<Vec<Item>> {
      self.list_calls.fetch_add(1, Ordering::SeqCst);
      self.delay().await;
      if self.fail_lists.load(Ordering::SeqCst) {
        return Err(eyre!("connection refused"));
      }
      let snapshot = self.items();
      let lag = *self.list_lag.lock().unwrap();
      if !lag.is_zero() {
        tokio::time::sleep(lag).await;
      }
      Ok(snapshot)
    }

    async fn create(&self, title: String) -> Result<Item> {
      self.delay().await;
      let item = Item::new(self.next_id.fetch_add(1, Ordering::SeqCst), title);
      self.items.lock().unwrap().push(item.clone());
      Ok(item)
    }

    async fn update(&self, id: i64, title: String) -> Result<Item> {
      self.delay().await;
      let mut items = self.items.lock().unwrap();
      let item = items
        .iter_mut()
        .find(|i| i.id == id)
        .ok_or_else(|| eyre!("404 Not Found"))?;
      item.title = Some(title);
      Ok(item.clone())
    }

    async fn delete(&self, id: i64) -> Result<()> {
      self.delay().await;
      if self.fail_deletes.load(Ordering::SeqCst) {
        return Err(eyre!("500 Internal Server Error"));
      }
      self.items.lock().unwrap().retain(|i| i.id != id);
      Ok(())
    }
  }
}
