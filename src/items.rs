//! Item queries, mutations and the store fetch, bound to an [`ItemsApi`].

use tokio::sync::mpsc;
use tracing::warn;

use crate::cache::{QueryCache, QueryPolicy};
use crate::model::Item;
use crate::mutation::Mutation;
use crate::query::Query;
use crate::remote::ItemsApi;
use crate::store::Action;

/// Cache key of the item list
pub const ITEMS_KEY: &str = "items";

/// The list query, served from `cache` while fresh.
pub fn items_query<A: ItemsApi>(api: A, cache: QueryCache<Vec<Item>>, policy: QueryPolicy) -> Query<Vec<Item>> {
  Query::new(ITEMS_KEY, cache, policy, move || {
    let api = api.clone();
    async move { api.list().await.map_err(|e| e.to_string()) }
  })
}

/// Create an item; on success the list entry is invalidated.
pub fn add_item<A: ItemsApi>(api: A, cache: QueryCache<Vec<Item>>) -> Mutation<String, Item> {
  Mutation::new(move |title: String| {
    let api = api.clone();
    let cache = cache.clone();
    async move {
      let item = api.create(title).await.map_err(|e| e.to_string())?;
      cache.invalidate(ITEMS_KEY);
      Ok(item)
    }
  })
}

/// Replace an item's title; on success the list entry is invalidated.
pub fn update_item<A: ItemsApi>(api: A, cache: QueryCache<Vec<Item>>) -> Mutation<(i64, String), Item> {
  Mutation::new(move |(id, title): (i64, String)| {
    let api = api.clone();
    let cache = cache.clone();
    async move {
      let item = api.update(id, title).await.map_err(|e| e.to_string())?;
      cache.invalidate(ITEMS_KEY);
      Ok(item)
    }
  })
}

/// Delete an item by id, resolving to that id; on success the list entry is
/// invalidated. On failure the cache is left as it was.
pub fn delete_item<A: ItemsApi>(api: A, cache: QueryCache<Vec<Item>>) -> Mutation<i64, i64> {
  Mutation::new(move |id: i64| {
    let api = api.clone();
    let cache = cache.clone();
    async move {
      api.delete(id).await.map_err(|e| e.to_string())?;
      cache.invalidate(ITEMS_KEY);
      Ok(id)
    }
  })
}

/// Load the list into the store, bypassing the query cache.
///
/// `FetchRequested` is sent immediately, the outcome when the request settles.
pub fn fetch_items<A: ItemsApi>(api: &A, actions: &mpsc::UnboundedSender<Action>) {
  let _ = actions.send(Action::FetchRequested);

  let api = api.clone();
  let actions = actions.clone();
  tokio::spawn(async move {
    let action = match api.list().await {
      Ok(items) => Action::FetchSucceeded(items),
      Err(e) => {
        warn!(error = %e, "item fetch failed");
        Action::FetchFailed(e.to_string())
      }
    };
    let _ = actions.send(action);
  });
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::remote::fake::FakeApi;
  use std::time::Duration;

  async fn settle<V: Send + 'static, R: Clone + Send + 'static>(
    mutation: &mut Mutation<V, R>,
  ) -> Result<R, String> {
    for _ in 0..50 {
      if let Some(outcome) = mutation.poll() {
        return outcome;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("mutation did not settle");
  }

  async fn warm_cache(api: &FakeApi) -> QueryCache<Vec<Item>> {
    let cache = QueryCache::new(Duration::from_secs(300));
    let api = api.clone();
    cache
      .fetch(ITEMS_KEY, move || async move { api.list().await.map_err(|e| e.to_string()) })
      .await
      .unwrap();
    cache
  }

  #[tokio::test]
  async fn test_successful_mutation_invalidates() {
    let api = FakeApi::default();
    let cache = warm_cache(&api).await;

    let mut add = add_item(api.clone(), cache.clone());
    add.mutate("X".to_string());
    let created = settle(&mut add).await.unwrap();

    assert_eq!(created.title.as_deref(), Some("X"));
    assert!(cache.is_invalidated(ITEMS_KEY));
  }

  #[tokio::test]
  async fn test_failed_mutation_leaves_cache() {
    let api = FakeApi::with_items(vec![Item::new(1, "a")]);
    let cache = warm_cache(&api).await;
    api.fail_deletes(true);

    let mut delete = delete_item(api.clone(), cache.clone());
    delete.mutate(1);
    assert!(settle(&mut delete).await.is_err());

    let entry = cache.peek(ITEMS_KEY).unwrap();
    assert!(!entry.invalidated);
    assert_eq!(entry.data, vec![Item::new(1, "a")]);
  }

  #[tokio::test]
  async fn test_update_unknown_id_fails() {
    let api = FakeApi::default();
    let cache = warm_cache(&api).await;

    let mut update = update_item(api.clone(), cache.clone());
    update.mutate((3, "Y".to_string()));
    assert!(settle(&mut update).await.is_err());
    assert!(!cache.is_invalidated(ITEMS_KEY));
  }

  #[tokio::test]
  async fn test_fetch_items_sends_request_then_outcome() {
    let api = FakeApi::with_items(vec![Item::new(1, "a")]);
    let (tx, mut rx) = mpsc::unbounded_channel();

    fetch_items(&api, &tx);

    assert_eq!(rx.recv().await, Some(Action::FetchRequested));
    assert_eq!(
      rx.recv().await,
      Some(Action::FetchSucceeded(vec![Item::new(1, "a")]))
    );

    api.fail_lists(true);
    fetch_items(&api, &tx);
    assert_eq!(rx.recv().await, Some(Action::FetchRequested));
    assert!(matches!(rx.recv().await, Some(Action::FetchFailed(_))));
  }
}
