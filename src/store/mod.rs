//! Global UI store: the view's own copy of the item list.
//!
//! Independent of the query cache. It only changes when an [`Action`] is
//! dispatched, and actions apply in the order they arrive.

use tracing::debug;

use crate::model::Item;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemsState {
  pub items: Vec<Item>,
  pub loading: bool,
  pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
  FetchRequested,
  FetchSucceeded(Vec<Item>),
  FetchFailed(String),
  ItemAdded(Item),
  ItemUpdated(Item),
  ItemDeleted(i64),
}

impl Action {
  fn name(&self) -> &'static str {
    match self {
      Action::FetchRequested => "fetch_requested",
      Action::FetchSucceeded(_) => "fetch_succeeded",
      Action::FetchFailed(_) => "fetch_failed",
      Action::ItemAdded(_) => "item_added",
      Action::ItemUpdated(_) => "item_updated",
      Action::ItemDeleted(_) => "item_deleted",
    }
  }
}

/// Pure transition function.
pub fn reduce(mut state: ItemsState, action: Action) -> ItemsState {
  match action {
    Action::FetchRequested => {
      state.loading = true;
    }
    Action::FetchSucceeded(items) => {
      state.items = items;
      state.loading = false;
      state.error = None;
    }
    Action::FetchFailed(error) => {
      state.loading = false;
      state.error = Some(error);
    }
    Action::ItemAdded(item) => {
      state.items.push(item);
    }
    Action::ItemUpdated(item) => {
      if let Some(existing) = state.items.iter_mut().find(|i| i.id == item.id) {
        *existing = item;
      }
    }
    Action::ItemDeleted(id) => {
      state.items.retain(|i| i.id != id);
    }
  }
  state
}

/// Holder for the current [`ItemsState`].
#[derive(Debug, Default)]
pub struct Store {
  state: ItemsState,
}

impl Store {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn dispatch(&mut self, action: Action) {
    debug!(action = action.name(), "dispatch");
    self.state = reduce(std::mem::take(&mut self.state), action);
  }

  pub fn state(&self) -> &ItemsState {
    &self.state
  }

  pub fn items(&self) -> &[Item] {
    &self.state.items
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn loaded(items: Vec<Item>) -> ItemsState {
    reduce(ItemsState::default(), Action::FetchSucceeded(items))
  }

  #[test]
  fn test_fetch_lifecycle() {
    let state = reduce(ItemsState::default(), Action::FetchRequested);
    assert!(state.loading);

    let state = reduce(state, Action::FetchFailed("offline".into()));
    assert!(!state.loading);
    assert_eq!(state.error.as_deref(), Some("offline"));

    let state = reduce(state, Action::FetchRequested);
    let state = reduce(state, Action::FetchSucceeded(vec![Item::new(1, "a")]));
    assert_eq!(
      state,
      ItemsState {
        items: vec![Item::new(1, "a")],
        loading: false,
        error: None,
      }
    );
  }

  #[test]
  fn test_added_appends() {
    let state = loaded(vec![Item::new(1, "a")]);
    let state = reduce(state, Action::ItemAdded(Item::new(2, "b")));
    assert_eq!(state.items, vec![Item::new(1, "a"), Item::new(2, "b")]);
  }

  #[test]
  fn test_updated_replaces_in_place() {
    let state = loaded(vec![Item::new(1, "a"), Item::new(2, "b"), Item::new(3, "c")]);
    let state = reduce(state, Action::ItemUpdated(Item::new(2, "B")));
    assert_eq!(
      state.items,
      vec![Item::new(1, "a"), Item::new(2, "B"), Item::new(3, "c")]
    );

    let unchanged = reduce(state.clone(), Action::ItemUpdated(Item::new(9, "z")));
    assert_eq!(unchanged, state);
  }

  #[test]
  fn test_deleted_removes_all_matches() {
    let state = loaded(vec![Item::new(1, "a"), Item::new(1, "dup"), Item::new(2, "b")]);
    let state = reduce(state, Action::ItemDeleted(1));
    assert_eq!(state.items, vec![Item::new(2, "b")]);

    let again = reduce(state.clone(), Action::ItemDeleted(1));
    assert_eq!(again, state);
  }

  #[test]
  fn test_store_applies_in_order() {
    let mut store = Store::new();
    store.dispatch(Action::ItemAdded(Item::new(1, "a")));
    store.dispatch(Action::ItemUpdated(Item::new(1, "b")));
    store.dispatch(Action::ItemUpdated(Item::new(1, "c")));
    assert_eq!(store.items(), &[Item::new(1, "c")]);
  }
}
