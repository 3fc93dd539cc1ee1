use crate::cache::{QueryCache, QueryPolicy};
use crate::event::{Event, EventHandler};
use crate::items::{self, ITEMS_KEY};
use crate::model::Item;
use crate::mutation::Mutation;
use crate::query::Query;
use crate::remote::ItemsApi;
use crate::store::{Action, ItemsState, Store};
use crate::ui;
use color_eyre::Result;
use crossterm::event::{DisableFocusChange, EnableFocusChange, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Title given to items created with `a`
const NEW_ITEM_TITLE: &str = "New Item";

/// The user action currently waiting on the server. Controls are disabled while
/// one is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
  Add,
  Update(i64),
  Delete(i64),
}

/// Inline title editor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Editing {
  pub id: i64,
  pub title: String,
}

/// Main application state
///
/// Renders from the store; writes go through the cache-bound mutations.
pub struct App<A: ItemsApi> {
  api: A,
  base_url: String,

  /// Global UI store - what the list shows
  store: Store,
  actions_tx: mpsc::UnboundedSender<Action>,
  actions_rx: mpsc::UnboundedReceiver<Action>,

  /// Server-state cache and the observers bound to it
  cache: QueryCache<Vec<Item>>,
  items_query: Query<Vec<Item>>,
  add_mutation: Mutation<String, Item>,
  update_mutation: Mutation<(i64, String), Item>,
  delete_mutation: Mutation<i64, i64>,

  pending: Option<PendingAction>,
  editing: Option<Editing>,
  selected: usize,

  /// Whether to quit
  should_quit: bool,
}

impl<A: ItemsApi> App<A> {
  pub fn new(api: A, base_url: impl Into<String>, policy: QueryPolicy) -> Self {
    let (actions_tx, actions_rx) = mpsc::unbounded_channel();
    let cache = QueryCache::new(policy.stale_time);

    Self {
      items_query: items::items_query(api.clone(), cache.clone(), policy),
      add_mutation: items::add_item(api.clone(), cache.clone()),
      update_mutation: items::update_item(api.clone(), cache.clone()),
      delete_mutation: items::delete_item(api.clone(), cache.clone()),
      api,
      base_url: base_url.into(),
      store: Store::new(),
      actions_tx,
      actions_rx,
      cache,
      pending: None,
      editing: None,
      selected: 0,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableFocusChange)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(Duration::from_millis(250));

    self.mount();
    info!(url = %self.base_url, "client started");

    // Main loop
    while !self.should_quit {
      // Draw UI
      terminal.draw(|frame| ui::draw(frame, self))?;

      // Handle events
      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }

    // Cleanup terminal
    stdout().execute(DisableFocusChange)?;
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
  }

  /// Initial load: fill the store and start the list query.
  pub fn mount(&mut self) {
    items::fetch_items(&self.api, &self.actions_tx);
    self.items_query.fetch();
  }

  pub fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::FocusGained => self.items_query.on_focus(),
      Event::Tick => {}
    }
    self.tick();
  }

  /// Apply everything that settled since the last tick.
  pub fn tick(&mut self) {
    if let Some(outcome) = self.add_mutation.poll() {
      self.pending = None;
      match outcome {
        Ok(item) => self.store.dispatch(Action::ItemAdded(item)),
        Err(e) => warn!(error = %e, "add failed"),
      }
    }

    if let Some(outcome) = self.update_mutation.poll() {
      self.pending = None;
      self.editing = None;
      match outcome {
        Ok(item) => self.store.dispatch(Action::ItemUpdated(item)),
        Err(e) => warn!(error = %e, "update failed"),
      }
    }

    if let Some(outcome) = self.delete_mutation.poll() {
      self.pending = None;
      match outcome {
        Ok(id) => self.store.dispatch(Action::ItemDeleted(id)),
        Err(e) => {
          // The optimistic removal already happened; resync the whole list.
          warn!(error = %e, "delete failed, refetching");
          items::fetch_items(&self.api, &self.actions_tx);
        }
      }
    }

    while let Ok(action) = self.actions_rx.try_recv() {
      self.store.dispatch(action);
    }

    self.items_query.tick();
    self.items_query.poll();

    self.clamp_selection();
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    if self.editing.is_some() {
      self.handle_edit_key(key);
      return;
    }

    match key.code {
      KeyCode::Char('q') => self.should_quit = true,

      // Navigation
      KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
      KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),

      // Commands
      KeyCode::Char('a') => self.handle_add(),
      KeyCode::Char('e') | KeyCode::Enter => self.start_edit(),
      KeyCode::Char('d') => {
        if let Some(id) = self.selected_item().map(|i| i.id) {
          self.handle_delete(id);
        }
      }
      KeyCode::Char('r') => self.refresh(),

      _ => {}
    }
  }

  fn handle_edit_key(&mut self, key: KeyEvent) {
    // Input is frozen while the save is in flight
    if self.pending.is_some() {
      return;
    }

    let Some(editing) = self.editing.as_mut() else {
      return;
    };

    match key.code {
      KeyCode::Esc => self.editing = None,
      KeyCode::Enter => {
        let (id, title) = (editing.id, editing.title.clone());
        self.handle_update(id, title);
      }
      KeyCode::Backspace => {
        editing.title.pop();
      }
      KeyCode::Char(c) => editing.title.push(c),
      _ => {}
    }
  }

  /// Claim the single action slot. Clears the error left by the last action.
  fn begin(&mut self, action: PendingAction) -> bool {
    if self.pending.is_some() {
      return false;
    }
    self.pending = Some(action);
    self.add_mutation.reset();
    self.update_mutation.reset();
    self.delete_mutation.reset();
    true
  }

  pub fn handle_add(&mut self) {
    if !self.begin(PendingAction::Add) {
      return;
    }
    self.add_mutation.mutate(NEW_ITEM_TITLE.to_string());
  }

  pub fn handle_update(&mut self, id: i64, title: String) {
    if !self.begin(PendingAction::Update(id)) {
      return;
    }
    self.update_mutation.mutate((id, title));
  }

  /// Removes the item from the store before the request is sent.
  pub fn handle_delete(&mut self, id: i64) {
    if !self.begin(PendingAction::Delete(id)) {
      return;
    }
    self.store.dispatch(Action::ItemDeleted(id));
    self.delete_mutation.mutate(id);
  }

  pub fn start_edit(&mut self) {
    if self.pending.is_some() {
      return;
    }
    if let Some(item) = self.selected_item() {
      self.editing = Some(Editing {
        id: item.id,
        title: item.title_or_default().to_string(),
      });
    }
  }

  /// Resync both client copies with the server.
  pub fn refresh(&mut self) {
    items::fetch_items(&self.api, &self.actions_tx);
    self.items_query.refetch();
  }

  fn selected_item(&self) -> Option<&Item> {
    self.store.items().get(self.selected)
  }

  fn move_selection(&mut self, delta: i32) {
    let len = self.store.items().len();
    if len > 0 {
      self.selected = (self.selected as i32 + delta).rem_euclid(len as i32) as usize;
    }
  }

  fn clamp_selection(&mut self) {
    let len = self.store.items().len();
    if self.selected >= len {
      self.selected = len.saturating_sub(1);
    }
  }

  /// No request outstanding and both client copies settled.
  pub fn is_quiescent(&self) -> bool {
    self.pending.is_none()
      && !self.store.state().loading
      && !self.items_query.is_fetching()
      && !self.cache.is_invalidated(ITEMS_KEY)
  }

  // Accessors for UI rendering
  pub fn items_state(&self) -> &ItemsState {
    self.store.state()
  }

  pub fn query(&self) -> &Query<Vec<Item>> {
    &self.items_query
  }

  /// Error from the most recent add, update or delete, if it failed.
  pub fn last_error(&self) -> Option<&str> {
    self
      .add_mutation
      .state()
      .error()
      .or_else(|| self.update_mutation.state().error())
      .or_else(|| self.delete_mutation.state().error())
  }

  pub fn pending(&self) -> Option<PendingAction> {
    self.pending
  }

  pub fn editing(&self) -> Option<&Editing> {
    self.editing.as_ref()
  }

  pub fn selected(&self) -> usize {
    self.selected
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::remote::fake::FakeApi;

  fn policy() -> QueryPolicy {
    QueryPolicy {
      stale_time: Duration::from_secs(300),
      refetch_on_focus: true,
      refetch_interval: None,
    }
  }

  fn mounted(api: &FakeApi) -> App<FakeApi> {
    let mut app = App::new(api.clone(), "http://test", policy());
    app.mount();
    app
  }

  async fn settle(app: &mut App<FakeApi>) {
    for _ in 0..100 {
      tokio::time::sleep(Duration::from_millis(5)).await;
      app.tick();
      if app.is_quiescent() && app.query().is_success() {
        return;
      }
    }
    panic!("app did not settle");
  }

  fn assert_converged(app: &App<FakeApi>, api: &FakeApi) {
    let server = api.items();
    assert_eq!(app.items_state().items, server);
    assert_eq!(app.query().data(), Some(&server));
  }

  #[tokio::test]
  async fn test_mount_fills_both_copies() {
    let api = FakeApi::with_items(vec![Item::new(1, "a"), Item::new(2, "b")]);
    let mut app = mounted(&api);
    app.tick();
    assert!(app.items_state().loading);
    assert!(app.query().is_loading());

    settle(&mut app).await;
    assert_converged(&app, &api);
    assert_eq!(api.list_calls(), 2);
  }

  #[tokio::test]
  async fn test_add_is_not_optimistic() {
    let api = FakeApi::default();
    let mut app = mounted(&api);
    settle(&mut app).await;

    app.handle_add();
    assert_eq!(app.pending(), Some(PendingAction::Add));
    assert!(app.items_state().items.is_empty());

    // The tick that applies the add sees the cache refetch only just starting.
    loop {
      tokio::time::sleep(Duration::from_millis(5)).await;
      app.tick();
      if app.pending().is_none() {
        break;
      }
    }
    assert_eq!(app.items_state().items.len(), 1);
    assert_eq!(app.query().data().map(Vec::len), Some(0));

    settle(&mut app).await;
    assert_converged(&app, &api);
    assert_eq!(api.items()[0].title.as_deref(), Some(NEW_ITEM_TITLE));
  }

  #[tokio::test]
  async fn test_update_applies_after_success() {
    let api = FakeApi::with_items(vec![Item::new(1, "a"), Item::new(2, "b")]);
    let mut app = mounted(&api);
    settle(&mut app).await;

    app.move_selection(1);
    app.start_edit();
    assert_eq!(
      app.editing(),
      Some(&Editing {
        id: 2,
        title: "b".into()
      })
    );

    app.handle_update(2, "B".to_string());
    assert_eq!(app.items_state().items[1], Item::new(2, "b"));

    settle(&mut app).await;
    assert!(app.editing().is_none());
    assert_eq!(app.items_state().items[1], Item::new(2, "B"));
    assert_converged(&app, &api);
  }

  #[tokio::test]
  async fn test_delete_is_optimistic() {
    let api = FakeApi::with_items(vec![Item::new(1, "a"), Item::new(2, "b")]);
    api.set_latency(Duration::from_millis(20));
    let mut app = mounted(&api);
    settle(&mut app).await;

    app.handle_delete(1);
    assert_eq!(app.items_state().items, vec![Item::new(2, "b")]);
    assert_eq!(api.items().len(), 2);

    settle(&mut app).await;
    assert_converged(&app, &api);
  }

  #[tokio::test]
  async fn test_failed_delete_resyncs() {
    let api = FakeApi::with_items(vec![Item::new(1, "a"), Item::new(2, "b")]);
    let mut app = mounted(&api);
    settle(&mut app).await;
    api.fail_deletes(true);

    app.handle_delete(1);
    assert_eq!(app.items_state().items, vec![Item::new(2, "b")]);

    settle(&mut app).await;
    assert_eq!(app.items_state().items, api.items());
    assert_eq!(app.items_state().items.len(), 2);
    assert_converged(&app, &api);
  }

  #[tokio::test]
  async fn test_controls_disabled_while_pending() {
    let api = FakeApi::default();
    api.set_latency(Duration::from_millis(20));
    let mut app = mounted(&api);
    settle(&mut app).await;

    app.handle_add();
    app.handle_add();
    app.handle_delete(1);
    assert_eq!(app.pending(), Some(PendingAction::Add));

    settle(&mut app).await;
    assert_eq!(api.items().len(), 1);
    assert_converged(&app, &api);
  }

  #[tokio::test]
  async fn test_focus_resyncs_query_only() {
    let api = FakeApi::with_items(vec![Item::new(1, "a")]);
    let mut app = mounted(&api);
    settle(&mut app).await;

    // Another client changes the server behind our back.
    api.create("elsewhere".to_string()).await.unwrap();

    app.handle_event(Event::FocusGained);
    settle(&mut app).await;

    assert_eq!(app.query().data(), Some(&api.items()));
    assert_eq!(app.items_state().items, vec![Item::new(1, "a")]);

    app.refresh();
    settle(&mut app).await;
    assert_converged(&app, &api);
  }

  #[tokio::test]
  async fn test_add_during_focus_refetch_converges() {
    let api = FakeApi::default();
    let mut app = mounted(&api);
    settle(&mut app).await;

    // The focus refetch reads the empty list, then the add lands before it answers.
    api.set_list_lag(Duration::from_millis(50));
    app.handle_event(Event::FocusGained);
    app.handle_add();

    settle(&mut app).await;
    assert_eq!(api.items().len(), 1);
    assert_converged(&app, &api);
  }

  #[tokio::test]
  async fn test_failed_delete_reports_error_until_next_action() {
    let api = FakeApi::with_items(vec![Item::new(1, "a")]);
    let mut app = mounted(&api);
    settle(&mut app).await;
    api.fail_deletes(true);

    app.handle_delete(1);
    settle(&mut app).await;
    assert_eq!(app.last_error(), Some("500 Internal Server Error"));

    app.handle_add();
    assert_eq!(app.last_error(), None);
    settle(&mut app).await;
    assert_converged(&app, &api);
  }
}
