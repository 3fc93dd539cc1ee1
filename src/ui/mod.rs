mod header;
mod items;
mod utils;

use crate::app::{App, PendingAction};
use crate::remote::ItemsApi;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Main draw function
pub fn draw<A: ItemsApi>(frame: &mut Frame, app: &App<A>) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Status bar
    ])
    .split(frame.area());

  header::draw_header(frame, chunks[0], app);
  items::draw_item_list(frame, chunks[1], app);
  draw_status_bar(frame, chunks[2], app);
}

fn draw_status_bar<A: ItemsApi>(frame: &mut Frame, area: Rect, app: &App<A>) {
  let (content, style) = if let Some(editing) = app.editing() {
    let suffix = if app.pending().is_some() {
      " (saving...)"
    } else {
      ""
    };
    (
      format!(" title: {}_{}", editing.title, suffix),
      Style::default().fg(Color::Yellow),
    )
  } else if let Some(pending) = app.pending() {
    let label = match pending {
      PendingAction::Add => "adding item...".to_string(),
      PendingAction::Update(id) => format!("saving {}...", id),
      PendingAction::Delete(id) => format!("deleting {}...", id),
    };
    (format!(" {}", label), Style::default().fg(Color::Cyan))
  } else if let Some(error) = app.last_error() {
    (format!(" error: {}", error), Style::default().fg(Color::Red))
  } else {
    let hint = " a:add  e:edit  d:delete  r:refresh  j/k:nav  q:quit";
    let sync = if app.is_quiescent() { "" } else { "  (syncing)" };
    (format!("{}{}", hint, sync), Style::default().fg(Color::DarkGray))
  };

  let paragraph = Paragraph::new(content).style(style);
  frame.render_widget(paragraph, area);
}
