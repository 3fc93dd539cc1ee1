use crate::app::{App, PendingAction};
use crate::remote::ItemsApi;
use crate::ui::utils::truncate;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

pub fn draw_item_list<A: ItemsApi>(frame: &mut Frame, area: Rect, app: &App<A>) {
  let state = app.items_state();

  let block = Block::default()
    .title(format!(" Items ({}) ", state.items.len()))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  let message = if state.loading {
    Some(("Loading...".to_string(), Color::DarkGray))
  } else if let Some(error) = &state.error {
    Some((format!("Error: {}", error), Color::Red))
  } else if state.items.is_empty() {
    Some(("No items yet. Press 'a' to add one.".to_string(), Color::DarkGray))
  } else {
    None
  };

  if let Some((content, color)) = message {
    let paragraph = Paragraph::new(content)
      .block(block)
      .style(Style::default().fg(color));
    frame.render_widget(paragraph, area);
    return;
  }

  let width = area.width.saturating_sub(6) as usize;
  let list_items: Vec<ListItem> = state
    .items
    .iter()
    .map(|item| {
      let editing = app.editing().filter(|e| e.id == item.id);
      let title = match editing {
        Some(e) => format!("{}_", e.title),
        None => item.title_or_default().to_string(),
      };

      let busy = matches!(
        app.pending(),
        Some(PendingAction::Update(id) | PendingAction::Delete(id)) if id == item.id
      );

      let title_style = if editing.is_some() {
        Style::default().fg(Color::Yellow)
      } else if busy {
        Style::default().fg(Color::DarkGray)
      } else {
        Style::default()
      };

      ListItem::new(Line::from(Span::styled(truncate(&title, width), title_style)))
    })
    .collect();

  let list = List::new(list_items)
    .block(block)
    .highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

  let mut list_state = ListState::default();
  list_state.select(Some(app.selected()));

  frame.render_stateful_widget(list, area, &mut list_state);
}
