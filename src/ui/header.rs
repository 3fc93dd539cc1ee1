use crate::app::App;
use crate::cache::CacheSource;
use crate::query::QueryState;
use crate::remote::ItemsApi;
use crate::ui::utils::truncate;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the header bar with server address and cache status
pub fn draw_header<A: ItemsApi>(frame: &mut Frame, area: Rect, app: &App<A>) {
  let host = extract_host(app.base_url());

  let query = app.query();
  let key = query.key();

  let (cache_status, status_color) = match query.state() {
    QueryState::Idle => (format!(" {}: - ", key), Color::DarkGray),
    QueryState::Loading => (format!(" {}: loading ", key), Color::DarkGray),
    QueryState::Error(e) => (format!(" {}: {} ", key, truncate(e, 40)), Color::Red),
    QueryState::Success(items) => {
      let note = if query.is_fetching() {
        " (refreshing)"
      } else if query.is_stale() {
        " (stale)"
      } else if query.last_source() == Some(CacheSource::CacheFresh) {
        " (cached)"
      } else {
        ""
      };
      (format!(" {}: {}{} ", key, items.len(), note), Color::DarkGray)
    }
  };

  let header = Line::from(vec![
    Span::styled(" itemlist ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", host), Style::default().fg(Color::White)),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(cache_status, Style::default().fg(status_color)),
  ]);

  let paragraph = Paragraph::new(header).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}

/// Extract host[:port] from the API URL
fn extract_host(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_extract_host() {
    assert_eq!(extract_host("http://localhost:3001"), "localhost:3001");
    assert_eq!(extract_host("https://todo.example.com/api"), "todo.example.com");
  }
}
