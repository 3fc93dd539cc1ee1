//! Shared data types for the persisted document, the HTTP API and the client.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single to-do entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
  /// Epoch milliseconds at creation time
  pub id: i64,
  /// Absent when the create/update request carried no title
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  /// Fields written by other tools; kept through updates
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl Item {
  #[cfg(test)]
  pub fn new(id: i64, title: impl Into<String>) -> Self {
    Self {
      id,
      title: Some(title.into()),
      extra: Map::new(),
    }
  }

  /// Title for display, empty when absent
  pub fn title_or_default(&self) -> &str {
    self.title.as_deref().unwrap_or("")
  }
}

/// The whole persisted file: `{ "items": [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
  #[serde(default)]
  pub items: Vec<Item>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl Document {
  #[cfg(test)]
  pub fn with_items(items: Vec<Item>) -> Self {
    Self {
      items,
      extra: Map::new(),
    }
  }
}

/// Request body for create and update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemInput {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
}

impl ItemInput {
  pub fn titled(title: impl Into<String>) -> Self {
    Self {
      title: Some(title.into()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_missing_title_is_omitted() {
    let item = Item {
      id: 7,
      title: None,
      extra: Map::new(),
    };
    assert_eq!(serde_json::to_string(&item).unwrap(), r#"{"id":7}"#);
  }

  #[test]
  fn test_unknown_fields_survive() {
    let raw = r#"{"id":1,"title":"a","done":true}"#;
    let item: Item = serde_json::from_str(raw).unwrap();
    assert_eq!(item.extra.get("done"), Some(&Value::Bool(true)));

    let back = serde_json::to_value(&item).unwrap();
    assert_eq!(back["done"], Value::Bool(true));
  }

  #[test]
  fn test_document_without_items_is_empty() {
    let doc: Document = serde_json::from_str("{}").unwrap();
    assert!(doc.items.is_empty());
  }
}
