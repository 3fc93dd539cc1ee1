use color_eyre::{eyre::eyre, Result};
use reqwest::Client;
use url::Url;

use super::ItemsApi;
use crate::model::{Item, ItemInput};

/// HTTP client for the item API
#[derive(Clone)]
pub struct ItemsClient {
  http: Client,
  base: Url,
}

impl ItemsClient {
  pub fn new(base_url: &str) -> Result<Self> {
    let mut base =
      Url::parse(base_url).map_err(|e| eyre!("Invalid API url {}: {}", base_url, e))?;

    // Url::join drops the last path segment unless the base ends with '/'
    if !base.path().ends_with('/') {
      let path = format!("{}/", base.path());
      base.set_path(&path);
    }

    Ok(Self {
      http: Client::new(),
      base,
    })
  }

  fn url(&self, path: &str) -> Result<Url> {
    self
      .base
      .join(path)
      .map_err(|e| eyre!("Invalid request path {}: {}", path, e))
  }
}

impl ItemsApi for ItemsClient {
  async fn list(&self) -> Result<Vec<Item>> {
    let response = self
      .http
      .get(self.url("items")?)
      .send()
      .await
      .and_then(|r| r.error_for_status())
      .map_err(|e| eyre!("Failed to list items: {}", e))?;

    response
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse items: {}", e))
  }

  async fn create(&self, title: String) -> Result<Item> {
    let response = self
      .http
      .post(self.url("items")?)
      .json(&ItemInput::titled(title))
      .send()
      .await
      .and_then(|r| r.error_for_status())
      .map_err(|e| eyre!("Failed to create item: {}", e))?;

    response
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse created item: {}", e))
  }

  async fn update(&self, id: i64, title: String) -> Result<Item> {
    let response = self
      .http
      .put(self.url(&format!("items/{}", id))?)
      .json(&ItemInput::titled(title))
      .send()
      .await
      .and_then(|r| r.error_for_status())
      .map_err(|e| eyre!("Failed to update item {}: {}", id, e))?;

    response
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse item {}: {}", id, e))
  }

  async fn delete(&self, id: i64) -> Result<()> {
    self
      .http
      .delete(self.url(&format!("items/{}", id))?)
      .send()
      .await
      .and_then(|r| r.error_for_status())
      .map_err(|e| eyre!("Failed to delete item {}: {}", id, e))?;

    Ok(())
  }
}
