use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub server: ServerConfig,
  #[serde(default)]
  pub client: ClientConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host: String,
  /// Overridden by the PORT environment variable
  pub port: u16,
  /// JSON document holding all items
  pub db_path: PathBuf,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host: "127.0.0.1".to_string(),
      port: 3001,
      db_path: PathBuf::from("db.json"),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
  pub base_url: String,
  /// How long a fetched list is served without a network call
  pub stale_time_secs: u64,
  /// Background polling period; 0 disables polling
  pub refetch_interval_secs: u64,
  pub refetch_on_focus: bool,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:3001".to_string(),
      stale_time_secs: 5 * 60,
      refetch_interval_secs: 10,
      refetch_on_focus: true,
    }
  }
}

impl ServerConfig {
  /// Apply a `PORT` environment value. Only the server reads it.
  pub fn apply_port_env(&mut self, value: Option<String>) -> Result<()> {
    if let Some(port) = value {
      self.port = port
        .trim()
        .parse()
        .map_err(|e| eyre!("Invalid PORT value {:?}: {}", port, e))?;
    }
    Ok(())
  }
}

impl ClientConfig {
  pub fn stale_time(&self) -> Duration {
    Duration::from_secs(self.stale_time_secs)
  }

  pub fn refetch_interval(&self) -> Option<Duration> {
    (self.refetch_interval_secs > 0).then(|| Duration::from_secs(self.refetch_interval_secs))
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./itemlist.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/itemlist/config.yaml
  ///
  /// With no file found the defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Config::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("itemlist.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("itemlist").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty file deserializes to unit, not a mapping
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    serde_yaml::from_str(contents)
  }
}
