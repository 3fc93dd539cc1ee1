mod app;
mod cache;
mod config;
mod db;
mod event;
mod items;
mod logging;
mod model;
mod mutation;
mod query;
mod remote;
mod server;
mod store;
mod ui;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;

use crate::cache::QueryPolicy;
use crate::remote::ItemsClient;

#[derive(Parser, Debug)]
#[command(name = "itemlist")]
#[command(about = "A file-backed to-do list server with a caching terminal client")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./itemlist.yaml or $XDG_CONFIG_HOME/itemlist/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Run the item API server
  Serve {
    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// JSON document to store items in
    #[arg(long)]
    db: Option<PathBuf>,
  },
  /// Open the terminal client
  Tui {
    /// Base URL of the item API
    #[arg(short, long)]
    url: Option<String>,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;

  match args.command {
    Command::Serve { port, db } => {
      logging::init_stderr();

      config.server.apply_port_env(std::env::var("PORT").ok())?;
      if let Some(port) = port {
        config.server.port = port;
      }
      if let Some(db) = db {
        config.server.db_path = db;
      }

      server::serve(&config.server).await?;
    }
    Command::Tui { url } => {
      let _log_guard = logging::init_file()?;

      if let Some(url) = url {
        config.client.base_url = url;
      }

      let api = ItemsClient::new(&config.client.base_url)?;
      let policy = QueryPolicy::from(&config.client);

      // Initialize and run the app
      let mut app = app::App::new(api, config.client.base_url.clone(), policy);
      app.run().await?;
    }
  }

  Ok(())
}
