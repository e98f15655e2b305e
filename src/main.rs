use std::sync::Arc;

use fleet_console::backend::HttpBackend;
use fleet_console::config::Config;
use fleet_console::console::Console;
use fleet_console::database::setup_database;
use fleet_console::routes::routes;
use fleet_console::store::{SqliteStore, TaskStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let config = Config::from_env();
  let db_pool = setup_database(&config.database_url).await?;
  let store = TaskStore::new(Arc::new(SqliteStore::new(db_pool)));
  let backend = Arc::new(HttpBackend::new(&config.backend_url)?);

  let console = Arc::new(Console::new(backend, store, &config));
  console.init().await;
  info!("Console listening on port {}, backend {}", config.server_port, config.backend_url);

  warp::serve(routes(console))
    .run(([0, 0, 0, 0], config.server_port))
    .await;
  Ok(())
}
