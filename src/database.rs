use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::info;

static MIGRATOR: Migrator = sqlx::migrate!();

/// Opens the console's local store and applies migrations.
///
/// A single connection keeps `sqlite::memory:` usable and matches the
/// one-writer access pattern of the task store.
pub async fn setup_database(database_url: &str) -> anyhow::Result<SqlitePool> {
  let pool = SqlitePoolOptions::new()
    .max_connections(1)
    .idle_timeout(None)
    .max_lifetime(None)
    .connect(database_url)
    .await?;

  MIGRATOR.run(&pool).await?;
  info!("Database migrations complete");
  Ok(pool)
}
