use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::ConsoleResult;
use crate::models::{Task, TaskId};

/// Key under which the whole task collection is persisted.
pub const TASKS_KEY: &str = "droneTasks";

pub trait KeyValueStore: Send + Sync {
  fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, ConsoleResult<Option<String>>>;
  fn put<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, ConsoleResult<()>>;
  fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, ConsoleResult<()>>;
}

#[derive(Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
  fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, ConsoleResult<Option<String>>> {
    async move { Ok(self.entries.lock().await.get(key).cloned()) }.boxed()
  }

  fn put<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, ConsoleResult<()>> {
    async move {
      self.entries.lock().await.insert(key.to_string(), value);
      Ok(())
    }
    .boxed()
  }

  fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, ConsoleResult<()>> {
    async move {
      self.entries.lock().await.remove(key);
      Ok(())
    }
    .boxed()
  }
}

pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }
}

impl KeyValueStore for SqliteStore {
  fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, ConsoleResult<Option<String>>> {
    async move {
      let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv WHERE key = ?1")
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
      Ok(value)
    }
    .boxed()
  }

  fn put<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, ConsoleResult<()>> {
    async move {
      sqlx::query(
        "INSERT INTO kv (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
      )
      .bind(key)
      .bind(value)
      .execute(&self.pool)
      .await?;
      Ok(())
    }
    .boxed()
  }

  fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, ConsoleResult<()>> {
    async move {
      sqlx::query("DELETE FROM kv WHERE key = ?1")
        .bind(key)
        .execute(&self.pool)
        .await?;
      Ok(())
    }
    .boxed()
  }
}

/// Task records persisted as one JSON collection.
///
/// Every mutation reads the full set, changes it and writes it back while
/// holding `write_lock`, so two mutations never interleave.
pub struct TaskStore {
  kv: Arc<dyn KeyValueStore>,
  write_lock: Mutex<()>,
}

impl TaskStore {
  pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
    Self { kv, write_lock: Mutex::new(()) }
  }

  pub fn in_memory() -> Self {
    Self::new(Arc::new(MemoryStore::default()))
  }

  pub async fn list(&self) -> ConsoleResult<Vec<Task>> {
    match self.kv.get(TASKS_KEY).await? {
      Some(json) => Ok(serde_json::from_str(&json)?),
      None => Ok(vec![]),
    }
  }

  pub async fn get(&self, id: TaskId) -> ConsoleResult<Option<Task>> {
    Ok(self.list().await?.into_iter().find(|t| t.id == id))
  }

  /// Returns `false` without touching the collection if the id is taken.
  pub async fn add(&self, task: Task) -> ConsoleResult<bool> {
    let _guard = self.write_lock.lock().await;
    let mut tasks = self.list().await?;
    if tasks.iter().any(|t| t.id == task.id) {
      warn!("Task ID {} already exists", task.id);
      return Ok(false);
    }
    tasks.push(task);
    self.kv.put(TASKS_KEY, serde_json::to_string(&tasks)?).await?;
    Ok(true)
  }

  /// Returns whether a task was removed.
  pub async fn remove(&self, id: TaskId) -> ConsoleResult<bool> {
    let _guard = self.write_lock.lock().await;
    let mut tasks = self.list().await?;
    let Some(index) = tasks.iter().position(|t| t.id == id) else {
      return Ok(false);
    };
    tasks.remove(index);
    self.kv.put(TASKS_KEY, serde_json::to_string(&tasks)?).await?;
    info!("Task {} deleted", id);
    Ok(true)
  }

  pub async fn clear(&self) -> ConsoleResult<()> {
    let _guard = self.write_lock.lock().await;
    self.kv.delete(TASKS_KEY).await
  }
}
