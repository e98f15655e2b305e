use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
  /// Backend unreachable, non-2xx, or a body we could not decode.
  #[error("transport error: {0}")]
  Transport(String),

  #[error("validation error: {0}")]
  Validation(String),

  /// Backend answered `success: false`.
  #[error("{0}")]
  Rejected(String),

  #[error("Task ID {0} already exists, please use a different ID")]
  DuplicateTask(i64),

  #[error("No pending emergency task")]
  NoPendingBypass,

  #[error("Emergency task {0} is already awaiting bypass confirmation")]
  BypassAlreadyPending(i64),

  #[error("Task {0} was deleted before its emergency dispatch completed")]
  TaskDeleted(i64),

  #[error("Please add tasks before starting simulation")]
  NoTasks,

  #[error("Unknown restricted area {0}")]
  UnknownArea(i64),

  #[error("store error: {0}")]
  Store(String),
}

impl ConsoleError {
  pub fn kind(&self) -> &'static str {
    match self {
      ConsoleError::Transport(_) => "transport",
      ConsoleError::Validation(_) => "validation",
      ConsoleError::Rejected(_) => "rejected",
      ConsoleError::DuplicateTask(_) => "duplicate_task",
      ConsoleError::NoPendingBypass => "no_pending_bypass",
      ConsoleError::BypassAlreadyPending(_) => "bypass_already_pending",
      ConsoleError::TaskDeleted(_) => "task_deleted",
      ConsoleError::NoTasks => "no_tasks",
      ConsoleError::UnknownArea(_) => "unknown_area",
      ConsoleError::Store(_) => "store",
    }
  }
}

impl From<reqwest::Error> for ConsoleError {
  fn from(e: reqwest::Error) -> Self {
    ConsoleError::Transport(e.to_string())
  }
}

impl From<sqlx::Error> for ConsoleError {
  fn from(e: sqlx::Error) -> Self {
    ConsoleError::Store(e.to_string())
  }
}

impl From<serde_json::Error> for ConsoleError {
  fn from(e: serde_json::Error) -> Self {
    ConsoleError::Store(e.to_string())
  }
}

pub type ConsoleResult<T> = Result<T, ConsoleError>;
