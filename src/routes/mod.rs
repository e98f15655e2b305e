use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use serde_json::json;
use tracing::error;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::console::Console;
use crate::error::{ConsoleError, ConsoleResult};

pub mod areas;
pub mod emergency;
pub mod fleet;
pub mod sse;
pub mod tasks;

pub fn routes(console: Arc<Console>) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
  tasks::task_routes(console.clone())
    .or(tasks::simulation_routes(console.clone()))
    .or(emergency::emergency_routes(console.clone()))
    .or(areas::area_routes(console.clone()))
    .or(fleet::fleet_routes(console.clone()))
    .or(sse::sse_route(console))
    .recover(handle_rejection)
}

#[derive(Debug)]
struct ApiError(ConsoleError);
impl warp::reject::Reject for ApiError {}

#[derive(Debug)]
struct ActionAborted;
impl warp::reject::Reject for ActionAborted {}

pub(crate) fn reject(e: ConsoleError) -> Rejection {
  warp::reject::custom(ApiError(e))
}

pub(crate) fn with_console(console: Arc<Console>) -> impl Filter<Extract = (Arc<Console>,), Error = Infallible> + Clone {
  warp::any().map(move || console.clone())
}

/// Runs an operator action to completion even if the client goes away, so a
/// half-finished round trip never leaves shared state behind.
pub(crate) async fn detached<T, F>(action: F) -> Result<T, Rejection>
where
  F: Future<Output = ConsoleResult<T>> + Send + 'static,
  T: Send + 'static,
{
  match tokio::spawn(action).await {
    Ok(result) => result.map_err(reject),
    Err(e) => {
      error!("Operator action aborted: {:?}", e);
      Err(warp::reject::custom(ActionAborted))
    }
  }
}

pub(crate) fn body_text(bytes: warp::hyper::body::Bytes) -> Result<String, Rejection> {
  String::from_utf8(bytes.to_vec()).map_err(|_| reject(ConsoleError::Validation("body must be UTF-8 text".into())))
}

fn status_for(e: &ConsoleError) -> StatusCode {
  match e {
    ConsoleError::Validation(_) => StatusCode::BAD_REQUEST,
    ConsoleError::DuplicateTask(_)
    | ConsoleError::NoPendingBypass
    | ConsoleError::BypassAlreadyPending(_)
    | ConsoleError::TaskDeleted(_)
    | ConsoleError::NoTasks => StatusCode::CONFLICT,
    ConsoleError::UnknownArea(_) => StatusCode::NOT_FOUND,
    ConsoleError::Transport(_) | ConsoleError::Rejected(_) => StatusCode::BAD_GATEWAY,
    ConsoleError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
  let (status, kind, message) = if let Some(ApiError(e)) = err.find() {
    (status_for(e), e.kind(), e.to_string())
  } else if err.is_not_found() {
    (StatusCode::NOT_FOUND, "not_found", "Not Found".to_string())
  } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
    (StatusCode::BAD_REQUEST, "validation", e.to_string())
  } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
    (StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed", "Method Not Allowed".to_string())
  } else {
    error!("Unhandled rejection: {:?}", err);
    (StatusCode::INTERNAL_SERVER_ERROR, "internal", "Internal Server Error".to_string())
  };
  Ok(warp::reply::with_status(warp::reply::json(&json!({"error": kind, "message": message})), status))
}
