use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::info;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use super::{body_text, detached, reject, with_console};
use crate::console::Console;
use crate::error::ConsoleError;
use crate::models::{Task, TaskId};

/// Fields of the manual task form; `location` is `lng,lat`.
#[derive(Deserialize)]
pub struct TaskForm {
  pub id: TaskId,
  pub location: String,
  pub capacity: f64,
}

pub fn task_routes(console: Arc<Console>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
  let list = warp::path!("tasks")
    .and(warp::get())
    .and(with_console(console.clone()))
    .and_then(handle_list_tasks);

  let add = warp::path!("tasks")
    .and(warp::post())
    .and(warp::body::json())
    .and(with_console(console.clone()))
    .and_then(handle_add_task);

  let form = warp::path!("tasks" / "form")
    .and(warp::post())
    .and(warp::body::json())
    .and(with_console(console.clone()))
    .and_then(handle_task_form);

  let import = warp::path!("tasks" / "import")
    .and(warp::post())
    .and(warp::body::bytes())
    .and(with_console(console.clone()))
    .and_then(handle_import_tasks);

  let predefined = warp::path!("tasks" / "predefined")
    .and(warp::post())
    .and(with_console(console.clone()))
    .and_then(handle_load_predefined);

  let remove = warp::path!("tasks" / TaskId)
    .and(warp::delete())
    .and(with_console(console.clone()))
    .and_then(handle_remove_task);

  let clear = warp::path!("tasks")
    .and(warp::delete())
    .and(with_console(console))
    .and_then(handle_clear_tasks);

  list.or(add).or(form).or(import).or(predefined).or(remove).or(clear)
}

pub fn simulation_routes(console: Arc<Console>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
  let state = warp::path!("simulation")
    .and(warp::get())
    .and(with_console(console.clone()))
    .and_then(handle_simulation_state);

  let start = warp::path!("simulation" / "start")
    .and(warp::post())
    .and(with_console(console.clone()))
    .and_then(handle_start_simulation);

  let stop = warp::path!("simulation" / "stop")
    .and(warp::post())
    .and(with_console(console.clone()))
    .and_then(handle_stop_simulation);

  let refresh = warp::path!("simulation" / "refresh")
    .and(warp::post())
    .and(with_console(console))
    .and_then(handle_refresh);

  state.or(start).or(stop).or(refresh)
}

async fn handle_list_tasks(console: Arc<Console>) -> Result<impl Reply, Rejection> {
  let tasks = console.tasks().await.map_err(reject)?;
  Ok(warp::reply::json(&tasks))
}

async fn handle_add_task(task: Task, console: Arc<Console>) -> Result<impl Reply, Rejection> {
  let id = task.id;
  detached(async move { console.add_task(task).await }).await?;
  Ok(warp::reply::with_status(warp::reply::json(&json!({"taskId": id, "status": "pending"})), StatusCode::CREATED))
}

async fn handle_task_form(form: TaskForm, console: Arc<Console>) -> Result<impl Reply, Rejection> {
  let task = detached(async move { console.create_normal_task(form.id, &form.location, form.capacity).await }).await?;
  Ok(warp::reply::with_status(warp::reply::json(&task), StatusCode::CREATED))
}

async fn handle_import_tasks(body: warp::hyper::body::Bytes, console: Arc<Console>) -> Result<impl Reply, Rejection> {
  let text = body_text(body)?;
  let report = detached(async move { console.import_tasks(&text).await }).await?;
  Ok(warp::reply::json(&report))
}

async fn handle_load_predefined(console: Arc<Console>) -> Result<impl Reply, Rejection> {
  let added = detached(async move { console.load_predefined().await }).await?;
  info!("Loaded {} built-in tasks", added);
  Ok(warp::reply::json(&json!({"loaded": added})))
}

async fn handle_remove_task(id: TaskId, console: Arc<Console>) -> Result<impl Reply, Rejection> {
  let removed = detached(async move { console.remove_task(id).await }).await?;
  Ok(warp::reply::json(&json!({"taskId": id, "removed": removed})))
}

async fn handle_clear_tasks(console: Arc<Console>) -> Result<impl Reply, Rejection> {
  detached(async move { console.clear_tasks().await }).await?;
  Ok(warp::reply::json(&json!({"cleared": true})))
}

async fn handle_simulation_state(console: Arc<Console>) -> Result<impl Reply, Rejection> {
  Ok(warp::reply::json(&json!({"running": console.simulation_running().await})))
}

async fn handle_start_simulation(console: Arc<Console>) -> Result<impl Reply, Rejection> {
  let running = detached(async move {
    console.start_simulation().await?;
    Ok::<_, ConsoleError>(console.simulation_running().await)
  })
  .await?;
  Ok(warp::reply::json(&json!({"started": true, "running": running})))
}

async fn handle_stop_simulation(console: Arc<Console>) -> Result<impl Reply, Rejection> {
  detached(async move { console.stop_simulation().await }).await?;
  Ok(warp::reply::json(&json!({"stopped": true})))
}

async fn handle_refresh(console: Arc<Console>) -> Result<impl Reply, Rejection> {
  let running = detached(async move {
    console.refresh().await?;
    Ok::<_, ConsoleError>(console.simulation_running().await)
  })
  .await?;
  Ok(warp::reply::json(&json!({"running": running})))
}
