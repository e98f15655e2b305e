use std::sync::Arc;

use serde::Deserialize;
use warp::{Filter, Rejection, Reply};

use super::{body_text, detached, reject, with_console};
use crate::console::Console;
use crate::models::{Task, TaskId};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyForm {
  pub id: TaskId,
  pub emergency_level: i64,
  pub location: String,
  pub capacity: f64,
}

pub fn emergency_routes(console: Arc<Console>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
  let submit = warp::path!("emergency")
    .and(warp::post())
    .and(warp::body::json())
    .and(with_console(console.clone()))
    .and_then(handle_submit);

  let form = warp::path!("emergency" / "form")
    .and(warp::post())
    .and(warp::body::json())
    .and(with_console(console.clone()))
    .and_then(handle_form);

  let default = warp::path!("emergency" / "default")
    .and(warp::post())
    .and(with_console(console.clone()))
    .and_then(handle_default);

  let import = warp::path!("emergency" / "import")
    .and(warp::post())
    .and(warp::body::bytes())
    .and(with_console(console.clone()))
    .and_then(handle_import);

  let pending = warp::path!("emergency" / "pending")
    .and(warp::get())
    .and(with_console(console.clone()))
    .and_then(handle_pending);

  let confirm = warp::path!("emergency" / "confirm")
    .and(warp::post())
    .and(with_console(console.clone()))
    .and_then(handle_confirm);

  let dismiss = warp::path!("emergency" / "dismiss")
    .and(warp::post())
    .and(with_console(console))
    .and_then(handle_dismiss);

  submit.or(form).or(default).or(import).or(pending).or(confirm).or(dismiss)
}

async fn handle_submit(task: Task, console: Arc<Console>) -> Result<impl Reply, Rejection> {
  let outcome = detached(async move { console.submit_emergency(task).await }).await?;
  Ok(warp::reply::json(&outcome))
}

async fn handle_form(form: EmergencyForm, console: Arc<Console>) -> Result<impl Reply, Rejection> {
  let outcome = detached(async move {
    console
      .create_emergency_task(form.id, form.emergency_level, &form.location, form.capacity)
      .await
  })
  .await?;
  Ok(warp::reply::json(&outcome))
}

async fn handle_default(console: Arc<Console>) -> Result<impl Reply, Rejection> {
  let outcome = detached(async move { console.send_default_emergency().await }).await?;
  Ok(warp::reply::json(&outcome))
}

async fn handle_import(body: warp::hyper::body::Bytes, console: Arc<Console>) -> Result<impl Reply, Rejection> {
  let text = body_text(body)?;
  let results = detached(async move { console.import_emergency(&text).await }).await?;
  Ok(warp::reply::json(&results))
}

async fn handle_pending(console: Arc<Console>) -> Result<impl Reply, Rejection> {
  Ok(warp::reply::json(&console.pending_bypass().await))
}

async fn handle_confirm(console: Arc<Console>) -> Result<impl Reply, Rejection> {
  let outcome = detached(async move { console.confirm_bypass().await }).await?;
  Ok(warp::reply::json(&outcome))
}

async fn handle_dismiss(console: Arc<Console>) -> Result<impl Reply, Rejection> {
  let prompt = console.dismiss_bypass().await.map_err(reject)?;
  Ok(warp::reply::json(&prompt))
}
