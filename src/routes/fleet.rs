use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use warp::{Filter, Rejection, Reply};

use super::{reject, with_console};
use crate::console::Console;

#[derive(Deserialize)]
pub struct PathVisibility {
  pub visible: bool,
}

pub fn fleet_routes(console: Arc<Console>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
  let snapshot = warp::path!("snapshot")
    .and(warp::get())
    .and(with_console(console.clone()))
    .and_then(handle_snapshot);

  let path = warp::path!("paths" / String)
    .and(warp::get())
    .and(with_console(console.clone()))
    .and_then(handle_path);

  let clear = warp::path!("paths")
    .and(warp::delete())
    .and(with_console(console.clone()))
    .and_then(handle_clear_paths);

  let toggle = warp::path!("paths" / "toggle")
    .and(warp::post())
    .and(with_console(console.clone()))
    .and_then(handle_toggle_paths);

  let visibility = warp::path!("paths" / "visibility")
    .and(warp::put())
    .and(warp::body::json())
    .and(with_console(console.clone()))
    .and_then(handle_path_visibility);

  let markers = warp::path!("markers" / "toggle")
    .and(warp::post())
    .and(with_console(console))
    .and_then(handle_toggle_markers);

  snapshot.or(path).or(clear).or(toggle).or(visibility).or(markers)
}

async fn handle_snapshot(console: Arc<Console>) -> Result<impl Reply, Rejection> {
  let snapshot = console.snapshot().await.map_err(reject)?;
  Ok(warp::reply::json(&snapshot))
}

async fn handle_path(drone_id: String, console: Arc<Console>) -> Result<impl Reply, Rejection> {
  let points = console.path(&drone_id).await;
  Ok(warp::reply::json(&json!({"droneId": drone_id, "points": points})))
}

async fn handle_clear_paths(console: Arc<Console>) -> Result<impl Reply, Rejection> {
  console.clear_paths().await;
  Ok(warp::reply::json(&json!({"cleared": true})))
}

async fn handle_toggle_paths(console: Arc<Console>) -> Result<impl Reply, Rejection> {
  Ok(warp::reply::json(&json!({"visible": console.toggle_paths().await})))
}

async fn handle_path_visibility(body: PathVisibility, console: Arc<Console>) -> Result<impl Reply, Rejection> {
  console.set_paths_visible(body.visible).await;
  Ok(warp::reply::json(&json!({"visible": body.visible})))
}

async fn handle_toggle_markers(console: Arc<Console>) -> Result<impl Reply, Rejection> {
  Ok(warp::reply::json(&json!({"visible": console.toggle_task_markers().await})))
}
