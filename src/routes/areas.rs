use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use super::{body_text, detached, with_console};
use crate::areas::AreaInput;
use crate::console::Console;
use crate::models::LatLng;

#[derive(Deserialize)]
pub struct DrawnArea {
  pub name: Option<String>,
  pub vertices: Vec<LatLng>,
}

#[derive(Deserialize)]
pub struct CoordinateArea {
  pub name: Option<String>,
  pub coordinates: String,
}

pub fn area_routes(console: Arc<Console>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
  let list = warp::path!("areas")
    .and(warp::get())
    .and(with_console(console.clone()))
    .and_then(handle_list);

  let reload = warp::path!("areas" / "reload")
    .and(warp::post())
    .and(with_console(console.clone()))
    .and_then(handle_reload);

  let toggle = warp::path!("areas" / "toggle")
    .and(warp::post())
    .and(with_console(console.clone()))
    .and_then(handle_toggle);

  let drawn = warp::path!("areas" / "draw")
    .and(warp::post())
    .and(warp::body::json())
    .and(with_console(console.clone()))
    .and_then(|area: DrawnArea, console| {
      handle_create(AreaInput::Drawn { name: area.name, vertices: area.vertices }, console)
    });

  let coordinates = warp::path!("areas" / "coordinates")
    .and(warp::post())
    .and(warp::body::json())
    .and(with_console(console.clone()))
    .and_then(|area: CoordinateArea, console| {
      handle_create(AreaInput::Coordinates { name: area.name, text: area.coordinates }, console)
    });

  let document = warp::path!("areas" / "document")
    .and(warp::post())
    .and(warp::body::bytes())
    .and(with_console(console.clone()))
    .and_then(handle_create_document);

  let delete = warp::path!("areas" / i64)
    .and(warp::delete())
    .and(with_console(console.clone()))
    .and_then(handle_delete);

  let clear = warp::path!("areas")
    .and(warp::delete())
    .and(with_console(console))
    .and_then(handle_clear);

  list.or(reload).or(toggle).or(drawn).or(coordinates).or(document).or(delete).or(clear)
}

async fn handle_list(console: Arc<Console>) -> Result<impl Reply, Rejection> {
  Ok(warp::reply::json(&console.restricted_areas().await))
}

async fn handle_reload(console: Arc<Console>) -> Result<impl Reply, Rejection> {
  let applied = detached(async move { console.reload_areas().await }).await?;
  Ok(warp::reply::json(&json!({"applied": applied})))
}

async fn handle_toggle(console: Arc<Console>) -> Result<impl Reply, Rejection> {
  Ok(warp::reply::json(&json!({"visible": console.toggle_areas().await})))
}

async fn handle_create(input: AreaInput, console: Arc<Console>) -> Result<impl Reply, Rejection> {
  let saved = detached(async move { console.create_area(input).await }).await?;
  Ok(warp::reply::with_status(warp::reply::json(&saved), StatusCode::CREATED))
}

async fn handle_create_document(body: warp::hyper::body::Bytes, console: Arc<Console>) -> Result<impl Reply, Rejection> {
  let json = body_text(body)?;
  handle_create(AreaInput::Document { json }, console).await
}

async fn handle_delete(id: i64, console: Arc<Console>) -> Result<impl Reply, Rejection> {
  let area = detached(async move { console.delete_area(id).await }).await?;
  Ok(warp::reply::json(&json!({"deleted": area.name, "id": area.id})))
}

async fn handle_clear(console: Arc<Console>) -> Result<impl Reply, Rejection> {
  detached(async move { console.clear_areas().await }).await?;
  Ok(warp::reply::json(&json!({"cleared": true})))
}
