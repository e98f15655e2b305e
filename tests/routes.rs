mod common;

use common::{console_with, rejected, FakeBackend};
use fleet_console::routes::routes;
use serde_json::{json, Value};
use warp::http::StatusCode;

fn body(resp: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
  serde_json::from_slice(resp.body()).unwrap()
}

#[tokio::test]
async fn task_crud_over_http() {
  let api = routes(console_with(FakeBackend::new()));

  let task = json!({
    "id": 1001, "date": "2025-11-13", "time": "09:30",
    "delivery": {"lat": 55.946, "lng": -3.188},
    "requirements": {"capacity": 3.5, "maxCost": 25.0, "cooling": true, "heating": false}
  });
  let resp = warp::test::request().method("POST").path("/tasks").json(&task).reply(&api).await;
  assert_eq!(resp.status(), StatusCode::CREATED);

  let resp = warp::test::request().method("POST").path("/tasks").json(&task).reply(&api).await;
  assert_eq!(resp.status(), StatusCode::CONFLICT);
  assert_eq!(body(&resp)["error"], "duplicate_task");

  let resp = warp::test::request().method("GET").path("/tasks").reply(&api).await;
  assert_eq!(body(&resp).as_array().map(Vec::len), Some(1));

  let resp = warp::test::request().method("DELETE").path("/tasks/1001").reply(&api).await;
  assert_eq!(body(&resp)["removed"], true);
}

#[tokio::test]
async fn errors_map_to_status_codes() {
  let backend = FakeBackend::new();
  backend.script_emergency(Ok(rejected("No drone available")));
  let api = routes(console_with(backend));

  let resp = warp::test::request().method("POST").path("/simulation/start").reply(&api).await;
  assert_eq!(resp.status(), StatusCode::CONFLICT);
  assert_eq!(body(&resp)["error"], "no_tasks");

  let resp = warp::test::request().method("POST").path("/emergency/confirm").reply(&api).await;
  assert_eq!(resp.status(), StatusCode::CONFLICT);
  assert_eq!(body(&resp)["error"], "no_pending_bypass");

  let resp = warp::test::request()
    .method("POST")
    .path("/areas/coordinates")
    .json(&json!({"coordinates": "1,2\n3,4"}))
    .reply(&api)
    .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert_eq!(body(&resp)["error"], "validation");

  let resp = warp::test::request().method("POST").path("/emergency/default").reply(&api).await;
  assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
  assert_eq!(body(&resp)["message"], "No drone available");

  let resp = warp::test::request().method("DELETE").path("/areas/42").reply(&api).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);

  let resp = warp::test::request().method("GET").path("/nowhere").reply(&api).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn blocked_emergency_shows_up_in_the_snapshot() {
  let backend = FakeBackend::new();
  backend.script_emergency(Ok(rejected("restricted area Zone-A")));
  let api = routes(console_with(backend));

  let resp = warp::test::request()
    .method("POST")
    .path("/emergency/form")
    .json(&json!({"id": 2001, "emergencyLevel": 2, "location": "-3.187,55.944", "capacity": 5.0}))
    .reply(&api)
    .await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(body(&resp)["outcome"], "awaitingConfirmation");

  let resp = warp::test::request().method("GET").path("/snapshot").reply(&api).await;
  let snapshot = body(&resp);
  assert_eq!(snapshot["pendingBypass"]["areaName"], "Zone-A");
  assert_eq!(snapshot["tasks"][0]["status"], "pending");

  let resp = warp::test::request().method("POST").path("/emergency/dismiss").reply(&api).await;
  assert_eq!(body(&resp)["taskId"], 2001);
  let resp = warp::test::request().method("GET").path("/snapshot").reply(&api).await;
  assert!(body(&resp)["pendingBypass"].is_null());
}

#[tokio::test]
async fn task_markers_toggle_over_http() {
  let api = routes(console_with(FakeBackend::new()));

  let resp = warp::test::request().method("GET").path("/snapshot").reply(&api).await;
  assert_eq!(body(&resp)["taskMarkersVisible"], true);

  let resp = warp::test::request().method("POST").path("/markers/toggle").reply(&api).await;
  assert_eq!(body(&resp)["visible"], false);
  let resp = warp::test::request().method("GET").path("/snapshot").reply(&api).await;
  assert_eq!(body(&resp)["taskMarkersVisible"], false);

  let resp = warp::test::request().method("POST").path("/markers/toggle").reply(&api).await;
  assert_eq!(body(&resp)["visible"], true);
}
