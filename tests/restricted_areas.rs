mod common;

use std::sync::atomic::Ordering;

use common::{console_with, square, FakeBackend};
use fleet_console::areas::{AreaInput, RestrictedAreaRegistry};
use fleet_console::error::ConsoleError;

#[tokio::test]
async fn reload_mirrors_the_backend() {
  let backend = FakeBackend::new();
  backend.seed_area("Zone-A");
  backend.seed_area("Zone-B");
  let registry = RestrictedAreaRegistry::new(backend.clone());

  assert!(registry.reload_from_backend().await.unwrap());
  let names: Vec<_> = registry.list().await.into_iter().map(|a| a.name).collect();
  assert_eq!(names, vec!["Zone-A", "Zone-B"]);
}

#[tokio::test]
async fn stale_reload_cannot_resurrect_a_deleted_area() {
  let backend = FakeBackend::new();
  let doomed = backend.seed_area("Zone-A");
  backend.seed_area("Zone-B");
  let registry = std::sync::Arc::new(RestrictedAreaRegistry::new(backend.clone()));
  registry.reload_from_backend().await.unwrap();

  let release = backend.area_gate.arm();
  let slow_reload = tokio::spawn({
    let registry = registry.clone();
    async move { registry.reload_from_backend().await }
  });
  backend.area_gate.entered.notified().await;

  let deleted = registry.delete(doomed.id).await.unwrap();
  assert_eq!(deleted.name, "Zone-A");
  assert_eq!(backend.deleted_areas.lock().unwrap().clone(), vec!["Zone-A".to_string()]);

  let _ = release.send(());
  assert!(!slow_reload.await.unwrap().unwrap());

  let names: Vec<_> = registry.list().await.into_iter().map(|a| a.name).collect();
  assert_eq!(names, vec!["Zone-B"]);
}

#[tokio::test]
async fn delete_of_unknown_id_fails_without_a_backend_call() {
  let backend = FakeBackend::new();
  let registry = RestrictedAreaRegistry::new(backend.clone());

  assert!(matches!(registry.delete(99).await, Err(ConsoleError::UnknownArea(99))));
  assert!(backend.deleted_areas.lock().unwrap().is_empty());
}

#[tokio::test]
async fn created_areas_appear_after_the_follow_up_reload() {
  let backend = FakeBackend::new();
  let console = console_with(backend.clone());

  let saved = console
    .create_area(AreaInput::Coordinates { name: Some("Meadows".into()), text: "-3.19,55.94\n-3.18,55.94\n-3.18,55.95".into() })
    .await
    .unwrap();
  assert_eq!(saved.vertices.len(), 3);
  assert_eq!(console.restricted_areas().await, vec![saved.clone()]);

  let drawn = console.create_area(AreaInput::Drawn { name: None, vertices: square() }).await.unwrap();
  assert!(drawn.name.starts_with("Restricted_Area_"));
  assert_eq!(console.restricted_areas().await.len(), 2);

  console.clear_areas().await.unwrap();
  assert!(console.restricted_areas().await.is_empty());
}

#[tokio::test]
async fn invalid_geometry_never_reaches_the_backend() {
  let backend = FakeBackend::new();
  let console = console_with(backend.clone());

  let err = console.create_area(AreaInput::Document { json: r#"{"name": "X"}"#.into() }).await.unwrap_err();
  assert!(matches!(err, ConsoleError::Validation(_)));
  assert!(backend.areas.lock().unwrap().is_empty());
}

#[tokio::test]
async fn visibility_toggles() {
  let console = console_with(FakeBackend::new());
  assert!(console.snapshot().await.unwrap().restricted_areas_visible);
  assert!(!console.toggle_areas().await);
  assert!(console.toggle_areas().await);
}

#[tokio::test]
async fn areas_load_at_startup_even_when_the_simulation_state_is_unknown() {
  let backend = FakeBackend::new();
  backend.seed_area("Zone-A");
  backend.running.store(true, Ordering::SeqCst);
  backend.state_unreachable.store(true, Ordering::SeqCst);
  let console = console_with(backend.clone());

  console.init().await;

  assert!(!console.simulation_running().await);
  let names: Vec<_> = console.restricted_areas().await.into_iter().map(|a| a.name).collect();
  assert_eq!(names, vec!["Zone-A"]);
}
