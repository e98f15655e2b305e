mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{console_with, drone, FakeBackend};
use fleet_console::error::ConsoleError;
use fleet_console::models::{LatLng, Task, TaskStatus};

#[tokio::test]
async fn duplicate_task_id_is_refused() {
  let backend = FakeBackend::new();
  let console = console_with(backend);

  console.create_normal_task(1001, "-3.188,55.946", 3.5).await.unwrap();
  let err = console.add_task(Task::normal(1001, LatLng { lat: 1.0, lng: 2.0 }, 1.0)).await.unwrap_err();
  assert!(matches!(err, ConsoleError::DuplicateTask(1001)));

  let tasks = console.tasks().await.unwrap();
  assert_eq!(tasks.len(), 1);
  assert_eq!(tasks[0].delivery, LatLng { lat: 55.946, lng: -3.188 });
}

#[tokio::test]
async fn bad_location_is_a_validation_error() {
  let console = console_with(FakeBackend::new());
  assert!(matches!(console.create_normal_task(1, "55.9", 1.0).await, Err(ConsoleError::Validation(_))));
  assert!(console.tasks().await.unwrap().is_empty());
}

#[tokio::test]
async fn import_counts_successes_and_failures() {
  let console = console_with(FakeBackend::new());
  console.load_predefined().await.unwrap();

  let json = r#"[
    {"id": 5, "delivery": {"lat": 55.9, "lng": -3.1}, "requirements": {"capacity": 1, "maxCost": 10}},
    {"id": 1001, "delivery": {"lat": 55.9, "lng": -3.1}, "requirements": {"capacity": 1, "maxCost": 10}},
    {"id": 6, "delivery": {"lat": 55.9, "lng": -3.1}}
  ]"#;
  let report = console.import_tasks(json).await.unwrap();
  assert_eq!((report.imported, report.failed), (1, 2));
  assert_eq!(console.tasks().await.unwrap().len(), 4);

  assert!(matches!(console.import_tasks("   ").await, Err(ConsoleError::Validation(_))));
  assert!(matches!(console.import_tasks("{\"id\": 1}").await, Err(ConsoleError::Validation(_))));
}

#[tokio::test]
async fn predefined_tasks_load_once() {
  let console = console_with(FakeBackend::new());
  assert_eq!(console.load_predefined().await.unwrap(), 3);
  assert_eq!(console.load_predefined().await.unwrap(), 0);
}

#[tokio::test]
async fn start_without_tasks_never_reaches_the_backend() {
  let backend = FakeBackend::new();
  let console = console_with(backend.clone());

  assert!(matches!(console.start_simulation().await, Err(ConsoleError::NoTasks)));
  assert!(backend.simulated.lock().unwrap().is_empty());
  assert!(!console.simulation_running().await);
}

#[tokio::test]
async fn start_submits_every_task_and_polls_until_stopped() {
  let backend = FakeBackend::new();
  backend.set_drones(vec![drone("1", "MOVING", 1001, 2, 4)]);
  let console = console_with(backend.clone());
  console.load_predefined().await.unwrap();

  console.start_simulation().await.unwrap();
  assert!(console.simulation_running().await);
  assert_eq!(backend.simulated.lock().unwrap()[0].len(), 3);

  tokio::time::sleep(Duration::from_millis(150)).await;
  let snapshot = console.snapshot().await.unwrap();
  assert!(backend.status_calls.load(Ordering::SeqCst) >= 2);
  let first = snapshot.tasks.iter().find(|t| t.task.id == 1001).unwrap();
  assert_eq!((first.status, first.progress), (TaskStatus::Assigned, 50));
  assert_eq!(snapshot.counters.active_drones, 1);

  console.stop_simulation().await.unwrap();
  assert!(!console.simulation_running().await);
  let calls = backend.status_calls.load(Ordering::SeqCst);
  tokio::time::sleep(Duration::from_millis(100)).await;
  assert_eq!(backend.status_calls.load(Ordering::SeqCst), calls);

  let snapshot = console.snapshot().await.unwrap();
  assert!(snapshot.tasks.iter().all(|t| t.status == TaskStatus::Pending && t.progress == 0));
  assert!(snapshot.drones.is_empty());
  assert_eq!(snapshot.paths.len(), 1);
}

#[tokio::test]
async fn refresh_answered_after_stop_is_ignored() {
  let backend = FakeBackend::new();
  backend.set_drones(vec![drone("1", "COMPLETED", 1001, 3, 3)]);
  let console = console_with(backend.clone());
  console.load_predefined().await.unwrap();

  let release = backend.status_gate.arm();
  let refresh = tokio::spawn({
    let console = console.clone();
    async move { console.refresh().await }
  });
  backend.status_gate.entered.notified().await;

  console.stop_simulation().await.unwrap();
  let _ = release.send(());
  refresh.await.unwrap().unwrap();

  let snapshot = console.snapshot().await.unwrap();
  assert!(snapshot.tasks.iter().all(|t| t.status == TaskStatus::Pending));
  assert!(snapshot.drones.is_empty());
  assert!(snapshot.paths.is_empty());
}

#[tokio::test]
async fn refresh_applies_the_current_fleet() {
  let backend = FakeBackend::new();
  backend.set_drones(vec![drone("1", "COMPLETED", 1001, 3, 3)]);
  let console = console_with(backend.clone());
  console.load_predefined().await.unwrap();

  console.refresh().await.unwrap();
  let snapshot = console.snapshot().await.unwrap();
  let first = snapshot.tasks.iter().find(|t| t.task.id == 1001).unwrap();
  assert_eq!((first.status, first.progress), (TaskStatus::Completed, 100));
  assert_eq!(snapshot.counters.completed_tasks, 3);
}

#[tokio::test]
async fn clearing_tasks_resets_everything_local() {
  let console = console_with(FakeBackend::new());
  console.load_predefined().await.unwrap();
  console.send_default_emergency().await.unwrap();

  console.clear_tasks().await.unwrap();
  let snapshot = console.snapshot().await.unwrap();
  assert!(snapshot.tasks.is_empty());
  assert!(snapshot.destinations.is_empty());
}

#[tokio::test]
async fn unreachable_simulation_state_stops_polling() {
  let backend = FakeBackend::new();
  backend.running.store(true, Ordering::SeqCst);
  let console = console_with(backend.clone());

  assert!(console.sync_simulation_state().await.unwrap());
  assert!(console.simulation_running().await);

  backend.state_unreachable.store(true, Ordering::SeqCst);
  let err = console.sync_simulation_state().await.unwrap_err();
  assert!(matches!(err, ConsoleError::Transport(_)));
  assert!(!console.simulation_running().await);

  let calls = backend.status_calls.load(Ordering::SeqCst);
  tokio::time::sleep(Duration::from_millis(100)).await;
  assert_eq!(backend.status_calls.load(Ordering::SeqCst), calls);
}

#[tokio::test]
async fn init_tracks_stored_tasks_when_the_backend_is_down() {
  let backend = FakeBackend::new();
  backend.state_unreachable.store(true, Ordering::SeqCst);
  let console = console_with(backend.clone());
  console.load_predefined().await.unwrap();

  console.init().await;

  assert!(!console.simulation_running().await);
  let snapshot = console.snapshot().await.unwrap();
  assert!(!snapshot.simulation_running);
  assert!(snapshot.tasks.iter().all(|t| t.status == TaskStatus::Pending));
}

#[tokio::test]
async fn task_markers_can_be_hidden() {
  let console = console_with(FakeBackend::new());
  console.send_default_emergency().await.unwrap();

  let snapshot = console.snapshot().await.unwrap();
  assert!(snapshot.task_markers_visible);
  assert_eq!(snapshot.destinations.len(), 1);

  assert!(!console.toggle_task_markers().await);
  assert!(!console.snapshot().await.unwrap().task_markers_visible);
  assert!(console.toggle_task_markers().await);
}
