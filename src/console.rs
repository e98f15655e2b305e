use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::areas::{AreaInput, RestrictedAreaRegistry};
use crate::backend::DispatchBackend;
use crate::config::Config;
use crate::emergency::{BypassPrompt, DestinationMarker, EmergencyBypassWorkflow, EmergencyOutcome};
use crate::error::{ConsoleError, ConsoleResult};
use crate::fleet::FleetView;
use crate::models::{
  parse_location, predefined_emergency_request, predefined_normal_tasks, DroneState, LatLng, RestrictedArea, Task,
  TaskId, TaskStatus,
};
use crate::paths::{PathLine, PathSummary};
use crate::poller::{FleetUpdate, StatusPoller};
use crate::reconciler::FleetCounters;
use crate::store::TaskStore;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
  #[serde(flatten)]
  pub task: Task,
  pub status: TaskStatus,
  pub progress: u8,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleSnapshot {
  pub simulation_running: bool,
  pub counters: FleetCounters,
  pub tasks: Vec<TaskView>,
  pub drones: Vec<DroneState>,
  pub paths: Vec<PathSummary>,
  pub path_lines: Vec<PathLine>,
  pub destinations: Vec<DestinationMarker>,
  pub restricted_areas: Vec<RestrictedArea>,
  pub restricted_areas_visible: bool,
  pub task_markers_visible: bool,
  pub pending_bypass: Option<BypassPrompt>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
  pub imported: usize,
  pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyImportResult {
  pub task_id: Option<TaskId>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub outcome: Option<EmergencyOutcome>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

/// Owns every component and serialises operator actions against them.
pub struct Console {
  backend: Arc<dyn DispatchBackend>,
  store: TaskStore,
  fleet: Arc<FleetView>,
  poller: StatusPoller,
  emergency: EmergencyBypassWorkflow,
  areas: RestrictedAreaRegistry,
  /// Emergency tasks stored by their own submission and not yet assigned.
  provisional: Mutex<HashSet<TaskId>>,
}

impl Console {
  pub fn new(backend: Arc<dyn DispatchBackend>, store: TaskStore, config: &Config) -> Self {
    let fleet = Arc::new(FleetView::new(config.service_point));
    let poller = StatusPoller::new(backend.clone(), fleet.clone(), config.poll_interval);
    Self {
      emergency: EmergencyBypassWorkflow::new(backend.clone()),
      areas: RestrictedAreaRegistry::new(backend.clone()),
      backend,
      store,
      fleet,
      poller,
      provisional: Mutex::new(HashSet::new()),
    }
  }

  /// Startup: simulation state, restricted areas, and status for stored tasks.
  pub async fn init(&self) {
    if let Ok(tasks) = self.store.list().await {
      let mut fleet = self.fleet.lock().await;
      for task in tasks {
        fleet.reconciler.track_pending(task.id);
      }
    }
    if let Err(e) = self.sync_simulation_state().await {
      error!("Unable to connect to backend service: {}", e);
    }
    if let Err(e) = self.areas.reload_from_backend().await {
      error!("Failed to load restricted areas: {}", e);
    }
  }

  /// Starts or stops polling to match the backend. On failure polling stops.
  pub async fn sync_simulation_state(&self) -> ConsoleResult<bool> {
    match self.backend.simulation_state().await {
      Ok(true) => {
        self.poller.start().await;
        Ok(true)
      }
      Ok(false) => {
        self.poller.stop().await;
        Ok(false)
      }
      Err(e) => {
        self.poller.stop().await;
        Err(e)
      }
    }
  }

  pub async fn simulation_running(&self) -> bool {
    self.poller.is_running().await
  }

  // Tasks

  pub async fn tasks(&self) -> ConsoleResult<Vec<Task>> {
    self.store.list().await
  }

  pub async fn add_task(&self, task: Task) -> ConsoleResult<()> {
    let id = task.id;
    if !self.store.add(task).await? {
      return Err(ConsoleError::DuplicateTask(id));
    }
    self.fleet.lock().await.reconciler.track_pending(id);
    info!("Task {} added", id);
    Ok(())
  }

  /// Form entry: `location` is `lng,lat`.
  pub async fn create_normal_task(&self, id: TaskId, location: &str, capacity: f64) -> ConsoleResult<Task> {
    let task = Task::normal(id, parse_location(location).map_err(ConsoleError::Validation)?, capacity);
    self.add_task(task.clone()).await?;
    Ok(task)
  }

  pub async fn import_tasks(&self, json: &str) -> ConsoleResult<ImportReport> {
    let values = match parse_json(json)? {
      Value::Array(values) => values,
      _ => return Err(ConsoleError::Validation("JSON format error: must be a task array".into())),
    };
    let mut report = ImportReport::default();
    for value in values {
      let added = match Task::from_import(value) {
        Ok(task) => self.add_task(task).await.map_err(|e| e.to_string()),
        Err(e) => Err(e),
      };
      match added {
        Ok(()) => report.imported += 1,
        Err(e) => {
          warn!("Task import failed: {}", e);
          report.failed += 1;
        }
      }
    }
    info!("Imported {} normal tasks, {} failed", report.imported, report.failed);
    Ok(report)
  }

  /// Duplicate fixtures are skipped.
  pub async fn load_predefined(&self) -> ConsoleResult<usize> {
    let mut added = 0;
    for task in predefined_normal_tasks() {
      match self.add_task(task).await {
        Ok(()) => added += 1,
        Err(ConsoleError::DuplicateTask(_)) => {}
        Err(e) => return Err(e),
      }
    }
    Ok(added)
  }

  /// Also drops the task's status, marker and any staged bypass request.
  pub async fn remove_task(&self, id: TaskId) -> ConsoleResult<bool> {
    let removed = self.store.remove(id).await?;
    self.fleet.lock().await.forget_task(id);
    self.provisional.lock().await.remove(&id);
    if self.emergency.discard_for_task(id).await {
      info!("Discarded pending bypass confirmation for deleted task {}", id);
    }
    Ok(removed)
  }

  pub async fn clear_tasks(&self) -> ConsoleResult<()> {
    self.store.clear().await?;
    {
      let mut fleet = self.fleet.lock().await;
      fleet.reconciler.clear();
      fleet.destinations.clear();
    }
    self.provisional.lock().await.clear();
    self.emergency.withdraw_all().await;
    info!("All tasks cleared");
    Ok(())
  }

  // Simulation

  pub async fn start_simulation(&self) -> ConsoleResult<()> {
    let tasks = self.store.list().await?;
    if tasks.is_empty() {
      return Err(ConsoleError::NoTasks);
    }
    self.backend.simulate(&tasks).await?;
    info!("Simulation started with {} tasks", tasks.len());
    self.fleet.lock().await.reconciler.mark_submitted(tasks.iter().map(|t| t.id));
    if let Err(e) = self.sync_simulation_state().await {
      warn!("Failed to check simulation status: {}", e);
    }
    Ok(())
  }

  /// Stops polling and resets every task to pending. Poll results issued
  /// before the stop are ignored if they arrive late.
  pub async fn stop_simulation(&self) -> ConsoleResult<()> {
    self.backend.stop().await?;
    self.poller.stop().await;
    let fence = self.poller.next_tick();
    {
      let mut fleet = self.fleet.lock().await;
      fleet.fence(fence);
      fleet.reconciler.reset_all();
      fleet.drones.clear();
    }
    info!("Simulation stopped");
    if let Err(e) = self.sync_simulation_state().await {
      warn!("Failed to check simulation status: {}", e);
    }
    Ok(())
  }

  /// Re-reads the simulation state and applies one fleet-status fetch.
  pub async fn refresh(&self) -> ConsoleResult<()> {
    self.sync_simulation_state().await?;
    let tick = self.poller.next_tick();
    let drones = self.backend.fleet_status().await?;
    self.fleet.lock().await.apply(FleetUpdate { tick, drones });
    Ok(())
  }

  // Emergency tasks

  /// Always reaches the backend. The task is stored if its id is free and
  /// kept only while it is assigned or awaiting a bypass decision; an id that
  /// was already stored is never rolled back.
  pub async fn submit_emergency(&self, task: Task) -> ConsoleResult<EmergencyOutcome> {
    if !task.is_emergency() {
      return Err(ConsoleError::Validation("emergencyLevel is required for emergency tasks".into()));
    }
    let id = task.id;
    let inserted = self.store.add(task.clone()).await?;
    if inserted {
      self.fleet.lock().await.reconciler.track_pending(id);
      self.provisional.lock().await.insert(id);
      info!("Emergency task {} added", id);
    }
    match self.emergency.submit(task).await {
      Ok(outcome) => {
        if matches!(outcome, EmergencyOutcome::Assigned { .. }) {
          self.provisional.lock().await.remove(&id);
        }
        self.apply_emergency_outcome(&outcome).await;
        Ok(outcome)
      }
      Err(e) => {
        if inserted {
          self.roll_back_provisional(id).await;
        }
        Err(e)
      }
    }
  }

  pub async fn create_emergency_task(
    &self,
    id: TaskId,
    level: i64,
    location: &str,
    capacity: f64,
  ) -> ConsoleResult<EmergencyOutcome> {
    let location = parse_location(location).map_err(ConsoleError::Validation)?;
    self.submit_emergency(Task::emergency(id, level, location, capacity)).await
  }

  pub async fn send_default_emergency(&self) -> ConsoleResult<EmergencyOutcome> {
    let mut request = predefined_emergency_request();
    self.submit_emergency(request.emergency_tasks.remove(0)).await
  }

  /// Accepts `{"emergencyTasks": [...]}` and submits each task on its own.
  pub async fn import_emergency(&self, json: &str) -> ConsoleResult<Vec<EmergencyImportResult>> {
    let doc = parse_json(json)?;
    let Some(values) = doc.get("emergencyTasks").and_then(Value::as_array) else {
      return Err(ConsoleError::Validation("JSON format error: must contain emergencyTasks array".into()));
    };
    let mut results = vec![];
    for value in values.iter().cloned() {
      let task_id = value.get("id").and_then(Value::as_i64);
      let result = match Task::from_import(value) {
        Ok(task) => self.submit_emergency(task).await.map_err(|e| e.to_string()),
        Err(e) => Err(e),
      };
      results.push(match result {
        Ok(outcome) => EmergencyImportResult { task_id, outcome: Some(outcome), error: None },
        Err(e) => EmergencyImportResult { task_id, outcome: None, error: Some(e) },
      });
    }
    Ok(results)
  }

  pub async fn confirm_bypass(&self) -> ConsoleResult<EmergencyOutcome> {
    let confirmed = self.emergency.confirm().await?;
    match confirmed.outcome {
      Ok(outcome) => {
        self.provisional.lock().await.remove(&confirmed.task_id);
        self.apply_emergency_outcome(&outcome).await;
        Ok(outcome)
      }
      Err(e) => {
        self.roll_back_provisional(confirmed.task_id).await;
        Err(e)
      }
    }
  }

  /// Operator declined: the blocked task cannot be delivered.
  pub async fn dismiss_bypass(&self) -> ConsoleResult<BypassPrompt> {
    let prompt = self.emergency.dismiss().await.ok_or(ConsoleError::NoPendingBypass)?;
    info!("Bypass of {} declined for task {}", prompt.area_name, prompt.task_id);
    self.roll_back_provisional(prompt.task_id).await;
    Ok(prompt)
  }

  pub async fn pending_bypass(&self) -> Option<BypassPrompt> {
    self.emergency.pending().await
  }

  async fn apply_emergency_outcome(&self, outcome: &EmergencyOutcome) {
    let EmergencyOutcome::Assigned { marker, .. } = outcome else {
      return;
    };
    if !matches!(self.store.get(marker.task_id).await, Ok(Some(_))) {
      warn!("Emergency task {} was deleted before its assignment arrived", marker.task_id);
      return;
    }
    let mut fleet = self.fleet.lock().await;
    fleet.reconciler.mark_assigned(marker.task_id);
    fleet.destinations.insert(marker.task_id, marker.clone());
  }

  /// Removes the task only if its emergency submission stored it.
  async fn roll_back_provisional(&self, id: TaskId) {
    if !self.provisional.lock().await.remove(&id) {
      return;
    }
    if let Err(e) = self.store.remove(id).await {
      error!("Failed to roll back emergency task {}: {}", id, e);
    }
    self.fleet.lock().await.forget_task(id);
  }

  // Restricted areas

  pub async fn restricted_areas(&self) -> Vec<RestrictedArea> {
    self.areas.list().await
  }

  pub async fn reload_areas(&self) -> ConsoleResult<bool> {
    self.areas.reload_from_backend().await
  }

  pub async fn create_area(&self, input: AreaInput) -> ConsoleResult<RestrictedArea> {
    self.areas.create(input).await
  }

  pub async fn delete_area(&self, id: i64) -> ConsoleResult<RestrictedArea> {
    self.areas.delete(id).await
  }

  pub async fn clear_areas(&self) -> ConsoleResult<()> {
    self.areas.clear().await
  }

  pub async fn toggle_areas(&self) -> bool {
    self.areas.toggle_visible().await
  }

  // Paths

  pub async fn clear_paths(&self) {
    self.fleet.lock().await.paths.clear();
    info!("All drone paths cleared");
  }

  pub async fn set_paths_visible(&self, visible: bool) {
    self.fleet.lock().await.paths.set_visible(visible);
  }

  pub async fn toggle_paths(&self) -> bool {
    self.fleet.lock().await.paths.toggle_visible()
  }

  /// Shows or hides task and destination markers.
  pub async fn toggle_task_markers(&self) -> bool {
    let mut fleet = self.fleet.lock().await;
    fleet.markers_visible = !fleet.markers_visible;
    fleet.markers_visible
  }

  pub async fn path(&self, drone_id: &str) -> Vec<LatLng> {
    self.fleet.lock().await.paths.path(drone_id).to_vec()
  }

  // Read model

  pub async fn snapshot(&self) -> ConsoleResult<ConsoleSnapshot> {
    let tasks = self.store.list().await?;
    let simulation_running = self.poller.is_running().await;
    let (tasks, counters, drones, paths, path_lines, destinations, task_markers_visible) = {
      let fleet = self.fleet.lock().await;
      let tasks = tasks
        .into_iter()
        .map(|task| TaskView {
          status: fleet.reconciler.status(task.id),
          progress: fleet.reconciler.progress(task.id),
          task,
        })
        .collect::<Vec<_>>();
      (
        tasks,
        fleet.reconciler.counters(),
        fleet.drones.clone(),
        fleet.paths.summaries(),
        fleet.paths.lines(),
        fleet.destinations.values().cloned().collect::<Vec<_>>(),
        fleet.markers_visible,
      )
    };
    Ok(ConsoleSnapshot {
      simulation_running,
      counters,
      tasks,
      drones,
      paths,
      path_lines,
      destinations,
      restricted_areas: self.areas.list().await,
      restricted_areas_visible: self.areas.is_visible().await,
      task_markers_visible,
      pending_bypass: self.emergency.pending().await,
    })
  }
}

fn parse_json(json: &str) -> ConsoleResult<Value> {
  if json.trim().is_empty() {
    return Err(ConsoleError::Validation("Please enter JSON data".into()));
  }
  serde_json::from_str(json).map_err(|e| ConsoleError::Validation(format!("JSON parsing error: {}", e)))
}
