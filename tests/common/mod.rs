#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fleet_console::backend::DispatchBackend;
use fleet_console::config::Config;
use fleet_console::console::Console;
use fleet_console::error::{ConsoleError, ConsoleResult};
use fleet_console::models::{
  BypassConfirmation, DispatchResponse, DroneState, DroneStatus, EmergencyRequest, LatLng, NewRestrictedArea,
  RestrictedArea, Task, TaskId,
};
use fleet_console::store::TaskStore;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{oneshot, Notify};

/// Holds a call until the test releases it; `entered` fires once it is parked.
pub struct Gate {
  release: Mutex<Option<oneshot::Receiver<()>>>,
  pub entered: Notify,
}

impl Gate {
  fn new() -> Self {
    Self { release: Mutex::new(None), entered: Notify::new() }
  }

  /// Arms the gate for the next call and returns the release handle.
  pub fn arm(&self) -> oneshot::Sender<()> {
    let (tx, rx) = oneshot::channel();
    *self.release.lock().unwrap() = Some(rx);
    tx
  }

  async fn pass(&self) {
    let release = self.release.lock().unwrap().take();
    if let Some(rx) = release {
      self.entered.notify_one();
      let _ = rx.await;
    }
  }
}

/// In-process stand-in for the dispatch service with scripted answers.
pub struct FakeBackend {
  pub running: AtomicBool,
  /// Makes the simulation-state query fail.
  pub state_unreachable: AtomicBool,
  pub drones: Mutex<Vec<DroneState>>,
  pub emergency_responses: Mutex<VecDeque<ConsoleResult<DispatchResponse>>>,
  pub confirm_responses: Mutex<VecDeque<ConsoleResult<DispatchResponse>>>,
  pub emergency_requests: Mutex<Vec<EmergencyRequest>>,
  pub confirmations: Mutex<Vec<BypassConfirmation>>,
  pub simulated: Mutex<Vec<Vec<Task>>>,
  pub areas: Mutex<Vec<RestrictedArea>>,
  pub deleted_areas: Mutex<Vec<String>>,
  pub status_calls: AtomicUsize,
  pub status_gate: Gate,
  pub area_gate: Gate,
  pub emergency_gate: Gate,
  next_area_id: AtomicI64,
}

impl FakeBackend {
  pub fn new() -> Arc<Self> {
    Arc::new(Self {
      running: AtomicBool::new(false),
      state_unreachable: AtomicBool::new(false),
      drones: Mutex::new(vec![]),
      emergency_responses: Mutex::new(VecDeque::new()),
      confirm_responses: Mutex::new(VecDeque::new()),
      emergency_requests: Mutex::new(vec![]),
      confirmations: Mutex::new(vec![]),
      simulated: Mutex::new(vec![]),
      areas: Mutex::new(vec![]),
      deleted_areas: Mutex::new(vec![]),
      status_calls: AtomicUsize::new(0),
      status_gate: Gate::new(),
      area_gate: Gate::new(),
      emergency_gate: Gate::new(),
      next_area_id: AtomicI64::new(1),
    })
  }

  pub fn script_emergency(&self, response: ConsoleResult<DispatchResponse>) {
    self.emergency_responses.lock().unwrap().push_back(response);
  }

  pub fn script_confirm(&self, response: ConsoleResult<DispatchResponse>) {
    self.confirm_responses.lock().unwrap().push_back(response);
  }

  pub fn seed_area(&self, name: &str) -> RestrictedArea {
    let area = RestrictedArea {
      id: self.next_area_id.fetch_add(1, Ordering::SeqCst),
      name: name.into(),
      vertices: square(),
    };
    self.areas.lock().unwrap().push(area.clone());
    area
  }

  pub fn set_drones(&self, drones: Vec<DroneState>) {
    *self.drones.lock().unwrap() = drones;
  }
}

fn next_or_success(queue: &Mutex<VecDeque<ConsoleResult<DispatchResponse>>>) -> ConsoleResult<DispatchResponse> {
  queue
    .lock()
    .unwrap()
    .pop_front()
    .unwrap_or_else(|| Ok(success("Emergency task assigned")))
}

impl DispatchBackend for FakeBackend {
  fn simulation_state(&self) -> BoxFuture<'_, ConsoleResult<bool>> {
    async move {
      if self.state_unreachable.load(Ordering::SeqCst) {
        return Err(ConsoleError::Transport("error sending request: connection refused".into()));
      }
      Ok(self.running.load(Ordering::SeqCst))
    }
    .boxed()
  }

  fn simulate<'a>(&'a self, tasks: &'a [Task]) -> BoxFuture<'a, ConsoleResult<()>> {
    async move {
      self.simulated.lock().unwrap().push(tasks.to_vec());
      self.running.store(true, Ordering::SeqCst);
      Ok(())
    }
    .boxed()
  }

  fn stop(&self) -> BoxFuture<'_, ConsoleResult<()>> {
    async move {
      self.running.store(false, Ordering::SeqCst);
      Ok(())
    }
    .boxed()
  }

  fn fleet_status(&self) -> BoxFuture<'_, ConsoleResult<Vec<DroneState>>> {
    async move {
      self.status_calls.fetch_add(1, Ordering::SeqCst);
      let drones = self.drones.lock().unwrap().clone();
      self.status_gate.pass().await;
      Ok(drones)
    }
    .boxed()
  }

  fn dispatch_emergency<'a>(&'a self, request: &'a EmergencyRequest) -> BoxFuture<'a, ConsoleResult<DispatchResponse>> {
    async move {
      self.emergency_requests.lock().unwrap().push(request.clone());
      self.emergency_gate.pass().await;
      next_or_success(&self.emergency_responses)
    }
    .boxed()
  }

  fn confirm_bypass<'a>(&'a self, confirmation: &'a BypassConfirmation) -> BoxFuture<'a, ConsoleResult<DispatchResponse>> {
    async move {
      self.confirmations.lock().unwrap().push(confirmation.clone());
      next_or_success(&self.confirm_responses)
    }
    .boxed()
  }

  fn create_area<'a>(&'a self, area: &'a NewRestrictedArea) -> BoxFuture<'a, ConsoleResult<RestrictedArea>> {
    async move {
      let saved = RestrictedArea {
        id: self.next_area_id.fetch_add(1, Ordering::SeqCst),
        name: area.name.clone(),
        vertices: area.vertices.clone(),
      };
      self.areas.lock().unwrap().push(saved.clone());
      Ok(saved)
    }
    .boxed()
  }

  fn restricted_areas(&self) -> BoxFuture<'_, ConsoleResult<Vec<RestrictedArea>>> {
    async move {
      let areas = self.areas.lock().unwrap().clone();
      self.area_gate.pass().await;
      Ok(areas)
    }
    .boxed()
  }

  fn delete_area_by_name<'a>(&'a self, name: &'a str) -> BoxFuture<'a, ConsoleResult<()>> {
    async move {
      self.areas.lock().unwrap().retain(|a| a.name != name);
      self.deleted_areas.lock().unwrap().push(name.to_string());
      Ok(())
    }
    .boxed()
  }

  fn clear_areas(&self) -> BoxFuture<'_, ConsoleResult<()>> {
    async move {
      self.areas.lock().unwrap().clear();
      Ok(())
    }
    .boxed()
  }
}

pub fn success(message: &str) -> DispatchResponse {
  DispatchResponse { success: true, message: message.into() }
}

pub fn rejected(message: &str) -> DispatchResponse {
  DispatchResponse { success: false, message: message.into() }
}

pub fn square() -> Vec<LatLng> {
  vec![
    LatLng { lat: 55.94, lng: -3.19 },
    LatLng { lat: 55.94, lng: -3.18 },
    LatLng { lat: 55.95, lng: -3.18 },
    LatLng { lat: 55.95, lng: -3.19 },
  ]
}

pub fn drone(id: &str, status: &str, task: TaskId, done: u32, total: u32) -> DroneState {
  DroneState {
    drone_id: id.into(),
    status: DroneStatus::from(status.to_string()),
    current_position: LatLng { lat: 55.945, lng: -3.185 },
    current_task_id: Some(task),
    completed_tasks_count: done,
    total_tasks: total,
    processing_emergency: false,
    current_emergency_task_id: None,
  }
}

pub fn test_config() -> Config {
  Config { poll_interval: Duration::from_millis(20), ..Config::default() }
}

pub fn console_with(backend: Arc<FakeBackend>) -> Arc<Console> {
  Arc::new(Console::new(backend, TaskStore::in_memory(), &test_config()))
}
