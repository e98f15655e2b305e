use std::collections::BTreeMap;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::emergency::DestinationMarker;
use crate::models::{DroneState, LatLng, TaskId};
use crate::paths::PathReconstructor;
use crate::poller::{FleetObserver, FleetUpdate};
use crate::reconciler::StatusReconciler;

/// Read models derived from polling and local submissions.
pub struct FleetState {
  pub reconciler: StatusReconciler,
  pub paths: PathReconstructor,
  pub drones: Vec<DroneState>,
  pub destinations: BTreeMap<TaskId, DestinationMarker>,
  pub markers_visible: bool,
  last_tick: u64,
}

impl FleetState {
  /// Applies an update unless a newer (or equal) tick was already applied.
  pub fn apply(&mut self, update: FleetUpdate) -> bool {
    if update.tick <= self.last_tick {
      debug!("Ignoring stale fleet status from tick {} (last {})", update.tick, self.last_tick);
      return false;
    }
    self.last_tick = update.tick;
    self.paths.ingest(&update.drones);
    self.reconciler.apply(&update.drones);
    self.drones = update.drones;
    true
  }

  /// Everything issued at or before `tick` is stale from now on.
  pub fn fence(&mut self, tick: u64) {
    self.last_tick = self.last_tick.max(tick);
  }

  pub fn forget_task(&mut self, id: TaskId) {
    self.reconciler.forget(id);
    self.destinations.remove(&id);
  }
}

pub struct FleetView {
  state: Mutex<FleetState>,
}

impl FleetView {
  pub fn new(service_point: LatLng) -> Self {
    Self {
      state: Mutex::new(FleetState {
        reconciler: StatusReconciler::new(),
        paths: PathReconstructor::new(service_point),
        drones: vec![],
        destinations: BTreeMap::new(),
        markers_visible: true,
        last_tick: 0,
      }),
    }
  }

  pub async fn lock(&self) -> MutexGuard<'_, FleetState> {
    self.state.lock().await
  }
}

impl FleetObserver for FleetView {
  fn on_fleet_status(&self, update: FleetUpdate) -> BoxFuture<'_, ()> {
    async move {
      self.state.lock().await.apply(update);
    }
    .boxed()
  }
}
