use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::backend::DispatchBackend;
use crate::models::DroneState;

/// One fleet-status result, numbered in issue order.
#[derive(Debug, Clone)]
pub struct FleetUpdate {
  pub tick: u64,
  pub drones: Vec<DroneState>,
}

pub trait FleetObserver: Send + Sync {
  fn on_fleet_status(&self, update: FleetUpdate) -> BoxFuture<'_, ()>;
}

pub struct StatusPoller {
  backend: Arc<dyn DispatchBackend>,
  observer: Arc<dyn FleetObserver>,
  period: Duration,
  ticks: Arc<AtomicU64>,
  handle: Mutex<Option<JoinHandle<()>>>,
}

impl StatusPoller {
  pub fn new(backend: Arc<dyn DispatchBackend>, observer: Arc<dyn FleetObserver>, period: Duration) -> Self {
    Self { backend, observer, period, ticks: Arc::new(AtomicU64::new(0)), handle: Mutex::new(None) }
  }

  /// Numbers shared by poll ticks and manual refreshes; strictly increasing.
  pub fn next_tick(&self) -> u64 {
    self.ticks.fetch_add(1, Ordering::SeqCst) + 1
  }

  /// No-op when already running.
  pub async fn start(&self) -> bool {
    let mut handle = self.handle.lock().await;
    if handle.as_ref().is_some_and(|h| !h.is_finished()) {
      return false;
    }
    let backend = self.backend.clone();
    let observer = self.observer.clone();
    let ticks = self.ticks.clone();
    *handle = Some(tokio::spawn(poll_loop(backend, observer, ticks, self.period)));
    info!("Status polling started every {:?}", self.period);
    true
  }

  /// Cancels the timer and every fetch still in flight.
  pub async fn stop(&self) -> bool {
    let Some(handle) = self.handle.lock().await.take() else {
      return false;
    };
    handle.abort();
    info!("Status polling stopped");
    true
  }

  pub async fn is_running(&self) -> bool {
    self.handle.lock().await.as_ref().is_some_and(|h| !h.is_finished())
  }
}

impl Drop for StatusPoller {
  fn drop(&mut self) {
    if let Some(handle) = self.handle.get_mut().take() {
      handle.abort();
    }
  }
}

async fn poll_loop(
  backend: Arc<dyn DispatchBackend>,
  observer: Arc<dyn FleetObserver>,
  ticks: Arc<AtomicU64>,
  period: Duration,
) {
  let mut interval = tokio::time::interval(period);
  interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
  // Owned here so aborting the loop aborts the fetches too.
  let mut in_flight = JoinSet::new();

  loop {
    tokio::select! {
      _ = interval.tick() => {
        let tick = ticks.fetch_add(1, Ordering::SeqCst) + 1;
        let backend = backend.clone();
        let observer = observer.clone();
        in_flight.spawn(async move {
          match backend.fleet_status().await {
            Ok(drones) => observer.on_fleet_status(FleetUpdate { tick, drones }).await,
            Err(e) => error!("Failed to get drone status (tick {}): {}", tick, e),
          }
        });
      }
      Some(joined) = in_flight.join_next() => {
        if let Err(e) = joined {
          debug!("Status poll task ended abnormally: {}", e);
        }
      }
    }
  }
}
