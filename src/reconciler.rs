use std::collections::HashMap;

use serde::Serialize;

use crate::models::{DroneState, DroneStatus, TaskId, TaskStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetCounters {
  pub active_drones: usize,
  pub completed_tasks: u64,
  pub emergency_in_progress: usize,
}

impl FleetCounters {
  pub fn from_drones(drones: &[DroneState]) -> Self {
    Self {
      active_drones: drones.iter().filter(|d| d.status != DroneStatus::Completed).count(),
      completed_tasks: drones.iter().map(|d| u64::from(d.completed_tasks_count)).sum(),
      emergency_in_progress: drones.iter().filter(|d| d.processing_emergency).count(),
    }
  }
}

/// `round(completed / total * 100)`, clamped; an empty plan counts as 0%.
pub fn progress_percent(completed: u32, total: u32) -> u8 {
  if total == 0 {
    return 0;
  }
  let pct = (f64::from(completed) / f64::from(total) * 100.0).round();
  pct.clamp(0.0, 100.0) as u8
}

/// Local task status/progress model, advanced by submissions and polls.
#[derive(Default)]
pub struct StatusReconciler {
  status: HashMap<TaskId, TaskStatus>,
  progress: HashMap<TaskId, u8>,
  counters: FleetCounters,
}

impl StatusReconciler {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn status(&self, id: TaskId) -> TaskStatus {
    self.status.get(&id).copied().unwrap_or(TaskStatus::Pending)
  }

  pub fn progress(&self, id: TaskId) -> u8 {
    self.progress.get(&id).copied().unwrap_or(0)
  }

  pub fn counters(&self) -> FleetCounters {
    self.counters
  }

  pub fn track_pending(&mut self, id: TaskId) {
    self.status.insert(id, TaskStatus::Pending);
    self.progress.insert(id, 0);
  }

  pub fn mark_assigned(&mut self, id: TaskId) {
    self.status.insert(id, TaskStatus::Assigned);
    self.progress.insert(id, 0);
  }

  pub fn mark_submitted<I: IntoIterator<Item = TaskId>>(&mut self, ids: I) {
    for id in ids {
      self.mark_assigned(id);
    }
  }

  /// Merges one poll. Tasks no drone is bound to keep their last status.
  pub fn apply(&mut self, drones: &[DroneState]) {
    for drone in drones {
      let Some(task_id) = drone.current_task_id else {
        continue;
      };
      self.progress.insert(task_id, progress_percent(drone.completed_tasks_count, drone.total_tasks));
      match drone.status {
        DroneStatus::Completed => {
          self.status.insert(task_id, TaskStatus::Completed);
        }
        DroneStatus::Moving => {
          self.status.insert(task_id, TaskStatus::Assigned);
        }
        DroneStatus::Other(_) => {}
      }
    }
    self.counters = FleetCounters::from_drones(drones);
  }

  /// Simulation stopped: every known task is pending again.
  pub fn reset_all(&mut self) {
    for status in self.status.values_mut() {
      *status = TaskStatus::Pending;
    }
    for progress in self.progress.values_mut() {
      *progress = 0;
    }
  }

  pub fn forget(&mut self, id: TaskId) {
    self.status.remove(&id);
    self.progress.remove(&id);
  }

  pub fn clear(&mut self) {
    self.status.clear();
    self.progress.clear();
  }
}
