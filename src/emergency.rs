//! Emergency dispatch with operator-confirmed restricted-area bypass.
//!
//! A submission either gets assigned, is rejected outright, or is blocked by a
//! restricted area. A blocked submission is staged in a single slot until the
//! operator confirms (resubmit with the bypass flag) or dismisses it.
//!
//! Blocking is detected from the backend's message text, so a change in the
//! backend's wording silently turns a bypass prompt into a hard failure.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::backend::DispatchBackend;
use crate::error::{ConsoleError, ConsoleResult};
use crate::models::{BypassConfirmation, DispatchResponse, EmergencyRequest, LatLng, Task, TaskId};

pub const AUTO_BYPASS_LEVEL: i64 = 5;
pub const UNKNOWN_AREA: &str = "Unknown restricted area";
const BLOCKED_MARKER: &str = "restricted area";

static AREA_NAME: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"restricted area[:\s]*([^，。\s]+)").expect("valid area name pattern"));

/// First token after "restricted area" in a rejection message.
pub fn extract_area_name(message: &str) -> String {
  AREA_NAME
    .captures(message)
    .and_then(|c| c.get(1))
    .map(|m| m.as_str().to_string())
    .unwrap_or_else(|| UNKNOWN_AREA.to_string())
}

pub fn is_restricted_area_rejection(message: &str) -> bool {
  message.contains(BLOCKED_MARKER)
}

/// Applies the automatic override for level 5 and above.
pub fn prepare_request(mut request: EmergencyRequest) -> ConsoleResult<EmergencyRequest> {
  let level = request
    .emergency_tasks
    .first()
    .ok_or_else(|| ConsoleError::Validation("emergencyTasks must contain a task".into()))?
    .emergency_level
    .unwrap_or(0);
  if level >= AUTO_BYPASS_LEVEL {
    info!("Emergency level {} or above, automatically bypassing restricted areas", AUTO_BYPASS_LEVEL);
    request.bypass_restricted_areas = Some(true);
  }
  Ok(request)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationMarker {
  pub task_id: TaskId,
  pub position: LatLng,
  pub bypassed_restricted_area: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BypassPrompt {
  pub task_id: TaskId,
  pub area_name: String,
  pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum EmergencyOutcome {
  Assigned { marker: DestinationMarker, message: String },
  AwaitingConfirmation { prompt: BypassPrompt },
}

#[derive(Debug, Clone)]
struct StagedRequest {
  request: EmergencyRequest,
  prompt: BypassPrompt,
}

/// The one-slot state behind the workflow.
#[derive(Debug, Default)]
pub struct BypassSlot {
  staged: Option<StagedRequest>,
  confirming: Option<TaskId>,
  /// Submissions waiting on the backend.
  in_flight: HashSet<TaskId>,
  /// In-flight submissions whose task was deleted; they must not be staged.
  withdrawn: HashSet<TaskId>,
}

/// A finished confirmation round trip and the task it was for.
#[derive(Debug)]
pub struct ConfirmedBypass {
  pub task_id: TaskId,
  pub outcome: ConsoleResult<EmergencyOutcome>,
}

fn first_task(request: &EmergencyRequest) -> ConsoleResult<&Task> {
  request
    .emergency_tasks
    .first()
    .ok_or_else(|| ConsoleError::Validation("emergencyTasks must contain a task".into()))
}

fn marker_for(request: &EmergencyRequest, bypassed: bool) -> ConsoleResult<DestinationMarker> {
  let task = first_task(request)?;
  Ok(DestinationMarker { task_id: task.id, position: task.delivery, bypassed_restricted_area: bypassed })
}

impl BypassSlot {
  pub fn pending(&self) -> Option<&BypassPrompt> {
    self.staged.as_ref().map(|s| &s.prompt)
  }

  pub fn is_occupied(&self) -> bool {
    self.staged.is_some() || self.confirming.is_some()
  }

  pub fn begin_submit(&mut self, task_id: TaskId) {
    self.in_flight.insert(task_id);
  }

  /// The submission never got an answer.
  pub fn abandon_submit(&mut self, task_id: TaskId) {
    self.in_flight.remove(&task_id);
    self.withdrawn.remove(&task_id);
  }

  /// Interprets the backend's answer to a submission.
  pub fn on_dispatch_response(
    &mut self,
    request: EmergencyRequest,
    response: DispatchResponse,
  ) -> ConsoleResult<EmergencyOutcome> {
    let task_id = first_task(&request)?.id;
    self.in_flight.remove(&task_id);
    let withdrawn = self.withdrawn.remove(&task_id);
    if response.success {
      let marker = marker_for(&request, false)?;
      return Ok(EmergencyOutcome::Assigned { marker, message: response.message });
    }
    if !is_restricted_area_rejection(&response.message) {
      return Err(ConsoleError::Rejected(response.message));
    }
    if withdrawn {
      info!("Not staging bypass for task {}: it was deleted while its dispatch was in flight", task_id);
      return Err(ConsoleError::TaskDeleted(task_id));
    }
    if let Some(existing) = self.staged.as_ref().map(|s| s.prompt.task_id).or(self.confirming) {
      warn!("Task {} blocked by a restricted area while task {} awaits confirmation", task_id, existing);
      return Err(ConsoleError::BypassAlreadyPending(existing));
    }
    let prompt = BypassPrompt { task_id, area_name: extract_area_name(&response.message), message: response.message };
    self.staged = Some(StagedRequest { request, prompt: prompt.clone() });
    Ok(EmergencyOutcome::AwaitingConfirmation { prompt })
  }

  /// Moves the staged request into flight and builds the confirmation body.
  pub fn begin_confirm(&mut self) -> ConsoleResult<BypassConfirmation> {
    let StagedRequest { mut request, prompt } = self.staged.take().ok_or(ConsoleError::NoPendingBypass)?;
    request.bypass_restricted_areas = Some(true);
    self.confirming = Some(prompt.task_id);
    Ok(BypassConfirmation {
      task_id: prompt.task_id,
      confirmed: true,
      restricted_area_name: prompt.area_name,
      original_request: request,
    })
  }

  /// Always frees the slot, whatever the outcome.
  pub fn finish_confirm(
    &mut self,
    confirmation: &BypassConfirmation,
    result: ConsoleResult<DispatchResponse>,
  ) -> ConsoleResult<EmergencyOutcome> {
    self.confirming = None;
    let response = result?;
    if !response.success {
      return Err(ConsoleError::Rejected(response.message));
    }
    let marker = marker_for(&confirmation.original_request, true)?;
    Ok(EmergencyOutcome::Assigned { marker, message: response.message })
  }

  pub fn dismiss(&mut self) -> Option<BypassPrompt> {
    self.staged.take().map(|s| s.prompt)
  }

  /// Drops the staged request if it belongs to `task_id`, or marks a
  /// submission still in flight for it so its answer is never staged.
  pub fn discard_for_task(&mut self, task_id: TaskId) -> bool {
    if self.staged.as_ref().is_some_and(|s| s.prompt.task_id == task_id) {
      self.staged = None;
      return true;
    }
    if self.in_flight.contains(&task_id) {
      self.withdrawn.insert(task_id);
      return true;
    }
    false
  }

  /// Drops the staged request and withdraws every in-flight submission.
  pub fn withdraw_all(&mut self) -> Option<BypassPrompt> {
    self.withdrawn.extend(self.in_flight.iter().copied());
    self.dismiss()
  }
}

pub struct EmergencyBypassWorkflow {
  backend: Arc<dyn DispatchBackend>,
  slot: Mutex<BypassSlot>,
}

impl EmergencyBypassWorkflow {
  pub fn new(backend: Arc<dyn DispatchBackend>) -> Self {
    Self { backend, slot: Mutex::new(BypassSlot::default()) }
  }

  pub async fn submit(&self, task: Task) -> ConsoleResult<EmergencyOutcome> {
    self.submit_request(EmergencyRequest::single(task)).await
  }

  pub async fn submit_request(&self, request: EmergencyRequest) -> ConsoleResult<EmergencyOutcome> {
    let request = prepare_request(request)?;
    let task_id = first_task(&request)?.id;
    self.slot.lock().await.begin_submit(task_id);
    let response = match self.backend.dispatch_emergency(&request).await {
      Ok(response) => response,
      Err(e) => {
        self.slot.lock().await.abandon_submit(task_id);
        warn!("Emergency task {} could not be sent: {}", task_id, e);
        return Err(e);
      }
    };
    let outcome = self.slot.lock().await.on_dispatch_response(request, response);
    match &outcome {
      Ok(EmergencyOutcome::Assigned { marker, .. }) => info!("Emergency task {} assigned", marker.task_id),
      Ok(EmergencyOutcome::AwaitingConfirmation { prompt }) => {
        info!("Emergency task {} blocked by restricted area {}", prompt.task_id, prompt.area_name)
      }
      Err(e) => warn!("Emergency task assignment failed: {}", e),
    }
    outcome
  }

  /// Resubmits the staged request with the bypass flag set. Fails only when
  /// nothing is staged; the round trip's own result is in `outcome`.
  pub async fn confirm(&self) -> ConsoleResult<ConfirmedBypass> {
    let confirmation = self.slot.lock().await.begin_confirm()?;
    let result = self.backend.confirm_bypass(&confirmation).await;
    if let Err(e) = &result {
      warn!("Failed to confirm restricted area bypass: {}", e);
    }
    let outcome = self.slot.lock().await.finish_confirm(&confirmation, result);
    Ok(ConfirmedBypass { task_id: confirmation.task_id, outcome })
  }

  pub async fn dismiss(&self) -> Option<BypassPrompt> {
    self.slot.lock().await.dismiss()
  }

  pub async fn discard_for_task(&self, task_id: TaskId) -> bool {
    self.slot.lock().await.discard_for_task(task_id)
  }

  pub async fn withdraw_all(&self) -> Option<BypassPrompt> {
    self.slot.lock().await.withdraw_all()
  }

  pub async fn pending(&self) -> Option<BypassPrompt> {
    self.slot.lock().await.pending().cloned()
  }
}
