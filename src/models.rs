use serde::{Deserialize, Serialize};
use serde_json::Value;
use chrono::Local;

pub type TaskId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
  pub lat: f64,
  pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirements {
  pub capacity: f64,
  pub max_cost: f64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cooling: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub heating: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
  pub id: TaskId,
  pub date: String,
  pub time: String,
  pub delivery: LatLng,
  pub requirements: Requirements,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub emergency_level: Option<i64>,
}

impl Task {
  /// Normal task stamped with the current local date and time.
  pub fn normal(id: TaskId, delivery: LatLng, capacity: f64) -> Self {
    let (date, time) = now_date_time();
    Self {
      id,
      date,
      time,
      delivery,
      requirements: Requirements { capacity, max_cost: 35.0, cooling: Some(false), heating: Some(false) },
      emergency_level: None,
    }
  }

  pub fn emergency(id: TaskId, level: i64, delivery: LatLng, capacity: f64) -> Self {
    let (date, time) = now_date_time();
    Self {
      id,
      date,
      time,
      delivery,
      requirements: Requirements { capacity, max_cost: 200.0, cooling: None, heating: None },
      emergency_level: Some(level),
    }
  }

  pub fn is_emergency(&self) -> bool {
    self.emergency_level.is_some()
  }

  /// Parses one imported task. `id`, `delivery` and `requirements` are
  /// mandatory; a missing `date`/`time` is filled with the current time.
  pub fn from_import(mut value: Value) -> Result<Self, String> {
    let obj = value.as_object_mut().ok_or("task must be a JSON object")?;
    let has_id = obj.get("id").and_then(Value::as_i64).is_some_and(|id| id != 0);
    if !has_id || !obj.contains_key("delivery") || !obj.contains_key("requirements") {
      return Err("missing required fields (id, delivery, requirements)".into());
    }
    let (date, time) = now_date_time();
    obj.entry("date").or_insert(Value::String(date));
    obj.entry("time").or_insert(Value::String(time));
    serde_json::from_value(value).map_err(|e| e.to_string())
  }
}

fn now_date_time() -> (String, String) {
  let now = Local::now();
  (now.format("%Y-%m-%d").to_string(), now.format("%H:%M").to_string())
}

/// Parses a `lng,lat` pair as typed into the task forms.
pub fn parse_location(input: &str) -> Result<LatLng, String> {
  let mut parts = input.split(',').map(str::trim);
  let (Some(lng), Some(lat), None) = (parts.next(), parts.next(), parts.next()) else {
    return Err(format!("Location must be 'lng,lat': {}", input.trim()));
  };
  match (lng.parse::<f64>(), lat.parse::<f64>()) {
    (Ok(lng), Ok(lat)) => Ok(LatLng { lat, lng }),
    _ => Err(format!("Location values must be numbers: {}", input.trim())),
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
  Pending,
  Assigned,
  Completed,
  Delivered,
}

impl TaskStatus {
  /// Unknown labels display as pending.
  pub fn from_label(label: &str) -> Self {
    match label {
      "assigned" => TaskStatus::Assigned,
      "completed" => TaskStatus::Completed,
      "delivered" => TaskStatus::Delivered,
      _ => TaskStatus::Pending,
    }
  }

  pub fn display(&self) -> &'static str {
    match self {
      TaskStatus::Pending => "Pending",
      TaskStatus::Assigned => "Assigned",
      TaskStatus::Completed => "Completed",
      TaskStatus::Delivered => "Delivered",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DroneStatus {
  Moving,
  Completed,
  Other(String),
}

impl From<String> for DroneStatus {
  fn from(s: String) -> Self {
    match s.as_str() {
      "MOVING" => DroneStatus::Moving,
      "COMPLETED" => DroneStatus::Completed,
      _ => DroneStatus::Other(s),
    }
  }
}

impl From<DroneStatus> for String {
  fn from(s: DroneStatus) -> Self {
    match s {
      DroneStatus::Moving => "MOVING".into(),
      DroneStatus::Completed => "COMPLETED".into(),
      DroneStatus::Other(s) => s,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DroneState {
  pub drone_id: String,
  pub status: DroneStatus,
  pub current_position: LatLng,
  #[serde(default)]
  pub current_task_id: Option<TaskId>,
  #[serde(default)]
  pub completed_tasks_count: u32,
  #[serde(default)]
  pub total_tasks: u32,
  #[serde(default)]
  pub processing_emergency: bool,
  #[serde(default)]
  pub current_emergency_task_id: Option<TaskId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyRequest {
  pub emergency_tasks: Vec<Task>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bypass_restricted_areas: Option<bool>,
}

impl EmergencyRequest {
  pub fn single(task: Task) -> Self {
    Self { emergency_tasks: vec![task], bypass_restricted_areas: None }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResponse {
  pub success: bool,
  #[serde(default)]
  pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BypassConfirmation {
  pub task_id: TaskId,
  pub confirmed: bool,
  pub restricted_area_name: String,
  pub original_request: EmergencyRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestrictedArea {
  pub id: i64,
  pub name: String,
  pub vertices: Vec<LatLng>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRestrictedArea {
  pub name: String,
  pub vertices: Vec<LatLng>,
}

pub fn predefined_normal_tasks() -> Vec<Task> {
  let task = |id: TaskId, time: &str, lng: f64, lat: f64, capacity: f64, cooling: bool, max_cost: f64| Task {
    id,
    date: "2025-11-13".into(),
    time: time.into(),
    delivery: LatLng { lat, lng },
    requirements: Requirements { capacity, max_cost, cooling: Some(cooling), heating: Some(!cooling) },
    emergency_level: None,
  };
  vec![
    task(1001, "09:30", -3.188, 55.946, 3.5, true, 25.0),
    task(1002, "10:15", -3.192, 55.943, 7.0, false, 30.0),
    task(1003, "11:00", -3.175, 55.982, 6.5, false, 40.0),
  ]
}

pub fn predefined_emergency_request() -> EmergencyRequest {
  EmergencyRequest::single(Task {
    id: 2001,
    date: "2025-11-13".into(),
    time: "12:00".into(),
    delivery: LatLng { lat: 55.944, lng: -3.187 },
    requirements: Requirements { capacity: 5.0, max_cost: 200.0, cooling: None, heating: None },
    emergency_level: Some(1),
  })
}
