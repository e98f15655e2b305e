use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{DroneState, LatLng};

pub const EARTH_RADIUS_KM: f64 = 6371.0;
pub const RETURNED_THRESHOLD_KM: f64 = 0.1;

const PATH_COLORS: [&str; 6] = ["#3498db", "#e74c3c", "#2ecc71", "#f39c12", "#9b59b6", "#1abc9c"];

/// Great-circle distance in kilometres.
pub fn haversine_km(a: LatLng, b: LatLng) -> f64 {
  let d_lat = (b.lat - a.lat).to_radians();
  let d_lng = (b.lng - a.lng).to_radians();
  let h = (d_lat / 2.0).sin().powi(2) + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
  2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathSummary {
  pub drone_id: String,
  pub current: LatLng,
  pub points: usize,
  pub distance_to_service_point_km: f64,
  pub returned: bool,
}

/// A drone path with enough points to draw as a line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathLine {
  pub drone_id: String,
  pub color: &'static str,
  pub points: Vec<LatLng>,
}

pub struct PathReconstructor {
  service_point: LatLng,
  paths: BTreeMap<String, Vec<LatLng>>,
  visible: bool,
}

impl PathReconstructor {
  pub fn new(service_point: LatLng) -> Self {
    Self { service_point, paths: BTreeMap::new(), visible: true }
  }

  /// Appends unless the position equals the path's last point.
  pub fn append_if_new(&mut self, drone_id: &str, position: LatLng) -> bool {
    let path = self.paths.entry(drone_id.to_string()).or_default();
    if path.last() == Some(&position) {
      return false;
    }
    path.push(position);
    true
  }

  /// Feeds one poll's positions; returns how many paths grew.
  pub fn ingest(&mut self, drones: &[DroneState]) -> usize {
    drones
      .iter()
      .filter(|d| self.append_if_new(&d.drone_id, d.current_position))
      .count()
  }

  pub fn path(&self, drone_id: &str) -> &[LatLng] {
    self.paths.get(drone_id).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn summary(&self, drone_id: &str) -> Option<PathSummary> {
    let path = self.paths.get(drone_id)?;
    let current = *path.last()?;
    let distance = haversine_km(current, self.service_point);
    Some(PathSummary {
      drone_id: drone_id.to_string(),
      current,
      points: path.len(),
      distance_to_service_point_km: distance,
      returned: distance < RETURNED_THRESHOLD_KM,
    })
  }

  pub fn summaries(&self) -> Vec<PathSummary> {
    self.paths.keys().filter_map(|id| self.summary(id)).collect()
  }

  pub fn lines(&self) -> Vec<PathLine> {
    if !self.visible {
      return vec![];
    }
    self
      .paths
      .iter()
      .filter(|(_, points)| points.len() > 1)
      .map(|(id, points)| PathLine { drone_id: id.clone(), color: path_color(id), points: points.clone() })
      .collect()
  }

  pub fn set_visible(&mut self, visible: bool) {
    self.visible = visible;
  }

  pub fn toggle_visible(&mut self) -> bool {
    self.visible = !self.visible;
    self.visible
  }

  pub fn is_visible(&self) -> bool {
    self.visible
  }

  pub fn clear(&mut self) {
    self.paths.clear();
  }
}

/// Non-numeric ids fall back to the first colour.
fn path_color(drone_id: &str) -> &'static str {
  let index = drone_id.trim().parse::<usize>().unwrap_or(0) % PATH_COLORS.len();
  PATH_COLORS[index]
}
