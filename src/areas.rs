use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::backend::DispatchBackend;
use crate::error::{ConsoleError, ConsoleResult};
use crate::models::{LatLng, NewRestrictedArea, RestrictedArea};

pub const MIN_VERTICES: usize = 3;

/// Geometry as it arrives from one of the three creation modes.
#[derive(Debug, Clone)]
pub enum AreaInput {
  /// Vertices of a polygon completed on the map.
  Drawn { name: Option<String>, vertices: Vec<LatLng> },
  /// Line-delimited `lng,lat` pairs.
  Coordinates { name: Option<String>, text: String },
  /// `{"name": ..., "vertices": [{"lat": .., "lng": ..}, ...]}`
  Document { json: String },
}

impl AreaInput {
  pub fn validate(self) -> ConsoleResult<NewRestrictedArea> {
    match self {
      AreaInput::Drawn { name, vertices } => {
        ensure_vertex_count(vertices.len())?;
        Ok(NewRestrictedArea { name: name_or_default(name), vertices })
      }
      AreaInput::Coordinates { name, text } => {
        Ok(NewRestrictedArea { name: name_or_default(name), vertices: parse_coordinates(&text)? })
      }
      AreaInput::Document { json } => parse_document(&json),
    }
  }
}

pub fn default_area_name() -> String {
  format!("Restricted_Area_{}", Utc::now().timestamp_millis())
}

fn name_or_default(name: Option<String>) -> String {
  name
    .map(|n| n.trim().to_string())
    .filter(|n| !n.is_empty())
    .unwrap_or_else(default_area_name)
}

fn ensure_vertex_count(count: usize) -> ConsoleResult<()> {
  if count < MIN_VERTICES {
    return Err(ConsoleError::Validation(format!(
      "At least {} vertices are required to create a polygon",
      MIN_VERTICES
    )));
  }
  Ok(())
}

fn finite(v: f64) -> Option<f64> {
  v.is_finite().then_some(v)
}

/// Longitude comes first on every line; blank lines are skipped.
pub fn parse_coordinates(text: &str) -> ConsoleResult<Vec<LatLng>> {
  if text.trim().is_empty() {
    return Err(ConsoleError::Validation("Please enter coordinate data".into()));
  }
  let mut vertices = vec![];
  for (index, line) in text.lines().enumerate() {
    let line = line.trim();
    if line.is_empty() {
      continue;
    }
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() != 2 {
      return Err(ConsoleError::Validation(format!("line {}: coordinate format error: {}", index + 1, line)));
    }
    let lng = parts[0].trim().parse::<f64>().ok().and_then(finite);
    let lat = parts[1].trim().parse::<f64>().ok().and_then(finite);
    let (Some(lng), Some(lat)) = (lng, lat) else {
      return Err(ConsoleError::Validation(format!("line {}: coordinate value error: {}", index + 1, line)));
    };
    vertices.push(LatLng { lat, lng });
  }
  ensure_vertex_count(vertices.len())?;
  Ok(vertices)
}

pub fn parse_document(json: &str) -> ConsoleResult<NewRestrictedArea> {
  if json.trim().is_empty() {
    return Err(ConsoleError::Validation("Please enter JSON data".into()));
  }
  let doc: Value = serde_json::from_str(json).map_err(|e| ConsoleError::Validation(format!("JSON parsing error: {}", e)))?;
  let name = doc.get("name").and_then(Value::as_str).filter(|n| !n.is_empty());
  let vertices = doc.get("vertices").and_then(Value::as_array);
  let (Some(name), Some(vertices)) = (name, vertices) else {
    return Err(ConsoleError::Validation("JSON format error: must contain name and vertices array".into()));
  };
  ensure_vertex_count(vertices.len())?;
  let vertices = vertices
    .iter()
    .enumerate()
    .map(|(index, vertex)| {
      let lat = vertex.get("lat").and_then(Value::as_f64);
      let lng = vertex.get("lng").and_then(Value::as_f64);
      match (lat, lng) {
        (Some(lat), Some(lng)) => Ok(LatLng { lat, lng }),
        _ => Err(ConsoleError::Validation(format!(
          "Vertex {} format error: must contain lng and lat numbers",
          index
        ))),
      }
    })
    .collect::<ConsoleResult<Vec<_>>>()?;
  Ok(NewRestrictedArea { name: name.to_string(), vertices })
}

#[derive(Default)]
struct AreaCache {
  areas: BTreeMap<i64, RestrictedArea>,
  /// Bumped by every reload start and every completed mutation.
  issued: u64,
  hidden: bool,
}

/// Local mirror of the backend's restricted areas.
pub struct RestrictedAreaRegistry {
  backend: Arc<dyn DispatchBackend>,
  cache: Mutex<AreaCache>,
}

impl RestrictedAreaRegistry {
  pub fn new(backend: Arc<dyn DispatchBackend>) -> Self {
    Self { backend, cache: Mutex::new(AreaCache::default()) }
  }

  /// Replaces the cache with the backend's set. Returns `false` when a newer
  /// reload or mutation was issued while this one was in flight; its result is
  /// then discarded.
  pub async fn reload_from_backend(&self) -> ConsoleResult<bool> {
    let seq = {
      let mut cache = self.cache.lock().await;
      cache.issued += 1;
      cache.issued
    };
    let areas = self.backend.restricted_areas().await?;
    let mut cache = self.cache.lock().await;
    if cache.issued != seq {
      debug!("Discarding stale restricted area reload {}", seq);
      return Ok(false);
    }
    cache.areas = areas.into_iter().map(|a| (a.id, a)).collect();
    info!("Loaded {} restricted areas from backend", cache.areas.len());
    Ok(true)
  }

  pub async fn create(&self, input: AreaInput) -> ConsoleResult<RestrictedArea> {
    let area = input.validate()?;
    let saved = self.backend.create_area(&area).await?;
    info!("Restricted area \"{}\" saved to backend", saved.name);
    {
      let mut cache = self.cache.lock().await;
      cache.issued += 1;
      cache.areas.insert(saved.id, saved.clone());
    }
    self.reload_after_mutation().await;
    Ok(saved)
  }

  /// The remote delete is addressed by the cached record's name.
  pub async fn delete(&self, id: i64) -> ConsoleResult<RestrictedArea> {
    let area = self.cache.lock().await.areas.get(&id).cloned().ok_or(ConsoleError::UnknownArea(id))?;
    self.backend.delete_area_by_name(&area.name).await?;
    {
      let mut cache = self.cache.lock().await;
      cache.issued += 1;
      cache.areas.remove(&id);
    }
    info!("Restricted area \"{}\" deleted", area.name);
    self.reload_after_mutation().await;
    Ok(area)
  }

  pub async fn clear(&self) -> ConsoleResult<()> {
    self.backend.clear_areas().await?;
    {
      let mut cache = self.cache.lock().await;
      cache.issued += 1;
      cache.areas.clear();
    }
    info!("All restricted areas cleared");
    self.reload_after_mutation().await;
    Ok(())
  }

  async fn reload_after_mutation(&self) {
    if let Err(e) = self.reload_from_backend().await {
      warn!("Failed to load restricted areas: {}", e);
    }
  }

  pub async fn list(&self) -> Vec<RestrictedArea> {
    self.cache.lock().await.areas.values().cloned().collect()
  }

  pub async fn get(&self, id: i64) -> Option<RestrictedArea> {
    self.cache.lock().await.areas.get(&id).cloned()
  }

  pub async fn toggle_visible(&self) -> bool {
    let mut cache = self.cache.lock().await;
    cache.hidden = !cache.hidden;
    !cache.hidden
  }

  pub async fn is_visible(&self) -> bool {
    !self.cache.lock().await.hidden
  }
}
