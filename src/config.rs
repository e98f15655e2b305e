use std::env;
use std::time::Duration;

use crate::models::LatLng;

pub const DEFAULT_SERVICE_POINT: LatLng = LatLng { lat: 55.9533, lng: -3.1883 };

#[derive(Debug, Clone)]
pub struct Config {
  pub backend_url: String,
  pub database_url: String,
  pub server_port: u16,
  pub poll_interval: Duration,
  pub service_point: LatLng,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      backend_url: "http://localhost:8080".into(),
      database_url: "sqlite://fleet_console.db?mode=rwc".into(),
      server_port: 3030,
      poll_interval: Duration::from_millis(1000),
      service_point: DEFAULT_SERVICE_POINT,
    }
  }
}

impl Config {
  pub fn from_env() -> Self {
    let defaults = Self::default();
    Self {
      backend_url: env::var("BACKEND_URL")
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or(defaults.backend_url),
      database_url: env::var("CONSOLE_DATABASE_URL").unwrap_or(defaults.database_url),
      server_port: parsed("CONSOLE_PORT").unwrap_or(defaults.server_port),
      poll_interval: parsed("POLL_INTERVAL_MS")
        .filter(|ms: &u64| *ms > 0)
        .map(Duration::from_millis)
        .unwrap_or(defaults.poll_interval),
      service_point: LatLng {
        lat: parsed("SERVICE_POINT_LAT").unwrap_or(defaults.service_point.lat),
        lng: parsed("SERVICE_POINT_LNG").unwrap_or(defaults.service_point.lng),
      },
    }
  }
}

/// Address of a running console service, used by the dashboard.
pub fn console_url_from_env() -> String {
  env::var("CONSOLE_URL")
    .map(|url| url.trim_end_matches('/').to_string())
    .unwrap_or_else(|_| "http://localhost:3030".into())
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
  env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
