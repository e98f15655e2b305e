use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{ConsoleError, ConsoleResult};
use crate::models::{
  BypassConfirmation, DispatchResponse, DroneState, EmergencyRequest, NewRestrictedArea, RestrictedArea, Task,
};

const SIMULATION_STATE: &str = "/api/dispatch/simulation-state";
const SIMULATE: &str = "/api/dispatch/simulate";
const STOP: &str = "/api/dispatch/stop";
const STATUS: &str = "/api/dispatch/status";
const EMERGENCY: &str = "/api/dispatch/emergency";
const CONFIRM_BYPASS: &str = "/api/dispatch/emergency/confirm-bypass";
const RESTRICTED_AREAS: &str = "/api/dispatch/restricted-areas";

/// The remote dispatch service.
pub trait DispatchBackend: Send + Sync {
  fn simulation_state(&self) -> BoxFuture<'_, ConsoleResult<bool>>;
  fn simulate<'a>(&'a self, tasks: &'a [Task]) -> BoxFuture<'a, ConsoleResult<()>>;
  fn stop(&self) -> BoxFuture<'_, ConsoleResult<()>>;
  fn fleet_status(&self) -> BoxFuture<'_, ConsoleResult<Vec<DroneState>>>;
  fn dispatch_emergency<'a>(&'a self, request: &'a EmergencyRequest) -> BoxFuture<'a, ConsoleResult<DispatchResponse>>;
  fn confirm_bypass<'a>(&'a self, confirmation: &'a BypassConfirmation) -> BoxFuture<'a, ConsoleResult<DispatchResponse>>;
  fn create_area<'a>(&'a self, area: &'a NewRestrictedArea) -> BoxFuture<'a, ConsoleResult<RestrictedArea>>;
  fn restricted_areas(&self) -> BoxFuture<'_, ConsoleResult<Vec<RestrictedArea>>>;
  fn delete_area_by_name<'a>(&'a self, name: &'a str) -> BoxFuture<'a, ConsoleResult<()>>;
  fn clear_areas(&self) -> BoxFuture<'_, ConsoleResult<()>>;
}

pub struct HttpBackend {
  client: Client,
  base_url: Url,
}

impl HttpBackend {
  /// No request timeout is configured: a hung call simply never resolves.
  pub fn new(base_url: &str) -> ConsoleResult<Self> {
    let base_url = Url::parse(base_url).map_err(|e| ConsoleError::Validation(format!("backend url: {}", e)))?;
    Ok(Self { client: Client::new(), base_url })
  }

  fn url(&self, path: &str) -> Url {
    let mut url = self.base_url.clone();
    url.set_path(path);
    url
  }
}

/// Fails on non-2xx with the status and body text.
async fn ensure_ok(response: Response) -> ConsoleResult<Response> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }
  let text = response.text().await.unwrap_or_default();
  Err(ConsoleError::Transport(format!("HTTP {}: {}", status.as_u16(), text)))
}

async fn json_body<T: DeserializeOwned>(response: Response) -> ConsoleResult<T> {
  response
    .json::<T>()
    .await
    .map_err(|e| ConsoleError::Transport(format!("invalid response body: {}", e)))
}

/// Dispatch endpoints answer `{success, message}` even on 4xx/5xx.
async fn dispatch_result(response: Response) -> ConsoleResult<DispatchResponse> {
  let status = response.status();
  debug!("dispatch response status {}", status);
  json_body(response).await
}

impl DispatchBackend for HttpBackend {
  fn simulation_state(&self) -> BoxFuture<'_, ConsoleResult<bool>> {
    async move {
      let response = ensure_ok(self.client.get(self.url(SIMULATION_STATE)).send().await?).await?;
      let state: Value = json_body(response).await?;
      Ok(matches!(state, Value::Bool(true)) || state.as_str() == Some("true"))
    }
    .boxed()
  }

  fn simulate<'a>(&'a self, tasks: &'a [Task]) -> BoxFuture<'a, ConsoleResult<()>> {
    async move {
      ensure_ok(self.client.post(self.url(SIMULATE)).json(tasks).send().await?).await?;
      Ok(())
    }
    .boxed()
  }

  fn stop(&self) -> BoxFuture<'_, ConsoleResult<()>> {
    async move {
      ensure_ok(self.client.post(self.url(STOP)).send().await?).await?;
      Ok(())
    }
    .boxed()
  }

  fn fleet_status(&self) -> BoxFuture<'_, ConsoleResult<Vec<DroneState>>> {
    async move {
      let response = ensure_ok(self.client.get(self.url(STATUS)).send().await?).await?;
      json_body(response).await
    }
    .boxed()
  }

  fn dispatch_emergency<'a>(&'a self, request: &'a EmergencyRequest) -> BoxFuture<'a, ConsoleResult<DispatchResponse>> {
    async move { dispatch_result(self.client.post(self.url(EMERGENCY)).json(request).send().await?).await }.boxed()
  }

  fn confirm_bypass<'a>(&'a self, confirmation: &'a BypassConfirmation) -> BoxFuture<'a, ConsoleResult<DispatchResponse>> {
    async move { dispatch_result(self.client.post(self.url(CONFIRM_BYPASS)).json(confirmation).send().await?).await }
      .boxed()
  }

  fn create_area<'a>(&'a self, area: &'a NewRestrictedArea) -> BoxFuture<'a, ConsoleResult<RestrictedArea>> {
    async move {
      let response = ensure_ok(self.client.post(self.url(RESTRICTED_AREAS)).json(area).send().await?).await?;
      json_body(response).await
    }
    .boxed()
  }

  fn restricted_areas(&self) -> BoxFuture<'_, ConsoleResult<Vec<RestrictedArea>>> {
    async move {
      let response = ensure_ok(self.client.get(self.url(RESTRICTED_AREAS)).send().await?).await?;
      json_body(response).await
    }
    .boxed()
  }

  fn delete_area_by_name<'a>(&'a self, name: &'a str) -> BoxFuture<'a, ConsoleResult<()>> {
    async move {
      let mut url = self.url(RESTRICTED_AREAS);
      url
        .path_segments_mut()
        .map_err(|_| ConsoleError::Validation("backend url cannot carry a path".into()))?
        .push("by-name")
        .push(name);
      ensure_ok(self.client.delete(url).send().await?).await?;
      Ok(())
    }
    .boxed()
  }

  fn clear_areas(&self) -> BoxFuture<'_, ConsoleResult<()>> {
    async move {
      ensure_ok(self.client.delete(self.url(RESTRICTED_AREAS)).send().await?).await?;
      Ok(())
    }
    .boxed()
  }
}
