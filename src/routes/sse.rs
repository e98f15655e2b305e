use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use tokio_stream::{wrappers::IntervalStream, StreamExt};
use tracing::warn;
use warp::{Filter, Rejection, Reply};

use super::with_console;
use crate::console::Console;

const SNAPSHOT_PERIOD: Duration = Duration::from_secs(1);

/// Streams a console snapshot every second.
pub fn sse_route(console: Arc<Console>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
  warp::path!("sse")
    .and(warp::get())
    .and(with_console(console))
    .and_then(handle_sse)
}

async fn handle_sse(console: Arc<Console>) -> Result<impl Reply, Rejection> {
  let interval = IntervalStream::new(tokio::time::interval(SNAPSHOT_PERIOD));
  let stream = interval
    .then(move |_| {
      let console = console.clone();
      async move {
        match console.snapshot().await {
          Ok(snapshot) => match warp::sse::Event::default().event("snapshot").json_data(&snapshot) {
            Ok(event) => Some(Ok::<_, Infallible>(event)),
            Err(e) => {
              warn!("Failed to encode snapshot: {:?}", e);
              None
            }
          },
          Err(e) => {
            warn!("Error building snapshot: {}", e);
            None
          }
        }
      }
    })
    .filter_map(|x| x);

  Ok(warp::sse::reply(warp::sse::keep_alive().stream(stream)))
}
