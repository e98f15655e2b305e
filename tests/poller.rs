mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{drone, FakeBackend};
use fleet_console::poller::{FleetObserver, FleetUpdate, StatusPoller};
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::Mutex;

#[derive(Default)]
struct Recorder {
  updates: AtomicUsize,
  ticks: Mutex<Vec<u64>>,
}

impl FleetObserver for Recorder {
  fn on_fleet_status(&self, update: FleetUpdate) -> BoxFuture<'_, ()> {
    async move {
      self.updates.fetch_add(1, Ordering::SeqCst);
      self.ticks.lock().await.push(update.tick);
    }
    .boxed()
  }
}

#[tokio::test]
async fn second_start_keeps_a_single_timer() {
  let backend = FakeBackend::new();
  backend.set_drones(vec![drone("1", "MOVING", 1, 0, 1)]);
  let recorder = Arc::new(Recorder::default());
  let poller = StatusPoller::new(backend.clone(), recorder.clone(), Duration::from_millis(50));

  assert!(poller.start().await);
  assert!(!poller.start().await);
  assert!(poller.is_running().await);

  tokio::time::sleep(Duration::from_millis(230)).await;
  assert!(poller.stop().await);
  assert!(!poller.is_running().await);

  let calls = backend.status_calls.load(Ordering::SeqCst);
  assert!((2..=7).contains(&calls), "unexpected poll count {}", calls);

  let ticks = recorder.ticks.lock().await.clone();
  let mut sorted = ticks.clone();
  sorted.sort();
  sorted.dedup();
  assert_eq!(sorted.len(), ticks.len());

  tokio::time::sleep(Duration::from_millis(150)).await;
  assert_eq!(backend.status_calls.load(Ordering::SeqCst), calls);
  assert!(!poller.stop().await);
}

#[tokio::test]
async fn stop_cancels_a_fetch_in_flight() {
  let backend = FakeBackend::new();
  let recorder = Arc::new(Recorder::default());
  let poller = StatusPoller::new(backend.clone(), recorder.clone(), Duration::from_secs(60));

  let release = backend.status_gate.arm();
  poller.start().await;
  backend.status_gate.entered.notified().await;
  poller.stop().await;
  let _ = release.send(());

  tokio::time::sleep(Duration::from_millis(50)).await;
  assert_eq!(recorder.updates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn ticks_keep_increasing_across_restarts() {
  let backend = FakeBackend::new();
  let recorder = Arc::new(Recorder::default());
  let poller = StatusPoller::new(backend.clone(), recorder.clone(), Duration::from_secs(60));

  poller.start().await;
  tokio::time::sleep(Duration::from_millis(30)).await;
  poller.stop().await;
  let manual = poller.next_tick();
  poller.start().await;
  tokio::time::sleep(Duration::from_millis(30)).await;
  poller.stop().await;

  let ticks = recorder.ticks.lock().await.clone();
  assert_eq!(ticks.len(), 2);
  assert!(ticks[0] < manual && manual < ticks[1]);
}
