// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#![allow(clippy::unwrap_used)]

use super::{FlushPolicy, FlushReason, FlushRequest, FlushScheduler};
use crate::completion::completion;
use crate::log_buffer::{BufferStats, LogBuffer};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tb_envelope::JsonEnvelopeSerializer;
use tb_test_helpers::{RecordingTransport, TEST_EPOCH, bodies, numbered_records};
use tb_time::TestTimeProvider;
use tb_time::test::TestTicker;
use time::ext::NumericalDuration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

const POLICY: FlushPolicy = FlushPolicy {
  max_batch_count: 5,
  max_batch_bytes: 1024 * 1024,
  max_latency: time::Duration::seconds(5),
};

struct Setup {
  buffer: Arc<LogBuffer>,
  transport: Arc<RecordingTransport>,
  time_provider: TestTimeProvider,
  request_tx: mpsc::Sender<FlushRequest>,
  tick_tx: mpsc::Sender<()>,
  shutdown_tx: watch::Sender<bool>,
  scheduler: Option<FlushScheduler>,
}

impl Setup {
  fn new() -> Self {
    let transport = Arc::new(RecordingTransport::new());
    let time_provider = TestTimeProvider::new(TEST_EPOCH);
    let buffer = Arc::new(LogBuffer::new(
      Arc::new(JsonEnvelopeSerializer),
      transport.clone(),
      Arc::new(time_provider.clone()),
    ));
    let (request_tx, request_rx) = mpsc::channel(8);
    let (tick_tx, ticker) = TestTicker::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = FlushScheduler::new(
      buffer.clone(),
      POLICY,
      Arc::new(time_provider.clone()),
      request_rx,
      Box::new(ticker),
      shutdown_rx,
    );

    Self {
      buffer,
      transport,
      time_provider,
      request_tx,
      tick_tx,
      shutdown_tx,
      scheduler: Some(scheduler),
    }
  }

  fn start(&mut self) -> JoinHandle<()> {
    tokio::spawn(self.scheduler.take().unwrap().run())
  }

  fn add(&self, count: usize) {
    for record in numbered_records(count) {
      self.buffer.add_log(record);
    }
  }

  // The ticker channel holds a single tick, so once the third send goes through the loop has
  // fully handled the first one.
  async fn tick_and_settle(&self) {
    for _ in 0 .. 3 {
      self.tick_tx.send(()).await.unwrap();
    }
  }
}

#[test]
fn policy_thresholds() {
  let stats = |pending_count, pending_bytes| BufferStats {
    pending_count,
    pending_bytes,
    oldest_pending_at: Some(TEST_EPOCH),
  };

  assert_eq!(None, POLICY.threshold_reached(&stats(4, 100)));
  assert_eq!(
    Some(FlushReason::Count),
    POLICY.threshold_reached(&stats(5, 100))
  );
  assert_eq!(
    Some(FlushReason::Size),
    POLICY.threshold_reached(&stats(1, 1024 * 1024))
  );
  assert_eq!(
    Some(FlushReason::Count),
    POLICY.threshold_reached(&stats(5, 1024 * 1024))
  );
  assert_eq!(None, POLICY.threshold_reached(&BufferStats::default()));
}

#[test]
fn policy_latency() {
  let stats = BufferStats {
    pending_count: 1,
    pending_bytes: 10,
    oldest_pending_at: Some(TEST_EPOCH),
  };

  assert!(!POLICY.latency_exceeded(&stats, TEST_EPOCH + 4999.milliseconds()));
  assert!(POLICY.latency_exceeded(&stats, TEST_EPOCH + 5.seconds()));
  assert!(!POLICY.latency_exceeded(&BufferStats::default(), TEST_EPOCH + 1.hours()));
}

#[tokio::test]
async fn requested_flush_completes_after_send() {
  let mut setup = Setup::new();
  let _task = setup.start();
  setup.add(2);

  let (tx, rx) = completion();
  setup
    .request_tx
    .send(FlushRequest {
      reason: FlushReason::Manual,
      completion: Some(tx),
    })
    .await
    .unwrap();
  rx.wait().await.unwrap();

  assert_eq!(vec![2], setup.transport.item_counts());
  assert_eq!(0, setup.buffer.stats().pending_count);
}

#[tokio::test]
async fn tick_flushes_once_latency_is_exceeded() {
  let mut setup = Setup::new();
  let _task = setup.start();
  setup.add(1);

  setup.time_provider.advance(4.seconds());
  setup.tick_and_settle().await;
  assert_eq!(0, setup.transport.attempts());
  assert_eq!(1, setup.buffer.stats().pending_count);

  setup.time_provider.advance(1.seconds());
  setup.tick_tx.send(()).await.unwrap();
  setup.transport.wait_for(1).await;
  assert_eq!(vec![1], setup.transport.item_counts());
}

#[tokio::test]
async fn tick_catches_threshold_without_request() {
  let mut setup = Setup::new();
  let _task = setup.start();

  // Records added straight to the buffer never produce a request.
  setup.add(5);
  setup.tick_tx.send(()).await.unwrap();
  setup.transport.wait_for(1).await;

  assert_eq!(
    vec!["0", "1", "2", "3", "4"],
    bodies(&setup.transport.batches()[0])
  );
}

#[tokio::test]
async fn empty_flush_sends_nothing() {
  let mut setup = Setup::new();
  let _task = setup.start();

  let (tx, rx) = completion();
  setup
    .request_tx
    .send(FlushRequest {
      reason: FlushReason::Manual,
      completion: Some(tx),
    })
    .await
    .unwrap();
  rx.wait().await.unwrap();

  assert_eq!(0, setup.transport.attempts());
}

#[tokio::test]
async fn shutdown_flushes_and_completes_queued_requests() {
  let mut setup = Setup::new();
  setup.add(3);

  // Both queued before the loop starts so that shutdown is observed first.
  let (tx, rx) = completion();
  setup
    .request_tx
    .send(FlushRequest {
      reason: FlushReason::Manual,
      completion: Some(tx),
    })
    .await
    .unwrap();
  setup.shutdown_tx.send_replace(true);

  setup.start().await.unwrap();
  rx.wait().await.unwrap();

  assert_eq!(vec![3], setup.transport.item_counts());
  assert!(setup.request_tx.is_closed());
}

#[tokio::test]
async fn dropping_the_shutdown_sender_stops_the_loop() {
  let mut setup = Setup::new();
  let task = setup.start();
  setup.add(1);

  drop(setup.shutdown_tx);
  task.await.unwrap();

  assert_eq!(vec![1], setup.transport.item_counts());
}
