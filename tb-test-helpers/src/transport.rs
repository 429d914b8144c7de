// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tb_envelope::{Envelope, TelemetryTransport, parse_payload};
use tb_log_primitives::LogRecord;
use tokio::sync::Notify;

//
// RecordingTransport
//

// A transport that keeps every envelope it is handed. It can be configured to stall before
// accepting an envelope or to reject everything.
#[derive(Default)]
pub struct RecordingTransport {
  envelopes: Mutex<Vec<Envelope>>,
  attempts: AtomicUsize,
  failing: AtomicBool,
  delay: Mutex<Option<Duration>>,
  notify: Notify,
}

impl RecordingTransport {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  #[must_use]
  pub fn with_delay(delay: Duration) -> Self {
    let transport = Self::default();
    *transport.delay.lock() = Some(delay);
    transport
  }

  pub fn set_failing(&self, failing: bool) {
    self.failing.store(failing, Ordering::SeqCst);
  }

  pub fn attempts(&self) -> usize {
    self.attempts.load(Ordering::SeqCst)
  }

  pub fn envelopes(&self) -> Vec<Envelope> {
    self.envelopes.lock().clone()
  }

  // Decoded records of each accepted envelope, in send order.
  pub fn batches(&self) -> Vec<Vec<LogRecord>> {
    self
      .envelopes
      .lock()
      .iter()
      .map(|e| parse_payload(e.payload()).unwrap())
      .collect()
  }

  pub fn item_counts(&self) -> Vec<usize> {
    self
      .envelopes
      .lock()
      .iter()
      .map(Envelope::item_count)
      .collect()
  }

  // Waits until at least `count` envelopes were accepted. Panics after 5 seconds.
  pub async fn wait_for(&self, count: usize) -> Vec<Envelope> {
    let wait = async {
      loop {
        let notified = self.notify.notified();
        {
          let envelopes = self.envelopes.lock();
          if envelopes.len() >= count {
            return envelopes.clone();
          }
        }
        notified.await;
      }
    };

    tokio::time::timeout(Duration::from_secs(5), wait)
      .await
      .unwrap_or_else(|_| panic!("timed out waiting for {count} envelopes"))
  }

  // Blocking variant of `wait_for` for tests that don't run inside a runtime.
  pub fn wait_for_blocking(&self, count: usize) -> Vec<Envelope> {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
      {
        let envelopes = self.envelopes.lock();
        if envelopes.len() >= count {
          return envelopes.clone();
        }
      }
      assert!(
        std::time::Instant::now() < deadline,
        "timed out waiting for {count} envelopes"
      );
      std::thread::sleep(Duration::from_millis(5));
    }
  }
}

impl TelemetryTransport for RecordingTransport {
  fn send_envelope(&self, envelope: Envelope) -> anyhow::Result<()> {
    self.attempts.fetch_add(1, Ordering::SeqCst);

    let delay = *self.delay.lock();
    if let Some(delay) = delay {
      std::thread::sleep(delay);
    }

    if self.failing.load(Ordering::SeqCst) {
      anyhow::bail!("transport unavailable");
    }

    self.envelopes.lock().push(envelope);
    self.notify.notify_waiters();
    Ok(())
  }
}
