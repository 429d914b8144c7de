// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./flush_scheduler_test.rs"]
mod flush_scheduler_test;

use crate::completion::CompletionSender;
use crate::log_buffer::{BufferStats, LogBuffer};
use crate::logger::LifecycleEvent;
use std::sync::Arc;
use tb_time::{Ticker, TimeProvider};
use time::{Duration, OffsetDateTime};
use tokio::sync::{mpsc, watch};

//
// FlushReason
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
  Count,
  Size,
  MaxLatency,
  Lifecycle(LifecycleEvent),
  Manual,
  Shutdown,
}

//
// FlushPolicy
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
  pub max_batch_count: usize,
  pub max_batch_bytes: usize,
  pub max_latency: Duration,
}

impl FlushPolicy {
  #[must_use]
  pub const fn threshold_reached(&self, stats: &BufferStats) -> Option<FlushReason> {
    if stats.pending_count >= self.max_batch_count {
      Some(FlushReason::Count)
    } else if stats.pending_bytes >= self.max_batch_bytes {
      Some(FlushReason::Size)
    } else {
      None
    }
  }

  #[must_use]
  pub fn latency_exceeded(&self, stats: &BufferStats, now: OffsetDateTime) -> bool {
    stats
      .oldest_pending_at
      .is_some_and(|oldest| now - oldest >= self.max_latency)
  }
}

//
// FlushRequest
//

#[derive(Debug)]
pub struct FlushRequest {
  pub reason: FlushReason,
  // Completed once the flush this request caused (or coalesced into) has finished.
  pub completion: Option<CompletionSender>,
}

//
// FlushScheduler
//

// Owns the decision of when to drain the buffer. Producers request flushes through the request
// channel when a threshold is crossed, lifecycle events and manual flushes arrive the same way, and
// a periodic tick enforces the latency bound. Draining runs on the blocking pool to keep transport
// I/O off the runtime thread. Flushes are awaited in line, so shutdown, new requests and ticks are
// only observed once the flush in progress has finished.
pub struct FlushScheduler {
  buffer: Arc<LogBuffer>,
  policy: FlushPolicy,
  time_provider: Arc<dyn TimeProvider>,
  request_rx: mpsc::Receiver<FlushRequest>,
  ticker: Box<dyn Ticker>,
  shutdown_rx: watch::Receiver<bool>,
}

impl FlushScheduler {
  #[must_use]
  pub fn new(
    buffer: Arc<LogBuffer>,
    policy: FlushPolicy,
    time_provider: Arc<dyn TimeProvider>,
    request_rx: mpsc::Receiver<FlushRequest>,
    ticker: Box<dyn Ticker>,
    shutdown_rx: watch::Receiver<bool>,
  ) -> Self {
    Self {
      buffer,
      policy,
      time_provider,
      request_rx,
      ticker,
      shutdown_rx,
    }
  }

  // Runs until shutdown is signaled (or the shutdown sender is dropped), then performs a final
  // flush and completes any requests still queued.
  pub async fn run(self) {
    let Self {
      buffer,
      policy,
      time_provider,
      mut request_rx,
      mut ticker,
      mut shutdown_rx,
    } = self;

    loop {
      if *shutdown_rx.borrow_and_update() {
        break;
      }

      tokio::select! {
        Some(request) = request_rx.recv() => {
          log::debug!("flush requested: {:?}", request.reason);
          flush(&buffer, &policy, request.reason).await;
          if let Some(completion) = request.completion {
            completion.complete();
          }
        },
        () = ticker.tick() => {
          let stats = buffer.stats();
          if policy.latency_exceeded(&stats, time_provider.now()) {
            flush(&buffer, &policy, FlushReason::MaxLatency).await;
          } else if let Some(reason) = policy.threshold_reached(&stats) {
            // A threshold request can be lost when the request queue is full.
            flush(&buffer, &policy, reason).await;
          }
        },
        changed = shutdown_rx.changed() => {
          if changed.is_err() {
            log::debug!("logger dropped, shutting down flush scheduler");
            break;
          }
        },
      }
    }

    request_rx.close();
    flush(&buffer, &policy, FlushReason::Shutdown).await;
    while let Ok(request) = request_rx.try_recv() {
      if let Some(completion) = request.completion {
        completion.complete();
      }
    }

    log::debug!("flush scheduler shut down");
  }
}

// Drains the buffer on the blocking pool. Keeps draining while the policy says the buffer is over
// a threshold, since producers keep appending while a flush is in flight.
async fn flush(buffer: &Arc<LogBuffer>, policy: &FlushPolicy, reason: FlushReason) {
  let mut reason = Some(reason);
  while let Some(current) = reason {
    let buffer_clone = buffer.clone();
    match tokio::task::spawn_blocking(move || buffer_clone.capture_logs()).await {
      Ok(elapsed) => log::debug!("flush ({current:?}) took {elapsed:?}"),
      Err(e) => {
        log::error!("flush task failed: {e}");
        return;
      },
    }

    reason = policy.threshold_reached(&buffer.stats());
  }
}
