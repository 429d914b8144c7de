// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./log_buffer_test.rs"]
mod log_buffer_test;

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tb_envelope::{EnvelopeSerializer, TelemetryTransport, encode_record};
use tb_log::{error_every, warn_every};
use tb_log_primitives::LogRecord;
use tb_log_primitives::size::EncodedSize;
use tb_termination::{CrashSnapshot, TerminationRecoveryStore};
use tb_time::TimeProvider;
use time::OffsetDateTime;
use time::ext::NumericalDuration;

//
// BufferStats
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
  pub pending_count: usize,
  pub pending_bytes: usize,
  // When the oldest pending record was added. None iff the buffer is empty.
  pub oldest_pending_at: Option<OffsetDateTime>,
}

//
// Batch
//

#[derive(Debug, Default)]
pub struct Batch {
  pub records: Vec<LogRecord>,
  pub byte_estimate: usize,
}

impl Batch {
  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }
}

#[derive(Default)]
struct Pending {
  records: Vec<LogRecord>,
  bytes: usize,
  oldest_pending_at: Option<OffsetDateTime>,

  // Per-record encodings mirrored into the crash snapshot. Only maintained when a snapshot is
  // attached.
  encoded: Vec<Arc<[u8]>>,
}

impl Pending {
  fn stats(&self) -> BufferStats {
    BufferStats {
      pending_count: self.records.len(),
      pending_bytes: self.bytes,
      oldest_pending_at: self.oldest_pending_at,
    }
  }
}

//
// LogBuffer
//

// In-memory FIFO of enriched records awaiting a flush. Appends and batch extraction are the only
// operations performed under the lock; encoding for the crash snapshot happens before the lock is
// taken, and serialization and transport happen after the batch has been taken.
pub struct LogBuffer {
  pending: Mutex<Pending>,
  serializer: Arc<dyn EnvelopeSerializer>,
  transport: Arc<dyn TelemetryTransport>,
  time_provider: Arc<dyn TimeProvider>,
  snapshot: Option<Arc<CrashSnapshot>>,
  recovery_store: Option<Arc<TerminationRecoveryStore>>,
}

impl LogBuffer {
  #[must_use]
  pub fn new(
    serializer: Arc<dyn EnvelopeSerializer>,
    transport: Arc<dyn TelemetryTransport>,
    time_provider: Arc<dyn TimeProvider>,
  ) -> Self {
    Self {
      pending: Mutex::default(),
      serializer,
      transport,
      time_provider,
      snapshot: None,
      recovery_store: None,
    }
  }

  // Mirrors pending records into the store's crash snapshot so they can be persisted at
  // termination time. A marker written during this session is discarded once a flush has taken
  // the records it holds.
  #[must_use]
  pub fn with_recovery_store(mut self, store: Arc<TerminationRecoveryStore>) -> Self {
    self.snapshot = Some(store.snapshot());
    self.recovery_store = Some(store);
    self
  }

  // Removes a marker left by a termination notification the process survived.
  pub fn discard_stale_marker(&self) {
    if let Some(store) = &self.recovery_store {
      store.discard_marker();
    }
  }

  // Appends a record and returns the resulting stats. This never blocks on I/O and never rejects a
  // record; bounding is the job of the flush policy.
  pub fn add_log(&self, record: LogRecord) -> BufferStats {
    let size = record.encoded_size();
    let encoded = self
      .snapshot
      .as_ref()
      .and_then(|_| match encode_record(&record) {
        Ok(bytes) => Some(Arc::<[u8]>::from(bytes)),
        Err(e) => {
          warn_every!(
            15.seconds(),
            "record will not survive termination, encoding failed: {}",
            e
          );
          None
        },
      });
    let now = self.time_provider.now();

    let mut pending = self.pending.lock();
    if pending.records.is_empty() {
      pending.oldest_pending_at = Some(now);
    }
    pending.records.push(record);
    pending.bytes += size;

    if let Some(snapshot) = &self.snapshot
      && let Some(encoded) = encoded
    {
      // Republishing copies every item handle, so filling a batch costs O(n^2) handle copies.
      // `Config::validate` caps `max_batch_count` to keep that bounded.
      pending.encoded.push(encoded);
      snapshot.publish(pending.encoded.clone());
    }

    pending.stats()
  }

  // Atomically removes everything pending. An empty buffer yields an empty batch.
  pub fn take_batch(&self) -> Batch {
    let taken = {
      let mut pending = self.pending.lock();
      // Cleared under the lock so a concurrent add cannot republish into a snapshot that is about
      // to be wiped.
      if let Some(snapshot) = &self.snapshot
        && !pending.encoded.is_empty()
      {
        snapshot.clear();
      }
      std::mem::take(&mut *pending)
    };

    Batch {
      records: taken.records,
      byte_estimate: taken.bytes,
    }
  }

  pub fn stats(&self) -> BufferStats {
    self.pending.lock().stats()
  }

  // Drains the buffer and hands the batch to the transport. Returns the wall clock time spent. Safe
  // to call concurrently and redundantly: a call that finds the buffer empty touches neither the
  // serializer nor the transport.
  pub fn capture_logs(&self) -> Duration {
    let start = Instant::now();

    let batch = self.take_batch();
    if !batch.is_empty() {
      self.send_batch(&batch.records);
      self.discard_stale_marker();
    }

    start.elapsed()
  }

  // Serializes and sends `records` exactly once. Returns whether the transport accepted the
  // envelope. A batch that fails to serialize is dropped in full.
  pub fn send_batch(&self, records: &[LogRecord]) -> bool {
    let envelope = match self.serializer.serialize(records) {
      Ok(envelope) => envelope,
      Err(e) => {
        error_every!(
          15.seconds(),
          "dropping batch of {} log records: {}",
          records.len(),
          e
        );
        return false;
      },
    };

    let item_count = envelope.item_count();
    match self.transport.send_envelope(envelope) {
      Ok(()) => {
        log::debug!("sent envelope with {item_count} log records");
        true
      },
      Err(e) => {
        warn_every!(
          15.seconds(),
          "transport rejected envelope with {} log records: {}",
          item_count,
          e
        );
        false
      },
    }
  }
}
