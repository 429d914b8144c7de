// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::completion::{CompletionReceiver, CompletionSender, WaitError, completion};
use crate::flush_scheduler::{FlushPolicy, FlushReason, FlushRequest};
use crate::log_buffer::{BufferStats, LogBuffer};
use parking_lot::Mutex;
use std::sync::Arc;
use tb_envelope::{EnvelopeSerializer, JsonEnvelopeSerializer, TelemetryTransport};
use tb_log::warn_every;
use tb_log_primitives::{Attributes, LogLevel, LogRecord};
use tb_scope::{ScopeAttributeEnricher, ScopeProvider, SharedScope};
use tb_termination::TerminationNotifier;
use tb_time::{SystemTimeProvider, TimeProvider};
use time::Duration;
use time::ext::NumericalDuration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

// Called with every enriched record before it is buffered. Returning None drops the record.
pub type BeforeSendHook = Arc<dyn Fn(LogRecord) -> Option<LogRecord> + Send + Sync>;

#[derive(Clone, Copy, Debug)]
pub enum Block {
  Yes(Duration),
  No,
}

//
// LifecycleEvent
//

// Host application lifecycle transitions that warrant getting pending records out immediately.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
  WillResignActive,
  WillTerminate,
}

/// Initialization parameters that are required to start up the logger.
pub struct InitParams {
  pub transport: Arc<dyn TelemetryTransport>,
  pub serializer: Arc<dyn EnvelopeSerializer>,
  pub scope_provider: Arc<dyn ScopeProvider>,
  pub time_provider: Arc<dyn TimeProvider>,

  // Required for termination recovery to be armed, in addition to a DSN and cache directory.
  pub termination_notifier: Option<Arc<dyn TerminationNotifier>>,

  pub before_send_log: Option<BeforeSendHook>,
}

impl InitParams {
  // Defaults for everything except the transport: JSON serialization, an empty shared scope, the
  // system clock, no termination notifier and no before-send hook.
  #[must_use]
  pub fn new(transport: Arc<dyn TelemetryTransport>) -> Self {
    Self {
      transport,
      serializer: Arc::new(JsonEnvelopeSerializer),
      scope_provider: Arc::new(SharedScope::default()),
      time_provider: Arc::new(SystemTimeProvider),
      termination_notifier: None,
      before_send_log: None,
    }
  }
}

//
// LoggerHandle
//

// A cheap, cloneable front door for emitting records from any thread.
#[derive(Clone)]
pub struct LoggerHandle {
  pub(crate) enabled: bool,
  pub(crate) buffer: Arc<LogBuffer>,
  pub(crate) policy: FlushPolicy,
  pub(crate) enricher: Arc<ScopeAttributeEnricher>,
  pub(crate) scope_provider: Arc<dyn ScopeProvider>,
  pub(crate) time_provider: Arc<dyn TimeProvider>,
  pub(crate) before_send_log: Option<BeforeSendHook>,
  pub(crate) flush_tx: mpsc::Sender<FlushRequest>,
  pub(crate) lifecycle_flush_timeout: Duration,
}

impl LoggerHandle {
  // Captures a record timestamped now. Never blocks on I/O.
  pub fn log(&self, level: LogLevel, body: impl Into<String>, attributes: Attributes) {
    if !self.accepting() {
      return;
    }

    let scope = self.scope_provider.snapshot();
    let record = LogRecord::new(
      self.time_provider.now(),
      level,
      body,
      attributes,
      scope.propagation_trace_id,
    );
    self.capture(self.enricher.enrich(record, &scope));
  }

  // Captures a caller-built record, e.g. one carrying its own timestamp. The record is enriched
  // with the current scope like any other.
  pub fn log_record(&self, record: LogRecord) {
    if !self.accepting() {
      return;
    }

    let scope = self.scope_provider.snapshot();
    self.capture(self.enricher.enrich(record, &scope));
  }

  // Nothing drains the buffer once the flush scheduler has shut down, so records are refused from
  // then on.
  fn accepting(&self) -> bool {
    if !self.enabled {
      return false;
    }

    if self.flush_tx.is_closed() {
      log::debug!("log record dropped, logger is shut down");
      return false;
    }

    true
  }

  fn capture(&self, record: LogRecord) {
    let record = match &self.before_send_log {
      Some(hook) => match hook(record) {
        Some(record) => record,
        None => {
          log::debug!("log record dropped by before_send_log");
          return;
        },
      },
      None => record,
    };

    let stats = self.buffer.add_log(record);
    if let Some(reason) = self.policy.threshold_reached(&stats) {
      self.request_flush(reason, None);
    }
  }

  // Requests a flush of everything pending. With `Block::Yes` the caller waits for the flush to
  // finish, up to the given duration. Must not be called with `Block::Yes` from the logger's own
  // runtime.
  pub fn flush(&self, block: Block) {
    self.flush_with_reason(FlushReason::Manual, block);
  }

  // Async variant of `flush` that always waits for completion.
  pub async fn flush_async(&self) -> Result<(), WaitError> {
    let (tx, rx) = completion();
    self
      .flush_tx
      .send(FlushRequest {
        reason: FlushReason::Manual,
        completion: Some(tx),
      })
      .await
      .map_err(|_| WaitError::Abandoned)?;
    rx.wait().await
  }

  // Flushes on lifecycle transitions and waits at most the configured lifecycle budget. If the
  // budget elapses the caller proceeds and the flush finishes in the background.
  pub fn handle_lifecycle_event(&self, event: LifecycleEvent) {
    log::debug!("lifecycle event: {event:?}");
    self.flush_with_reason(
      FlushReason::Lifecycle(event),
      Block::Yes(self.lifecycle_flush_timeout),
    );
  }

  #[must_use]
  pub fn stats(&self) -> BufferStats {
    self.buffer.stats()
  }

  fn flush_with_reason(&self, reason: FlushReason, block: Block) {
    let Block::Yes(timeout) = block else {
      self.request_flush(reason, None);
      return;
    };

    let (tx, rx) = completion();
    if !self.request_flush(reason, Some(tx)) {
      return;
    }

    match rx.wait_blocking(timeout.unsigned_abs()) {
      Ok(()) => log::debug!("flush ({reason:?}) completed"),
      Err(e) => log::debug!("stopped waiting for flush ({reason:?}): {e}"),
    }
  }

  fn request_flush(&self, reason: FlushReason, completion: Option<CompletionSender>) -> bool {
    match self.flush_tx.try_send(FlushRequest { reason, completion }) {
      Ok(()) => true,
      Err(TrySendError::Full(_)) => {
        // Flushes already queued will drain whatever this request would have.
        log::debug!("flush request queue full, dropping {reason:?} request");
        false
      },
      Err(TrySendError::Closed(_)) => {
        warn_every!(15.seconds(), "flush requested after logger shutdown");
        false
      },
    }
  }
}

pub(crate) struct ShutdownState {
  pub(crate) trigger: watch::Sender<bool>,
  pub(crate) finished: CompletionReceiver,
}

//
// Logger
//

pub struct Logger {
  pub(crate) handle: LoggerHandle,
  pub(crate) shutdown_state: Mutex<Option<ShutdownState>>,
  pub(crate) shutdown_flush_timeout: Duration,
}

impl Logger {
  #[must_use]
  pub fn new_logger_handle(&self) -> LoggerHandle {
    self.handle.clone()
  }

  // Stops the flush scheduler after a final flush. With `blocking` the caller waits up to the
  // configured shutdown budget for the final flush to finish. Subsequent calls are no-ops.
  pub fn shutdown(&self, blocking: bool) {
    let Some(state) = self.shutdown_state.lock().take() else {
      return;
    };

    state.trigger.send_replace(true);

    if blocking
      && let Err(e) = state
        .finished
        .wait_blocking(self.shutdown_flush_timeout.unsigned_abs())
    {
      log::warn!("logger did not shut down cleanly: {e}");
    }
  }
}
