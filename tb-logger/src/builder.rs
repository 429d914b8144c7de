// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::completion::completion;
use crate::config::Config;
use crate::flush_scheduler::FlushScheduler;
use crate::log_buffer::LogBuffer;
use crate::logger::{InitParams, Logger, LoggerHandle, ShutdownState};
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tb_log_primitives::LogRecord;
use tb_scope::{InstallationId, ScopeAttributeEnricher};
use tb_termination::{RecoveryOutcome, TerminationRecoveryStore};
use tb_time::{IntervalTicker, Ticker};
use tokio::sync::{mpsc, watch};

const FLUSH_REQUEST_QUEUE_SIZE: usize = 16;

/// A builder for the logger.
pub struct LoggerBuilder {
  config: Config,
  params: InitParams,
  ticker: Option<Box<dyn Ticker>>,
}

impl LoggerBuilder {
  #[must_use]
  pub const fn new(config: Config, params: InitParams) -> Self {
    Self {
      config,
      params,
      ticker: None,
    }
  }

  /// Overrides the ticker driving the latency check. Defaults to an interval of
  /// `check_interval_ms`.
  #[must_use]
  pub fn with_ticker(mut self, ticker: Box<dyn Ticker>) -> Self {
    self.ticker = Some(ticker);
    self
  }

  /// Builds the logger.
  ///
  /// Records left behind by an abnormally terminated previous session are read (and their marker
  /// removed) before this returns, so no new record can be confused with them. They are resent as
  /// the first thing the returned future does. The future must be awaited for the logger to run and
  /// resolves once the logger has shut down.
  pub fn build(
    self,
  ) -> anyhow::Result<(
    Logger,
    Pin<Box<impl Future<Output = anyhow::Result<()>> + Send + 'static>>,
  )> {
    self.config.validate()?;
    let Self {
      config,
      params,
      ticker,
    } = self;

    log::info!(
      "telemetry logger {} {}, logs {}",
      config.sdk_name,
      config.sdk_version,
      if config.enable_logs {
        "enabled"
      } else {
        "disabled"
      }
    );

    let installation_id = config
      .cache_directory
      .as_deref()
      .map(|dir| InstallationId::new(dir).id());

    let mut buffer = LogBuffer::new(
      params.serializer.clone(),
      params.transport.clone(),
      params.time_provider.clone(),
    );

    let mut recovered = None;
    if config.enable_logs
      && let Some((cache_dir, dsn)) = config.recovery_location()
    {
      let store = TerminationRecoveryStore::new(cache_dir, dsn);
      recovered = match store.recover() {
        RecoveryOutcome::Recovered(records) => Some(records),
        outcome => {
          log::debug!("termination recovery: {outcome:?}");
          None
        },
      };

      match (store.prepare_directory(), &params.termination_notifier) {
        (Ok(()), Some(notifier)) => {
          store.arm(notifier.as_ref());
          buffer = buffer.with_recovery_store(Arc::new(store));
        },
        (Ok(()), None) => log::debug!("no termination notifier, recovery not armed"),
        (Err(e), _) => log::warn!(
          "failed to create telemetry buffer directory, logs are held in memory only: {e}"
        ),
      }
    }

    let buffer = Arc::new(buffer);
    let policy = config.flush_policy();
    let (flush_tx, flush_rx) = mpsc::channel(FLUSH_REQUEST_QUEUE_SIZE);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (finished_tx, finished_rx) = completion();

    let handle = LoggerHandle {
      enabled: config.enable_logs,
      buffer: buffer.clone(),
      policy,
      enricher: Arc::new(ScopeAttributeEnricher::new(
        config.sdk_metadata(installation_id),
      )),
      scope_provider: params.scope_provider,
      time_provider: params.time_provider.clone(),
      before_send_log: params.before_send_log,
      flush_tx,
      lifecycle_flush_timeout: config.lifecycle_flush_timeout(),
    };

    let scheduler = FlushScheduler::new(
      buffer.clone(),
      policy,
      params.time_provider,
      flush_rx,
      ticker.unwrap_or_else(|| Box::new(IntervalTicker::new(config.check_interval()))),
      shutdown_rx,
    );

    let logger = Logger {
      handle,
      shutdown_state: Mutex::new(Some(ShutdownState {
        trigger: shutdown_tx,
        finished: finished_rx,
      })),
      shutdown_flush_timeout: config.shutdown_flush_timeout(),
    };

    let future = async move {
      if let Some(records) = recovered {
        resend_recovered(buffer.clone(), records).await;
      }

      scheduler.run().await;
      // Everything pending went out with the final flush, so a marker written earlier in the
      // session is stale.
      buffer.discard_stale_marker();
      finished_tx.complete();
      Ok(())
    };

    Ok((logger, Box::pin(future)))
  }

  /// Builds the logger and runs it on a dedicated thread.
  pub fn build_dedicated_thread(self) -> anyhow::Result<Logger> {
    let (logger, future) = self.build()?;

    Self::run_logger_runtime(future)?;

    Ok(logger)
  }

  /// Creates a current-thread tokio runtime on a dedicated thread and awaits `f` on it.
  pub fn run_logger_runtime(
    f: impl Future<Output = anyhow::Result<()>> + Send + 'static,
  ) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
      .thread_name("telemetry.logger")
      .enable_all()
      .build()?;

    std::thread::Builder::new()
      .name("telemetry.logger".to_string())
      .spawn(move || {
        runtime.block_on(async {
          let result = f.await;
          log::debug!("telemetry logger runtime finished with result: {result:?}");
          if let Err(e) = result {
            log::error!("telemetry logger run loop failed: {e}");
          }
        });
      })?;

    Ok(())
  }
}

// One attempt, no retry. A failure means the recovered records are lost.
async fn resend_recovered(buffer: Arc<LogBuffer>, records: Vec<LogRecord>) {
  let count = records.len();
  match tokio::task::spawn_blocking(move || buffer.send_batch(&records)).await {
    Ok(true) => log::info!("resent {count} log records recovered from previous session"),
    Ok(false) => log::warn!("failed to resend {count} recovered log records, dropping them"),
    Err(e) => log::error!("recovery resend task failed: {e}"),
  }
}
