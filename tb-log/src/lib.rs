// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#![deny(
  clippy::expect_used,
  clippy::panic,
  clippy::todo,
  clippy::unimplemented,
  clippy::unreachable,
  clippy::unwrap_used
)]

pub mod rate_limit_log;


use parking_lot::Mutex;
use std::sync::OnceLock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::reload::Handle as ReloadHandle;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

// The telemetry pipeline is quiet by default. Anything it has to say about dropped batches or
// failed recovery is emitted at warn or above.
const DEFAULT_FILTER_RULES: &str = "warn,tb_logger=info,tb_termination=info";

//
// DiagnosticsLogger
//

// Routes the pipeline's own diagnostics (emitted via the `log` facade) to stderr. The filter can be
// swapped at runtime, for example when a host application turns on debug output.
pub struct DiagnosticsLogger {
  handle: Mutex<Option<ReloadHandle<EnvFilter, Registry>>>,
}

impl DiagnosticsLogger {
  fn get() -> &'static Self {
    static LOGGER: OnceLock<DiagnosticsLogger> = OnceLock::new();

    LOGGER.get_or_init(|| Self {
      handle: Mutex::new(None),
    })
  }

  // Install the diagnostics subscriber. Subsequent calls are no-ops so that both test binaries and
  // host applications can call this without coordinating.
  pub fn initialize() {
    let mut handle = Self::get().handle.lock();
    if handle.is_some() {
      return;
    }

    // ANSI output is opt-in via TB_LOG_ANSI so that captured stderr stays readable.
    let stderr = tracing_subscriber::fmt::layer()
      .with_writer(std::io::stderr)
      .with_ansi(std::env::var("TB_LOG_ANSI").is_ok())
      .with_line_number(true)
      .with_thread_ids(true)
      .compact();

    let filter = EnvFilter::new(
      std::env::var("RUST_LOG")
        .as_deref()
        .unwrap_or(DEFAULT_FILTER_RULES),
    );

    let (filter, reload_handle) = tracing_subscriber::reload::Layer::new(filter);

    // Another subscriber may already be installed by the host. In that case our records flow to it
    // and we simply don't own the filter.
    if Registry::default()
      .with(filter)
      .with(stderr)
      .try_init()
      .is_ok()
    {
      *handle = Some(reload_handle);
    }
  }

  // Replace the active filter with the provided RUST_LOG style rules.
  pub fn swap(rules: &str) -> anyhow::Result<()> {
    let handle = Self::get().handle.lock();
    let Some(handle) = handle.as_ref() else {
      anyhow::bail!("diagnostics logger not initialized");
    };

    handle.reload(EnvFilter::try_new(rules)?)?;

    // The `log` bridge caches the max level at init time, so it has to be pushed again.
    log::set_max_level(tracing_log::AsLog::as_log(
      &tracing_subscriber::filter::LevelFilter::current(),
    ));

    Ok(())
  }
}
