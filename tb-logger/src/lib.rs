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

mod builder;
mod completion;
mod config;
mod flush_scheduler;
mod log_buffer;
mod logger;

pub use builder::LoggerBuilder;
pub use completion::{CompletionReceiver, CompletionSender, WaitError};
pub use config::{Config, ConfigError};
pub use flush_scheduler::{FlushPolicy, FlushReason, FlushRequest, FlushScheduler};
pub use log_buffer::{Batch, BufferStats, LogBuffer};
pub use logger::{BeforeSendHook, Block, InitParams, LifecycleEvent, Logger, LoggerHandle};
pub use tb_envelope::{Envelope, EnvelopeSerializer, JsonEnvelopeSerializer, TelemetryTransport};
pub use tb_log_primitives::{AttributeValue, Attributes, LogLevel, LogRecord};

#[cfg(test)]
#[ctor::ctor]
fn test_global_init() {
  tb_test_helpers::test_global_init();
}
