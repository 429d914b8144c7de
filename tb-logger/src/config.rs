// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./config_test.rs"]
mod config_test;

use crate::flush_scheduler::FlushPolicy;
use serde::Deserialize;
use std::path::PathBuf;
use tb_scope::SdkMetadata;
use time::Duration;

pub const DEFAULT_MAX_BATCH_COUNT: usize = 100;
pub const DEFAULT_MAX_BATCH_BYTES: usize = 1024 * 1024;
pub const DEFAULT_MAX_LATENCY_MS: u64 = 5_000;
pub const DEFAULT_CHECK_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_LIFECYCLE_FLUSH_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_SHUTDOWN_FLUSH_TIMEOUT_MS: u64 = 5_000;

// Upper bound for `max_batch_count`. Every buffered record republishes the crash snapshot, which
// copies one handle per pending record.
pub const MAX_BATCH_COUNT_LIMIT: usize = 10_000;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
  #[error("invalid configuration: {0}")]
  Parse(#[from] serde_yaml::Error),
  #[error("{0} must be greater than zero")]
  Zero(&'static str),
  #[error("{name} must not exceed {limit}")]
  TooLarge { name: &'static str, limit: usize },
}

fn millis(ms: u64) -> Duration {
  Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
}

//
// Config
//

// Static configuration of the log pipeline. Every field has a default, so an empty document is a
// valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  // Master switch. When false records are dropped at the front door and recovery is not armed.
  pub enable_logs: bool,

  pub max_batch_count: usize,
  pub max_batch_bytes: usize,
  pub max_latency_ms: u64,

  // How often the latency trigger is evaluated. The effective latency bound is
  // `max_latency_ms + check_interval_ms`.
  pub check_interval_ms: u64,

  pub lifecycle_flush_timeout_ms: u64,
  pub shutdown_flush_timeout_ms: u64,

  pub sdk_name: String,
  pub sdk_version: String,
  pub environment: String,
  pub release: Option<String>,
  pub send_default_pii: bool,

  // Termination recovery is only enabled when both are set.
  pub dsn: Option<String>,
  pub cache_directory: Option<PathBuf>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      enable_logs: true,
      max_batch_count: DEFAULT_MAX_BATCH_COUNT,
      max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
      max_latency_ms: DEFAULT_MAX_LATENCY_MS,
      check_interval_ms: DEFAULT_CHECK_INTERVAL_MS,
      lifecycle_flush_timeout_ms: DEFAULT_LIFECYCLE_FLUSH_TIMEOUT_MS,
      shutdown_flush_timeout_ms: DEFAULT_SHUTDOWN_FLUSH_TIMEOUT_MS,
      sdk_name: env!("CARGO_PKG_NAME").to_string(),
      sdk_version: env!("CARGO_PKG_VERSION").to_string(),
      environment: "production".to_string(),
      release: None,
      send_default_pii: false,
      dsn: None,
      cache_directory: None,
    }
  }
}

impl Config {
  pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
    let config: Self = serde_yaml::from_str(yaml)?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    for (name, value) in [
      ("max_batch_count", self.max_batch_count as u64),
      ("max_batch_bytes", self.max_batch_bytes as u64),
      ("max_latency_ms", self.max_latency_ms),
      ("check_interval_ms", self.check_interval_ms),
    ] {
      if value == 0 {
        return Err(ConfigError::Zero(name));
      }
    }

    if self.max_batch_count > MAX_BATCH_COUNT_LIMIT {
      return Err(ConfigError::TooLarge {
        name: "max_batch_count",
        limit: MAX_BATCH_COUNT_LIMIT,
      });
    }

    Ok(())
  }

  #[must_use]
  pub fn flush_policy(&self) -> FlushPolicy {
    FlushPolicy {
      max_batch_count: self.max_batch_count,
      max_batch_bytes: self.max_batch_bytes,
      max_latency: millis(self.max_latency_ms),
    }
  }

  #[must_use]
  pub fn check_interval(&self) -> Duration {
    millis(self.check_interval_ms)
  }

  #[must_use]
  pub fn lifecycle_flush_timeout(&self) -> Duration {
    millis(self.lifecycle_flush_timeout_ms)
  }

  #[must_use]
  pub fn shutdown_flush_timeout(&self) -> Duration {
    millis(self.shutdown_flush_timeout_ms)
  }

  // Termination recovery parameters, if both halves are configured.
  #[must_use]
  pub fn recovery_location(&self) -> Option<(&std::path::Path, &str)> {
    Some((self.cache_directory.as_deref()?, self.dsn.as_deref()?))
  }

  #[must_use]
  pub fn sdk_metadata(&self, installation_id: Option<String>) -> SdkMetadata {
    SdkMetadata {
      sdk_name: self.sdk_name.clone(),
      sdk_version: self.sdk_version.clone(),
      environment: self.environment.clone(),
      release: self.release.clone(),
      installation_id,
      send_default_pii: self.send_default_pii,
    }
  }
}
