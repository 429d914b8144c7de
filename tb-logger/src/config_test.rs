// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#![allow(clippy::unwrap_used)]

use super::{Config, ConfigError, MAX_BATCH_COUNT_LIMIT};
use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use std::path::Path;
use time::ext::NumericalDuration;

#[test]
fn defaults() {
  let config = Config::from_yaml("{}").unwrap();
  assert_eq!(Config::default(), config);

  let policy = config.flush_policy();
  assert_eq!(100, policy.max_batch_count);
  assert_eq!(1_048_576, policy.max_batch_bytes);
  assert_eq!(5.seconds(), policy.max_latency);
  assert!(config.enable_logs);
  assert_eq!(None, config.recovery_location());
}

#[test]
fn overrides() {
  let config = Config::from_yaml(
    r"
max_batch_count: 5
max_latency_ms: 250
environment: staging
release: app@2.0.0
dsn: https://key@example.com/1
cache_directory: /tmp/cache
",
  )
  .unwrap();

  assert_eq!(5, config.flush_policy().max_batch_count);
  assert_eq!(250.milliseconds(), config.flush_policy().max_latency);
  assert_eq!(
    Some((Path::new("/tmp/cache"), "https://key@example.com/1")),
    config.recovery_location()
  );

  let metadata = config.sdk_metadata(Some("abc".to_string()));
  assert_eq!("staging", metadata.environment);
  assert_eq!(Some("app@2.0.0".to_string()), metadata.release);
  assert_eq!(Some("abc".to_string()), metadata.installation_id);
}

#[test]
fn invalid() {
  assert_matches!(
    Config::from_yaml("max_batch_count: 0"),
    Err(ConfigError::Zero("max_batch_count"))
  );
  assert_matches!(
    Config::from_yaml("check_interval_ms: 0"),
    Err(ConfigError::Zero("check_interval_ms"))
  );
  assert_matches!(
    Config::from_yaml("not_a_field: 1"),
    Err(ConfigError::Parse(_))
  );
  assert_matches!(
    Config::from_yaml("max_batch_count: lots"),
    Err(ConfigError::Parse(_))
  );
}

#[test]
fn batch_count_is_capped() {
  assert_matches!(
    Config::from_yaml("max_batch_count: 10001"),
    Err(ConfigError::TooLarge {
      name: "max_batch_count",
      limit: 10_000
    })
  );
  assert_eq!(
    MAX_BATCH_COUNT_LIMIT,
    Config::from_yaml("max_batch_count: 10000")
      .unwrap()
      .max_batch_count
  );
}
