// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

// Test code only.
#![allow(clippy::unwrap_used)]

pub mod transport;

use tb_log_primitives::{AttributeValue, Attributes, LogLevel, LogRecord, TraceId};
use time::OffsetDateTime;
use time::macros::datetime;

pub use transport::RecordingTransport;

pub fn test_global_init() {
  tb_log::DiagnosticsLogger::initialize();
}

pub const TEST_EPOCH: OffsetDateTime = datetime!(2024-05-01 12:00:00 UTC);

#[must_use]
pub fn make_record(level: LogLevel, body: &str) -> LogRecord {
  make_record_with_attributes(level, body, &[])
}

#[must_use]
pub fn make_record_with_attributes(
  level: LogLevel,
  body: &str,
  attributes: &[(&str, AttributeValue)],
) -> LogRecord {
  LogRecord::new(
    TEST_EPOCH,
    level,
    body,
    attributes
      .iter()
      .map(|(k, v)| ((*k).to_string(), v.clone()))
      .collect::<Attributes>(),
    TraceId::from_u128(1),
  )
}

// Records with bodies "0", "1", ... useful for asserting delivery order.
#[must_use]
pub fn numbered_records(count: usize) -> Vec<LogRecord> {
  (0 .. count)
    .map(|i| make_record(LogLevel::Info, &i.to_string()))
    .collect()
}

#[must_use]
pub fn bodies(records: &[LogRecord]) -> Vec<String> {
  records.iter().map(|r| r.body().to_string()).collect()
}
