// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#![allow(clippy::unwrap_used)]

use super::EncodedSize;
use crate::{AttributeValue, Attributes, LogLevel, LogRecord, TraceId};
use time::macros::datetime;

fn record(body: &str, attributes: Attributes) -> LogRecord {
  LogRecord::new(
    datetime!(2024-05-01 12:00:00 UTC),
    LogLevel::Info,
    body,
    attributes,
    TraceId::from_u128(1),
  )
}

#[test]
fn estimate_is_an_upper_bound_for_simple_records() {
  let records = [
    record("", Attributes::default()),
    record("hello world", Attributes::default()),
    record(
      "with attributes",
      [
        ("count".to_string(), AttributeValue::Int(i64::MAX)),
        ("ratio".to_string(), AttributeValue::Double(0.123_456_789)),
        ("enabled".to_string(), AttributeValue::Bool(false)),
        ("names".to_string(), vec!["a", "bb", "ccc"].into()),
      ]
      .into_iter()
      .collect(),
    ),
  ];

  for record in records {
    let encoded = serde_json::to_vec(&record).unwrap();
    assert!(
      record.encoded_size() >= encoded.len(),
      "estimate {} is below actual {} for {record:?}",
      record.encoded_size(),
      encoded.len()
    );
  }
}

#[test]
fn estimate_grows_with_content() {
  let small = record("a", Attributes::default());
  let large = record(&"a".repeat(1000), Attributes::default());
  assert!(large.encoded_size() >= small.encoded_size() + 999);
}
