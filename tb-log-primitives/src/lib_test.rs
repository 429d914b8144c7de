// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#![allow(clippy::unwrap_used)]

use crate::attribute::{AttributeEncodingError, validate};
use crate::{AttributeValue, Attributes, LogLevel, LogRecord, SpanId, TraceId};
use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serde_json::json;
use time::ext::NumericalDuration;
use time::macros::datetime;

fn attributes(values: &[(&str, AttributeValue)]) -> Attributes {
  values
    .iter()
    .map(|(k, v)| ((*k).to_string(), v.clone()))
    .collect()
}

#[test]
fn level_ordering() {
  let levels = [
    LogLevel::Trace,
    LogLevel::Debug,
    LogLevel::Info,
    LogLevel::Warn,
    LogLevel::Error,
    LogLevel::Fatal,
  ];

  for pair in levels.windows(2) {
    assert!(pair[0] < pair[1], "{} should sort below {}", pair[0], pair[1]);
    assert!(pair[0].severity_number() < pair[1].severity_number());
  }

  assert_eq!(
    vec![1, 5, 9, 13, 17, 21],
    levels
      .iter()
      .map(|l| l.severity_number())
      .collect::<Vec<_>>()
  );
  assert_eq!(json!("warn"), serde_json::to_value(LogLevel::Warn).unwrap());
}

#[test]
fn ids() {
  let trace_id = TraceId::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef);
  assert_eq!("0123456789abcdef0123456789abcdef", trace_id.to_string());
  assert_eq!(trace_id, trace_id.to_string().parse().unwrap());
  assert_eq!(32, TraceId::new_random().to_string().len());

  assert!("0123".parse::<TraceId>().is_err());
  assert!(
    "01234567-89ab-cdef-0123-456789abcdef"
      .parse::<TraceId>()
      .is_err()
  );

  assert_eq!("00000000000000ff", SpanId::from_u64(255).to_string());
  assert_eq!(16, SpanId::new_random().to_string().len());
}

#[test]
fn record_wire_shape() {
  let record = LogRecord::new(
    datetime!(2024-05-01 12:00:00 UTC) + 500.milliseconds(),
    LogLevel::Error,
    "boom",
    attributes(&[("key", "value".into())]),
    TraceId::from_u128(1),
  );

  assert_eq!(
    json!({
      "timestamp": 1_714_564_800.5,
      "trace_id": "00000000000000000000000000000001",
      "level": "error",
      "body": "boom",
      "attributes": {
        "key": {"type": "string", "value": "value"},
      },
      "severity_number": 17,
    }),
    serde_json::to_value(&record).unwrap()
  );
}

#[test]
fn attribute_types_are_preserved() {
  let record = LogRecord::new(
    datetime!(2024-05-01 12:00:00 UTC),
    LogLevel::Info,
    "typed",
    attributes(&[
      ("count", 1.into()),
      ("enabled", true.into()),
      ("ratio", 0.5.into()),
      ("names", vec!["a", "b"].into()),
      ("flags", vec![true, false].into()),
      ("ids", vec![1_i64, 2].into()),
      ("weights", vec![0.25, 0.75].into()),
    ]),
    TraceId::from_u128(1),
  );

  let value = serde_json::to_value(&record).unwrap();
  let attributes = &value["attributes"];
  assert_eq!(json!({"type": "integer", "value": 1}), attributes["count"]);
  assert_eq!(
    json!({"type": "boolean", "value": true}),
    attributes["enabled"]
  );
  assert_eq!(json!({"type": "double", "value": 0.5}), attributes["ratio"]);
  assert_eq!(
    json!({"type": "string[]", "value": ["a", "b"]}),
    attributes["names"]
  );
  assert_eq!(
    json!({"type": "boolean[]", "value": [true, false]}),
    attributes["flags"]
  );
  assert_eq!(
    json!({"type": "integer[]", "value": [1, 2]}),
    attributes["ids"]
  );
  assert_eq!(
    json!({"type": "double[]", "value": [0.25, 0.75]}),
    attributes["weights"]
  );

  let decoded: LogRecord = serde_json::from_value(value).unwrap();
  assert_eq!(record, decoded);
}

#[test]
fn empty_array_encodes_as_string_array() {
  assert_eq!(
    json!({"type": "string[]", "value": []}),
    serde_json::to_value(AttributeValue::Array(vec![])).unwrap()
  );
}

#[test]
fn unencodable_attributes() {
  assert_eq!(
    Err(AttributeEncodingError::NonFiniteDouble),
    validate(&AttributeValue::Double(f64::NAN))
  );
  assert_eq!(
    Err(AttributeEncodingError::NonFiniteDouble),
    validate(&vec![1.0, f64::INFINITY].into())
  );
  assert_eq!(
    Err(AttributeEncodingError::MixedArray),
    validate(&AttributeValue::Array(vec![
      AttributeValue::Int(1),
      AttributeValue::Double(1.0)
    ]))
  );
  assert_eq!(
    Err(AttributeEncodingError::NestedArray),
    validate(&AttributeValue::Array(vec![
      AttributeValue::Array(vec![]),
    ]))
  );
  assert_eq!(
    Err(AttributeEncodingError::NestedArray),
    validate(&AttributeValue::Array(vec![
      AttributeValue::String("a".to_string()),
      AttributeValue::Array(vec![]),
    ]))
  );

  let record = LogRecord::new(
    datetime!(2024-05-01 12:00:00 UTC),
    LogLevel::Info,
    "bad",
    attributes(&[("nan", AttributeValue::Double(f64::NAN))]),
    TraceId::from_u128(1),
  );
  assert_matches!(serde_json::to_vec(&record), Err(_));
}

#[test]
fn decode_tolerates_missing_optional_fields() {
  let record: LogRecord = serde_json::from_value(json!({
    "timestamp": 1_714_564_800,
    "trace_id": "00000000000000000000000000000002",
    "level": "fatal",
    "body": "gone",
  }))
  .unwrap();

  assert_eq!(LogLevel::Fatal, record.level());
  assert_eq!(datetime!(2024-05-01 12:00:00 UTC), record.timestamp());
  assert!(record.attributes().is_empty());

  // A double attribute that happens to be integral on the wire is still a double.
  let value: AttributeValue =
    serde_json::from_value(json!({"type": "double", "value": 3})).unwrap();
  assert_eq!(AttributeValue::Double(3.0), value);
}

#[test]
fn into_parts_round_trip() {
  let record = LogRecord::new(
    datetime!(2024-05-01 12:00:00 UTC),
    LogLevel::Debug,
    "parts",
    Attributes::default(),
    TraceId::from_u128(3),
  );
  let mut parts = record.clone().into_parts();
  assert_eq!(record, LogRecord::from(parts.clone()));

  parts.body = "changed".to_string();
  let changed = LogRecord::from(parts);
  assert_eq!("changed", changed.body());
  assert_eq!("parts", record.body());
}
