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

#[cfg(test)]
#[path = "./lib_test.rs"]
mod lib_test;

pub mod attribute;
pub mod size;

pub use crate::attribute::{AttributeValue, Attributes};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use tb_time::OffsetDateTimeExt as _;
use time::OffsetDateTime;
use uuid::Uuid;

//
// LogLevel
//

// Severity of a record. Variants are declared in increasing order of severity so that the derived
// ordering is the severity ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
  Trace,
  Debug,
  Info,
  Warn,
  Error,
  Fatal,
}

impl LogLevel {
  #[must_use]
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Trace => "trace",
      Self::Debug => "debug",
      Self::Info => "info",
      Self::Warn => "warn",
      Self::Error => "error",
      Self::Fatal => "fatal",
    }
  }

  // The numeric severity emitted alongside the textual level. Each level is the lowest value of its
  // band.
  #[must_use]
  pub const fn severity_number(self) -> u8 {
    match self {
      Self::Trace => 1,
      Self::Debug => 5,
      Self::Info => 9,
      Self::Warn => 13,
      Self::Error => 17,
      Self::Fatal => 21,
    }
  }
}

impl fmt::Display for LogLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

//
// TraceId
//

// A 128-bit trace identifier, rendered as 32 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(Uuid);

impl TraceId {
  #[must_use]
  pub fn new_random() -> Self {
    Self(Uuid::new_v4())
  }

  #[must_use]
  pub const fn from_u128(value: u128) -> Self {
    Self(Uuid::from_u128(value))
  }
}

impl fmt::Display for TraceId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0.simple())
  }
}

impl FromStr for TraceId {
  type Err = InvalidId;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if s.len() != 32 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
      return Err(InvalidId(s.to_string()));
    }

    Uuid::try_parse(s)
      .map(Self)
      .map_err(|_| InvalidId(s.to_string()))
  }
}

impl Serialize for TraceId {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for TraceId {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
  }
}

//
// SpanId
//

// A 64-bit span identifier, rendered as 16 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanId(u64);

impl SpanId {
  #[must_use]
  pub fn new_random() -> Self {
    Self(Uuid::new_v4().as_u64_pair().0)
  }

  #[must_use]
  pub const fn from_u64(value: u64) -> Self {
    Self(value)
  }
}

impl fmt::Display for SpanId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:016x}", self.0)
  }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid identifier: {0:?}")]
pub struct InvalidId(String);

//
// LogRecord
//

// A single structured log record. Records are immutable once built: enrichment takes the record
// apart with `into_parts` and produces a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
  timestamp: OffsetDateTime,
  level: LogLevel,
  body: String,
  attributes: Attributes,
  trace_id: TraceId,
}

// The owned pieces of a record, used to construct or rebuild one.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecordParts {
  pub timestamp: OffsetDateTime,
  pub level: LogLevel,
  pub body: String,
  pub attributes: Attributes,
  pub trace_id: TraceId,
}

impl LogRecord {
  #[must_use]
  pub fn new(
    timestamp: OffsetDateTime,
    level: LogLevel,
    body: impl Into<String>,
    attributes: Attributes,
    trace_id: TraceId,
  ) -> Self {
    Self {
      timestamp,
      level,
      body: body.into(),
      attributes,
      trace_id,
    }
  }

  #[must_use]
  pub const fn timestamp(&self) -> OffsetDateTime {
    self.timestamp
  }

  #[must_use]
  pub const fn level(&self) -> LogLevel {
    self.level
  }

  #[must_use]
  pub fn body(&self) -> &str {
    &self.body
  }

  #[must_use]
  pub const fn attributes(&self) -> &Attributes {
    &self.attributes
  }

  #[must_use]
  pub const fn trace_id(&self) -> TraceId {
    self.trace_id
  }

  #[must_use]
  pub fn into_parts(self) -> LogRecordParts {
    LogRecordParts {
      timestamp: self.timestamp,
      level: self.level,
      body: self.body,
      attributes: self.attributes,
      trace_id: self.trace_id,
    }
  }
}

impl From<LogRecordParts> for LogRecord {
  fn from(parts: LogRecordParts) -> Self {
    Self {
      timestamp: parts.timestamp,
      level: parts.level,
      body: parts.body,
      attributes: parts.attributes,
      trace_id: parts.trace_id,
    }
  }
}

#[derive(Serialize)]
struct WireRecordRef<'a> {
  timestamp: f64,
  trace_id: TraceId,
  level: LogLevel,
  body: &'a str,
  attributes: &'a Attributes,
  severity_number: u8,
}

#[derive(Deserialize)]
struct WireRecord {
  timestamp: f64,
  trace_id: TraceId,
  level: LogLevel,
  body: String,
  #[serde(default)]
  attributes: Attributes,
}

impl Serialize for LogRecord {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    WireRecordRef {
      timestamp: self.timestamp.unix_timestamp_secs_f64(),
      trace_id: self.trace_id,
      level: self.level,
      body: &self.body,
      attributes: &self.attributes,
      severity_number: self.level.severity_number(),
    }
    .serialize(serializer)
  }
}

// The level is authoritative on decode. Any severity_number present is ignored.
impl<'de> Deserialize<'de> for LogRecord {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let wire = WireRecord::deserialize(deserializer)?;
    let timestamp = OffsetDateTime::from_unix_timestamp_secs_f64(wire.timestamp).ok_or_else(|| {
      serde::de::Error::custom(format!("timestamp out of range: {}", wire.timestamp))
    })?;

    Ok(Self {
      timestamp,
      level: wire.level,
      body: wire.body,
      attributes: wire.attributes,
      trace_id: wire.trace_id,
    })
  }
}
