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


use serde::{Deserialize, Serialize};
use tb_log_primitives::LogRecord;

pub const LOG_ITEM_TYPE: &str = "log";
pub const LOG_CONTENT_TYPE: &str = "application/vnd.sentry.items.log+json";

//
// SerializationError
//

#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
  #[error("refusing to build an envelope with no records")]
  EmptyBatch,
  #[error("record encoding failed: {0}")]
  Encoding(#[from] serde_json::Error),
}

//
// PayloadError
//

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
  #[error("payload is not valid JSON: {0}")]
  InvalidJson(serde_json::Error),
  #[error("payload does not contain an items array: {0}")]
  MissingItems(serde_json::Error),
  #[error("payload item {index} is not a log record: {source}")]
  InvalidRecord {
    index: usize,
    source: serde_json::Error,
  },
}

//
// EnvelopeItemHeader
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeItemHeader {
  #[serde(rename = "type")]
  pub item_type: String,
  pub length: usize,
  pub item_count: usize,
  pub content_type: String,
}

//
// Envelope
//

// A single-item envelope carrying a batch of log records. The envelope header is always empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
  item_header: EnvelopeItemHeader,
  payload: Vec<u8>,
}

impl Envelope {
  #[must_use]
  pub const fn item_header(&self) -> &EnvelopeItemHeader {
    &self.item_header
  }

  #[must_use]
  pub fn payload(&self) -> &[u8] {
    &self.payload
  }

  #[must_use]
  pub const fn item_count(&self) -> usize {
    self.item_header.item_count
  }

  // Renders the newline delimited wire form: envelope header, item header, payload.
  pub fn to_bytes(&self) -> Result<Vec<u8>, SerializationError> {
    let item_header = serde_json::to_vec(&self.item_header)?;
    let mut bytes = Vec::with_capacity(3 + item_header.len() + 1 + self.payload.len());
    bytes.extend_from_slice(b"{}\n");
    bytes.extend_from_slice(&item_header);
    bytes.push(b'\n');
    bytes.extend_from_slice(&self.payload);
    Ok(bytes)
  }
}

//
// EnvelopeSerializer
//

#[mockall::automock]
pub trait EnvelopeSerializer: Send + Sync {
  // Builds an envelope for the batch. Any record that fails to encode fails the whole batch.
  fn serialize(&self, records: &[LogRecord]) -> Result<Envelope, SerializationError>;
}

//
// TelemetryTransport
//

// The outbound seam. Implementations own delivery, rate limiting and any persistence. The pipeline
// calls this at most once per envelope and never retries.
#[mockall::automock]
pub trait TelemetryTransport: Send + Sync {
  fn send_envelope(&self, envelope: Envelope) -> anyhow::Result<()>;
}

//
// JsonEnvelopeSerializer
//

#[derive(Default)]
pub struct JsonEnvelopeSerializer;

#[derive(Serialize)]
struct PayloadRef<'a> {
  items: &'a [LogRecord],
}

impl EnvelopeSerializer for JsonEnvelopeSerializer {
  fn serialize(&self, records: &[LogRecord]) -> Result<Envelope, SerializationError> {
    if records.is_empty() {
      return Err(SerializationError::EmptyBatch);
    }

    let payload = serde_json::to_vec(&PayloadRef { items: records })?;
    Ok(Envelope {
      item_header: EnvelopeItemHeader {
        item_type: LOG_ITEM_TYPE.to_string(),
        length: payload.len(),
        item_count: records.len(),
        content_type: LOG_CONTENT_TYPE.to_string(),
      },
      payload,
    })
  }
}

#[derive(Deserialize)]
struct UntypedPayload {
  items: Vec<serde_json::Value>,
}

// Parses an envelope payload (`{"items": [...]}`) back into records.
pub fn parse_payload(bytes: &[u8]) -> Result<Vec<LogRecord>, PayloadError> {
  let value: serde_json::Value = serde_json::from_slice(bytes).map_err(PayloadError::InvalidJson)?;
  let payload: UntypedPayload =
    serde_json::from_value(value).map_err(PayloadError::MissingItems)?;

  payload
    .items
    .into_iter()
    .enumerate()
    .map(|(index, item)| {
      serde_json::from_value(item).map_err(|source| PayloadError::InvalidRecord { index, source })
    })
    .collect()
}

// Renders records as the payload form, without validating that there is at least one.
pub fn encode_payload(records: &[LogRecord]) -> Result<Vec<u8>, serde_json::Error> {
  serde_json::to_vec(&PayloadRef { items: records })
}

// Encodes a single record as it would appear inside the items array.
pub fn encode_record(record: &LogRecord) -> Result<Vec<u8>, serde_json::Error> {
  serde_json::to_vec(record)
}
