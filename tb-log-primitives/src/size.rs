// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./size_test.rs"]
mod size_test;

use crate::{AttributeValue, Attributes, LogRecord};

//
// EncodedSize
//

// An estimate of the number of bytes an object occupies once JSON encoded. This is used for buffer
// accounting and does not need to be exact, only monotonic in the amount of content and cheap to
// compute without actually encoding.
pub trait EncodedSize {
  fn encoded_size(&self) -> usize;
}

// `{"type":"","value":}` plus the longest type name.
const ATTRIBUTE_ENVELOPE_OVERHEAD: usize = 32;

// Fixed keys, punctuation, the timestamp, the level and the severity number of a record.
const RECORD_OVERHEAD: usize = 128;

// Escaping is not accounted for.
fn quoted(s: &str) -> usize {
  s.len() + 2
}

impl EncodedSize for AttributeValue {
  fn encoded_size(&self) -> usize {
    ATTRIBUTE_ENVELOPE_OVERHEAD
      + match self {
        Self::String(s) => quoted(s),
        Self::Bool(_) => 5,
        Self::Int(_) => 20,
        Self::Double(_) => 24,
        Self::Array(values) => {
          2 + values
            .iter()
            .map(|v| v.encoded_size() - ATTRIBUTE_ENVELOPE_OVERHEAD + 1)
            .sum::<usize>()
        },
      }
  }
}

impl EncodedSize for Attributes {
  fn encoded_size(&self) -> usize {
    2 + self
      .iter()
      .map(|(k, v)| quoted(k) + 1 + v.encoded_size() + 1)
      .sum::<usize>()
  }
}

impl EncodedSize for LogRecord {
  fn encoded_size(&self) -> usize {
    RECORD_OVERHEAD + 34 + quoted(self.body()) + self.attributes().encoded_size()
  }
}
