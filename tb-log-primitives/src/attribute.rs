// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use ahash::AHashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub type Attributes = AHashMap<String, AttributeValue>;

//
// AttributeValue
//

// A typed attribute value. On the wire each value is emitted as `{"type": ..., "value": ...}` so
// that consumers see the original JSON type rather than a stringified form.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
  String(String),
  Bool(bool),
  Int(i64),
  Double(f64),
  Array(Vec<AttributeValue>),
}

impl AttributeValue {
  #[must_use]
  pub fn as_str(&self) -> Option<&str> {
    match self {
      Self::String(s) => Some(s),
      _ => None,
    }
  }
}

impl From<String> for AttributeValue {
  fn from(value: String) -> Self {
    Self::String(value)
  }
}

impl From<&str> for AttributeValue {
  fn from(value: &str) -> Self {
    Self::String(value.to_string())
  }
}

impl From<bool> for AttributeValue {
  fn from(value: bool) -> Self {
    Self::Bool(value)
  }
}

impl From<i64> for AttributeValue {
  fn from(value: i64) -> Self {
    Self::Int(value)
  }
}

impl From<i32> for AttributeValue {
  fn from(value: i32) -> Self {
    Self::Int(value.into())
  }
}

impl From<f64> for AttributeValue {
  fn from(value: f64) -> Self {
    Self::Double(value)
  }
}

impl<T: Into<Self>> From<Vec<T>> for AttributeValue {
  fn from(value: Vec<T>) -> Self {
    Self::Array(value.into_iter().map(Into::into).collect())
  }
}

//
// AttributeEncodingError
//

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AttributeEncodingError {
  #[error("double attribute is not finite")]
  NonFiniteDouble,
  #[error("array attribute mixes element types")]
  MixedArray,
  #[error("array attribute contains a nested array")]
  NestedArray,
}

#[derive(Serialize)]
#[serde(tag = "type", content = "value")]
enum WireValueRef<'a> {
  #[serde(rename = "string")]
  String(&'a str),
  #[serde(rename = "boolean")]
  Bool(bool),
  #[serde(rename = "integer")]
  Int(i64),
  #[serde(rename = "double")]
  Double(f64),
  #[serde(rename = "string[]")]
  StringArray(Vec<&'a str>),
  #[serde(rename = "boolean[]")]
  BoolArray(Vec<bool>),
  #[serde(rename = "integer[]")]
  IntArray(Vec<i64>),
  #[serde(rename = "double[]")]
  DoubleArray(Vec<f64>),
}

#[derive(Deserialize)]
#[serde(tag = "type", content = "value")]
enum WireValue {
  #[serde(rename = "string")]
  String(String),
  #[serde(rename = "boolean")]
  Bool(bool),
  #[serde(rename = "integer")]
  Int(i64),
  #[serde(rename = "double")]
  Double(f64),
  #[serde(rename = "string[]")]
  StringArray(Vec<String>),
  #[serde(rename = "boolean[]")]
  BoolArray(Vec<bool>),
  #[serde(rename = "integer[]")]
  IntArray(Vec<i64>),
  #[serde(rename = "double[]")]
  DoubleArray(Vec<f64>),
}

const fn finite(value: f64) -> Result<f64, AttributeEncodingError> {
  if value.is_finite() {
    Ok(value)
  } else {
    Err(AttributeEncodingError::NonFiniteDouble)
  }
}

// Collects every element of a homogeneous array through `extract`, which returns None for elements
// of the wrong kind.
fn homogeneous<'a, T>(
  values: &'a [AttributeValue],
  extract: impl Fn(&'a AttributeValue) -> Option<Result<T, AttributeEncodingError>>,
) -> Result<Vec<T>, AttributeEncodingError> {
  values
    .iter()
    .map(|value| {
      if matches!(value, AttributeValue::Array(_)) {
        return Err(AttributeEncodingError::NestedArray);
      }
      extract(value).ok_or(AttributeEncodingError::MixedArray)?
    })
    .collect()
}

impl<'a> TryFrom<&'a AttributeValue> for WireValueRef<'a> {
  type Error = AttributeEncodingError;

  fn try_from(value: &'a AttributeValue) -> Result<Self, Self::Error> {
    Ok(match value {
      AttributeValue::String(s) => Self::String(s),
      AttributeValue::Bool(b) => Self::Bool(*b),
      AttributeValue::Int(i) => Self::Int(*i),
      AttributeValue::Double(d) => Self::Double(finite(*d)?),
      AttributeValue::Array(values) => match values.first() {
        // An empty array carries no element type. It is emitted as an empty string array.
        None | Some(AttributeValue::String(_)) => Self::StringArray(homogeneous(values, |v| {
          v.as_str().map(Ok)
        })?),
        Some(AttributeValue::Bool(_)) => Self::BoolArray(homogeneous(values, |v| match v {
          AttributeValue::Bool(b) => Some(Ok(*b)),
          _ => None,
        })?),
        Some(AttributeValue::Int(_)) => Self::IntArray(homogeneous(values, |v| match v {
          AttributeValue::Int(i) => Some(Ok(*i)),
          _ => None,
        })?),
        Some(AttributeValue::Double(_)) => Self::DoubleArray(homogeneous(values, |v| match v {
          AttributeValue::Double(d) => Some(finite(*d)),
          _ => None,
        })?),
        Some(AttributeValue::Array(_)) => return Err(AttributeEncodingError::NestedArray),
      },
    })
  }
}

impl From<WireValue> for AttributeValue {
  fn from(value: WireValue) -> Self {
    match value {
      WireValue::String(s) => Self::String(s),
      WireValue::Bool(b) => Self::Bool(b),
      WireValue::Int(i) => Self::Int(i),
      WireValue::Double(d) => Self::Double(d),
      WireValue::StringArray(values) => values.into(),
      WireValue::BoolArray(values) => values.into(),
      WireValue::IntArray(values) => values.into(),
      WireValue::DoubleArray(values) => values.into(),
    }
  }
}

impl Serialize for AttributeValue {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    WireValueRef::try_from(self)
      .map_err(serde::ser::Error::custom)?
      .serialize(serializer)
  }
}

impl<'de> Deserialize<'de> for AttributeValue {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    WireValue::deserialize(deserializer).map(Into::into)
  }
}

pub fn validate(value: &AttributeValue) -> Result<(), AttributeEncodingError> {
  WireValueRef::try_from(value).map(|_| ())
}
