// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#![allow(clippy::unwrap_used)]

use crate::{CrashSnapshot, TerminationWriter};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tb_envelope::{encode_record, parse_payload};
use tb_log_primitives::LogLevel;
use tb_test_helpers::{bodies, make_record, numbered_records};

fn encoded(count: usize) -> Vec<Arc<[u8]>> {
  numbered_records(count)
    .iter()
    .map(|r| encode_record(r).unwrap().into())
    .collect()
}

#[test]
fn empty_snapshot_is_a_valid_payload() {
  let snapshot = CrashSnapshot::default();
  let mut out = Vec::new();

  assert_eq!(0, snapshot.write_to(&mut out).unwrap());
  assert_eq!(br#"{"items":[]}"#.to_vec(), out);
  assert_eq!(0, snapshot.pending_items());
}

#[test]
fn published_items_are_written_in_order() {
  let snapshot = CrashSnapshot::default();
  snapshot.publish(encoded(3));
  assert_eq!(3, snapshot.pending_items());

  let mut out = Vec::new();
  assert_eq!(3, snapshot.write_to(&mut out).unwrap());
  assert_eq!(vec!["0", "1", "2"], bodies(&parse_payload(&out).unwrap()));

  snapshot.clear();
  assert_eq!(0, snapshot.pending_items());
}

#[test]
fn readers_see_whole_publications() {
  let snapshot = Arc::new(CrashSnapshot::default());
  let record = encode_record(&make_record(LogLevel::Info, "x")).unwrap();

  let writer = {
    let snapshot = snapshot.clone();
    std::thread::spawn(move || {
      let mut items: Vec<Arc<[u8]>> = Vec::new();
      for _ in 0 .. 200 {
        items.push(record.clone().into());
        snapshot.publish(items.clone());
      }
    })
  };

  for _ in 0 .. 200 {
    let mut out = Vec::new();
    let written = snapshot.write_to(&mut out).unwrap();
    assert_eq!(written, parse_payload(&out).unwrap().len());
  }

  writer.join().unwrap();
  assert_eq!(200, snapshot.pending_items());
}
