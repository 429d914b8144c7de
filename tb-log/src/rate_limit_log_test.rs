// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use super::RateLimitTracker;
use crate::{error_every, warn_every};
use tb_time::TimeDurationExt;
use time::ext::NumericalDuration;

fn dropped_batch() {
  warn_every!(1.seconds(), "dropped batch of {} records", 3);
}

#[tokio::test(start_paused = true)]
async fn tracker_counts_suppressed_calls() {
  let tracker = RateLimitTracker::default();

  assert_eq!(Some(0), tracker.try_emit(1.seconds()));
  assert_eq!(None, tracker.try_emit(1.seconds()));
  assert_eq!(None, tracker.try_emit(1.seconds()));

  500.milliseconds().sleep().await;
  assert_eq!(None, tracker.try_emit(1.seconds()));

  501.milliseconds().sleep().await;
  assert_eq!(Some(3), tracker.try_emit(1.seconds()));
  assert_eq!(None, tracker.try_emit(1.seconds()));
}

#[tokio::test(start_paused = true)]
async fn macro_call_sites_are_independent() {
  warn_every!(1.seconds(), "{}", "hello");
  warn_every!(1.seconds(), "{}", "world");

  dropped_batch();
  dropped_batch();

  1001.milliseconds().sleep().await;
  dropped_batch();
}

#[tokio::test(start_paused = true)]
async fn error_every_shares_the_tracker_semantics() {
  fn failed_encode() {
    error_every!(1.seconds(), "failed to encode {} records", 2);
  }

  failed_encode();
  failed_encode();

  1001.milliseconds().sleep().await;
  failed_encode();
}
