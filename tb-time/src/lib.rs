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


pub mod test;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::time::{Interval, MissedTickBehavior, Timeout};

//
// OffsetDateTimeExt
//

pub trait OffsetDateTimeExt {
  // Fractional seconds since the Unix epoch, with microsecond resolution.
  fn unix_timestamp_secs_f64(&self) -> f64;

  // Inverse of `unix_timestamp_secs_f64`. Returns None for non-finite or out of range input.
  fn from_unix_timestamp_secs_f64(secs: f64) -> Option<OffsetDateTime>;
}

impl OffsetDateTimeExt for OffsetDateTime {
  #[allow(clippy::cast_precision_loss)]
  fn unix_timestamp_secs_f64(&self) -> f64 {
    let micros = self.unix_timestamp_nanos() / 1_000;
    micros as f64 / 1_000_000.0
  }

  #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
  fn from_unix_timestamp_secs_f64(secs: f64) -> Option<OffsetDateTime> {
    if !secs.is_finite() {
      return None;
    }

    let micros = (secs * 1_000_000.0).round();
    if micros.abs() > i64::MAX as f64 {
      return None;
    }

    OffsetDateTime::from_unix_timestamp_nanos(i128::from(micros as i64) * 1_000).ok()
  }
}

//
// TimeDurationExt
//

pub trait TimeDurationExt {
  fn sleep(self) -> impl Future<Output = ()>;
  fn interval(self, behavior: MissedTickBehavior) -> Interval;
  fn timeout<F: IntoFuture>(self, f: F) -> Timeout<F::IntoFuture>;
}

impl TimeDurationExt for time::Duration {
  fn sleep(self) -> impl Future<Output = ()> {
    tokio::time::sleep(self.unsigned_abs())
  }

  // The first tick fires one period from now rather than immediately.
  fn interval(self, behavior: MissedTickBehavior) -> Interval {
    let period = self.unsigned_abs();
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(behavior);
    interval
  }

  fn timeout<F: IntoFuture>(self, f: F) -> Timeout<F::IntoFuture> {
    tokio::time::timeout(self.unsigned_abs(), f)
  }
}

//
// Ticker
//

// A source of periodic wakeups for run loops. Abstracted so that tests can drive ticks by hand.
#[async_trait]
pub trait Ticker: Send {
  async fn tick(&mut self);
}

//
// IntervalTicker
//

// The underlying interval is created on the first tick, so the ticker can be constructed outside
// of a runtime and handed to the task that will drive it.
pub struct IntervalTicker {
  period: time::Duration,
  interval: Option<Interval>,
}

impl IntervalTicker {
  #[must_use]
  pub const fn new(period: time::Duration) -> Self {
    Self {
      period,
      interval: None,
    }
  }
}

#[async_trait]
impl Ticker for IntervalTicker {
  async fn tick(&mut self) {
    let period = self.period;
    self
      .interval
      .get_or_insert_with(|| period.interval(MissedTickBehavior::Delay))
      .tick()
      .await;
  }
}

//
// TimeProvider
//

pub trait TimeProvider: Send + Sync {
  fn now(&self) -> OffsetDateTime;
}

//
// SystemTimeProvider
//

pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
  fn now(&self) -> OffsetDateTime {
    OffsetDateTime::now_utc()
  }
}

//
// TestTimeProvider
//

#[derive(Clone)]
pub struct TestTimeProvider {
  now: Arc<Mutex<OffsetDateTime>>,
}

impl TestTimeProvider {
  #[must_use]
  pub fn new(now: OffsetDateTime) -> Self {
    Self {
      now: Arc::new(Mutex::new(now)),
    }
  }

  pub fn advance(&self, duration: time::Duration) {
    *self.now.lock() += duration;
  }

  pub fn set_time(&self, new_time: OffsetDateTime) {
    *self.now.lock() = new_time;
  }
}

impl TimeProvider for TestTimeProvider {
  fn now(&self) -> OffsetDateTime {
    *self.now.lock()
  }
}
