// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./rate_limit_log_test.rs"]
mod rate_limit_log_test;

use parking_lot::Mutex;
use time::Duration;
use tokio::time::Instant;

#[derive(Default)]
struct TrackerState {
  last_emitted: Option<Instant>,
  suppressed: u64,
}

//
// RateLimitTracker
//

// Per call site state for the `*_every!` macros. Emission is allowed at most once per window, and
// the number of messages swallowed since the last emission is reported alongside the next one.
#[derive(Default)]
pub struct RateLimitTracker {
  state: Mutex<TrackerState>,
}

impl RateLimitTracker {
  // Returns `Some(suppressed)` if the caller should emit at the elevated level, where `suppressed`
  // is the number of calls that were demoted since the previous emission.
  pub fn try_emit(&self, window: Duration) -> Option<u64> {
    let now = Instant::now();
    let mut state = self.state.lock();
    let emit = state
      .last_emitted
      .is_none_or(|last| now - last > window.unsigned_abs());
    if emit {
      state.last_emitted = Some(now);
      return Some(std::mem::take(&mut state.suppressed));
    }

    state.suppressed += 1;
    None
  }
}

#[macro_export]
macro_rules! warn_every {
  ($window:expr, $first:tt) => {
    $crate::log_every!(log::Level::Warn, $window, "{}", $first);
  };
  ($window:expr, $first:tt, $($arg:tt)+) => {
    $crate::log_every!(log::Level::Warn, $window, $first, $($arg)+);
  };
}

#[macro_export]
macro_rules! error_every {
  ($window:expr, $first:tt, $($arg:tt)+) => {
    $crate::log_every!(log::Level::Error, $window, $first, $($arg)+);
  };
}

#[macro_export]
macro_rules! log_every {
  ($level:expr, $window:expr, $first:tt, $($arg:tt)+) => {
    {
      use $crate::rate_limit_log::RateLimitTracker;
      use std::sync::OnceLock;

      static TRACKER: OnceLock<RateLimitTracker> = OnceLock::new();

      match TRACKER.get_or_init(RateLimitTracker::default).try_emit($window) {
        Some(0) => log::log!($level, $first, $($arg)+),
        Some(suppressed) => {
          log::log!($level, $first, $($arg)+);
          log::log!($level, "({suppressed} similar messages suppressed)");
        },
        None => log::debug!($first, $($arg)+),
      }
    }
  };
}

pub use {error_every, log_every, warn_every};
