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
#[path = "./snapshot_test.rs"]
mod snapshot_test;

mod notifier;
mod snapshot;

pub use notifier::{ManualTerminationNotifier, PanicHookNotifier, write_marker};
use sha2::{Digest, Sha256};
pub use snapshot::CrashSnapshot;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tb_envelope::parse_payload;
use tb_log_primitives::LogRecord;

#[cfg(test)]
#[ctor::ctor]
fn test_global_init() {
  tb_test_helpers::test_global_init();
}

pub const SDK_DIRECTORY: &str = "io.sentry";
pub const TELEMETRY_BUFFER_DIRECTORY: &str = "telemetry-buffer";
pub const MARKER_FILE_NAME: &str = "detected-termination";

// Hex encoded SHA-256 of the DSN. Keeps the state of different projects sharing a cache directory
// apart.
#[must_use]
pub fn dsn_hash(dsn: &str) -> String {
  format!("{:x}", Sha256::digest(dsn.as_bytes()))
}

//
// TerminationWriter
//

// Something that can dump pending state at termination time. Implementations must not block on
// locks held by other threads, since the terminating thread may be the one holding them.
pub trait TerminationWriter: Send + Sync {
  fn pending_items(&self) -> usize;

  // Writes the pending state as an envelope payload and returns the number of items written.
  fn write_to(&self, out: &mut dyn Write) -> std::io::Result<usize>;
}

//
// TerminationNotifier
//

// The hook through which the platform tells us the process is going down abnormally. On
// notification every registered writer is asked to persist to its marker path.
#[cfg_attr(test, mockall::automock)]
pub trait TerminationNotifier: Send + Sync {
  fn register(&self, marker_path: &Path, writer: Arc<dyn TerminationWriter>);
}

//
// RecoveryOutcome
//

#[derive(Debug, PartialEq)]
pub enum RecoveryOutcome {
  // No marker was left behind: the previous session ended cleanly or had nothing pending.
  NoMarker,
  // A marker existed but carried no items.
  Empty,
  Recovered(Vec<LogRecord>),
  // The marker could not be read or parsed. It has been deleted.
  Corrupt(String),
}

//
// TerminationRecoveryStore
//

pub struct TerminationRecoveryStore {
  directory: PathBuf,
  marker_path: PathBuf,
  snapshot: Arc<CrashSnapshot>,
}

impl TerminationRecoveryStore {
  #[must_use]
  pub fn new(cache_dir: &Path, dsn: &str) -> Self {
    let directory = cache_dir
      .join(SDK_DIRECTORY)
      .join(dsn_hash(dsn))
      .join(TELEMETRY_BUFFER_DIRECTORY);
    let marker_path = directory.join(MARKER_FILE_NAME);

    Self {
      directory,
      marker_path,
      snapshot: Arc::new(CrashSnapshot::default()),
    }
  }

  #[must_use]
  pub fn marker_path(&self) -> &Path {
    &self.marker_path
  }

  #[must_use]
  pub fn snapshot(&self) -> Arc<CrashSnapshot> {
    self.snapshot.clone()
  }

  pub fn prepare_directory(&self) -> anyhow::Result<()> {
    std::fs::create_dir_all(&self.directory)?;
    Ok(())
  }

  // Registers the snapshot with the notifier for the rest of the session. A clean shutdown leaves
  // the snapshot empty, in which case nothing is written if the notifier fires late.
  pub fn arm(&self, notifier: &dyn TerminationNotifier) {
    log::debug!(
      "arming termination recovery at {}",
      self.marker_path.display()
    );
    notifier.register(&self.marker_path, self.snapshot.clone());
  }

  // Consumes whatever the previous session left behind. The marker is removed whenever it exists,
  // regardless of whether it could be parsed, so a bad file is never retried.
  pub fn recover(&self) -> RecoveryOutcome {
    let bytes = match std::fs::read(&self.marker_path) {
      Ok(bytes) => bytes,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return RecoveryOutcome::NoMarker,
      Err(e) => {
        log::warn!(
          "failed to read termination marker: {:?} ({e})",
          self.marker_path
        );
        self.remove_marker();
        return RecoveryOutcome::Corrupt(e.to_string());
      },
    };

    self.remove_marker();

    match parse_payload(&bytes) {
      Ok(records) if records.is_empty() => RecoveryOutcome::Empty,
      Ok(records) => {
        log::info!(
          "recovered {} log records from previous session",
          records.len()
        );
        RecoveryOutcome::Recovered(records)
      },
      Err(e) => {
        log::warn!(
          "discarding corrupt termination marker: {:?} ({e})",
          self.marker_path
        );
        RecoveryOutcome::Corrupt(e.to_string())
      },
    }
  }

  // Removes a marker written earlier in this session, e.g. by a panic the host caught, once the
  // records it holds are no longer pending. Returns whether a marker was removed.
  pub fn discard_marker(&self) -> bool {
    match std::fs::remove_file(&self.marker_path) {
      Ok(()) => {
        log::debug!("discarded stale termination marker {:?}", self.marker_path);
        true
      },
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
      Err(e) => {
        log::warn!(
          "failed to discard termination marker: {:?} ({e})",
          self.marker_path
        );
        false
      },
    }
  }

  fn remove_marker(&self) {
    if let Err(e) = std::fs::remove_file(&self.marker_path) {
      log::warn!(
        "failed to remove termination marker: {:?} ({e})",
        self.marker_path
      );
    }
  }
}
