// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::{TerminationNotifier, TerminationWriter};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// Persists the writer's pending items to `marker_path`. Nothing is written when there is nothing
// pending, so that an idle session leaves no marker behind.
pub fn write_marker(marker_path: &Path, writer: &dyn TerminationWriter) -> std::io::Result<usize> {
  if writer.pending_items() == 0 {
    return Ok(0);
  }

  let mut file = std::fs::File::create(marker_path)?;
  writer.write_to(&mut file)
}

//
// PanicHookNotifier
//

// Writes the marker from a panic hook. The previously installed hook is chained after the write so
// that existing panic reporting is unaffected.
pub struct PanicHookNotifier;

impl TerminationNotifier for PanicHookNotifier {
  fn register(&self, marker_path: &Path, writer: Arc<dyn TerminationWriter>) {
    let marker_path = marker_path.to_path_buf();
    let previous = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |info| {
      if let Err(e) = write_marker(&marker_path, writer.as_ref()) {
        log::error!("failed to write termination marker {marker_path:?} ({e})");
      }
      previous(info);
    }));
  }
}

//
// ManualTerminationNotifier
//

// For hosts that detect abnormal termination themselves (signal handlers, OS termination
// callbacks) and want to trigger the write explicitly.
#[derive(Default)]
pub struct ManualTerminationNotifier {
  registrations: Mutex<Vec<(PathBuf, Arc<dyn TerminationWriter>)>>,
}

impl ManualTerminationNotifier {
  // Writes every registered marker and returns the total number of items persisted.
  pub fn notify_termination(&self) -> usize {
    let registrations = self.registrations.lock();
    registrations
      .iter()
      .map(|(path, writer)| {
        write_marker(path, writer.as_ref()).unwrap_or_else(|e| {
          log::error!("failed to write termination marker {path:?} ({e})");
          0
        })
      })
      .sum()
  }
}

impl TerminationNotifier for ManualTerminationNotifier {
  fn register(&self, marker_path: &Path, writer: Arc<dyn TerminationWriter>) {
    self
      .registrations
      .lock()
      .push((marker_path.to_path_buf(), writer));
  }
}
