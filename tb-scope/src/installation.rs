// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub(crate) const INSTALLATION_FILE_NAME: &str = "INSTALLATION";

//
// InstallationId
//

// A random identifier for this install of the host application, persisted in the cache directory
// and used as the user id of last resort. The id is resolved at most once per process.
pub struct InstallationId {
  path: PathBuf,
  id: Mutex<Option<String>>,
}

impl InstallationId {
  #[must_use]
  pub fn new(cache_dir: &Path) -> Self {
    Self {
      path: cache_dir.join(INSTALLATION_FILE_NAME),
      id: Mutex::new(None),
    }
  }

  pub fn id(&self) -> String {
    let mut guard = self.id.lock();

    if let Some(id) = guard.as_ref() {
      return id.clone();
    }

    let id = self.read().unwrap_or_else(|| {
      let id = Uuid::new_v4().to_string();
      // A failed write only means the id will not survive a restart.
      if let Err(e) = self.write(&id) {
        log::warn!(
          "failed to persist installation id to {}: {e}",
          self.path.display()
        );
      }
      id
    });

    log::debug!("installation id: {id:?}");
    *guard = Some(id.clone());
    id
  }

  fn read(&self) -> Option<String> {
    match std::fs::read_to_string(&self.path) {
      Ok(contents) => {
        let id = contents.trim();
        (!id.is_empty()).then(|| id.to_string())
      },
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
      Err(e) => {
        log::warn!(
          "failed to read installation id from {}: {e}",
          self.path.display()
        );
        None
      },
    }
  }

  fn write(&self, id: &str) -> std::io::Result<()> {
    if let Some(parent) = self.path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&self.path, id)
  }
}
