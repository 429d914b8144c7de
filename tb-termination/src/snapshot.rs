// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::TerminationWriter;
use arc_swap::ArcSwap;
use std::io::Write;
use std::sync::Arc;

pub type EncodedItem = Arc<[u8]>;

//
// CrashSnapshot
//

// The pending batch, pre-encoded one record at a time. Writers republish the whole item list under
// their own lock; the termination path only performs an atomic load, so it never contends with a
// writer and never allocates.
#[derive(Default)]
pub struct CrashSnapshot {
  items: ArcSwap<Vec<EncodedItem>>,
}

impl CrashSnapshot {
  pub fn publish(&self, items: Vec<EncodedItem>) {
    self.items.store(Arc::new(items));
  }

  pub fn clear(&self) {
    self.publish(Vec::new());
  }
}

impl TerminationWriter for CrashSnapshot {
  fn pending_items(&self) -> usize {
    self.items.load().len()
  }

  fn write_to(&self, out: &mut dyn Write) -> std::io::Result<usize> {
    let items = self.items.load();

    out.write_all(b"{\"items\":[")?;
    for (index, item) in items.iter().enumerate() {
      if index > 0 {
        out.write_all(b",")?;
      }
      out.write_all(item)?;
    }
    out.write_all(b"]}")?;
    out.flush()?;

    Ok(items.len())
  }
}
