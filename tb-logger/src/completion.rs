// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./completion_test.rs"]
mod completion_test;

use std::time::{Duration, Instant};
use tokio::sync::oneshot;

const POLL_INTERVAL: Duration = Duration::from_millis(2);

// Creates a one-shot signal used to tell a waiter that a flush (or shutdown) has finished.
#[must_use]
pub fn completion() -> (CompletionSender, CompletionReceiver) {
  let (tx, rx) = oneshot::channel();
  (CompletionSender { tx }, CompletionReceiver { rx })
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum WaitError {
  #[error("timed out waiting for completion")]
  Timeout,
  // The sender was dropped without completing, e.g. the run loop exited.
  #[error("completion was abandoned")]
  Abandoned,
}

//
// CompletionSender
//

#[derive(Debug)]
pub struct CompletionSender {
  tx: oneshot::Sender<()>,
}

impl CompletionSender {
  pub fn complete(self) {
    // The waiter may have given up already.
    if self.tx.send(()).is_err() {
      log::debug!("completion receiver dropped before completion");
    }
  }
}

//
// CompletionReceiver
//

#[derive(Debug)]
pub struct CompletionReceiver {
  rx: oneshot::Receiver<()>,
}

impl CompletionReceiver {
  pub async fn wait(self) -> Result<(), WaitError> {
    self.rx.await.map_err(|_| WaitError::Abandoned)
  }

  // Waits from a thread that is not driving a tokio runtime. Must not be called from within the
  // runtime that is expected to complete the signal.
  pub fn wait_blocking(mut self, timeout: Duration) -> Result<(), WaitError> {
    let deadline = Instant::now() + timeout;

    loop {
      match self.rx.try_recv() {
        Ok(()) => return Ok(()),
        Err(oneshot::error::TryRecvError::Closed) => return Err(WaitError::Abandoned),
        Err(oneshot::error::TryRecvError::Empty) => {},
      }

      let now = Instant::now();
      if now >= deadline {
        return Err(WaitError::Timeout);
      }
      std::thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
  }
}
