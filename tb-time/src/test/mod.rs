// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::Ticker;
use async_trait::async_trait;
use tokio::sync::mpsc;

//
// TestTicker
//

// A ticker that only fires when the paired sender is used. Once the sender is dropped the ticker
// never fires again.
pub struct TestTicker {
  receiver: mpsc::Receiver<()>,
}

#[async_trait]
impl Ticker for TestTicker {
  async fn tick(&mut self) {
    if self.receiver.recv().await.is_none() {
      std::future::pending::<()>().await;
    }
  }
}

impl TestTicker {
  #[must_use]
  pub fn new() -> (mpsc::Sender<()>, Self) {
    let (tx, rx) = mpsc::channel(1);
    (tx, Self { receiver: rx })
  }
}
