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



mod enricher;
mod installation;

pub use enricher::{ScopeAttributeEnricher, keys};
pub use installation::InstallationId;
use parking_lot::RwLock;
use tb_log_primitives::{Attributes, SpanId, TraceId};

#[cfg(test)]
#[ctor::ctor]
fn test_global_init() {
  tb_test_helpers::test_global_init();
}

//
// SdkMetadata
//

// Process wide values stamped onto every record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkMetadata {
  pub sdk_name: String,
  pub sdk_version: String,
  pub environment: String,
  pub release: Option<String>,
  pub installation_id: Option<String>,

  // When false, user identity from the scope is not attached. The installation id fallback still
  // applies.
  pub send_default_pii: bool,
}

impl Default for SdkMetadata {
  fn default() -> Self {
    Self {
      sdk_name: env!("CARGO_PKG_NAME").to_string(),
      sdk_version: env!("CARGO_PKG_VERSION").to_string(),
      environment: "production".to_string(),
      release: None,
      installation_id: None,
      send_default_pii: false,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
  pub id: Option<String>,
  pub username: Option<String>,
  pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanContext {
  pub trace_id: TraceId,
  pub span_id: SpanId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsContext {
  pub name: Option<String>,
  pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceContext {
  pub brand: Option<String>,
  pub model: Option<String>,
  pub family: Option<String>,
}

//
// Scope
//

// A point in time view of the ambient context a record is captured under.
#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
  pub user: Option<User>,
  pub active_span: Option<SpanContext>,
  pub propagation_trace_id: TraceId,
  pub os: OsContext,
  pub device: DeviceContext,
  pub replay_id: Option<String>,
  pub attributes: Attributes,
}

impl Default for Scope {
  fn default() -> Self {
    Self {
      user: None,
      active_span: None,
      propagation_trace_id: TraceId::new_random(),
      os: OsContext::default(),
      device: DeviceContext::default(),
      replay_id: None,
      attributes: Attributes::default(),
    }
  }
}

//
// ScopeProvider
//

pub trait ScopeProvider: Send + Sync {
  fn snapshot(&self) -> Scope;
}

//
// SharedScope
//

// A scope that the host mutates as its context changes and that the pipeline snapshots once per
// record.
#[derive(Default)]
pub struct SharedScope {
  scope: RwLock<Scope>,
}

impl SharedScope {
  #[must_use]
  pub fn new(scope: Scope) -> Self {
    Self {
      scope: RwLock::new(scope),
    }
  }

  pub fn update(&self, f: impl FnOnce(&mut Scope)) {
    f(&mut self.scope.write());
  }
}

impl ScopeProvider for SharedScope {
  fn snapshot(&self) -> Scope {
    self.scope.read().clone()
  }
}
