// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::{Scope, SdkMetadata};
use tb_log_primitives::{AttributeValue, Attributes, LogRecord, LogRecordParts};

pub mod keys {
  pub const SDK_NAME: &str = "sentry.sdk.name";
  pub const SDK_VERSION: &str = "sentry.sdk.version";
  pub const ENVIRONMENT: &str = "sentry.environment";
  pub const RELEASE: &str = "sentry.release";
  pub const REPLAY_ID: &str = "sentry.replay_id";
  pub const SPAN_ID: &str = "span_id";
  pub const OS_NAME: &str = "os.name";
  pub const OS_VERSION: &str = "os.version";
  pub const DEVICE_BRAND: &str = "device.brand";
  pub const DEVICE_MODEL: &str = "device.model";
  pub const DEVICE_FAMILY: &str = "device.family";
  pub const USER_ID: &str = "user.id";
  pub const USER_NAME: &str = "user.name";
  pub const USER_EMAIL: &str = "user.email";
}

// Inserts the value unless the key is already present. Caller supplied attributes always win.
fn add_absent(attributes: &mut Attributes, key: &str, value: impl Into<AttributeValue>) {
  if !attributes.contains_key(key) {
    attributes.insert(key.to_string(), value.into());
  }
}

fn add_absent_opt(attributes: &mut Attributes, key: &str, value: Option<&String>) {
  if let Some(value) = value {
    add_absent(attributes, key, value.as_str());
  }
}

//
// ScopeAttributeEnricher
//

pub struct ScopeAttributeEnricher {
  metadata: SdkMetadata,
}

impl ScopeAttributeEnricher {
  #[must_use]
  pub const fn new(metadata: SdkMetadata) -> Self {
    Self { metadata }
  }

  #[must_use]
  pub const fn metadata(&self) -> &SdkMetadata {
    &self.metadata
  }

  // Produces a new record carrying the ambient scope context. This is pure: the same record, scope
  // and metadata always yield the same output.
  #[must_use]
  pub fn enrich(&self, record: LogRecord, scope: &Scope) -> LogRecord {
    let LogRecordParts {
      timestamp,
      level,
      body,
      mut attributes,
      trace_id: _,
    } = record.into_parts();

    let metadata = &self.metadata;
    add_absent(&mut attributes, keys::SDK_NAME, metadata.sdk_name.as_str());
    add_absent(
      &mut attributes,
      keys::SDK_VERSION,
      metadata.sdk_version.as_str(),
    );
    add_absent(
      &mut attributes,
      keys::ENVIRONMENT,
      metadata.environment.as_str(),
    );
    add_absent_opt(&mut attributes, keys::RELEASE, metadata.release.as_ref());

    if let Some(span) = &scope.active_span {
      add_absent(&mut attributes, keys::SPAN_ID, span.span_id.to_string());
    }

    add_absent_opt(&mut attributes, keys::OS_NAME, scope.os.name.as_ref());
    add_absent_opt(&mut attributes, keys::OS_VERSION, scope.os.version.as_ref());
    add_absent_opt(
      &mut attributes,
      keys::DEVICE_BRAND,
      scope.device.brand.as_ref(),
    );
    add_absent_opt(
      &mut attributes,
      keys::DEVICE_MODEL,
      scope.device.model.as_ref(),
    );
    add_absent_opt(
      &mut attributes,
      keys::DEVICE_FAMILY,
      scope.device.family.as_ref(),
    );

    if let Some(user) = scope.user.as_ref().filter(|_| metadata.send_default_pii) {
      add_absent_opt(&mut attributes, keys::USER_ID, user.id.as_ref());
      add_absent_opt(&mut attributes, keys::USER_NAME, user.username.as_ref());
      add_absent_opt(&mut attributes, keys::USER_EMAIL, user.email.as_ref());
    }

    add_absent_opt(&mut attributes, keys::REPLAY_ID, scope.replay_id.as_ref());

    for (key, value) in &scope.attributes {
      add_absent(&mut attributes, key, value.clone());
    }

    let has_user = [keys::USER_ID, keys::USER_NAME, keys::USER_EMAIL]
      .iter()
      .any(|key| attributes.contains_key(*key));
    if !has_user {
      add_absent_opt(
        &mut attributes,
        keys::USER_ID,
        metadata.installation_id.as_ref(),
      );
    }

    let trace_id = scope
      .active_span
      .map_or(scope.propagation_trace_id, |span| span.trace_id);

    LogRecordParts {
      timestamp,
      level,
      body,
      attributes,
      trace_id,
    }
    .into()
  }
}
