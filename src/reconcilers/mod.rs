// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Reconcilers keeping volume labels and reclaim policy in line with their
//! namespace and claim.

pub mod claim;
pub mod namespace;
pub mod volume;

pub use claim::ClaimReconciler;
pub use namespace::NamespaceReconciler;
pub use volume::VolumeReconciler;

use crate::constants::requeue;
use crate::error::VolrecError;
use kube::{runtime::controller::Action, Resource, ResourceExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

/// Value of a label, empty when unset
pub fn label_value<'a, K: Resource>(obj: &'a K, key: &str) -> &'a str {
    obj.labels().get(key).map(String::as_str).unwrap_or_default()
}

/// Ask the runtime to dispatch the same object again shortly
pub fn retry() -> Action {
    Action::requeue(Duration::from_secs(requeue::RETRY_SECS))
}

fn error_policy<K: Resource, C>(obj: Arc<K>, error: &VolrecError, _ctx: Arc<C>) -> Action {
    error!(
        object = %obj.name_any(),
        retryable = error.is_retryable(),
        "Reconciliation error: {}",
        error
    );

    if error.is_retryable() {
        Action::requeue(Duration::from_secs(requeue::ERROR_SECS))
    } else {
        Action::await_change()
    }
}
