// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Capability interface over the objects the reconcilers read and write.

use crate::error::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, PersistentVolume, PersistentVolumeClaim};

/// Read/write access to namespaces, volumes and claims.
///
/// Gets return `Ok(None)` when the object does not exist. `update_volume` is
/// version-checked and fails with `VolrecError::Conflict` when the stored object
/// changed since it was read.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>>;

    async fn get_volume(&self, name: &str) -> Result<Option<PersistentVolume>>;

    async fn get_claim(&self, namespace: &str, name: &str)
        -> Result<Option<PersistentVolumeClaim>>;

    /// List volumes carrying `label_key=label_value`
    async fn list_volumes(&self, label_key: &str, label_value: &str)
        -> Result<Vec<PersistentVolume>>;

    async fn update_volume(&self, volume: &PersistentVolume) -> Result<PersistentVolume>;
}
