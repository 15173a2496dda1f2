// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! `ResourceStore` backed by the Kubernetes API server

use crate::error::{Result, VolrecError};
use crate::store::ResourceStore;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, PersistentVolume, PersistentVolumeClaim};
use kube::{
    api::{ListParams, PostParams},
    Api, Client, ResourceExt,
};
use tracing::debug;

#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn is_status(err: &kube::Error, code: u16) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == code)
}

/// Turn a 404 into `None`
fn found<T>(result: std::result::Result<T, kube::Error>) -> Result<Option<T>> {
    match result {
        Ok(obj) => Ok(Some(obj)),
        Err(e) if is_status(&e, 404) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        found(namespaces.get(name).await)
    }

    async fn get_volume(&self, name: &str) -> Result<Option<PersistentVolume>> {
        let volumes: Api<PersistentVolume> = Api::all(self.client.clone());
        found(volumes.get(name).await)
    }

    async fn get_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<PersistentVolumeClaim>> {
        let claims: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        found(claims.get(name).await)
    }

    async fn list_volumes(
        &self,
        label_key: &str,
        label_value: &str,
    ) -> Result<Vec<PersistentVolume>> {
        let volumes: Api<PersistentVolume> = Api::all(self.client.clone());
        let selector = format!("{}={}", label_key, label_value);
        let lp = ListParams::default().labels(&selector);

        match volumes.list(&lp).await {
            Ok(list) => Ok(list.items),
            Err(e) if is_status(&e, 404) => {
                debug!("No volumes found for selector {}", selector);
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_volume(&self, volume: &PersistentVolume) -> Result<PersistentVolume> {
        let volumes: Api<PersistentVolume> = Api::all(self.client.clone());
        let name = volume.name_any();

        // replace sends the resourceVersion along, so a stale copy is rejected with 409
        match volumes.replace(&name, &PostParams::default(), volume).await {
            Ok(updated) => Ok(updated),
            Err(e) if is_status(&e, 409) => Err(VolrecError::Conflict {
                kind: "PersistentVolume",
                name,
            }),
            Err(e) => Err(e.into()),
        }
    }
}
