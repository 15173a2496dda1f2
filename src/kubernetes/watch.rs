// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Startup check that every watched kind can be listed

use crate::error::Result;
use k8s_openapi::api::core::v1::{Namespace, PersistentVolume, PersistentVolumeClaim};
use kube::{api::ListParams, Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::{error, info};

/// Verify that namespaces, volumes and claims can be listed cluster-wide.
/// A watch on a kind that cannot be listed would never start, so this fails fast instead.
pub async fn ensure_watchable(client: &Client) -> Result<()> {
    check_listable::<Namespace>(client).await?;
    check_listable::<PersistentVolume>(client).await?;
    check_listable::<PersistentVolumeClaim>(client).await?;
    Ok(())
}

async fn check_listable<K>(client: &Client) -> Result<()>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
{
    let kind = K::kind(&());
    let api: Api<K> = Api::all(client.clone());

    match api.list(&ListParams::default().limit(1)).await {
        Ok(_) => {
            info!("Watch on {} can be established", kind);
            Ok(())
        }
        Err(e) => {
            error!("Unable to list {}: {}", kind, e);
            Err(e.into())
        }
    }
}
