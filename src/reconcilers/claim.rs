// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Claim reconciler - applies a claim's reclaim-policy label to its bound volume.

use super::{error_policy, label_value, retry};
use crate::config::Config;
use crate::error::{Result, VolrecError};
use crate::store::ResourceStore;
use crate::triggers::TriggerGate;
use futures::StreamExt;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use kube::{
    runtime::{controller::Action, watcher, Controller},
    Api, Client, ResourceExt,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct ClaimReconciler {
    store: Arc<dyn ResourceStore>,
    config: Arc<Config>,
    gate: TriggerGate<PersistentVolumeClaim, Option<String>>,
}

impl ClaimReconciler {
    pub fn new(store: Arc<dyn ResourceStore>, config: Arc<Config>) -> Self {
        let gate = TriggerGate::for_claims(config.clone());
        Self { store, config, gate }
    }

    pub async fn run(mut self, client: Client) -> anyhow::Result<()> {
        let claims: Api<PersistentVolumeClaim> = Api::all(client);
        let controller = Controller::new(claims, watcher::Config::default());
        self.gate.track(controller.store());
        let context = Arc::new(self);

        controller
            .shutdown_on_signal()
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled claim: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }

    /// Set the bound volume's reclaim policy to the claim's reclaim-policy label.
    ///
    /// An unbound claim is requeued until the cluster binds it.
    #[instrument(skip_all, fields(pvc = %format!("{}/{}", namespace, name)))]
    pub async fn reconcile_claim(&self, namespace: &str, name: &str) -> Result<Action> {
        let Some(pvc) = self.store.get_claim(namespace, name).await? else {
            debug!("PVC no longer exists");
            return Ok(Action::await_change());
        };

        let volume_name = pvc
            .spec
            .as_ref()
            .and_then(|s| s.volume_name.as_deref())
            .unwrap_or_default();
        if volume_name.is_empty() {
            info!("PVC not bound to volume yet");
            return Ok(retry());
        }
        info!(volume_name = %volume_name, "PVC is bound to volume");

        let Some(mut pv) = self.store.get_volume(volume_name).await? else {
            debug!(pv = %volume_name, "Bound PV not found");
            return Ok(Action::await_change());
        };

        let policy = label_value(&pvc, &self.config.reclaim_policy_label);
        if policy.is_empty() {
            info!("PVC does not have reclaim policy label");
            return Ok(Action::await_change());
        }

        let spec = pv.spec.get_or_insert_with(Default::default);
        let current = spec
            .persistent_volume_reclaim_policy
            .as_deref()
            .unwrap_or_default();
        if current == policy {
            info!(pv = %volume_name, policy = %policy, "Reclaim policy on PV already matches PVC label");
            return Ok(Action::await_change());
        }

        info!(
            pv = %volume_name,
            policy_from_pvc_label = %policy,
            policy_from_pv = %current,
            "Setting reclaim policy to match PVC label"
        );
        spec.persistent_volume_reclaim_policy = Some(policy.to_string());

        match self.store.update_volume(&pv).await {
            Ok(_) => Ok(Action::await_change()),
            Err(e) if e.is_conflict() => {
                info!(pv = %volume_name, "PV changed since it was read, retrying");
                Ok(retry())
            }
            Err(e) => Err(VolrecError::UpdateFailed {
                name: volume_name.to_string(),
                source: Box::new(e),
            }),
        }
    }
}

async fn reconcile(pvc: Arc<PersistentVolumeClaim>, ctx: Arc<ClaimReconciler>) -> Result<Action> {
    if !ctx.gate.admit(&pvc) {
        debug!("Reclaim policy label of PVC {} unchanged, skipping", pvc.name_any());
        return Ok(Action::await_change());
    }

    let namespace = pvc.namespace().unwrap_or_default();
    let action = ctx.reconcile_claim(&namespace, &pvc.name_any()).await?;
    if action == Action::await_change() {
        ctx.gate.settle(&pvc);
    }
    Ok(action)
}
