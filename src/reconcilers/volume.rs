// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Volume reconciler - derives owner and owning-namespace labels for a volume
//! from its bound claim and the claim's namespace.

use super::{error_policy, label_value, retry};
use crate::config::Config;
use crate::constants::CLAIM_KIND;
use crate::error::{Result, VolrecError};
use crate::store::ResourceStore;
use crate::triggers::TriggerGate;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{ObjectReference, PersistentVolume};
use kube::{
    runtime::{controller::Action, watcher, Controller},
    Api, Client, ResourceExt,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct VolumeReconciler {
    store: Arc<dyn ResourceStore>,
    config: Arc<Config>,
    gate: TriggerGate<PersistentVolume, Option<i64>>,
}

/// Where a volume's claim lives, taken from its claim reference
#[derive(Debug)]
struct ClaimTarget<'a> {
    namespace: &'a str,
    name: &'a str,
    kind: &'a str,
}

impl<'a> ClaimTarget<'a> {
    fn from_ref(claim_ref: &'a ObjectReference) -> Self {
        Self {
            namespace: claim_ref.namespace.as_deref().unwrap_or_default(),
            name: claim_ref.name.as_deref().unwrap_or_default(),
            kind: claim_ref.kind.as_deref().unwrap_or(CLAIM_KIND),
        }
    }
}

impl VolumeReconciler {
    pub fn new(store: Arc<dyn ResourceStore>, config: Arc<Config>) -> Self {
        Self {
            store,
            config,
            gate: TriggerGate::for_volumes(),
        }
    }

    pub async fn run(mut self, client: Client) -> anyhow::Result<()> {
        let volumes: Api<PersistentVolume> = Api::all(client);
        let controller = Controller::new(volumes, watcher::Config::default());
        self.gate.track(controller.store());
        let context = Arc::new(self);

        controller
            .shutdown_on_signal()
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled volume: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }

    /// Label a volume with the owner of its claim's namespace and with that namespace's
    /// name, each only when the matching toggle is enabled.
    #[instrument(skip_all, fields(pv = %name))]
    pub async fn reconcile_volume(&self, name: &str) -> Result<Action> {
        let Some(mut pv) = self.store.get_volume(name).await? else {
            debug!("PV no longer exists");
            return Ok(Action::await_change());
        };

        let Some(claim_ref) = pv.spec.as_ref().and_then(|s| s.claim_ref.clone()) else {
            debug!("PV has no claim reference");
            return Ok(Action::await_change());
        };
        let claim = ClaimTarget::from_ref(&claim_ref);

        if claim.kind != CLAIM_KIND || claim.name.is_empty() {
            debug!(claim = ?claim, "PV is not claimed by a PersistentVolumeClaim");
            return Ok(Action::await_change());
        }

        let Some(pvc) = self.store.get_claim(claim.namespace, claim.name).await? else {
            debug!(pvc = %format!("{}/{}", claim.namespace, claim.name), "PVC not found");
            return Ok(Action::await_change());
        };

        let policy = label_value(&pvc, &self.config.reclaim_policy_label);
        info!(policy_from_label = %policy, "Reconciling PV");

        let mut changed = false;
        if self.config.owner_set {
            changed |= self.apply_owner(&mut pv, claim.namespace).await?;
        }
        if self.config.ns_set {
            changed |= self.apply_owning_namespace(&mut pv, claim.namespace);
        }

        if !changed {
            return Ok(Action::await_change());
        }

        match self.store.update_volume(&pv).await {
            Ok(_) => Ok(Action::await_change()),
            Err(e) if e.is_conflict() => {
                info!("PV changed since it was read, retrying");
                Ok(retry())
            }
            Err(e) => Err(VolrecError::UpdateFailed {
                name: name.to_string(),
                source: Box::new(e),
            }),
        }
    }

    /// Set the owner label from the claim's namespace, returns whether it changed
    async fn apply_owner(&self, pv: &mut PersistentVolume, namespace: &str) -> Result<bool> {
        let owner_label = &self.config.owner_label;
        let owner = match self.store.get_namespace(namespace).await? {
            Some(ns) => label_value(&ns, owner_label).to_string(),
            None => {
                debug!(namespace = %namespace, "Claim namespace not found");
                String::new()
            }
        };

        if label_value(&*pv, owner_label) == owner {
            info!(owner_label = %owner_label, owner = %owner, "Owner label already set on PV");
            return Ok(false);
        }
        if owner.is_empty() {
            info!(owner_label = %owner_label, "Owner label isn't set or is blank");
            return Ok(false);
        }

        info!(owner_label = %owner_label, owner = %owner, "Setting owner label");
        pv.labels_mut().insert(owner_label.clone(), owner);
        Ok(true)
    }

    /// Set the owning-namespace label to the claim's namespace, returns whether it changed
    fn apply_owning_namespace(&self, pv: &mut PersistentVolume, namespace: &str) -> bool {
        let ns_label = &self.config.ns_label;

        if label_value(&*pv, ns_label) == namespace {
            info!(ns_label = %ns_label, namespace = %namespace, "Owning namespace label already set on PV");
            return false;
        }
        if namespace.is_empty() {
            info!("Namespace not set in claimRef on PV");
            return false;
        }

        info!(ns_label = %ns_label, namespace = %namespace, "Setting owning namespace label");
        pv.labels_mut().insert(ns_label.clone(), namespace.to_string());
        true
    }
}

async fn reconcile(pv: Arc<PersistentVolume>, ctx: Arc<VolumeReconciler>) -> Result<Action> {
    if !ctx.gate.admit(&pv) {
        debug!("Generation of PV {} unchanged, skipping", pv.name_any());
        return Ok(Action::await_change());
    }

    let action = ctx.reconcile_volume(&pv.name_any()).await?;
    if action == Action::await_change() {
        ctx.gate.settle(&pv);
    }
    Ok(action)
}
