// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace reconciler - propagates a namespace's owner label to its volumes.

use super::{error_policy, label_value};
use crate::config::Config;
use crate::error::{Result, VolrecError};
use crate::store::ResourceStore;
use crate::triggers::TriggerGate;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Namespace;
use kube::{
    runtime::{controller::Action, watcher, Controller},
    Api, Client, ResourceExt,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct NamespaceReconciler {
    store: Arc<dyn ResourceStore>,
    config: Arc<Config>,
    gate: TriggerGate<Namespace, Option<String>>,
}

impl NamespaceReconciler {
    pub fn new(store: Arc<dyn ResourceStore>, config: Arc<Config>) -> Self {
        let gate = TriggerGate::for_namespaces(config.clone());
        Self { store, config, gate }
    }

    pub async fn run(mut self, client: Client) -> anyhow::Result<()> {
        let namespaces: Api<Namespace> = Api::all(client);
        let controller = Controller::new(namespaces, watcher::Config::default());
        self.gate.track(controller.store());
        let context = Arc::new(self);

        controller
            .shutdown_on_signal()
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled namespace: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }

    /// Copy the namespace's owner label onto every volume labelled as belonging to it.
    ///
    /// Volumes are written one at a time; the first failed write aborts the rest and
    /// is returned as an error. Volumes written before the failure keep their new
    /// label and are skipped as already converged on the retry.
    #[instrument(skip_all, fields(ns = %name))]
    pub async fn reconcile_namespace(&self, name: &str) -> Result<Action> {
        let Some(ns) = self.store.get_namespace(name).await? else {
            debug!("Namespace no longer exists");
            return Ok(Action::await_change());
        };

        let owner_label = &self.config.owner_label;
        let owner = label_value(&ns, owner_label);
        info!(owner = %owner, "Reconciling NS");

        if owner.is_empty() {
            info!(owner_label = %owner_label, "NS does not have owner label");
            return Ok(Action::await_change());
        }

        let volumes = self.store.list_volumes(&self.config.ns_label, name).await?;
        if volumes.is_empty() {
            info!(ns_label = %self.config.ns_label, "No PVs associated with NS");
            return Ok(Action::await_change());
        }

        for mut pv in volumes {
            let pv_name = pv.name_any();

            if label_value(&pv, owner_label) == owner {
                info!(pv = %pv_name, owner = %owner, "NS owner on PV already matches NS label");
                continue;
            }

            info!(
                pv = %pv_name,
                owner = %owner,
                pv_owner = %label_value(&pv, owner_label),
                "Setting NS owner label on PV"
            );
            pv.labels_mut().insert(owner_label.clone(), owner.to_string());

            self.store
                .update_volume(&pv)
                .await
                .map_err(|e| VolrecError::UpdateFailed {
                    name: pv_name,
                    source: Box::new(e),
                })?;
        }

        Ok(Action::await_change())
    }
}

async fn reconcile(ns: Arc<Namespace>, ctx: Arc<NamespaceReconciler>) -> Result<Action> {
    if !ctx.gate.admit(&ns) {
        debug!("Owner label of namespace {} unchanged, skipping", ns.name_any());
        return Ok(Action::await_change());
    }

    let action = ctx.reconcile_namespace(&ns.name_any()).await?;
    if action == Action::await_change() {
        ctx.gate.settle(&ns);
    }
    Ok(action)
}
