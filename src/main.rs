// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use volrec::config::Config;
use volrec::kubernetes::{ensure_watchable, KubeStore};
use volrec::reconcilers::{ClaimReconciler, NamespaceReconciler, VolumeReconciler};
use volrec::store::ResourceStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting volrec controller");

    // Load configuration
    let config = Arc::new(Config::load()?);
    info!(
        "Configuration loaded: reclaim_label={} owner_label={} set_owner={} ns_label={} set_ns={}",
        config.reclaim_policy_label,
        config.owner_label,
        config.owner_set,
        config.ns_label,
        config.ns_set
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    // Fail before starting any controller if a watched kind cannot be listed
    ensure_watchable(&client).await?;

    let store: Arc<dyn ResourceStore> = Arc::new(KubeStore::new(client.clone()));

    let namespace_reconciler = NamespaceReconciler::new(store.clone(), config.clone());
    let volume_reconciler = VolumeReconciler::new(store.clone(), config.clone());
    let claim_reconciler = ClaimReconciler::new(store, config);

    info!("Starting reconcilers...");

    // Run until SIGINT/SIGTERM, each controller shuts down on the signal
    tokio::try_join!(
        namespace_reconciler.run(client.clone()),
        volume_reconciler.run(client.clone()),
        claim_reconciler.run(client)
    )?;

    info!("All reconcilers stopped");
    Ok(())
}
