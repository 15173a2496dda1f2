// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Default label keys used by volrec
pub mod labels {
    /// Label on a claim carrying the reclaim policy for its bound volume
    pub const RECLAIM_POLICY: &str = "storage.k8s.twr.dev/reclaim-policy";
    /// Label on a namespace (and propagated volumes) naming the owning team
    pub const OWNER: &str = "k8s.twr.dev/owner";
    /// Label on a volume naming the namespace of its claim
    pub const OWNING_NAMESPACE: &str = "k8s.twr.dev/owning-namespace";
}

/// Requeue delays handed back to the controller runtime
pub mod requeue {
    /// Delay before retrying after a conflict or an unbound claim
    pub const RETRY_SECS: u64 = 5;
    /// Delay before retrying a failed reconciliation
    pub const ERROR_SECS: u64 = 30;
}

/// Kind name expected in a volume's claim reference
pub const CLAIM_KIND: &str = "PersistentVolumeClaim";
