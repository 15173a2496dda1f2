// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Change filters deciding which observed changes are worth a reconciliation.

use crate::config::Config;
use k8s_openapi::api::core::v1::{Namespace, PersistentVolume, PersistentVolumeClaim};
use kube::runtime::reflector::{ObjectRef, Store};
use kube::{Resource, ResourceExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn label<K: Resource>(obj: &K, key: &str) -> Option<String> {
    obj.labels().get(key).cloned()
}

/// Owner label value of a namespace
pub fn owner_label(ns: &Namespace, config: &Config) -> Option<String> {
    label(ns, &config.owner_label)
}

/// Reclaim-policy label value of a claim
pub fn reclaim_label(pvc: &PersistentVolumeClaim, config: &Config) -> Option<String> {
    label(pvc, &config.reclaim_policy_label)
}

pub fn generation(pv: &PersistentVolume) -> Option<i64> {
    pv.meta().generation
}

/// A namespace only matters when its owner label value changes
pub fn owner_label_changed(old: &Namespace, new: &Namespace, config: &Config) -> bool {
    owner_label(old, config) != owner_label(new, config)
}

/// A claim only matters when its reclaim-policy label value changes
pub fn reclaim_label_changed(
    old: &PersistentVolumeClaim,
    new: &PersistentVolumeClaim,
    config: &Config,
) -> bool {
    reclaim_label(old, config) != reclaim_label(new, config)
}

/// Spec changes bump the generation, status and metadata-only updates don't
pub fn generation_changed(old: &PersistentVolume, new: &PersistentVolume) -> bool {
    generation(old) != generation(new)
}

type Observe<K, V> = Box<dyn Fn(&K) -> V + Send + Sync>;

/// Filters watch deliveries for one resource kind.
///
/// Only the observed value (a label value or a generation) of the last observation
/// that was reconciled to completion is kept per object, and compared against each
/// new delivery. Observations that ended in a retry or an error are never settled, so
/// the runtime's requeues always pass the gate. Once attached to the controller's
/// cache, objects that left the cache are dropped from the gate.
pub struct TriggerGate<K, V>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    on_create: bool,
    observe: Observe<K, V>,
    settled: Mutex<HashMap<ObjectRef<K>, V>>,
    cache: Option<Store<K>>,
}

impl<K, V> TriggerGate<K, V>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
    V: PartialEq,
{
    pub fn new(on_create: bool, observe: impl Fn(&K) -> V + Send + Sync + 'static) -> Self {
        Self {
            on_create,
            observe: Box::new(observe),
            settled: Mutex::new(HashMap::new()),
            cache: None,
        }
    }

    /// Follow the controller's cache, forgetting objects once they are deleted
    pub fn track(&mut self, cache: Store<K>) {
        self.cache = Some(cache);
    }

    /// Whether this observation should be reconciled
    pub fn admit(&self, obj: &K) -> bool {
        let key = ObjectRef::from_obj(obj);
        let observed = (self.observe)(obj);
        let mut settled = self.entries();

        match settled.get(&key) {
            Some(previous) => *previous != observed,
            None if self.on_create => true,
            None => {
                // creation is not a trigger, but later changes compare against it
                settled.insert(key, observed);
                false
            }
        }
    }

    /// Record an observation whose reconciliation converged
    pub fn settle(&self, obj: &K) {
        let observed = (self.observe)(obj);
        self.entries().insert(ObjectRef::from_obj(obj), observed);
    }

    /// Number of objects with a settled observation
    pub fn tracked(&self) -> usize {
        self.entries().len()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ObjectRef<K>, V>> {
        let mut settled = self.settled.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cache) = &self.cache {
            settled.retain(|obj_ref, _| cache.get(obj_ref).is_some());
        }
        settled
    }
}

impl TriggerGate<Namespace, Option<String>> {
    /// Namespaces reconcile on owner label changes only, never on creation
    pub fn for_namespaces(config: Arc<Config>) -> Self {
        TriggerGate::new(false, move |ns: &Namespace| owner_label(ns, &config))
    }
}

impl TriggerGate<PersistentVolume, Option<i64>> {
    /// Volumes reconcile on creation and on generation changes
    pub fn for_volumes() -> Self {
        TriggerGate::new(true, generation)
    }
}

impl TriggerGate<PersistentVolumeClaim, Option<String>> {
    /// Claims reconcile on creation and on reclaim-policy label changes
    pub fn for_claims(config: Arc<Config>) -> Self {
        TriggerGate::new(true, move |pvc: &PersistentVolumeClaim| {
            reclaim_label(pvc, &config)
        })
    }
}
