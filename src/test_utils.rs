// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: an in-memory resource store, a mocked API server and object fixtures.

use crate::error::{Result, VolrecError};
use crate::store::ResourceStore;
use async_trait::async_trait;
use http::{Request, Response};
use k8s_openapi::api::core::v1::{
    Namespace, ObjectReference, PersistentVolume, PersistentVolumeClaim,
    PersistentVolumeClaimSpec, PersistentVolumeSpec,
};
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::core::ErrorResponse;
use kube::{Client, ResourceExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

fn label_map(labels: &[(&str, &str)]) -> Option<BTreeMap<String, String>> {
    if labels.is_empty() {
        return None;
    }
    Some(
        labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

pub fn make_namespace(name: &str, labels: &[(&str, &str)]) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: label_map(labels),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Build a volume, optionally claimed by `(namespace, name)`
pub fn make_volume(
    name: &str,
    labels: &[(&str, &str)],
    claim: Option<(&str, &str)>,
    reclaim_policy: Option<&str>,
) -> PersistentVolume {
    PersistentVolume {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: label_map(labels),
            resource_version: Some("1".to_string()),
            generation: Some(1),
            ..Default::default()
        },
        spec: Some(PersistentVolumeSpec {
            claim_ref: claim.map(|(namespace, claim_name)| ObjectReference {
                kind: Some("PersistentVolumeClaim".to_string()),
                namespace: Some(namespace.to_string()),
                name: Some(claim_name.to_string()),
                ..Default::default()
            }),
            persistent_volume_reclaim_policy: reclaim_policy.map(str::to_string),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build a claim, bound when `volume_name` is set
pub fn make_claim(
    namespace: &str,
    name: &str,
    labels: &[(&str, &str)],
    volume_name: Option<&str>,
) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: label_map(labels),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            volume_name: volume_name.map(str::to_string),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Failure injected into the next update of a volume
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    /// Someone else wrote the volume between our read and write
    Conflict,
    /// The API server answered with a 500
    ServerError,
}

#[derive(Default)]
struct FakeState {
    namespaces: BTreeMap<String, Namespace>,
    volumes: BTreeMap<String, PersistentVolume>,
    claims: BTreeMap<(String, String), PersistentVolumeClaim>,
    updates: Vec<String>,
    failures: HashMap<String, Failure>,
    fail_lists: bool,
}

/// In-memory `ResourceStore` with resourceVersion checks and a write log.
#[derive(Default)]
pub struct FakeStore {
    state: Mutex<FakeState>,
}

fn api_error(code: u16, reason: &str, message: &str) -> VolrecError {
    VolrecError::KubeError(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: message.to_string(),
        reason: reason.to_string(),
        code,
    }))
}

fn bump_version(pv: &mut PersistentVolume) {
    let next = pv
        .resource_version()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0)
        + 1;
    pv.metadata.resource_version = Some(next.to_string());
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(self, ns: Namespace) -> Self {
        self.state
            .lock()
            .unwrap()
            .namespaces
            .insert(ns.name_any(), ns);
        self
    }

    pub fn with_volume(self, pv: PersistentVolume) -> Self {
        self.state.lock().unwrap().volumes.insert(pv.name_any(), pv);
        self
    }

    pub fn with_claim(self, pvc: PersistentVolumeClaim) -> Self {
        let key = (pvc.namespace().unwrap_or_default(), pvc.name_any());
        self.state.lock().unwrap().claims.insert(key, pvc);
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Make the next update of `name` fail
    pub fn fail_next_update(&self, name: &str, failure: Failure) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(name.to_string(), failure);
    }

    /// Make every list call fail with a server error
    pub fn fail_lists(&self) {
        self.state.lock().unwrap().fail_lists = true;
    }

    pub fn volume(&self, name: &str) -> PersistentVolume {
        self.state.lock().unwrap().volumes[name].clone()
    }

    pub fn volume_label(&self, name: &str, key: &str) -> Option<String> {
        self.volume(name).labels().get(key).cloned()
    }

    /// Names of the volumes written so far, in write order
    pub fn updates(&self) -> Vec<String> {
        self.state.lock().unwrap().updates.clone()
    }

    pub fn clear_updates(&self) {
        self.state.lock().unwrap().updates.clear();
    }
}

#[async_trait]
impl ResourceStore for FakeStore {
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>> {
        Ok(self.state.lock().unwrap().namespaces.get(name).cloned())
    }

    async fn get_volume(&self, name: &str) -> Result<Option<PersistentVolume>> {
        Ok(self.state.lock().unwrap().volumes.get(name).cloned())
    }

    async fn get_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<PersistentVolumeClaim>> {
        let key = (namespace.to_string(), name.to_string());
        Ok(self.state.lock().unwrap().claims.get(&key).cloned())
    }

    async fn list_volumes(
        &self,
        label_key: &str,
        label_value: &str,
    ) -> Result<Vec<PersistentVolume>> {
        let state = self.state.lock().unwrap();
        if state.fail_lists {
            return Err(api_error(500, "InternalError", "list failed"));
        }
        Ok(state
            .volumes
            .values()
            .filter(|pv| pv.labels().get(label_key).map(String::as_str) == Some(label_value))
            .cloned()
            .collect())
    }

    async fn update_volume(&self, volume: &PersistentVolume) -> Result<PersistentVolume> {
        let name = volume.name_any();
        let mut state = self.state.lock().unwrap();

        match state.failures.remove(&name) {
            Some(Failure::Conflict) => {
                if let Some(stored) = state.volumes.get_mut(&name) {
                    bump_version(stored);
                }
                return Err(VolrecError::Conflict {
                    kind: "PersistentVolume",
                    name,
                });
            }
            Some(Failure::ServerError) => {
                return Err(api_error(500, "InternalError", "update failed"));
            }
            None => {}
        }

        let Some(stored) = state.volumes.get(&name) else {
            return Err(api_error(404, "NotFound", "persistentvolume not found"));
        };
        if stored.resource_version() != volume.resource_version() {
            return Err(VolrecError::Conflict {
                kind: "PersistentVolume",
                name,
            });
        }

        let mut updated = volume.clone();
        bump_version(&mut updated);
        state.volumes.insert(name.clone(), updated.clone());
        state.updates.push(name);
        Ok(updated)
    }
}

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Add a response for PUT requests matching the exact path
    pub fn on_put(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PUT", path, status, body)
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses.lock().unwrap().insert(
            (method.to_string(), path.to_string()),
            (status, body.to_string()),
        );
        self
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock().unwrap();

        if let Some(resp) = responses.get(&(method.to_string(), path.to_string())) {
            return Some(resp.clone());
        }

        // Prefix match, so /api/v1/namespaces also answers /api/v1/namespaces/foo
        for ((m, p), resp) in responses.iter() {
            if m == method && path.starts_with(p) {
                return Some(resp.clone());
            }
        }

        None
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        let (status, body) = self
            .find_response(&method, &path)
            .unwrap_or_else(|| (404, not_found_json("resource", &path)));

        Box::pin(async move {
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

fn labels_json(labels: &[(&str, &str)]) -> serde_json::Value {
    labels
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::from(*v)))
        .collect::<serde_json::Map<_, _>>()
        .into()
}

pub fn namespace_json(name: &str, labels: &[(&str, &str)]) -> String {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
            "uid": "test-uid",
            "labels": labels_json(labels)
        }
    })
    .to_string()
}

pub fn volume_json(name: &str, resource_version: &str, labels: &[(&str, &str)]) -> String {
    volume_value(name, resource_version, labels).to_string()
}

fn volume_value(name: &str, resource_version: &str, labels: &[(&str, &str)]) -> serde_json::Value {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "PersistentVolume",
        "metadata": {
            "name": name,
            "resourceVersion": resource_version,
            "labels": labels_json(labels)
        },
        "spec": {
            "persistentVolumeReclaimPolicy": "Delete"
        }
    })
}

/// Wrap serialized volumes into a PersistentVolumeList
pub fn volume_list_json(volumes: &[String]) -> String {
    let items: Vec<serde_json::Value> = volumes
        .iter()
        .map(|v| serde_json::from_str(v).unwrap())
        .collect();
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "PersistentVolumeList",
        "metadata": { "resourceVersion": "1" },
        "items": items
    })
    .to_string()
}

pub fn empty_list_json(kind: &str) -> String {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": kind,
        "metadata": { "resourceVersion": "1" },
        "items": []
    })
    .to_string()
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{} \"{}\" not found", resource, name),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}

/// Create a 409 conflict response
pub fn conflict_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!(
            "Operation cannot be fulfilled on {} \"{}\": the object has been modified",
            resource, name
        ),
        "reason": "Conflict",
        "code": 409
    })
    .to_string()
}
