// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VolrecError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Conflict updating {kind} {name}: the object has been modified")]
    Conflict { kind: &'static str, name: String },

    #[error("could not update PV {name}: {source}")]
    UpdateFailed {
        name: String,
        #[source]
        source: Box<VolrecError>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl VolrecError {
    /// Whether this is an optimistic-concurrency rejection
    pub fn is_conflict(&self) -> bool {
        match self {
            VolrecError::Conflict { .. } => true,
            VolrecError::UpdateFailed { source, .. } => source.is_conflict(),
            _ => false,
        }
    }

    /// Whether re-running the reconciliation can succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, VolrecError::InvalidConfig(_))
    }
}

pub type Result<T> = std::result::Result<T, VolrecError>;
