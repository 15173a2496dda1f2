// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes API access: the live resource store and startup checks.

pub mod store;
pub mod watch;

pub use store::KubeStore;
pub use watch::ensure_watchable;
