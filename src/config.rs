// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::labels;
use crate::error::{Result, VolrecError};
use clap::Parser;

/// Controller configuration, read once at startup from flags or environment variables
#[derive(Debug, Clone, Parser)]
#[command(name = "volrec", version, about = "Keeps volume owner and reclaim policy labels in sync")]
pub struct Config {
    /// The label to use for tracking Persistent Volume reclaim policy
    #[arg(long = "reclaim-label", env = "VOLREC_RECLAIM_LABEL", default_value = labels::RECLAIM_POLICY)]
    pub reclaim_policy_label: String,

    /// The label to use to set owner information on a Persistent Volume
    #[arg(long = "owner-label", env = "VOLREC_OWNER_LABEL", default_value = labels::OWNER)]
    pub owner_label: String,

    /// Transfer owner information from a namespace to its Persistent Volumes
    #[arg(long = "set-owner", env = "VOLREC_SET_OWNER")]
    pub owner_set: bool,

    /// The label to use for identifying an owning namespace on a Persistent Volume
    #[arg(long = "ns-label", env = "VOLREC_NS_LABEL", default_value = labels::OWNING_NAMESPACE)]
    pub ns_label: String,

    /// Add a label mapping Persistent Volumes back to a namespace
    #[arg(long = "set-ns", env = "VOLREC_SET_NS")]
    pub ns_set: bool,
}

impl Config {
    /// Parse configuration from the process arguments and environment
    pub fn load() -> Result<Self> {
        let config = Config::parse();
        config.validate()?;
        Ok(config)
    }

    /// Reject label keys that would match every object
    pub fn validate(&self) -> Result<()> {
        for (flag, key) in [
            ("reclaim-label", &self.reclaim_policy_label),
            ("owner-label", &self.owner_label),
            ("ns-label", &self.ns_label),
        ] {
            if key.trim().is_empty() {
                return Err(VolrecError::InvalidConfig(format!("--{} must not be empty", flag)));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reclaim_policy_label: labels::RECLAIM_POLICY.to_string(),
            owner_label: labels::OWNER.to_string(),
            owner_set: false,
            ns_label: labels::OWNING_NAMESPACE.to_string(),
            ns_set: false,
        }
    }
}
