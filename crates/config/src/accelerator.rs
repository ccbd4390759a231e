// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! Accelerator profiles: unit costs and capacity metadata, fetched from the
//! config store as JSON blobs keyed by accelerator name.

use crate::error::Error;
use serde::{Deserialize, Serialize};

/// Unit cost and capacity metadata for one accelerator type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceleratorProfile {
    /// The accelerator name (e.g. `A100`).
    pub name: String,
    /// Unit cost per accelerator per replica.
    pub cost: f64,
    /// Device memory, as a human-readable string (e.g. `80Gi`).
    #[serde(default)]
    pub memory: String,
}

impl AcceleratorProfile {
    /// Parses a profile from its JSON blob form, e.g.
    /// `{"cost": 40.0, "memory": "80Gi"}`. The blob may omit `name`; the
    /// collection key is authoritative.
    pub fn from_json(name: &str, blob: &str) -> Result<Self, Error> {
        #[derive(Deserialize)]
        struct Blob {
            #[serde(default)]
            cost: f64,
            #[serde(default)]
            memory: String,
        }
        let blob: Blob = serde_json::from_str(blob).map_err(|e| Error::ConfigMalformed {
            key: name.to_owned(),
            details: e.to_string(),
        })?;
        if !blob.cost.is_finite() || blob.cost < 0.0 {
            return Err(Error::ConfigMalformed {
                key: name.to_owned(),
                details: format!("cost {} must be finite and non-negative", blob.cost),
            });
        }
        Ok(Self {
            name: name.to_owned(),
            cost: blob.cost,
            memory: blob.memory,
        })
    }
}
