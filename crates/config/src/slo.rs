// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! SLO classes: a named priority plus per-model latency targets, fetched
//! from the config store as YAML blobs.

use crate::ModelId;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Latency targets for one model within a class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelSlo {
    /// Mean inter-token latency target in ms.
    #[serde(rename = "slo-itl")]
    pub slo_itl: f64,
    /// Mean time-to-first-token target in ms.
    #[serde(rename = "slo-ttft")]
    pub slo_ttft: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct SloClassEntry {
    model: ModelId,
    #[serde(flatten)]
    slo: ModelSlo,
}

#[derive(Debug, Clone, Deserialize)]
struct SloClassBlob {
    name: String,
    priority: u8,
    #[serde(default)]
    data: Vec<SloClassEntry>,
}

/// A named priority class with per-model latency targets.
///
/// Priority 1 is highest, 100 lowest; the optimizer processes classes in
/// ascending priority value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SloClass {
    /// The class name.
    pub name: String,
    /// Priority, 1 (highest) to 100 (lowest).
    pub priority: u8,
    /// Latency targets per model.
    pub per_model: HashMap<ModelId, ModelSlo>,
}

impl SloClass {
    /// Parses a class from its YAML blob form:
    /// `{name, priority, data: [{model, slo-itl, slo-ttft}, ...]}`.
    pub fn from_yaml(key: &str, blob: &str) -> Result<Self, Error> {
        let blob: SloClassBlob =
            serde_yaml::from_str(blob).map_err(|e| Error::ConfigMalformed {
                key: key.to_owned(),
                details: e.to_string(),
            })?;
        if !(1..=100).contains(&blob.priority) {
            return Err(Error::ConfigMalformed {
                key: key.to_owned(),
                details: format!("priority {} outside 1..=100", blob.priority),
            });
        }
        Ok(Self {
            name: blob.name,
            priority: blob.priority,
            per_model: blob
                .data
                .into_iter()
                .map(|entry| (entry.model, entry.slo))
                .collect(),
        })
    }

    /// Returns the latency targets for a model, if the class covers it.
    #[must_use]
    pub fn slo_for(&self, model: &str) -> Option<ModelSlo> {
        self.per_model.get(model).copied()
    }
}
