// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! The allocation value object produced by the analyzer and consumed by the
//! optimizer.

use serde::{Deserialize, Serialize};
use wva_config::AcceleratorName;

/// One candidate (or chosen) allocation for a variant on one accelerator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    /// The accelerator this allocation was computed for.
    pub accelerator: AcceleratorName,
    /// Replica count.
    pub num_replicas: u32,
    /// The SLO-feasible decode batch size the estimate assumed.
    pub max_batch: u32,
    /// Total cost: `num_replicas * unit cost`.
    pub cost: f64,
    /// Predicted mean inter-token latency in ms at `max_batch`.
    pub itl_average: f64,
    /// Predicted mean time-to-first-token in ms at `num_replicas`.
    pub ttft_average: f64,
    /// Set when the replica search hit its bound before the SLO was met:
    /// the variant cannot be served within the target at any searched size.
    #[serde(default)]
    pub saturating: bool,
}

impl Allocation {
    /// Returns a copy with the replica count (and cost) rescaled.
    #[must_use]
    pub fn with_replicas(&self, num_replicas: u32, unit_cost: f64) -> Self {
        Self {
            num_replicas,
            cost: f64::from(num_replicas) * unit_cost,
            ..self.clone()
        }
    }
}
