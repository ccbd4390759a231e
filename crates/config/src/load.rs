// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! Per-model traffic snapshot produced by the metrics collector once per
//! tick.

use serde::{Deserialize, Serialize};

/// Observed aggregate traffic for one model over the last collection
/// window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadProfile {
    /// Request arrival rate in requests per minute.
    pub arrival_rate: f64,
    /// Mean prompt length in tokens.
    pub avg_input_tokens: f64,
    /// Mean generation length in tokens.
    pub avg_output_tokens: f64,
    /// Observed mean time-to-first-token in ms.
    pub ttft_average: f64,
    /// Observed mean inter-token latency in ms.
    pub itl_average: f64,
}

impl LoadProfile {
    /// Arrival rate in requests per second.
    #[must_use]
    pub fn arrival_rate_per_sec(&self) -> f64 {
        self.arrival_rate / 60.0
    }

    /// Whether the model saw no traffic in the collection window.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.arrival_rate <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_conversion() {
        let load = LoadProfile {
            arrival_rate: 120.0,
            ..Default::default()
        };
        assert!((load.arrival_rate_per_sec() - 2.0).abs() < f64::EPSILON);
        assert!(!load.is_idle());
        assert!(LoadProfile::default().is_idle());
    }
}
