// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! Metrics availability probe.
//!
//! Before any traffic query is issued, the collector probes the backend for
//! the model's exporter. The three outcomes map directly onto the
//! `MetricsAvailable` condition: available, missing (empty vector), or
//! stale (newest sample beyond the staleness limit). Transport failures
//! surface as backend errors.

use crate::client::InstantVector;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// How old the newest sample may be before metrics count as stale.
pub const STALENESS_LIMIT: Duration = Duration::from_secs(300);

/// Probe verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsAvailability {
    /// The exporter reports and its newest sample is fresh.
    Available,
    /// No series exists for the model.
    Missing,
    /// The newest sample exceeds [`STALENESS_LIMIT`].
    Stale {
        /// Age of the newest sample, in whole seconds.
        age_secs: u64,
    },
}

impl MetricsAvailability {
    /// Condition reason string for the verdict.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Available => "MetricsFresh",
            Self::Missing => "MetricsMissing",
            Self::Stale { .. } => "MetricsStale",
        }
    }
}

/// Evaluates a probe result against the staleness limit.
#[must_use]
pub fn evaluate(vector: &InstantVector, now: DateTime<Utc>) -> MetricsAvailability {
    let Some(newest) = vector.newest_timestamp() else {
        return MetricsAvailability::Missing;
    };
    let age_secs = (now.timestamp() as f64 - newest).max(0.0) as u64;
    if age_secs > STALENESS_LIMIT.as_secs() {
        MetricsAvailability::Stale { age_secs }
    } else {
        MetricsAvailability::Available
    }
}
