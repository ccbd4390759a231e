// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! Variant status: the record the reconciler publishes, at most once per
//! tick, back to the declarative store.

use crate::AcceleratorName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The observed allocation of a variant, read from its workload object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentAlloc {
    /// Observed replica count, preferring the workload's observed state
    /// over its spec.
    pub num_replicas: u32,
}

/// Bookkeeping for the most recent change to a desired allocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastUpdate {
    /// When the desired count last changed. Unset until the first decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    /// Why the desired count has its current value.
    #[serde(default)]
    pub reason: String,
    /// Replica delta of the last change: `new - previous`.
    #[serde(default)]
    pub delta: i64,
}

/// The desired allocation computed by the optimization pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedAlloc {
    /// Desired replica count.
    pub num_replicas: u32,
    /// The accelerator the decision was computed for.
    pub accelerator: AcceleratorName,
    /// Bookkeeping for the most recent change.
    #[serde(default)]
    pub last_update: LastUpdate,
}

/// Condition types recognized on a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionType {
    /// Whether traffic metrics for the variant's model were available and
    /// fresh this tick.
    MetricsAvailable,
    /// Whether the optimizer produced a decision for this variant this tick.
    OptimizationReady,
}

/// Tri-state condition status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    /// The condition holds.
    True,
    /// The condition does not hold.
    False,
    /// The condition could not be evaluated.
    Unknown,
}

/// One `{type, status, reason, message, transitionTime}` tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// The condition type.
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    /// Current status of the condition.
    pub status: ConditionStatus,
    /// Machine-readable reason for the status.
    #[serde(default)]
    pub reason: String,
    /// Human-readable detail.
    #[serde(default)]
    pub message: String,
    /// When `status` last changed.
    pub transition_time: DateTime<Utc>,
}

/// Actuation bookkeeping: whether this variant's desired allocation is the
/// one applied to its scale target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actuation {
    /// True for the conflict winner; false for suppressed claimants.
    pub applied: bool,
}

/// Status of a variant, mutated by the reconciler at most once per tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantStatus {
    /// Observed allocation.
    #[serde(default)]
    pub current_alloc: CurrentAlloc,

    /// Desired allocation, absent until the pipeline first decides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_optimized_alloc: Option<OptimizedAlloc>,

    /// Condition tuples keyed by type.
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// When the reconciler last processed this variant. Monotone across
    /// ticks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_time: Option<DateTime<Utc>>,

    /// Actuation bookkeeping.
    #[serde(default)]
    pub actuation: Actuation,
}

impl VariantStatus {
    /// Sets a condition, preserving `transition_time` when the status is
    /// unchanged and stamping `now` when it flips.
    pub fn set_condition(
        &mut self,
        condition_type: ConditionType,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) {
        let reason = reason.into();
        let message = message.into();
        if let Some(existing) = self
            .conditions
            .iter_mut()
            .find(|c| c.condition_type == condition_type)
        {
            if existing.status != status {
                existing.transition_time = now;
            }
            existing.status = status;
            existing.reason = reason;
            existing.message = message;
        } else {
            self.conditions.push(Condition {
                condition_type,
                status,
                reason,
                message,
                transition_time: now,
            });
        }
    }

    /// Returns the condition of the given type, if present.
    #[must_use]
    pub fn condition(&self, condition_type: ConditionType) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_condition_inserts_then_updates() {
        let mut status = VariantStatus::default();
        let t0 = Utc::now();
        status.set_condition(
            ConditionType::MetricsAvailable,
            ConditionStatus::True,
            "MetricsFresh",
            "",
            t0,
        );
        assert_eq!(status.conditions.len(), 1);

        let t1 = t0 + chrono::Duration::seconds(60);
        status.set_condition(
            ConditionType::MetricsAvailable,
            ConditionStatus::True,
            "MetricsFresh",
            "still fresh",
            t1,
        );
        let cond = status
            .condition(ConditionType::MetricsAvailable)
            .expect("condition");
        assert_eq!(
            cond.transition_time, t0,
            "unchanged status must not bump transition time"
        );

        let t2 = t1 + chrono::Duration::seconds(60);
        status.set_condition(
            ConditionType::MetricsAvailable,
            ConditionStatus::False,
            "MetricsStale",
            "",
            t2,
        );
        let cond = status
            .condition(ConditionType::MetricsAvailable)
            .expect("condition");
        assert_eq!(cond.transition_time, t2);
        assert_eq!(cond.reason, "MetricsStale");
    }

    #[test]
    fn conditions_are_independent_by_type() {
        let mut status = VariantStatus::default();
        let now = Utc::now();
        status.set_condition(
            ConditionType::MetricsAvailable,
            ConditionStatus::True,
            "",
            "",
            now,
        );
        status.set_condition(
            ConditionType::OptimizationReady,
            ConditionStatus::False,
            "NoFeasibleAllocation",
            "",
            now,
        );
        assert_eq!(status.conditions.len(), 2);
        assert_eq!(
            status
                .condition(ConditionType::OptimizationReady)
                .map(|c| c.status),
            Some(ConditionStatus::False)
        );
    }
}
