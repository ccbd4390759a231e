// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! Zero-rate policy: overrides the allocator's output for models with no
//! recent traffic.
//!
//! Grouped by model, the policy either keeps exactly one replica alive (the
//! keep-alive election below) or, when scale-to-zero is enabled and the
//! model has been idle over its retention window, releases everything.

use crate::allocator::AllocationSolution;
use wva_config::{ModelId, VariantKey};

/// Per-variant zero-rate input.
#[derive(Debug, Clone, PartialEq)]
pub struct ZeroRateVariant {
    /// The variant's unique key.
    pub key: VariantKey,
    /// Observed replica count from the workload object.
    pub current_replicas: u32,
    /// Cost of keeping one replica of this variant alive (cheapest unit
    /// cost in its candidate set).
    pub keep_alive_cost: f64,
}

/// Zero-rate input for one model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelZeroRateInput {
    /// The model.
    pub model_id: ModelId,
    /// Resolved scale-to-zero enablement for the model.
    pub scale_to_zero_enabled: bool,
    /// Aggregate request count over the model's retention window.
    pub recent_requests: f64,
    /// All active variants of the model.
    pub variants: Vec<ZeroRateVariant>,
}

/// Resolves the scale-to-zero chain for a model: the per-model hint if set,
/// else the config-store default, else the environment flag, else off.
#[must_use]
pub fn resolve_scale_to_zero(
    per_model_hint: Option<bool>,
    config_default: Option<bool>,
    env_flag: Option<bool>,
) -> bool {
    per_model_hint
        .or(config_default)
        .or(env_flag)
        .unwrap_or(false)
}

/// Applies the zero-rate policy in place, model by model.
///
/// The policy never raises a variant above the allocator's output except to
/// keep one replica alive; applying it twice yields the same solution.
pub fn apply(solution: &mut AllocationSolution, models: &[ModelZeroRateInput]) {
    for model in models {
        apply_model(solution, model);
    }
}

fn apply_model(solution: &mut AllocationSolution, model: &ModelZeroRateInput) {
    let in_solution: Vec<&ZeroRateVariant> = model
        .variants
        .iter()
        .filter(|v| solution.contains_key(&v.key))
        .collect();
    if in_solution.is_empty() {
        return;
    }

    let any_serving = in_solution
        .iter()
        .any(|v| solution[&v.key].allocation.num_replicas >= 1);
    if any_serving {
        return;
    }

    let keep_one = !model.scale_to_zero_enabled || model.recent_requests > 0.0;
    if !keep_one {
        for variant in &in_solution {
            set_replicas(solution, &variant.key, 0);
        }
        tracing::debug!(model = %model.model_id, "idle and scale-to-zero enabled, releasing all variants");
        return;
    }

    let Some(keeper) = elect_keeper(&in_solution) else {
        return;
    };
    for variant in &in_solution {
        let replicas = u32::from(variant.key == *keeper);
        set_replicas(solution, &variant.key, replicas);
    }
    tracing::debug!(model = %model.model_id, keeper = %keeper, "keeping one replica alive");
}

/// Keep-alive election: variants already running take precedence, then the
/// cheapest, then the lexicographically smallest key.
fn elect_keeper<'a>(variants: &[&'a ZeroRateVariant]) -> Option<&'a VariantKey> {
    variants
        .iter()
        .min_by(|a, b| {
            let a_rank = (a.current_replicas == 0, a.keep_alive_cost);
            let b_rank = (b.current_replicas == 0, b.keep_alive_cost);
            a_rank
                .partial_cmp(&b_rank)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.key.cmp(&b.key))
        })
        .map(|v| &v.key)
}

fn set_replicas(solution: &mut AllocationSolution, key: &VariantKey, replicas: u32) {
    if let Some(decision) = solution.get_mut(key) {
        if decision.allocation.num_replicas != replicas {
            decision.allocation = decision.allocation.with_replicas(replicas, decision.unit_cost);
        }
    }
}
