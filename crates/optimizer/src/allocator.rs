// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! The priority-ordered, cost-minimizing greedy allocator.

use crate::error::Error;
use std::collections::BTreeMap;
use wva_config::settings::SaturationPolicy;
use wva_config::VariantKey;
use wva_model::Allocation;

/// One analyzer candidate together with the unit cost needed to rescale it.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// The analyzer-produced allocation.
    pub allocation: Allocation,
    /// Cost of one replica on this accelerator.
    pub unit_cost: f64,
}

/// Allocator input for one variant.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerVariant {
    /// The variant's unique key.
    pub key: VariantKey,
    /// SLO-class priority: 1 is highest, 100 lowest.
    pub priority: u8,
    /// Lower replica bound, if set.
    pub min_replicas: Option<u32>,
    /// Upper replica bound, if set.
    pub max_replicas: Option<u32>,
    /// Analyzer candidates, one per feasible accelerator.
    pub candidates: Vec<Candidate>,
}

/// The allocator's decision for one variant.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantDecision {
    /// The chosen allocation, after bounds clamping.
    pub allocation: Allocation,
    /// Cost of one replica on the chosen accelerator.
    pub unit_cost: f64,
    /// Whether the published count still meets the SLO. Clamping below the
    /// analytic minimum (or a saturating candidate) clears this.
    pub slo_met: bool,
    /// The pre-clamp replica count when bounds clamping changed it.
    pub clamped_from: Option<u32>,
}

/// The per-tick allocation map, keyed deterministically.
pub type AllocationSolution = BTreeMap<VariantKey, VariantDecision>;

/// The priority-ordered greedy optimizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Optimizer {
    saturation_policy: SaturationPolicy,
}

impl Optimizer {
    /// Creates an optimizer with the given saturation policy.
    ///
    /// Saturation policies other than `None` only matter once accelerator
    /// capacity is limited; in the current unlimited mode they are recorded
    /// and ignored.
    #[must_use]
    pub fn new(saturation_policy: SaturationPolicy) -> Self {
        if saturation_policy != SaturationPolicy::None {
            tracing::info!(
                policy = ?saturation_policy,
                "saturation policy configured; inert while capacity is unlimited"
            );
        }
        Self { saturation_policy }
    }

    /// Returns the configured saturation policy.
    #[must_use]
    pub const fn saturation_policy(&self) -> SaturationPolicy {
        self.saturation_policy
    }

    /// Picks exactly one allocation per variant, minimizing cost.
    ///
    /// Priority groups are processed in ascending priority value; within a
    /// group variants are processed in key order. Variants without
    /// candidates are skipped (the fallback policy covers them); if *no*
    /// variant receives an allocation the solve fails.
    pub fn solve(&self, variants: &[OptimizerVariant]) -> Result<AllocationSolution, Error> {
        let mut by_priority: BTreeMap<u8, BTreeMap<&VariantKey, &OptimizerVariant>> =
            BTreeMap::new();
        for variant in variants {
            let _ = by_priority
                .entry(variant.priority)
                .or_default()
                .insert(&variant.key, variant);
        }

        let mut solution = AllocationSolution::new();
        for group in by_priority.values() {
            for (key, variant) in group {
                match Self::choose(variant) {
                    Some(decision) => {
                        let _ = solution.insert((*key).clone(), decision);
                    }
                    None => {
                        tracing::debug!(
                            variant = %key,
                            "no candidate allocation, deferring to fallback"
                        );
                    }
                }
            }
        }

        if solution.is_empty() && !variants.is_empty() {
            return Err(Error::NoFeasibleAllocation {
                num_variants: variants.len(),
            });
        }
        Ok(solution)
    }

    /// Minimum-cost candidate satisfying the SLO, with deterministic
    /// tie-breaking by accelerator name then replica count, then bounds
    /// clamping.
    fn choose(variant: &OptimizerVariant) -> Option<VariantDecision> {
        let best = variant
            .candidates
            .iter()
            .min_by(|a, b| {
                // Candidates that meet the SLO beat saturating ones at any
                // cost.
                (a.allocation.saturating, a.allocation.cost)
                    .partial_cmp(&(b.allocation.saturating, b.allocation.cost))
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.allocation.accelerator.cmp(&b.allocation.accelerator))
                    .then_with(|| a.allocation.num_replicas.cmp(&b.allocation.num_replicas))
            })?
            .clone();

        let required = best.allocation.num_replicas;
        let lo = variant.min_replicas.unwrap_or(0);
        let hi = variant.max_replicas.unwrap_or(u32::MAX).max(lo);
        let clamped = required.clamp(lo, hi);

        let slo_met = !best.allocation.saturating && clamped >= required;
        let allocation = if clamped == required {
            best.allocation
        } else {
            best.allocation.with_replicas(clamped, best.unit_cost)
        };

        Some(VariantDecision {
            allocation,
            unit_cost: best.unit_cost,
            slo_met,
            clamped_from: (clamped != required).then_some(required),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(accelerator: &str, replicas: u32, unit_cost: f64) -> Candidate {
        Candidate {
            allocation: Allocation {
                accelerator: accelerator.to_owned().into(),
                num_replicas: replicas,
                max_batch: 16,
                cost: f64::from(replicas) * unit_cost,
                itl_average: 28.0,
                ttft_average: 500.0,
                saturating: false,
            },
            unit_cost,
        }
    }

    fn variant(ns: &str, id: &str, priority: u8, candidates: Vec<Candidate>) -> OptimizerVariant {
        OptimizerVariant {
            key: VariantKey::new(ns.to_owned().into(), id.to_owned().into()),
            priority,
            min_replicas: None,
            max_replicas: None,
            candidates,
        }
    }

    #[test]
    fn picks_cheapest_candidate() {
        let v = variant(
            "prod",
            "llama-A100-1",
            1,
            vec![candidate("H100", 1, 40.0), candidate("A100", 2, 10.0)],
        );
        let solution = Optimizer::default().solve(&[v.clone()]).expect("solution");
        let decision = &solution[&v.key];
        assert_eq!(decision.allocation.accelerator, "A100");
        assert_eq!(decision.allocation.num_replicas, 2);
        assert!(decision.slo_met);
    }

    #[test]
    fn tie_breaks_by_accelerator_name() {
        let v = variant(
            "prod",
            "llama-A100-1",
            1,
            vec![candidate("H100", 2, 10.0), candidate("A100", 2, 10.0)],
        );
        let solution = Optimizer::default().solve(&[v.clone()]).expect("solution");
        assert_eq!(solution[&v.key].allocation.accelerator, "A100");
    }

    #[test]
    fn prefers_slo_meeting_over_cheaper_saturating() {
        let mut saturating = candidate("A100", 4, 1.0);
        saturating.allocation.saturating = true;
        let v = variant(
            "prod",
            "llama-A100-1",
            1,
            vec![saturating, candidate("H100", 1, 40.0)],
        );
        let solution = Optimizer::default().solve(&[v.clone()]).expect("solution");
        let decision = &solution[&v.key];
        assert_eq!(decision.allocation.accelerator, "H100");
        assert!(decision.slo_met);
    }

    #[test]
    fn clamps_to_max_and_marks_unmet() {
        let mut v = variant("prod", "llama-A100-1", 1, vec![candidate("A100", 7, 10.0)]);
        v.max_replicas = Some(3);
        let solution = Optimizer::default().solve(&[v.clone()]).expect("solution");
        let decision = &solution[&v.key];
        assert_eq!(decision.allocation.num_replicas, 3);
        assert!((decision.allocation.cost - 30.0).abs() < f64::EPSILON);
        assert!(!decision.slo_met);
        assert_eq!(decision.clamped_from, Some(7));
    }

    #[test]
    fn clamps_up_to_min_without_unmet() {
        let mut v = variant("prod", "llama-A100-1", 1, vec![candidate("A100", 1, 10.0)]);
        v.min_replicas = Some(2);
        let solution = Optimizer::default().solve(&[v.clone()]).expect("solution");
        let decision = &solution[&v.key];
        assert_eq!(decision.allocation.num_replicas, 2);
        assert!(decision.slo_met, "raising above the minimum keeps the SLO");
        assert_eq!(decision.clamped_from, Some(1));
    }

    #[test]
    fn processes_priority_groups_deterministically() {
        let high = variant("prod", "llama-A100-1", 1, vec![candidate("A100", 1, 10.0)]);
        let low = variant("prod", "phi-A100-1", 50, vec![candidate("A100", 1, 10.0)]);
        let solution = Optimizer::default()
            .solve(&[low.clone(), high.clone()])
            .expect("solution");
        assert_eq!(solution.len(), 2);
        // Same inputs, any order: identical output map.
        let again = Optimizer::default()
            .solve(&[high, low])
            .expect("solution");
        assert_eq!(solution, again);
    }

    #[test]
    fn empty_candidates_defer_to_fallback() {
        let with = variant("prod", "llama-A100-1", 1, vec![candidate("A100", 1, 10.0)]);
        let without = variant("prod", "phi-A100-1", 1, vec![]);
        let solution = Optimizer::default()
            .solve(&[with.clone(), without.clone()])
            .expect("solution");
        assert!(solution.contains_key(&with.key));
        assert!(!solution.contains_key(&without.key));
    }

    #[test]
    fn all_empty_is_no_feasible_allocation() {
        let a = variant("prod", "llama-A100-1", 1, vec![]);
        let b = variant("prod", "phi-A100-1", 1, vec![]);
        let err = Optimizer::default().solve(&[a, b]).expect_err("error");
        assert!(matches!(
            err,
            Error::NoFeasibleAllocation { num_variants: 2 }
        ));
    }

    #[test]
    fn empty_input_is_empty_solution() {
        let solution = Optimizer::default().solve(&[]).expect("solution");
        assert!(solution.is_empty());
    }
}
