// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! Fallback policy: deterministic desired-allocation selection when the
//! optimizer produced no decision for a variant.

use chrono::{DateTime, Utc};
use wva_config::status::{LastUpdate, OptimizedAlloc};
use wva_config::AcceleratorName;

/// Default reason recorded when no more specific annotation applies.
pub const DEFAULT_FALLBACK_REASON: &str =
    "Fallback: preserving previous allocation (no optimizer solution)";

/// Everything the fallback decision needs about one variant.
#[derive(Debug, Clone)]
pub struct FallbackInput<'a> {
    /// The previous desired allocation, if any.
    pub previous: Option<&'a OptimizedAlloc>,
    /// Observed replica count from the workload object.
    pub current_replicas: u32,
    /// Lower replica bound, if set.
    pub min_replicas: Option<u32>,
    /// Upper replica bound, if set.
    pub max_replicas: Option<u32>,
    /// Whether other variants of the same model currently have a desired
    /// count of at least one.
    pub others_serving: bool,
    /// The variant's accelerator, used when publishing a first allocation.
    pub accelerator: AcceleratorName,
}

/// Produces the fallback allocation for one variant.
///
/// Selection order: preserve the previous allocation (clamped to any newly
/// tightened bounds); publish a late-discovered deployment's observed
/// count; otherwise stay at zero. The replica delta is recomputed against
/// the previous count and the update time is stamped when absent.
#[must_use]
pub fn decide(input: &FallbackInput<'_>, now: DateTime<Utc>) -> OptimizedAlloc {
    let previous_replicas = input.previous.map_or(0, |p| p.num_replicas);

    let (num_replicas, accelerator, mut last_update) = match input.previous {
        Some(previous) => {
            let lo = input.min_replicas.unwrap_or(0);
            let hi = input.max_replicas.unwrap_or(u32::MAX).max(lo);
            let clamped = previous.num_replicas.clamp(lo, hi);
            let mut last_update = previous.last_update.clone();
            if clamped != previous.num_replicas {
                let annotation =
                    format!("clamped from {} to {}", previous.num_replicas, clamped);
                last_update.reason = if last_update.reason.is_empty() {
                    annotation
                } else {
                    format!("{}; {}", last_update.reason, annotation)
                };
            }
            (clamped, previous.accelerator.clone(), last_update)
        }
        None if input.current_replicas > 0 => (
            input.current_replicas,
            input.accelerator.clone(),
            LastUpdate {
                time: None,
                reason: "deployment discovered late".to_owned(),
                delta: 0,
            },
        ),
        None if input.others_serving => (
            0,
            input.accelerator.clone(),
            LastUpdate {
                time: None,
                reason: "maintaining controller intent".to_owned(),
                delta: 0,
            },
        ),
        None => (0, input.accelerator.clone(), LastUpdate::default()),
    };

    if last_update.reason.is_empty() {
        last_update.reason = DEFAULT_FALLBACK_REASON.to_owned();
    }
    if last_update.time.is_none() {
        last_update.time = Some(now);
    }
    last_update.delta = i64::from(num_replicas) - i64::from(previous_replicas);

    OptimizedAlloc {
        num_replicas,
        accelerator,
        last_update,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn previous(replicas: u32, reason: &str, time: Option<DateTime<Utc>>) -> OptimizedAlloc {
        OptimizedAlloc {
            num_replicas: replicas,
            accelerator: "A100".into(),
            last_update: LastUpdate {
                time,
                reason: reason.to_owned(),
                delta: 0,
            },
        }
    }

    fn input<'a>(previous: Option<&'a OptimizedAlloc>) -> FallbackInput<'a> {
        FallbackInput {
            previous,
            current_replicas: 0,
            min_replicas: None,
            max_replicas: None,
            others_serving: false,
            accelerator: "A100".into(),
        }
    }

    #[test]
    fn preserves_previous_allocation() {
        let now = Utc::now();
        let earlier = now - chrono::Duration::minutes(10);
        let prev = previous(3, "optimized", Some(earlier));
        let alloc = decide(&input(Some(&prev)), now);
        assert_eq!(alloc.num_replicas, 3);
        assert_eq!(alloc.accelerator, "A100");
        assert_eq!(alloc.last_update.reason, "optimized");
        assert_eq!(
            alloc.last_update.time,
            Some(earlier),
            "existing update time must be preserved"
        );
        assert_eq!(alloc.last_update.delta, 0);
    }

    #[test]
    fn clamps_previous_to_tightened_bounds() {
        let now = Utc::now();
        let prev = previous(7, "optimized", Some(now));
        let mut fi = input(Some(&prev));
        fi.max_replicas = Some(3);
        let alloc = decide(&fi, now);
        assert_eq!(alloc.num_replicas, 3);
        assert!(alloc.last_update.reason.contains("clamped from 7 to 3"));
        assert_eq!(alloc.last_update.delta, -4);
    }

    #[test]
    fn late_discovered_deployment_publishes_observed_count() {
        let now = Utc::now();
        let mut fi = input(None);
        fi.current_replicas = 2;
        let alloc = decide(&fi, now);
        assert_eq!(alloc.num_replicas, 2);
        assert_eq!(alloc.last_update.reason, "deployment discovered late");
        assert_eq!(alloc.last_update.time, Some(now));
        assert_eq!(alloc.last_update.delta, 2);
    }

    #[test]
    fn defers_to_serving_siblings() {
        let now = Utc::now();
        let mut fi = input(None);
        fi.others_serving = true;
        let alloc = decide(&fi, now);
        assert_eq!(alloc.num_replicas, 0);
        assert_eq!(alloc.last_update.reason, "maintaining controller intent");
    }

    #[test]
    fn empty_reason_gets_default() {
        let now = Utc::now();
        let prev = previous(1, "", None);
        let alloc = decide(&input(Some(&prev)), now);
        assert_eq!(alloc.last_update.reason, DEFAULT_FALLBACK_REASON);
        assert_eq!(alloc.last_update.time, Some(now));
    }

    #[test]
    fn no_history_no_siblings_stays_at_zero() {
        let now = Utc::now();
        let alloc = decide(&input(None), now);
        assert_eq!(alloc.num_replicas, 0);
        assert_eq!(alloc.last_update.reason, DEFAULT_FALLBACK_REASON);
    }
}
