// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! Conflict resolver: when several variants target the same workload
//! object, exactly one wins.

use std::collections::{BTreeMap, BTreeSet};
use wva_config::{Namespace, VariantKey};

/// One variant's claim on a scale target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetClaim {
    /// The claiming variant.
    pub key: VariantKey,
    /// The name of the claimed workload object.
    pub target_name: String,
}

/// All claims on one `(namespace, target)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetGroup {
    /// The namespace of the workload object.
    pub namespace: Namespace,
    /// The name of the workload object.
    pub target_name: String,
    /// Every claimant, in deterministic order.
    pub claimants: Vec<VariantKey>,
    /// The elected winner: the lexicographically smallest variant id.
    pub winner: VariantKey,
}

/// The resolver's verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictResolution {
    /// One group per claimed `(namespace, target)` pair.
    pub groups: Vec<TargetGroup>,
    /// Variants whose desired allocation must not be published.
    pub suppressed: BTreeSet<VariantKey>,
}

impl ConflictResolution {
    /// Whether the given variant won its group (or was unchallenged).
    #[must_use]
    pub fn is_applied(&self, key: &VariantKey) -> bool {
        !self.suppressed.contains(key)
    }
}

/// Groups claims by `(namespace, target)` and elects winners.
///
/// Election is deterministic: the lexicographically smallest variant id in
/// the group wins; every other claimant is suppressed.
#[must_use]
pub fn resolve(claims: &[TargetClaim]) -> ConflictResolution {
    let mut by_target: BTreeMap<(Namespace, String), Vec<VariantKey>> = BTreeMap::new();
    for claim in claims {
        by_target
            .entry((claim.key.namespace().clone(), claim.target_name.clone()))
            .or_default()
            .push(claim.key.clone());
    }

    let mut resolution = ConflictResolution::default();
    for ((namespace, target_name), mut claimants) in by_target {
        claimants.sort_by(|a, b| a.variant_id().cmp(b.variant_id()));
        let winner = claimants[0].clone();
        if claimants.len() > 1 {
            tracing::warn!(
                namespace = %namespace,
                target = %target_name,
                claimants = claimants.len(),
                winner = %winner,
                "multiple variants claim the same scale target"
            );
            for loser in claimants.iter().skip(1) {
                let _ = resolution.suppressed.insert(loser.clone());
            }
        }
        resolution.groups.push(TargetGroup {
            namespace,
            target_name,
            claimants,
            winner,
        });
    }
    resolution
}
