// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! Variant spec: the declarative record describing one deployment of one
//! model on one accelerator topology.
//!
//! Specs are consumed from an external declarative store and are immutable
//! within one reconciliation tick.

use crate::error::Error;
use crate::{AcceleratorName, ModelId, Namespace, VariantId, VariantKey};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cost assumed for a variant when `variant_cost` is unspecified.
///
/// When several variants fall back to this default the cost comparison
/// between them is ambiguous; the reconciler warns once per tick.
pub const DEFAULT_VARIANT_COST: &str = "10";

/// Decode-phase latency parameters: `itl(bs) = alpha + beta * bs` in ms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecodeParms {
    /// Fixed per-token decode latency in ms.
    pub alpha: f64,
    /// Per-batch-slot decode latency slope in ms.
    pub beta: f64,
}

/// Prefill-phase latency parameters: `prefill(k, bs) = gamma + delta * k * bs` in ms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrefillParms {
    /// Fixed prefill latency in ms.
    pub gamma: f64,
    /// Per-input-token, per-batch-slot prefill latency slope in ms.
    pub delta: f64,
}

/// Performance profile derived from offline benchmarking of the
/// (model, accelerator) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfParms {
    /// Decode (inter-token latency) line.
    pub decode_parms: DecodeParms,
    /// Prefill (time-to-first-token contribution) line.
    pub prefill_parms: PrefillParms,
}

/// Reference to an external SLO class by name and key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SloClassRef {
    /// The config collection holding the class.
    pub name: String,
    /// The key of the class within the collection.
    pub key: String,
}

/// Reference to the workload object a variant scales.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScaleTargetRef {
    /// The kind of the workload object (e.g. `Deployment`).
    pub kind: String,
    /// The name of the workload object.
    pub name: String,
}

/// The declarative record for one variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantSpec {
    /// The served model. Multiple variants may share it.
    #[serde(rename = "modelID")]
    pub model_id: ModelId,

    /// Human-readable identifier, pattern `{modelID}-{accelerator}-{count}`.
    #[serde(rename = "variantID")]
    pub variant_id: VariantId,

    /// The namespace the variant lives in.
    pub namespace: Namespace,

    /// The accelerator type this variant runs on.
    pub accelerator: AcceleratorName,

    /// Number of accelerators per replica.
    pub accelerator_count: u32,

    /// Unit cost per replica as a decimal string. Defaults to
    /// [`DEFAULT_VARIANT_COST`] when unspecified.
    #[serde(default = "default_variant_cost")]
    pub variant_cost: String,

    /// Benchmarked performance parameters.
    pub perf_parms: PerfParms,

    /// Saturation bound for the decode batch size.
    pub max_batch_size: u32,

    /// Reference to the SLO class governing this variant's model.
    pub slo_class_ref: SloClassRef,

    /// Lower replica bound, if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<u32>,

    /// Upper replica bound, if set. Must be >= `min_replicas`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<u32>,

    /// The workload object to scale.
    pub scale_target_ref: ScaleTargetRef,

    /// Tri-state scale-to-zero override: unset defers to the per-model and
    /// global configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_scale_to_zero: Option<bool>,

    /// How long a model may be idle before its pods are released.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "humantime_serde"
    )]
    pub scale_to_zero_pod_retention_period: Option<Duration>,

    /// Deletion marker: set when the variant is being removed from the
    /// declarative store. The reconciler skips marked variants.
    #[serde(default)]
    pub deleted: bool,
}

fn default_variant_cost() -> String {
    DEFAULT_VARIANT_COST.to_owned()
}

impl VariantSpec {
    /// Returns the unique key of this variant.
    #[must_use]
    pub fn key(&self) -> VariantKey {
        VariantKey::new(self.namespace.clone(), self.variant_id.clone())
    }

    /// Returns the parsed unit cost.
    ///
    /// The cost field is a decimal string in the declarative store;
    /// unparseable values are a validation violation.
    pub fn cost(&self) -> Result<f64, Error> {
        self.variant_cost
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|c| c.is_finite() && *c >= 0.0)
            .ok_or_else(|| Error::ValidationViolation {
                variant: self.key().as_string(),
                message: format!("variantCost `{}` is not a decimal string", self.variant_cost),
            })
    }

    /// Whether this variant relies on the default cost.
    #[must_use]
    pub fn has_default_cost(&self) -> bool {
        self.variant_cost.trim() == DEFAULT_VARIANT_COST
    }

    /// Validates the structural constraints of the spec.
    ///
    /// Enforced: non-empty ids, the `{modelID}-{accelerator}-{count}`
    /// variant-id pattern with count >= 1, `accelerator_count >= 1`,
    /// `max_batch_size >= 1`, `max_replicas >= min_replicas`, and a
    /// parseable cost.
    pub fn validate(&self) -> Result<(), Error> {
        let violation = |message: String| Error::ValidationViolation {
            variant: self.key().as_string(),
            message,
        };

        if self.model_id.is_empty() {
            return Err(violation("modelID must be non-empty".to_owned()));
        }
        if self.variant_id.is_empty() {
            return Err(violation("variantID must be non-empty".to_owned()));
        }
        let prefix = format!("{}-{}-", self.model_id, self.accelerator);
        let count_ok = self
            .variant_id
            .strip_prefix(prefix.as_str())
            .and_then(|rest| rest.parse::<u32>().ok())
            .is_some_and(|count| count >= 1);
        if !count_ok {
            return Err(violation(format!(
                "variantID `{}` does not match `{{modelID}}-{{accelerator}}-{{count}}` with count >= 1",
                self.variant_id
            )));
        }
        if self.accelerator_count < 1 {
            return Err(violation("acceleratorCount must be >= 1".to_owned()));
        }
        if self.max_batch_size < 1 {
            return Err(violation("maxBatchSize must be >= 1".to_owned()));
        }
        if let (Some(min), Some(max)) = (self.min_replicas, self.max_replicas) {
            if max < min {
                return Err(violation(format!(
                    "maxReplicas ({max}) must be >= minReplicas ({min})"
                )));
            }
        }
        let _cost = self.cost()?;
        Ok(())
    }

    /// Clamps a replica count to the `[min_replicas, max_replicas]` interval.
    #[must_use]
    pub fn clamp_replicas(&self, replicas: u32) -> u32 {
        let lo = self.min_replicas.unwrap_or(0);
        let hi = self.max_replicas.unwrap_or(u32::MAX);
        replicas.clamp(lo, hi.max(lo))
    }
}
