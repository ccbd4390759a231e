// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! The autoscaler metric set.

use crate::error::Error;
use crate::labels::sanitize_label;
use prometheus::{GaugeVec, IntCounterVec, Opts, Registry};

/// Direction label values for scaling events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingDirection {
    /// The desired count increased.
    Up,
    /// The desired count decreased.
    Down,
}

impl ScalingDirection {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    /// Direction of a replica delta, if any.
    #[must_use]
    pub const fn from_delta(delta: i64) -> Option<Self> {
        match delta {
            d if d > 0 => Some(Self::Up),
            d if d < 0 => Some(Self::Down),
            _ => None,
        }
    }
}

/// The emitted metric set.
///
/// One instance per process in production; tests register their own against
/// a private registry.
#[derive(Debug, Clone)]
pub struct AutoscalerMetrics {
    replica_scaling_total: IntCounterVec,
    desired_replicas: GaugeVec,
    current_replicas: GaugeVec,
    desired_ratio: GaugeVec,
    predicted_ttft: GaugeVec,
    predicted_itl: GaugeVec,
    target_conflicts: GaugeVec,
    conflict_resolution: GaugeVec,
}

impl AutoscalerMetrics {
    /// Creates the metric set and registers it.
    ///
    /// Registration is idempotent: collectors already present in the
    /// registry are left in place and the call succeeds.
    pub fn register(registry: &Registry) -> Result<Self, Error> {
        let replica_scaling_total = IntCounterVec::new(
            Opts::new(
                "wva_replica_scaling_total",
                "Replica scaling decisions by direction and reason",
            ),
            &[
                "target_name",
                "target_kind",
                "namespace",
                "direction",
                "reason",
                "accelerator_type",
            ],
        )?;
        let alloc_labels = ["target_name", "target_kind", "namespace", "accelerator_type"];
        let desired_replicas = GaugeVec::new(
            Opts::new("wva_desired_replicas", "Desired replica count per variant"),
            &alloc_labels,
        )?;
        let current_replicas = GaugeVec::new(
            Opts::new("wva_current_replicas", "Observed replica count per variant"),
            &alloc_labels,
        )?;
        let desired_ratio = GaugeVec::new(
            Opts::new(
                "wva_desired_ratio",
                "Ratio of desired to observed replicas per variant",
            ),
            &alloc_labels,
        )?;
        let prediction_labels = ["model_name", "target_name", "namespace", "accelerator_type"];
        let predicted_ttft = GaugeVec::new(
            Opts::new(
                "wva_predicted_ttft",
                "Predicted mean time-to-first-token in ms",
            ),
            &prediction_labels,
        )?;
        let predicted_itl = GaugeVec::new(
            Opts::new(
                "wva_predicted_itl",
                "Predicted mean inter-token latency in ms",
            ),
            &prediction_labels,
        )?;
        let target_conflicts = GaugeVec::new(
            Opts::new(
                "wva_deployment_target_conflicts_total",
                "Variants claiming the same scale target",
            ),
            &["deployment", "namespace"],
        )?;
        let conflict_resolution = GaugeVec::new(
            Opts::new(
                "wva_conflict_resolution_status",
                "Conflict election outcome per variant (1 winner, 0 suppressed)",
            ),
            &["variant_name", "namespace", "deployment", "resolution"],
        )?;

        let metrics = Self {
            replica_scaling_total,
            desired_replicas,
            current_replicas,
            desired_ratio,
            predicted_ttft,
            predicted_itl,
            target_conflicts,
            conflict_resolution,
        };
        metrics.register_all(registry)?;
        Ok(metrics)
    }

    fn register_all(&self, registry: &Registry) -> Result<(), Error> {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(self.replica_scaling_total.clone()),
            Box::new(self.desired_replicas.clone()),
            Box::new(self.current_replicas.clone()),
            Box::new(self.desired_ratio.clone()),
            Box::new(self.predicted_ttft.clone()),
            Box::new(self.predicted_itl.clone()),
            Box::new(self.target_conflicts.clone()),
            Box::new(self.conflict_resolution.clone()),
        ];
        for collector in collectors {
            match registry.register(collector) {
                Ok(()) => {}
                // Re-registration on the same process is a no-op.
                Err(prometheus::Error::AlreadyReg) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    /// Records one scaling decision.
    pub fn record_scaling(
        &self,
        target_name: &str,
        target_kind: &str,
        namespace: &str,
        direction: ScalingDirection,
        reason: &str,
        accelerator: &str,
    ) {
        self.replica_scaling_total
            .with_label_values(&[
                &sanitize_label(target_name),
                &sanitize_label(target_kind),
                &sanitize_label(namespace),
                direction.as_str(),
                &sanitize_label(reason),
                &sanitize_label(accelerator),
            ])
            .inc();
    }

    /// Publishes the desired/current replica gauges and their ratio.
    ///
    /// The ratio gauge is zero while nothing is observed running.
    pub fn record_allocation(
        &self,
        target_name: &str,
        target_kind: &str,
        namespace: &str,
        accelerator: &str,
        desired: u32,
        current: u32,
    ) {
        let labels = [
            sanitize_label(target_name),
            sanitize_label(target_kind),
            sanitize_label(namespace),
            sanitize_label(accelerator),
        ];
        let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
        self.desired_replicas
            .with_label_values(&labels)
            .set(f64::from(desired));
        self.current_replicas
            .with_label_values(&labels)
            .set(f64::from(current));
        let ratio = if current > 0 {
            f64::from(desired) / f64::from(current)
        } else {
            0.0
        };
        self.desired_ratio.with_label_values(&labels).set(ratio);
    }

    /// Publishes the predicted latency gauges for one variant.
    pub fn record_prediction(
        &self,
        model_name: &str,
        target_name: &str,
        namespace: &str,
        accelerator: &str,
        ttft_ms: f64,
        itl_ms: f64,
    ) {
        let labels = [
            sanitize_label(model_name),
            sanitize_label(target_name),
            sanitize_label(namespace),
            sanitize_label(accelerator),
        ];
        let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
        self.predicted_ttft.with_label_values(&labels).set(ttft_ms);
        self.predicted_itl.with_label_values(&labels).set(itl_ms);
    }

    /// Publishes the claimant count for one scale target.
    pub fn record_conflict(&self, deployment: &str, namespace: &str, claimants: usize) {
        self.target_conflicts
            .with_label_values(&[&sanitize_label(deployment), &sanitize_label(namespace)])
            .set(claimants as f64);
    }

    /// Publishes the election outcome for one variant.
    pub fn record_resolution(
        &self,
        variant_name: &str,
        namespace: &str,
        deployment: &str,
        applied: bool,
    ) {
        let resolution = if applied { "applied" } else { "suppressed" };
        self.conflict_resolution
            .with_label_values(&[
                &sanitize_label(variant_name),
                &sanitize_label(namespace),
                &sanitize_label(deployment),
                resolution,
            ])
            .set(f64::from(u8::from(applied)));
    }
}
