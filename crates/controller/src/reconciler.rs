// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! The reconciler: one end-to-end optimization pipeline per tick.
//!
//! A tick is self-contained: configuration is re-read, variants are
//! listed, metrics are collected (through the cache), the analyzer and
//! optimizer run on in-memory snapshots, the zero-rate and conflict
//! policies post-process the solution, and every active variant gets
//! exactly one status publication. Per-variant failures never fail the
//! tick; they surface as conditions on the affected variant.

use crate::backoff::Backoff;
use crate::error::Error;
use crate::store::{
    ConfigStore, VariantRecord, VariantStore, WorkloadStore, COLLECTION_ACCELERATOR_COSTS,
    COLLECTION_RECONCILIATION, COLLECTION_SCALE_TO_ZERO, COLLECTION_SERVICE_CLASSES,
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wva_collector::{CacheEntry, Collector, MetricsAvailability, MetricsBackend, MetricsCache};
use wva_config::accelerator::AcceleratorProfile;
use wva_config::scale_to_zero::ScaleToZeroConfig;
use wva_config::settings::{ReconcilerSettings, KEY_OPT_TRIGGER};
use wva_config::slo::{ModelSlo, SloClass};
use wva_config::status::{ConditionStatus, ConditionType, OptimizedAlloc, VariantStatus};
use wva_config::{Namespace, VariantKey};
use wva_model::{AcceleratorPerf, Analyzer};
use wva_optimizer::conflict::{self, TargetClaim};
use wva_optimizer::fallback::{self, FallbackInput};
use wva_optimizer::zero_rate::{self, ModelZeroRateInput, ZeroRateVariant};
use wva_optimizer::{AllocationSolution, Candidate, Optimizer, OptimizerVariant, VariantDecision};
use wva_telemetry::metrics::ScalingDirection;
use wva_telemetry::AutoscalerMetrics;

/// Attempts for the optimistic-concurrency status write loop.
const STATUS_WRITE_ATTEMPTS: u32 = 5;

/// Summary of one tick, for the runner and for tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// The reconciliation interval read this tick.
    pub interval: Duration,
    /// Whether a manual trigger was consumed this tick.
    pub trigger_consumed: bool,
    /// Active (non-deleted, valid) variants seen.
    pub active_variants: usize,
    /// Variants whose status was published.
    pub published: usize,
    /// Variants skipped because their metrics were unusable.
    pub metrics_unavailable: usize,
    /// Variants suppressed by conflict resolution.
    pub suppressed: usize,
    /// Whether the optimizer failed to produce any allocation.
    pub optimizer_failed: bool,
}

/// Why metrics were unusable for a model this tick.
#[derive(Debug, Clone)]
struct MetricsFailure {
    reason: &'static str,
    message: String,
}

/// A variant that survived spec validation and class resolution.
struct PlannedVariant {
    record: VariantRecord,
    unit_cost: f64,
    class: Option<(u8, ModelSlo)>,
}

impl PlannedVariant {
    fn key(&self) -> VariantKey {
        self.record.spec.key()
    }

    fn model_key(&self) -> (Namespace, String) {
        (
            self.record.spec.namespace.clone(),
            self.record.spec.model_id.to_string(),
        )
    }
}

/// The reconciler, generic over its store and backend implementations.
pub struct Reconciler<VS, WS, CS, MB> {
    variants: VS,
    workloads: WS,
    configs: CS,
    collector: Collector<MB>,
    cache: Arc<MetricsCache>,
    metrics: AutoscalerMetrics,
    analyzer: Analyzer,
    backoff: Backoff,
}

impl<VS, WS, CS, MB> Reconciler<VS, WS, CS, MB>
where
    VS: VariantStore,
    WS: WorkloadStore,
    CS: ConfigStore,
    MB: MetricsBackend,
{
    /// Wires a reconciler from its collaborators.
    pub fn new(
        variants: VS,
        workloads: WS,
        configs: CS,
        collector: Collector<MB>,
        cache: Arc<MetricsCache>,
        metrics: AutoscalerMetrics,
    ) -> Self {
        Self {
            variants,
            workloads,
            configs,
            collector,
            cache,
            metrics,
            analyzer: Analyzer::default(),
            backoff: Backoff::default(),
        }
    }

    /// Replaces the retry policy. Tests shrink it to keep wall time down.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Runs one reconciliation tick.
    pub async fn reconcile(&self, cancel: &CancellationToken) -> Result<TickOutcome, Error> {
        let tick_start = Utc::now();

        // Settings and required config collections. A missing required
        // collection aborts the whole tick.
        let settings = self.read_settings().await?;
        // The cache TTL tracks the freshly-read interval: half of it,
        // floored at 5 seconds.
        self.cache.set_ttl(settings.cache_ttl());
        let mut outcome = TickOutcome {
            interval: settings.interval,
            ..TickOutcome::default()
        };
        if settings.trigger_requested {
            self.configs
                .put_value(COLLECTION_RECONCILIATION, KEY_OPT_TRIGGER, "false")
                .await?;
            outcome.trigger_consumed = true;
            tracing::info!("manual optimization trigger consumed");
        }

        let (accelerators, classes) = match (
            self.read_accelerators().await,
            self.read_slo_classes().await,
        ) {
            (Ok(accelerators), Ok(classes)) => (accelerators, classes),
            (accelerators, classes) => {
                // A missing required collection aborts the tick, surfaced
                // on every active variant.
                let err = accelerators.err().or_else(|| classes.err()).unwrap_or(
                    Error::StoreUnavailable {
                        details: "config collection read failed".to_owned(),
                    },
                );
                self.mark_all_not_ready("ConfigMissing", &err.to_string(), tick_start)
                    .await;
                return Err(err);
            }
        };
        let scale_to_zero = self.read_scale_to_zero().await;

        // Active variant snapshot.
        let records = self.variants.list().await?;
        let active = Self::filter_active(records);
        outcome.active_variants = active.len();
        if active.is_empty() {
            return Ok(outcome);
        }
        Self::warn_on_ambiguous_costs(&active);

        let planned: Vec<PlannedVariant> = active
            .into_iter()
            .map(|record| self.plan_variant(record, &accelerators, &classes))
            .collect();

        // Per-model metric collection through the cache, fanned out on a
        // bounded worker pool.
        let model_metrics = self
            .collect_model_metrics(&planned, &scale_to_zero, settings.collector_workers)
            .await;

        // Observed replica counts, same worker bound.
        let observed = self
            .fetch_workloads(&planned, settings.collector_workers)
            .await;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        // Analyzer + optimizer over the variants with usable metrics.
        let optimizer_inputs =
            self.build_optimizer_inputs(&planned, &model_metrics);
        let optimizer = Optimizer::new(settings.saturation_policy);
        let mut solution = match optimizer.solve(&optimizer_inputs) {
            Ok(solution) => solution,
            Err(err) => {
                tracing::warn!(error = %err, "optimizer produced no allocation");
                outcome.optimizer_failed = true;
                AllocationSolution::new()
            }
        };

        // Zero-rate policy per (namespace, model).
        let zero_rate_inputs =
            Self::build_zero_rate_inputs(&planned, &model_metrics, &observed, &scale_to_zero, &settings);
        zero_rate::apply(&mut solution, &zero_rate_inputs);

        // Conflict election over every active variant's scale target.
        let claims: Vec<TargetClaim> = planned
            .iter()
            .map(|p| TargetClaim {
                key: p.key(),
                target_name: p.record.spec.scale_target_ref.name.clone(),
            })
            .collect();
        let resolution = conflict::resolve(&claims);
        for group in &resolution.groups {
            self.metrics
                .record_conflict(&group.target_name, &group.namespace, group.claimants.len());
            for claimant in &group.claimants {
                self.metrics.record_resolution(
                    claimant.variant_id(),
                    claimant.namespace(),
                    &group.target_name,
                    resolution.is_applied(claimant),
                );
            }
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.emit_predictions(&planned, &solution);

        // Status publication, one write (with conflict retry) per variant.
        let serving_models = Self::serving_models(&planned, &solution);
        for planned_variant in &planned {
            let key = planned_variant.key();
            let suppressed = resolution.suppressed.contains(&key);
            let decision = solution.get(&key);
            let metrics_verdict = model_metrics.get(&planned_variant.model_key());
            let current = observed.get(&key).copied().flatten();

            let published = self
                .publish_status(
                    planned_variant,
                    decision,
                    metrics_verdict,
                    current,
                    suppressed,
                    outcome.optimizer_failed,
                    &serving_models,
                    tick_start,
                )
                .await;
            match published {
                Ok(()) => outcome.published += 1,
                Err(err) => {
                    tracing::error!(variant = %key, error = %err, "status publication failed");
                }
            }
            if suppressed {
                outcome.suppressed += 1;
            }
            if matches!(metrics_verdict, Some(Err(_))) {
                outcome.metrics_unavailable += 1;
            }
        }

        Ok(outcome)
    }

    /// Marks every active variant `OptimizationReady=False`, used when a
    /// required config collection is missing and the tick cannot run.
    async fn mark_all_not_ready(&self, reason: &str, message: &str, tick_start: DateTime<Utc>) {
        let records = match self.variants.list().await {
            Ok(records) => records,
            Err(err) => {
                tracing::error!(error = %err, "variant list failed while surfacing config error");
                return;
            }
        };
        for record in Self::filter_active(records) {
            let key = record.spec.key();
            let fresh = match self.variants.get(&key).await {
                Ok(fresh) => fresh,
                Err(_) => continue,
            };
            let mut status = fresh.status.clone();
            status.set_condition(
                ConditionType::OptimizationReady,
                ConditionStatus::False,
                reason,
                message,
                tick_start,
            );
            if let Err(err) = self
                .variants
                .update_status(&key, fresh.version, status)
                .await
            {
                tracing::warn!(variant = %key, error = %err, "condition write failed");
            }
        }
    }

    async fn read_settings(&self) -> Result<ReconcilerSettings, Error> {
        let map = self
            .configs
            .collection(COLLECTION_RECONCILIATION)
            .await?
            .unwrap_or_default();
        Ok(ReconcilerSettings::from_map(&map)?)
    }

    async fn read_accelerators(&self) -> Result<HashMap<String, AcceleratorProfile>, Error> {
        let entries = self
            .configs
            .collection(COLLECTION_ACCELERATOR_COSTS)
            .await?
            .ok_or_else(|| wva_config::error::Error::ConfigMissing {
                collection: COLLECTION_ACCELERATOR_COSTS.to_owned(),
                key: "*".to_owned(),
            })?;
        let mut profiles = HashMap::new();
        for (name, blob) in &entries {
            match AcceleratorProfile::from_json(name, blob) {
                Ok(profile) => {
                    let _ = profiles.insert(name.clone(), profile);
                }
                Err(err) => {
                    tracing::warn!(accelerator = %name, error = %err, "skipping malformed accelerator profile");
                }
            }
        }
        Ok(profiles)
    }

    async fn read_slo_classes(&self) -> Result<HashMap<String, SloClass>, Error> {
        let entries = self
            .configs
            .collection(COLLECTION_SERVICE_CLASSES)
            .await?
            .ok_or_else(|| wva_config::error::Error::ConfigMissing {
                collection: COLLECTION_SERVICE_CLASSES.to_owned(),
                key: "*".to_owned(),
            })?;
        let mut classes = HashMap::new();
        for (key, blob) in &entries {
            match SloClass::from_yaml(key, blob) {
                Ok(class) => {
                    let _ = classes.insert(key.clone(), class);
                }
                Err(err) => {
                    tracing::warn!(class = %key, error = %err, "skipping malformed SLO class");
                }
            }
        }
        Ok(classes)
    }

    async fn read_scale_to_zero(&self) -> ScaleToZeroConfig {
        match self.configs.collection(COLLECTION_SCALE_TO_ZERO).await {
            Ok(Some(entries)) => ScaleToZeroConfig::from_entries(&entries),
            Ok(None) => ScaleToZeroConfig::default(),
            Err(err) => {
                tracing::warn!(error = %err, "scale-to-zero config unavailable, using defaults");
                ScaleToZeroConfig::default()
            }
        }
    }

    fn filter_active(records: Vec<VariantRecord>) -> Vec<VariantRecord> {
        records
            .into_iter()
            .filter(|record| {
                if record.spec.deleted {
                    tracing::debug!(variant = %record.spec.key(), "skipping deletion-marked variant");
                    return false;
                }
                if let Err(err) = record.spec.validate() {
                    tracing::warn!(variant = %record.spec.key(), error = %err, "skipping invalid variant");
                    return false;
                }
                true
            })
            .collect()
    }

    fn warn_on_ambiguous_costs(records: &[VariantRecord]) {
        let defaulted: Vec<String> = records
            .iter()
            .filter(|r| r.spec.has_default_cost())
            .map(|r| r.spec.key().as_string())
            .collect();
        if defaulted.len() > 1 {
            tracing::warn!(
                variants = ?defaulted,
                "multiple variants use the default cost; cost comparison between them is ambiguous"
            );
        }
    }

    fn plan_variant(
        &self,
        record: VariantRecord,
        accelerators: &HashMap<String, AcceleratorProfile>,
        classes: &HashMap<String, SloClass>,
    ) -> PlannedVariant {
        let spec = &record.spec;
        let class = classes
            .get(&spec.slo_class_ref.key)
            .and_then(|class| Some((class.priority, class.slo_for(&spec.model_id)?)));
        if class.is_none() {
            tracing::warn!(
                variant = %spec.key(),
                class = %spec.slo_class_ref.key,
                model = %spec.model_id,
                "SLO class or per-model target missing, variant will not be optimized"
            );
        }

        // An explicit variant cost wins; otherwise the accelerator profile
        // is scaled by the accelerator count. The literal default backstops
        // variants with neither.
        let unit_cost = if spec.has_default_cost() {
            accelerators
                .get(spec.accelerator.as_ref())
                .map(|p| p.cost * f64::from(spec.accelerator_count))
                .or_else(|| spec.cost().ok())
                .unwrap_or(10.0)
        } else {
            spec.cost().unwrap_or(10.0)
        };

        PlannedVariant {
            record,
            unit_cost,
            class,
        }
    }

    /// Collects metrics once per `(namespace, model)` pair.
    async fn collect_model_metrics(
        &self,
        planned: &[PlannedVariant],
        scale_to_zero: &ScaleToZeroConfig,
        workers: usize,
    ) -> HashMap<(Namespace, String), Result<CacheEntry, MetricsFailure>> {
        let mut retention: BTreeMap<(Namespace, String), Duration> = BTreeMap::new();
        for planned_variant in planned {
            let spec = &planned_variant.record.spec;
            let window = spec
                .scale_to_zero_pod_retention_period
                .unwrap_or_else(|| scale_to_zero.retention_for(&spec.model_id));
            let entry = retention
                .entry(planned_variant.model_key())
                .or_insert(window);
            *entry = (*entry).max(window);
        }

        futures::stream::iter(retention.into_iter().map(|((namespace, model), window)| {
            let ns = namespace.clone();
            async move {
                let result = self.collect_one_model(&model, &ns, window).await;
                ((namespace, model), result)
            }
        }))
        .buffer_unordered(workers.max(1))
        .collect()
        .await
    }

    async fn collect_one_model(
        &self,
        model: &str,
        namespace: &str,
        retention: Duration,
    ) -> Result<CacheEntry, MetricsFailure> {
        if let Some(entry) = self.cache.get(model, namespace) {
            if entry.valid {
                return Ok(entry);
            }
            return Err(MetricsFailure {
                reason: "MetricsUnavailable",
                message: "collection failed within the cache TTL".to_owned(),
            });
        }

        let invalidate = |reason: &'static str, message: String| {
            // Negative entry: variants sharing the model within the TTL
            // must not re-probe a backend that just failed.
            self.cache.set(model, namespace, CacheEntry::default());
            Err(MetricsFailure { reason, message })
        };

        let verdict = match self.collector.availability(model).await {
            Err(err) => return invalidate("PrometheusError", err.to_string()),
            Ok(verdict) => verdict,
        };
        match verdict {
            MetricsAvailability::Missing => {
                invalidate(verdict.reason(), format!("no metrics for model `{model}`"))
            }
            MetricsAvailability::Stale { age_secs } => invalidate(
                verdict.reason(),
                format!("newest sample for `{model}` is {age_secs}s old"),
            ),
            MetricsAvailability::Available => {
                let load = match self.collector.collect(model, namespace).await {
                    Ok(load) => load,
                    Err(err) => return invalidate("PrometheusError", err.to_string()),
                };
                let total_requests = match self
                    .collector
                    .total_requests_over(model, namespace, retention)
                    .await
                {
                    Ok(total) => total,
                    Err(err) => return invalidate("PrometheusError", err.to_string()),
                };
                let entry = CacheEntry {
                    load,
                    total_requests,
                    valid: true,
                };
                self.cache.set(model, namespace, entry);
                Ok(entry)
            }
        }
    }

    /// Fetches observed replica counts, with bounded retry per workload.
    async fn fetch_workloads(
        &self,
        planned: &[PlannedVariant],
        workers: usize,
    ) -> HashMap<VariantKey, Option<u32>> {
        futures::stream::iter(planned.iter().map(|planned_variant| async move {
            let key = planned_variant.key();
            let spec = &planned_variant.record.spec;
            let target = &spec.scale_target_ref;
            let fetched = self
                .backoff
                .retry(
                    "workload fetch",
                    |_e: &Error| true,
                    || self.workloads.get_workload(&spec.namespace, &target.kind, &target.name),
                )
                .await;
            match fetched {
                Ok(workload) => {
                    if let Err(err) = self.variants.set_owner_ref(&key, target).await {
                        tracing::warn!(variant = %key, error = %err, "owner reference patch failed");
                    }
                    (key, Some(workload.observed_replicas()))
                }
                Err(err) => {
                    tracing::warn!(variant = %key, error = %err, "workload fetch failed, keeping previous observation");
                    (key, None)
                }
            }
        }))
        .buffer_unordered(workers.max(1))
        .collect()
        .await
    }

    fn build_optimizer_inputs(
        &self,
        planned: &[PlannedVariant],
        model_metrics: &HashMap<(Namespace, String), Result<CacheEntry, MetricsFailure>>,
    ) -> Vec<OptimizerVariant> {
        planned
            .iter()
            .filter_map(|planned_variant| {
                let (priority, slo) = planned_variant.class?;
                let entry = match model_metrics.get(&planned_variant.model_key()) {
                    Some(Ok(entry)) => entry,
                    _ => return None,
                };
                let spec = &planned_variant.record.spec;
                let perf = AcceleratorPerf {
                    accelerator: spec.accelerator.clone(),
                    decode: spec.perf_parms.decode_parms,
                    prefill: spec.perf_parms.prefill_parms,
                    max_batch_size: spec.max_batch_size,
                    unit_cost: planned_variant.unit_cost,
                };
                let analysis =
                    self.analyzer
                        .analyze(&entry.load, &slo, spec.min_replicas, &[perf]);
                let candidates = analysis
                    .candidates
                    .into_iter()
                    .map(|allocation| Candidate {
                        allocation,
                        unit_cost: planned_variant.unit_cost,
                    })
                    .collect();
                Some(OptimizerVariant {
                    key: planned_variant.key(),
                    priority,
                    min_replicas: spec.min_replicas,
                    max_replicas: spec.max_replicas,
                    candidates,
                })
            })
            .collect()
    }

    fn build_zero_rate_inputs(
        planned: &[PlannedVariant],
        model_metrics: &HashMap<(Namespace, String), Result<CacheEntry, MetricsFailure>>,
        observed: &HashMap<VariantKey, Option<u32>>,
        scale_to_zero: &ScaleToZeroConfig,
        settings: &ReconcilerSettings,
    ) -> Vec<ModelZeroRateInput> {
        let mut by_model: BTreeMap<(Namespace, String), Vec<&PlannedVariant>> = BTreeMap::new();
        for planned_variant in planned {
            by_model
                .entry(planned_variant.model_key())
                .or_default()
                .push(planned_variant);
        }

        by_model
            .into_iter()
            .map(|((namespace, model), group)| {
                // Variant-level tri-states feed the per-model hint; the
                // dedicated per-model config entry wins when present.
                let variant_hint = group
                    .iter()
                    .find_map(|p| p.record.spec.enable_scale_to_zero);
                let per_model_hint = scale_to_zero.enabled_hint(&model).or(variant_hint);
                let enabled = zero_rate::resolve_scale_to_zero(
                    per_model_hint,
                    settings.scale_to_zero_default,
                    None,
                );
                let recent_requests = match model_metrics.get(&(namespace, model.clone())) {
                    Some(Ok(entry)) => entry.total_requests,
                    _ => 0.0,
                };
                let variants = group
                    .iter()
                    .map(|p| ZeroRateVariant {
                        key: p.key(),
                        current_replicas: observed.get(&p.key()).copied().flatten().unwrap_or_else(
                            || p.record.status.current_alloc.num_replicas,
                        ),
                        keep_alive_cost: p.unit_cost,
                    })
                    .collect();
                ModelZeroRateInput {
                    model_id: model.into(),
                    scale_to_zero_enabled: enabled,
                    recent_requests,
                    variants,
                }
            })
            .collect()
    }

    /// Models with at least one variant serving (desired >= 1) after this
    /// tick's solution, for the fallback policy's sibling check.
    fn serving_models(
        planned: &[PlannedVariant],
        solution: &AllocationSolution,
    ) -> HashSet<(Namespace, String)> {
        planned
            .iter()
            .filter(|p| {
                let by_solution = solution
                    .get(&p.key())
                    .is_some_and(|d| d.allocation.num_replicas >= 1);
                let by_history = p
                    .record
                    .status
                    .desired_optimized_alloc
                    .as_ref()
                    .is_some_and(|a| a.num_replicas >= 1);
                by_solution || by_history
            })
            .map(|p| p.model_key())
            .collect()
    }

    /// Builds and writes one variant's status, retrying on write conflict.
    async fn publish_status(
        &self,
        planned_variant: &PlannedVariant,
        decision: Option<&VariantDecision>,
        metrics_verdict: Option<&Result<CacheEntry, MetricsFailure>>,
        current: Option<u32>,
        suppressed: bool,
        optimizer_failed: bool,
        serving_models: &HashSet<(Namespace, String)>,
        tick_start: DateTime<Utc>,
    ) -> Result<(), Error> {
        let key = planned_variant.key();
        let spec = &planned_variant.record.spec;

        let mut attempt = 0;
        loop {
            let fresh = self.variants.get(&key).await?;
            let mut status = fresh.status.clone();

            if let Some(current) = current {
                status.current_alloc.num_replicas = current;
            }

            match metrics_verdict {
                Some(Ok(_)) => status.set_condition(
                    ConditionType::MetricsAvailable,
                    ConditionStatus::True,
                    "MetricsFresh",
                    "",
                    tick_start,
                ),
                Some(Err(failure)) => status.set_condition(
                    ConditionType::MetricsAvailable,
                    ConditionStatus::False,
                    failure.reason,
                    failure.message.clone(),
                    tick_start,
                ),
                None => {}
            }

            let previous_desired = status.desired_optimized_alloc.clone();
            if suppressed {
                // The desired allocation of a suppressed claimant is not
                // published; only bookkeeping fields move.
                status.actuation.applied = false;
            } else if let Some(decision) = decision {
                status.desired_optimized_alloc = Some(Self::build_optimized_alloc(
                    decision,
                    previous_desired.as_ref(),
                    tick_start,
                ));
                status.actuation.applied = true;
                status.set_condition(
                    ConditionType::OptimizationReady,
                    ConditionStatus::True,
                    "Optimized",
                    "",
                    tick_start,
                );
            } else {
                let others_serving = serving_models.contains(&planned_variant.model_key());
                let fallback_alloc = fallback::decide(
                    &FallbackInput {
                        previous: previous_desired.as_ref(),
                        current_replicas: current
                            .unwrap_or(status.current_alloc.num_replicas),
                        min_replicas: spec.min_replicas,
                        max_replicas: spec.max_replicas,
                        others_serving,
                        accelerator: spec.accelerator.clone(),
                    },
                    tick_start,
                );
                status.desired_optimized_alloc = Some(fallback_alloc);
                status.actuation.applied = true;
                // Metrics-unavailable variants were skipped, not failed;
                // their readiness condition is left as it was.
                let reason = if optimizer_failed {
                    Some("NoFeasibleAllocation")
                } else if planned_variant.class.is_none() {
                    Some("UnknownSloClass")
                } else if matches!(metrics_verdict, Some(Ok(_))) {
                    Some("NoCandidates")
                } else {
                    None
                };
                if let Some(reason) = reason {
                    status.set_condition(
                        ConditionType::OptimizationReady,
                        ConditionStatus::False,
                        reason,
                        "",
                        tick_start,
                    );
                }
            }

            // Monotone per-variant tick stamp.
            status.last_run_time = Some(
                status
                    .last_run_time
                    .map_or(tick_start, |previous| previous.max(tick_start)),
            );

            match self
                .variants
                .update_status(&key, fresh.version, status.clone())
                .await
            {
                Ok(()) => {
                    self.emit_variant_metrics(planned_variant, &status, previous_desired.as_ref());
                    return Ok(());
                }
                Err(Error::WriteConflict { .. }) if attempt + 1 < STATUS_WRITE_ATTEMPTS => {
                    attempt += 1;
                    tokio::time::sleep(self.backoff.delay(attempt - 1)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn build_optimized_alloc(
        decision: &VariantDecision,
        previous: Option<&OptimizedAlloc>,
        tick_start: DateTime<Utc>,
    ) -> OptimizedAlloc {
        let allocation = &decision.allocation;
        let changed = previous.map_or(true, |p| {
            p.num_replicas != allocation.num_replicas || p.accelerator != allocation.accelerator
        });
        let last_update = if changed {
            let mut reason = match decision.clamped_from {
                Some(from) => format!("clamped from {from} to {}", allocation.num_replicas),
                None => "optimized allocation".to_owned(),
            };
            if allocation.saturating {
                reason.push_str("; saturating");
            }
            wva_config::status::LastUpdate {
                time: Some(tick_start),
                reason,
                delta: i64::from(allocation.num_replicas)
                    - i64::from(previous.map_or(0, |p| p.num_replicas)),
            }
        } else {
            previous
                .map(|p| p.last_update.clone())
                .unwrap_or_default()
        };

        OptimizedAlloc {
            num_replicas: allocation.num_replicas,
            accelerator: allocation.accelerator.clone(),
            last_update,
        }
    }

    fn emit_variant_metrics(
        &self,
        planned_variant: &PlannedVariant,
        status: &VariantStatus,
        previous_desired: Option<&OptimizedAlloc>,
    ) {
        let spec = &planned_variant.record.spec;
        let Some(desired) = &status.desired_optimized_alloc else {
            return;
        };
        let target = &spec.scale_target_ref;
        self.metrics.record_allocation(
            &target.name,
            &target.kind,
            &spec.namespace,
            &desired.accelerator,
            desired.num_replicas,
            status.current_alloc.num_replicas,
        );
        let delta = i64::from(desired.num_replicas)
            - i64::from(previous_desired.map_or(0, |p| p.num_replicas));
        if let Some(direction) = ScalingDirection::from_delta(delta) {
            self.metrics.record_scaling(
                &target.name,
                &target.kind,
                &spec.namespace,
                direction,
                &desired.last_update.reason,
                &desired.accelerator,
            );
        }
    }

    /// Emits predicted-latency gauges for every decision in a solution.
    fn emit_predictions(&self, planned: &[PlannedVariant], solution: &AllocationSolution) {
        for planned_variant in planned {
            let Some(decision) = solution.get(&planned_variant.key()) else {
                continue;
            };
            let spec = &planned_variant.record.spec;
            self.metrics.record_prediction(
                &spec.model_id,
                &spec.scale_target_ref.name,
                &spec.namespace,
                &decision.allocation.accelerator,
                decision.allocation.ttft_average,
                decision.allocation.itl_average,
            );
        }
    }
}
