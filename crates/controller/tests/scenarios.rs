// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end reconciliation scenarios over in-memory stores and a
//! scripted metrics backend.

use chrono::Utc;
use parking_lot::Mutex;
use prometheus::{Encoder, Registry, TextEncoder};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wva_collector::{Collector, Error as CollectorError, InstantVector, MetricsBackend,
    MetricsCache, Sample};
use wva_config::status::{ConditionStatus, ConditionType};
use wva_config::variant::{
    DecodeParms, PerfParms, PrefillParms, ScaleTargetRef, SloClassRef, VariantSpec,
};
use wva_config::VariantKey;
use wva_controller::store::memory::{
    InMemoryConfigStore, InMemoryVariantStore, InMemoryWorkloadStore,
};
use wva_controller::store::{
    VariantStore as _, WorkloadObject, COLLECTION_ACCELERATOR_COSTS, COLLECTION_SCALE_TO_ZERO,
    COLLECTION_SERVICE_CLASSES,
};
use wva_controller::{Backoff, Reconciler};
use wva_telemetry::AutoscalerMetrics;

/// Scripted backend: routes queries on metric-name fragments.
#[derive(Default)]
struct StubBackend {
    /// Fragment of the query text mapped to the returned value.
    values: Mutex<HashMap<&'static str, f64>>,
    /// Age in seconds of the probe sample; `None` means no series at all.
    probe_age_secs: Mutex<Option<f64>>,
}

impl StubBackend {
    fn fresh() -> Arc<Self> {
        let backend = Self::default();
        *backend.probe_age_secs.lock() = Some(10.0);
        Arc::new(backend)
    }

    fn set_traffic(&self, arrival: f64, avg_in: f64, avg_out: f64, ttft: f64, itl: f64) {
        let mut values = self.values.lock();
        let _ = values.insert("increase", arrival);
        let _ = values.insert("request_success_total", arrival);
        let _ = values.insert("generation_tokens", avg_out);
        let _ = values.insert("prompt_tokens", avg_in);
        let _ = values.insert("time_to_first_token", ttft);
        let _ = values.insert("time_per_output_token", itl);
    }

    fn vector(value: f64, age_secs: f64) -> InstantVector {
        InstantVector {
            samples: vec![Sample {
                labels: HashMap::new(),
                timestamp: Utc::now().timestamp() as f64 - age_secs,
                value,
            }],
        }
    }
}

impl MetricsBackend for StubBackend {
    async fn instant_query(&self, query: &str) -> Result<InstantVector, CollectorError> {
        if query.contains("num_requests_running") {
            return Ok(match *self.probe_age_secs.lock() {
                Some(age) => Self::vector(1.0, age),
                None => InstantVector::default(),
            });
        }
        let values = self.values.lock();
        // `increase` must be matched before the shared counter name.
        for fragment in [
            "increase",
            "generation_tokens",
            "prompt_tokens",
            "time_to_first_token",
            "time_per_output_token",
            "request_success_total",
        ] {
            if query.contains(fragment) {
                if let Some(value) = values.get(fragment) {
                    return Ok(Self::vector(*value, 0.0));
                }
            }
        }
        Ok(InstantVector::default())
    }
}

struct Harness {
    variants: Arc<InMemoryVariantStore>,
    workloads: Arc<InMemoryWorkloadStore>,
    configs: Arc<InMemoryConfigStore>,
    backend: Arc<StubBackend>,
    cache: Arc<MetricsCache>,
    registry: Registry,
    reconciler: Reconciler<
        Arc<InMemoryVariantStore>,
        Arc<InMemoryWorkloadStore>,
        Arc<InMemoryConfigStore>,
        Arc<StubBackend>,
    >,
}

fn entries(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

fn harness() -> Harness {
    let variants = Arc::new(InMemoryVariantStore::new());
    let workloads = Arc::new(InMemoryWorkloadStore::new());
    let configs = Arc::new(InMemoryConfigStore::new());
    let backend = StubBackend::fresh();
    let registry = Registry::new();

    configs.set_collection(
        COLLECTION_ACCELERATOR_COSTS,
        entries(&[
            ("A100", r#"{"cost": 40.0, "memory": "80Gi"}"#),
            ("H100", r#"{"cost": 80.0, "memory": "80Gi"}"#),
        ]),
    );
    configs.set_collection(
        COLLECTION_SERVICE_CLASSES,
        entries(&[(
            "premium.yaml",
            "name: premium\npriority: 1\ndata:\n\
             - { model: llama, slo-itl: 50.0, slo-ttft: 1000.0 }\n\
             - { model: a, slo-itl: 50.0, slo-ttft: 1000.0 }\n\
             - { model: b, slo-itl: 50.0, slo-ttft: 1000.0 }\n",
        )]),
    );

    let cache = Arc::new(MetricsCache::new(Duration::from_secs(30)));
    let metrics = AutoscalerMetrics::register(&registry).expect("metrics");
    let reconciler = Reconciler::new(
        Arc::clone(&variants),
        Arc::clone(&workloads),
        Arc::clone(&configs),
        Collector::new(Arc::clone(&backend)),
        Arc::clone(&cache),
        metrics,
    )
    .with_backoff(Backoff {
        attempts: 2,
        base: Duration::from_millis(1),
        factor: 1.0,
        jitter: 0.0,
    });

    Harness {
        variants,
        workloads,
        configs,
        backend,
        cache,
        registry,
        reconciler,
    }
}

fn spec(model: &str, variant_id: &str, cost: &str, target: &str) -> VariantSpec {
    VariantSpec {
        model_id: model.to_owned().into(),
        variant_id: variant_id.to_owned().into(),
        namespace: "prod".into(),
        accelerator: "A100".into(),
        accelerator_count: 1,
        variant_cost: cost.to_owned(),
        perf_parms: PerfParms {
            decode_parms: DecodeParms {
                alpha: 20.0,
                beta: 0.5,
            },
            prefill_parms: PrefillParms {
                gamma: 100.0,
                delta: 0.01,
            },
        },
        max_batch_size: 16,
        slo_class_ref: SloClassRef {
            name: "premium".to_owned(),
            key: "premium.yaml".to_owned(),
        },
        min_replicas: None,
        max_replicas: None,
        scale_target_ref: ScaleTargetRef {
            kind: "Deployment".to_owned(),
            name: target.to_owned(),
        },
        enable_scale_to_zero: None,
        scale_to_zero_pod_retention_period: None,
        deleted: false,
    }
}

fn add_variant(h: &Harness, spec: VariantSpec, ready_replicas: u32) {
    h.workloads.insert(WorkloadObject {
        kind: "Deployment".to_owned(),
        name: spec.scale_target_ref.name.clone(),
        namespace: spec.namespace.to_string(),
        spec_replicas: Some(ready_replicas),
        ready_replicas: Some(ready_replicas),
    });
    h.variants.insert(spec);
}

fn key(id: &str) -> VariantKey {
    VariantKey::new("prod".into(), id.to_owned().into())
}

async fn tick(h: &Harness) -> wva_controller::TickOutcome {
    // Force each tick to re-collect, standing in for TTL expiry between
    // real 60-second ticks.
    h.cache.clear();
    h.reconciler
        .reconcile(&CancellationToken::new())
        .await
        .expect("tick")
}

fn gauge_value(registry: &Registry, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .expect("text encoding");
    let text = String::from_utf8(buffer).expect("utf-8 exposition");
    text.lines()
        .filter(|line| line.starts_with(name) && !line.starts_with('#'))
        .find(|line| {
            labels
                .iter()
                .all(|(k, v)| line.contains(&format!("{k}=\"{v}\"")))
        })
        .and_then(|line| line.rsplit(' ').next())
        .and_then(|value| value.parse().ok())
}

#[tokio::test]
async fn steady_load_needs_one_replica() {
    let h = harness();
    h.backend.set_traffic(60.0, 128.0, 256.0, 500.0, 40.0);
    add_variant(&h, spec("llama", "llama-A100-1", "10", "llama-a100"), 1);

    let outcome = tick(&h).await;
    assert_eq!(outcome.active_variants, 1);
    assert_eq!(outcome.published, 1);
    assert!(!outcome.optimizer_failed);

    let record = h
        .variants
        .get(&key("llama-A100-1"))
        .await
        .expect("record");
    let desired = record
        .status
        .desired_optimized_alloc
        .as_ref()
        .expect("desired");
    assert_eq!(desired.num_replicas, 1);
    assert_eq!(desired.accelerator, "A100");
    assert_eq!(
        record
            .status
            .condition(ConditionType::MetricsAvailable)
            .map(|c| c.status),
        Some(ConditionStatus::True)
    );
    assert_eq!(
        record
            .status
            .condition(ConditionType::OptimizationReady)
            .map(|c| c.status),
        Some(ConditionStatus::True)
    );
    assert!(record.status.actuation.applied);
    assert_eq!(record.status.current_alloc.num_replicas, 1);
    assert_eq!(
        record.owner_ref.as_ref().map(|t| t.name.as_str()),
        Some("llama-a100")
    );
}

#[tokio::test]
async fn pressure_scales_to_the_analytic_minimum() {
    let h = harness();
    h.backend.set_traffic(600.0, 128.0, 256.0, 500.0, 40.0);
    add_variant(&h, spec("llama", "llama-A100-1", "10", "llama-a100"), 1);

    let _ = tick(&h).await;
    let record = h
        .variants
        .get(&key("llama-A100-1"))
        .await
        .expect("record");
    let desired = record
        .status
        .desired_optimized_alloc
        .as_ref()
        .expect("desired");
    assert_eq!(desired.num_replicas, 7);
    assert_eq!(desired.last_update.delta, 7);
}

#[tokio::test]
async fn idle_model_scales_to_zero_when_enabled() {
    let h = harness();
    h.backend.set_traffic(0.0, 0.0, 0.0, 0.0, 0.0);
    h.configs.set_collection(
        COLLECTION_SCALE_TO_ZERO,
        entries(&[(
            "model.llama",
            "modelID: llama\nenableScaleToZero: true\nretentionPeriod: 5m\n",
        )]),
    );
    add_variant(&h, spec("llama", "llama-A100-1", "10", "llama-a100"), 0);
    add_variant(&h, spec("llama", "llama-A100-2", "40", "llama-a100-b"), 0);

    let _ = tick(&h).await;
    for id in ["llama-A100-1", "llama-A100-2"] {
        let record = h.variants.get(&key(id)).await.expect("record");
        assert_eq!(
            record
                .status
                .desired_optimized_alloc
                .as_ref()
                .map(|d| d.num_replicas),
            Some(0),
            "{id} should be released"
        );
    }
}

#[tokio::test]
async fn idle_model_keeps_cheapest_alive_when_disabled() {
    let h = harness();
    h.backend.set_traffic(0.0, 0.0, 0.0, 0.0, 0.0);
    h.configs.set_collection(
        COLLECTION_SCALE_TO_ZERO,
        entries(&[(
            "model.llama",
            "modelID: llama\nenableScaleToZero: false\n",
        )]),
    );
    add_variant(&h, spec("llama", "llama-A100-1", "12", "llama-a100"), 0);
    add_variant(&h, spec("llama", "llama-A100-2", "40", "llama-a100-b"), 0);

    let _ = tick(&h).await;
    let cheap = h.variants.get(&key("llama-A100-1")).await.expect("record");
    let pricey = h.variants.get(&key("llama-A100-2")).await.expect("record");
    assert_eq!(
        cheap
            .status
            .desired_optimized_alloc
            .as_ref()
            .map(|d| d.num_replicas),
        Some(1)
    );
    assert_eq!(
        pricey
            .status
            .desired_optimized_alloc
            .as_ref()
            .map(|d| d.num_replicas),
        Some(0)
    );
}

#[tokio::test]
async fn bounds_clamp_and_annotate() {
    let h = harness();
    h.backend.set_traffic(600.0, 128.0, 256.0, 500.0, 40.0);
    let mut clamped = spec("llama", "llama-A100-1", "10", "llama-a100");
    clamped.max_replicas = Some(3);
    add_variant(&h, clamped, 1);

    let _ = tick(&h).await;
    let record = h
        .variants
        .get(&key("llama-A100-1"))
        .await
        .expect("record");
    let desired = record
        .status
        .desired_optimized_alloc
        .as_ref()
        .expect("desired");
    assert_eq!(desired.num_replicas, 3);
    assert!(
        desired.last_update.reason.contains("clamped"),
        "reason `{}` should mention the clamp",
        desired.last_update.reason
    );
}

#[tokio::test]
async fn stale_metrics_preserve_previous_allocation() {
    let h = harness();
    h.backend.set_traffic(60.0, 128.0, 256.0, 500.0, 40.0);
    add_variant(&h, spec("llama", "llama-A100-1", "10", "llama-a100"), 1);

    let _ = tick(&h).await;
    let before = h.variants.get(&key("llama-A100-1")).await.expect("record");
    assert_eq!(
        before
            .status
            .desired_optimized_alloc
            .as_ref()
            .map(|d| d.num_replicas),
        Some(1)
    );

    // Newest probe sample is now ten minutes old.
    *h.backend.probe_age_secs.lock() = Some(600.0);
    let outcome = tick(&h).await;
    assert_eq!(outcome.metrics_unavailable, 1);

    let after = h.variants.get(&key("llama-A100-1")).await.expect("record");
    let condition = after
        .status
        .condition(ConditionType::MetricsAvailable)
        .expect("condition");
    assert_eq!(condition.status, ConditionStatus::False);
    assert_eq!(condition.reason, "MetricsStale");
    assert_eq!(
        after
            .status
            .desired_optimized_alloc
            .as_ref()
            .map(|d| d.num_replicas),
        Some(1),
        "desired allocation must be preserved"
    );
}

#[tokio::test]
async fn conflicting_claims_elect_lexicographic_winner() {
    let h = harness();
    h.backend.set_traffic(60.0, 128.0, 256.0, 500.0, 40.0);
    // Both variants claim dep-x; per the election rule `a-A100-1` wins.
    add_variant(&h, spec("b", "b-A100-1", "10", "dep-x"), 1);
    add_variant(&h, spec("a", "a-A100-1", "10", "dep-x"), 1);

    let outcome = tick(&h).await;
    assert_eq!(outcome.suppressed, 1);

    let winner = h.variants.get(&key("a-A100-1")).await.expect("record");
    let loser = h.variants.get(&key("b-A100-1")).await.expect("record");
    assert!(winner.status.actuation.applied);
    assert!(winner.status.desired_optimized_alloc.is_some());
    assert!(!loser.status.actuation.applied);
    assert!(
        loser.status.desired_optimized_alloc.is_none(),
        "suppressed variant's desired allocation must not be published"
    );

    assert_eq!(
        gauge_value(
            &h.registry,
            "wva_deployment_target_conflicts_total",
            &[("deployment", "dep-x")]
        ),
        Some(2.0)
    );
    assert_eq!(
        gauge_value(
            &h.registry,
            "wva_conflict_resolution_status",
            &[("variant_name", "a-A100-1")]
        ),
        Some(1.0)
    );
    assert_eq!(
        gauge_value(
            &h.registry,
            "wva_conflict_resolution_status",
            &[("variant_name", "b-A100-1")]
        ),
        Some(0.0)
    );
}

#[tokio::test]
async fn fixed_inputs_reconcile_deterministically() {
    let h = harness();
    h.backend.set_traffic(600.0, 128.0, 256.0, 500.0, 40.0);
    add_variant(&h, spec("llama", "llama-A100-1", "10", "llama-a100"), 1);

    let _ = tick(&h).await;
    let first = h.variants.get(&key("llama-A100-1")).await.expect("record");
    let _ = tick(&h).await;
    let second = h.variants.get(&key("llama-A100-1")).await.expect("record");

    let a = first.status.desired_optimized_alloc.expect("first");
    let b = second.status.desired_optimized_alloc.expect("second");
    assert_eq!(a.num_replicas, b.num_replicas);
    assert_eq!(a.accelerator, b.accelerator);
    assert_eq!(
        a.last_update, b.last_update,
        "unchanged allocation must not restamp its update bookkeeping"
    );
}

#[tokio::test]
async fn last_run_time_is_monotone() {
    let h = harness();
    h.backend.set_traffic(60.0, 128.0, 256.0, 500.0, 40.0);
    add_variant(&h, spec("llama", "llama-A100-1", "10", "llama-a100"), 1);

    let _ = tick(&h).await;
    let first = h
        .variants
        .get(&key("llama-A100-1"))
        .await
        .expect("record")
        .status
        .last_run_time
        .expect("first run time");
    let _ = tick(&h).await;
    let second = h
        .variants
        .get(&key("llama-A100-1"))
        .await
        .expect("record")
        .status
        .last_run_time
        .expect("second run time");
    assert!(second >= first);
}

#[tokio::test]
async fn deleted_variants_are_skipped() {
    let h = harness();
    h.backend.set_traffic(60.0, 128.0, 256.0, 500.0, 40.0);
    add_variant(&h, spec("llama", "llama-A100-1", "10", "llama-a100"), 1);
    h.variants.mark_deleted(&key("llama-A100-1"));

    let outcome = tick(&h).await;
    assert_eq!(outcome.active_variants, 0);
    assert_eq!(outcome.published, 0);
}

#[tokio::test]
async fn missing_metrics_surface_as_condition() {
    let h = harness();
    *h.backend.probe_age_secs.lock() = None;
    add_variant(&h, spec("llama", "llama-A100-1", "10", "llama-a100"), 1);

    let outcome = tick(&h).await;
    assert_eq!(outcome.metrics_unavailable, 1);
    let record = h.variants.get(&key("llama-A100-1")).await.expect("record");
    let condition = record
        .status
        .condition(ConditionType::MetricsAvailable)
        .expect("condition");
    assert_eq!(condition.status, ConditionStatus::False);
    assert_eq!(condition.reason, "MetricsMissing");
}

#[tokio::test]
async fn cancelled_tick_publishes_nothing() {
    let h = harness();
    h.backend.set_traffic(60.0, 128.0, 256.0, 500.0, 40.0);
    add_variant(&h, spec("llama", "llama-A100-1", "10", "llama-a100"), 1);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = h.reconciler.reconcile(&cancel).await;
    assert!(matches!(result, Err(wva_controller::Error::Cancelled)));

    let record = h.variants.get(&key("llama-A100-1")).await.expect("record");
    assert!(record.status.last_run_time.is_none());
    assert!(record.status.desired_optimized_alloc.is_none());
}

#[tokio::test]
async fn missing_required_config_aborts_and_surfaces() {
    let h = harness();
    h.backend.set_traffic(60.0, 128.0, 256.0, 500.0, 40.0);
    add_variant(&h, spec("llama", "llama-A100-1", "10", "llama-a100"), 1);
    h.configs.remove_collection(COLLECTION_ACCELERATOR_COSTS);

    let result = h.reconciler.reconcile(&CancellationToken::new()).await;
    assert!(result.is_err(), "missing required config must abort the tick");

    let record = h.variants.get(&key("llama-A100-1")).await.expect("record");
    let condition = record
        .status
        .condition(ConditionType::OptimizationReady)
        .expect("condition");
    assert_eq!(condition.status, ConditionStatus::False);
    assert_eq!(condition.reason, "ConfigMissing");
    assert!(
        record.status.desired_optimized_alloc.is_none(),
        "aborted tick must not publish a desired allocation"
    );
}

#[tokio::test]
async fn cache_ttl_tracks_reconciliation_interval() {
    let h = harness();
    h.backend.set_traffic(60.0, 128.0, 256.0, 500.0, 40.0);
    add_variant(&h, spec("llama", "llama-A100-1", "10", "llama-a100"), 1);
    h.configs.set_collection(
        "autoscaler-config",
        entries(&[("GLOBAL_OPT_INTERVAL", "20s")]),
    );

    let outcome = tick(&h).await;
    assert_eq!(outcome.interval, Duration::from_secs(20));
    assert_eq!(
        h.cache.ttl(),
        Duration::from_secs(10),
        "cache TTL must follow the freshly-read interval"
    );
}

#[tokio::test]
async fn manual_trigger_is_consumed() {
    let h = harness();
    h.backend.set_traffic(60.0, 128.0, 256.0, 500.0, 40.0);
    add_variant(&h, spec("llama", "llama-A100-1", "10", "llama-a100"), 1);
    h.configs.set_collection(
        "autoscaler-config",
        entries(&[("GLOBAL_OPT_TRIGGER", "true")]),
    );

    let outcome = tick(&h).await;
    assert!(outcome.trigger_consumed);
    assert_eq!(
        h.configs.value("autoscaler-config", "GLOBAL_OPT_TRIGGER"),
        Some("false".to_owned())
    );

    let outcome = tick(&h).await;
    assert!(!outcome.trigger_consumed);
}
