// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! Autoscaler entry point.
//!
//! Wires the reconciler against YAML-seeded in-memory stores (the
//! emulation mode used for development and demos; a cluster deployment
//! substitutes its own store implementations) and runs the reconciliation
//! loop until interrupted.

use clap::Parser;
use miette::{miette, IntoDiagnostic, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use wva_collector::{Collector, MetricsCache, PrometheusClient};
use wva_config::settings::ReconcilerSettings;
use wva_config::variant::VariantSpec;
use wva_controller::store::memory::{
    InMemoryConfigStore, InMemoryVariantStore, InMemoryWorkloadStore,
};
use wva_controller::store::{
    ConfigStore as _, WorkloadObject, COLLECTION_ACCELERATOR_COSTS, COLLECTION_RECONCILIATION,
    COLLECTION_SCALE_TO_ZERO, COLLECTION_SERVICE_CLASSES,
};
use wva_controller::{Reconciler, Runner};
use wva_telemetry::AutoscalerMetrics;

/// Global SLO-driven autoscaler for fleets of LLM inference variants.
#[derive(Debug, Parser)]
#[command(name = "wva", version, about)]
struct Args {
    /// Directory holding the seed files: `variants.yaml`, `workloads.yaml`,
    /// and one YAML file per config collection.
    #[arg(long, default_value = "./config")]
    config_dir: PathBuf,

    /// Run exactly one reconciliation tick, then exit.
    #[arg(long)]
    once: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkloadSeed {
    kind: String,
    name: String,
    namespace: String,
    #[serde(default)]
    spec_replicas: Option<u32>,
    #[serde(default)]
    ready_replicas: Option<u32>,
}

fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path).into_diagnostic()?;
    let parsed = serde_yaml::from_str(&raw)
        .map_err(|e| miette!("parsing {}: {e}", path.display()))?;
    Ok(Some(parsed))
}

fn seed_stores(
    config_dir: &Path,
) -> Result<(
    Arc<InMemoryVariantStore>,
    Arc<InMemoryWorkloadStore>,
    Arc<InMemoryConfigStore>,
)> {
    let variants = Arc::new(InMemoryVariantStore::new());
    let workloads = Arc::new(InMemoryWorkloadStore::new());
    let configs = Arc::new(InMemoryConfigStore::new());

    let specs: Option<Vec<VariantSpec>> = load_yaml(&config_dir.join("variants.yaml"))?;
    for spec in specs.unwrap_or_default() {
        if let Err(err) = spec.validate() {
            tracing::warn!(variant = %spec.key(), error = %err, "skipping invalid seed variant");
            continue;
        }
        variants.insert(spec);
    }

    let seeds: Option<Vec<WorkloadSeed>> = load_yaml(&config_dir.join("workloads.yaml"))?;
    for seed in seeds.unwrap_or_default() {
        workloads.insert(WorkloadObject {
            kind: seed.kind,
            name: seed.name,
            namespace: seed.namespace,
            spec_replicas: seed.spec_replicas,
            ready_replicas: seed.ready_replicas,
        });
    }

    for collection in [
        COLLECTION_ACCELERATOR_COSTS,
        COLLECTION_SERVICE_CLASSES,
        COLLECTION_RECONCILIATION,
        COLLECTION_SCALE_TO_ZERO,
    ] {
        let entries: Option<BTreeMap<String, String>> =
            load_yaml(&config_dir.join(format!("{collection}.yaml")))?;
        if let Some(entries) = entries {
            configs.set_collection(collection, entries);
        }
    }

    Ok((variants, workloads, configs))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let (variants, workloads, configs) = seed_stores(&args.config_dir)?;

    // Settings are re-read every tick, but the metrics client (and its TLS
    // material) is fixed at startup. A broken TLS configuration refuses to
    // start here.
    let reconciliation = configs
        .collection(COLLECTION_RECONCILIATION)
        .await
        .into_diagnostic()?
        .unwrap_or_default();
    let settings = ReconcilerSettings::from_map(&reconciliation).into_diagnostic()?;
    let base_url = settings
        .prometheus_base_url
        .clone()
        .unwrap_or_else(|| "http://localhost:9090".to_owned());
    let client = PrometheusClient::new(
        &base_url,
        settings.prometheus_bearer_token.clone(),
        &settings.tls,
    )
    .into_diagnostic()?;
    tracing::info!(backend = %base_url, interval_secs = settings.interval.as_secs(), "starting autoscaler");

    let cache = Arc::new(MetricsCache::new(settings.cache_ttl()));
    let metrics =
        AutoscalerMetrics::register(prometheus::default_registry()).into_diagnostic()?;
    let reconciler = Reconciler::new(
        variants,
        workloads,
        configs,
        Collector::new(client),
        cache,
        metrics,
    );

    let cancel = CancellationToken::new();
    let runner = Runner::new(reconciler, cancel.clone());

    if args.once {
        let outcomes = runner.run_ticks(1).await.into_diagnostic()?;
        tracing::info!(outcome = ?outcomes[0], "single tick complete");
        return Ok(());
    }

    let shutdown = cancel.clone();
    let _ = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            shutdown.cancel();
        }
    });

    runner.run().await.into_diagnostic()?;
    Ok(())
}
