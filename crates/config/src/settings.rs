// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

use crate::error::Error;
use crate::tls::{TlsSettings, parse_bool};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Key holding the reconciliation interval as a duration string.
pub const KEY_OPT_INTERVAL: &str = "GLOBAL_OPT_INTERVAL";
/// Key requesting a one-shot manual optimization run.
pub const KEY_OPT_TRIGGER: &str = "GLOBAL_OPT_TRIGGER";
/// Key holding the time-series backend base URL.
pub const KEY_PROMETHEUS_BASE_URL: &str = "PROMETHEUS_BASE_URL";
/// Key holding the bearer token for the time-series backend.
pub const KEY_PROMETHEUS_BEARER_TOKEN: &str = "PROMETHEUS_BEARER_TOKEN";
/// Key holding the global scale-to-zero default.
pub const KEY_SCALE_TO_ZERO: &str = "WVA_SCALE_TO_ZERO";
/// Key selecting the optimizer saturation policy.
pub const KEY_SATURATION_POLICY: &str = "OPTIMIZER_SATURATION_POLICY";
/// Key bounding the per-tick metric collection worker pool.
pub const KEY_COLLECTOR_WORKERS: &str = "WVA_COLLECTOR_WORKERS";

/// Default reconciliation interval.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(60);
/// Floor for the reconciliation interval.
pub const MIN_RECONCILE_INTERVAL: Duration = Duration::from_secs(10);
/// Default bound for concurrent per-variant metric collection.
pub const DEFAULT_COLLECTOR_WORKERS: usize = 8;

/// Discipline for distributing replica headroom once every SLO is met.
///
/// Inert while accelerator capacity is unlimited; retained so a future
/// limited-capacity mode can arbitrate contention without config churn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaturationPolicy {
    /// No replicas beyond what the SLO requires.
    #[default]
    None,
    /// Exhaust remaining capacity on the highest-priority class first.
    PriorityExhaustive,
    /// Round-robin within a priority class before moving to the next.
    PriorityRoundRobin,
    /// Round-robin across all variants regardless of class.
    RoundRobin,
}

impl std::str::FromStr for SaturationPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "" | "None" => Ok(Self::None),
            "PriorityExhaustive" => Ok(Self::PriorityExhaustive),
            "PriorityRoundRobin" => Ok(Self::PriorityRoundRobin),
            "RoundRobin" => Ok(Self::RoundRobin),
            other => Err(format!("unknown saturation policy `{other}`")),
        }
    }
}

/// Reconciliation loop settings, re-read from the config store every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilerSettings {
    /// Interval between ticks. Clamped to [`MIN_RECONCILE_INTERVAL`].
    pub interval: Duration,
    /// Whether a manual optimization run was requested. The store value is
    /// reset to `false` once consumed.
    pub trigger_requested: bool,
    /// Time-series backend base URL.
    pub prometheus_base_url: Option<String>,
    /// Bearer token for the time-series backend.
    pub prometheus_bearer_token: Option<String>,
    /// TLS settings for the time-series backend.
    pub tls: TlsSettings,
    /// Global scale-to-zero default from the config store, if set.
    pub scale_to_zero_default: Option<bool>,
    /// Optimizer saturation policy.
    pub saturation_policy: SaturationPolicy,
    /// Bound on concurrent per-variant metric collection.
    pub collector_workers: usize,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RECONCILE_INTERVAL,
            trigger_requested: false,
            prometheus_base_url: None,
            prometheus_bearer_token: None,
            tls: TlsSettings::default(),
            scale_to_zero_default: None,
            saturation_policy: SaturationPolicy::None,
            collector_workers: DEFAULT_COLLECTOR_WORKERS,
        }
    }
}

impl ReconcilerSettings {
    /// Builds settings from the reconciliation key/value collection,
    /// falling back to the given environment-style lookup for keys absent
    /// from the store.
    ///
    /// Malformed values are skipped with a warning and replaced by their
    /// defaults; only TLS misconfiguration is fatal.
    pub fn from_map_with(
        map: &BTreeMap<String, String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, Error> {
        let get = |key: &str| map.get(key).cloned().or_else(|| env(key));

        let interval = match get(KEY_OPT_INTERVAL) {
            None => DEFAULT_RECONCILE_INTERVAL,
            Some(raw) => match humantime::parse_duration(raw.trim()) {
                Ok(parsed) if parsed >= MIN_RECONCILE_INTERVAL => parsed,
                Ok(parsed) => {
                    tracing::warn!(
                        requested = %humantime::format_duration(parsed),
                        floor = %humantime::format_duration(MIN_RECONCILE_INTERVAL),
                        "reconciliation interval below floor, clamping"
                    );
                    MIN_RECONCILE_INTERVAL
                }
                Err(err) => {
                    tracing::warn!(
                        key = KEY_OPT_INTERVAL,
                        value = %raw,
                        error = %err,
                        "unparseable reconciliation interval, using default"
                    );
                    DEFAULT_RECONCILE_INTERVAL
                }
            },
        };

        let saturation_policy = match get(KEY_SATURATION_POLICY) {
            None => SaturationPolicy::None,
            Some(raw) => raw.parse().unwrap_or_else(|err: String| {
                tracing::warn!(key = KEY_SATURATION_POLICY, error = %err, "using None");
                SaturationPolicy::None
            }),
        };

        let collector_workers = match get(KEY_COLLECTOR_WORKERS) {
            None => DEFAULT_COLLECTOR_WORKERS,
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if (1..=64).contains(&n) => n,
                _ => {
                    tracing::warn!(
                        key = KEY_COLLECTOR_WORKERS,
                        value = %raw,
                        "worker bound outside 1..=64, using default"
                    );
                    DEFAULT_COLLECTOR_WORKERS
                }
            },
        };

        Ok(Self {
            interval,
            trigger_requested: get(KEY_OPT_TRIGGER).map(|v| parse_bool(&v)).unwrap_or(false),
            prometheus_base_url: get(KEY_PROMETHEUS_BASE_URL).filter(|v| !v.trim().is_empty()),
            prometheus_bearer_token: get(KEY_PROMETHEUS_BEARER_TOKEN)
                .filter(|v| !v.trim().is_empty()),
            tls: TlsSettings::from_lookup(&env)?,
            scale_to_zero_default: get(KEY_SCALE_TO_ZERO).map(|v| parse_bool(&v)),
            saturation_policy,
            collector_workers,
        })
    }

    /// Builds settings from the store map plus process environment.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, Error> {
        Self::from_map_with(map, |key| std::env::var(key).ok())
    }

    /// Cache TTL derived from the reconciliation interval: half the
    /// interval, floored at 5 seconds.
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        (self.interval / 2).max(Duration::from_secs(5))
    }
}
