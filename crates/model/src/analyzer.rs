// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! The per-variant analyzer: SLO-feasible batch size, per-replica service
//! rate, and minimum replica count per candidate accelerator.

use crate::allocation::Allocation;
use serde::{Deserialize, Serialize};
use wva_config::load::LoadProfile;
use wva_config::slo::ModelSlo;
use wva_config::variant::{DecodeParms, PrefillParms};
use wva_config::AcceleratorName;

/// Utilization headroom kept below saturation: the replica count must keep
/// `lambda / (N * mu) < 1 - SATURATION_MARGIN`.
pub const SATURATION_MARGIN: f64 = 0.05;

/// Upper bound of the replica search. An arrival rate that still misses the
/// SLO at this size is flagged as saturating rather than searched further.
pub const MAX_REPLICAS_SEARCH: u32 = 1024;

/// Benchmarked parameters and unit cost for one candidate accelerator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceleratorPerf {
    /// The accelerator name.
    pub accelerator: AcceleratorName,
    /// Decode latency line.
    pub decode: DecodeParms,
    /// Prefill latency line.
    pub prefill: PrefillParms,
    /// Saturation bound for the decode batch size.
    pub max_batch_size: u32,
    /// Cost per replica on this accelerator.
    pub unit_cost: f64,
}

/// Analyzer output for one variant: one candidate allocation per feasible
/// accelerator, in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantAnalysis {
    /// Candidate allocations. Empty when no accelerator can meet the ITL
    /// target at any batch size.
    pub candidates: Vec<Allocation>,
}

impl VariantAnalysis {
    /// Whether any candidate exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// The performance analyzer.
///
/// Stateless; the struct carries the tunable margins so tests can tighten
/// them.
#[derive(Debug, Clone, Copy)]
pub struct Analyzer {
    saturation_margin: f64,
    max_replicas_search: u32,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self {
            saturation_margin: SATURATION_MARGIN,
            max_replicas_search: MAX_REPLICAS_SEARCH,
        }
    }
}

impl Analyzer {
    /// Creates an analyzer with explicit margins.
    #[must_use]
    pub const fn new(saturation_margin: f64, max_replicas_search: u32) -> Self {
        Self {
            saturation_margin,
            max_replicas_search,
        }
    }

    /// Produces the candidate allocations for one variant.
    ///
    /// `min_replicas` is only consulted for the zero-arrival case; bounds
    /// clamping proper happens in the optimizer.
    #[must_use]
    pub fn analyze(
        &self,
        load: &LoadProfile,
        slo: &ModelSlo,
        min_replicas: Option<u32>,
        candidates: &[AcceleratorPerf],
    ) -> VariantAnalysis {
        let mut analysis = VariantAnalysis::default();
        for perf in candidates {
            if let Some(allocation) = self.analyze_accelerator(load, slo, min_replicas, perf) {
                analysis.candidates.push(allocation);
            }
        }
        analysis
    }

    fn analyze_accelerator(
        &self,
        load: &LoadProfile,
        slo: &ModelSlo,
        min_replicas: Option<u32>,
        perf: &AcceleratorPerf,
    ) -> Option<Allocation> {
        let batch = max_feasible_batch(&perf.decode, slo.slo_itl, perf.max_batch_size)?;
        let itl_ms = decode_latency_ms(&perf.decode, batch);
        let prefill_ms = prefill_latency_ms(&perf.prefill, load.avg_input_tokens, batch);
        let service_rate = request_service_rate(&perf.decode, batch, load.avg_output_tokens);

        let lambda = load.arrival_rate_per_sec();
        if lambda <= 0.0 {
            // No traffic: nothing to queue. The zero-rate policy decides
            // whether anything stays up; the candidate carries the bound.
            let num_replicas = min_replicas.unwrap_or(0);
            return Some(Allocation {
                accelerator: perf.accelerator.clone(),
                num_replicas,
                max_batch: batch,
                cost: f64::from(num_replicas) * perf.unit_cost,
                itl_average: itl_ms,
                ttft_average: prefill_ms,
                saturating: false,
            });
        }

        let (num_replicas, ttft_ms, saturating) =
            self.min_replicas_for(lambda, service_rate, prefill_ms, slo.slo_ttft);

        Some(Allocation {
            accelerator: perf.accelerator.clone(),
            num_replicas,
            max_batch: batch,
            cost: f64::from(num_replicas) * perf.unit_cost,
            itl_average: itl_ms,
            ttft_average: ttft_ms,
            saturating,
        })
    }

    /// Smallest `N` with utilization below `1 - margin` and estimated TTFT
    /// within the target; `(N, ttft, saturating)`.
    fn min_replicas_for(
        &self,
        lambda: f64,
        service_rate: f64,
        prefill_ms: f64,
        slo_ttft: f64,
    ) -> (u32, f64, bool) {
        let utilization_cap = 1.0 - self.saturation_margin;

        // Start where the utilization constraint is first satisfiable;
        // TTFT decreases monotonically in N from there.
        let start = (lambda / (service_rate * utilization_cap)).floor() + 1.0;
        let mut n = start.clamp(1.0, f64::from(self.max_replicas_search) + 1.0) as u32;

        while n <= self.max_replicas_search {
            let ttft = ttft_estimate_ms(lambda, n, service_rate, prefill_ms);
            let rho = lambda / (f64::from(n) * service_rate);
            if rho < utilization_cap && ttft <= slo_ttft {
                return (n, ttft, false);
            }
            n += 1;
        }

        let n = self.max_replicas_search;
        let ttft = ttft_estimate_ms(lambda, n, service_rate, prefill_ms);
        (n, ttft, true)
    }
}

/// Largest batch size whose decode latency meets the ITL target, bounded by
/// the benchmarked saturation batch size. `None` when even a batch of one
/// misses the target.
#[must_use]
pub fn max_feasible_batch(decode: &DecodeParms, slo_itl: f64, max_batch_size: u32) -> Option<u32> {
    if decode.alpha > slo_itl {
        return None;
    }
    if decode.beta <= 0.0 {
        // Constant decode latency: the benchmarked bound is the answer.
        return Some(max_batch_size.max(1));
    }
    let bs = ((slo_itl - decode.alpha) / decode.beta).floor() as u32;
    let bs = bs.min(max_batch_size);
    (bs >= 1).then_some(bs)
}

/// Decode latency in ms at the given batch size.
#[must_use]
pub fn decode_latency_ms(decode: &DecodeParms, batch: u32) -> f64 {
    decode.alpha + decode.beta * f64::from(batch)
}

/// Prefill latency in ms at the given mean input length and batch size.
#[must_use]
pub fn prefill_latency_ms(prefill: &PrefillParms, avg_input_tokens: f64, batch: u32) -> f64 {
    prefill.gamma + prefill.delta * avg_input_tokens * f64::from(batch)
}

/// Per-replica request service rate in req/s: token throughput at the batch
/// size divided by the observed mean generation length.
#[must_use]
pub fn request_service_rate(decode: &DecodeParms, batch: u32, avg_output_tokens: f64) -> f64 {
    let itl_ms = decode_latency_ms(decode, batch);
    let token_rate = f64::from(batch) * 1000.0 / itl_ms;
    token_rate / avg_output_tokens.max(1.0)
}

/// Estimated TTFT in ms for `n` replicas: M/M/1 queue wait per replica with
/// the arrival stream split evenly, plus the prefill time.
#[must_use]
pub fn ttft_estimate_ms(lambda: f64, n: u32, service_rate: f64, prefill_ms: f64) -> f64 {
    let per_replica_lambda = lambda / f64::from(n);
    let rho = per_replica_lambda / service_rate;
    if rho >= 1.0 {
        return f64::INFINITY;
    }
    let wait_secs = rho / (service_rate * (1.0 - rho));
    wait_secs * 1000.0 + prefill_ms
}
