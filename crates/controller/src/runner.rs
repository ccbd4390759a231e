// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! The timer loop around the reconciler.
//!
//! Ticks are strictly sequential: the next tick is scheduled only after
//! the previous one completes, so a tick overrunning its interval simply
//! delays (never overlaps) the next. Tick-level errors are logged and the
//! loop continues; only cancellation stops it.

use crate::error::Error;
use crate::reconciler::Reconciler;
use crate::store::{ConfigStore, VariantStore, WorkloadStore};
use tokio_util::sync::CancellationToken;
use wva_collector::MetricsBackend;
use wva_config::settings::DEFAULT_RECONCILE_INTERVAL;

/// Drives [`Reconciler::reconcile`] on the configured interval until
/// cancelled.
pub struct Runner<VS, WS, CS, MB> {
    reconciler: Reconciler<VS, WS, CS, MB>,
    cancel: CancellationToken,
}

impl<VS, WS, CS, MB> Runner<VS, WS, CS, MB>
where
    VS: VariantStore,
    WS: WorkloadStore,
    CS: ConfigStore,
    MB: MetricsBackend,
{
    /// Wraps a reconciler.
    pub fn new(reconciler: Reconciler<VS, WS, CS, MB>, cancel: CancellationToken) -> Self {
        Self { reconciler, cancel }
    }

    /// Runs ticks until the cancellation token fires.
    pub async fn run(&self) -> Result<(), Error> {
        let mut interval = DEFAULT_RECONCILE_INTERVAL;
        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            let mut immediate_rerun = false;
            match self.reconciler.reconcile(&self.cancel).await {
                Ok(outcome) => {
                    interval = outcome.interval;
                    immediate_rerun = outcome.trigger_consumed;
                    tracing::info!(
                        active = outcome.active_variants,
                        published = outcome.published,
                        metrics_unavailable = outcome.metrics_unavailable,
                        suppressed = outcome.suppressed,
                        optimizer_failed = outcome.optimizer_failed,
                        next_tick_secs = interval.as_secs(),
                        "reconciliation tick complete"
                    );
                }
                Err(Error::Cancelled) => return Ok(()),
                Err(err) => {
                    // Tick-level failures retry at the next tick.
                    tracing::error!(error = %err, "reconciliation tick failed");
                }
            }

            if immediate_rerun {
                continue;
            }
            tokio::select! {
                () = self.cancel.cancelled() => return Ok(()),
                () = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// Runs exactly `n` ticks, for tests and the one-shot CLI mode.
    pub async fn run_ticks(&self, n: usize) -> Result<Vec<crate::reconciler::TickOutcome>, Error> {
        let mut outcomes = Vec::with_capacity(n);
        for _ in 0..n {
            outcomes.push(self.reconciler.reconcile(&self.cancel).await?);
        }
        Ok(outcomes)
    }
}
