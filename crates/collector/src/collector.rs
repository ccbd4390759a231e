// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! The collector proper: availability probe plus the five traffic queries
//! that make up a load profile.

use crate::availability::{self, MetricsAvailability};
use crate::client::MetricsBackend;
use crate::error::Error;
use crate::queries;
use chrono::Utc;
use std::time::Duration;
use wva_config::load::LoadProfile;

/// Collects per-model load profiles from a time-series backend.
#[derive(Debug, Clone)]
pub struct Collector<B> {
    backend: B,
}

impl<B: MetricsBackend> Collector<B> {
    /// Wraps a backend.
    #[must_use]
    pub const fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Probes whether the model's metrics are usable this tick.
    ///
    /// Transport failures propagate as [`Error::BackendUnavailable`]; the
    /// caller maps them onto the `PrometheusError` condition reason.
    pub async fn availability(&self, model: &str) -> Result<MetricsAvailability, Error> {
        let vector = self.backend.instant_query(&queries::probe(model)).await?;
        Ok(availability::evaluate(&vector, Utc::now()))
    }

    /// Collects the load profile for `(model, namespace)`.
    ///
    /// Each query is issued with the namespace filter first; a zero or
    /// absent result is retried without the filter so emulator backends
    /// that export no namespace label still resolve.
    pub async fn collect(&self, model: &str, namespace: &str) -> Result<LoadProfile, Error> {
        let arrival_rate = self
            .query_with_fallback(|ns| queries::arrival_rate(model, ns), namespace)
            .await?;
        let avg_output_tokens = self
            .query_with_fallback(|ns| queries::avg_output_tokens(model, ns), namespace)
            .await?;
        let avg_input_tokens = self
            .query_with_fallback(|ns| queries::avg_input_tokens(model, ns), namespace)
            .await?;
        let ttft_average = self
            .query_with_fallback(|ns| queries::avg_ttft_ms(model, ns), namespace)
            .await?;
        let itl_average = self
            .query_with_fallback(|ns| queries::avg_itl_ms(model, ns), namespace)
            .await?;

        Ok(LoadProfile {
            arrival_rate,
            avg_input_tokens,
            avg_output_tokens,
            ttft_average,
            itl_average,
        })
    }

    /// Aggregate completed-request count over the retention window.
    pub async fn total_requests_over(
        &self,
        model: &str,
        namespace: &str,
        window: Duration,
    ) -> Result<f64, Error> {
        let secs = window.as_secs().max(60);
        self.query_with_fallback(|ns| queries::total_requests(model, ns, secs), namespace)
            .await
    }

    async fn query_with_fallback(
        &self,
        build: impl Fn(Option<&str>) -> String,
        namespace: &str,
    ) -> Result<f64, Error> {
        let filtered = self.backend.instant_query(&build(Some(namespace))).await?;
        let value = filtered.scalar();
        if value != 0.0 {
            return Ok(value);
        }
        let unfiltered = self.backend.instant_query(&build(None)).await?;
        Ok(unfiltered.scalar())
    }
}
