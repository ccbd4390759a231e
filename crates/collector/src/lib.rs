// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! Per-model traffic metrics collection.
//!
//! The collector turns raw time-series samples into one [`LoadProfile`] per
//! model per tick: arrival rate, mean token lengths, and observed
//! latencies. An availability probe guards every collection so that stale
//! or absent metrics surface as an explicit condition instead of a silently
//! wrong profile. A short-TTL cache deduplicates backend queries when
//! several variants share a model.
//!
//! [`LoadProfile`]: wva_config::load::LoadProfile

pub mod availability;
pub mod cache;
pub mod client;
pub mod collector;
pub mod error;
pub mod queries;

pub use availability::MetricsAvailability;
pub use cache::{CacheEntry, MetricsCache};
pub use client::{InstantVector, MetricsBackend, PrometheusClient, Sample};
pub use collector::Collector;
pub use error::Error;
