// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! Emitted autoscaler metrics.
//!
//! The metric set is registered once per process; re-registration against
//! the same registry is a no-op. Components receive the set by reference
//! (never through an ambient global) so unit tests can register against
//! their own registry.

pub mod error;
pub mod labels;
pub mod metrics;

pub use labels::sanitize_label;
pub use metrics::AutoscalerMetrics;
