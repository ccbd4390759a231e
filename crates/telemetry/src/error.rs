// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors for the telemetry crate.

/// Errors that can occur while registering or emitting metrics.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The underlying metrics library rejected a registration or update.
    #[error("Metrics registry error: {0}")]
    Registry(#[from] prometheus::Error),
}
