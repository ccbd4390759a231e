// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors for the collector crate.

/// Errors that can occur while talking to the metrics backend.
///
/// Missing and stale metrics are not errors: the availability probe
/// reports them as [`MetricsAvailability`] verdicts.
///
/// [`MetricsAvailability`]: crate::availability::MetricsAvailability
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The metrics client could not be constructed.
    ///
    /// Raised at startup; the process refuses to run with a broken client.
    #[error("Failed to build metrics client: {message}")]
    ClientBuild {
        /// A description of the failure.
        message: String,
    },

    /// The time-series backend returned a transport error or a non-success
    /// response.
    #[error("Metrics backend unavailable: {details}")]
    BackendUnavailable {
        /// A description of the failure.
        details: String,
    },

    /// The backend answered, but not with the expected vector payload.
    #[error("Malformed metrics response: {details}")]
    MalformedResponse {
        /// A description of the failure.
        details: String,
    },
}
