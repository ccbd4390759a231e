// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors for the config crate.

use miette::Diagnostic;

/// Errors that can occur while reading or validating configuration.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum Error {
    /// A required config collection or key is absent from the config store.
    #[error("Missing required configuration: collection `{collection}`, key `{key}`")]
    #[diagnostic(code(wva::config::missing))]
    ConfigMissing {
        /// The config collection that was consulted.
        collection: String,
        /// The missing key, or `*` when the whole collection is absent.
        key: String,
    },

    /// A config blob failed schema or syntax parsing.
    ///
    /// Callers skip the offending entry and continue; the parse failure is
    /// logged at the use site.
    #[error("Malformed configuration entry `{key}`: {details}")]
    #[diagnostic(code(wva::config::malformed))]
    ConfigMalformed {
        /// The key of the offending entry.
        key: String,
        /// A description of the parse or schema failure.
        details: String,
    },

    /// A variant spec violated a structural constraint.
    #[error("Variant `{variant}` failed validation: {message}")]
    #[diagnostic(code(wva::config::validation))]
    ValidationViolation {
        /// The full name of the offending variant.
        variant: String,
        /// A description of the violated constraint.
        message: String,
    },

    /// The metrics backend TLS settings are unusable.
    ///
    /// This is the only error that terminates the process: it is raised at
    /// startup, before the control loop begins.
    #[error("Invalid TLS configuration: {message}")]
    #[diagnostic(code(wva::config::tls))]
    InvalidTls {
        /// A description of the misconfiguration.
        message: String,
    },

    /// A duration-valued key could not be parsed.
    #[error("Invalid duration for `{key}`: `{value}`")]
    #[diagnostic(code(wva::config::duration))]
    InvalidDuration {
        /// The key holding the duration.
        key: String,
        /// The unparseable value.
        value: String,
    },
}
