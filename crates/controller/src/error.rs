// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors for the controller crate.

use miette::Diagnostic;
use wva_config::VariantKey;

/// Errors that can occur while driving the reconciliation loop.
///
/// Collector and optimizer failures never reach this enum: the reconciler
/// folds them into per-variant conditions instead of failing the tick.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum Error {
    /// Configuration error from the config crate.
    #[error("Configuration error: {0}")]
    Config(#[from] wva_config::error::Error),

    /// The declarative store could not be reached.
    #[error("Store unavailable: {details}")]
    StoreUnavailable {
        /// A description of the failure.
        details: String,
    },

    /// A referenced object does not exist in its store.
    #[error("{kind} `{name}` not found")]
    NotFound {
        /// The object kind (variant, workload, config collection).
        kind: String,
        /// The object name.
        name: String,
    },

    /// An optimistic-concurrency status write lost the race.
    #[error("Write conflict updating `{key}`")]
    WriteConflict {
        /// The variant whose status update conflicted.
        key: VariantKey,
    },

    /// The tick was cancelled before completion.
    #[error("Reconciliation tick cancelled")]
    Cancelled,
}
