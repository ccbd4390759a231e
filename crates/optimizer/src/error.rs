// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors for the optimizer crate.

use miette::Diagnostic;

/// Errors that can occur during allocation.
///
/// A single variant without candidates is not an error: the allocator
/// omits it and the fallback policy covers it.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum Error {
    /// The optimizer could not produce an allocation for any variant.
    ///
    /// Participating variants fall back to their previous allocation and
    /// are marked `OptimizationReady=False`.
    #[error("No feasible allocation for any of the {num_variants} participating variants")]
    #[diagnostic(code(wva::optimizer::no_feasible_allocation))]
    NoFeasibleAllocation {
        /// How many variants participated in the solve.
        num_variants: usize,
    },
}
