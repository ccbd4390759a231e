// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! Cost-minimizing replica allocation and the policies applied on top of
//! it.
//!
//! Pipeline order within one tick:
//!
//! 1. [`allocator`] picks exactly one allocation per variant, cheapest
//!    first, honoring SLO-class priority and replica bounds.
//! 2. [`zero_rate`] overrides the result for models with no recent traffic.
//! 3. [`conflict`] elects one winner when several variants claim the same
//!    workload object.
//! 4. [`fallback`] decides what to publish for variants the optimizer could
//!    not serve.
//!
//! Every stage is a pure function over in-memory snapshots, evaluated in a
//! deterministic order.

pub mod allocator;
pub mod conflict;
pub mod error;
pub mod fallback;
pub mod zero_rate;

pub use allocator::{AllocationSolution, Candidate, Optimizer, OptimizerVariant, VariantDecision};
pub use error::Error;
