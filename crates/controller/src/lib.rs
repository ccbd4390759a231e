// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! Reconciliation loop driving the global optimization pipeline.
//!
//! The controller is single-leader and timer-driven: every tick it
//! snapshots the variant fleet, collects per-model traffic (through the
//! TTL cache), runs the analyzer and the cost-minimizing optimizer, applies
//! the zero-rate and conflict policies, and publishes one status per
//! variant with optimistic-concurrency retries.
//!
//! External collaborators (the declarative store, workload objects, config
//! collections) are reached through the traits in [`store`]; the in-memory
//! implementations back tests and the emulation mode.

pub mod backoff;
pub mod error;
pub mod reconciler;
pub mod runner;
pub mod store;

pub use backoff::Backoff;
pub use error::Error;
pub use reconciler::{Reconciler, TickOutcome};
pub use runner::Runner;
