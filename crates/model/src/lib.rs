// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! Queueing-theoretic performance model for inference variants.
//!
//! For each variant the analyzer answers two questions per candidate
//! accelerator:
//!
//! 1. What is the largest decode batch size whose inter-token latency still
//!    meets the SLO? (The decode latency is linear in the batch size.)
//! 2. How many replicas are needed so that the estimated time-to-first-token
//!    (queue wait + prefill) meets the SLO at the observed arrival rate?
//!
//! The queue wait uses an M/M/1 approximation per replica with the arrival
//! stream split evenly across replicas. All computation is pure and operates
//! on in-memory snapshots; the reconciler assembles the inputs.

pub mod allocation;
pub mod analyzer;

pub use allocation::Allocation;
pub use analyzer::{AcceleratorPerf, Analyzer, VariantAnalysis};
