// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! Data model and configuration for the workload variant autoscaler.
//!
//! Data Model:
//! - model
//!   - variants (one deployment of the model on one accelerator topology)
//!     - performance profile (decode/prefill latency parameters)
//!     - SLO class reference (priority + latency targets)
//!     - scale target (the workload object being scaled)
//!
//! A *variant* is the unit of scaling. Several variants may serve the same
//! model on different accelerators; the optimizer arbitrates between them.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

pub mod accelerator;
pub mod error;
pub mod load;
pub mod scale_to_zero;
/// Reconciliation loop settings read from the config store.
pub mod settings;
pub mod slo;
pub mod status;
/// TLS configuration for the metrics backend client.
pub mod tls;
pub mod variant;

/// The id of a served model. Shared by all variants serving that model.
pub type ModelId = Cow<'static, str>;

/// The id of a variant within a namespace.
pub type VariantId = Cow<'static, str>;

/// The name of an accelerator type (e.g. `A100`, `H100`).
pub type AcceleratorName = Cow<'static, str>;

/// A namespace in the declarative store.
pub type Namespace = Cow<'static, str>;

/// Unique key for identifying a variant across namespaces.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct VariantKey {
    namespace: Namespace,
    variant_id: VariantId,
}

impl VariantKey {
    /// Construct a new key from a namespace and variant id.
    #[must_use]
    pub const fn new(namespace: Namespace, variant_id: VariantId) -> Self {
        Self {
            namespace,
            variant_id,
        }
    }

    /// Returns the namespace.
    #[must_use]
    pub const fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Returns the variant id.
    #[must_use]
    pub const fn variant_id(&self) -> &VariantId {
        &self.variant_id
    }

    /// Returns a `namespace/variant-id` string representation.
    #[must_use]
    pub fn as_string(&self) -> String {
        format!("{}/{}", self.namespace, self.variant_id)
    }
}

impl std::fmt::Display for VariantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.variant_id)
    }
}
