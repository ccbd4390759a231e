// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! Store abstractions over the external declarative store, the workload
//! objects, and the config collections.
//!
//! The declarative API layer itself (schemas, webhooks, watches) lives
//! outside this system; these traits are the narrow waist the reconciler
//! drives. The in-memory implementations in [`memory`] back both the test
//! suite and the binary's emulation mode.

use crate::error::Error;
use std::collections::BTreeMap;
use std::future::Future;
use wva_config::status::VariantStatus;
use wva_config::variant::{ScaleTargetRef, VariantSpec};
use wva_config::VariantKey;

pub mod memory;

/// Config collection holding accelerator unit costs as JSON blobs.
pub const COLLECTION_ACCELERATOR_COSTS: &str = "accelerator-unit-costs";
/// Config collection holding SLO class YAML blobs.
pub const COLLECTION_SERVICE_CLASSES: &str = "service-classes-config";
/// Config collection holding the reconciliation key/value settings.
pub const COLLECTION_RECONCILIATION: &str = "autoscaler-config";
/// Optional config collection with per-model scale-to-zero entries.
pub const COLLECTION_SCALE_TO_ZERO: &str = "model-scale-to-zero-config";

/// One variant as stored: spec, status, and concurrency bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRecord {
    /// The declarative spec.
    pub spec: VariantSpec,
    /// The current status.
    pub status: VariantStatus,
    /// Optimistic-concurrency version, bumped on every status write.
    pub version: u64,
    /// Back-reference to the scale target, set once and never overwritten.
    pub owner_ref: Option<ScaleTargetRef>,
}

/// A workload object (the thing a variant scales).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadObject {
    /// Object kind (e.g. `Deployment`).
    pub kind: String,
    /// Object name.
    pub name: String,
    /// Object namespace.
    pub namespace: String,
    /// Declared replica count from the object's spec.
    pub spec_replicas: Option<u32>,
    /// Observed ready replica count from the object's status.
    pub ready_replicas: Option<u32>,
}

impl WorkloadObject {
    /// The replica count the reconciler treats as observed, preferring the
    /// object's observed state over its spec.
    #[must_use]
    pub fn observed_replicas(&self) -> u32 {
        self.ready_replicas.or(self.spec_replicas).unwrap_or(0)
    }
}

/// Read/write access to variant records.
pub trait VariantStore: Send + Sync {
    /// Lists every variant record, including deletion-marked ones.
    fn list(&self) -> impl Future<Output = Result<Vec<VariantRecord>, Error>> + Send;

    /// Fetches one record.
    fn get(&self, key: &VariantKey) -> impl Future<Output = Result<VariantRecord, Error>> + Send;

    /// Writes a status if `expected_version` still matches, bumping the
    /// version. A mismatch is [`Error::WriteConflict`].
    fn update_status(
        &self,
        key: &VariantKey,
        expected_version: u64,
        status: VariantStatus,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Sets the owner back-reference if absent. Idempotent; patched
    /// independently of status to keep write conflicts apart.
    fn set_owner_ref(
        &self,
        key: &VariantKey,
        target: &ScaleTargetRef,
    ) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Read access to workload objects.
pub trait WorkloadStore: Send + Sync {
    /// Fetches the workload object a variant scales.
    fn get_workload(
        &self,
        namespace: &str,
        kind: &str,
        name: &str,
    ) -> impl Future<Output = Result<WorkloadObject, Error>> + Send;
}

/// Read/write access to named config collections.
pub trait ConfigStore: Send + Sync {
    /// Fetches a whole collection. `Ok(None)` when the collection does not
    /// exist; callers decide whether that is fatal.
    fn collection(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<BTreeMap<String, String>>, Error>> + Send;

    /// Writes one value, used to consume the manual-trigger flag.
    fn put_value(
        &self,
        collection: &str,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), Error>> + Send;
}

// Shared-handle forwarding, so wiring code and tests can keep a handle to
// the same store the reconciler drives.

impl<T: VariantStore> VariantStore for std::sync::Arc<T> {
    async fn list(&self) -> Result<Vec<VariantRecord>, Error> {
        T::list(self).await
    }

    async fn get(&self, key: &VariantKey) -> Result<VariantRecord, Error> {
        T::get(self, key).await
    }

    async fn update_status(
        &self,
        key: &VariantKey,
        expected_version: u64,
        status: VariantStatus,
    ) -> Result<(), Error> {
        T::update_status(self, key, expected_version, status).await
    }

    async fn set_owner_ref(&self, key: &VariantKey, target: &ScaleTargetRef) -> Result<(), Error> {
        T::set_owner_ref(self, key, target).await
    }
}

impl<T: WorkloadStore> WorkloadStore for std::sync::Arc<T> {
    async fn get_workload(
        &self,
        namespace: &str,
        kind: &str,
        name: &str,
    ) -> Result<WorkloadObject, Error> {
        T::get_workload(self, namespace, kind, name).await
    }
}

impl<T: ConfigStore> ConfigStore for std::sync::Arc<T> {
    async fn collection(&self, name: &str) -> Result<Option<BTreeMap<String, String>>, Error> {
        T::collection(self, name).await
    }

    async fn put_value(&self, collection: &str, key: &str, value: &str) -> Result<(), Error> {
        T::put_value(self, collection, key, value).await
    }
}
