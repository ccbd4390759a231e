// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! In-memory store implementations.
//!
//! Back the test suite and the binary's emulation mode. Semantics mirror
//! the real declarative store where the reconciler can tell the
//! difference: versioned status writes with conflict detection, set-once
//! owner references, and absent-collection reporting.

use crate::error::Error;
use crate::store::{ConfigStore, VariantRecord, VariantStore, WorkloadObject, WorkloadStore};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use wva_config::status::VariantStatus;
use wva_config::variant::{ScaleTargetRef, VariantSpec};
use wva_config::VariantKey;

/// In-memory [`VariantStore`].
#[derive(Debug, Default)]
pub struct InMemoryVariantStore {
    records: RwLock<BTreeMap<VariantKey, VariantRecord>>,
}

impl InMemoryVariantStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fresh record for the spec, replacing any existing one.
    pub fn insert(&self, spec: VariantSpec) {
        let key = spec.key();
        let record = VariantRecord {
            spec,
            status: VariantStatus::default(),
            version: 1,
            owner_ref: None,
        };
        let _ = self.records.write().insert(key, record);
    }

    /// Marks a variant as deleted.
    pub fn mark_deleted(&self, key: &VariantKey) {
        if let Some(record) = self.records.write().get_mut(key) {
            record.spec.deleted = true;
        }
    }
}

impl VariantStore for InMemoryVariantStore {
    async fn list(&self) -> Result<Vec<VariantRecord>, Error> {
        Ok(self.records.read().values().cloned().collect())
    }

    async fn get(&self, key: &VariantKey) -> Result<VariantRecord, Error> {
        self.records
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind: "variant".to_owned(),
                name: key.as_string(),
            })
    }

    async fn update_status(
        &self,
        key: &VariantKey,
        expected_version: u64,
        status: VariantStatus,
    ) -> Result<(), Error> {
        let mut records = self.records.write();
        let record = records.get_mut(key).ok_or_else(|| Error::NotFound {
            kind: "variant".to_owned(),
            name: key.as_string(),
        })?;
        if record.version != expected_version {
            return Err(Error::WriteConflict { key: key.clone() });
        }
        record.status = status;
        record.version += 1;
        Ok(())
    }

    async fn set_owner_ref(&self, key: &VariantKey, target: &ScaleTargetRef) -> Result<(), Error> {
        let mut records = self.records.write();
        let record = records.get_mut(key).ok_or_else(|| Error::NotFound {
            kind: "variant".to_owned(),
            name: key.as_string(),
        })?;
        if record.owner_ref.is_none() {
            record.owner_ref = Some(target.clone());
        }
        Ok(())
    }
}

/// In-memory [`WorkloadStore`].
#[derive(Debug, Default)]
pub struct InMemoryWorkloadStore {
    workloads: RwLock<HashMap<(String, String), WorkloadObject>>,
}

impl InMemoryWorkloadStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a workload object.
    pub fn insert(&self, workload: WorkloadObject) {
        let _ = self
            .workloads
            .write()
            .insert((workload.namespace.clone(), workload.name.clone()), workload);
    }
}

impl WorkloadStore for InMemoryWorkloadStore {
    async fn get_workload(
        &self,
        namespace: &str,
        kind: &str,
        name: &str,
    ) -> Result<WorkloadObject, Error> {
        self.workloads
            .read()
            .get(&(namespace.to_owned(), name.to_owned()))
            .filter(|w| w.kind == kind)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind: kind.to_owned(),
                name: format!("{namespace}/{name}"),
            })
    }
}

/// In-memory [`ConfigStore`].
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    collections: RwLock<HashMap<String, BTreeMap<String, String>>>,
}

impl InMemoryConfigStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a whole collection.
    pub fn set_collection(&self, name: &str, entries: BTreeMap<String, String>) {
        let _ = self.collections.write().insert(name.to_owned(), entries);
    }

    /// Removes a collection, making subsequent reads report it absent.
    pub fn remove_collection(&self, name: &str) {
        let _ = self.collections.write().remove(name);
    }

    /// Reads one value, for assertions.
    #[must_use]
    pub fn value(&self, collection: &str, key: &str) -> Option<String> {
        self.collections
            .read()
            .get(collection)
            .and_then(|c| c.get(key).cloned())
    }
}

impl ConfigStore for InMemoryConfigStore {
    async fn collection(&self, name: &str) -> Result<Option<BTreeMap<String, String>>, Error> {
        Ok(self.collections.read().get(name).cloned())
    }

    async fn put_value(&self, collection: &str, key: &str, value: &str) -> Result<(), Error> {
        let mut collections = self.collections.write();
        let entries = collections.entry(collection.to_owned()).or_default();
        let _ = entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}
