// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! Per-model scale-to-zero configuration.
//!
//! The config store collection holds heterogeneous YAML blobs under string
//! keys: `model.*` keys carry per-model overrides, the special
//! `__defaults__` key carries fallbacks. Entries are modeled as a tagged
//! union discriminated by key prefix; field probing is never used to tell
//! the two apart.

use crate::ModelId;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Key carrying collection-wide fallbacks.
pub const DEFAULTS_KEY: &str = "__defaults__";
/// Prefix of keys carrying per-model configuration.
pub const MODEL_KEY_PREFIX: &str = "model.";

/// Retention window assumed when neither a model entry nor the defaults
/// entry supplies one.
pub const DEFAULT_RETENTION_PERIOD: Duration = Duration::from_secs(300);

/// Per-model scale-to-zero override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelScaleToZeroConfig {
    /// The model this entry configures.
    #[serde(rename = "modelID")]
    pub model_id: ModelId,
    /// Whether the model may scale to zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_scale_to_zero: Option<bool>,
    /// Idle window consulted before releasing the last replica.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "humantime_serde"
    )]
    pub retention_period: Option<Duration>,
}

/// Collection-wide fallbacks from the `__defaults__` key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultsConfig {
    /// Fallback for `enable_scale_to_zero`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_scale_to_zero: Option<bool>,
    /// Fallback for `retention_period`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "humantime_serde"
    )]
    pub retention_period: Option<Duration>,
}

/// One parsed collection entry, discriminated by its key.
#[derive(Debug, Clone, PartialEq)]
pub enum ScaleToZeroEntry {
    /// The `__defaults__` entry.
    Defaults(DefaultsConfig),
    /// A `model.*` entry.
    Model(ModelScaleToZeroConfig),
}

impl ScaleToZeroEntry {
    /// Parses one collection entry by key.
    ///
    /// Returns `Ok(None)` for keys outside the collection's naming scheme;
    /// the caller skips them.
    pub fn parse(key: &str, blob: &str) -> Result<Option<Self>, Error> {
        if key == DEFAULTS_KEY {
            let defaults: DefaultsConfig =
                serde_yaml::from_str(blob).map_err(|e| Error::ConfigMalformed {
                    key: key.to_owned(),
                    details: e.to_string(),
                })?;
            return Ok(Some(Self::Defaults(defaults)));
        }
        if key.starts_with(MODEL_KEY_PREFIX) {
            let model: ModelScaleToZeroConfig =
                serde_yaml::from_str(blob).map_err(|e| Error::ConfigMalformed {
                    key: key.to_owned(),
                    details: e.to_string(),
                })?;
            if model.model_id.is_empty() {
                return Err(Error::ConfigMalformed {
                    key: key.to_owned(),
                    details: "modelID must be non-empty".to_owned(),
                });
            }
            return Ok(Some(Self::Model(model)));
        }
        Ok(None)
    }
}

/// The assembled per-model scale-to-zero configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScaleToZeroConfig {
    per_model: HashMap<ModelId, ModelScaleToZeroConfig>,
    defaults: DefaultsConfig,
}

impl ScaleToZeroConfig {
    /// Assembles the configuration from the raw collection.
    ///
    /// Keys are processed in lexicographic order (the `BTreeMap` iteration
    /// order); on duplicate `modelID` the lexicographically first key wins.
    /// Malformed entries are skipped with a warning.
    #[must_use]
    pub fn from_entries(entries: &BTreeMap<String, String>) -> Self {
        let mut config = Self::default();
        for (key, blob) in entries {
            match ScaleToZeroEntry::parse(key, blob) {
                Ok(Some(ScaleToZeroEntry::Defaults(defaults))) => {
                    config.defaults = defaults;
                }
                Ok(Some(ScaleToZeroEntry::Model(model))) => {
                    if config.per_model.contains_key(&model.model_id) {
                        tracing::warn!(
                            key = %key,
                            model = %model.model_id,
                            "duplicate modelID in scale-to-zero config, keeping first entry"
                        );
                        continue;
                    }
                    let _ = config.per_model.insert(model.model_id.clone(), model);
                }
                Ok(None) => {
                    tracing::warn!(key = %key, "unrecognized scale-to-zero key, skipping");
                }
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "malformed scale-to-zero entry, skipping");
                }
            }
        }
        config
    }

    /// Per-model enablement hint: the model's own entry if set, else the
    /// `__defaults__` entry. `None` defers to the global config / env
    /// chain.
    #[must_use]
    pub fn enabled_hint(&self, model: &str) -> Option<bool> {
        self.per_model
            .get(model)
            .and_then(|m| m.enable_scale_to_zero)
            .or(self.defaults.enable_scale_to_zero)
    }

    /// Retention window for a model, falling back to the defaults entry and
    /// then to [`DEFAULT_RETENTION_PERIOD`].
    #[must_use]
    pub fn retention_for(&self, model: &str) -> Duration {
        self.per_model
            .get(model)
            .and_then(|m| m.retention_period)
            .or(self.defaults.retention_period)
            .unwrap_or(DEFAULT_RETENTION_PERIOD)
    }
}
