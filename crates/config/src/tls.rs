// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable enabling certificate verification bypass.
pub const ENV_TLS_INSECURE_SKIP_VERIFY: &str = "PROMETHEUS_TLS_INSECURE_SKIP_VERIFY";
/// Environment variable pointing at a PEM CA bundle to trust.
pub const ENV_CA_CERT_PATH: &str = "PROMETHEUS_CA_CERT_PATH";
/// Environment variable pointing at a PEM client certificate.
pub const ENV_CLIENT_CERT_PATH: &str = "PROMETHEUS_CLIENT_CERT_PATH";
/// Environment variable pointing at a PEM client key.
pub const ENV_CLIENT_KEY_PATH: &str = "PROMETHEUS_CLIENT_KEY_PATH";
/// Environment variable overriding the SNI server name.
pub const ENV_SERVER_NAME: &str = "PROMETHEUS_SERVER_NAME";

/// TLS settings for the metrics backend client.
///
/// This configuration is used when the autoscaler initiates HTTPS
/// connections to the time-series backend. A misconfiguration here refuses
/// process startup: scraping over a half-configured TLS channel is worse
/// than not starting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsSettings {
    /// Skip server certificate verification. Emulator backends only.
    #[serde(default)]
    pub insecure_skip_verify: bool,

    /// Path to a PEM CA bundle to trust in addition to system roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert_path: Option<PathBuf>,

    /// Path to a PEM client certificate for mutual TLS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_cert_path: Option<PathBuf>,

    /// Path to the PEM key matching `client_cert_path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key_path: Option<PathBuf>,

    /// SNI server name override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
}

impl TlsSettings {
    /// Builds the settings from an environment-style lookup.
    ///
    /// The lookup receives the `PROMETHEUS_TLS_*` / `PROMETHEUS_*_PATH`
    /// variable names; absent values leave the corresponding field unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let settings = Self {
            insecure_skip_verify: lookup(ENV_TLS_INSECURE_SKIP_VERIFY)
                .map(|v| parse_bool(&v))
                .unwrap_or(false),
            ca_cert_path: lookup(ENV_CA_CERT_PATH).map(PathBuf::from),
            client_cert_path: lookup(ENV_CLIENT_CERT_PATH).map(PathBuf::from),
            client_key_path: lookup(ENV_CLIENT_KEY_PATH).map(PathBuf::from),
            server_name: lookup(ENV_SERVER_NAME),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Builds the settings from process environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Validates internal consistency.
    ///
    /// A client certificate without its key (or vice versa) is a refusal to
    /// start, per the external-interface contract.
    pub fn validate(&self) -> Result<(), Error> {
        match (&self.client_cert_path, &self.client_key_path) {
            (Some(_), None) => Err(Error::InvalidTls {
                message: format!("{ENV_CLIENT_CERT_PATH} is set but {ENV_CLIENT_KEY_PATH} is not"),
            }),
            (None, Some(_)) => Err(Error::InvalidTls {
                message: format!("{ENV_CLIENT_KEY_PATH} is set but {ENV_CLIENT_CERT_PATH} is not"),
            }),
            _ => Ok(()),
        }
    }
}

/// Lenient bool parsing for flag-valued config strings.
#[must_use]
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_plain_https() {
        let tls = TlsSettings::from_lookup(|_| None).expect("settings");
        assert_eq!(tls, TlsSettings::default());
        assert!(!tls.insecure_skip_verify);
    }

    #[test]
    fn cert_without_key_refuses() {
        let err = TlsSettings::from_lookup(|key| {
            (key == ENV_CLIENT_CERT_PATH).then(|| "/etc/certs/client.pem".to_owned())
        })
        .expect_err("half-configured mTLS");
        assert!(matches!(err, Error::InvalidTls { .. }));
    }

    #[test]
    fn key_without_cert_refuses() {
        let err = TlsSettings::from_lookup(|key| {
            (key == ENV_CLIENT_KEY_PATH).then(|| "/etc/certs/client.key".to_owned())
        })
        .expect_err("half-configured mTLS");
        assert!(matches!(err, Error::InvalidTls { .. }));
    }

    #[test]
    fn full_lookup_round_trips() {
        let tls = TlsSettings::from_lookup(|key| match key {
            ENV_TLS_INSECURE_SKIP_VERIFY => Some("true".to_owned()),
            ENV_CA_CERT_PATH => Some("/etc/certs/ca.pem".to_owned()),
            ENV_CLIENT_CERT_PATH => Some("/etc/certs/client.pem".to_owned()),
            ENV_CLIENT_KEY_PATH => Some("/etc/certs/client.key".to_owned()),
            ENV_SERVER_NAME => Some("prom.internal".to_owned()),
            _ => None,
        })
        .expect("settings");
        assert!(tls.insecure_skip_verify);
        assert_eq!(tls.server_name.as_deref(), Some("prom.internal"));
    }

    #[test]
    fn bool_parsing_is_lenient() {
        assert!(parse_bool("TRUE"));
        assert!(parse_bool(" 1 "));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("junk"));
    }
}
