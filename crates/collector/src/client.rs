// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! Instant-query client for a Prometheus-compatible HTTP API.

use crate::error::Error;
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use wva_config::tls::TlsSettings;

/// Per-query timeout.
const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// One sample of an instant vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Label set of the series.
    pub labels: HashMap<String, String>,
    /// Sample timestamp in fractional seconds since the epoch.
    pub timestamp: f64,
    /// Sample value. May be NaN or infinite; callers clamp.
    pub value: f64,
}

/// The result of an instant query with a vector result type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstantVector {
    /// The samples, in backend order.
    pub samples: Vec<Sample>,
}

impl InstantVector {
    /// The first sample's value with NaN and infinities clamped to zero.
    ///
    /// Aggregate queries return at most one sample, so "first" is "the"
    /// value; an empty vector reads as zero.
    #[must_use]
    pub fn scalar(&self) -> f64 {
        self.samples
            .first()
            .map(|s| if s.value.is_finite() { s.value } else { 0.0 })
            .unwrap_or(0.0)
    }

    /// The newest sample timestamp, if any.
    #[must_use]
    pub fn newest_timestamp(&self) -> Option<f64> {
        self.samples
            .iter()
            .map(|s| s.timestamp)
            .fold(None, |acc, t| Some(acc.map_or(t, |a: f64| a.max(t))))
    }
}

/// An instant-query capable time-series backend.
///
/// The production implementation is [`PrometheusClient`]; tests substitute
/// a scripted backend.
pub trait MetricsBackend: Send + Sync {
    /// Evaluates `query` at the current instant and returns the vector
    /// result.
    fn instant_query(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<InstantVector, Error>> + Send;
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    data: Option<ApiData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    #[serde(rename = "resultType")]
    result_type: String,
    #[serde(default)]
    result: Vec<ApiSample>,
}

#[derive(Debug, Deserialize)]
struct ApiSample {
    #[serde(default)]
    metric: HashMap<String, String>,
    value: (f64, String),
}

/// HTTP client for the Prometheus instant-query API.
///
/// Supports HTTPS with optional bearer-token auth, client-certificate auth,
/// and a private CA bundle. Construction fails on TLS misconfiguration so
/// the process refuses to start instead of scraping over a broken channel.
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    http: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl PrometheusClient {
    /// Builds the client from the backend URL, optional bearer token, and
    /// TLS settings.
    pub fn new(
        base_url: &str,
        bearer_token: Option<String>,
        tls: &TlsSettings,
    ) -> Result<Self, Error> {
        tls.validate().map_err(|e| Error::ClientBuild {
            message: e.to_string(),
        })?;

        let mut builder = reqwest::Client::builder().timeout(QUERY_TIMEOUT);

        if tls.insecure_skip_verify {
            tracing::warn!("metrics backend certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(path) = &tls.ca_cert_path {
            let pem = std::fs::read(path).map_err(|e| Error::ClientBuild {
                message: format!("reading CA bundle {}: {e}", path.display()),
            })?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| Error::ClientBuild {
                message: format!("parsing CA bundle {}: {e}", path.display()),
            })?;
            builder = builder.add_root_certificate(cert);
        }
        if let (Some(cert_path), Some(key_path)) = (&tls.client_cert_path, &tls.client_key_path) {
            let mut pem = std::fs::read(cert_path).map_err(|e| Error::ClientBuild {
                message: format!("reading client cert {}: {e}", cert_path.display()),
            })?;
            let key = std::fs::read(key_path).map_err(|e| Error::ClientBuild {
                message: format!("reading client key {}: {e}", key_path.display()),
            })?;
            pem.extend_from_slice(&key);
            let identity = reqwest::Identity::from_pem(&pem).map_err(|e| Error::ClientBuild {
                message: format!("assembling client identity: {e}"),
            })?;
            builder = builder.identity(identity);
        }
        if let Some(server_name) = &tls.server_name {
            // Virtual-hosted backends route on the Host header; reqwest
            // derives SNI from the URL, so the override is applied here.
            let mut headers = reqwest::header::HeaderMap::new();
            let value = reqwest::header::HeaderValue::from_str(server_name).map_err(|e| {
                Error::ClientBuild {
                    message: format!("invalid server name `{server_name}`: {e}"),
                }
            })?;
            let _ = headers.insert(reqwest::header::HOST, value);
            builder = builder.default_headers(headers);
        }

        let http = builder.build().map_err(|e| Error::ClientBuild {
            message: e.to_string(),
        })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            bearer_token,
        })
    }

    async fn query_api(&self, query: &str) -> Result<InstantVector, Error> {
        let url = format!("{}/api/v1/query", self.base_url);
        let mut request = self.http.get(&url).query(&[("query", query)]);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| Error::BackendUnavailable {
            details: e.to_string(),
        })?;
        if !response.status().is_success() {
            return Err(Error::BackendUnavailable {
                details: format!("HTTP {} from {url}", response.status()),
            });
        }
        let body: ApiResponse = response.json().await.map_err(|e| Error::MalformedResponse {
            details: e.to_string(),
        })?;

        if body.status != "success" {
            return Err(Error::BackendUnavailable {
                details: body
                    .error
                    .unwrap_or_else(|| format!("query status `{}`", body.status)),
            });
        }
        let data = body.data.ok_or_else(|| Error::MalformedResponse {
            details: "success response without data".to_owned(),
        })?;
        if data.result_type != "vector" {
            return Err(Error::MalformedResponse {
                details: format!("expected vector result, got `{}`", data.result_type),
            });
        }

        let samples = data
            .result
            .into_iter()
            .map(|s| {
                let value = s.value.1.parse::<f64>().unwrap_or(f64::NAN);
                Sample {
                    labels: s.metric,
                    timestamp: s.value.0,
                    value,
                }
            })
            .collect();
        Ok(InstantVector { samples })
    }
}

impl MetricsBackend for PrometheusClient {
    async fn instant_query(&self, query: &str) -> Result<InstantVector, Error> {
        self.query_api(query).await
    }
}

impl<T: MetricsBackend> MetricsBackend for std::sync::Arc<T> {
    async fn instant_query(&self, query: &str) -> Result<InstantVector, Error> {
        T::instant_query(self, query).await
    }
}
