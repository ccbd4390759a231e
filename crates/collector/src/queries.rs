// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! PromQL query construction for the vLLM server metric family.
//!
//! Every traffic query aggregates a 1-minute rate. Queries are built twice
//! per collection when needed: first with a namespace filter, then without
//! it (emulator backends export no namespace label).

/// Counter of successfully completed requests.
pub const METRIC_SUCCESS_TOTAL: &str = "vllm:request_success_total";
/// Generation token histogram sum/count pair.
pub const METRIC_GENERATION_TOKENS: &str = "vllm:generation_tokens";
/// Prompt token histogram sum/count pair.
pub const METRIC_PROMPT_TOKENS: &str = "vllm:prompt_tokens";
/// Time-to-first-token histogram sum/count pair, in seconds.
pub const METRIC_TTFT_SECONDS: &str = "vllm:time_to_first_token_seconds";
/// Per-output-token latency histogram sum/count pair, in seconds.
pub const METRIC_ITL_SECONDS: &str = "vllm:time_per_output_token_seconds";
/// In-flight request gauge, used by the availability probe.
pub const METRIC_REQUESTS_RUNNING: &str = "vllm:num_requests_running";

/// Builds the `{model_name="...", namespace="..."}` selector.
fn selector(model: &str, namespace: Option<&str>) -> String {
    let model = escape_label_value(model);
    match namespace {
        Some(ns) => format!(
            "{{model_name=\"{model}\",namespace=\"{}\"}}",
            escape_label_value(ns)
        ),
        None => format!("{{model_name=\"{model}\"}}"),
    }
}

/// Escapes backslashes and quotes in a PromQL label value.
fn escape_label_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Arrival rate in requests per minute.
#[must_use]
pub fn arrival_rate(model: &str, namespace: Option<&str>) -> String {
    format!(
        "sum(rate({METRIC_SUCCESS_TOTAL}{}[1m])) * 60",
        selector(model, namespace)
    )
}

/// Ratio of a histogram's sum and count rates, i.e. the windowed mean.
fn mean_of(metric: &str, model: &str, namespace: Option<&str>) -> String {
    let sel = selector(model, namespace);
    format!("sum(rate({metric}_sum{sel}[1m])) / sum(rate({metric}_count{sel}[1m]))")
}

/// Mean generation length in tokens.
#[must_use]
pub fn avg_output_tokens(model: &str, namespace: Option<&str>) -> String {
    mean_of(METRIC_GENERATION_TOKENS, model, namespace)
}

/// Mean prompt length in tokens.
#[must_use]
pub fn avg_input_tokens(model: &str, namespace: Option<&str>) -> String {
    mean_of(METRIC_PROMPT_TOKENS, model, namespace)
}

/// Mean time-to-first-token in milliseconds.
#[must_use]
pub fn avg_ttft_ms(model: &str, namespace: Option<&str>) -> String {
    format!("({}) * 1000", mean_of(METRIC_TTFT_SECONDS, model, namespace))
}

/// Mean inter-token latency in milliseconds.
#[must_use]
pub fn avg_itl_ms(model: &str, namespace: Option<&str>) -> String {
    format!("({}) * 1000", mean_of(METRIC_ITL_SECONDS, model, namespace))
}

/// Aggregate request count over a retention window, for the zero-rate
/// policy.
#[must_use]
pub fn total_requests(model: &str, namespace: Option<&str>, window_secs: u64) -> String {
    format!(
        "sum(increase({METRIC_SUCCESS_TOTAL}{}[{window_secs}s]))",
        selector(model, namespace)
    )
}

/// Availability probe: any exporter currently reporting for the model.
#[must_use]
pub fn probe(model: &str) -> String {
    format!("{METRIC_REQUESTS_RUNNING}{}", selector(model, None))
}
