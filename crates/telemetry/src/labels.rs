// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! Label sanitization for emitted metrics.

/// Maximum label value length in bytes.
pub const MAX_LABEL_BYTES: usize = 128;

/// Placeholder for empty label values.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Sanitizes one label value: trims whitespace, replaces empty values with
/// [`UNKNOWN_LABEL`], and truncates to [`MAX_LABEL_BYTES`] on a character
/// boundary.
#[must_use]
pub fn sanitize_label(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return UNKNOWN_LABEL.to_owned();
    }
    if trimmed.len() <= MAX_LABEL_BYTES {
        return trimmed.to_owned();
    }
    let mut end = MAX_LABEL_BYTES;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_owned()
}
