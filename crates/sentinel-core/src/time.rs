//! Canonical UTC timestamp formatting.
//!
//! Everything Sentinel writes — audit entries, signed envelopes, credential
//! expirations — uses the same second-precision ISO8601 UTC form so log lines
//! and CloudTrail records line up byte-for-byte.

use jiff::Timestamp;

use crate::error::CoreError;

const ISO8601: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Format a timestamp as `2026-01-14T10:30:00Z`.
pub fn format_iso8601(ts: Timestamp) -> String {
    ts.strftime(ISO8601).to_string()
}

/// Current time in the canonical form.
pub fn now_iso8601() -> String {
    format_iso8601(Timestamp::now())
}

/// Parse an ISO8601/RFC3339 timestamp.
pub fn parse_iso8601(s: &str) -> Result<Timestamp, CoreError> {
    s.parse()
        .map_err(|_| CoreError::InvalidTimestamp(s.to_string()))
}
