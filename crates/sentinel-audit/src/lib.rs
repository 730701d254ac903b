//! sentinel-audit
//!
//! The append-only audit pipeline: typed decision / approval / break-glass
//! entries written as JSON lines, an optional HMAC-SHA256 signed envelope,
//! a CloudWatch Logs sink, and the offline signature verifier.
//!
//! Audit writes are fail-open by design — credential issuance never blocks
//! on a log write, and a signing failure degrades to an unsigned line
//! rather than dropping the record.

pub mod cloudwatch;
pub mod entries;
pub mod error;
pub mod signing;
pub mod verify;
pub mod writer;
