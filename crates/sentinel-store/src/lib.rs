//! sentinel-store
//!
//! Session, approval, and break-glass stores. Each store is a trait with an
//! S3-backed implementation (JSON objects with ETag optimistic locking) and
//! an in-memory implementation for local mode and tests.

pub mod approval;
pub mod breakglass;
pub mod client;
pub mod error;
pub mod keys;
pub mod objects;
pub mod session;
