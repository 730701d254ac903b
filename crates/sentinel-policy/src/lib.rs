//! sentinel-policy
//!
//! Policy loading from SSM Parameter Store with a TTL cache. Concurrent
//! misses for the same policy name coalesce into one backing fetch.

pub mod cache;
pub mod error;
pub mod source;
