//! TTL policy cache with per-name single-flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sentinel_core::policy::PolicyDocument;

use crate::error::PolicyError;
use crate::source::ParameterSource;

#[derive(Default)]
struct Slot {
    policy: Option<Arc<PolicyDocument>>,
    fetched_at: Option<Instant>,
}

/// Caches parsed policy documents by logical name.
///
/// Each name gets its own slot behind a `tokio::sync::Mutex`; concurrent
/// misses for one name queue on the slot lock and only the first caller
/// hits the backing store. Distinct names do not contend. Callers receive
/// a shared immutable document; refresh swaps the slot content atomically.
pub struct PolicyCache {
    source: Arc<dyn ParameterSource>,
    ttl: Duration,
    slots: std::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<Slot>>>>,
}

impl PolicyCache {
    pub fn new(source: Arc<dyn ParameterSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            slots: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, name: &str) -> Arc<tokio::sync::Mutex<Slot>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(Slot::default())))
            .clone()
    }

    /// Return the cached policy for `name`, fetching on miss or expiry.
    pub async fn load(&self, name: &str) -> Result<Arc<PolicyDocument>, PolicyError> {
        let slot = self.slot(name);
        let mut slot = slot.lock().await;

        if let (Some(policy), Some(at)) = (&slot.policy, slot.fetched_at)
            && at.elapsed() < self.ttl
        {
            return Ok(policy.clone());
        }

        let raw = self.source.fetch(name).await?;
        let document: PolicyDocument = serde_json::from_str(&raw)?;
        let document = Arc::new(document);

        slot.policy = Some(document.clone());
        slot.fetched_at = Some(Instant::now());

        tracing::debug!(policy = %name, rules = document.rules.len(), "policy refreshed");
        Ok(document)
    }

    /// Drop the cached entry for `name`; the next load refetches.
    pub fn invalidate(&self, name: &str) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.remove(name);
    }
}
