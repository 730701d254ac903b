//! HMAC-SHA256 envelope signing.
//!
//! The signature covers the canonical JSON of `{entry, timestamp, key_id}`.
//! Canonical means the entry is first converted to a `serde_json::Value`,
//! whose object keys serialize in sorted order, so signing and offline
//! verification produce identical bytes regardless of which typed struct
//! the entry came from.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::AuditError;

type HmacSha256 = Hmac<Sha256>;

/// Minimum accepted key length in bytes.
pub const MIN_KEY_LEN: usize = 32;

/// A signed audit line as written to the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedEntry {
    pub entry: serde_json::Value,
    /// Lowercase hex HMAC-SHA256, 64 characters.
    pub signature: String,
    pub key_id: String,
    /// ISO8601 UTC, captured at signing time.
    pub timestamp: String,
}

#[derive(Serialize)]
struct SigningPayload<'a> {
    entry: &'a serde_json::Value,
    timestamp: &'a str,
    key_id: &'a str,
}

/// The bytes the MAC is computed over.
pub fn canonical_payload(
    entry: &serde_json::Value,
    timestamp: &str,
    key_id: &str,
) -> Result<Vec<u8>, AuditError> {
    let payload = SigningPayload {
        entry,
        timestamp,
        key_id,
    };
    Ok(serde_json::to_vec(&payload)?)
}

/// Compute the hex MAC for an entry. `key` length is NOT checked here;
/// use [`Signer`] for enforced construction.
pub fn compute_signature(
    key: &[u8],
    entry: &serde_json::Value,
    timestamp: &str,
    key_id: &str,
) -> Result<String, AuditError> {
    let payload = canonical_payload(entry, timestamp, key_id)?;

    // HMAC accepts any key length.
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AuditError::Signing(e.to_string()))?;
    mac.update(&payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Holds the signing key and key id. Construction enforces the 32-byte
/// minimum; signing itself is then deterministic.
#[derive(Clone)]
pub struct Signer {
    key: Vec<u8>,
    key_id: String,
}

impl Signer {
    pub fn new(key: impl Into<Vec<u8>>, key_id: impl Into<String>) -> Result<Self, AuditError> {
        let key = key.into();
        if key.len() < MIN_KEY_LEN {
            return Err(AuditError::KeyTooShort(key.len()));
        }
        Ok(Self {
            key,
            key_id: key_id.into(),
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Wrap an already-canonicalized entry in a signed envelope.
    pub fn sign(
        &self,
        entry: serde_json::Value,
        timestamp: String,
    ) -> Result<SignedEntry, AuditError> {
        let signature = compute_signature(&self.key, &entry, &timestamp, &self.key_id)?;
        Ok(SignedEntry {
            entry,
            signature,
            key_id: self.key_id.clone(),
            timestamp,
        })
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("key_id", &self.key_id)
            .field("key_len", &self.key.len())
            .finish()
    }
}
