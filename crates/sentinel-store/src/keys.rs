//! S3 key/path conventions.
//!
//! Pure string functions — no AWS SDK dependency. These define the canonical
//! layout of Sentinel state objects in the bucket.

pub fn session(id: &str) -> String {
    format!("sessions/{id}.json")
}

pub const SESSIONS_PREFIX: &str = "sessions/";

pub fn approval(id: &str) -> String {
    format!("approvals/{id}.json")
}

pub const APPROVALS_PREFIX: &str = "approvals/";

pub fn break_glass(id: &str) -> String {
    format!("breakglass/{id}.json")
}

pub const BREAK_GLASS_PREFIX: &str = "breakglass/";
