//! SourceIdentity stamps and issuance correlation ids.
//!
//! Every credential Sentinel issues carries a SourceIdentity of the form
//! `sentinel:<user>:<approval-id-or-"direct">:<request-id>`. AWS surfaces the
//! stamp in CloudTrail for every call the credential makes, which is what
//! lets trust policies pin roles to Sentinel-issued sessions.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::CoreError;

/// Maximum sanitized principal name length.
pub const MAX_USER_LEN: usize = 20;

/// Request ids are 8 lowercase hex characters.
pub const REQUEST_ID_LEN: usize = 8;

/// Break-glass event ids are 16 lowercase hex characters.
pub const EVENT_ID_LEN: usize = 16;

/// AWS rejects SourceIdentity values longer than this.
pub const MAX_SOURCE_IDENTITY_LEN: usize = 64;

const PREFIX: &str = "sentinel";
const DIRECT: &str = "direct";

/// Sanitize a raw principal name: lowercase, strip everything outside
/// `[a-z0-9]`, truncate to [`MAX_USER_LEN`]. Fails if nothing survives.
pub fn sanitize_user(raw: &str) -> Result<String, CoreError> {
    let clean: String = raw
        .chars()
        .flat_map(char::to_lowercase)
        .filter(char::is_ascii_alphanumeric)
        .take(MAX_USER_LEN)
        .collect();

    if clean.is_empty() {
        return Err(CoreError::InvalidUser(format!(
            "no usable characters in {raw:?}"
        )));
    }

    Ok(clean)
}

/// Generate a fresh 8-hex request id.
///
/// Drawn from a v4 UUID, so the 32 bits are cryptographically random. No
/// collision checking — the id only needs to correlate one issuance with one
/// audit entry and one CloudTrail record.
pub fn new_request_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..REQUEST_ID_LEN].to_string()
}

/// Generate a fresh 16-hex break-glass event id.
pub fn new_event_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..EVENT_ID_LEN].to_string()
}

fn is_lower_hex(s: &str, len: usize) -> bool {
    s.len() == len
        && s.chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

/// Exactly 8 lowercase hex characters.
pub fn is_valid_request_id(s: &str) -> bool {
    is_lower_hex(s, REQUEST_ID_LEN)
}

/// Exactly 16 lowercase hex characters.
pub fn is_valid_break_glass_id(s: &str) -> bool {
    is_lower_hex(s, EVENT_ID_LEN)
}

/// A parsed SourceIdentity stamp.
///
/// Immutable once composed; [`SourceIdentity::parse`] is the inverse of the
/// `Display` form on valid input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceIdentity {
    user: String,
    approval_id: Option<String>,
    request_id: String,
}

impl SourceIdentity {
    /// Compose a stamp from already-raw components.
    ///
    /// `user` is sanitized here; `approval_id` of `None` renders as the
    /// literal `direct`. The composed string never exceeds
    /// [`MAX_SOURCE_IDENTITY_LEN`]: 9 + 20 + 1 + 16 + 1 + 8 = 55 worst case.
    pub fn new(
        user: &str,
        approval_id: Option<&str>,
        request_id: &str,
    ) -> Result<Self, CoreError> {
        let user = sanitize_user(user)?;

        if !is_valid_request_id(request_id) {
            return Err(CoreError::InvalidRequestId(request_id.to_string()));
        }

        let approval_id = match approval_id {
            None | Some("") => None,
            Some(id) if is_valid_break_glass_id(id) => Some(id.to_string()),
            Some(id) => return Err(CoreError::InvalidApprovalId(id.to_string())),
        };

        Ok(Self {
            user,
            approval_id,
            request_id: request_id.to_string(),
        })
    }

    /// Parse a formatted stamp back into its components.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        s.parse()
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// `None` means the credential was issued directly, not via an approval.
    pub fn approval_id(&self) -> Option<&str> {
        self.approval_id.as_deref()
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

impl fmt::Display for SourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let approval = self.approval_id.as_deref().unwrap_or(DIRECT);
        write!(
            f,
            "{PREFIX}:{}:{approval}:{}",
            self.user, self.request_id
        )
    }
}

impl FromStr for SourceIdentity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || CoreError::MalformedSourceIdentity(s.to_string());

        let mut parts = s.split(':');
        let (prefix, user, approval, request_id) = match (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) {
            (Some(p), Some(u), Some(a), Some(r), None) => (p, u, a, r),
            _ => return Err(malformed()),
        };

        if prefix != PREFIX {
            return Err(malformed());
        }
        if user.is_empty()
            || user.len() > MAX_USER_LEN
            || !user
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(CoreError::InvalidUser(user.to_string()));
        }
        if !is_valid_request_id(request_id) {
            return Err(CoreError::InvalidRequestId(request_id.to_string()));
        }

        let approval_id = if approval == DIRECT {
            None
        } else if is_valid_break_glass_id(approval) {
            Some(approval.to_string())
        } else {
            return Err(CoreError::InvalidApprovalId(approval.to_string()));
        };

        Ok(Self {
            user: user.to_string(),
            approval_id,
            request_id: request_id.to_string(),
        })
    }
}
