//! Policy document model and the pure evaluator.
//!
//! A policy is an ordered rule list; evaluation is first-match-wins, so a
//! `deny` placed early can never be overridden by a later `allow`.

use serde::{Deserialize, Serialize};

/// Reason reported when no rule matched.
pub const NO_MATCHING_RULE: &str = "no matching rule";

/// A policy document as stored in the parameter store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub version: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub effect: Effect,
    #[serde(default)]
    pub conditions: Conditions,
    #[serde(default)]
    pub reason: String,
    /// Upper bound in seconds on issued credential lifetime when this rule
    /// matches in server mode. Zero means uncapped.
    #[serde(default)]
    pub max_server_duration: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Allow,
    Deny,
    RequireApproval,
    RequireServer,
}

/// Match predicate over a request. All present predicates must hold;
/// an absent predicate is a wildcard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conditions {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub users: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub profiles: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mode: Option<Vec<AccessMode>>,
    /// Inclusive lower bound on the request time.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub not_before: Option<jiff::Timestamp>,
    /// Inclusive upper bound on the request time.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub not_after: Option<jiff::Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    Cli,
    CredentialProcess,
    Server,
}

impl AccessMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessMode::Cli => "cli",
            AccessMode::CredentialProcess => "credential_process",
            AccessMode::Server => "server",
        }
    }
}

impl std::fmt::Display for AccessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to evaluation.
#[derive(Debug, Clone)]
pub struct EvalRequest {
    pub user: String,
    pub profile: String,
    pub time: jiff::Timestamp,
    pub mode: AccessMode,
}

/// Output of evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub effect: Effect,
    /// Name of the matched rule, or empty for default-deny.
    pub matched_rule: String,
    /// Zero-based index of the matched rule, or -1 for default-deny.
    pub rule_index: i32,
    pub reason: String,
    pub max_server_duration: u64,
}

impl Decision {
    fn default_deny() -> Self {
        Self {
            effect: Effect::Deny,
            matched_rule: String::new(),
            rule_index: -1,
            reason: NO_MATCHING_RULE.to_string(),
            max_server_duration: 0,
        }
    }
}

impl Conditions {
    fn matches(&self, request: &EvalRequest) -> bool {
        if let Some(users) = &self.users
            && !users.iter().any(|u| u == &request.user)
        {
            return false;
        }
        if let Some(profiles) = &self.profiles
            && !profiles.iter().any(|p| p == &request.profile)
        {
            return false;
        }
        if let Some(modes) = &self.mode
            && !modes.contains(&request.mode)
        {
            return false;
        }
        if let Some(start) = self.not_before
            && request.time < start
        {
            return false;
        }
        if let Some(end) = self.not_after
            && request.time > end
        {
            return false;
        }
        true
    }
}

/// Map a request to a decision. Pure: no I/O, no clock reads beyond
/// `request.time`; identical inputs yield identical outputs.
///
/// `require_server` collapses to `allow` when the requesting mode is
/// `server` — the server path itself satisfies the requirement. In any
/// other mode the caller treats it as a deny.
pub fn evaluate(policy: &PolicyDocument, request: &EvalRequest) -> Decision {
    for (index, rule) in policy.rules.iter().enumerate() {
        if !rule.conditions.matches(request) {
            continue;
        }

        let effect = match rule.effect {
            Effect::RequireServer if request.mode == AccessMode::Server => Effect::Allow,
            other => other,
        };

        return Decision {
            effect,
            matched_rule: rule.name.clone(),
            rule_index: index as i32,
            reason: rule.reason.clone(),
            max_server_duration: rule.max_server_duration,
        };
    }

    Decision::default_deny()
}
