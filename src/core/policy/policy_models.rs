// Policy domain models - per-guild moderation configuration.
//
// These are pure domain types with no Discord dependencies.
// The storage schema lives in `PolicyRecord`; `GuildPolicy` is the in-memory
// shape. The codec between them is the only place the two meet, so they can
// diverge without breaking stored documents.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Moderation posture for a guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Attachment inspection disabled.
    #[default]
    Off,
    /// React with an approval or rejection marker, never delete.
    AutoFlag,
    /// Delete messages carrying disapproved attachments.
    AutoDelete,
}

impl Mode {
    /// Parse a user-supplied mode name. Case-insensitive.
    pub fn parse(name: &str) -> Result<Self, PolicyDataError> {
        let trimmed = name.trim();
        if trimmed.eq_ignore_ascii_case("off") {
            Ok(Mode::Off)
        } else if trimmed.eq_ignore_ascii_case("autoflag") {
            Ok(Mode::AutoFlag)
        } else if trimmed.eq_ignore_ascii_case("autodelete") {
            Ok(Mode::AutoDelete)
        } else {
            Err(PolicyDataError::InvalidModeName(name.to_string()))
        }
    }

    /// Numeric value used in the stored document.
    pub fn as_u8(self) -> u8 {
        match self {
            Mode::Off => 0,
            Mode::AutoFlag => 1,
            Mode::AutoDelete => 2,
        }
    }

    /// Decode the stored numeric value, rejecting anything outside the
    /// known domain.
    pub fn from_u8(value: u8) -> Result<Self, PolicyDataError> {
        match value {
            0 => Ok(Mode::Off),
            1 => Ok(Mode::AutoFlag),
            2 => Ok(Mode::AutoDelete),
            other => Err(PolicyDataError::InvalidModeValue(other)),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Off => write!(f, "OFF"),
            Mode::AutoFlag => write!(f, "AUTOFLAG"),
            Mode::AutoDelete => write!(f, "AUTODELETE"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PolicyDataError {
    #[error("Invalid mode name: {0}")]
    InvalidModeName(String),

    #[error("Stored mode value {0} is outside the known domain")]
    InvalidModeValue(u8),

    #[error("Malformed policy document: {0}")]
    MalformedDocument(#[from] serde_json::Error),
}

/// Per-guild moderation policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildPolicy {
    pub mode: Mode,
    /// Channels exempt from attachment inspection.
    pub ignored_channels: HashSet<u64>,
    /// Roles permitted to run configuration commands. Empty = unrestricted.
    pub authorized_roles: HashSet<u64>,
    /// Glob-style content-type patterns that approve an attachment.
    /// Ordered, but matching is any-match so order carries no precedence.
    pub allowed_patterns: Vec<String>,
}

impl Default for GuildPolicy {
    fn default() -> Self {
        Self {
            mode: Mode::Off,
            ignored_channels: HashSet::new(),
            authorized_roles: HashSet::new(),
            allowed_patterns: default_patterns(),
        }
    }
}

/// Content types approved out of the box.
pub fn default_patterns() -> Vec<String> {
    ["video/*", "image/*", "audio/*", "text/*"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl GuildPolicy {
    /// Whether a sniffed content type is approved under this policy.
    ///
    /// True iff any pattern matches. An emptied pattern list approves
    /// nothing (fail closed).
    pub fn approves(&self, content_type: &str) -> bool {
        self.allowed_patterns
            .iter()
            .any(|p| pattern_matches(p, content_type))
    }

    /// Authorization guard for configuration commands.
    ///
    /// True if `authorized_roles` is empty (unrestricted) or the invoker
    /// holds at least one of them. Pure, no I/O.
    pub fn authorizes(&self, invoker_roles: &[u64]) -> bool {
        self.authorized_roles.is_empty()
            || invoker_roles
                .iter()
                .any(|r| self.authorized_roles.contains(r))
    }
}

/// Glob-style content-type match: exact, trailing-`*` prefix
/// (`image/*` matches `image/png`), or leading-`*` suffix.
pub fn pattern_matches(pattern: &str, content_type: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix('*') {
        content_type.starts_with(prefix)
    } else if let Some(suffix) = pattern.strip_prefix('*') {
        content_type.ends_with(suffix)
    } else {
        pattern == content_type
    }
}

/// Storage schema for a guild policy document.
///
/// Field names and the integer mode encoding match the deployed database,
/// so this struct must not change shape casually.
#[derive(Debug, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub mode: u8,
    pub ignores: Vec<u64>,
    pub use_roles: Vec<u64>,
    pub allowed_mimes: Vec<String>,
}

/// Encode a policy into the string document stored per guild.
pub fn encode_policy(policy: &GuildPolicy) -> Result<String, PolicyDataError> {
    let mut ignores: Vec<u64> = policy.ignored_channels.iter().copied().collect();
    let mut use_roles: Vec<u64> = policy.authorized_roles.iter().copied().collect();
    // Stable ordering keeps documents diffable across writes.
    ignores.sort_unstable();
    use_roles.sort_unstable();

    let record = PolicyRecord {
        mode: policy.mode.as_u8(),
        ignores,
        use_roles,
        allowed_mimes: policy.allowed_patterns.clone(),
    };
    Ok(serde_json::to_string(&record)?)
}

/// Decode a stored document, validating the mode domain.
pub fn decode_policy(document: &str) -> Result<GuildPolicy, PolicyDataError> {
    let record: PolicyRecord = serde_json::from_str(document)?;
    Ok(GuildPolicy {
        mode: Mode::from_u8(record.mode)?,
        ignored_channels: record.ignores.into_iter().collect(),
        authorized_roles: record.use_roles.into_iter().collect(),
        allowed_patterns: record.allowed_mimes,
    })
}
