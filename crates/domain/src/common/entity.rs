use serde::{Deserialize, Serialize};

/// Characters allowed in tenant and trigger identifiers besides alphanumerics.
const ID_EXTRA_CHARS: [char; 3] = ['-', '_', '.'];

fn validate_id(value: &str, label: &'static str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{label} must not be empty"));
    }
    if !value
        .chars()
        .all(|c| c.is_alphanumeric() || ID_EXTRA_CHARS.contains(&c))
    {
        return Err(format!(
            "{label} must contain only alphanumerics, dashes, underscores, dots"
        ));
    }
    Ok(())
}

/// Tenant owning triggers, alerts and actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn validate(&self) -> Result<(), String> {
        validate_id(&self.0, "tenant ID")
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier of a trigger within its tenant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerId(pub String);

impl TriggerId {
    pub fn validate(&self) -> Result<(), String> {
        validate_id(&self.0, "trigger ID")
    }
}

impl std::fmt::Display for TriggerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which condition set of a trigger is currently armed.
///
/// - `Firing`: watching for a problem.
/// - `Autoresolve`: a problem was confirmed, watching for recovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    #[default]
    Firing,
    Autoresolve,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Firing => "FIRING",
            Self::Autoresolve => "AUTORESOLVE",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Numeric rank used for minimum-severity filtering.
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Critical => 3,
        }
    }

    /// Create from a rank. Unknown values default to Low.
    pub fn from_u8(n: u8) -> Self {
        match n {
            1 => Self::Medium,
            2 => Self::High,
            3 => Self::Critical,
            _ => Self::Low,
        }
    }

    /// Lowercase label used for metrics and logs.
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}
