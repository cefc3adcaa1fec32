use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::BoltError;

// ---------------------------------------------------------------------------
// PhaseType
// ---------------------------------------------------------------------------

/// Lifecycle classification of a deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PhaseType {
    Dev,
    Lle,
    Prod,
    // Descriptors written by older tooling spell this "Unknown".
    #[serde(alias = "Unknown")]
    Unknown,
}

impl PhaseType {
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseType::Dev => "DEV",
            PhaseType::Lle => "LLE",
            PhaseType::Prod => "PROD",
            PhaseType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for PhaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// Target deployment platform of a release train.
///
/// `Structured` trains carry dated environment names and concrete release
/// versions; `Standard` trains pass environment names through and leave the
/// release version as a placeholder resolved at deploy time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Structured,
    #[default]
    Standard,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Structured => "structured",
            Platform::Standard => "standard",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = BoltError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "structured" | "datical" => Ok(Platform::Structured),
            "standard" | "non-datical" => Ok(Platform::Standard),
            other => Err(BoltError::InputFormat(format!(
                "unknown platform '{other}': expected 'structured' or 'standard'"
            ))),
        }
    }
}
