//! Release-train descriptor synthesis.
//!
//! A descriptor is the JSON document a deployment platform reads to stand up
//! a release train: which component versions ship together, into which
//! environments, and with which lifecycle phase per environment.

use crate::classifier::classify;
use crate::error::{BoltError, Result};
use crate::io;
use crate::types::{PhaseType, Platform};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Release version left for the deployment platform to resolve.
pub const RELEASE_BRANCH_PLACEHOLDER: &str = "${releaseBranch}";

const MONTH_ABBREVIATIONS: [(&str, &str); 12] = [
    ("01", "JAN"),
    ("02", "FEB"),
    ("03", "MAR"),
    ("04", "APR"),
    ("05", "MAY"),
    ("06", "JUNE"),
    ("07", "JULY"),
    ("08", "AUG"),
    ("09", "SEPT"),
    ("10", "OCT"),
    ("11", "NOV"),
    ("12", "DEC"),
];

// ---------------------------------------------------------------------------
// Descriptor document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSection {
    pub integrated_release_environments: Vec<String>,
    pub release_components: Vec<String>,
    pub disable_release_train_pre_deploy_gates: bool,
    pub disable_all_component_release_gates: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentEntry {
    pub environment_name: String,
    pub phase_type: PhaseType,
}

/// The document written to disk. Field order is the on-disk key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDescriptor {
    pub component: ComponentSection,
    pub environments: Vec<EnvironmentEntry>,
}

// ---------------------------------------------------------------------------
// DescriptorRequest
// ---------------------------------------------------------------------------

/// User-supplied identifiers a descriptor is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorRequest {
    pub ait: String,
    pub spk: String,
    pub ops_number: String,
    pub train_type: String,
    /// `YYYY.MM.DD`.
    pub release_date: String,
    pub components: Vec<String>,
    pub environments: Vec<String>,
    #[serde(default)]
    pub platform: Platform,
}

impl DescriptorRequest {
    fn validate(&self) -> Result<()> {
        let required = [
            ("ait", &self.ait),
            ("spk", &self.spk),
            ("ops_number", &self.ops_number),
            ("train_type", &self.train_type),
            ("release_date", &self.release_date),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(BoltError::InputFormat(format!("{field} is required")));
            }
        }
        Ok(())
    }

    /// Suffix appended to every environment display name.
    fn environment_suffix(&self) -> Result<String> {
        let date = ReleaseDate::parse(&self.release_date)?;
        Ok(match self.platform {
            Platform::Structured => format!("FOR{}{}", date.month_abbreviation(), date.year2),
            Platform::Standard => String::new(),
        })
    }

    fn release_component(&self, component: &str) -> String {
        let name = component.trim().to_lowercase();
        match self.platform {
            Platform::Structured => format!("{} {} {}:1", self.spk, name, self.release_date),
            Platform::Standard => {
                format!("{} {} {}:1", self.spk, name, RELEASE_BRANCH_PLACEHOLDER)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ReleaseDate
// ---------------------------------------------------------------------------

struct ReleaseDate<'a> {
    year2: &'a str,
    month: &'a str,
}

impl<'a> ReleaseDate<'a> {
    fn parse(raw: &'a str) -> Result<Self> {
        let mut parts = raw.split('.');
        let year = parts.next().unwrap_or_default();
        let month = parts.next().ok_or_else(|| {
            BoltError::InputFormat(format!(
                "release date '{raw}' must look like YYYY.MM.DD (no '.'-delimited month)"
            ))
        })?;
        // Last two characters of the year, or fewer if the year is shorter.
        let start = year
            .char_indices()
            .rev()
            .nth(1)
            .map(|(i, _)| i)
            .unwrap_or(0);
        Ok(Self {
            year2: &year[start..],
            month,
        })
    }

    fn month_abbreviation(&self) -> &'static str {
        month_abbreviation(self.month)
    }
}

/// Month abbreviation for a two-digit month; unrecognized months map to "".
pub fn month_abbreviation(month: &str) -> &'static str {
    MONTH_ABBREVIATIONS
        .iter()
        .find(|(num, _)| *num == month)
        .map(|(_, abbr)| *abbr)
        .unwrap_or("")
}

// ---------------------------------------------------------------------------
// Synthesis
// ---------------------------------------------------------------------------

/// Build the descriptor for `req`.
///
/// Ordering of components and environments follows the request. Empty
/// tokens are kept as-is.
pub fn synthesize(req: &DescriptorRequest) -> Result<ReleaseDescriptor> {
    req.validate()?;
    let suffix = req.environment_suffix()?;

    // One derivation feeds both environment lists so they cannot drift apart.
    let display_names: Vec<String> = req
        .environments
        .iter()
        .map(|env| format!("{}{suffix}", env.trim()))
        .collect();

    let environments = req
        .environments
        .iter()
        .zip(&display_names)
        .map(|(token, name)| EnvironmentEntry {
            environment_name: name.clone(),
            phase_type: classify(token),
        })
        .collect();

    let release_components = req
        .components
        .iter()
        .map(|c| req.release_component(c))
        .collect();

    Ok(ReleaseDescriptor {
        component: ComponentSection {
            integrated_release_environments: display_names,
            release_components,
            disable_release_train_pre_deploy_gates: false,
            disable_all_component_release_gates: false,
        },
        environments,
    })
}

/// File name the descriptor for `req` is written under.
pub fn descriptor_filename(req: &DescriptorRequest) -> String {
    let db = match req.platform {
        Platform::Structured => "DB_",
        Platform::Standard => "",
    };
    format!(
        "{}_{}_OPSERVICES_{}_{}{}_Release_Train_{}.json",
        req.ait, req.spk, req.ops_number, db, req.train_type, req.release_date
    )
}

/// Synthesize and write the descriptor into `dir`. Returns the written path.
pub fn write_descriptor(dir: &Path, req: &DescriptorRequest) -> Result<PathBuf> {
    let descriptor = synthesize(req)?;
    let path = dir.join(descriptor_filename(req));
    io::write_json(&path, &descriptor)?;
    tracing::info!(path = %path.display(), platform = %req.platform, "descriptor written");
    Ok(path)
}

/// Parse an existing descriptor file.
pub fn read_descriptor(path: &Path) -> Result<ReleaseDescriptor> {
    let data = std::fs::read_to_string(path)?;
    let descriptor = serde_json::from_str(&data)?;
    Ok(descriptor)
}

/// Parse `path` and rewrite it in canonical form (key order, 4-space indent).
pub fn normalize_descriptor_file(path: &Path) -> Result<ReleaseDescriptor> {
    let descriptor = read_descriptor(path)?;
    io::write_json(path, &descriptor)?;
    Ok(descriptor)
}
