use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::LinkError;
use crate::model::Confidence;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LinkConfig {
    pub name: String,
    #[serde(default)]
    pub apply: ApplyPolicy,
    #[serde(default)]
    pub output: OutputConfig,
    pub canonical: CanonicalConfig,
    pub sources: BTreeMap<String, SourceConfig>,
}

// ---------------------------------------------------------------------------
// Canonical snapshots
// ---------------------------------------------------------------------------

/// Fixed-layout CSV exports of the CRM's client and property tables. Unlike
/// the sources, these carry no column mapping; the export format is ours.
#[derive(Debug, Clone, Deserialize)]
pub struct CanonicalConfig {
    pub clients: String,
    pub properties: String,
    #[serde(default)]
    pub property_hints: Option<String>,
}

// ---------------------------------------------------------------------------
// Apply policy
// ---------------------------------------------------------------------------

/// Threshold for `ready_to_apply`. The importing team historically applied
/// at medium-or-better; stricter operations can require high on both sides.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplyPolicy {
    #[serde(default = "default_min_confidence")]
    pub min_confidence: Confidence,
}

impl Default for ApplyPolicy {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
        }
    }
}

fn default_min_confidence() -> Confidence {
    Confidence::Medium
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// One logical spreadsheet: a CSV file plus its column mapping.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub file: String,
    /// 1-based position of the header line within the original sheet; data
    /// row numbers are offset by it so `source_row_number` matches what a
    /// reviewer sees in the spreadsheet.
    #[serde(default = "default_header_row")]
    pub header_row: u32,
    pub columns: ColumnMapping,
}

fn default_header_row() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnMapping {
    pub full_name: String,
    pub tax_id: String,
    pub email: String,
    pub unit_reference: String,
    pub reservation_state: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub unit_portal: Option<String>,
    #[serde(default)]
    pub unit_floor: Option<String>,
    #[serde(default)]
    pub unit_letter: Option<String>,
    #[serde(default)]
    pub project_legacy_code: Option<String>,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub json: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl LinkConfig {
    pub fn from_toml(input: &str) -> Result<Self, LinkError> {
        let config: LinkConfig =
            toml::from_str(input).map_err(|e| LinkError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LinkError> {
        if self.sources.is_empty() {
            return Err(LinkError::ConfigValidation(
                "at least one source is required".into(),
            ));
        }

        match self.apply.min_confidence {
            Confidence::Medium | Confidence::High => {}
            other => {
                return Err(LinkError::ConfigValidation(format!(
                    "apply.min_confidence must be \"medium\" or \"high\", got \"{other}\""
                )));
            }
        }

        for (source_name, source) in &self.sources {
            if source.header_row == 0 {
                return Err(LinkError::ConfigValidation(format!(
                    "source '{source_name}': header_row is 1-based, got 0"
                )));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
