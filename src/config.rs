//! Configuration for the cohort engine.
//!
//! The engine takes one explicit `EngineConfig` at construction time rather
//! than consulting any global state. Deployments can override the canonical
//! field mappings and structural names from a JSON document; everything has
//! a working built-in default.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CohortError, Result};

/// Default patient identifier column, present on every patient-keyed table.
pub const DEFAULT_PATIENT_COLUMN: &str = "FACPATID";

/// Default demographics table name.
pub const DEFAULT_DEMOGRAPHICS_TABLE: &str = "demographics_maindata";

/// Forms a patient must have at least one row in to count as enrolled.
pub const DEFAULT_REQUIRED_FORMS: [&str; 3] = [
    "demographics_maindata",
    "diagnosis_maindata",
    "encounter_maindata",
];

/// Configuration for the cohort engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Name of the patient identifier column
    pub patient_column: String,
    /// Name of the demographics table
    pub demographics_table: String,
    /// Required form tables for enrollment validation
    pub required_forms: Vec<String>,
    /// Canonical field name -> physical column name overrides
    pub field_mappings: HashMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            patient_column: DEFAULT_PATIENT_COLUMN.to_string(),
            demographics_table: DEFAULT_DEMOGRAPHICS_TABLE.to_string(),
            required_forms: DEFAULT_REQUIRED_FORMS
                .iter()
                .map(ToString::to_string)
                .collect(),
            field_mappings: HashMap::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON document.
    ///
    /// A missing file is not an error: built-in defaults apply. A present
    /// but malformed document is a configuration error.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!(
                "Config file {} not found, using default configuration",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            CohortError::Config(format!("Invalid config {}: {e}", path.display()))
        })?;

        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}
