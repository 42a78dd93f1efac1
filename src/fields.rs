//! Canonical field name resolution.
//!
//! Filter and summary callers speak in canonical semantic names such as
//! `disease` or `gender`; the physical column name varies by table and
//! deployment. Resolution is a three-tier lookup: configured mapping first,
//! then a case-insensitive direct match, then a hardcoded synonym list.
//! The tier order is intentional and configured mappings always win.

use std::collections::HashMap;

use arrow::datatypes::Schema;

/// Built-in canonical field -> physical column defaults.
///
/// `age` has no physical default: it is derived from the birth date.
const DEFAULT_MAPPINGS: &[(&str, &str)] = &[
    ("disease", "dstype"),
    ("registry", "usndr"),
    ("gender", "gender"),
    ("birth_date", "dob"),
    ("patient_id", "FACPATID"),
    ("enrollment_date", "enroldt"),
    ("encounter_date", "encntdt"),
];

/// Last-resort physical column synonyms per canonical field.
fn fallbacks(canonical_name: &str) -> &'static [&'static str] {
    match canonical_name {
        "disease" => &["dstype", "DISEASE", "DIAGNOSIS"],
        "registry" => &["usndr", "REGISTRY", "DATA_SOURCE"],
        "gender" => &["gender", "sex", "GENDER", "SEX"],
        "age" => &["AGE", "age", "AGE_YEARS"],
        _ => &[],
    }
}

/// Resolve canonical field names to actual column names
#[derive(Debug, Clone, Default)]
pub struct FieldResolver {
    mappings: HashMap<String, String>,
}

impl FieldResolver {
    /// Create a resolver with deployment-specific mapping overrides.
    #[must_use]
    pub fn new(overrides: &HashMap<String, String>) -> Self {
        Self {
            mappings: overrides.clone(),
        }
    }

    /// Resolve a canonical field name to an actual column in `schema`.
    ///
    /// Returns `None` when no tier matches; callers must treat that as
    /// "feature unavailable", not as an error.
    #[must_use]
    pub fn resolve(&self, canonical_name: &str, schema: &Schema) -> Option<String> {
        // Configured mapping first, falling back to the built-in defaults
        let mapped = self
            .mappings
            .get(canonical_name)
            .map(String::as_str)
            .or_else(|| {
                DEFAULT_MAPPINGS
                    .iter()
                    .find(|(canonical, _)| *canonical == canonical_name)
                    .map(|(_, physical)| *physical)
            });

        if let Some(mapped) = mapped {
            if schema.field_with_name(mapped).is_ok() {
                return Some(mapped.to_string());
            }
        }

        // Case-insensitive direct match against the schema
        for field in schema.fields() {
            if field.name().eq_ignore_ascii_case(canonical_name) {
                return Some(field.name().clone());
            }
        }

        // Hardcoded synonyms
        for fallback in fallbacks(canonical_name) {
            if schema.field_with_name(fallback).is_ok() {
                return Some((*fallback).to_string());
            }
        }

        None
    }

    /// Whether a canonical field is derived rather than stored.
    ///
    /// A derived field with no direct column is not truly unavailable; it
    /// may be computable from a source field (age from birth date).
    #[must_use]
    pub fn is_derived(&self, canonical_name: &str) -> bool {
        canonical_name == "age"
    }
}
