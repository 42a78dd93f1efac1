//! Cohort summary statistics.
//!
//! Every block except the patient count is optional: a block is omitted
//! when its canonical field does not resolve against the joined
//! demographics, so summaries degrade instead of erroring on sparse data.

use std::collections::BTreeMap;

use serde::Serialize;

/// Descriptive statistics for one cohort
#[derive(Debug, Clone, Serialize)]
pub struct CohortSummary {
    /// Cohort name
    pub name: String,
    /// Number of patients in the cohort
    pub n_patients: usize,
    /// Gender value counts, nulls excluded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender_distribution: Option<BTreeMap<String, usize>>,
    /// Age statistics over non-null ages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_stats: Option<AgeStats>,
    /// Disease value counts, nulls excluded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disease_distribution: Option<BTreeMap<String, usize>>,
    /// Two-way registry partition of the cohort
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_distribution: Option<RegistryDistribution>,
}

impl CohortSummary {
    /// Summary when demographics are entirely unavailable
    #[must_use]
    pub fn bare(name: impl Into<String>, n_patients: usize) -> Self {
        Self {
            name: name.into(),
            n_patients,
            gender_distribution: None,
            age_stats: None,
            disease_distribution: None,
            registry_distribution: None,
        }
    }
}

/// Age statistics, rounded to one decimal
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AgeStats {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

impl AgeStats {
    /// Compute stats over the non-null age values; `None` when there are
    /// no values to summarize.
    #[must_use]
    pub fn from_values(mut ages: Vec<f64>) -> Option<Self> {
        if ages.is_empty() {
            return None;
        }

        ages.sort_by(|a, b| a.total_cmp(b));
        let n = ages.len();

        let mean = ages.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 0 {
            (ages[n / 2 - 1] + ages[n / 2]) / 2.0
        } else {
            ages[n / 2]
        };

        Some(Self {
            mean: round1(mean),
            median: round1(median),
            min: round1(ages[0]),
            max: round1(ages[n - 1]),
        })
    }
}

/// The two mutually exclusive registry buckets.
///
/// `usndr` counts rows where the registry flag is exactly true; everything
/// else, nulls included, lands in `datahub`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RegistryDistribution {
    #[serde(rename = "USNDR")]
    pub usndr: usize,
    #[serde(rename = "DataHub")]
    pub datahub: usize,
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
