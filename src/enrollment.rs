//! Enrollment validation across required clinical forms.
//!
//! A patient counts as enrolled when they have at least one row in every
//! required form table. Missing form tables reduce the effective form set
//! with a warning; only a completely empty effective set is an error.

use std::collections::BTreeMap;

use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::error::{CohortError, Result};
use crate::store::TableStore;

/// Validate participant enrollment based on required forms
#[derive(Debug, Clone)]
pub struct EnrollmentValidator {
    patient_column: String,
}

/// Computed enrollment statistics across the required forms.
///
/// Derived fresh on each call, never cached.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentReport {
    /// Distinct patients appearing in any required form
    pub total_unique_patients: usize,
    /// Patients appearing in every required form
    pub enrolled_count: usize,
    /// Identifiers of the enrolled patients, sorted
    pub enrolled_patients: Vec<String>,
    /// Distinct patient count per form
    pub form_counts: BTreeMap<String, usize>,
    /// Per form, how many known patients are missing from it
    pub missing_by_form: BTreeMap<String, usize>,
}

impl EnrollmentValidator {
    /// Create a validator for the given patient identifier column
    pub fn new(patient_column: impl Into<String>) -> Self {
        Self {
            patient_column: patient_column.into(),
        }
    }

    /// Identifiers of patients present in every required form, sorted.
    ///
    /// Forms absent from the store are skipped with a warning. Fails only
    /// when none of the required forms are present.
    pub fn enrolled_patients(
        &self,
        store: &TableStore,
        required_forms: &[&str],
    ) -> Result<Vec<String>> {
        let mut patient_sets: Vec<FxHashSet<String>> = Vec::new();

        for form_name in required_forms {
            if !store.contains(form_name) {
                log::warn!("Required form not found: {form_name}");
                continue;
            }
            patient_sets.push(self.form_patients(store, form_name)?);
        }

        if patient_sets.is_empty() {
            return Err(CohortError::Config(
                "No required forms found in tables".to_string(),
            ));
        }

        let enrolled = intersect_all(&patient_sets);

        log::info!(
            "Enrollment validation: {} patients with all {} required forms",
            enrolled.len(),
            required_forms.len()
        );

        Ok(enrolled.into_iter().sorted().collect())
    }

    /// Detailed enrollment validation report.
    ///
    /// Absent forms contribute empty patient sets here instead of being
    /// skipped, so an incomplete store yields zero enrolled patients rather
    /// than an error. An empty `required_forms` yields an all-zero report.
    pub fn validate(
        &self,
        store: &TableStore,
        required_forms: &[&str],
    ) -> Result<EnrollmentReport> {
        let form_patients = self.collect_form_patients(store, required_forms)?;

        let enrolled = if form_patients.is_empty() {
            FxHashSet::default()
        } else {
            intersect_all(&form_patients.values().cloned().collect::<Vec<_>>())
        };

        let all_patients: FxHashSet<String> = form_patients
            .values()
            .flat_map(|patients| patients.iter().cloned())
            .collect();

        let report = EnrollmentReport {
            total_unique_patients: all_patients.len(),
            enrolled_count: enrolled.len(),
            enrolled_patients: enrolled.into_iter().sorted().collect(),
            form_counts: form_patients
                .iter()
                .map(|(name, patients)| (name.clone(), patients.len()))
                .collect(),
            missing_by_form: form_patients
                .iter()
                .map(|(name, patients)| {
                    (name.clone(), all_patients.difference(patients).count())
                })
                .collect(),
        };

        log::info!("Enrollment validation report:");
        log::info!("  Total unique patients: {}", report.total_unique_patients);
        log::info!("  Enrolled patients: {}", report.enrolled_count);
        for (form_name, count) in &report.form_counts {
            log::info!("  {form_name}: {count} patients");
        }

        Ok(report)
    }

    /// Per form, the sorted identifiers of known patients missing from it.
    ///
    /// The richer companion to the counts in [`EnrollmentReport`].
    pub fn missing_patients(
        &self,
        store: &TableStore,
        required_forms: &[&str],
    ) -> Result<FxHashMap<String, Vec<String>>> {
        let form_patients = self.collect_form_patients(store, required_forms)?;

        let all_patients: FxHashSet<String> = form_patients
            .values()
            .flat_map(|patients| patients.iter().cloned())
            .collect();

        Ok(form_patients
            .into_iter()
            .map(|(name, patients)| {
                let missing = all_patients
                    .difference(&patients)
                    .cloned()
                    .sorted()
                    .collect();
                (name, missing)
            })
            .collect())
    }

    fn form_patients(&self, store: &TableStore, form_name: &str) -> Result<FxHashSet<String>> {
        Ok(store
            .patient_ids(form_name, &self.patient_column)?
            .into_iter()
            .collect())
    }

    fn collect_form_patients(
        &self,
        store: &TableStore,
        required_forms: &[&str],
    ) -> Result<FxHashMap<String, FxHashSet<String>>> {
        let mut form_patients = FxHashMap::default();

        for form_name in required_forms {
            if store.contains(form_name) {
                form_patients
                    .insert((*form_name).to_string(), self.form_patients(store, form_name)?);
            } else {
                log::warn!("Form not found: {form_name}");
                form_patients.insert((*form_name).to_string(), FxHashSet::default());
            }
        }

        Ok(form_patients)
    }
}

/// Intersection across all patient sets; empty input yields the empty set.
fn intersect_all(sets: &[FxHashSet<String>]) -> FxHashSet<String> {
    let Some((first, rest)) = sets.split_first() else {
        return FxHashSet::default();
    };

    first
        .iter()
        .filter(|id| rest.iter().all(|set| set.contains(*id)))
        .cloned()
        .collect()
}
