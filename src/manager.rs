//! Cohort lifecycle management.
//!
//! `CohortManager` owns one snapshot of the table store for an analysis
//! session. Cohorts are named, immutable patient-identifier sets: filtering
//! never mutates a cohort in place, it always materializes a new one from
//! its source. All filtering joins against the derived demographics table,
//! which is the demographics form augmented once with a computed AGE column.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, StringArray, UInt32Array};
use arrow::compute::{filter_record_batch, not, take};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::Local;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::EngineConfig;
use crate::enrollment::EnrollmentValidator;
use crate::error::{CohortError, Result};
use crate::export;
use crate::fields::FieldResolver;
use crate::filter::{self, CustomFilter, Filter, FilterValue};
use crate::store::{self, TableStore};
use crate::summary::{round1, AgeStats, CohortSummary, RegistryDistribution};
use crate::values;

/// Physical column name of the derived age field
const AGE_COLUMN: &str = "AGE";

/// A named, immutable set of patient identifiers
#[derive(Debug, Clone)]
pub struct Cohort {
    name: String,
    patient_ids: Vec<String>,
}

impl Cohort {
    fn new(name: impl Into<String>, mut patient_ids: Vec<String>) -> Self {
        patient_ids.sort();
        patient_ids.dedup();
        Self {
            name: name.into(),
            patient_ids,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sorted, deduplicated patient identifiers
    #[must_use]
    pub fn patient_ids(&self) -> &[String] {
        &self.patient_ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.patient_ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patient_ids.is_empty()
    }

    #[must_use]
    pub fn contains(&self, patient_id: &str) -> bool {
        self.patient_ids
            .binary_search_by(|id| id.as_str().cmp(patient_id))
            .is_ok()
    }

    /// Render the cohort as its single-identifier-column table.
    pub fn to_batch(&self, patient_column: &str) -> Result<RecordBatch> {
        let schema = Arc::new(Schema::new(vec![Field::new(
            patient_column,
            DataType::Utf8,
            false,
        )]));
        let ids = StringArray::from_iter_values(self.patient_ids.iter());
        Ok(RecordBatch::try_new(schema, vec![Arc::new(ids)])?)
    }
}

/// Manage patient cohorts with filtering and enrollment validation
pub struct CohortManager {
    store: TableStore,
    config: EngineConfig,
    resolver: FieldResolver,
    validator: EnrollmentValidator,
    cohorts: FxHashMap<String, Cohort>,
    order: Vec<String>,
    /// Demographics with derived fields, prepared once at construction
    demographics: Option<RecordBatch>,
}

impl CohortManager {
    /// Create a manager with the default configuration
    #[must_use]
    pub fn new(store: TableStore) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    /// Create a manager with an explicit configuration
    #[must_use]
    pub fn with_config(store: TableStore, config: EngineConfig) -> Self {
        let resolver = FieldResolver::new(&config.field_mappings);
        let validator = EnrollmentValidator::new(config.patient_column.clone());
        let demographics = prepare_demographics(&store, &config, &resolver);

        Self {
            store,
            config,
            resolver,
            validator,
            cohorts: FxHashMap::default(),
            order: Vec::new(),
            demographics,
        }
    }

    /// The enrollment validator bound to this manager's store
    #[must_use]
    pub fn validator(&self) -> &EnrollmentValidator {
        &self.validator
    }

    /// The table store snapshot this manager operates on
    #[must_use]
    pub fn store(&self) -> &TableStore {
        &self.store
    }

    /// Create the base cohort, by default from enrollment validation.
    ///
    /// With `validate_enrollment` off, the cohort is every distinct patient
    /// in the demographics table, which must then be present. An existing
    /// cohort under `name` is overwritten.
    pub fn create_base_cohort(
        &mut self,
        name: &str,
        require_forms: Option<&[&str]>,
        validate_enrollment: bool,
    ) -> Result<&Cohort> {
        let default_forms: Vec<&str> = self
            .config
            .required_forms
            .iter()
            .map(String::as_str)
            .collect();
        let forms = require_forms.unwrap_or(&default_forms);

        let patient_ids = if validate_enrollment {
            self.validator.enrolled_patients(&self.store, forms)?
        } else {
            self.store
                .patient_ids(&self.config.demographics_table, &self.config.patient_column)?
        };

        let cohort = self.insert_cohort(name, patient_ids);
        log::info!("Created base cohort '{name}': {} patients", cohort.len());
        Ok(cohort)
    }

    /// Create a filtered cohort from an existing cohort.
    ///
    /// The source cohort is left-joined against the derived demographics,
    /// so patients without a demographics row keep null fields and are only
    /// dropped by predicates that require a value. Filters apply in the
    /// given order and are AND-combined; a field that does not resolve is
    /// skipped with a warning. The `registry` field partitions two ways:
    /// a true/`"usndr"`/`"USNDR"` value selects rows where the registry
    /// flag is exactly true, any other value selects the rest, nulls
    /// included. An empty result is a valid cohort.
    pub fn filter_cohort(
        &mut self,
        source_cohort: &str,
        name: &str,
        filters: &[(&str, Filter)],
        custom_filter: Option<&CustomFilter>,
    ) -> Result<&Cohort> {
        let source = self
            .cohorts
            .get(source_cohort)
            .ok_or_else(|| CohortError::CohortNotFound(source_cohort.to_string()))?;
        let source_len = source.len();

        let mut frame = match &self.demographics {
            Some(demographics) => self.left_join_demographics(source.patient_ids(), demographics)?,
            None => source.to_batch(&self.config.patient_column)?,
        };

        for (field, predicate) in filters {
            if *field == "registry" {
                frame = self.apply_registry_filter(frame, predicate)?;
                continue;
            }

            let Some(column) = self.resolve_filter_field(field, &frame.schema()) else {
                log::warn!("Filter field not found: {field}");
                continue;
            };

            let mask = filter::evaluate(&frame, &column, predicate)?;
            frame = filter_record_batch(&frame, &mask)?;
        }

        if let Some(custom_filter) = custom_filter {
            let mask = custom_filter(&frame)?;
            frame = filter_record_batch(&frame, &mask)?;
        }

        let patient_ids = store::distinct_ids(&frame, &self.config.patient_column)?;
        let cohort = self.insert_cohort(name, patient_ids);

        log::info!(
            "Created cohort '{name}' from '{source_cohort}': {} patients ({} filtered out)",
            cohort.len(),
            source_len - cohort.len()
        );

        Ok(cohort)
    }

    /// Get a cohort by name
    pub fn get_cohort(&self, name: &str) -> Result<&Cohort> {
        self.cohorts
            .get(name)
            .ok_or_else(|| CohortError::CohortNotFound(name.to_string()))
    }

    /// Cohort names in creation order
    #[must_use]
    pub fn list_cohorts(&self) -> &[String] {
        &self.order
    }

    /// Get a cohort's table, optionally joined with demographics
    pub fn get_cohort_data(&self, name: &str, include_demographics: bool) -> Result<RecordBatch> {
        let cohort = self.get_cohort(name)?;

        if include_demographics {
            if let Some(demographics) = &self.demographics {
                return self.left_join_demographics(cohort.patient_ids(), demographics);
            }
        }

        cohort.to_batch(&self.config.patient_column)
    }

    /// All tables (or a requested subset) restricted to a cohort's patients.
    ///
    /// Tables without the patient identifier column are not patient-keyed
    /// (lookup/reference tables) and pass through unfiltered. Unknown
    /// requested names are skipped with a warning.
    pub fn get_filtered_tables(
        &self,
        name: &str,
        tables: Option<&[&str]>,
    ) -> Result<FxHashMap<String, RecordBatch>> {
        let cohort = self.get_cohort(name)?;
        let ids: FxHashSet<String> = cohort.patient_ids().iter().cloned().collect();

        let table_names: Vec<String> = match tables {
            Some(requested) => requested.iter().map(ToString::to_string).collect(),
            None => self.store.table_names().to_vec(),
        };

        let mut filtered = FxHashMap::default();
        for table_name in table_names {
            let Some(batch) = self.store.get(&table_name) else {
                log::warn!("Table not found: {table_name}");
                continue;
            };

            if batch
                .schema()
                .field_with_name(&self.config.patient_column)
                .is_ok()
            {
                filtered.insert(
                    table_name,
                    store::filter_by_patients(batch, &self.config.patient_column, &ids)?,
                );
            } else {
                log::debug!(
                    "Table {table_name} has no {} column, including unfiltered",
                    self.config.patient_column
                );
                filtered.insert(table_name, batch.clone());
            }
        }

        log::info!(
            "Filtered {} tables to cohort '{name}' ({} patients)",
            filtered.len(),
            ids.len()
        );
        Ok(filtered)
    }

    /// Summary statistics for a cohort.
    ///
    /// Each block is present only when its canonical field resolves against
    /// the joined demographics; without a demographics table the summary is
    /// just the name and patient count.
    pub fn get_cohort_summary(&self, name: &str) -> Result<CohortSummary> {
        let cohort = self.get_cohort(name)?;

        let Some(demographics) = &self.demographics else {
            return Ok(CohortSummary::bare(name, cohort.len()));
        };

        let merged = self.left_join_demographics(cohort.patient_ids(), demographics)?;
        let schema = merged.schema();

        let mut summary = CohortSummary::bare(name, cohort.len());

        if let Some(column) = self.resolve_filter_field("gender", &schema) {
            summary.gender_distribution = Some(value_counts(&merged, &column)?);
        }

        if let Some(column) = self.resolve_filter_field("age", &schema) {
            let index = merged.schema().index_of(&column)?;
            let array = merged.column(index);
            let ages: Vec<f64> = (0..array.len())
                .filter_map(|i| values::float_at(array, i))
                .collect();
            summary.age_stats = AgeStats::from_values(ages);
        }

        if let Some(column) = self.resolve_filter_field("disease", &schema) {
            summary.disease_distribution = Some(value_counts(&merged, &column)?);
        }

        if let Some(column) = self.resolve_filter_field("registry", &schema) {
            let index = merged.schema().index_of(&column)?;
            let array = merged.column(index);
            let usndr = (0..array.len())
                .filter(|&i| values::bool_at(array, i) == Some(true))
                .count();
            summary.registry_distribution = Some(RegistryDistribution {
                usndr,
                datahub: merged.num_rows() - usndr,
            });
        }

        Ok(summary)
    }

    /// Export a cohort's identifier table to CSV, Excel, or Parquet.
    pub fn export_cohort(&self, name: &str, output_path: impl AsRef<Path>) -> Result<()> {
        let cohort = self.get_cohort(name)?;
        let batch = cohort.to_batch(&self.config.patient_column)?;

        export::write_batch(&batch, output_path.as_ref())?;

        log::info!(
            "Exported cohort '{name}' to: {}",
            output_path.as_ref().display()
        );
        Ok(())
    }

    fn insert_cohort(&mut self, name: &str, patient_ids: Vec<String>) -> &Cohort {
        if !self.cohorts.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.cohorts
            .insert(name.to_string(), Cohort::new(name, patient_ids));
        &self.cohorts[name]
    }

    /// Resolve a filter field: exact column match first, then the resolver.
    fn resolve_filter_field(&self, field: &str, schema: &Schema) -> Option<String> {
        if schema.field_with_name(field).is_ok() {
            return Some(field.to_string());
        }
        self.resolver.resolve(field, schema)
    }

    /// Two-way registry partition with asymmetric null handling: rows where
    /// the flag is exactly true are the registry bucket, everything else is
    /// the remainder bucket.
    fn apply_registry_filter(&self, frame: RecordBatch, predicate: &Filter) -> Result<RecordBatch> {
        let Some(column) = self.resolve_filter_field("registry", &frame.schema()) else {
            log::warn!("Registry field not found for filtering");
            return Ok(frame);
        };

        let index = frame.schema().index_of(&column)?;
        let array = frame.column(index).clone();

        let usndr_mask: BooleanArray = (0..array.len())
            .map(|i| Some(values::bool_at(&array, i) == Some(true)))
            .collect();

        let mask = if registry_wants_usndr(predicate) {
            usndr_mask
        } else {
            not(&usndr_mask)?
        };

        Ok(filter_record_batch(&frame, &mask)?)
    }

    /// Left-join cohort identifiers against the demographics batch.
    ///
    /// Identifiers without a demographics row take null fields; they stay
    /// in the frame. Duplicate demographics rows per patient keep the first.
    fn left_join_demographics(
        &self,
        patient_ids: &[String],
        demographics: &RecordBatch,
    ) -> Result<RecordBatch> {
        let patient_column = &self.config.patient_column;
        let id_index = demographics.schema().index_of(patient_column)?;
        let id_array = demographics
            .column(id_index)
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| {
                CohortError::Config(format!(
                    "Demographics column '{patient_column}' is not a string column"
                ))
            })?;

        let mut row_of: FxHashMap<&str, u32> = FxHashMap::default();
        for i in 0..id_array.len() {
            if !id_array.is_null(i) {
                row_of.entry(id_array.value(i)).or_insert(i as u32);
            }
        }

        let indices = UInt32Array::from(
            patient_ids
                .iter()
                .map(|id| row_of.get(id.as_str()).copied())
                .collect::<Vec<Option<u32>>>(),
        );

        let mut fields = vec![Field::new(patient_column, DataType::Utf8, false)];
        let mut columns: Vec<ArrayRef> =
            vec![Arc::new(StringArray::from_iter_values(patient_ids.iter()))];

        for (i, field) in demographics.schema().fields().iter().enumerate() {
            if i == id_index {
                continue;
            }
            fields.push(field.as_ref().clone().with_nullable(true));
            columns.push(take(demographics.column(i).as_ref(), &indices, None)?);
        }

        Ok(RecordBatch::try_new(
            Arc::new(Schema::new(fields)),
            columns,
        )?)
    }
}

fn registry_wants_usndr(predicate: &Filter) -> bool {
    match predicate {
        Filter::Equals(FilterValue::Bool(flag)) => *flag,
        Filter::Equals(FilterValue::Str(name)) => name == "usndr" || name == "USNDR",
        _ => false,
    }
}

/// Distinct-value counts of a column, nulls excluded.
fn value_counts(
    batch: &RecordBatch,
    column: &str,
) -> Result<std::collections::BTreeMap<String, usize>> {
    let index = batch.schema().index_of(column)?;
    let array = batch.column(index);

    let mut counts = std::collections::BTreeMap::new();
    for i in 0..array.len() {
        if let Some(value) = values::display_at(array, i) {
            *counts.entry(value).or_insert(0) += 1;
        }
    }
    Ok(counts)
}

/// Prepare the derived demographics table: the demographics form with an
/// AGE column computed from the birth date when one resolves and AGE is
/// not already present. Failures here degrade to the raw table.
fn prepare_demographics(
    store: &TableStore,
    config: &EngineConfig,
    resolver: &FieldResolver,
) -> Option<RecordBatch> {
    let batch = store.get(&config.demographics_table)?.clone();

    if batch.schema().field_with_name(AGE_COLUMN).is_ok() {
        return Some(batch);
    }

    let Some(dob_column) = resolver.resolve("birth_date", &batch.schema()) else {
        return Some(batch);
    };

    match append_age_column(&batch, &dob_column) {
        Ok(with_age) => {
            log::debug!("Calculated {AGE_COLUMN} from {dob_column}");
            Some(with_age)
        }
        Err(e) => {
            log::warn!("Could not calculate age from {dob_column}: {e}");
            Some(batch)
        }
    }
}

/// Age in years as `(today - birth_date).days / 365.25`, one decimal.
/// Rows with unparseable or null birth dates get a null age.
fn append_age_column(batch: &RecordBatch, dob_column: &str) -> Result<RecordBatch> {
    let index = batch.schema().index_of(dob_column)?;
    let dob_array = batch.column(index);
    let today = Local::now().date_naive();

    let ages: Float64Array = (0..dob_array.len())
        .map(|i| {
            values::date_at(dob_array, i)
                .map(|dob| round1((today - dob).num_days() as f64 / 365.25))
        })
        .collect();

    let mut fields: Vec<Field> = batch
        .schema()
        .fields()
        .iter()
        .map(|field| field.as_ref().clone())
        .collect();
    fields.push(Field::new(AGE_COLUMN, DataType::Float64, true));

    let mut columns = batch.columns().to_vec();
    columns.push(Arc::new(ages) as ArrayRef);

    Ok(RecordBatch::try_new(
        Arc::new(Schema::new(fields)),
        columns,
    )?)
}
