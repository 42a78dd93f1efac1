//! In-memory table store for clinical form tables.
//!
//! The store is a read-only snapshot supplied by data-loading collaborators:
//! a mapping from table name to an Arrow `RecordBatch`, each patient-keyed
//! table carrying the patient identifier column.

use arrow::array::{Array, BooleanArray, StringArray};
use arrow::compute::filter_record_batch;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{CohortError, Result};

/// Mapping from table name to tabular data, preserving insertion order.
#[derive(Debug, Clone, Default)]
pub struct TableStore {
    tables: FxHashMap<String, RecordBatch>,
    order: Vec<String>,
}

impl TableStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from name/batch pairs
    pub fn from_tables<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = (S, RecordBatch)>,
        S: Into<String>,
    {
        let mut store = Self::new();
        for (name, batch) in tables {
            store.insert(name, batch);
        }
        store
    }

    /// Insert or replace a table
    pub fn insert(&mut self, name: impl Into<String>, batch: RecordBatch) {
        let name = name.into();
        if !self.tables.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tables.insert(name, batch);
    }

    /// Get a table by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RecordBatch> {
        self.tables.get(name)
    }

    /// Check whether a table is present
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Table names in insertion order
    #[must_use]
    pub fn table_names(&self) -> &[String] {
        &self.order
    }

    /// Number of tables in the store
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether the store holds no tables
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Distinct patient identifiers of a table, in first-seen order.
    ///
    /// Null identifiers are skipped. Fails if the table is absent or lacks
    /// the identifier column.
    pub fn patient_ids(&self, table: &str, patient_column: &str) -> Result<Vec<String>> {
        let batch = self
            .get(table)
            .ok_or_else(|| CohortError::TableNotFound(table.to_string()))?;
        distinct_ids(batch, patient_column)
    }
}

/// Distinct non-null values of a string identifier column, first-seen order.
pub fn distinct_ids(batch: &RecordBatch, column: &str) -> Result<Vec<String>> {
    let array = id_column(batch, column)?;

    let mut seen = FxHashSet::default();
    let mut ids = Vec::new();
    for i in 0..array.len() {
        if array.is_null(i) {
            continue;
        }
        let id = array.value(i);
        if seen.insert(id) {
            ids.push(id.to_string());
        }
    }

    Ok(ids)
}

/// Keep only the rows of `batch` whose identifier is in `ids`.
pub fn filter_by_patients(
    batch: &RecordBatch,
    column: &str,
    ids: &FxHashSet<String>,
) -> Result<RecordBatch> {
    let array = id_column(batch, column)?;
    let mask = patient_mask(array, ids);
    Ok(filter_record_batch(batch, &mask)?)
}

/// Boolean mask where true means the identifier is in the filter set.
/// Null identifiers never match.
fn patient_mask(array: &StringArray, ids: &FxHashSet<String>) -> BooleanArray {
    let mut mask_values = Vec::with_capacity(array.len());
    for i in 0..array.len() {
        let in_filter = if array.is_null(i) {
            false
        } else {
            ids.contains(array.value(i))
        };
        mask_values.push(in_filter);
    }
    BooleanArray::from(mask_values)
}

fn id_column<'a>(batch: &'a RecordBatch, column: &str) -> Result<&'a StringArray> {
    let index = batch.schema().index_of(column)?;
    batch
        .column(index)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| {
            CohortError::Arrow(ArrowError::ComputeError(format!(
                "Column '{column}' is not a string array"
            )))
        })
}
