//! Typed, composable cohort filters over Arrow record batches.
//!
//! A filter is decided once at the API boundary as a tagged variant instead
//! of being inferred per call from runtime value shapes. Comparison masks
//! come from the Arrow compute kernels; null comparisons yield null mask
//! entries, which the filter kernel drops, so rows with missing values never
//! match a predicate.

use arrow::array::{Array, ArrayRef, BooleanArray, Date32Array, Datum, Float64Array, StringArray};
use arrow::compute::kernels::cmp::{eq, gt_eq, lt_eq};
use arrow::compute::{and, cast};
use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;

use crate::error::Result;
use crate::values;

/// A scalar filter operand
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl FilterValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Str(_) | Self::Bool(_) => None,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A single field predicate. Filters in a chain are AND-combined.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Exact equality
    Equals(FilterValue),
    /// Set membership
    InSet(Vec<FilterValue>),
    /// Inclusive range; either bound is optional and applied independently
    InRange {
        min: Option<FilterValue>,
        max: Option<FilterValue>,
    },
    /// Substring match on string columns
    Contains(String),
}

/// An arbitrary predicate over the working frame, applied after all field
/// filters. Receives the frame and returns a boolean mask.
pub type CustomFilter = dyn Fn(&RecordBatch) -> Result<BooleanArray>;

impl Filter {
    pub fn equals(value: impl Into<FilterValue>) -> Self {
        Self::Equals(value.into())
    }

    pub fn in_set<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FilterValue>,
    {
        Self::InSet(values.into_iter().map(Into::into).collect())
    }

    pub fn min(value: impl Into<FilterValue>) -> Self {
        Self::InRange {
            min: Some(value.into()),
            max: None,
        }
    }

    pub fn max(value: impl Into<FilterValue>) -> Self {
        Self::InRange {
            min: None,
            max: Some(value.into()),
        }
    }

    pub fn range(min: impl Into<FilterValue>, max: impl Into<FilterValue>) -> Self {
        Self::InRange {
            min: Some(min.into()),
            max: Some(max.into()),
        }
    }

    /// Inclusive two-bound range, the legacy pair form.
    pub fn between(min: impl Into<FilterValue>, max: impl Into<FilterValue>) -> Self {
        Self::range(min, max)
    }

    pub fn contains(substring: impl Into<String>) -> Self {
        Self::Contains(substring.into())
    }
}

#[derive(Debug, Clone, Copy)]
enum CmpOp {
    Eq,
    GtEq,
    LtEq,
}

/// Evaluate a filter against one column of `batch`, producing a row mask.
pub fn evaluate(batch: &RecordBatch, column: &str, filter: &Filter) -> Result<BooleanArray> {
    let index = batch.schema().index_of(column)?;
    let array = batch.column(index).clone();

    match filter {
        Filter::Equals(value) => cmp_mask(&array, column, value, CmpOp::Eq),
        Filter::InRange { min, max } => {
            let mut mask: Option<BooleanArray> = None;
            if let Some(min) = min {
                mask = Some(cmp_mask(&array, column, min, CmpOp::GtEq)?);
            }
            if let Some(max) = max {
                let max_mask = cmp_mask(&array, column, max, CmpOp::LtEq)?;
                mask = Some(match mask {
                    Some(current) => and(&current, &max_mask)?,
                    None => max_mask,
                });
            }
            // A range without bounds filters nothing
            Ok(mask.unwrap_or_else(|| BooleanArray::from(vec![true; array.len()])))
        }
        Filter::InSet(values) => Ok(in_set_mask(&array, values)),
        Filter::Contains(substring) => Ok(contains_mask(&array, column, substring)),
    }
}

fn cmp_mask(
    array: &ArrayRef,
    column: &str,
    value: &FilterValue,
    op: CmpOp,
) -> Result<BooleanArray> {
    let mask = match (array.data_type(), value) {
        (DataType::Utf8, FilterValue::Str(s)) => {
            let string_array = downcast::<StringArray>(array, column)?;
            let scalar = StringArray::new_scalar(s.clone());
            apply_cmp(op, string_array, &scalar)?
        }
        (DataType::Boolean, FilterValue::Bool(b)) if matches!(op, CmpOp::Eq) => {
            let bool_array = downcast::<BooleanArray>(array, column)?;
            let scalar = BooleanArray::new_scalar(*b);
            apply_cmp(op, bool_array, &scalar)?
        }
        (DataType::Int32 | DataType::Int64 | DataType::Float32 | DataType::Float64, _)
            if value.as_f64().is_some() =>
        {
            // Compare in f64 so integer columns accept fractional bounds
            let casted = cast(array, &DataType::Float64)?;
            let float_array = downcast::<Float64Array>(&casted, column)?;
            let scalar = Float64Array::new_scalar(value.as_f64().unwrap_or_default());
            apply_cmp(op, float_array, &scalar)?
        }
        (DataType::Date32, FilterValue::Str(s)) => {
            let Some(days) = parse_date_days(s) else {
                log::warn!("Filter value '{s}' for column '{column}' is not a date");
                return Ok(BooleanArray::from(vec![false; array.len()]));
            };
            let date_array = downcast::<Date32Array>(array, column)?;
            let scalar = Date32Array::new_scalar(days);
            apply_cmp(op, date_array, &scalar)?
        }
        _ => {
            log::warn!(
                "Filter value {value:?} does not match column '{column}' ({:?}), matching nothing",
                array.data_type()
            );
            BooleanArray::from(vec![false; array.len()])
        }
    };

    Ok(mask)
}

fn apply_cmp(
    op: CmpOp,
    lhs: &dyn Datum,
    rhs: &dyn Datum,
) -> std::result::Result<BooleanArray, ArrowError> {
    match op {
        CmpOp::Eq => eq(lhs, rhs),
        CmpOp::GtEq => gt_eq(lhs, rhs),
        CmpOp::LtEq => lt_eq(lhs, rhs),
    }
}

/// Membership mask: true where the row value equals any of `values`.
/// Null rows never match.
fn in_set_mask(array: &ArrayRef, values: &[FilterValue]) -> BooleanArray {
    (0..array.len())
        .map(|i| Some(values.iter().any(|value| matches_value(array, i, value))))
        .collect()
}

fn matches_value(array: &ArrayRef, index: usize, value: &FilterValue) -> bool {
    match value {
        FilterValue::Str(s) => {
            values::string_at(array, index).is_some_and(|row| row == *s)
        }
        FilterValue::Bool(b) => values::bool_at(array, index).is_some_and(|row| row == *b),
        FilterValue::Int(_) | FilterValue::Float(_) => {
            let Some(target) = value.as_f64() else {
                return false;
            };
            values::float_at(array, index).is_some_and(|row| row == target)
        }
    }
}

fn contains_mask(array: &ArrayRef, column: &str, substring: &str) -> BooleanArray {
    let Some(string_array) = array.as_any().downcast_ref::<StringArray>() else {
        log::warn!("Contains filter requires a string column, '{column}' is not one");
        return BooleanArray::from(vec![false; array.len()]);
    };

    string_array
        .iter()
        .map(|opt_str| opt_str.map(|s| s.contains(substring)))
        .collect()
}

fn parse_date_days(value: &str) -> Option<i32> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    i32::try_from((date - epoch).num_days()).ok()
}

fn downcast<'a, T: Array + 'static>(array: &'a ArrayRef, column: &str) -> Result<&'a T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        ArrowError::ComputeError(format!("Unexpected array type for column '{column}'")).into()
    })
}
