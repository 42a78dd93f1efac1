//! Null-aware value extraction from Arrow arrays.
//!
//! Clinical form columns arrive with heterogeneous types depending on the
//! upstream converter, so every accessor here tolerates the common physical
//! encodings and returns `None` for nulls or incompatible types.

use arrow::array::{
    Array, ArrayRef, BooleanArray, Date32Array, Date64Array, Float32Array, Float64Array,
    Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::DataType;
use chrono::NaiveDate;

/// Extract a string value at `index`, handling nulls.
pub fn string_at(array: &ArrayRef, index: usize) -> Option<String> {
    if array.is_null(index) {
        return None;
    }

    match array.data_type() {
        DataType::Utf8 => {
            let string_array = array.as_any().downcast_ref::<StringArray>()?;
            Some(string_array.value(index).to_string())
        }
        _ => None,
    }
}

/// Extract a date value at `index`, handling nulls.
///
/// String columns are tried against the date formats produced by the
/// upstream form converters.
pub fn date_at(array: &ArrayRef, index: usize) -> Option<NaiveDate> {
    if array.is_null(index) {
        return None;
    }

    match array.data_type() {
        DataType::Date32 => {
            let date_array = array.as_any().downcast_ref::<Date32Array>()?;
            date_array.value_as_date(index)
        }
        DataType::Date64 => {
            let date_array = array.as_any().downcast_ref::<Date64Array>()?;
            date_array.value_as_date(index)
        }
        DataType::Utf8 => {
            let string_array = array.as_any().downcast_ref::<StringArray>()?;
            let date_str = string_array.value(index);

            for format in &["%Y-%m-%d", "%d-%m-%Y", "%Y/%m/%d", "%d/%m/%Y"] {
                if let Ok(date) = NaiveDate::parse_from_str(date_str, format) {
                    return Some(date);
                }
            }

            None
        }
        _ => None,
    }
}

/// Extract a float value at `index`, handling nulls and integer columns.
pub fn float_at(array: &ArrayRef, index: usize) -> Option<f64> {
    if array.is_null(index) {
        return None;
    }

    match array.data_type() {
        DataType::Float64 => {
            let float_array = array.as_any().downcast_ref::<Float64Array>()?;
            Some(float_array.value(index))
        }
        DataType::Float32 => {
            let float_array = array.as_any().downcast_ref::<Float32Array>()?;
            Some(f64::from(float_array.value(index)))
        }
        DataType::Int32 => {
            let int_array = array.as_any().downcast_ref::<Int32Array>()?;
            Some(f64::from(int_array.value(index)))
        }
        DataType::Int64 => {
            let int_array = array.as_any().downcast_ref::<Int64Array>()?;
            Some(int_array.value(index) as f64)
        }
        _ => None,
    }
}

/// Extract a boolean value at `index`, handling nulls.
///
/// Registry membership flags show up as booleans after Parquet conversion
/// but as `"True"`/`"False"` strings or 0/1 integers in raw exports.
pub fn bool_at(array: &ArrayRef, index: usize) -> Option<bool> {
    if array.is_null(index) {
        return None;
    }

    match array.data_type() {
        DataType::Boolean => {
            let bool_array = array.as_any().downcast_ref::<BooleanArray>()?;
            Some(bool_array.value(index))
        }
        DataType::Utf8 => {
            let string_array = array.as_any().downcast_ref::<StringArray>()?;
            Some(string_array.value(index).eq_ignore_ascii_case("true"))
        }
        DataType::Int32 => {
            let int_array = array.as_any().downcast_ref::<Int32Array>()?;
            Some(int_array.value(index) != 0)
        }
        DataType::Int64 => {
            let int_array = array.as_any().downcast_ref::<Int64Array>()?;
            Some(int_array.value(index) != 0)
        }
        _ => None,
    }
}

/// Render the value at `index` as display text, handling nulls.
///
/// Used for value-count distributions and Excel export, where every cell
/// needs a textual form regardless of the physical column type.
pub fn display_at(array: &ArrayRef, index: usize) -> Option<String> {
    if array.is_null(index) {
        return None;
    }

    match array.data_type() {
        DataType::Utf8 => string_at(array, index),
        DataType::Boolean => bool_at(array, index).map(|b| b.to_string()),
        DataType::Date32 | DataType::Date64 => date_at(array, index).map(|d| d.to_string()),
        DataType::Int32 | DataType::Int64 => {
            float_at(array, index).map(|v| format!("{v:.0}"))
        }
        DataType::Float32 | DataType::Float64 => {
            float_at(array, index).map(|v| v.to_string())
        }
        _ => None,
    }
}
