//! Shared in-memory fixtures for the integration tests.
//!
//! Five patients across three required forms plus one reference table:
//! - P1: DMD, Male, DataHub (usndr = false), born 2015
//! - P2: DMD, Female, DataHub (usndr = null), no birth date
//! - P3: BMD, Female, USNDR, born 1990
//! - P4: ALS, Male, USNDR, born 1970
//! - P5: DMD, Male, DataHub, no encounter form (not enrolled)

#![allow(dead_code)]

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use cohort_engine::TableStore;

pub fn string_field(name: &str) -> Field {
    Field::new(name, DataType::Utf8, true)
}

pub fn demographics_batch() -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("FACPATID", DataType::Utf8, false),
        string_field("dstype"),
        string_field("gender"),
        Field::new("usndr", DataType::Boolean, true),
        string_field("dob"),
    ]));

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(vec!["P1", "P2", "P3", "P4", "P5"])) as ArrayRef,
            Arc::new(StringArray::from(vec![
                Some("DMD"),
                Some("DMD"),
                Some("BMD"),
                Some("ALS"),
                Some("DMD"),
            ])),
            Arc::new(StringArray::from(vec![
                Some("Male"),
                Some("Female"),
                Some("Female"),
                Some("Male"),
                Some("Male"),
            ])),
            Arc::new(BooleanArray::from(vec![
                Some(false),
                None,
                Some(true),
                Some(true),
                Some(false),
            ])),
            Arc::new(StringArray::from(vec![
                Some("2015-03-10"),
                None,
                Some("1990-07-01"),
                Some("1970-01-15"),
                None,
            ])),
        ],
    )
    .unwrap()
}

pub fn patient_table(ids: &[&str]) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![Field::new(
        "FACPATID",
        DataType::Utf8,
        false,
    )]));
    RecordBatch::try_new(
        schema,
        vec![Arc::new(StringArray::from(ids.to_vec())) as ArrayRef],
    )
    .unwrap()
}

/// A lookup table that is not patient-keyed.
pub fn lookup_batch() -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![string_field("code"), string_field("label")]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(vec!["DMD", "BMD", "ALS"])) as ArrayRef,
            Arc::new(StringArray::from(vec![
                "Duchenne muscular dystrophy",
                "Becker muscular dystrophy",
                "Amyotrophic lateral sclerosis",
            ])),
        ],
    )
    .unwrap()
}

pub fn test_store() -> TableStore {
    TableStore::from_tables([
        ("demographics_maindata", demographics_batch()),
        (
            "diagnosis_maindata",
            patient_table(&["P1", "P2", "P3", "P4", "P5"]),
        ),
        (
            "encounter_maindata",
            patient_table(&["P1", "P2", "P3", "P4", "P1"]),
        ),
        ("lookup_codes", lookup_batch()),
    ])
}

pub fn ids_of(cohort: &cohort_engine::Cohort) -> Vec<String> {
    cohort.patient_ids().to_vec()
}
