//! Cohort construction and field resolution for neuromuscular-disease
//! patient registries.
//!
//! The engine operates on a snapshot of clinical form tables (Arrow
//! `RecordBatch`es keyed by a patient identifier column), validates which
//! patients are enrolled across required forms, and derives named patient
//! cohorts through composable, canonical-field-aware filtering.

pub mod config;
pub mod enrollment;
pub mod error;
pub mod export;
pub mod fields;
pub mod filter;
pub mod logging;
pub mod manager;
pub mod store;
pub mod summary;
pub mod values;

// Re-export the most common types for easier use
// Core types
pub use config::EngineConfig;
pub use error::{CohortError, Result};
pub use manager::{Cohort, CohortManager};
pub use store::TableStore;

// Arrow types
pub use arrow::datatypes::Schema as ArrowSchema;
pub use arrow::record_batch::RecordBatch;

// Filtering capabilities
pub use filter::{CustomFilter, Filter, FilterValue};

// Enrollment and reporting
pub use enrollment::{EnrollmentReport, EnrollmentValidator};
pub use fields::FieldResolver;
pub use summary::{AgeStats, CohortSummary, RegistryDistribution};
