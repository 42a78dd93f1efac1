mod utils;

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use cohort_engine::{CohortManager, EngineConfig, Filter};

#[test]
fn missing_config_file_falls_back_to_defaults() {
    let config = EngineConfig::from_file(Path::new("/no/such/field_mappings.json")).unwrap();
    assert_eq!(config.patient_column, "FACPATID");
    assert_eq!(config.demographics_table, "demographics_maindata");
    assert_eq!(config.required_forms.len(), 3);
    assert!(config.field_mappings.is_empty());
}

#[test]
fn config_document_overrides_are_partial() {
    let path = std::env::temp_dir().join(format!(
        "cohort-engine-test-{}-config.json",
        std::process::id()
    ));
    fs::write(&path, r#"{"field_mappings": {"disease": "diag_code"}}"#).unwrap();

    let config = EngineConfig::from_file(&path).unwrap();
    assert_eq!(config.field_mappings["disease"], "diag_code");
    // Unspecified keys keep their defaults.
    assert_eq!(config.patient_column, "FACPATID");

    let _ = fs::remove_file(&path);
}

#[test]
fn malformed_config_documents_are_rejected() {
    let path = std::env::temp_dir().join(format!(
        "cohort-engine-test-{}-bad-config.json",
        std::process::id()
    ));
    fs::write(&path, "not json").unwrap();

    assert!(EngineConfig::from_file(&path).is_err());

    let _ = fs::remove_file(&path);
}

#[test]
fn mapping_overrides_thread_through_to_filtering() {
    // Point the disease field at the gender column: filtering on
    // "disease" must then match gender values.
    let config = EngineConfig {
        field_mappings: HashMap::from([("disease".to_string(), "gender".to_string())]),
        ..EngineConfig::default()
    };

    let mut manager = CohortManager::with_config(utils::test_store(), config);
    manager.create_base_cohort("base", None, true).unwrap();
    let remapped = manager
        .filter_cohort("base", "females", &[("disease", Filter::equals("Female"))], None)
        .unwrap();

    assert_eq!(utils::ids_of(remapped), vec!["P2", "P3"]);
}
