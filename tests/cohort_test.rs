mod utils;

use arrow::array::BooleanArray;
use cohort_engine::{CohortError, CohortManager, Filter, TableStore};

fn manager_with_base() -> CohortManager {
    let mut manager = CohortManager::new(utils::test_store());
    manager.create_base_cohort("base", None, true).unwrap();
    manager
}

#[test]
fn base_cohort_is_the_enrolled_set() {
    let manager = manager_with_base();
    let base = manager.get_cohort("base").unwrap();
    assert_eq!(utils::ids_of(base), vec!["P1", "P2", "P3", "P4"]);
}

#[test]
fn base_cohort_without_validation_takes_all_demographics_patients() {
    let mut manager = CohortManager::new(utils::test_store());
    let base = manager.create_base_cohort("all", None, false).unwrap();
    assert_eq!(base.len(), 5);
}

#[test]
fn base_cohort_without_demographics_table_fails() {
    let mut manager = CohortManager::new(TableStore::new());
    let result = manager.create_base_cohort("all", None, false);
    assert!(matches!(result, Err(CohortError::TableNotFound(_))));
}

#[test]
fn disease_filter_selects_the_dmd_patients() {
    let mut manager = manager_with_base();
    let dmd = manager
        .filter_cohort("base", "dmd", &[("disease", Filter::equals("DMD"))], None)
        .unwrap();
    assert_eq!(utils::ids_of(dmd), vec!["P1", "P2"]);
}

#[test]
fn filtered_cohorts_are_subsets_of_their_source() {
    let mut manager = manager_with_base();
    manager
        .filter_cohort(
            "base",
            "set",
            &[("disease", Filter::in_set(["DMD", "BMD"]))],
            None,
        )
        .unwrap();

    let base = utils::ids_of(manager.get_cohort("base").unwrap());
    let set = utils::ids_of(manager.get_cohort("set").unwrap());
    assert_eq!(set, vec!["P1", "P2", "P3"]);
    assert!(set.iter().all(|id| base.contains(id)));
}

#[test]
fn chained_filters_equal_one_conjunctive_call() {
    let mut manager = manager_with_base();

    manager
        .filter_cohort("base", "dmd", &[("disease", Filter::equals("DMD"))], None)
        .unwrap();
    manager
        .filter_cohort("dmd", "chained", &[("gender", Filter::equals("Female"))], None)
        .unwrap();

    manager
        .filter_cohort(
            "base",
            "combined",
            &[
                ("disease", Filter::equals("DMD")),
                ("gender", Filter::equals("Female")),
            ],
            None,
        )
        .unwrap();

    assert_eq!(
        utils::ids_of(manager.get_cohort("chained").unwrap()),
        utils::ids_of(manager.get_cohort("combined").unwrap()),
    );
    assert_eq!(utils::ids_of(manager.get_cohort("chained").unwrap()), vec!["P2"]);
}

#[test]
fn registry_partition_is_disjoint_and_exhaustive() {
    let mut manager = manager_with_base();

    // P2 has a null registry flag and must land in the DataHub bucket.
    manager
        .filter_cohort("base", "usndr", &[("registry", Filter::equals(true))], None)
        .unwrap();
    manager
        .filter_cohort("base", "datahub", &[("registry", Filter::equals(false))], None)
        .unwrap();

    let usndr = utils::ids_of(manager.get_cohort("usndr").unwrap());
    let datahub = utils::ids_of(manager.get_cohort("datahub").unwrap());
    assert_eq!(usndr, vec!["P3", "P4"]);
    assert_eq!(datahub, vec!["P1", "P2"]);

    let mut union: Vec<String> = usndr.iter().chain(datahub.iter()).cloned().collect();
    union.sort();
    assert_eq!(union, utils::ids_of(manager.get_cohort("base").unwrap()));
    assert!(usndr.iter().all(|id| !datahub.contains(id)));
}

#[test]
fn registry_accepts_the_usndr_string_spelling() {
    let mut manager = manager_with_base();
    manager
        .filter_cohort("base", "named", &[("registry", Filter::equals("USNDR"))], None)
        .unwrap();
    assert_eq!(utils::ids_of(manager.get_cohort("named").unwrap()), vec!["P3", "P4"]);
}

#[test]
fn filtering_is_idempotent() {
    let mut manager = manager_with_base();
    let filters = [("disease", Filter::equals("DMD"))];

    manager.filter_cohort("base", "first", &filters, None).unwrap();
    manager.filter_cohort("base", "second", &filters, None).unwrap();

    assert_eq!(
        utils::ids_of(manager.get_cohort("first").unwrap()),
        utils::ids_of(manager.get_cohort("second").unwrap()),
    );
}

#[test]
fn unresolvable_filter_fields_are_skipped() {
    let mut manager = manager_with_base();
    let unchanged = manager
        .filter_cohort(
            "base",
            "unchanged",
            &[("frobnicate", Filter::equals("x"))],
            None,
        )
        .unwrap();
    assert_eq!(utils::ids_of(unchanged), vec!["P1", "P2", "P3", "P4"]);
}

#[test]
fn age_filter_drops_null_birth_dates_but_cohorts_retain_them() {
    let mut manager = manager_with_base();

    // P2 has no birth date: no age value, so an age bound excludes it,
    // while the unfiltered cohort keeps it.
    let young = manager
        .filter_cohort("base", "young", &[("age", Filter::max(30))], None)
        .unwrap();
    assert_eq!(utils::ids_of(young), vec!["P1"]);

    assert!(manager.get_cohort("base").unwrap().contains("P2"));
    let summary = manager.get_cohort_summary("base").unwrap();
    let ages = summary.age_stats.unwrap();
    assert!(ages.min > 0.0);
    assert!(ages.max > ages.min);
}

#[test]
fn custom_filter_applies_after_field_filters() {
    let mut manager = manager_with_base();

    let male_rows: &cohort_engine::CustomFilter = &|frame| {
        let index = frame.schema().index_of("gender")?;
        let column = frame.column(index).clone();
        Ok((0..column.len())
            .map(|i| {
                Some(cohort_engine::values::string_at(&column, i).as_deref() == Some("Male"))
            })
            .collect::<BooleanArray>())
    };

    let males = manager
        .filter_cohort("base", "males", &[], Some(male_rows))
        .unwrap();

    assert_eq!(utils::ids_of(males), vec!["P1", "P4"]);
}

#[test]
fn empty_results_are_valid_cohorts() {
    let mut manager = manager_with_base();
    let empty = manager
        .filter_cohort("base", "none", &[("disease", Filter::equals("SMA"))], None)
        .unwrap();
    assert!(empty.is_empty());

    let summary = manager.get_cohort_summary("none").unwrap();
    assert_eq!(summary.n_patients, 0);
    assert!(summary.age_stats.is_none());
    assert!(summary.disease_distribution.unwrap().is_empty());
}

#[test]
fn unknown_cohorts_are_not_found_errors() {
    let mut manager = manager_with_base();
    assert!(matches!(
        manager.get_cohort("nope"),
        Err(CohortError::CohortNotFound(_))
    ));
    assert!(matches!(
        manager.filter_cohort("nope", "out", &[], None),
        Err(CohortError::CohortNotFound(_))
    ));
}

#[test]
fn cohorts_list_in_creation_order_and_overwrite_in_place() {
    let mut manager = manager_with_base();
    manager
        .filter_cohort("base", "dmd", &[("disease", Filter::equals("DMD"))], None)
        .unwrap();
    manager
        .filter_cohort("base", "dmd", &[("disease", Filter::equals("DMD"))], None)
        .unwrap();

    assert_eq!(manager.list_cohorts(), ["base", "dmd"]);
}

#[test]
fn cohort_data_joins_demographics_on_request() {
    let manager = manager_with_base();

    let joined = manager.get_cohort_data("base", true).unwrap();
    assert_eq!(joined.num_rows(), 4);
    assert!(joined.schema().field_with_name("gender").is_ok());
    assert!(joined.schema().field_with_name("AGE").is_ok());

    let bare = manager.get_cohort_data("base", false).unwrap();
    assert_eq!(bare.num_columns(), 1);
}

#[test]
fn filtered_tables_respect_patient_keys_and_pass_through_reference_tables() {
    let mut manager = manager_with_base();
    manager
        .filter_cohort(
            "base",
            "dmd_datahub",
            &[
                ("disease", Filter::equals("DMD")),
                ("registry", Filter::equals(false)),
            ],
            None,
        )
        .unwrap();

    let filtered = manager.get_filtered_tables("dmd_datahub", None).unwrap();

    // Encounter rows restricted to P1/P2 (P1 has two encounters).
    assert_eq!(filtered["encounter_maindata"].num_rows(), 3);
    assert_eq!(filtered["demographics_maindata"].num_rows(), 2);
    // Reference table without a patient key passes through unchanged.
    assert_eq!(filtered["lookup_codes"].num_rows(), 3);
}

#[test]
fn requested_unknown_tables_are_skipped() {
    let manager = manager_with_base();
    let filtered = manager
        .get_filtered_tables("base", Some(&["encounter_maindata", "no_such_table"]))
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert!(filtered.contains_key("encounter_maindata"));
}

#[test]
fn summary_matches_the_dmd_datahub_scenario() {
    let mut manager = manager_with_base();
    manager
        .filter_cohort("base", "dmd", &[("disease", Filter::equals("DMD"))], None)
        .unwrap();
    manager
        .filter_cohort("dmd", "dmd_datahub", &[("registry", Filter::equals(false))], None)
        .unwrap();

    // Both DMD patients are already DataHub.
    assert_eq!(
        utils::ids_of(manager.get_cohort("dmd_datahub").unwrap()),
        vec!["P1", "P2"],
    );

    let summary = manager.get_cohort_summary("dmd_datahub").unwrap();
    assert_eq!(summary.n_patients, 2);

    let diseases = summary.disease_distribution.unwrap();
    assert_eq!(diseases.len(), 1);
    assert_eq!(diseases["DMD"], 2);

    let genders = summary.gender_distribution.unwrap();
    assert_eq!(genders["Male"], 1);
    assert_eq!(genders["Female"], 1);

    let registry = summary.registry_distribution.unwrap();
    assert_eq!(registry.usndr, 0);
    assert_eq!(registry.datahub, 2);
}

#[test]
fn summary_degrades_without_a_demographics_table() {
    let mut store = TableStore::new();
    store.insert("diagnosis_maindata", utils::patient_table(&["P1", "P2"]));
    store.insert("encounter_maindata", utils::patient_table(&["P1", "P2"]));

    let mut manager = CohortManager::new(store);
    manager
        .create_base_cohort("base", Some(&["diagnosis_maindata", "encounter_maindata"]), true)
        .unwrap();

    let summary = manager.get_cohort_summary("base").unwrap();
    assert_eq!(summary.n_patients, 2);
    assert!(summary.gender_distribution.is_none());
    assert!(summary.age_stats.is_none());
    assert!(summary.registry_distribution.is_none());
}
