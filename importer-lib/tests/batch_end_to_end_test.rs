//! End-to-end batches against the in-memory directory

use importer_lib::{
    BatchSettings, ContainerPath, ProvisionError, run_batch,
};

mod common;
use common::*;

#[test]
fn test_two_students_into_new_container() {
    let mut directory = create_test_directory();
    let rows = create_rows(&["Иванов", "Петров"], "2024");
    let settings = BatchSettings::new(TEST_DOMAIN, ContainerPath::parse("Students/CS"));
    assert!(!settings.group_year_containers);

    let report = run_batch(&mut directory, &rows, &settings).unwrap();

    assert_eq!(report.target_path.to_string(), "Students/CS");
    assert_eq!(
        report.resolution.created,
        [
            "OU=Students,DC=example,DC=com",
            "OU=CS,OU=Students,DC=example,DC=com"
        ]
    );
    assert_eq!(directory.containers_created(), 2);

    let handles: Vec<&str> = report
        .records
        .iter()
        .map(|record| record.login_handle.as_str())
        .collect();
    assert_eq!(handles, ["Ivanov2024", "Petrov2024"]);
    assert_eq!(directory.accounts_created(), 2);

    let ivanov = directory.account("Ivanov2024").unwrap();
    assert_eq!(ivanov.dn, "CN=Ivanov2024,OU=CS,OU=Students,DC=example,DC=com");
    assert_eq!(ivanov.attributes["mail"], "Ivanov2024@example.com");
    assert!(ivanov.must_change_password);

    let markers: Vec<&str> = report.outcomes.iter().map(|o| o.marker()).collect();
    assert_eq!(markers, ["Y", "Y"]);
    assert_eq!(report.outcomes[0].row_index, 1);
    assert_eq!(report.outcomes[1].row_index, 2);
}

#[test]
fn test_rerun_reports_already_provisioned_accounts() {
    let mut directory = create_test_directory();
    let rows = create_rows(&["Иванов", "Петров"], "2024");
    let settings = create_settings("Students/CS");

    run_batch(&mut directory, &rows, &settings).unwrap();
    let second = run_batch(&mut directory, &rows, &settings).unwrap();

    assert!(second.resolution.created.is_empty());
    assert!(!second.resolution.first_run());
    assert_eq!(second.failed(), 0);
    assert_eq!(directory.containers_created(), 2);
    assert_eq!(directory.accounts_created(), 2);
}

#[test]
fn test_duplicate_in_new_container_fails_only_that_row() {
    let mut directory = create_test_directory();
    let staff = directory.seed_containers(&["Staff"]);
    directory.seed_account("Petrov2024", &staff);

    let rows = create_rows(&["Иванов", "Петров", "Сидоров"], "2024");
    let report = run_batch(&mut directory, &rows, &create_settings("Students/CS")).unwrap();

    let markers: Vec<&str> = report.outcomes.iter().map(|o| o.marker()).collect();
    assert_eq!(markers, ["Y", "N", "Y"]);
    let message = report.outcomes[1].error_message.as_deref().unwrap();
    assert!(message.contains("Duplicate username"));
    assert!(message.contains("Petrov2024"));
    assert!(directory.account("Sidorov2024").is_some());
}

#[test]
fn test_existing_account_in_existing_container_is_not_an_error() {
    let mut directory = create_test_directory();
    let target = directory.seed_containers(&["Students", "CS"]);
    directory.seed_account("Petrov2024", &target);

    let rows = create_rows(&["Иванов", "Петров"], "2024");
    let report = run_batch(&mut directory, &rows, &create_settings("Students/CS")).unwrap();

    assert!(!report.resolution.first_run());
    assert_eq!(report.failed(), 0);
    assert_eq!(directory.accounts_created(), 1);
}

#[test]
fn test_directory_failure_does_not_stop_the_batch() {
    let mut directory = create_test_directory();
    directory.fail_account_creation("Ivanov2024");

    let rows = create_rows(&["Иванов", "Петров"], "2024");
    let report = run_batch(&mut directory, &rows, &create_settings("Students")).unwrap();

    assert!(!report.outcomes[0].success);
    assert!(report.outcomes[1].success);
    assert_eq!(report.failed(), 1);
}

#[test]
fn test_group_year_sub_containers() {
    let mut directory = create_test_directory();
    let rows = create_rows(&["Иванов"], "IT24");
    let mut settings = BatchSettings::new(TEST_DOMAIN, ContainerPath::parse("CS.Students"));
    settings.group_year_containers = true;

    let report = run_batch(&mut directory, &rows, &settings).unwrap();

    assert_eq!(report.target_path.to_string(), "Students/CS/24/IT");
    assert_eq!(
        report.resolution.container.dn,
        "OU=IT,OU=24,OU=CS,OU=Students,DC=example,DC=com"
    );
    assert_eq!(report.records[0].login_handle, "IvanovIT24");
}

#[test]
fn test_missing_domain_root_is_fatal() {
    let mut directory = importer_lib::MemoryDirectory::without_base(BASE_DN);
    let rows = create_rows(&["Иванов"], "2024");

    let err = run_batch(&mut directory, &rows, &create_settings("Students")).unwrap_err();
    assert!(matches!(err, ProvisionError::ParentPathNotFound { .. }));
    assert!(err.is_fatal());
    assert_eq!(directory.account_count(), 0);
}
