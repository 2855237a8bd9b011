use importer_lib::{BatchSettings, ContainerPath, InputRow};

// Re-export shared test utilities from src/test_utils.rs
pub use importer_lib::test_utils::{
    TEST_DOMAIN, create_input_row, create_legacy_sheet_rows, create_test_directory,
};

pub const BASE_DN: &str = "DC=example,DC=com";

/// Default settings for the test domain; accounts land directly in `destination`
#[allow(dead_code)]
pub fn create_settings(destination: &str) -> BatchSettings {
    BatchSettings::new(TEST_DOMAIN, ContainerPath::parse(destination))
}

/// Rows 1..=n for the given surnames, all in the same group/year
#[allow(dead_code)]
pub fn create_rows(surnames: &[&str], group_year: &str) -> Vec<InputRow> {
    surnames
        .iter()
        .enumerate()
        .map(|(index, surname)| create_input_row(index + 1, surname, group_year))
        .collect()
}
