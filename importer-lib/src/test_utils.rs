// Test utilities available to both unit and integration tests
// Only compiled when testing

use calamine::Data;

use crate::directory::MemoryDirectory;
use crate::directory::dn::domain_to_base_dn;
use crate::identity::InputRow;

pub const TEST_DOMAIN: &str = "example.com";
pub const TEST_PASSWORD: &str = "Welcome#2024";

/// Empty directory rooted at `DC=example,DC=com`
#[allow(dead_code)]
pub fn create_test_directory() -> MemoryDirectory {
    MemoryDirectory::new(&domain_to_base_dn(TEST_DOMAIN))
}

/// Creates an input row with a two-word display name
#[allow(dead_code)]
pub fn create_input_row(row_index: usize, surname: &str, group_year: &str) -> InputRow {
    InputRow {
        row_index,
        surname: surname.to_string(),
        password: TEST_PASSWORD.to_string(),
        full_name: format!("{surname} Студент"),
        phone: None,
        group_year: group_year.to_string(),
    }
}

/// Header plus one legacy-layout row per (surname, group/year) pair, as calamine would return them
#[allow(dead_code)]
pub fn create_legacy_sheet_rows(people: &[(&str, &str)]) -> Vec<Vec<Data>> {
    let header: Vec<Data> = [
        "cname",
        "surname",
        "password",
        "full name",
        "eng surname",
        "group/year",
        "email",
    ]
    .iter()
    .map(|title| Data::String(title.to_string()))
    .collect();

    let mut rows = vec![header];
    for (surname, group_year) in people {
        rows.push(vec![
            Data::Empty,
            Data::String(surname.to_string()),
            Data::String(TEST_PASSWORD.to_string()),
            Data::String(format!("{surname} Студент")),
            Data::Empty,
            Data::String(group_year.to_string()),
            Data::Empty,
        ]);
    }
    rows
}
