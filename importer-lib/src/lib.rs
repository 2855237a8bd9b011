#![allow(clippy::needless_return)]

pub mod batch;
pub mod directory;
pub mod error;
pub mod identity;
pub mod provisioner;
pub mod resolver;
pub mod utils;
mod workbook;

// Test utilities - only compiled when testing or with test feature
// #[cfg(test)] alone doesn't work for integration tests (they're external crates)
// The feature flag makes it available to integration tests via dev-dependencies
#[cfg(any(test, feature = "test"))]
pub mod test_utils;

pub use batch::{BatchReport, BatchSettings, ProvisioningOutcome, run_batch};
pub use directory::{Directory, LdapDirectory, LdapSettings, MemoryDirectory};
pub use error::{DirectoryError, ProvisionError};
pub use identity::{AccountRecord, Direction, InputRow, Script, Transliterator, derive_identity};
pub use provisioner::{Provisioned, provision_account};
pub use resolver::{ContainerPath, GroupYear, Resolution, resolve_container};
pub use workbook::{
    ColumnLayout, LayoutPreset, SourceSheet, SourceWorkbook, cell_to_string, extract_rows,
    output_path, read_input_rows, read_source_workbook, write_outcomes,
};
