//! The batch pipeline: derive identities, resolve the target OU once, then
//! provision every record without letting one bad row stop the rest.

use log::{error, info};

use crate::directory::Directory;
use crate::error::ProvisionError;
use crate::identity::{AccountRecord, InputRow, Transliterator, derive_identity};
use crate::provisioner::{Provisioned, provision_account};
use crate::resolver::{ContainerPath, GroupYear, Resolution, resolve_container};

/// Per-row result, written back to the outcome workbook.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisioningOutcome {
    pub row_index: usize,
    pub success: bool,
    pub error_message: Option<String>,
}

impl ProvisioningOutcome {
    pub fn succeeded(row_index: usize) -> Self {
        ProvisioningOutcome {
            row_index,
            success: true,
            error_message: None,
        }
    }

    pub fn failed(row_index: usize, error: &ProvisionError) -> Self {
        ProvisioningOutcome {
            row_index,
            success: false,
            error_message: Some(format!("Error {error}")),
        }
    }

    /// `Y` / `N` marker for the success column.
    pub fn marker(&self) -> &'static str {
        if self.success { "Y" } else { "N" }
    }
}

#[derive(Debug, Clone)]
pub struct BatchSettings {
    /// Mail domain; also the source of the `DC=` base DN.
    pub domain: String,
    pub upn_suffix: String,
    pub destination: ContainerPath,
    /// Place accounts under `<destination>/<year>/<group>`. Off by default.
    pub group_year_containers: bool,
    pub transliterator: Transliterator,
}

impl BatchSettings {
    pub fn new(domain: &str, destination: ContainerPath) -> Self {
        BatchSettings {
            domain: domain.to_string(),
            upn_suffix: domain.to_string(),
            destination,
            group_year_containers: false,
            transliterator: Transliterator::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub records: Vec<AccountRecord>,
    pub outcomes: Vec<ProvisioningOutcome>,
    pub resolution: Resolution,
    pub target_path: ContainerPath,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.success).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Group/year token of the last processed row that carries one.
pub fn batch_group_year(records: &[AccountRecord]) -> Option<String> {
    records
        .iter()
        .rev()
        .map(|record| record.group_year.trim())
        .find(|token| !token.is_empty())
        .map(str::to_string)
}

/// Full destination path for the batch, including the group/year levels when enabled.
pub fn target_path(settings: &BatchSettings, group_year: &str) -> ContainerPath {
    if !settings.group_year_containers {
        return settings.destination.clone();
    }
    match GroupYear::parse(group_year) {
        Some(parsed) => parsed.extend(&settings.destination),
        None => settings.destination.clone(),
    }
}

pub fn run_batch<D>(
    directory: &mut D,
    rows: &[InputRow],
    settings: &BatchSettings,
) -> Result<BatchReport, ProvisionError>
where
    D: Directory + ?Sized,
{
    let records: Vec<AccountRecord> = rows
        .iter()
        .map(|row| derive_identity(row, &settings.domain, &settings.transliterator))
        .collect();
    info!("User data collected: {} record(s)", records.len());

    let Some(group_year) = batch_group_year(&records) else {
        error!("No data about group and year");
        return Err(ProvisionError::NoGroupYearDetermined);
    };

    let path = target_path(settings, &group_year);
    let base_dn = directory.base_dn().to_string();
    let resolution = resolve_container(directory, &base_dn, &path).inspect_err(|e| {
        error!("Unable to resolve destination OU \"{path}\": {e}");
    })?;
    let first_run = resolution.first_run();
    info!(
        "Target OU {} resolved (first run: {first_run})",
        resolution.container.dn
    );

    let mut outcomes = Vec::with_capacity(records.len());
    for record in &records {
        let handle = &record.login_handle;
        let result = provision_account(
            directory,
            &resolution.container,
            &settings.upn_suffix,
            record,
            first_run,
        )
        .and_then(|provisioned| match provisioned {
            Provisioned::DuplicateConflict => Err(ProvisionError::DuplicateHandle {
                handle: handle.clone(),
            }),
            other => Ok(other),
        });

        let outcome = match result {
            Ok(Provisioned::AlreadyProvisioned) => {
                info!("User \"{handle}\" already exists");
                ProvisioningOutcome::succeeded(record.row_index)
            }
            Ok(_) => {
                info!("User \"{handle}\" created successfully");
                ProvisioningOutcome::succeeded(record.row_index)
            }
            Err(e) => {
                error!("User {handle} was not created: {e}");
                ProvisioningOutcome::failed(record.row_index, &e)
            }
        };
        outcomes.push(outcome);
    }

    let report = BatchReport {
        records,
        outcomes,
        resolution,
        target_path: path,
    };
    info!(
        "Batch finished: {} succeeded, {} failed",
        report.succeeded(),
        report.failed()
    );
    Ok(report)
}
