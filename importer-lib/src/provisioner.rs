//! Per-record account provisioning.

use crate::directory::{Attributes, ContainerRef, Directory};
use crate::error::{DirectoryError, ProvisionError};
use crate::identity::AccountRecord;

/// What happened to one record. Existing accounts are not errors by themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    Created,
    /// The account existed and the target container predates this run.
    AlreadyProvisioned,
    /// The account existed although the target container was just created.
    DuplicateConflict,
}

/// Attributes written right after the account is created. Blank values are left out.
pub fn account_attributes(record: &AccountRecord, upn_suffix: &str) -> Attributes {
    let mut attributes = Attributes::new();
    let mut set = |name: &str, value: &str| {
        let value = value.trim();
        if !value.is_empty() {
            attributes.insert(name.to_string(), value.to_string());
        }
    };

    set("displayName", &record.full_name);
    set("mail", &record.email);
    set(
        "userPrincipalName",
        &format!("{}@{}", record.login_handle, upn_suffix),
    );
    set("sn", &record.surname);
    set("givenName", record.given_name().unwrap_or_default());
    set("telephoneNumber", record.phone.as_deref().unwrap_or_default());
    attributes
}

pub fn provision_account<D>(
    directory: &mut D,
    container: &ContainerRef,
    upn_suffix: &str,
    record: &AccountRecord,
    first_run: bool,
) -> Result<Provisioned, ProvisionError>
where
    D: Directory + ?Sized,
{
    let handle = record.login_handle.as_str();
    let fail = |cause: DirectoryError| ProvisionError::directory(handle, cause);

    if directory.find_account(handle).map_err(fail)?.is_some() {
        if first_run {
            return Ok(Provisioned::DuplicateConflict);
        }
        return Ok(Provisioned::AlreadyProvisioned);
    }

    if record.password.is_empty() {
        return Err(ProvisionError::InvalidRecord {
            row_number: record.row_number(),
            reason: format!("password for {handle} is empty"),
        });
    }

    let account = directory
        .create_account(handle, container, upn_suffix, &record.password)
        .map_err(fail)?;
    directory
        .update_attributes(&account, &account_attributes(record, upn_suffix))
        .map_err(fail)?;
    directory.force_password_change(&account).map_err(fail)?;

    Ok(Provisioned::Created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::MemoryDirectory;

    const BASE: &str = "DC=example,DC=com";

    fn record(handle: &str) -> AccountRecord {
        AccountRecord {
            row_index: 1,
            login_handle: handle.to_string(),
            surname: "Иванов".to_string(),
            password: "Secret#1".to_string(),
            full_name: "Иванов Иван Иванович".to_string(),
            phone: Some(" +7 900 000 00 00 ".to_string()),
            transliterated_surname: "Ivanov".to_string(),
            group_year: "2024".to_string(),
            email: format!("{handle}@example.com"),
        }
    }

    fn target(directory: &mut MemoryDirectory) -> ContainerRef {
        let dn = directory.seed_containers(&["Students", "CS"]);
        directory.find_container(&dn).unwrap().unwrap()
    }

    #[test]
    fn test_creates_account_with_attributes() {
        let mut directory = MemoryDirectory::new(BASE);
        let container = target(&mut directory);

        let result =
            provision_account(&mut directory, &container, "example.com", &record("Ivanov2024"), true)
                .unwrap();
        assert_eq!(result, Provisioned::Created);

        let entry = directory.account("Ivanov2024").unwrap();
        assert_eq!(entry.dn, "CN=Ivanov2024,OU=CS,OU=Students,DC=example,DC=com");
        assert!(entry.must_change_password);
        assert_eq!(entry.password.as_deref(), Some("Secret#1"));
        assert_eq!(entry.attributes["displayName"], "Иванов Иван Иванович");
        assert_eq!(entry.attributes["mail"], "Ivanov2024@example.com");
        assert_eq!(entry.attributes["userPrincipalName"], "Ivanov2024@example.com");
        assert_eq!(entry.attributes["sn"], "Иванов");
        assert_eq!(entry.attributes["givenName"], "Иван");
        assert_eq!(entry.attributes["telephoneNumber"], "+7 900 000 00 00");
    }

    #[test]
    fn test_existing_account_on_first_run_is_conflict() {
        let mut directory = MemoryDirectory::new(BASE);
        let container = target(&mut directory);
        let elsewhere = directory.seed_containers(&["Staff"]);
        directory.seed_account("Ivanov2024", &elsewhere);

        let result =
            provision_account(&mut directory, &container, "example.com", &record("Ivanov2024"), true)
                .unwrap();
        assert_eq!(result, Provisioned::DuplicateConflict);
        assert_eq!(directory.accounts_created(), 0);
    }

    #[test]
    fn test_existing_account_on_rerun_is_already_provisioned() {
        let mut directory = MemoryDirectory::new(BASE);
        let container = target(&mut directory);
        directory.seed_account("Ivanov2024", &container.dn);

        let result =
            provision_account(&mut directory, &container, "example.com", &record("Ivanov2024"), false)
                .unwrap();
        assert_eq!(result, Provisioned::AlreadyProvisioned);
        assert!(directory.account("Ivanov2024").unwrap().attributes.is_empty());
    }

    #[test]
    fn test_directory_failure_is_reported_with_handle() {
        let mut directory = MemoryDirectory::new(BASE);
        let container = target(&mut directory);
        directory.fail_account_creation("Petrov2024");

        let err =
            provision_account(&mut directory, &container, "example.com", &record("Petrov2024"), true)
                .unwrap_err();
        match err {
            ProvisionError::DirectoryOperationFailed { subject, .. } => {
                assert_eq!(subject, "Petrov2024")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_password_is_invalid() {
        let mut directory = MemoryDirectory::new(BASE);
        let container = target(&mut directory);
        let mut input = record("Sidorov2024");
        input.password.clear();

        let err = provision_account(&mut directory, &container, "example.com", &input, true)
            .unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidRecord { row_number: 2, .. }));
    }

    #[test]
    fn test_attributes_skip_missing_optional_values() {
        let mut input = record("Petrov2024");
        input.full_name = "Петров".to_string();
        input.phone = None;

        let attributes = account_attributes(&input, "corp.example.com");
        assert!(!attributes.contains_key("givenName"));
        assert!(!attributes.contains_key("telephoneNumber"));
        assert_eq!(attributes["userPrincipalName"], "Petrov2024@corp.example.com");
    }

    #[test]
    fn test_attributes_skip_blank_display_name() {
        let mut input = record("Petrov2024");
        input.full_name = "   ".to_string();
        input.phone = Some(" ".to_string());

        let attributes = account_attributes(&input, "corp.example.com");
        assert!(!attributes.contains_key("displayName"));
        assert!(!attributes.contains_key("givenName"));
        assert!(!attributes.contains_key("telephoneNumber"));
        assert_eq!(attributes["sn"], input.surname);
        assert_eq!(attributes["mail"], input.email);
    }
}
