use thiserror::Error;

/// Errors raised by a [`Directory`](crate::directory::Directory) backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DirectoryError {
    #[error("No such object: {dn}")]
    NoSuchObject { dn: String },

    #[error("Object already exists: {dn}")]
    AlreadyExists { dn: String },

    #[error("LDAP operation failed: {message}")]
    Ldap { message: String },
}

impl From<ldap3::LdapError> for DirectoryError {
    fn from(err: ldap3::LdapError) -> Self {
        match err {
            ldap3::LdapError::LdapResult { result } => DirectoryError::Ldap {
                message: format!("rc={} {}", result.rc, result.text),
            },
            other => DirectoryError::Ldap {
                message: other.to_string(),
            },
        }
    }
}

/// Batch-level and per-record provisioning failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProvisionError {
    #[error("Duplicate username detected for {handle}. Change the username for this user")]
    DuplicateHandle { handle: String },

    #[error("Parent path not found: {dn}")]
    ParentPathNotFound { dn: String },

    #[error("Directory operation failed for {subject}: {cause}")]
    DirectoryOperationFailed {
        subject: String,
        cause: DirectoryError,
    },

    #[error("No data about group and year")]
    NoGroupYearDetermined,

    #[error("Row {row_number} is invalid: {reason}")]
    InvalidRecord { row_number: usize, reason: String },
}

impl ProvisionError {
    /// Whether the error aborts the whole batch rather than a single row.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProvisionError::ParentPathNotFound { .. } | ProvisionError::NoGroupYearDetermined
        )
    }

    pub(crate) fn directory(subject: &str, cause: DirectoryError) -> Self {
        ProvisionError::DirectoryOperationFailed {
            subject: subject.to_string(),
            cause,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors() {
        assert!(ProvisionError::NoGroupYearDetermined.is_fatal());
        assert!(
            ProvisionError::ParentPathNotFound {
                dn: "DC=example,DC=com".to_string()
            }
            .is_fatal()
        );
        assert!(
            !ProvisionError::DuplicateHandle {
                handle: "Ivanov2024".to_string()
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_directory_failure_message_names_subject() {
        let err = ProvisionError::directory(
            "Petrov2024",
            DirectoryError::Ldap {
                message: "rc=53 unwilling to perform".to_string(),
            },
        );
        let message = err.to_string();
        assert!(message.contains("Petrov2024"));
        assert!(message.contains("unwilling to perform"));
    }
}
