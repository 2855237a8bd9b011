//! The directory service collaborator.
//!
//! [`Directory`] is the seam between the provisioning logic and the actual
//! backend. [`LdapDirectory`] talks to a real server over LDAP/LDAPS, while
//! [`MemoryDirectory`] keeps everything in process (dry runs and tests).

use std::collections::BTreeMap;

use crate::error::DirectoryError;

pub mod dn;
mod ldap;
mod memory;

pub use ldap::{LdapDirectory, LdapSettings, encode_unicode_password, server_url};
pub use memory::{EntryKind, MemoryDirectory, MemoryEntry};

/// Attribute name -> single value. Ordered so updates are applied deterministically.
pub type Attributes = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRef {
    pub dn: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRef {
    pub dn: String,
    pub handle: String,
}

pub trait Directory {
    /// DN of the domain root all lookups are scoped to.
    fn base_dn(&self) -> &str;

    fn find_account(&mut self, handle: &str) -> Result<Option<AccountRef>, DirectoryError>;

    fn create_account(
        &mut self,
        handle: &str,
        container: &ContainerRef,
        upn_suffix: &str,
        password: &str,
    ) -> Result<AccountRef, DirectoryError>;

    fn update_attributes(
        &mut self,
        account: &AccountRef,
        attributes: &Attributes,
    ) -> Result<(), DirectoryError>;

    fn force_password_change(&mut self, account: &AccountRef) -> Result<(), DirectoryError>;

    fn find_container(&mut self, dn: &str) -> Result<Option<ContainerRef>, DirectoryError>;

    fn create_container(
        &mut self,
        name: &str,
        parent: &ContainerRef,
    ) -> Result<ContainerRef, DirectoryError>;
}
