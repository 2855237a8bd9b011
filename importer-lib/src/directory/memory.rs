use std::collections::{BTreeMap, HashSet};

use super::dn::{cn_dn, normalize_dn, ou_dn, parent_dn};
use super::{AccountRef, Attributes, ContainerRef, Directory};
use crate::error::DirectoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Container,
    Account,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryEntry {
    pub dn: String,
    pub name: String,
    pub kind: EntryKind,
    pub attributes: Attributes,
    pub password: Option<String>,
    pub must_change_password: bool,
}

/// In-process directory tree keyed by normalized DN.
///
/// Used by `--dry-run` and by the tests. Accounts are unique by handle across
/// the whole tree, like `sAMAccountName` in Active Directory.
#[derive(Debug, Clone)]
pub struct MemoryDirectory {
    base_dn: String,
    entries: BTreeMap<String, MemoryEntry>,
    failing_handles: HashSet<String>,
    containers_created: usize,
    accounts_created: usize,
}

impl MemoryDirectory {
    /// Directory containing only the domain root.
    pub fn new(base_dn: &str) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            normalize_dn(base_dn),
            MemoryEntry {
                dn: base_dn.to_string(),
                name: base_dn.to_string(),
                kind: EntryKind::Container,
                attributes: Attributes::new(),
                password: None,
                must_change_password: false,
            },
        );

        MemoryDirectory {
            base_dn: base_dn.to_string(),
            entries,
            failing_handles: HashSet::new(),
            containers_created: 0,
            accounts_created: 0,
        }
    }

    /// Directory whose base DN does not exist at all.
    pub fn without_base(base_dn: &str) -> Self {
        let mut directory = Self::new(base_dn);
        directory.entries.clear();
        directory
    }

    /// Seed an OU chain (outermost first) below the base DN. Returns the leaf DN.
    pub fn seed_containers(&mut self, segments: &[&str]) -> String {
        let mut current = self.base_dn.clone();
        for segment in segments {
            let dn = ou_dn(segment, &current);
            self.entries
                .entry(normalize_dn(&dn))
                .or_insert_with(|| MemoryEntry {
                    dn: dn.clone(),
                    name: segment.to_string(),
                    kind: EntryKind::Container,
                    attributes: Attributes::new(),
                    password: None,
                    must_change_password: false,
                });
            current = dn;
        }
        current
    }

    /// Seed an existing account under `container_dn`. Returns its DN.
    pub fn seed_account(&mut self, handle: &str, container_dn: &str) -> String {
        let dn = cn_dn(handle, container_dn);
        self.entries.insert(
            normalize_dn(&dn),
            MemoryEntry {
                dn: dn.clone(),
                name: handle.to_string(),
                kind: EntryKind::Account,
                attributes: Attributes::new(),
                password: None,
                must_change_password: false,
            },
        );
        dn
    }

    /// Make every later `create_account` for `handle` fail.
    pub fn fail_account_creation(&mut self, handle: &str) {
        self.failing_handles.insert(handle.to_lowercase());
    }

    pub fn entry(&self, dn: &str) -> Option<&MemoryEntry> {
        self.entries.get(&normalize_dn(dn))
    }

    pub fn account(&self, handle: &str) -> Option<&MemoryEntry> {
        self.entries
            .values()
            .find(|entry| entry.kind == EntryKind::Account && entry.name.eq_ignore_ascii_case(handle))
    }

    pub fn container_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.kind == EntryKind::Container)
            .count()
    }

    pub fn account_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.kind == EntryKind::Account)
            .count()
    }

    /// Containers created through the [`Directory`] trait (seeding excluded).
    pub fn containers_created(&self) -> usize {
        self.containers_created
    }

    pub fn accounts_created(&self) -> usize {
        self.accounts_created
    }

    fn entry_mut(&mut self, dn: &str) -> Result<&mut MemoryEntry, DirectoryError> {
        self.entries
            .get_mut(&normalize_dn(dn))
            .ok_or_else(|| DirectoryError::NoSuchObject { dn: dn.to_string() })
    }

    fn require_container(&self, dn: &str) -> Result<(), DirectoryError> {
        match self.entry(dn) {
            Some(entry) if entry.kind == EntryKind::Container => Ok(()),
            _ => Err(DirectoryError::NoSuchObject { dn: dn.to_string() }),
        }
    }
}

impl Directory for MemoryDirectory {
    fn base_dn(&self) -> &str {
        &self.base_dn
    }

    fn find_account(&mut self, handle: &str) -> Result<Option<AccountRef>, DirectoryError> {
        Ok(self.account(handle).map(|entry| AccountRef {
            dn: entry.dn.clone(),
            handle: entry.name.clone(),
        }))
    }

    fn create_account(
        &mut self,
        handle: &str,
        container: &ContainerRef,
        upn_suffix: &str,
        password: &str,
    ) -> Result<AccountRef, DirectoryError> {
        self.require_container(&container.dn)?;

        let dn = cn_dn(handle, &container.dn);
        if self.account(handle).is_some() || self.entry(&dn).is_some() {
            return Err(DirectoryError::AlreadyExists { dn });
        }
        if self.failing_handles.contains(&handle.to_lowercase()) {
            return Err(DirectoryError::Ldap {
                message: format!("rc=53 server is unwilling to create {handle}"),
            });
        }

        let mut attributes = Attributes::new();
        attributes.insert("sAMAccountName".to_string(), handle.to_string());
        attributes.insert(
            "userPrincipalName".to_string(),
            format!("{handle}@{upn_suffix}"),
        );

        self.entries.insert(
            normalize_dn(&dn),
            MemoryEntry {
                dn: dn.clone(),
                name: handle.to_string(),
                kind: EntryKind::Account,
                attributes,
                password: Some(password.to_string()),
                must_change_password: false,
            },
        );
        self.accounts_created += 1;

        Ok(AccountRef {
            dn,
            handle: handle.to_string(),
        })
    }

    fn update_attributes(
        &mut self,
        account: &AccountRef,
        attributes: &Attributes,
    ) -> Result<(), DirectoryError> {
        let entry = self.entry_mut(&account.dn)?;
        for (name, value) in attributes {
            entry.attributes.insert(name.clone(), value.clone());
        }
        Ok(())
    }

    fn force_password_change(&mut self, account: &AccountRef) -> Result<(), DirectoryError> {
        self.entry_mut(&account.dn)?.must_change_password = true;
        Ok(())
    }

    fn find_container(&mut self, dn: &str) -> Result<Option<ContainerRef>, DirectoryError> {
        if let Some(parent) = parent_dn(dn) {
            // A lookup below a missing parent is reported the way LDAP servers do.
            if self.entry(parent).is_none() && normalize_dn(dn) != normalize_dn(&self.base_dn) {
                return Err(DirectoryError::NoSuchObject {
                    dn: parent.to_string(),
                });
            }
        }

        Ok(self
            .entry(dn)
            .filter(|entry| entry.kind == EntryKind::Container)
            .map(|entry| ContainerRef {
                dn: entry.dn.clone(),
                name: entry.name.clone(),
            }))
    }

    fn create_container(
        &mut self,
        name: &str,
        parent: &ContainerRef,
    ) -> Result<ContainerRef, DirectoryError> {
        self.require_container(&parent.dn)?;

        let dn = ou_dn(name, &parent.dn);
        if self.entry(&dn).is_some() {
            return Err(DirectoryError::AlreadyExists { dn });
        }

        self.entries.insert(
            normalize_dn(&dn),
            MemoryEntry {
                dn: dn.clone(),
                name: name.to_string(),
                kind: EntryKind::Container,
                attributes: Attributes::new(),
                password: None,
                must_change_password: false,
            },
        );
        self.containers_created += 1;

        Ok(ContainerRef {
            dn,
            name: name.to_string(),
        })
    }
}
