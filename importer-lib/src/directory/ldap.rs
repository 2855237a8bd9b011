use std::collections::HashSet;

use ldap3::{LdapConn, LdapConnSettings, LdapError, Mod, Scope, SearchEntry, ldap_escape};

use super::dn::{cn_dn, ou_dn};
use super::{AccountRef, Attributes, ContainerRef, Directory};
use crate::error::DirectoryError;

const RC_NO_SUCH_OBJECT: u32 = 32;
const RC_ENTRY_ALREADY_EXISTS: u32 = 68;

/// userAccountControl: NORMAL_ACCOUNT, enabled.
const UAC_NORMAL_ACCOUNT: &str = "512";

/// Connection parameters, fixed for the whole run.
#[derive(Debug, Clone)]
pub struct LdapSettings {
    pub server: String,
    pub bind_user: String,
    pub password: String,
    pub use_tls: bool,
    pub base_dn: String,
}

pub struct LdapDirectory {
    conn: LdapConn,
    base_dn: String,
}

/// Accepts either a bare host ("dc01.example.com", "dc01:636") or a full URL.
pub fn server_url(server: &str, use_tls: bool) -> String {
    let server = server.trim();
    if server.contains("://") {
        return server.to_string();
    }
    let scheme = if use_tls { "ldaps" } else { "ldap" };
    return format!("{scheme}://{server}");
}

/// Active Directory expects the password quoted and UTF-16LE encoded.
pub fn encode_unicode_password(password: &str) -> Vec<u8> {
    format!("\"{password}\"")
        .encode_utf16()
        .flat_map(|unit| unit.to_le_bytes())
        .collect()
}

fn classify(dn: &str, err: LdapError) -> DirectoryError {
    if let LdapError::LdapResult { result } = &err {
        match result.rc {
            RC_NO_SUCH_OBJECT => {
                return DirectoryError::NoSuchObject { dn: dn.to_string() };
            }
            RC_ENTRY_ALREADY_EXISTS => {
                return DirectoryError::AlreadyExists { dn: dn.to_string() };
            }
            _ => {}
        }
    }
    err.into()
}

fn attribute(name: &str, values: &[&str]) -> (Vec<u8>, HashSet<Vec<u8>>) {
    (
        name.as_bytes().to_vec(),
        values.iter().map(|value| value.as_bytes().to_vec()).collect(),
    )
}

fn replace(name: &str, value: &[u8]) -> Mod<Vec<u8>> {
    Mod::Replace(
        name.as_bytes().to_vec(),
        HashSet::from([value.to_vec()]),
    )
}

impl LdapDirectory {
    pub fn connect(settings: &LdapSettings) -> Result<Self, DirectoryError> {
        let url = server_url(&settings.server, settings.use_tls);
        let mut conn = LdapConn::with_settings(LdapConnSettings::new(), &url)?;
        conn.simple_bind(&settings.bind_user, &settings.password)?
            .success()?;

        Ok(LdapDirectory {
            conn,
            base_dn: settings.base_dn.clone(),
        })
    }

    fn search_one(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: Vec<&str>,
    ) -> Result<Option<SearchEntry>, DirectoryError> {
        let base_scope = matches!(scope, Scope::Base);
        let result = self
            .conn
            .search(base, scope, filter, attrs)
            .map_err(|e| classify(base, e))?;
        match result.success() {
            Ok((entries, _)) => Ok(entries.into_iter().next().map(SearchEntry::construct)),
            Err(e) => match classify(base, e) {
                DirectoryError::NoSuchObject { .. } if base_scope => Ok(None),
                other => Err(other),
            },
        }
    }

    fn modify(&mut self, dn: &str, mods: Vec<Mod<Vec<u8>>>) -> Result<(), DirectoryError> {
        self.conn
            .modify(dn, mods)
            .and_then(|result| result.success())
            .map_err(|e| classify(dn, e))?;
        Ok(())
    }
}

impl Directory for LdapDirectory {
    fn base_dn(&self) -> &str {
        &self.base_dn
    }

    fn find_account(&mut self, handle: &str) -> Result<Option<AccountRef>, DirectoryError> {
        let escaped = ldap_escape(handle);
        let filter = format!("(&(objectClass=user)(|(sAMAccountName={escaped})(cn={escaped})))");
        let base = self.base_dn.clone();
        let entry = self.search_one(&base, Scope::Subtree, &filter, vec!["sAMAccountName"])?;

        Ok(entry.map(|entry| AccountRef {
            handle: entry
                .attrs
                .get("sAMAccountName")
                .and_then(|values| values.first())
                .cloned()
                .unwrap_or_else(|| handle.to_string()),
            dn: entry.dn,
        }))
    }

    fn create_account(
        &mut self,
        handle: &str,
        container: &ContainerRef,
        upn_suffix: &str,
        password: &str,
    ) -> Result<AccountRef, DirectoryError> {
        let dn = cn_dn(handle, &container.dn);
        let upn = format!("{handle}@{upn_suffix}");
        let encoded_password = encode_unicode_password(password);

        let attrs = vec![
            attribute(
                "objectClass",
                &["top", "person", "organizationalPerson", "user"],
            ),
            attribute("cn", &[handle]),
            attribute("sAMAccountName", &[handle]),
            attribute("userPrincipalName", &[upn.as_str()]),
            (
                b"unicodePwd".to_vec(),
                HashSet::from([encoded_password]),
            ),
            attribute("userAccountControl", &[UAC_NORMAL_ACCOUNT]),
        ];

        self.conn
            .add(&dn, attrs)
            .and_then(|result| result.success())
            .map_err(|e| match classify(&dn, e) {
                // rc=32 on add names the missing parent, not the new entry.
                DirectoryError::NoSuchObject { .. } => DirectoryError::NoSuchObject {
                    dn: container.dn.clone(),
                },
                other => other,
            })?;

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
        let mods = attributes
            .iter()
            .map(|(name, value)| replace(name, value.as_bytes()))
            .collect();
        self.modify(&account.dn, mods)
    }

    fn force_password_change(&mut self, account: &AccountRef) -> Result<(), DirectoryError> {
        self.modify(&account.dn, vec![replace("pwdLastSet", b"0")])
    }

    fn find_container(&mut self, dn: &str) -> Result<Option<ContainerRef>, DirectoryError> {
        let entry = self.search_one(
            dn,
            Scope::Base,
            "(|(objectClass=organizationalUnit)(objectClass=domain)(objectClass=container))",
            vec!["ou", "name"],
        )?;

        Ok(entry.map(|entry| {
            let name = entry
                .attrs
                .get("ou")
                .or_else(|| entry.attrs.get("name"))
                .and_then(|values| values.first())
                .cloned()
                .unwrap_or_else(|| entry.dn.clone());
            ContainerRef {
                dn: entry.dn,
                name,
            }
        }))
    }

    fn create_container(
        &mut self,
        name: &str,
        parent: &ContainerRef,
    ) -> Result<ContainerRef, DirectoryError> {
        let dn = ou_dn(name, &parent.dn);
        let attrs = vec![
            attribute("objectClass", &["top", "organizationalUnit"]),
            attribute("ou", &[name]),
        ];

        self.conn
            .add(&dn, attrs)
            .and_then(|result| result.success())
            .map_err(|e| match classify(&dn, e) {
                DirectoryError::NoSuchObject { .. } => DirectoryError::NoSuchObject {
                    dn: parent.dn.clone(),
                },
                other => other,
            })?;

        Ok(ContainerRef {
            dn,
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_url() {
        assert_eq!(server_url("dc01.example.com", true), "ldaps://dc01.example.com");
        assert_eq!(server_url("dc01:389", false), "ldap://dc01:389");
        assert_eq!(
            server_url("ldaps://dc01.example.com:636", false),
            "ldaps://dc01.example.com:636"
        );
    }

    #[test]
    fn test_unicode_password_encoding() {
        let encoded = encode_unicode_password("ab");
        assert_eq!(encoded, vec![b'"', 0, b'a', 0, b'b', 0, b'"', 0]);
    }
}
