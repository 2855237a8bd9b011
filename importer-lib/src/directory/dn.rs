//! Distinguished name helpers.

use ldap3::dn_escape;

/// "example.com" -> "DC=example,DC=com"
pub fn domain_to_base_dn(domain: &str) -> String {
    domain
        .split('.')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| format!("DC={}", dn_escape(part)))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn ou_dn(name: &str, parent_dn: &str) -> String {
    format!("OU={},{}", dn_escape(name), parent_dn)
}

pub fn cn_dn(name: &str, parent_dn: &str) -> String {
    format!("CN={},{}", dn_escape(name), parent_dn)
}

/// Everything after the first unescaped comma, or `None` for a single RDN.
pub fn parent_dn(dn: &str) -> Option<&str> {
    let mut escaped = false;
    for (index, ch) in dn.char_indices() {
        match ch {
            '\\' if !escaped => escaped = true,
            ',' if !escaped => return Some(dn[index + 1..].trim_start()),
            _ => escaped = false,
        }
    }
    None
}

/// DNs compare case-insensitively in the directory.
pub fn normalize_dn(dn: &str) -> String {
    dn.split(',')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(",")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_to_base_dn() {
        assert_eq!(domain_to_base_dn("example.com"), "DC=example,DC=com");
        assert_eq!(domain_to_base_dn("corp.example.com."), "DC=corp,DC=example,DC=com");
    }

    #[test]
    fn test_child_dns() {
        assert_eq!(
            ou_dn("Students", "DC=example,DC=com"),
            "OU=Students,DC=example,DC=com"
        );
        assert_eq!(
            cn_dn("Ivanov2024", "OU=CS,DC=example,DC=com"),
            "CN=Ivanov2024,OU=CS,DC=example,DC=com"
        );
    }

    #[test]
    fn test_parent_dn() {
        assert_eq!(
            parent_dn("OU=CS,OU=Students,DC=example,DC=com"),
            Some("OU=Students,DC=example,DC=com")
        );
        assert_eq!(parent_dn("OU=a\\,b,DC=com"), Some("DC=com"));
        assert_eq!(parent_dn("DC=com"), None);
    }

    #[test]
    fn test_normalize_dn() {
        assert_eq!(
            normalize_dn("OU=CS, OU=Students,DC=Example,DC=com"),
            "ou=cs,ou=students,dc=example,dc=com"
        );
    }
}
