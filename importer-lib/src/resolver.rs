//! Get-or-create resolution of the destination OU chain.

use std::fmt;

use log::info;

use crate::directory::dn::ou_dn;
use crate::directory::{ContainerRef, Directory};
use crate::error::{DirectoryError, ProvisionError};

/// OU segments, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContainerPath {
    segments: Vec<String>,
}

impl ContainerPath {
    /// Parse a user supplied destination.
    ///
    /// `Students/CS` is read root-to-leaf. `CS.Students` is read leaf-to-root
    /// and reversed. Empty segments are dropped in both forms.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let segments: Vec<&str> = if input.contains('/') {
            input.split('/').collect()
        } else {
            input.split('.').rev().collect()
        };
        Self::from_segments(segments)
    }

    pub fn from_segments<I, S>(outermost_first: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ContainerPath {
            segments: outermost_first
                .into_iter()
                .map(|segment| segment.as_ref().trim().to_string())
                .filter(|segment| !segment.is_empty())
                .collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn leaf(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// A new path with `segment` appended below the current leaf.
    pub fn join(&self, segment: &str) -> Self {
        let mut joined = self.clone();
        let segment = segment.trim();
        if !segment.is_empty() {
            joined.segments.push(segment.to_string());
        }
        joined
    }
}

impl fmt::Display for ContainerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// A group/year token such as `IT24`: the last two characters are the year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupYear {
    pub group: String,
    pub year: String,
}

impl GroupYear {
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }

        let chars: Vec<char> = token.chars().collect();
        let split_at = chars.len().saturating_sub(2);
        Some(GroupYear {
            group: chars[..split_at].iter().collect(),
            year: chars[split_at..].iter().collect(),
        })
    }

    /// `<year>/<group>` below `path`. The group level is skipped when empty.
    pub fn extend(&self, path: &ContainerPath) -> ContainerPath {
        path.join(&self.year).join(&self.group)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub container: ContainerRef,
    /// Whether the innermost container already existed before this run.
    pub leaf_preexisted: bool,
    /// DNs of the containers this run created, outermost first.
    pub created: Vec<String>,
}

impl Resolution {
    /// A batch whose target container is new treats any existing account
    /// with the same handle as a conflict rather than as already provisioned.
    pub fn first_run(&self) -> bool {
        !self.leaf_preexisted
    }
}

pub fn resolve_container<D>(
    directory: &mut D,
    base_dn: &str,
    path: &ContainerPath,
) -> Result<Resolution, ProvisionError>
where
    D: Directory + ?Sized,
{
    let mut current = match directory.find_container(base_dn) {
        Ok(Some(base)) => base,
        Ok(None) | Err(DirectoryError::NoSuchObject { .. }) => {
            return Err(ProvisionError::ParentPathNotFound {
                dn: base_dn.to_string(),
            });
        }
        Err(e) => return Err(ProvisionError::directory(base_dn, e)),
    };

    let mut leaf_preexisted = true;
    let mut created = Vec::new();

    for segment in path.segments() {
        let dn = ou_dn(segment, &current.dn);
        let existing = match directory.find_container(&dn) {
            Ok(found) => found,
            Err(DirectoryError::NoSuchObject { .. }) => {
                return Err(ProvisionError::ParentPathNotFound { dn: current.dn });
            }
            Err(e) => return Err(ProvisionError::directory(&dn, e)),
        };

        current = match existing {
            Some(container) => {
                info!("OU \"{segment}\" already exists");
                leaf_preexisted = true;
                container
            }
            None => match directory.create_container(segment, &current) {
                Ok(container) => {
                    info!("OU \"{segment}\" created successfully");
                    leaf_preexisted = false;
                    created.push(container.dn.clone());
                    container
                }
                Err(DirectoryError::NoSuchObject { .. }) => {
                    return Err(ProvisionError::ParentPathNotFound { dn: current.dn });
                }
                Err(DirectoryError::AlreadyExists { .. }) => {
                    // Created concurrently between lookup and add.
                    let container = directory
                        .find_container(&dn)
                        .map_err(|e| ProvisionError::directory(&dn, e))?
                        .ok_or_else(|| ProvisionError::ParentPathNotFound {
                            dn: current.dn.clone(),
                        })?;
                    info!("OU \"{segment}\" already exists");
                    leaf_preexisted = true;
                    container
                }
                Err(e) => return Err(ProvisionError::directory(&dn, e)),
            },
        };
    }

    Ok(Resolution {
        container: current,
        leaf_preexisted,
        created,
    })
}
