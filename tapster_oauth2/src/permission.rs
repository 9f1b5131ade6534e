//! Permissions carried by access tokens

use std::{collections::BTreeSet, convert::Infallible};

use aliri_braid::braid;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A string that cannot be a permission
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InvalidPermission {
    /// Nothing at all
    #[error("permission is empty")]
    Empty,

    /// A character outside printable ASCII, or a space, `"` or `\`
    #[error("permission has disallowed character {found:?} at byte {at}")]
    Character {
        /// Byte offset of the character
        at: usize,
        /// The character itself
        found: char,
    },
}

/// A single permission, such as `delete:drinks`
///
/// Permissions use the OAuth2 scope-token alphabet of [RFC 6749,
/// Section 3.3][scope]: printable ASCII except space, `"` and `\`.
///
/// [scope]: https://datatracker.ietf.org/doc/html/rfc6749#section-3.3
#[braid(serde, validator, ref_doc = "A borrowed [`Permission`]")]
pub struct Permission;

impl aliri_braid::Validator for Permission {
    type Error = InvalidPermission;

    fn validate(s: &str) -> Result<(), InvalidPermission> {
        if s.is_empty() {
            return Err(InvalidPermission::Empty);
        }

        match s
            .char_indices()
            .find(|&(_, c)| !c.is_ascii_graphic() || c == '"' || c == '\\')
        {
            Some((at, found)) => Err(InvalidPermission::Character { at, found }),
            None => Ok(()),
        }
    }
}

impl From<Infallible> for InvalidPermission {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

/// The `permissions` claim
///
/// Entries are opaque. Only declared requirements go through
/// [`Permission`] validation, so an odd entry in a signed token never
/// spoils the rest of the claim. A lone string is a one-element set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Granted", into = "Granted")]
pub struct Permissions(BTreeSet<String>);

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum Granted {
    One(String),
    List(Vec<String>),
}

impl From<Granted> for Permissions {
    fn from(granted: Granted) -> Self {
        match granted {
            Granted::One(p) => Self(BTreeSet::from([p])),
            Granted::List(list) => Self(list.into_iter().collect()),
        }
    }
}

impl From<Permissions> for Granted {
    fn from(Permissions(set): Permissions) -> Self {
        Self::List(set.into_iter().collect())
    }
}

impl Permissions {
    /// Whether `permission` was granted
    #[must_use]
    pub fn contains(&self, permission: &PermissionRef) -> bool {
        self.0.contains(permission.as_str())
    }

    /// Whether nothing was granted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// How many permissions were granted
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The granted permissions, sorted
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.iter().map(String::as_str)
    }
}

impl FromIterator<Permission> for Permissions {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        Self(iter.into_iter().map(Permission::take).collect())
    }
}
