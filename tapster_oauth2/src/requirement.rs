use std::fmt;

use crate::{ClaimSet, Permission, PermissionRef};

/// What an endpoint demands of a request before admitting it
///
/// There is no "empty permission": an endpoint that needs no permission
/// must say so by choosing [`Public`][Self::Public] or
/// [`Authenticated`][Self::Authenticated].
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub enum PermissionRequirement {
    /// Admit every request without looking at its credentials
    Public,

    /// Admit any request bearing a fully verified token
    Authenticated,

    /// Admit requests bearing a verified token that grants this permission
    Permission(Permission),
}

impl PermissionRequirement {
    /// Requires the given permission
    #[inline]
    pub fn permission(permission: Permission) -> Self {
        Self::Permission(permission)
    }

    /// The permission required, if any
    #[inline]
    #[must_use]
    pub fn required_permission(&self) -> Option<&PermissionRef> {
        match self {
            Self::Permission(p) => Some(p),
            Self::Public | Self::Authenticated => None,
        }
    }

    /// Whether a token must be presented at all
    #[inline]
    #[must_use]
    pub fn requires_token(&self) -> bool {
        !matches!(self, Self::Public)
    }
}

impl From<Permission> for PermissionRequirement {
    #[inline]
    fn from(permission: Permission) -> Self {
        Self::Permission(permission)
    }
}

impl fmt::Display for PermissionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => f.write_str("public"),
            Self::Authenticated => f.write_str("authenticated"),
            Self::Permission(p) => write!(f, "permission `{p}`"),
        }
    }
}

/// The outcome of a successful authorization
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Admission {
    /// The endpoint is public; no token was examined
    Public,

    /// The request bore a verified token satisfying the requirement
    Verified(ClaimSet),
}

impl Admission {
    /// The verified claims, if a token was examined
    #[must_use]
    pub fn claims(&self) -> Option<&ClaimSet> {
        match self {
            Self::Public => None,
            Self::Verified(c) => Some(c),
        }
    }

    /// Takes the verified claims, if a token was examined
    #[must_use]
    pub fn into_claims(self) -> Option<ClaimSet> {
        match self {
            Self::Public => None,
            Self::Verified(c) => Some(c),
        }
    }
}
