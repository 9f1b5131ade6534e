use serde::{Deserialize, Serialize};
use tapster::{
    clock::UnixTime,
    jwt::{self, CoreClaims},
};

use crate::{Permissions, PermissionRef};

/// The claims of a token that has passed full verification
///
/// A `ClaimSet` cannot be constructed or deserialized directly. The only
/// way to obtain one is from a successful call to
/// [`Authority::verify()`][crate::Authority::verify] or
/// [`Authority::authorize()`][crate::Authority::authorize].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[must_use]
pub struct ClaimSet {
    iss: jwt::Issuer,
    aud: jwt::Audiences,
    exp: UnixTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    permissions: Option<Permissions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<jwt::Subject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    iat: Option<UnixTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    azp: Option<String>,
}

impl ClaimSet {
    /// The issuer that minted the token
    #[must_use]
    pub fn iss(&self) -> &jwt::IssuerRef {
        &self.iss
    }

    /// The audiences the token was minted for
    pub fn aud(&self) -> &jwt::Audiences {
        &self.aud
    }

    /// The instant at which the token stops being accepted
    #[must_use]
    pub fn exp(&self) -> UnixTime {
        self.exp
    }

    /// The permissions granted, or `None` when the token has no
    /// `permissions` claim at all
    #[must_use]
    pub fn permissions(&self) -> Option<&Permissions> {
        self.permissions.as_ref()
    }

    /// Whether the token grants the given permission
    #[must_use]
    pub fn has_permission(&self, permission: &PermissionRef) -> bool {
        self.permissions
            .as_ref()
            .map_or(false, |p| p.contains(permission))
    }

    /// The principal the token was issued to
    #[must_use]
    pub fn sub(&self) -> Option<&jwt::SubjectRef> {
        self.sub.as_deref()
    }

    /// When the token was issued
    #[must_use]
    pub fn iat(&self) -> Option<UnixTime> {
        self.iat
    }

    /// The client the token was issued to
    #[must_use]
    pub fn azp(&self) -> Option<&str> {
        self.azp.as_deref()
    }
}

/// The unverified shape of a token payload
///
/// Only ever produced by the JWT verifier after the signature has been
/// checked; converted into a [`ClaimSet`] once the core claims pass.
#[derive(Debug, Deserialize)]
pub(crate) struct ClaimsDto {
    #[serde(default)]
    iss: Option<jwt::Issuer>,
    #[serde(default)]
    aud: jwt::Audiences,
    #[serde(default)]
    exp: Option<UnixTime>,
    #[serde(default)]
    permissions: Option<Permissions>,
    #[serde(default)]
    sub: Option<jwt::Subject>,
    #[serde(default)]
    iat: Option<UnixTime>,
    #[serde(default)]
    azp: Option<String>,
}

impl CoreClaims for ClaimsDto {
    fn exp(&self) -> Option<UnixTime> {
        self.exp
    }

    fn aud(&self) -> &jwt::Audiences {
        &self.aud
    }

    fn iss(&self) -> Option<&jwt::IssuerRef> {
        self.iss.as_deref()
    }

    fn sub(&self) -> Option<&jwt::SubjectRef> {
        self.sub.as_deref()
    }
}

impl ClaimsDto {
    /// Converts claims accepted by the validator
    ///
    /// Returns `None` when `iss` or `exp` is absent, which the validator
    /// never lets through when an issuer is required.
    pub(crate) fn into_claim_set(self) -> Option<ClaimSet> {
        Some(ClaimSet {
            iss: self.iss?,
            aud: self.aud,
            exp: self.exp?,
            permissions: self.permissions,
            sub: self.sub,
            iat: self.iat,
            azp: self.azp,
        })
    }
}
