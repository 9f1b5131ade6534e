//! Minting tokens for tests
//!
//! Tokens are signed with a checked-in 2048-bit RSA key whose public half is
//! published in [`JWKS`]. Never use these keys outside of tests.

use serde::Serialize;
use tapster::{
    clock::UnixTime,
    error::{InvalidKey, SigningError},
    jwa::{self, rsa::PrivateKey},
    jwk, jwt, Jwks, Jwt,
};
use thiserror::Error;

use crate::{Authority, KeySetCache};

/// The issuer expected by [`validator()`]
pub const ISSUER: &str = "https://tapster.example.com/";

/// The audience expected by [`validator()`]
pub const AUDIENCE: &str = "https://drinks.example.com/";

/// The id of the published test key
pub const KEY_ID: &str = "tapster-test-1";

/// The published test key set
pub const JWKS: &str = include_str!("../../tapster/data/rsa/jwks.json");

const SIGNING_KEY: &[u8] = include_bytes!("../../tapster/data/rsa/signing.pk8");
const ROGUE_KEY: &[u8] = include_bytes!("../../tapster/data/rsa/rogue.pk8");

/// Lifetime of tokens unless overridden
pub const DEFAULT_LIFETIME_SECS: u64 = 3600;

/// The published test key set, parsed
///
/// # Panics
///
/// Panics if the checked-in fixture is corrupt.
#[must_use]
pub fn jwks() -> Jwks {
    serde_json::from_str(JWKS).expect("test key set fixture is valid")
}

/// A validator approving RS256 tokens for [`ISSUER`] and [`AUDIENCE`]
pub fn validator() -> jwt::CoreValidator {
    jwt::CoreValidator::default()
        .approve(jwa::Algorithm::RS256)
        .require_issuer(jwt::Issuer::from_static(ISSUER))
        .allow_audience(jwt::Audience::from_static(AUDIENCE))
}

/// An authority trusting the published test key set
pub fn authority() -> Authority {
    Authority::new(KeySetCache::from_jwks(jwks()), validator())
}

/// Failure to mint a token
#[derive(Debug, Error)]
pub enum MintError {
    /// The signing key could not be loaded
    #[error(transparent)]
    Key(#[from] InvalidKey),

    /// The token could not be signed
    #[error(transparent)]
    Signing(#[from] SigningError),
}

#[derive(Serialize)]
struct Payload<'a> {
    iss: &'a str,
    aud: &'a str,
    sub: &'a str,
    iat: UnixTime,
    exp: UnixTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    permissions: Option<&'a [String]>,
}

/// Builds signed tokens, valid by default
///
/// Each setter breaks exactly one property so that tests can target a
/// single verification step.
#[derive(Clone, Debug)]
#[must_use]
pub struct TokenBuilder {
    issuer: String,
    audience: String,
    subject: String,
    issued_at: UnixTime,
    expires_at: UnixTime,
    permissions: Option<Vec<String>>,
    key_id: Option<String>,
    algorithm: jwa::Algorithm,
    rogue: bool,
}

impl TokenBuilder {
    /// A valid token issued at `now`, expiring an hour later, granting no
    /// permissions
    pub fn new(now: UnixTime) -> Self {
        Self {
            issuer: ISSUER.to_owned(),
            audience: AUDIENCE.to_owned(),
            subject: "auth0|barista".to_owned(),
            issued_at: now,
            expires_at: now.plus_secs(DEFAULT_LIFETIME_SECS),
            permissions: Some(Vec::new()),
            key_id: Some(KEY_ID.to_owned()),
            algorithm: jwa::Algorithm::RS256,
            rogue: false,
        }
    }

    /// Grants the given permissions
    pub fn permissions<I, S>(self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            permissions: Some(permissions.into_iter().map(Into::into).collect()),
            ..self
        }
    }

    /// Omits the `permissions` claim entirely
    pub fn without_permissions(self) -> Self {
        Self {
            permissions: None,
            ..self
        }
    }

    /// Sets the `iss` claim
    pub fn issuer(self, issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            ..self
        }
    }

    /// Sets the `aud` claim
    pub fn audience(self, audience: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
            ..self
        }
    }

    /// Sets the `sub` claim
    pub fn subject(self, subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..self
        }
    }

    /// Sets the `exp` claim
    pub fn expires_at(self, expires_at: UnixTime) -> Self {
        Self { expires_at, ..self }
    }

    /// Names a different key id in the header
    pub fn key_id(self, key_id: impl Into<String>) -> Self {
        Self {
            key_id: Some(key_id.into()),
            ..self
        }
    }

    /// Omits the key id from the header
    pub fn without_key_id(self) -> Self {
        Self {
            key_id: None,
            ..self
        }
    }

    /// Signs with a different RSA algorithm
    pub fn algorithm(self, algorithm: jwa::Algorithm) -> Self {
        Self { algorithm, ..self }
    }

    /// Signs with a key that is not in the published key set, while still
    /// naming the published key id
    pub fn rogue(self) -> Self {
        Self {
            rogue: true,
            ..self
        }
    }

    /// Signs the token
    ///
    /// # Errors
    ///
    /// Returns an error if the fixture key cannot be loaded or signing
    /// fails.
    pub fn sign(&self) -> Result<String, MintError> {
        let key = PrivateKey::from_pkcs8_der(if self.rogue { ROGUE_KEY } else { SIGNING_KEY })?;

        let mut headers = jwt::Headers::new(self.algorithm);
        if let Some(kid) = &self.key_id {
            headers = headers.with_key_id(jwk::KeyId::new(kid.clone()));
        }

        let payload = Payload {
            iss: &self.issuer,
            aud: &self.audience,
            sub: &self.subject,
            iat: self.issued_at,
            exp: self.expires_at,
            permissions: self.permissions.as_deref(),
        };

        let token = Jwt::try_from_parts_with_signature(&headers, &payload, &key)?;
        Ok(token.take())
    }
}
