//! Errors raised while loading keys and checking tokens

use std::error::Error as StdError;

use thiserror::Error;

use crate::jwa::Algorithm;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// A name that does not match any supported algorithm
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("`{0}` is not a supported algorithm")]
pub struct UnknownAlgorithm(pub(crate) String);

impl UnknownAlgorithm {
    /// The name that failed to parse
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// A token names an algorithm that the validator does not approve
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("algorithm `{0}` is not approved")]
pub struct AlgorithmRejected(pub(crate) String);

impl AlgorithmRejected {
    /// The algorithm named by the token header
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Key material that could not be loaded
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid key: {reason}")]
pub struct InvalidKey {
    reason: String,
}

impl InvalidKey {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Why the key was refused
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// A key declined to accept a signature
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum KeyMismatch {
    /// The key is published for some use other than signatures
    #[error("key is not intended for signature verification")]
    Usage,

    /// The key is pinned to, or cannot be used with, another algorithm
    #[error("key cannot be used with {0}")]
    Algorithm(Algorithm),

    /// The signature does not match the signing input
    #[error("signature does not match")]
    Signature,
}

/// A token that cannot be taken apart
///
/// Only the structure is judged here. A well-formed token may still carry a
/// bad signature or unacceptable claims.
#[derive(Debug, Error)]
pub enum Malformed {
    /// Not exactly three `.`-separated segments
    #[error("token does not have three segments")]
    Segments,

    /// The header is not base64url-encoded JSON of the expected shape
    #[error("token header is malformed")]
    Header(#[source] BoxError),

    /// The signature segment is not base64url
    #[error("token signature is malformed")]
    Signature(#[source] BoxError),

    /// The payload is not base64url-encoded JSON of the expected shape
    #[error("token payload is malformed")]
    Payload(#[source] BoxError),
}

impl Malformed {
    pub(crate) fn header(source: impl Into<BoxError>) -> Self {
        Self::Header(source.into())
    }

    pub(crate) fn signature(source: impl Into<BoxError>) -> Self {
        Self::Signature(source.into())
    }

    pub(crate) fn payload(source: impl Into<BoxError>) -> Self {
        Self::Payload(source.into())
    }
}

/// Claim checks that a token can fail
///
/// Claims are checked in a fixed order: expiry, then issuer, then audience.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ClaimsRejected {
    /// `exp` is at or before the current time
    #[error("token expired")]
    TokenExpired,

    /// `iss` is not the required issuer
    #[error("invalid issuer")]
    InvalidIssuer,

    /// `aud` names none of the allowed audiences
    #[error("invalid audience")]
    InvalidAudience,

    /// A claim the validator needs is absent
    #[error("required {0} claim missing")]
    MissingRequiredClaim(&'static str),
}

/// Why a token was not accepted
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token could not be taken apart
    #[error(transparent)]
    Malformed(#[from] Malformed),

    /// The header names an algorithm outside the allow-list
    #[error(transparent)]
    AlgorithmRejected(#[from] AlgorithmRejected),

    /// The selected key refused the signature
    #[error("token rejected by key")]
    Key(#[from] KeyMismatch),

    /// The verified claims are not acceptable
    #[error("token rejected by claims validator")]
    Claims(#[from] ClaimsRejected),
}

/// Why a token could not be minted
#[derive(Debug, Error)]
pub enum SigningError {
    /// The header names an algorithm this crate cannot sign with
    #[error(transparent)]
    UnknownAlgorithm(#[from] UnknownAlgorithm),

    /// The header or payload could not be serialized
    #[error("unable to serialize token {part}")]
    Serialize {
        /// `header` or `payload`
        part: &'static str,
        /// The serializer's complaint
        #[source]
        source: serde_json::Error,
    },

    /// The cryptographic backend failed to produce a signature
    #[error("signature could not be produced")]
    Backend,
}
