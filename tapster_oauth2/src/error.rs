//! Authorization failures

use std::{fmt, sync::Arc, time::Duration};

use http::StatusCode;
use tapster::error::{ClaimsRejected, Malformed, TokenError};
use thiserror::Error;

/// The closed set of reasons a request can fail authorization
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum AuthErrorKind {
    /// No `Authorization` header was presented
    AuthHeaderMissing,
    /// The `Authorization` header is not `Bearer <token>`
    AuthHeaderMalformed,
    /// The token cannot be decoded into header, payload, and signature
    InvalidTokenStructure,
    /// No key in the key set matches the token's key id
    SigningKeyNotFound,
    /// The signature does not verify under the selected key and algorithm
    InvalidSignature,
    /// The token is expired, or carries no expiry
    TokenExpired,
    /// The token was minted by an unexpected issuer
    InvalidIssuer,
    /// The token was minted for another audience
    InvalidAudience,
    /// The token carries no `permissions` claim
    PermissionsClaimMissing,
    /// The token does not grant the required permission
    PermissionNotFound,
    /// The key set could not be obtained from the identity provider
    KeySetUnavailable,
    /// An unexpected fault inside the authorization machinery
    Internal,
}

impl AuthErrorKind {
    /// The HTTP status a response for this failure carries
    #[must_use]
    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::AuthHeaderMissing
            | Self::AuthHeaderMalformed
            | Self::InvalidTokenStructure
            | Self::SigningKeyNotFound
            | Self::InvalidSignature
            | Self::TokenExpired
            | Self::InvalidIssuer
            | Self::InvalidAudience => StatusCode::UNAUTHORIZED,
            Self::PermissionsClaimMissing => StatusCode::BAD_REQUEST,
            Self::PermissionNotFound => StatusCode::FORBIDDEN,
            Self::KeySetUnavailable | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// A stable, machine-readable code for this failure
    #[must_use]
    pub const fn error_code(self) -> &'static str {
        match self {
            Self::AuthHeaderMissing => "authorization_header_missing",
            Self::AuthHeaderMalformed => "invalid_header",
            Self::InvalidTokenStructure => "invalid_token",
            Self::SigningKeyNotFound => "signing_key_not_found",
            Self::InvalidSignature => "invalid_signature",
            Self::TokenExpired => "token_expired",
            Self::InvalidIssuer => "invalid_issuer",
            Self::InvalidAudience => "invalid_audience",
            Self::PermissionsClaimMissing => "invalid_claims",
            Self::PermissionNotFound => "permission_not_found",
            Self::KeySetUnavailable => "key_set_unavailable",
            Self::Internal => "internal_error",
        }
    }
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.error_code())
    }
}

/// A request failed authorization
///
/// The description is safe to return to the caller. Details of unexpected
/// faults are logged, never described.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{description}")]
#[must_use]
pub struct AuthorizationError {
    kind: AuthErrorKind,
    description: String,
}

const INTERNAL_DESCRIPTION: &str = "internal authorization failure";

impl AuthorizationError {
    /// Constructs an error of the given kind
    pub fn new(kind: AuthErrorKind, description: impl Into<String>) -> Self {
        if kind == AuthErrorKind::Internal {
            return Self::internal();
        }

        Self {
            kind,
            description: description.into(),
        }
    }

    /// An unexpected fault, with the fixed description
    pub fn internal() -> Self {
        Self {
            kind: AuthErrorKind::Internal,
            description: INTERNAL_DESCRIPTION.to_owned(),
        }
    }

    /// The reason authorization failed
    #[must_use]
    pub fn kind(&self) -> AuthErrorKind {
        self.kind
    }

    /// The HTTP status a response for this failure carries
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.kind.status_code()
    }

    /// A stable, machine-readable code for this failure
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        self.kind.error_code()
    }

    /// A human-readable description of the failure
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl From<AuthErrorKind> for AuthorizationError {
    fn from(kind: AuthErrorKind) -> Self {
        let description = match kind {
            AuthErrorKind::AuthHeaderMissing => "authorization header is expected",
            AuthErrorKind::AuthHeaderMalformed => {
                "authorization header must be a bearer token"
            }
            AuthErrorKind::InvalidTokenStructure => "unable to parse authentication token",
            AuthErrorKind::SigningKeyNotFound => "unable to find the appropriate key",
            AuthErrorKind::InvalidSignature => "token signature is invalid",
            AuthErrorKind::TokenExpired => "token expired",
            AuthErrorKind::InvalidIssuer => "incorrect issuer",
            AuthErrorKind::InvalidAudience => "incorrect audience",
            AuthErrorKind::PermissionsClaimMissing => "permissions not included in token",
            AuthErrorKind::PermissionNotFound => "permission not found",
            AuthErrorKind::KeySetUnavailable => "unable to obtain signing keys",
            AuthErrorKind::Internal => INTERNAL_DESCRIPTION,
        };

        Self::new(kind, description)
    }
}

impl From<TokenError> for AuthorizationError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Malformed(malformed) => malformed.into(),
            TokenError::AlgorithmRejected(_) | TokenError::Key(_) => {
                AuthErrorKind::InvalidSignature.into()
            }
            TokenError::Claims(rejected) => rejected.into(),
        }
    }
}

impl From<Malformed> for AuthorizationError {
    fn from(err: Malformed) -> Self {
        let kind = match err {
            Malformed::Signature(_) => AuthErrorKind::InvalidSignature,
            Malformed::Segments | Malformed::Header(_) | Malformed::Payload(_) => {
                AuthErrorKind::InvalidTokenStructure
            }
        };

        kind.into()
    }
}

impl From<ClaimsRejected> for AuthorizationError {
    fn from(rejected: ClaimsRejected) -> Self {
        let kind = match rejected {
            ClaimsRejected::TokenExpired | ClaimsRejected::MissingRequiredClaim("exp") => {
                AuthErrorKind::TokenExpired
            }
            ClaimsRejected::InvalidIssuer | ClaimsRejected::MissingRequiredClaim("iss") => {
                AuthErrorKind::InvalidIssuer
            }
            ClaimsRejected::InvalidAudience | ClaimsRejected::MissingRequiredClaim("aud") => {
                AuthErrorKind::InvalidAudience
            }
            ClaimsRejected::MissingRequiredClaim(_) => AuthErrorKind::InvalidTokenStructure,
        };

        kind.into()
    }
}

/// A failure to obtain the key set
///
/// Cloneable so that every caller joined to a single fetch observes the
/// same outcome.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum KeySetError {
    /// The request to the key set endpoint could not be completed
    #[error("key set request failed")]
    Request(#[source] Arc<reqwest::Error>),

    /// The key set endpoint responded with a non-success status
    #[error("key set endpoint responded with status {0}")]
    Status(StatusCode),

    /// The key set document could not be parsed
    #[error("key set document is malformed")]
    Malformed(#[source] Arc<serde_json::Error>),

    /// The fetch did not complete in time
    #[error("key set fetch timed out after {0:?}")]
    Timeout(Duration),

    /// The fetch task ended without producing a result
    #[error("key set fetch ended unexpectedly")]
    Unexpected,
}

impl From<reqwest::Error> for KeySetError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(Arc::new(err))
    }
}

impl From<serde_json::Error> for KeySetError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(Arc::new(err))
    }
}

impl From<KeySetError> for AuthorizationError {
    fn from(err: KeySetError) -> Self {
        match err {
            KeySetError::Unexpected => Self::internal(),
            _ => AuthErrorKind::KeySetUnavailable.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_kind() {
        use AuthErrorKind::*;

        let unauthorized = [
            AuthHeaderMissing,
            AuthHeaderMalformed,
            InvalidTokenStructure,
            SigningKeyNotFound,
            InvalidSignature,
            TokenExpired,
            InvalidIssuer,
            InvalidAudience,
        ];
        for kind in unauthorized {
            assert_eq!(kind.status_code(), StatusCode::UNAUTHORIZED, "{kind}");
        }

        assert_eq!(PermissionsClaimMissing.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(PermissionNotFound.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            KeySetUnavailable.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(Internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn internal_description_is_fixed() {
        let err = AuthorizationError::new(AuthErrorKind::Internal, "connection reset by peer");
        assert_eq!(err.description(), "internal authorization failure");
        assert_eq!(err.error_code(), "internal_error");
    }

    #[test]
    fn missing_claims_map_to_their_check() {
        let exp: AuthorizationError = ClaimsRejected::MissingRequiredClaim("exp").into();
        let iss: AuthorizationError = ClaimsRejected::MissingRequiredClaim("iss").into();
        let aud: AuthorizationError = ClaimsRejected::MissingRequiredClaim("aud").into();
        assert_eq!(exp.kind(), AuthErrorKind::TokenExpired);
        assert_eq!(iss.kind(), AuthErrorKind::InvalidIssuer);
        assert_eq!(aud.kind(), AuthErrorKind::InvalidAudience);
    }

    #[test]
    fn aborted_fetch_is_internal() {
        let err: AuthorizationError = KeySetError::Unexpected.into();
        assert_eq!(err.kind(), AuthErrorKind::Internal);

        let err: AuthorizationError = KeySetError::Timeout(Duration::from_secs(1)).into();
        assert_eq!(err.kind(), AuthErrorKind::KeySetUnavailable);
    }
}
