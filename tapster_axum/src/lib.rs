//! Axum extractors that enforce `tapster_oauth2` permission requirements
//!
//! Guards are declared with [`permission_guards!`]. Each guard is an
//! extractor: it verifies the request's bearer token with the
//! [`Authority`] in the router state and checks the guard's permission
//! before the handler body runs. A failed check becomes an
//! [`AuthRejection`], rendered in the uniform error shape.
//!
//! # Example
//!
//! ```no_run
//! use axum::{extract::FromRef, routing::{delete, get}, Router};
//! use tapster_oauth2::Authority;
//!
//! mod permission {
//!     tapster_axum::permission_guards! {
//!         pub permission Menu = public;
//!         pub permission DeleteDrinks = "delete:drinks";
//!     }
//! }
//!
//! #[derive(Clone, FromRef)]
//! struct AppState {
//!     authority: Authority,
//! }
//!
//! async fn menu(_: permission::Menu) -> &'static str {
//!     "espresso"
//! }
//!
//! async fn remove(permission::DeleteDrinks(claims): permission::DeleteDrinks) -> String {
//!     format!("deleted on behalf of {:?}", claims.sub())
//! }
//!
//! fn router(authority: Authority) -> Router {
//!     Router::new()
//!         .route("/drinks", get(menu))
//!         .route("/drinks/:id", delete(remove))
//!         .with_state(AppState { authority })
//! }
//! # let _ = router;
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

use std::fmt;

use axum_core::response::{IntoResponse, Response};
use http::{header, HeaderValue, StatusCode};
use tapster_oauth2::{AuthorizationError, PermissionRequirement};

mod macros;
pub mod response;

pub use tapster_oauth2::Authority;

/// Associates an extractor with the requirement it enforces
pub trait EndpointPermission {
    /// The requirement checked before the handler runs
    fn requirement() -> &'static PermissionRequirement;
}

/// The rejection produced when a guard refuses a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRejection {
    error: AuthorizationError,
    requirement: &'static PermissionRequirement,
}

impl AuthRejection {
    /// Constructs a rejection for a request checked against `requirement`
    pub fn new(error: AuthorizationError, requirement: &'static PermissionRequirement) -> Self {
        Self { error, requirement }
    }

    /// The authorization failure
    pub fn error(&self) -> &AuthorizationError {
        &self.error
    }

    /// The requirement the request failed to meet
    pub fn requirement(&self) -> &'static PermissionRequirement {
        self.requirement
    }
}

impl fmt::Display for AuthRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, self.error.error_code())
    }
}

impl std::error::Error for AuthRejection {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<AuthRejection> for AuthorizationError {
    fn from(rejection: AuthRejection) -> Self {
        rejection.error
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let challenge = challenge(&self.error, self.requirement);

        tracing::debug!(
            http.status_code = status.as_u16(),
            error.code = self.error.error_code(),
            "request refused"
        );

        let mut resp = response::error_response(status, self.error.description());
        if let Some(challenge) = challenge {
            resp.headers_mut().insert(header::WWW_AUTHENTICATE, challenge);
        }

        resp
    }
}

/// The `WWW-Authenticate` challenge for a failure, if its status calls for one
fn challenge(
    error: &AuthorizationError,
    requirement: &PermissionRequirement,
) -> Option<HeaderValue> {
    match error.status_code() {
        StatusCode::UNAUTHORIZED => Some(response::invalid_token(error.description())),
        StatusCode::FORBIDDEN => Some(response::insufficient_scope(
            error.description(),
            requirement.required_permission(),
        )),
        StatusCode::BAD_REQUEST => Some(response::invalid_request(error.description())),
        _ => None,
    }
}

#[doc(hidden)]
pub mod __private {
    pub use async_trait::async_trait;
    pub use axum_core::extract::{FromRef, FromRequestParts};
    pub use http::request::Parts;
    pub use once_cell::sync::OnceCell;
    pub use tapster_oauth2::{Authority, ClaimSet, Permission, PermissionRequirement};

    use http::header;
    use tapster_oauth2::{Admission, AuthErrorKind, AuthorizationError};

    use crate::AuthRejection;

    pub async fn authorize<S>(
        parts: &Parts,
        state: &S,
        requirement: &'static PermissionRequirement,
    ) -> Result<ClaimSet, AuthRejection>
    where
        Authority: FromRef<S>,
    {
        let authorization = match parts.headers.get(header::AUTHORIZATION) {
            Some(value) => Some(value.to_str().map_err(|_| {
                AuthRejection::new(AuthErrorKind::AuthHeaderMalformed.into(), requirement)
            })?),
            None => None,
        };

        let authority = Authority::from_ref(state);
        match authority.authorize(authorization, requirement).await {
            Ok(Admission::Verified(claims)) => Ok(claims),
            Ok(Admission::Public) => {
                tracing::error!(%requirement, "claims-bearing guard admitted without a token");
                Err(AuthRejection::new(AuthorizationError::internal(), requirement))
            }
            Err(err) => Err(AuthRejection::new(err, requirement)),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum_core::body::Body;
    use tapster_oauth2::{AuthErrorKind, Permission};

    use super::*;

    static DELETE_DRINKS: once_cell::sync::Lazy<PermissionRequirement> =
        once_cell::sync::Lazy::new(|| Permission::from_static("delete:drinks").into());

    async fn render(kind: AuthErrorKind) -> color_eyre::Result<(Response, serde_json::Value)> {
        let resp = AuthRejection::new(kind.into(), &DELETE_DRINKS).into_response();
        let (parts, body) = resp.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX).await?;
        let body = serde_json::from_slice(&body)?;
        Ok((Response::from_parts(parts, Body::empty()), body))
    }

    fn www_authenticate(resp: &Response) -> Option<&str> {
        resp.headers()
            .get(header::WWW_AUTHENTICATE)
            .map(|v| v.to_str().unwrap())
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized_with_challenge() -> color_eyre::Result<()> {
        let (resp, body) = render(AuthErrorKind::AuthHeaderMissing).await?;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            www_authenticate(&resp),
            Some(r#"Bearer error="invalid_token" error_description="authorization header is expected""#)
        );
        assert_eq!(
            body,
            serde_json::json!({
                "success": false,
                "error": 401,
                "message": "authorization header is expected",
            })
        );

        Ok(())
    }

    #[tokio::test]
    async fn missing_permission_is_forbidden_naming_scope() -> color_eyre::Result<()> {
        let (resp, body) = render(AuthErrorKind::PermissionNotFound).await?;

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            www_authenticate(&resp),
            Some(r#"Bearer error="insufficient_scope" error_description="permission not found" scope="delete:drinks""#)
        );
        assert_eq!(body["error"], 403);

        Ok(())
    }

    #[tokio::test]
    async fn missing_permissions_claim_is_bad_request() -> color_eyre::Result<()> {
        let (resp, body) = render(AuthErrorKind::PermissionsClaimMissing).await?;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            www_authenticate(&resp),
            Some(r#"Bearer error="invalid_request" error_description="permissions not included in token""#)
        );
        assert_eq!(body["success"], false);

        Ok(())
    }

    #[tokio::test]
    async fn internal_failure_has_no_challenge() -> color_eyre::Result<()> {
        let resp = AuthRejection::new(AuthorizationError::internal(), &DELETE_DRINKS).into_response();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(www_authenticate(&resp), None);

        Ok(())
    }
}
