use std::{fmt, sync::Arc};

use tapster::{
    clock::{Clock, System},
    jwt, JwtRef,
};

use crate::{
    claims::ClaimsDto, Admission, AuthErrorKind, AuthorizationError, ClaimSet, KeySetCache,
    PermissionRequirement,
};

/// Verifies bearer tokens against the identity provider's key set and
/// enforces permission requirements
///
/// Clones share the same key set cache. An `Authority` holds no
/// per-request state and may be used concurrently.
#[derive(Clone)]
#[must_use]
pub struct Authority {
    keys: KeySetCache,
    validator: Arc<jwt::CoreValidator>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl fmt::Debug for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authority")
            .field("keys", &self.keys)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl Authority {
    /// Constructs an authority from a key set cache and the expectations
    /// tokens must meet
    ///
    /// The validator should approve at least one algorithm, require an
    /// issuer, and allow an audience.
    pub fn new(keys: KeySetCache, validator: jwt::CoreValidator) -> Self {
        Self {
            keys,
            validator: Arc::new(validator),
            clock: Arc::new(System),
        }
    }

    /// Replaces the clock used to judge expiry
    pub fn with_clock(self, clock: impl Clock + Send + Sync + 'static) -> Self {
        Self {
            clock: Arc::new(clock),
            ..self
        }
    }

    /// The key set cache backing this authority
    pub fn keys(&self) -> &KeySetCache {
        &self.keys
    }

    /// Verifies the bearer token in an `Authorization` header value
    ///
    /// Checks run in order, and the first failure is returned:
    ///
    /// 1. the header is present,
    /// 2. it reads `Bearer <token>`,
    /// 3. the token decodes and names a key id,
    /// 4. the key set holds that key,
    /// 5. the signature verifies with an approved algorithm,
    /// 6. the token has not expired,
    /// 7. the issuer matches,
    /// 8. the audience matches.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthorizationError`] for the first failed check.
    pub async fn verify(&self, authorization: Option<&str>) -> Result<ClaimSet, AuthorizationError> {
        let result = self.verify_inner(authorization).await;
        if let Err(err) = &result {
            tracing::debug!(error.code = err.error_code(), error.description = err.description(), "token rejected");
        }
        result
    }

    /// Verifies the request's token if `requirement` calls for one, then
    /// checks the required permission
    ///
    /// A [`Public`][PermissionRequirement::Public] requirement admits the
    /// request without reading `authorization`.
    ///
    /// # Errors
    ///
    /// Returns any error from [`verify()`][Self::verify]. Beyond that, a token
    /// without a `permissions` claim fails with
    /// [`PermissionsClaimMissing`][AuthErrorKind::PermissionsClaimMissing],
    /// and one lacking the required permission fails with
    /// [`PermissionNotFound`][AuthErrorKind::PermissionNotFound].
    pub async fn authorize(
        &self,
        authorization: Option<&str>,
        requirement: &PermissionRequirement,
    ) -> Result<Admission, AuthorizationError> {
        let required = match requirement {
            PermissionRequirement::Public => return Ok(Admission::Public),
            PermissionRequirement::Authenticated => None,
            PermissionRequirement::Permission(p) => Some(p),
        };

        let claims = self.verify(authorization).await?;

        if let Some(required) = required {
            let granted = claims.permissions().ok_or_else(|| {
                tracing::debug!(%requirement, "token carries no permissions claim");
                AuthorizationError::from(AuthErrorKind::PermissionsClaimMissing)
            })?;

            if !granted.contains(required) {
                tracing::debug!(%requirement, "token lacks required permission");
                return Err(AuthErrorKind::PermissionNotFound.into());
            }
        }

        tracing::trace!(%requirement, sub = claims.sub().map(|s| s.as_str()), "request admitted");
        Ok(Admission::Verified(claims))
    }

    async fn verify_inner(&self, authorization: Option<&str>) -> Result<ClaimSet, AuthorizationError> {
        let token = bearer_token(authorization)?;

        let decomposed = token.decompose()?;
        let kid = decomposed.kid().ok_or_else(|| {
            AuthorizationError::new(
                AuthErrorKind::InvalidTokenStructure,
                "token header does not name a key",
            )
        })?;

        let keys = self
            .keys
            .find_key_set(kid)
            .await?
            .ok_or(AuthErrorKind::SigningKeyNotFound)?;
        let key = keys.get(kid).ok_or(AuthErrorKind::SigningKeyNotFound)?;

        let validated: jwt::Validated<ClaimsDto> =
            decomposed.verify_with_clock(key, &self.validator, &*self.clock)?;

        validated.into_claims().into_claim_set().ok_or_else(|| {
            tracing::error!("validator admitted claims without an issuer or expiry");
            AuthorizationError::internal()
        })
    }
}

/// Extracts the token from a `Bearer <token>` header value
fn bearer_token(authorization: Option<&str>) -> Result<&JwtRef, AuthorizationError> {
    let value = authorization.ok_or(AuthErrorKind::AuthHeaderMissing)?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(JwtRef::from_str(token)),
        _ => Err(AuthErrorKind::AuthHeaderMalformed.into()),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use color_eyre::Result;
    use tapster::{
        clock::{TestClock, UnixTime},
        jwa,
    };

    use super::*;
    use crate::{
        testing::{self, TokenBuilder},
        Permission, Permissions, StaticKeySource,
    };

    const NOW: UnixTime = UnixTime(1_700_000_000);

    fn authority() -> Authority {
        testing::authority().with_clock(TestClock::new(NOW))
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {token}")
    }

    fn delete_drinks() -> PermissionRequirement {
        PermissionRequirement::Permission(Permission::from_static("delete:drinks"))
    }

    async fn kind_of(header: Option<&str>) -> AuthErrorKind {
        authority()
            .verify(header)
            .await
            .expect_err("token should be rejected")
            .kind()
    }

    #[tokio::test]
    async fn valid_token_with_permission_is_admitted() -> Result<()> {
        let token = TokenBuilder::new(NOW)
            .permissions(["delete:drinks"])
            .sign()?;

        let admission = authority()
            .authorize(Some(&bearer(&token)), &delete_drinks())
            .await?;

        let claims = admission.claims().expect("token was verified");
        assert_eq!(claims.iss().as_str(), testing::ISSUER);
        assert!(claims.has_permission(Permission::from_static("delete:drinks").as_ref()));
        Ok(())
    }

    #[tokio::test]
    async fn missing_header() {
        assert_eq!(kind_of(None).await, AuthErrorKind::AuthHeaderMissing);
    }

    #[tokio::test]
    async fn malformed_headers() {
        for header in ["Token xyz", "Bearer", "Bearer ", "bearer abc", "Bearer a b", "Bearer  abc"] {
            assert_eq!(
                kind_of(Some(header)).await,
                AuthErrorKind::AuthHeaderMalformed,
                "{header:?}"
            );
        }
    }

    #[tokio::test]
    async fn undecodable_token() {
        assert_eq!(
            kind_of(Some("Bearer not-a-jwt")).await,
            AuthErrorKind::InvalidTokenStructure
        );
    }

    #[tokio::test]
    async fn token_without_kid() -> Result<()> {
        let token = TokenBuilder::new(NOW).without_key_id().sign()?;
        assert_eq!(
            kind_of(Some(&bearer(&token))).await,
            AuthErrorKind::InvalidTokenStructure
        );
        Ok(())
    }

    #[tokio::test]
    async fn unknown_key_id() -> Result<()> {
        let token = TokenBuilder::new(NOW).key_id("not-published").sign()?;
        assert_eq!(
            kind_of(Some(&bearer(&token))).await,
            AuthErrorKind::SigningKeyNotFound
        );
        Ok(())
    }

    #[tokio::test]
    async fn unknown_key_id_after_failed_refresh() -> Result<()> {
        #[derive(Debug)]
        struct Unreachable;

        #[async_trait::async_trait]
        impl crate::KeySource for Unreachable {
            async fn fetch(&self) -> Result<tapster::Jwks, crate::KeySetError> {
                Err(crate::KeySetError::Timeout(Duration::from_secs(5)))
            }

            fn describe(&self) -> &str {
                "unreachable"
            }
        }

        let keys = KeySetCache::new(Unreachable).with_min_refresh_interval(Duration::ZERO);
        keys.set_jwks(testing::jwks());
        let authority = Authority::new(keys, testing::validator()).with_clock(TestClock::new(NOW));

        let token = TokenBuilder::new(NOW).key_id("not-published").sign()?;
        let err = authority.verify(Some(&bearer(&token))).await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::SigningKeyNotFound);
        Ok(())
    }

    #[tokio::test]
    async fn cold_key_set_failure_is_unavailable() -> Result<()> {
        #[derive(Debug)]
        struct Unreachable;

        #[async_trait::async_trait]
        impl crate::KeySource for Unreachable {
            async fn fetch(&self) -> Result<tapster::Jwks, crate::KeySetError> {
                Err(crate::KeySetError::Timeout(Duration::from_secs(5)))
            }

            fn describe(&self) -> &str {
                "unreachable"
            }
        }

        let authority = Authority::new(KeySetCache::new(Unreachable), testing::validator());
        let token = TokenBuilder::new(NOW).sign()?;
        let err = authority.verify(Some(&bearer(&token))).await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::KeySetUnavailable);
        assert_eq!(err.status_code(), http::StatusCode::INTERNAL_SERVER_ERROR);
        Ok(())
    }

    #[tokio::test]
    async fn token_signed_by_foreign_key() -> Result<()> {
        let token = TokenBuilder::new(NOW).rogue().sign()?;
        assert_eq!(
            kind_of(Some(&bearer(&token))).await,
            AuthErrorKind::InvalidSignature
        );
        Ok(())
    }

    #[tokio::test]
    async fn tampering_with_any_signature_byte_is_detected() -> Result<()> {
        let token = TokenBuilder::new(NOW).sign()?;
        let (message, signature) = token
            .rsplit_once('.')
            .expect("token has a signature segment");
        let signature = tapster::b64::Base64Url::from_encoded(signature)?;

        for idx in [0, signature.as_slice().len() / 2, signature.as_slice().len() - 1] {
            let mut tampered = signature.as_slice().to_vec();
            tampered[idx] ^= 0x01;
            let forged = format!(
                "{message}.{}",
                tapster::b64::Base64Url::from_raw(tampered)
            );
            assert_eq!(
                kind_of(Some(&bearer(&forged))).await,
                AuthErrorKind::InvalidSignature,
                "byte {idx}"
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn unapproved_algorithm_is_an_invalid_signature() -> Result<()> {
        let token = TokenBuilder::new(NOW)
            .algorithm(jwa::Algorithm::PS256)
            .sign()?;
        assert_eq!(
            kind_of(Some(&bearer(&token))).await,
            AuthErrorKind::InvalidSignature
        );
        Ok(())
    }

    #[tokio::test]
    async fn expired_by_one_second() -> Result<()> {
        let token = TokenBuilder::new(NOW)
            .expires_at(NOW.minus_secs(1))
            .sign()?;
        assert_eq!(
            kind_of(Some(&bearer(&token))).await,
            AuthErrorKind::TokenExpired
        );
        Ok(())
    }

    #[tokio::test]
    async fn expiring_now_is_expired() -> Result<()> {
        let token = TokenBuilder::new(NOW).expires_at(NOW).sign()?;
        assert_eq!(
            kind_of(Some(&bearer(&token))).await,
            AuthErrorKind::TokenExpired
        );
        Ok(())
    }

    #[tokio::test]
    async fn wrong_issuer() -> Result<()> {
        let token = TokenBuilder::new(NOW)
            .issuer("https://impostor.example.com/")
            .sign()?;
        assert_eq!(
            kind_of(Some(&bearer(&token))).await,
            AuthErrorKind::InvalidIssuer
        );
        Ok(())
    }

    #[tokio::test]
    async fn wrong_audience() -> Result<()> {
        let token = TokenBuilder::new(NOW).audience("https://other.example.com/").sign()?;
        assert_eq!(
            kind_of(Some(&bearer(&token))).await,
            AuthErrorKind::InvalidAudience
        );
        Ok(())
    }

    #[tokio::test]
    async fn expiry_is_checked_before_issuer() -> Result<()> {
        let token = TokenBuilder::new(NOW)
            .issuer("https://impostor.example.com/")
            .expires_at(NOW.minus_secs(1))
            .sign()?;
        assert_eq!(
            kind_of(Some(&bearer(&token))).await,
            AuthErrorKind::TokenExpired
        );
        Ok(())
    }

    #[tokio::test]
    async fn permission_not_granted_is_forbidden() -> Result<()> {
        let token = TokenBuilder::new(NOW)
            .permissions(["delete:drinks"])
            .sign()?;

        let err = authority()
            .authorize(
                Some(&bearer(&token)),
                &PermissionRequirement::Permission(Permission::from_static("post:drinks")),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), AuthErrorKind::PermissionNotFound);
        assert_eq!(err.status_code(), http::StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn unusual_granted_permissions_do_not_spoil_the_claim() -> Result<()> {
        for granted in [["delete:drinks", "read:café"], ["delete:drinks", ""]] {
            let token = TokenBuilder::new(NOW).permissions(granted).sign()?;

            let admission = authority()
                .authorize(Some(&bearer(&token)), &delete_drinks())
                .await?;

            let claims = admission.claims().unwrap();
            assert_eq!(claims.permissions().map(Permissions::len), Some(2));
        }
        Ok(())
    }

    #[tokio::test]
    async fn missing_permissions_claim_is_a_bad_request() -> Result<()> {
        let token = TokenBuilder::new(NOW).without_permissions().sign()?;

        let err = authority()
            .authorize(Some(&bearer(&token)), &delete_drinks())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), AuthErrorKind::PermissionsClaimMissing);
        assert_eq!(err.status_code(), http::StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn authenticated_requirement_skips_permission_check() -> Result<()> {
        let token = TokenBuilder::new(NOW).without_permissions().sign()?;

        let admission = authority()
            .authorize(Some(&bearer(&token)), &PermissionRequirement::Authenticated)
            .await?;

        assert!(admission.claims().is_some());
        Ok(())
    }

    #[tokio::test]
    async fn public_requirement_ignores_header() -> Result<()> {
        let admission = authority()
            .authorize(Some("garbage"), &PermissionRequirement::Public)
            .await?;
        assert_eq!(admission, Admission::Public);
        Ok(())
    }

    #[tokio::test]
    async fn verification_is_idempotent() -> Result<()> {
        let authority = authority();
        let token = TokenBuilder::new(NOW)
            .permissions(["get:drinks-detail"])
            .sign()?;
        let header = bearer(&token);

        let before = authority.keys().current().map(|k| k.generation());
        let first = authority.verify(Some(&header)).await?;
        let second = authority.verify(Some(&header)).await?;
        let after = authority.keys().current().map(|k| k.generation());

        assert_eq!(first, second);
        assert_eq!(before, after);
        Ok(())
    }

    #[tokio::test]
    async fn cold_authority_fetches_on_first_use() -> Result<()> {
        let keys = KeySetCache::new(StaticKeySource::new(testing::jwks()));
        let authority = Authority::new(keys, testing::validator()).with_clock(TestClock::new(NOW));
        assert!(authority.keys().current().is_none());

        let token = TokenBuilder::new(NOW).sign()?;
        let claims = authority.verify(Some(&bearer(&token))).await?;
        assert_eq!(claims.iss().as_str(), testing::ISSUER);
        assert_eq!(authority.keys().current().map(|k| k.generation()), Some(1));
        Ok(())
    }
}
