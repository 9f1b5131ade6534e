//! Extractors asserting that a presented token carries an endpoint's permission

/// Constructs an extractor that enforces a single permission requirement
///
/// For a more concise way to construct several guards, see
/// [`permission_guards!`][crate::permission_guards!].
///
/// A guard requiring a specific permission extracts the verified claims:
///
/// ```
/// use tapster_axum::permission_guard;
///
/// permission_guard!(PostDrinks; "post:drinks");
/// ```
///
/// A guard that only requires a valid token is written with `*`:
///
/// ```
/// use tapster_axum::permission_guard;
///
/// permission_guard!(AnyBarista; *);
/// ```
///
/// A guard for a public endpoint never looks at the request:
///
/// ```
/// use tapster_axum::permission_guard;
///
/// permission_guard!(Menu; public);
/// ```
///
/// Guards that check a token find the [`Authority`][crate::Authority] in
/// the router state, so the state must implement `FromRef` for it.
///
/// ```no_run
/// use axum::{extract::FromRef, routing::post, Router};
/// use tapster_axum::{permission_guard, Authority};
///
/// permission_guard!(PostDrinks; "post:drinks");
///
/// #[derive(Clone, FromRef)]
/// struct AppState {
///     authority: Authority,
/// }
///
/// async fn create(PostDrinks(claims): PostDrinks) -> String {
///     format!("created by {:?}", claims.sub())
/// }
///
/// fn router(state: AppState) -> Router {
///     Router::new()
///         .route("/drinks", post(create))
///         .with_state(state)
/// }
/// # let _ = router;
/// ```
#[macro_export]
macro_rules! permission_guard {
    (@claims $vis:vis $i:ident; $doc:expr; $requirement:expr) => {
        #[doc = $doc]
        #[derive(Debug)]
        $vis struct $i($vis $crate::__private::ClaimSet);

        impl $i {
            /// Takes the verified claims
            #[allow(dead_code)]
            $vis fn into_claims(self) -> $crate::__private::ClaimSet {
                self.0
            }

            /// The verified claims
            #[allow(dead_code)]
            $vis fn claims(&self) -> &$crate::__private::ClaimSet {
                &self.0
            }
        }

        impl $crate::EndpointPermission for $i {
            fn requirement() -> &'static $crate::__private::PermissionRequirement {
                static REQUIREMENT: $crate::__private::OnceCell<$crate::__private::PermissionRequirement> =
                    $crate::__private::OnceCell::new();
                REQUIREMENT.get_or_init(|| $requirement)
            }
        }

        #[$crate::__private::async_trait]
        impl<S> $crate::__private::FromRequestParts<S> for $i
        where
            S: Send + Sync,
            $crate::__private::Authority: $crate::__private::FromRef<S>,
        {
            type Rejection = $crate::AuthRejection;

            async fn from_request_parts(
                parts: &mut $crate::__private::Parts,
                state: &S,
            ) -> Result<Self, Self::Rejection> {
                $crate::__private::authorize(
                    parts,
                    state,
                    <Self as $crate::EndpointPermission>::requirement(),
                )
                .await
                .map(Self)
            }
        }
    };
    ($vis:vis $i:ident; public) => {
        /// Admits every request without inspecting its credentials
        #[derive(Debug)]
        $vis struct $i;

        impl $crate::EndpointPermission for $i {
            fn requirement() -> &'static $crate::__private::PermissionRequirement {
                static REQUIREMENT: $crate::__private::PermissionRequirement =
                    $crate::__private::PermissionRequirement::Public;
                &REQUIREMENT
            }
        }

        #[$crate::__private::async_trait]
        impl<S> $crate::__private::FromRequestParts<S> for $i
        where
            S: Send + Sync,
        {
            type Rejection = ::std::convert::Infallible;

            async fn from_request_parts(
                _parts: &mut $crate::__private::Parts,
                _state: &S,
            ) -> Result<Self, Self::Rejection> {
                Ok(Self)
            }
        }
    };
    ($vis:vis $i:ident; *) => {
        $crate::permission_guard!(
            @claims $vis $i;
            "Admits any request bearing a valid token, extracting its claims";
            $crate::__private::PermissionRequirement::Authenticated
        );
    };
    ($vis:vis $i:ident; $permission:literal) => {
        $crate::permission_guard!(
            @claims $vis $i;
            concat!("Admits requests whose token grants `", $permission, "`, extracting its claims");
            $crate::__private::PermissionRequirement::Permission(
                $crate::__private::Permission::from_static($permission)
            )
        );
    };
}

/// Convenience macro for services that need to define many guards
///
/// # Example
///
/// ```
/// use tapster_axum::permission_guards;
///
/// permission_guards! {
///     permission Menu = public;
///     permission AnyBarista = *;
///     permission ReadDetail = "get:drinks-detail";
///     permission PostDrinks = "post:drinks";
/// }
/// ```
#[macro_export]
macro_rules! permission_guards {
    ($($vis:vis permission $i:ident = $permission:tt);* $(;)?) => {
        $(
            $crate::permission_guard!($vis $i; $permission);
        )*
    };
}

#[cfg(test)]
mod tests {
    use axum::{extract::FromRequestParts, http::request::Parts, http::Request};
    use tapster::clock::{Clock, System};
    use tapster_oauth2::{
        testing::{self, TokenBuilder},
        AuthErrorKind, Authority,
    };

    use crate::{AuthRejection, EndpointPermission};

    permission_guard!(DeleteDrinks; "delete:drinks");

    permission_guards! {
        permission Menu = public;
        permission AnyBarista = *;
        permission ReadDetail = "get:drinks-detail";
    }

    fn request_without_token() -> Parts {
        Request::new(()).into_parts().0
    }

    fn request_with_authorization(value: &[u8]) -> Parts {
        Request::builder()
            .header(http::header::AUTHORIZATION, value)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    fn request_with_permissions(permissions: &[&str]) -> Parts {
        let token = TokenBuilder::new(System.now())
            .permissions(permissions.iter().copied())
            .sign()
            .unwrap();
        request_with_authorization(format!("Bearer {token}").as_bytes())
    }

    fn kind(rejection: AuthRejection) -> AuthErrorKind {
        rejection.error().kind()
    }

    #[test]
    fn guards_carry_their_requirements() {
        assert_eq!(Menu::requirement().to_string(), "public");
        assert_eq!(AnyBarista::requirement().to_string(), "authenticated");
        assert_eq!(
            ReadDetail::requirement().to_string(),
            "permission `get:drinks-detail`"
        );
        assert!(DeleteDrinks::requirement().requires_token());
    }

    #[tokio::test]
    async fn public_guard_admits_request_without_token() {
        let authority = testing::authority();
        Menu::from_request_parts(&mut request_without_token(), &authority)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn public_guard_ignores_garbage_credentials() {
        let authority = testing::authority();
        Menu::from_request_parts(&mut request_with_authorization(b"Basic \xff"), &authority)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn permission_guard_without_token_is_unauthorized() {
        let authority = testing::authority();
        let rejection = DeleteDrinks::from_request_parts(&mut request_without_token(), &authority)
            .await
            .unwrap_err();

        assert_eq!(kind(rejection), AuthErrorKind::AuthHeaderMissing);
    }

    #[tokio::test]
    async fn non_ascii_authorization_header_is_malformed() {
        let authority = testing::authority();
        let rejection = DeleteDrinks::from_request_parts(
            &mut request_with_authorization(b"Bearer \xfftoken"),
            &authority,
        )
        .await
        .unwrap_err();

        assert_eq!(kind(rejection), AuthErrorKind::AuthHeaderMalformed);
    }

    #[tokio::test]
    async fn permission_guard_with_permission_extracts_claims() {
        let authority = testing::authority();
        let guard = DeleteDrinks::from_request_parts(
            &mut request_with_permissions(&["delete:drinks"]),
            &authority,
        )
        .await
        .unwrap();

        assert_eq!(
            guard.claims().sub().map(|s| s.as_str()),
            Some("auth0|barista")
        );
    }

    #[tokio::test]
    async fn permission_guard_with_other_permission_is_forbidden() {
        let authority = testing::authority();
        let rejection = DeleteDrinks::from_request_parts(
            &mut request_with_permissions(&["get:drinks-detail", "post:drinks"]),
            &authority,
        )
        .await
        .unwrap_err();

        assert_eq!(kind(rejection.clone()), AuthErrorKind::PermissionNotFound);
        assert_eq!(rejection.requirement(), DeleteDrinks::requirement());
    }

    #[tokio::test]
    async fn authenticated_guard_admits_token_without_permissions() {
        let authority = testing::authority();
        let guard = AnyBarista::from_request_parts(&mut request_with_permissions(&[]), &authority)
            .await
            .unwrap();

        assert!(guard.into_claims().permissions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn guard_reads_authority_from_composite_state() {
        #[derive(Clone)]
        struct AppState {
            authority: Authority,
        }

        impl axum::extract::FromRef<AppState> for Authority {
            fn from_ref(state: &AppState) -> Self {
                state.authority.clone()
            }
        }

        let state = AppState {
            authority: testing::authority(),
        };

        ReadDetail::from_request_parts(
            &mut request_with_permissions(&["get:drinks-detail"]),
            &state,
        )
        .await
        .unwrap();
    }
}
