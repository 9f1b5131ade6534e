//! Bearer token authorization based on OAuth2 permissions
//!
//! An [`Authority`] verifies access tokens minted by an external identity
//! provider against that provider's published key set, then checks the
//! permissions the token grants against what an endpoint requires.
//!
//! The key set is fetched lazily through a [`KeySetCache`], which coalesces
//! concurrent fetches and swaps in new snapshots atomically.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use tapster::{jwa, jwt};
//! use tapster_oauth2::{
//!     Authority, KeySetCache, Permission, PermissionRequirement, RemoteKeySource,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let source = RemoteKeySource::new(
//!     "https://tapster.example.com/.well-known/jwks.json",
//!     Duration::from_secs(5),
//! )?;
//!
//! let validator = jwt::CoreValidator::default()
//!     .approve(jwa::Algorithm::RS256)
//!     .require_issuer(jwt::Issuer::from_static("https://tapster.example.com/"))
//!     .allow_audience(jwt::Audience::from_static("drinks"));
//!
//! let authority = Authority::new(KeySetCache::new(source), validator);
//!
//! let requirement = PermissionRequirement::Permission(Permission::from_static("post:drinks"));
//! let admission = authority
//!     .authorize(Some("Bearer eyJhbGciOi..."), &requirement)
//!     .await?;
//! # let _ = admission;
//! # Ok(())
//! # }
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

mod authority;
mod claims;
pub mod error;
pub mod jwks;
pub mod permission;
mod requirement;
#[cfg(any(test, feature = "testing"))]
#[cfg_attr(docsrs, doc(cfg(feature = "testing")))]
pub mod testing;

pub use authority::Authority;
pub use claims::ClaimSet;
pub use error::{AuthErrorKind, AuthorizationError, KeySetError};
pub use jwks::{KeySet, KeySetCache, KeySource, RemoteKeySource, StaticKeySource};
pub use permission::{Permission, PermissionRef, Permissions};
pub use requirement::{Admission, PermissionRequirement};
