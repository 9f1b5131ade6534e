//! JOSE primitives needed to verify RSA-signed bearer tokens
//!
//! Covers just enough of JWS ([RFC7515][]), JWK ([RFC7517][]), JWA
//! ([RFC7518][], RSA only) and JWT ([RFC7519][]) to accept access tokens
//! minted by an external identity provider. Nothing here encrypts.
//!
//! [RFC7515]: https://tools.ietf.org/html/rfc7515
//! [RFC7517]: https://tools.ietf.org/html/rfc7517
//! [RFC7518]: https://tools.ietf.org/html/rfc7518
//! [RFC7519]: https://tools.ietf.org/html/rfc7519
//!
//! # Example
//!
//! ```
//! use tapster::{jwa, jwt, Jwks, JwtRef};
//!
//! let jwks: Jwks = serde_json::from_str(r#"{"keys":[]}"#).unwrap();
//!
//! let validator = jwt::CoreValidator::default()
//!     .approve(jwa::Algorithm::RS256)
//!     .allow_audience(jwt::Audience::from_static("https://api.example.com/"))
//!     .require_issuer(jwt::Issuer::from_static("https://issuer.example.com/"));
//!
//! let token = JwtRef::from_str("eyJhbGciOiJSUzI1NiIsImtpZCI6ImsxIn0.e30.c2ln");
//! let decomposed = token.decompose().unwrap();
//!
//! let alg = validator.approve_algorithm(decomposed.untrusted_header().alg());
//! assert_eq!(alg.unwrap(), jwa::Algorithm::RS256);
//! assert!(jwks.get_key_by_id(decomposed.kid().unwrap()).is_none());
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
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

pub mod b64;
pub mod clock;
pub mod error;
pub mod jwa;
pub mod jwk;
mod jwks;
pub mod jws;
pub mod jwt;


#[doc(inline)]
pub use jwk::Jwk;
#[doc(inline)]
pub use jwks::Jwks;
#[doc(inline)]
pub use jwt::{Jwt, JwtRef};
