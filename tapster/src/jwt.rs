//! JSON Web Tokens: decomposing, verifying and minting
//!
//! Defined by [RFC7519][].
//!
//! A token is three base64url segments joined by `.`: header, claims
//! and signature.
//!
//! The first section is the header in JSON format. It names the algorithm
//! and key used to sign the token, and so is only ever used to select the
//! key to verify against. Its contents are checked against strict
//! expectations before use.
//!
//! The second section is the payload in JSON format. Nothing in it is
//! trusted before the signature has been verified.
//!
//! The third section is the binary signature over the first two sections.
//!
//! [RFC7519]: https://tools.ietf.org/html/rfc7519

use std::{fmt, time::Duration};

use aliri_braid::braid;
use serde::{Deserialize, Serialize};

use crate::{
    b64::Base64Url,
    clock::{Clock, System, UnixTime},
    error, jwa, jwk, jws,
};

/// The validated headers and claims of a JWT
///
/// This type can _only_ be generated within this crate to assert that the
/// headers and claims held by this type have already been validated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validated<C = BasicClaims> {
    headers: Headers,
    claims: C,
}

impl<C> Validated<C> {
    /// Extracts the header and claims from the token
    pub fn extract(self) -> (Headers, C) {
        (self.headers, self.claims)
    }

    /// The validated token headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The validated token claims
    pub fn claims(&self) -> &C {
        &self.claims
    }

    /// Discards the headers, keeping the validated claims
    pub fn into_claims(self) -> C {
        self.claims
    }
}

/// A decomposed JWT
///
/// This structure is suitable for inspection to determine which key
/// should be used to validate the JWT.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct Decomposed<'a> {
    header: Headers,
    message: &'a str,
    payload: &'a str,
    signature: &'a str,
}

impl<'a> Decomposed<'a> {
    /// Verifies the decomposed JWT against the given key and validator using
    /// the system clock
    ///
    /// # Errors
    ///
    /// Returns an error if the decomposed token is invalid according to
    /// the core validator.
    pub fn verify<C, V>(
        self,
        key: &'_ V,
        validator: &CoreValidator,
    ) -> Result<Validated<C>, error::TokenError>
    where
        C: for<'de> Deserialize<'de> + CoreClaims,
        V: jws::Verifier,
        error::TokenError: From<V::Error>,
    {
        self.verify_with_clock(key, validator, &System)
    }

    /// Verifies the decomposed JWT against the given key and validator
    ///
    /// Checks run in a fixed order, and the first failure is returned:
    ///
    /// 1. the header algorithm is approved by the validator,
    /// 2. the signature segment decodes and matches under `key`,
    /// 3. the payload decodes into `C`,
    /// 4. the claims satisfy the validator at the time given by `clock`.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first check that failed.
    pub fn verify_with_clock<C, V, K>(
        self,
        key: &'_ V,
        validator: &CoreValidator,
        clock: &K,
    ) -> Result<Validated<C>, error::TokenError>
    where
        C: for<'de> Deserialize<'de> + CoreClaims,
        V: jws::Verifier,
        error::TokenError: From<V::Error>,
        K: Clock + ?Sized,
    {
        let alg = validator.approve_algorithm(self.header.alg())?;

        let signature =
            Base64Url::from_encoded(self.signature).map_err(error::Malformed::signature)?;

        key.verify(alg, self.message.as_bytes(), signature.as_slice())?;

        let p_raw = Base64Url::from_encoded(self.payload).map_err(error::Malformed::payload)?;

        let claims: C =
            serde_json::from_slice(p_raw.as_slice()).map_err(error::Malformed::payload)?;

        validator.validate_with_clock(&claims, clock)?;

        Ok(Validated {
            headers: self.header,
            claims,
        })
    }

    /// The key id named in the header, if any
    #[must_use]
    pub fn kid(&self) -> Option<&jwk::KeyIdRef> {
        self.header.kid()
    }

    /// The untrusted headers of the JWT
    ///
    /// **WARNING:** *These headers have not been validated and should not be trusted.*
    /// An adversary can place arbitrary data into the header and payload of a JWT.
    /// Use them only to select the key to verify against.
    pub fn untrusted_header(&self) -> &Headers {
        &self.header
    }

    /// The untrusted, still encoded, payload of the JWT
    ///
    /// **WARNING:** *This payload has not been validated and should not be trusted.*
    pub fn untrusted_payload(&self) -> &'a str {
        self.payload
    }

    /// The untrusted message of the JWT
    ///
    /// This contains the encoded header and payload of the JWT, separated by a `.`.
    ///
    /// **WARNING:** *This message has not been validated and should not be trusted.*
    pub fn untrusted_message(&self) -> &'a str {
        self.message
    }
}

impl JwtRef {
    /// Decomposes the JWT into its parts, preparing it for later processing
    ///
    /// Only the header is decoded. The signature and payload are left
    /// untouched until [`Decomposed::verify_with_clock()`].
    ///
    /// # Errors
    ///
    /// Returns an error if the JWT does not have exactly three segments or
    /// if the header is not base64url-encoded JSON.
    pub fn decompose(&self) -> Result<Decomposed<'_>, error::Malformed> {
        let compact = jws::Compact::split(self.as_str()).ok_or(error::Malformed::Segments)?;

        let h_raw =
            Base64Url::from_encoded(compact.header()).map_err(error::Malformed::header)?;
        let header: Headers =
            serde_json::from_slice(h_raw.as_slice()).map_err(error::Malformed::header)?;

        Ok(Decomposed {
            header,
            message: compact.message(),
            payload: compact.payload(),
            signature: compact.signature(),
        })
    }
}

/// Core claims that secure access tokens must carry
pub trait CoreClaims {
    /// Expires
    ///
    /// A verifier MUST reject this token at or after the given time.
    fn exp(&self) -> Option<UnixTime>;

    /// Audience
    ///
    /// The intended audiences of this token.
    fn aud(&self) -> &Audiences;

    /// Issuer
    ///
    /// The identity provider that minted the token.
    fn iss(&self) -> Option<&IssuerRef>;

    /// Subject
    ///
    /// The principal the token was issued to.
    fn sub(&self) -> Option<&SubjectRef>;
}

/// An audience
#[braid(serde, ref_doc = "A borrowed reference to an [`Audience`]")]
pub struct Audience;

/// An issuer of JWTs
#[braid(serde, ref_doc = "A borrowed reference to an [`Issuer`]")]
pub struct Issuer;

/// The subject of a JWT
#[braid(serde, ref_doc = "A borrowed reference to a [`Subject`]")]
pub struct Subject;

/// A JSON Web Token
///
/// This type provides custom implementations of [`Display`][JwtRef#impl-Display] and
/// [`Debug`][JwtRef#impl-Debug] so that a token is never written to a log by accident.
#[braid(
    serde,
    debug = "owned",
    display = "owned",
    ord = "omit",
    ref_doc = "\
    A borrowed reference to a JSON Web Token ([`Jwt`])\n\
    \n\
    This type provides custom implementations of [`Display`][Self#impl-Display] and \
    [`Debug`][Self#impl-Debug] so that a token is never written to a log by accident.
    "
)]
#[must_use]
pub struct Jwt;

impl Jwt {
    /// Constructs a new JWT from a header and payload, signed by `signer`
    ///
    /// Headers and payload will be serialized as JSON blobs.
    ///
    /// # Errors
    ///
    /// * If the algorithm named in the header is not supported
    /// * If serialization of either the header or payload fails
    /// * If the signer refuses to sign with the named algorithm
    pub fn try_from_parts_with_signature<P, S>(
        headers: &Headers,
        payload: &P,
        signer: &S,
    ) -> Result<Self, error::SigningError>
    where
        P: Serialize,
        S: jws::Signer,
        error::SigningError: From<S::Error>,
    {
        let alg: jwa::Algorithm = headers
            .alg()
            .parse()
            .map_err(error::SigningError::UnknownAlgorithm)?;

        let h_json = serde_json::to_vec(headers).map_err(|source| {
            error::SigningError::Serialize {
                part: "header",
                source,
            }
        })?;
        let p_json = serde_json::to_vec(payload).map_err(|source| {
            error::SigningError::Serialize {
                part: "payload",
                source,
            }
        })?;
        let (h_raw, p_raw) = (Base64Url::from_raw(h_json), Base64Url::from_raw(p_json));

        let token = jws::sign_compact(&h_raw, &p_raw, alg, signer)?;

        Ok(Self::new(token))
    }
}

impl JwtRef {
    /// Everything up to and including the last `.`
    fn unsigned_prefix(&self) -> &str {
        self.0.rfind('.').map_or("", |dot| &self.0[..=dot])
    }
}

/// Tokens are credentials, so only the alternate form shows anything, and
/// even then the signature is left out.
///
/// ```
/// # use tapster::jwt::JwtRef;
/// let token = JwtRef::from_str("eyJhbGciOiJSUzI1NiJ9.e30.c2lnbmF0dXJl");
///
/// assert_eq!(format!("{:?}", token), "Jwt(***)");
/// assert_eq!(format!("{:#?}", token), "Jwt(\"eyJhbGciOiJSUzI1NiJ9.e30.…\")");
/// ```
impl fmt::Debug for JwtRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            write!(f, "Jwt(\"{}…\")", self.unsigned_prefix())
        } else {
            f.write_str("Jwt(***)")
        }
    }
}

/// Written as `***` unless the alternate form, `{:#}`, asks for the token.
///
/// ```
/// # use tapster::jwt::JwtRef;
/// let token = JwtRef::from_str("eyJhbGciOiJSUzI1NiJ9.e30.c2lnbmF0dXJl");
///
/// assert_eq!(token.to_string(), "***");
/// assert_eq!(format!("{:#}", token), "eyJhbGciOiJSUzI1NiJ9.e30.c2lnbmF0dXJl");
/// ```
impl fmt::Display for JwtRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(if f.alternate() { &self.0 } else { "***" })
    }
}

/// The `aud` claim
///
/// Providers write a lone audience as a bare string and several as an
/// array. Both forms are read, and a single audience is written back bare.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AudClaim", into = "AudClaim")]
#[must_use]
pub struct Audiences(Vec<Audience>);

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum AudClaim {
    One(Audience),
    Many(Vec<Audience>),
}

impl From<AudClaim> for Audiences {
    fn from(claim: AudClaim) -> Self {
        match claim {
            AudClaim::One(aud) => Self(vec![aud]),
            AudClaim::Many(auds) => Self(auds),
        }
    }
}

impl From<Audiences> for AudClaim {
    fn from(Audiences(auds): Audiences) -> Self {
        match <[Audience; 1]>::try_from(auds) {
            Ok([aud]) => Self::One(aud),
            Err(auds) => Self::Many(auds),
        }
    }
}

impl Audiences {
    /// Whether no audience is named
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `aud` is one of the named audiences
    #[must_use]
    pub fn contains(&self, aud: &AudienceRef) -> bool {
        self.0.iter().any(|a| a.as_str() == aud.as_str())
    }

    /// The named audiences, in claim order
    pub fn iter(&self) -> impl Iterator<Item = &AudienceRef> + '_ {
        self.0.iter().map(|a| &**a)
    }
}

impl From<Audience> for Audiences {
    fn from(aud: Audience) -> Self {
        Self(vec![aud])
    }
}

impl From<Vec<Audience>> for Audiences {
    fn from(auds: Vec<Audience>) -> Self {
        Self(auds)
    }
}

/// Checks the header algorithm and core claims of a token
///
/// The default validator approves no algorithms, requires an unexpired
/// `exp` with no grace period, and places no constraint on issuer or
/// audience.
#[derive(Clone, Debug, Default)]
#[must_use]
pub struct CoreValidator {
    algorithms: Vec<jwa::Algorithm>,
    audiences: Vec<Audience>,
    issuer: Option<Issuer>,
    leeway: Duration,
}

impl CoreValidator {
    /// Approves `alg` for token signatures
    pub fn approve(mut self, alg: jwa::Algorithm) -> Self {
        if !self.algorithms.contains(&alg) {
            self.algorithms.push(alg);
        }
        self
    }

    /// Approves every algorithm in `algs`
    pub fn approve_all(self, algs: impl IntoIterator<Item = jwa::Algorithm>) -> Self {
        algs.into_iter().fold(self, Self::approve)
    }

    /// Accepts tokens whose `aud` names `audience`
    pub fn allow_audience(mut self, audience: Audience) -> Self {
        self.audiences.push(audience);
        self
    }

    /// Rejects tokens whose `iss` is anything other than `issuer`
    pub fn require_issuer(self, issuer: Issuer) -> Self {
        Self {
            issuer: Some(issuer),
            ..self
        }
    }

    /// Keeps accepting tokens for `leeway` after their `exp`
    pub fn with_leeway(self, leeway: Duration) -> Self {
        Self { leeway, ..self }
    }

    /// The approved algorithms, in the order they were approved
    #[must_use]
    pub fn approved_algorithms(&self) -> &[jwa::Algorithm] {
        &self.algorithms
    }

    /// The required issuer, if any
    #[must_use]
    pub fn issuer(&self) -> Option<&IssuerRef> {
        self.issuer.as_deref()
    }

    /// Resolves an algorithm name from a token header against the allow-list
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a supported algorithm (this
    /// includes `none`) or the algorithm has not been approved.
    pub fn approve_algorithm(&self, alg: &str) -> Result<jwa::Algorithm, error::AlgorithmRejected> {
        alg.parse::<jwa::Algorithm>()
            .ok()
            .filter(|a| self.algorithms.contains(a))
            .ok_or_else(|| error::AlgorithmRejected(alg.to_owned()))
    }

    /// Validates the claims against the configured expectations
    ///
    /// The `exp` claim is checked first, then `iss`, then `aud`.
    ///
    /// # Errors
    ///
    /// Returns the first expectation the claims fail to meet.
    pub fn validate_with_clock<T, C>(&self, claims: &T, clock: &C) -> Result<(), error::ClaimsRejected>
    where
        T: CoreClaims,
        C: Clock + ?Sized,
    {
        use error::ClaimsRejected::*;

        let exp = claims.exp().ok_or(MissingRequiredClaim("exp"))?;
        if exp.plus(self.leeway) <= clock.now() {
            return Err(TokenExpired);
        }

        if let Some(required) = &self.issuer {
            let iss = claims.iss().ok_or(MissingRequiredClaim("iss"))?;
            if iss.as_str() != required.as_str() {
                return Err(InvalidIssuer);
            }
        }

        if !self.audiences.is_empty() {
            let aud = claims.aud();
            if aud.is_empty() {
                return Err(MissingRequiredClaim("aud"));
            }
            if !self.audiences.iter().any(|a| aud.contains(a)) {
                return Err(InvalidAudience);
            }
        }

        Ok(())
    }
}

/// The JOSE header of a JWT
///
/// `alg` is held as the raw name so that a token naming an unknown
/// algorithm still decomposes; the validator decides whether it is
/// acceptable.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct Headers {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kid: Option<jwk::KeyId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

impl Headers {
    /// A `typ: JWT` header naming `alg`
    pub fn new(alg: jwa::Algorithm) -> Self {
        Self {
            alg: alg.to_string(),
            kid: None,
            typ: Some("JWT".into()),
        }
    }

    /// Names the signing key
    pub fn with_key_id(mut self, kid: impl Into<jwk::KeyId>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    /// The algorithm name, unchecked
    #[must_use]
    pub fn alg(&self) -> &str {
        &self.alg
    }

    /// The signing key, if named
    #[must_use]
    pub fn kid(&self) -> Option<&jwk::KeyIdRef> {
        self.kid.as_deref()
    }

    /// The declared media type
    #[must_use]
    pub fn typ(&self) -> Option<&str> {
        self.typ.as_deref()
    }
}

/// The registered claims, and nothing else
///
/// Enough to mint and check tokens that carry no application claims.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct BasicClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iss: Option<Issuer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<Subject>,
    #[serde(default, skip_serializing_if = "Audiences::is_empty")]
    aud: Audiences,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<UnixTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<UnixTime>,
}

impl BasicClaims {
    /// No claims at all
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces `aud`
    pub fn with_audiences(mut self, aud: impl Into<Audiences>) -> Self {
        self.aud = aud.into();
        self
    }

    /// Sets `iss`
    pub fn with_issuer(mut self, iss: Issuer) -> Self {
        self.iss = Some(iss);
        self
    }

    /// Sets `sub`
    pub fn with_subject(mut self, sub: Subject) -> Self {
        self.sub = Some(sub);
        self
    }

    /// Sets `exp`
    pub fn with_expiration(mut self, exp: UnixTime) -> Self {
        self.exp = Some(exp);
        self
    }

    /// Sets `iat` to the current time and `exp` to `lifetime` later
    pub fn valid_for<C: Clock + ?Sized>(mut self, lifetime: Duration, clock: &C) -> Self {
        let now = clock.now();
        self.iat = Some(now);
        self.exp = Some(now.plus(lifetime));
        self
    }

    /// `iat`, if set
    #[must_use]
    pub fn iat(&self) -> Option<UnixTime> {
        self.iat
    }
}

impl CoreClaims for BasicClaims {
    fn exp(&self) -> Option<UnixTime> {
        self.exp
    }

    fn aud(&self) -> &Audiences {
        &self.aud
    }

    fn iss(&self) -> Option<&IssuerRef> {
        self.iss.as_deref()
    }

    fn sub(&self) -> Option<&SubjectRef> {
        self.sub.as_deref()
    }
}
