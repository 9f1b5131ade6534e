//! JSON Web Signature, compact serialization only
//!
//! Defined by [RFC7515][].
//!
//! [RFC7515]: https://tools.ietf.org/html/rfc7515

use std::error::Error;

use crate::{b64::Base64Url, jwa::Algorithm};

/// Produces signatures over a JWS signing input
pub trait Signer {
    /// The error returned on failure to sign
    type Error: Error + Send + Sync + 'static;

    /// Signs `message` using `alg`
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot produce a signature.
    fn sign(&self, alg: Algorithm, message: &[u8]) -> Result<Vec<u8>, Self::Error>;
}

/// Checks signatures over a JWS signing input
pub trait Verifier {
    /// The error returned when a signature is not accepted
    type Error: Error + Send + Sync + 'static;

    /// Whether this key may be used with `alg` at all
    fn accepts(&self, alg: Algorithm) -> bool;

    /// Checks `signature` over `message` using `alg`
    ///
    /// # Errors
    ///
    /// Returns an error if the signature does not match or the key
    /// cannot be used with `alg`.
    fn verify(&self, alg: Algorithm, message: &[u8], signature: &[u8]) -> Result<(), Self::Error>;
}

/// The three still-encoded segments of a compact JWS
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Compact<'a> {
    message: &'a str,
    header: &'a str,
    payload: &'a str,
    signature: &'a str,
}

impl<'a> Compact<'a> {
    /// Splits `token` on `.`, requiring exactly three segments
    pub fn split(token: &'a str) -> Option<Self> {
        let (message, signature) = token.rsplit_once('.')?;
        let (header, payload) = message.split_once('.')?;
        if payload.contains('.') {
            return None;
        }

        Some(Self {
            message,
            header,
            payload,
            signature,
        })
    }

    /// The signing input, `header.payload`
    pub fn message(&self) -> &'a str {
        self.message
    }

    /// The encoded protected header
    pub fn header(&self) -> &'a str {
        self.header
    }

    /// The encoded payload
    pub fn payload(&self) -> &'a str {
        self.payload
    }

    /// The encoded signature, possibly empty
    pub fn signature(&self) -> &'a str {
        self.signature
    }
}

/// Signs an encoded header and payload, producing a compact JWS
///
/// # Errors
///
/// Returns an error if the signer fails.
pub fn sign_compact<S>(
    header: &Base64Url,
    payload: &Base64Url,
    alg: Algorithm,
    signer: &S,
) -> Result<String, S::Error>
where
    S: Signer + ?Sized,
{
    let mut token = format!("{header}.{payload}");
    let signature = signer.sign(alg, token.as_bytes())?;

    token.push('.');
    token.push_str(&Base64Url::from_raw(signature).to_string());
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_finds_segments() {
        let compact = Compact::split("aGVhZGVy.cGF5bG9hZA.c2ln").unwrap();

        assert_eq!(compact.header(), "aGVhZGVy");
        assert_eq!(compact.payload(), "cGF5bG9hZA");
        assert_eq!(compact.signature(), "c2ln");
        assert_eq!(compact.message(), "aGVhZGVy.cGF5bG9hZA");
    }

    #[test]
    fn split_allows_empty_signature() {
        let compact = Compact::split("aGVhZGVy.e30.").unwrap();
        assert_eq!(compact.signature(), "");
    }

    #[test]
    fn split_rejects_wrong_segment_count() {
        for token in ["", "abc", "a.b", "a.b.c.d", "..."] {
            assert_eq!(Compact::split(token), None, "{token}");
        }
    }
}
