use serde::{Deserialize, Serialize};

use super::{verification_params, MAX_MODULUS_LEN, MIN_MODULUS_LEN};
use crate::{
    b64::Base64Url,
    error::{InvalidKey, KeyMismatch},
    jwa::Algorithm,
    jws,
};

/// The `n` and `e` members of an RSA JWK
///
/// Sizes are checked when the key is loaded, so a key that deserializes can
/// be handed straight to [`ring`].
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Components")]
pub struct PublicKey {
    n: Base64Url,
    e: Base64Url,
}

#[derive(Deserialize)]
struct Components {
    n: Base64Url,
    e: Base64Url,
}

impl TryFrom<Components> for PublicKey {
    type Error = InvalidKey;

    fn try_from(c: Components) -> Result<Self, Self::Error> {
        Self::from_components(c.n, c.e)
    }
}

impl PublicKey {
    /// Builds a key from its big-endian modulus and exponent
    ///
    /// # Errors
    ///
    /// Fails if the modulus is not 2048 to 8192 bits long, ignoring a single
    /// leading zero byte, or if the exponent is zero.
    pub fn from_components(
        modulus: impl Into<Base64Url>,
        exponent: impl Into<Base64Url>,
    ) -> Result<Self, InvalidKey> {
        let n = modulus.into();
        let e = exponent.into();

        let bytes = n.as_slice().strip_prefix(&[0]).unwrap_or(n.as_slice());
        if bytes.len() < MIN_MODULUS_LEN || bytes.len() > MAX_MODULUS_LEN {
            return Err(InvalidKey::new(format!(
                "modulus of {} bits is outside 2048..=8192",
                bytes.len() * 8
            )));
        }

        if !e.as_slice().iter().any(|&b| b != 0) {
            return Err(InvalidKey::new("exponent is zero"));
        }

        Ok(Self { n, e })
    }

    /// The modulus, big-endian
    pub fn modulus(&self) -> &[u8] {
        self.n.as_slice()
    }

    /// The public exponent, big-endian
    pub fn exponent(&self) -> &[u8] {
        self.e.as_slice()
    }
}

impl jws::Verifier for PublicKey {
    type Error = KeyMismatch;

    fn accepts(&self, _alg: Algorithm) -> bool {
        true
    }

    fn verify(&self, alg: Algorithm, message: &[u8], signature: &[u8]) -> Result<(), KeyMismatch> {
        ring::signature::RsaPublicKeyComponents {
            n: self.modulus(),
            e: self.exponent(),
        }
        .verify(verification_params(alg), message, signature)
        .map_err(|_| KeyMismatch::Signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modulus_must_be_at_least_2048_bits() {
        let err = PublicKey::from_components(vec![0xC5; 255], vec![1, 0, 1]).unwrap_err();
        assert_eq!(err.reason(), "modulus of 2040 bits is outside 2048..=8192");
    }

    #[test]
    fn one_leading_zero_is_not_counted() {
        let mut n = vec![0];
        n.extend([0xC5; 256]);
        assert!(PublicKey::from_components(n, vec![1, 0, 1]).is_ok());
    }

    #[test]
    fn zero_exponent_is_refused() {
        let err = PublicKey::from_components(vec![0xC5; 256], vec![0, 0]).unwrap_err();
        assert_eq!(err.reason(), "exponent is zero");
    }

    #[test]
    fn both_members_are_required() {
        assert!(serde_json::from_str::<PublicKey>(r#"{"n":"AQAB"}"#).is_err());
    }
}
