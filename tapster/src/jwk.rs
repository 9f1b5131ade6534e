//! JSON Web Keys, RSA only
//!
//! Every key must carry a `kid`. Tokens always name the key that signed
//! them, so an anonymous key could never be selected. See [RFC7517][].
//!
//! [RFC7517]: https://tools.ietf.org/html/rfc7517

use aliri_braid::braid;
use serde::{Deserialize, Serialize};

use crate::{
    error::KeyMismatch,
    jwa,
    jws::{self, Verifier},
};

/// The `kid` of a published key
#[braid(serde, ref_doc = "A borrowed [`KeyId`]")]
pub struct KeyId;

/// A public key as published in a key set
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Published")]
#[must_use]
pub struct Jwk {
    kid: KeyId,
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    usage: Option<jwa::Usage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    alg: Option<jwa::Algorithm>,
    #[serde(flatten)]
    material: Material,
}

/// A key as read, before its pinned algorithm is checked against its type
#[derive(Deserialize)]
struct Published {
    kid: KeyId,
    #[serde(rename = "use", default)]
    usage: Option<jwa::Usage>,
    #[serde(default)]
    alg: Option<jwa::Algorithm>,
    #[serde(flatten)]
    material: Material,
}

impl TryFrom<Published> for Jwk {
    type Error = KeyMismatch;

    fn try_from(p: Published) -> Result<Self, KeyMismatch> {
        match p.alg {
            Some(alg) if !p.material.accepts(alg) => Err(KeyMismatch::Algorithm(alg)),
            _ => Ok(Self {
                kid: p.kid,
                usage: p.usage,
                alg: p.alg,
                material: p.material,
            }),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kty")]
enum Material {
    #[serde(rename = "RSA")]
    Rsa(jwa::rsa::PublicKey),
}

impl jws::Verifier for Material {
    type Error = KeyMismatch;

    fn accepts(&self, alg: jwa::Algorithm) -> bool {
        match self {
            Self::Rsa(key) => key.accepts(alg),
        }
    }

    fn verify(&self, alg: jwa::Algorithm, message: &[u8], signature: &[u8]) -> Result<(), KeyMismatch> {
        match self {
            Self::Rsa(key) => key.verify(alg, message, signature),
        }
    }
}

impl Jwk {
    /// A signing key with no pinned algorithm
    pub fn from_rsa(kid: KeyId, key: jwa::rsa::PublicKey) -> Self {
        Self {
            kid,
            usage: None,
            alg: None,
            material: Material::Rsa(key),
        }
    }

    /// The `kid`
    #[must_use]
    pub fn key_id(&self) -> &KeyIdRef {
        &self.kid
    }

    /// The published `use`, if any
    #[must_use]
    pub fn usage(&self) -> Option<jwa::Usage> {
        self.usage
    }

    /// The pinned `alg`, if any
    #[must_use]
    pub fn algorithm(&self) -> Option<jwa::Algorithm> {
        self.alg
    }

    /// Whether a signature made with `alg` may be checked against this key
    #[must_use]
    pub fn is_compatible(&self, alg: jwa::Algorithm) -> bool {
        self.check(alg).is_ok()
    }

    /// A key published for encryption, or pinned to another algorithm, is
    /// never used to check a signature.
    fn check(&self, alg: jwa::Algorithm) -> Result<(), KeyMismatch> {
        if self.usage.is_some_and(|u| u != jwa::Usage::Signing) {
            return Err(KeyMismatch::Usage);
        }

        let pinned = self.alg.is_some_and(|a| a != alg);
        if pinned || !self.material.accepts(alg) {
            return Err(KeyMismatch::Algorithm(alg));
        }

        Ok(())
    }
}

impl Verifier for Jwk {
    type Error = KeyMismatch;

    fn accepts(&self, alg: jwa::Algorithm) -> bool {
        self.is_compatible(alg)
    }

    fn verify(&self, alg: jwa::Algorithm, message: &[u8], signature: &[u8]) -> Result<(), KeyMismatch> {
        self.check(alg)?;
        self.material.verify(alg, message, signature)
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;

    use super::*;
    use crate::test::rsa::*;

    #[test]
    fn reads_published_rsa_key() -> Result<()> {
        let jwk: Jwk = serde_json::from_str(JWK)?;
        assert_eq!(jwk.key_id().as_str(), TEST_KEY_ID);
        assert_eq!(jwk.algorithm(), Some(jwa::Algorithm::RS256));
        assert_eq!(jwk.usage(), Some(jwa::Usage::Signing));
        Ok(())
    }

    #[test]
    fn kid_is_required() {
        assert!(serde_json::from_str::<Jwk>(JWK_WITHOUT_KID).is_err());
    }

    #[test]
    fn pinned_algorithm_is_enforced() -> Result<()> {
        let jwk: Jwk = serde_json::from_str(JWK)?;
        assert!(jwk.is_compatible(jwa::Algorithm::RS256));
        assert!(!jwk.is_compatible(jwa::Algorithm::PS256));
        assert_eq!(
            jwk.verify(jwa::Algorithm::PS256, b"data", &[0; 256]),
            Err(KeyMismatch::Algorithm(jwa::Algorithm::PS256))
        );
        Ok(())
    }

    #[test]
    fn unpinned_key_accepts_any_rsa_algorithm() -> Result<()> {
        let published: Jwk = serde_json::from_str(JWK)?;
        let jwk = Jwk::from_rsa(published.key_id().to_owned(), serde_json::from_str(JWK)?);
        assert!(jwa::Algorithm::ALL.into_iter().all(|alg| jwk.is_compatible(alg)));
        Ok(())
    }

    #[test]
    fn garbage_signature_does_not_match() -> Result<()> {
        let jwk: Jwk = serde_json::from_str(JWK)?;
        assert_eq!(
            jwk.verify(jwa::Algorithm::RS256, b"data", &[0x42; 256]),
            Err(KeyMismatch::Signature)
        );
        Ok(())
    }

    #[test]
    fn encryption_keys_never_verify() -> Result<()> {
        let mut value: serde_json::Value = serde_json::from_str(JWK)?;
        value["use"] = "enc".into();
        let jwk: Jwk = serde_json::from_value(value)?;

        assert!(!jwk.is_compatible(jwa::Algorithm::RS256));
        assert_eq!(
            jwk.verify(jwa::Algorithm::RS256, b"data", &[0; 256]),
            Err(KeyMismatch::Usage)
        );
        Ok(())
    }

    #[test]
    fn written_back_with_kty() -> Result<()> {
        let jwk: Jwk = serde_json::from_str(JWK)?;
        let value = serde_json::to_value(&jwk)?;
        assert_eq!(value["kty"], "RSA");
        assert_eq!(value["kid"], TEST_KEY_ID);
        assert_eq!(value["use"], "sig");
        assert_eq!(value["e"], "AQAB");
        Ok(())
    }
}
