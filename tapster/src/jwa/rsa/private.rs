use std::{fmt, sync::Arc};

use ring::{rand::SystemRandom, signature::RsaKeyPair};

use super::signing_params;
use crate::{
    error::{InvalidKey, SigningError},
    jwa::Algorithm,
    jws,
};

/// An RSA key pair for minting tokens in tests and local tooling
///
/// Request handling only ever verifies, so servers never load one of these.
#[derive(Clone)]
#[must_use]
pub struct PrivateKey {
    pair: Arc<RsaKeyPair>,
    rng: SystemRandom,
}

impl PrivateKey {
    /// Loads a PKCS#8 v1 DER-encoded RSA private key
    ///
    /// # Errors
    ///
    /// Fails if the document is not an RSA key that `ring` can sign with.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, InvalidKey> {
        let pair = RsaKeyPair::from_pkcs8(der).map_err(|e| InvalidKey::new(e.to_string()))?;

        Ok(Self {
            pair: Arc::new(pair),
            rng: SystemRandom::new(),
        })
    }

    /// Length of every signature this key produces, in bytes
    #[must_use]
    pub fn signature_len(&self) -> usize {
        self.pair.public().modulus_len()
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("bits", &(self.signature_len() * 8))
            .finish_non_exhaustive()
    }
}

impl jws::Signer for PrivateKey {
    type Error = SigningError;

    fn sign(&self, alg: Algorithm, message: &[u8]) -> Result<Vec<u8>, SigningError> {
        let mut signature = vec![0; self.signature_len()];
        self.pair
            .sign(signing_params(alg), &self.rng, message, &mut signature)
            .map_err(|_| SigningError::Backend)?;

        Ok(signature)
    }
}
