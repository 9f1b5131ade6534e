//! RSA JSON Web Algorithm implementations
//!
//! Verification and signing are delegated to [`ring`].

use super::Algorithm;

#[cfg(feature = "private-keys")]
mod private;
mod public;

#[cfg(feature = "private-keys")]
#[cfg_attr(docsrs, doc(cfg(feature = "private-keys")))]
pub use private::PrivateKey;
pub use public::PublicKey;

/// Smallest accepted modulus, in bytes (2048 bits)
pub const MIN_MODULUS_LEN: usize = 256;

/// Largest accepted modulus, in bytes (8192 bits)
pub const MAX_MODULUS_LEN: usize = 1024;

fn verification_params(alg: Algorithm) -> &'static ring::signature::RsaParameters {
    match alg {
        Algorithm::RS256 => &ring::signature::RSA_PKCS1_2048_8192_SHA256,
        Algorithm::RS384 => &ring::signature::RSA_PKCS1_2048_8192_SHA384,
        Algorithm::RS512 => &ring::signature::RSA_PKCS1_2048_8192_SHA512,
        Algorithm::PS256 => &ring::signature::RSA_PSS_2048_8192_SHA256,
        Algorithm::PS384 => &ring::signature::RSA_PSS_2048_8192_SHA384,
        Algorithm::PS512 => &ring::signature::RSA_PSS_2048_8192_SHA512,
    }
}

#[cfg(feature = "private-keys")]
fn signing_params(alg: Algorithm) -> &'static dyn ring::signature::RsaEncoding {
    match alg {
        Algorithm::RS256 => &ring::signature::RSA_PKCS1_SHA256,
        Algorithm::RS384 => &ring::signature::RSA_PKCS1_SHA384,
        Algorithm::RS512 => &ring::signature::RSA_PKCS1_SHA512,
        Algorithm::PS256 => &ring::signature::RSA_PSS_SHA256,
        Algorithm::PS384 => &ring::signature::RSA_PSS_SHA384,
        Algorithm::PS512 => &ring::signature::RSA_PSS_SHA512,
    }
}
