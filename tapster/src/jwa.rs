//! JSON Web Algorithms, RSA signatures only
//!
//! Names outside the RSA family, `none` and HMAC among them, fail to parse.
//!
//! The registered names are defined in [RFC7518][].
//!
//! [RFC7518]: https://tools.ietf.org/html/rfc7518

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::UnknownAlgorithm;

pub mod rsa;

/// An RSA signature algorithm, by its registered `alg` name
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::upper_case_acronyms)]
#[non_exhaustive]
pub enum Algorithm {
    /// RSASSA-PKCS1-v1_5 using SHA-256
    RS256,
    /// RSASSA-PKCS1-v1_5 using SHA-384
    RS384,
    /// RSASSA-PKCS1-v1_5 using SHA-512
    RS512,
    /// RSASSA-PSS using SHA-256 and MGF1 with SHA-256
    PS256,
    /// RSASSA-PSS using SHA-384 and MGF1 with SHA-384
    PS384,
    /// RSASSA-PSS using SHA-512 and MGF1 with SHA-512
    PS512,
}

impl Algorithm {
    /// Every supported algorithm
    pub const ALL: [Algorithm; 6] = [
        Self::RS256,
        Self::RS384,
        Self::RS512,
        Self::PS256,
        Self::PS384,
        Self::PS512,
    ];

    /// The registered `alg` name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::PS256 => "PS256",
            Self::PS384 => "PS384",
            Self::PS512 => "PS512",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = UnknownAlgorithm;

    fn from_str(name: &str) -> Result<Self, UnknownAlgorithm> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.as_str() == name)
            .ok_or_else(|| UnknownAlgorithm(name.to_owned()))
    }
}

/// The `use` member of a JWK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub enum Usage {
    /// Signatures
    #[serde(rename = "sig")]
    Signing,

    /// Encryption, which this crate never performs
    #[serde(rename = "enc")]
    Encryption,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_registered_names() {
        for alg in Algorithm::ALL {
            assert_eq!(alg.as_str().parse::<Algorithm>().unwrap(), alg);
        }
    }

    #[test]
    fn none_is_not_an_algorithm() {
        assert!("none".parse::<Algorithm>().is_err());
    }

    #[test]
    fn hmac_is_not_supported() {
        assert!("HS256".parse::<Algorithm>().is_err());
    }

    #[test]
    fn names_are_case_sensitive() {
        assert!("rs256".parse::<Algorithm>().is_err());
    }

    #[test]
    fn serde_uses_registered_names() {
        let alg: Algorithm = serde_json::from_str(r#""PS384""#).unwrap();
        assert_eq!(alg, Algorithm::PS384);
        assert_eq!(serde_json::to_string(&Algorithm::RS512).unwrap(), r#""RS512""#);
    }
}
