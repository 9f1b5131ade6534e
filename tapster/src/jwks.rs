use serde::{Deserialize, Serialize};

use crate::{jwk, Jwk};

/// A JSON Web Key Set (JWKS)
///
/// Deserialization is strict about the records this crate can use and
/// lenient about the rest:
///
/// * a record without `kid` or `kty` fails the whole set,
/// * an RSA record whose key material is missing or unusable fails the whole set,
/// * a record of another key type, usage, or algorithm is skipped with a warning,
/// * a repeated `kid` keeps the first record and skips the rest with a warning.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    #[serde(deserialize_with = "deserialize_keys")]
    keys: Vec<Jwk>,
}

impl Jwks {
    /// Adds a key to the set
    ///
    /// Returns `false` and leaves the set unchanged if a key with the same
    /// id is already present.
    pub fn add_key(&mut self, key: Jwk) -> bool {
        if self.get_key_by_id(key.key_id()).is_some() {
            return false;
        }

        self.keys.push(key);
        true
    }

    /// A view of the keys in this set
    #[must_use]
    pub fn keys(&self) -> &[Jwk] {
        &self.keys
    }

    /// The number of keys in this set
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether this set holds no keys
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Gets the key with the given id
    #[must_use]
    pub fn get_key_by_id(&self, kid: &jwk::KeyIdRef) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.key_id() == kid)
    }
}

impl FromIterator<Jwk> for Jwks {
    fn from_iter<I: IntoIterator<Item = Jwk>>(iter: I) -> Self {
        let mut jwks = Self::default();
        for key in iter {
            jwks.add_key(key);
        }
        jwks
    }
}

fn deserialize_keys<'de, D>(deserializer: D) -> Result<Vec<Jwk>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    struct JwkLike {
        #[serde(default)]
        kid: Option<jwk::KeyId>,
        #[serde(default)]
        kty: Option<String>,
        #[serde(rename = "use", default)]
        r#use: Option<String>,
        #[serde(default)]
        alg: Option<String>,
    }

    impl JwkLike {
        fn is_supported(&self) -> bool {
            self.kty.as_deref() == Some("RSA")
                && self.r#use.as_deref().map_or(true, |u| u == "sig")
                && self
                    .alg
                    .as_deref()
                    .map_or(true, |a| a.parse::<crate::jwa::Algorithm>().is_ok())
        }
    }

    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    let mut values: Vec<Jwk> = Vec::with_capacity(raw.len());

    for (index, value) in raw.into_iter().enumerate() {
        let like: JwkLike = serde_json::from_value(value.clone())
            .map_err(|e| D::Error::custom(format_args!("JWK at index {index}: {e}")))?;

        let kid = match (&like.kid, &like.kty) {
            (Some(kid), Some(_)) => kid.clone(),
            _ => {
                return Err(D::Error::custom(format_args!(
                    "JWK at index {index} is missing `kid` or `kty`"
                )))
            }
        };

        if !like.is_supported() {
            tracing::warn!(
                jwks.idx = index,
                jwk.kid = %kid,
                jwk.kty = ?like.kty,
                "jwk.use" = ?like.r#use,
                jwk.alg = ?like.alg,
                "ignoring unsupported JWK"
            );
            continue;
        }

        if values.iter().any(|k| k.key_id() == &*kid) {
            tracing::warn!(jwks.idx = index, jwk.kid = %kid, "ignoring duplicate JWK");
            continue;
        }

        let jwk: Jwk = serde_json::from_value(value)
            .map_err(|e| D::Error::custom(format_args!("JWK `{kid}` is malformed: {e}")))?;
        values.push(jwk);
    }

    Ok(values)
}
