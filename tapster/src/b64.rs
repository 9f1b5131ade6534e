//! Byte buffers that serialize as URL-safe base64
//!
//! Bytes are held decoded and only encoded again when written out.
//!
//! ```
//! use tapster::b64::Base64Url;
//!
//! let data = Base64Url::from_encoded("aGVsbG8sIHdvcmxkIQ").unwrap();
//! assert_eq!(data.as_slice(), b"hello, world!");
//! assert_eq!(format!("{:?}", data), "Base64Url(aGVsbG8sIHdvcmxkIQ)");
//! ```

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Input that is not unpadded base64url
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("invalid base64url data")]
pub struct InvalidBase64Data(#[from] base64::DecodeError);

/// Bytes written as unpadded base64url
#[derive(Clone, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[must_use]
pub struct Base64Url(Vec<u8>);

impl Base64Url {
    /// Wraps bytes that are not yet encoded
    pub fn from_raw(raw: impl Into<Vec<u8>>) -> Self {
        Self(raw.into())
    }

    /// Decodes unpadded base64url
    ///
    /// # Errors
    ///
    /// Padding, the standard alphabet, and non-canonical trailing bits are
    /// all refused.
    pub fn from_encoded(encoded: impl AsRef<[u8]>) -> Result<Self, InvalidBase64Data> {
        Ok(Self(URL_SAFE_NO_PAD.decode(encoded)?))
    }

    /// The decoded bytes
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.0)
    }
}

impl From<Vec<u8>> for Base64Url {
    fn from(raw: Vec<u8>) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Base64Url {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl fmt::Debug for Base64Url {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Base64Url({})", self.encode())
    }
}

impl Serialize for Base64Url {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Base64Url {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        Self::from_encoded(&*encoded).map_err(de::Error::custom)
    }
}
