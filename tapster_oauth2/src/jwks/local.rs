use async_trait::async_trait;
use tapster::Jwks;

use super::KeySource;
use crate::KeySetError;

/// A key source that always yields the same keys
///
/// Useful for tests and for deployments that pin their keys.
#[derive(Clone, Debug, Default)]
pub struct StaticKeySource {
    jwks: Jwks,
}

impl StaticKeySource {
    /// Constructs a source around a fixed key set
    pub fn new(jwks: Jwks) -> Self {
        Self { jwks }
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn fetch(&self) -> Result<Jwks, KeySetError> {
        Ok(self.jwks.clone())
    }

    fn describe(&self) -> &str {
        "static"
    }
}
