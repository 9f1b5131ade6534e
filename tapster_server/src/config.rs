//! Process configuration, from flags or the environment

use std::{net::SocketAddr, time::Duration};

use clap::Parser;
use tapster::{jwa, jwt};
use tapster_oauth2::{Authority, KeySetCache, RemoteKeySource};
use thiserror::Error;

/// Serves the drinks catalog
#[derive(Clone, Debug, Parser)]
#[command(version, about)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "TAPSTER_BIND", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// The identity provider's domain, e.g. `tapster.us.auth0.com`
    #[arg(long, env = "AUTH0_DOMAIN")]
    pub auth_domain: String,

    /// The audience tokens must be issued for
    #[arg(long, env = "API_AUDIENCE")]
    pub audience: jwt::Audience,

    /// The issuer tokens must come from [default: https://{domain}/]
    #[arg(long, env = "AUTH_ISSUER")]
    pub issuer: Option<jwt::Issuer>,

    /// Where the signing keys are published [default: https://{domain}/.well-known/jwks.json]
    #[arg(long, env = "JWKS_URL")]
    pub jwks_url: Option<String>,

    /// Signing algorithms to accept
    #[arg(
        long,
        env = "ALLOWED_ALGORITHMS",
        value_delimiter = ',',
        default_value = "RS256"
    )]
    pub algorithms: Vec<jwa::Algorithm>,

    /// Upper bound on a single key set fetch
    #[arg(long, env = "JWKS_TIMEOUT_SECS", default_value_t = 5)]
    pub jwks_timeout_secs: u64,

    /// Period of the background key set refresh, 0 to disable
    #[arg(long, env = "JWKS_REFRESH_SECS", default_value_t = 600)]
    pub jwks_refresh_secs: u64,

    /// Minimum time between refreshes triggered by unknown key ids
    #[arg(long, env = "JWKS_MIN_REFRESH_SECS", default_value_t = 30)]
    pub jwks_min_refresh_secs: u64,

    /// Tolerated clock skew when checking expiry
    #[arg(long = "leeway-secs", env = "TOKEN_LEEWAY_SECS", default_value_t = 0)]
    pub leeway_secs: u64,
}

/// The configuration cannot produce a working authority
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("at least one signing algorithm must be allowed")]
    NoAlgorithms,

    #[error("unable to construct key set client")]
    Client(#[from] reqwest::Error),
}

impl Config {
    fn domain(&self) -> &str {
        self.auth_domain
            .trim_start_matches("https://")
            .trim_end_matches('/')
    }

    /// The expected issuer
    pub fn issuer(&self) -> jwt::Issuer {
        self.issuer
            .clone()
            .unwrap_or_else(|| jwt::Issuer::new(format!("https://{}/", self.domain())))
    }

    /// The key discovery URL
    pub fn jwks_url(&self) -> String {
        self.jwks_url
            .clone()
            .unwrap_or_else(|| format!("https://{}/.well-known/jwks.json", self.domain()))
    }

    pub fn jwks_refresh_interval(&self) -> Option<Duration> {
        (self.jwks_refresh_secs > 0).then(|| Duration::from_secs(self.jwks_refresh_secs))
    }

    pub fn validator(&self) -> Result<jwt::CoreValidator, ConfigError> {
        if self.algorithms.is_empty() {
            return Err(ConfigError::NoAlgorithms);
        }

        Ok(jwt::CoreValidator::default()
            .approve_all(self.algorithms.iter().copied())
            .require_issuer(self.issuer())
            .allow_audience(self.audience.clone())
            .with_leeway(Duration::from_secs(self.leeway_secs)))
    }

    /// Builds an authority with a cold key set cache
    ///
    /// Nothing is fetched until the first token needs verifying.
    pub fn authority(&self) -> Result<Authority, ConfigError> {
        let timeout = Duration::from_secs(self.jwks_timeout_secs);
        let source = RemoteKeySource::new(self.jwks_url(), timeout)?;
        let keys = KeySetCache::new(source)
            .with_fetch_timeout(timeout)
            .with_min_refresh_interval(Duration::from_secs(self.jwks_min_refresh_secs));

        Ok(Authority::new(keys, self.validator()?))
    }
}
