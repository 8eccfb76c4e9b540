//! Token manager configuration.

use serde::{Deserialize, Serialize};

use crate::error::TokenError;

/// Environment variable prefix read by [`TokenConfig::with_env_overrides`].
pub const ENV_PREFIX: &str = "WARDEN_";

/// Which representation tokens take on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenFormat {
    /// Claims embedded and signed (compact JWS).
    #[default]
    Signed,
    /// Random identifier resolved through a token store.
    Opaque,
}

/// HMAC algorithm used for signed tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    #[default]
    HS256,
    HS384,
    HS512,
}

impl From<SigningAlgorithm> for jsonwebtoken::Algorithm {
    fn from(value: SigningAlgorithm) -> Self {
        match value {
            SigningAlgorithm::HS256 => jsonwebtoken::Algorithm::HS256,
            SigningAlgorithm::HS384 => jsonwebtoken::Algorithm::HS384,
            SigningAlgorithm::HS512 => jsonwebtoken::Algorithm::HS512,
        }
    }
}

impl core::str::FromStr for SigningAlgorithm {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HS256" => Ok(Self::HS256),
            "HS384" => Ok(Self::HS384),
            "HS512" => Ok(Self::HS512),
            other => Err(TokenError::Config(format!("unknown signing algorithm '{other}'"))),
        }
    }
}

/// Token manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Token representation.
    pub format: TokenFormat,
    /// HMAC secret for signed tokens.
    #[serde(skip_serializing)]
    pub secret: String,
    /// Signing algorithm for signed tokens.
    pub algorithm: SigningAlgorithm,
    /// Issuer written to and required from signed tokens.
    pub issuer: String,
    /// Audience written to and required from signed tokens.
    pub audience: String,
    /// Access token lifetime in seconds.
    pub access_ttl_secs: i64,
    /// Refresh token lifetime in seconds.
    pub refresh_ttl_secs: i64,
    /// Interval between background cleanup sweeps.
    pub cleanup_interval_secs: u64,
    /// Attempts made to revoke a rotated refresh token before giving up.
    pub revoke_retry_attempts: u32,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            format: TokenFormat::Signed,
            secret: String::new(),
            algorithm: SigningAlgorithm::HS256,
            issuer: "warden".to_string(),
            audience: "warden".to_string(),
            access_ttl_secs: 15 * 60,
            refresh_ttl_secs: 7 * 24 * 60 * 60,
            cleanup_interval_secs: 60,
            revoke_retry_attempts: 3,
        }
    }
}

impl TokenConfig {
    /// Signed-token configuration with the given secret.
    pub fn signed(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Default::default()
        }
    }

    /// Opaque-token configuration.
    pub fn opaque() -> Self {
        Self {
            format: TokenFormat::Opaque,
            ..Default::default()
        }
    }

    pub fn with_access_ttl_secs(mut self, secs: i64) -> Self {
        self.access_ttl_secs = secs;
        self
    }

    pub fn with_refresh_ttl_secs(mut self, secs: i64) -> Self {
        self.refresh_ttl_secs = secs;
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    /// Reject configurations the manager cannot run with.
    pub fn validate(&self) -> Result<(), TokenError> {
        if self.format == TokenFormat::Signed {
            if self.secret.is_empty() {
                return Err(TokenError::Config("signing secret is not configured".to_string()));
            }
            if self.secret.len() < 32 {
                tracing::warn!("signing secret is shorter than recommended (32 bytes)");
            }
        }
        if self.access_ttl_secs <= 0 {
            return Err(TokenError::Config("access_ttl_secs must be positive".to_string()));
        }
        if self.refresh_ttl_secs <= 0 {
            return Err(TokenError::Config("refresh_ttl_secs must be positive".to_string()));
        }
        if self.cleanup_interval_secs == 0 {
            return Err(TokenError::Config("cleanup_interval_secs must be positive".to_string()));
        }
        Ok(())
    }

    /// Overlay `WARDEN_*` environment variables on top of `self`.
    pub fn with_env_overrides(self) -> Result<Self, TokenError> {
        self.overlay(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    fn overlay<F>(mut self, lookup: F) -> Result<Self, TokenError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("TOKEN_SECRET").filter(|v| !v.is_empty()) {
            self.secret = v;
        }
        if let Some(v) = lookup("TOKEN_FORMAT") {
            self.format = match v.trim().to_ascii_lowercase().as_str() {
                "signed" => TokenFormat::Signed,
                "opaque" => TokenFormat::Opaque,
                other => {
                    return Err(TokenError::Config(format!("unknown token format '{other}'")));
                }
            };
        }
        if let Some(v) = lookup("TOKEN_ALGORITHM") {
            self.algorithm = v.parse()?;
        }
        if let Some(v) = lookup("TOKEN_ISSUER") {
            self.issuer = v;
        }
        if let Some(v) = lookup("TOKEN_AUDIENCE") {
            self.audience = v;
        }
        if let Some(v) = lookup("ACCESS_TTL_SECS") {
            self.access_ttl_secs = parse_number("ACCESS_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("REFRESH_TTL_SECS") {
            self.refresh_ttl_secs = parse_number("REFRESH_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("CLEANUP_INTERVAL_SECS") {
            self.cleanup_interval_secs = parse_number("CLEANUP_INTERVAL_SECS", &v)?;
        }
        Ok(self)
    }
}

fn parse_number<T: core::str::FromStr>(key: &str, value: &str) -> Result<T, TokenError> {
    value
        .trim()
        .parse()
        .map_err(|_| TokenError::Config(format!("{ENV_PREFIX}{key} is not a number: '{value}'")))
}
