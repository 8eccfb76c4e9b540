use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use warden_auth::AuthorizationConfig;
use warden_observability::ObservabilityConfig;
use warden_tokens::TokenConfig;

/// Top-level configuration file.
///
/// ```json
/// {
///   "tokens": { "format": "signed", "secret": "...", "access_ttl_secs": 900 },
///   "authorization": { "combining_algorithm": "deny-overrides" },
///   "observability": { "level": "info", "format": "json" }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub tokens: TokenConfig,
    pub authorization: AuthorizationConfig,
    pub observability: ObservabilityConfig,
}

impl WardenConfig {
    /// Parse, overlay `WARDEN_*` environment variables and validate.
    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let mut config: WardenConfig = serde_json::from_str(raw).context("parse warden config")?;
        config.tokens = config
            .tokens
            .with_env_overrides()
            .context("apply WARDEN_* overrides")?;
        config.tokens.validate().context("validate token config")?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("load config file {}", path.display()))
    }
}
