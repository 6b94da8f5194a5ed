//! Layered configuration loading for VeloZ core crates.
//!
//! Configuration is loaded from an optional file, then overridden by
//! `VELOZ_`-prefixed environment variables, the same two-stage pattern the
//! gateway config in the teacher codebase uses. Missing variables that are
//! required in production (`VELOZ_ENV=production`) fail startup with exit
//! code 2 rather than silently defaulting.

use crate::constants::{
    DEFAULT_RATE_LIMIT_CAPACITY, DEFAULT_RATE_LIMIT_REFILL_PER_SEC, DEFAULT_WAL_CHECKPOINT_INTERVAL,
    DEFAULT_WAL_MAX_FILE_SIZE,
};
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// HTTP server bind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            static_dir: "./static".to_string(),
        }
    }
}

/// Token-based authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_secs: u64,
    pub admin_password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "dev-secret-do-not-use-in-production".to_string(),
            access_token_ttl_secs: 900,
            refresh_token_ttl_secs: 604_800,
            admin_password: "dev-admin".to_string(),
        }
    }
}

/// Token-bucket rate limiter defaults (per-route overrides live in
/// `veloz-gateway`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub capacity: u64,
    pub refill_per_sec: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_RATE_LIMIT_CAPACITY,
            refill_per_sec: DEFAULT_RATE_LIMIT_REFILL_PER_SEC,
        }
    }
}

/// CORS settings for the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origin: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origin: "*".to_string(),
        }
    }
}

/// Audit log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub dir: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            dir: "./audit".to_string(),
        }
    }
}

/// Write-ahead log settings (C6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalConfig {
    pub dir: String,
    pub prefix: String,
    pub max_file_size_bytes: u64,
    pub checkpoint_interval: u64,
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            dir: "./data/wal".to_string(),
            prefix: "veloz".to_string(),
            max_file_size_bytes: DEFAULT_WAL_MAX_FILE_SIZE,
            checkpoint_interval: DEFAULT_WAL_CHECKPOINT_INTERVAL,
        }
    }
}

/// Top-level configuration shared by the engine and gateway binaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub wal: WalConfig,
    /// `"production"`, `"staging"`, or `"development"` (default).
    #[serde(default = "default_env")]
    pub env: String,
}

fn default_env() -> String {
    "development".to_string()
}

/// Required env vars when `env == "production"`. Matches spec §6: host,
/// port, static dir, JWT secret, token lifetimes, admin password,
/// rate-limit capacity/refill, CORS origin, audit directory are all
/// expected to be explicitly set rather than left at insecure defaults.
const REQUIRED_IN_PRODUCTION: &[&str] = &[
    "VELOZ_SERVER__HOST",
    "VELOZ_SERVER__PORT",
    "VELOZ_SERVER__STATIC_DIR",
    "VELOZ_AUTH__JWT_SECRET",
    "VELOZ_AUTH__ACCESS_TOKEN_TTL_SECS",
    "VELOZ_AUTH__REFRESH_TOKEN_TTL_SECS",
    "VELOZ_AUTH__ADMIN_PASSWORD",
    "VELOZ_RATE_LIMIT__CAPACITY",
    "VELOZ_RATE_LIMIT__REFILL_PER_SEC",
    "VELOZ_CORS__ALLOWED_ORIGIN",
    "VELOZ_AUDIT__DIR",
];

/// Error loading configuration: either the layered sources could not be
/// parsed, or a production deployment is missing a required variable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("missing required environment variable in production: {0}")]
    MissingRequired(String),
}

impl CoreConfig {
    /// Load configuration from an optional file at `path`, layered with
    /// `VELOZ_`-prefixed environment variable overrides (`__` as the
    /// nested-key separator, e.g. `VELOZ_SERVER__PORT`).
    ///
    /// Callers in `main` should exit with code 2 on `Err`, per spec §6.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(
            Config::try_from(&Self::default())
                .expect("CoreConfig::default() serializes cleanly"),
        );
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        builder = builder.add_source(
            Environment::with_prefix("VELOZ")
                .separator("__")
                .try_parsing(true),
        );
        let settings = builder.build()?;
        let cfg: Self = settings.try_deserialize()?;

        if cfg.env == "production" {
            cfg.check_required_production_vars()?;
        }
        Ok(cfg)
    }

    fn check_required_production_vars(&self) -> Result<(), ConfigError> {
        for var in REQUIRED_IN_PRODUCTION {
            if std::env::var(var).is_err() {
                return Err(ConfigError::MissingRequired((*var).to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_a_file() {
        let cfg = CoreConfig::load(None).expect("defaults must be loadable");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.env, "development");
    }

    #[test]
    fn production_without_overrides_fails_closed() {
        // SAFETY-adjacent note: relies on no VELOZ_* production vars being
        // set in the test environment, which is true for CI and local runs.
        std::env::set_var("VELOZ_ENV", "production");
        let result = CoreConfig::load(None);
        std::env::remove_var("VELOZ_ENV");
        assert!(matches!(result, Err(ConfigError::MissingRequired(_))));
    }
}
