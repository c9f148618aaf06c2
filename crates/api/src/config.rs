//! Environment-driven configuration.

use chrono::Duration;
use dcim_auth::{SigningKey, TokenTtls};
use thiserror::Error;

const DEV_SIGNING_KEY: &str = "dcim-insecure-development-signing-key";

/// Upper bound for any token lifetime: ten years.
const MAX_TTL_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("APP_ENV must be one of dev, uat, prod (got '{0}')")]
    InvalidEnvironment(String),

    #[error("{key} must be a whole number of seconds between 1 and 315360000 (got '{value}')")]
    InvalidDuration { key: &'static str, value: String },

    #[error("{key} must be true/false/1/0 (got '{value}')")]
    InvalidFlag { key: &'static str, value: String },

    #[error("SIGNING_KEY must be set outside dev")]
    MissingSigningKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Dev,
    Uat,
    Prod,
}

impl Environment {
    pub fn is_dev(&self) -> bool {
        matches!(self, Environment::Dev)
    }

    /// Log level used when `RUST_LOG` is not set.
    pub fn default_log_level(&self) -> &'static str {
        match self {
            Environment::Dev => "debug",
            Environment::Uat | Environment::Prod => "info",
        }
    }
}

impl core::str::FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "uat" => Ok(Environment::Uat),
            "prod" => Ok(Environment::Prod),
            _ => Err(ConfigError::InvalidEnvironment(s.to_string())),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct AccessConfig {
    pub environment: Environment,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    signing_secret: String,
    /// Re-resolve roles live on sensitive endpoints.
    pub live_role_check: bool,
}

impl AccessConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map here).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let environment = match lookup("APP_ENV") {
            Some(v) => v.parse()?,
            None => Environment::default(),
        };

        let access_ttl = duration(&lookup, "ACCESS_TOKEN_TTL_SECONDS", 900)?;
        let refresh_ttl = duration(&lookup, "REFRESH_TOKEN_TTL_SECONDS", 7 * 24 * 60 * 60)?;

        let signing_secret = match lookup("SIGNING_KEY").filter(|k| !k.trim().is_empty()) {
            Some(key) => key,
            None if environment.is_dev() => {
                tracing::warn!("SIGNING_KEY not set; using insecure dev default");
                DEV_SIGNING_KEY.to_string()
            }
            None => return Err(ConfigError::MissingSigningKey),
        };

        let live_role_check = match lookup("PER_ENDPOINT_LIVE_ROLE_CHECK") {
            Some(v) => flag("PER_ENDPOINT_LIVE_ROLE_CHECK", &v)?,
            None => false,
        };

        Ok(Self {
            environment,
            access_ttl,
            refresh_ttl,
            signing_secret,
            live_role_check,
        })
    }

    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from_secret(self.signing_secret.as_bytes())
    }

    pub fn token_ttls(&self) -> TokenTtls {
        TokenTtls {
            access: self.access_ttl,
            refresh: self.refresh_ttl,
        }
    }

    pub fn default_log_level(&self) -> &'static str {
        self.environment.default_log_level()
    }

    /// Install the process-wide subscriber at this environment's default level.
    pub fn init_logging(&self) {
        dcim_observability::init(self.default_log_level());
    }
}

impl core::fmt::Debug for AccessConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccessConfig")
            .field("environment", &self.environment)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("signing_secret", &"<redacted>")
            .field("live_role_check", &self.live_role_check)
            .finish()
    }
}

fn duration(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default_secs: i64,
) -> Result<Duration, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(Duration::seconds(default_secs));
    };
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|secs| (1..=MAX_TTL_SECONDS).contains(secs))
        .and_then(Duration::try_seconds)
        .ok_or(ConfigError::InvalidDuration { key, value: raw })
}

fn flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            key,
            value: raw.to_string(),
        }),
    }
}
