//! Environment-driven configuration.
//!
//! Everything is read once at startup and validated before any side effect;
//! a bad value stops the process instead of surfacing on the first request.

use std::net::SocketAddr;

use chrono::Duration;
use thiserror::Error;

use gatehouse_auth::{AdminDescriptor, ZonedClock};
use gatehouse_infra::PropagationMode;

pub const ENV_APP_NAME: &str = "GATEHOUSE_APP_NAME";
pub const ENV_JWT_SECRET: &str = "GATEHOUSE_JWT_SECRET";
pub const ENV_TIMEZONE: &str = "GATEHOUSE_TIMEZONE";
pub const ENV_ACCESS_TTL: &str = "GATEHOUSE_JWT_EXPIRE_ACCESS_SECS";
pub const ENV_REFRESH_TTL: &str = "GATEHOUSE_JWT_EXPIRE_REFRESH_SECS";
pub const ENV_SUPER_USER: &str = "GATEHOUSE_SUPER_USER";
pub const ENV_SUPER_USER_EMAIL: &str = "GATEHOUSE_SUPER_USER_EMAIL";
pub const ENV_SUPER_USER_PASS: &str = "GATEHOUSE_SUPER_USER_PASS";
pub const ENV_SUPER_USER_NAME: &str = "GATEHOUSE_SUPER_USER_NAME";
pub const ENV_SUPER_USER_PHONE: &str = "GATEHOUSE_SUPER_USER_PHONE";
pub const ENV_RECONCILE_MODE: &str = "GATEHOUSE_RECONCILE_MODE";
pub const ENV_BIND_ADDR: &str = "GATEHOUSE_BIND_ADDR";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("admin account is partially configured: user, email and password must be set together")]
    IncompleteAdmin,
}

impl ConfigurationError {
    fn invalid(var: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Token issuer.
    pub app_name: String,
    pub jwt_secret: String,
    /// IANA timezone id used to stamp tokens.
    pub timezone: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub admin: Option<AdminDescriptor>,
    pub reconcile_mode: PropagationMode,
    pub bind_addr: SocketAddr,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigurationError::Missing(key));

        let config = Self {
            app_name: require(ENV_APP_NAME)?,
            jwt_secret: require(ENV_JWT_SECRET)?,
            timezone: require(ENV_TIMEZONE)?,
            access_ttl: parse_ttl(ENV_ACCESS_TTL, &require(ENV_ACCESS_TTL)?)?,
            refresh_ttl: parse_ttl(ENV_REFRESH_TTL, &require(ENV_REFRESH_TTL)?)?,
            admin: admin_from(&get)?,
            reconcile_mode: match get(ENV_RECONCILE_MODE) {
                Some(raw) => raw
                    .parse::<PropagationMode>()
                    .map_err(|e: String| ConfigurationError::invalid(ENV_RECONCILE_MODE, e))?,
                None => PropagationMode::default(),
            },
            bind_addr: get(ENV_BIND_ADDR)
                .as_deref()
                .unwrap_or(DEFAULT_BIND_ADDR)
                .parse::<SocketAddr>()
                .map_err(|e: std::net::AddrParseError| {
                    ConfigurationError::invalid(ENV_BIND_ADDR, e.to_string())
                })?,
            database_url: get(ENV_DATABASE_URL),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check a configuration regardless of how it was built.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.app_name.trim().is_empty() {
            return Err(ConfigurationError::Missing(ENV_APP_NAME));
        }
        if self.jwt_secret.is_empty() {
            return Err(ConfigurationError::Missing(ENV_JWT_SECRET));
        }
        if self.timezone.trim().is_empty() {
            return Err(ConfigurationError::Missing(ENV_TIMEZONE));
        }
        ZonedClock::resolve(&self.timezone)
            .map_err(|e| ConfigurationError::invalid(ENV_TIMEZONE, e.to_string()))?;
        if self.access_ttl <= Duration::zero() {
            return Err(ConfigurationError::invalid(ENV_ACCESS_TTL, "must be greater than zero"));
        }
        if self.refresh_ttl <= Duration::zero() {
            return Err(ConfigurationError::invalid(ENV_REFRESH_TTL, "must be greater than zero"));
        }
        if let Some(admin) = &self.admin {
            if admin.username.is_empty() || admin.email.is_empty() || admin.password.is_empty() {
                return Err(ConfigurationError::IncompleteAdmin);
            }
        }
        Ok(())
    }
}

fn parse_ttl(var: &'static str, raw: &str) -> Result<Duration, ConfigurationError> {
    let secs: i64 = raw
        .parse()
        .map_err(|_| ConfigurationError::invalid(var, format!("'{raw}' is not a whole number of seconds")))?;
    if secs <= 0 {
        return Err(ConfigurationError::invalid(var, "must be greater than zero"));
    }
    Duration::try_seconds(secs).ok_or_else(|| ConfigurationError::invalid(var, "out of range"))
}

fn admin_from<G>(get: &G) -> Result<Option<AdminDescriptor>, ConfigurationError>
where
    G: Fn(&str) -> Option<String>,
{
    let username = get(ENV_SUPER_USER);
    let email = get(ENV_SUPER_USER_EMAIL);
    let password = get(ENV_SUPER_USER_PASS);

    match (username, email, password) {
        (None, None, None) => Ok(None),
        (Some(username), Some(email), Some(password)) => Ok(Some(AdminDescriptor {
            display_name: get(ENV_SUPER_USER_NAME).unwrap_or_else(|| username.clone()),
            phone: get(ENV_SUPER_USER_PHONE),
            username,
            email,
            password,
        })),
        _ => Err(ConfigurationError::IncompleteAdmin),
    }
}
