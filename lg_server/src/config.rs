//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use chrono::Duration;
use ledger_guard::{
    auth::{AdminPolicy, AuthConfig, config::MAX_TOKEN_TTL_SECS},
    db::DatabaseConfig,
    security::{RateLimitConfig, RateLimitPolicy},
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

const DEFAULT_BIND: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080);
const MIN_JWT_SECRET_LEN: usize = 32;
const MIN_PEPPER_LEN: usize = 16;

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Database configuration; `None` keeps all state in memory
    pub database: Option<DatabaseConfig>,
    /// Token secrets and lifetimes
    pub auth: AuthConfig,
    /// Administrator emails
    pub admin_emails: Vec<String>,
    /// Budgets per operation class
    pub rate_limits: RateLimitConfig,
    /// Take the client IP from `X-Forwarded-For`
    pub trust_proxy_headers: bool,
    /// Prometheus exporter address
    pub metrics_bind: Option<SocketAddr>,
}

/// Command line overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind: Option<SocketAddr>,
    pub database_url: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), overrides)
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F, overrides: ConfigOverrides) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind = match overrides.bind {
            Some(bind) => bind,
            None => parse_or(&lookup, "SERVER_BIND", DEFAULT_BIND)?,
        };

        let database = match overrides.database_url.or_else(|| lookup("DATABASE_URL")) {
            Some(url) if !url.trim().is_empty() => {
                let defaults = DatabaseConfig::with_url(url);
                Some(DatabaseConfig {
                    max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", defaults.max_connections)?,
                    min_connections: parse_or(&lookup, "DB_MIN_CONNECTIONS", defaults.min_connections)?,
                    connection_timeout_secs: parse_or(
                        &lookup,
                        "DB_CONNECTION_TIMEOUT_SECS",
                        defaults.connection_timeout_secs,
                    )?,
                    idle_timeout_secs: parse_or(&lookup, "DB_IDLE_TIMEOUT_SECS", defaults.idle_timeout_secs)?,
                    max_lifetime_secs: parse_or(&lookup, "DB_MAX_LIFETIME_SECS", defaults.max_lifetime_secs)?,
                    database_url: defaults.database_url,
                })
            }
            _ => None,
        };

        // Security configuration (REQUIRED)
        let jwt_secret = lookup("JWT_SECRET").ok_or_else(|| ConfigError::MissingRequired {
            var: "JWT_SECRET".to_string(),
            hint: "Generate with: openssl rand -hex 32".to_string(),
        })?;

        let password_pepper =
            lookup("PASSWORD_PEPPER").ok_or_else(|| ConfigError::MissingRequired {
                var: "PASSWORD_PEPPER".to_string(),
                hint: "Generate with: openssl rand -hex 16".to_string(),
            })?;

        let mut auth = AuthConfig::new(jwt_secret, password_pepper);
        auth.access_token_ttl = parse_ttl(&lookup, "ACCESS_TOKEN_TTL_SECS", auth.access_token_ttl)?;
        auth.refresh_token_ttl =
            parse_ttl(&lookup, "REFRESH_TOKEN_TTL_SECS", auth.refresh_token_ttl)?;
        auth.reset_token_ttl = parse_ttl(&lookup, "RESET_TOKEN_TTL_SECS", auth.reset_token_ttl)?;

        let admin_emails = lookup("ADMIN_EMAILS")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut rate_limits = RateLimitConfig::default();
        for policy in RateLimitPolicy::ALL {
            let prefix = format!("RATE_LIMIT_{}", policy.name().to_uppercase());
            let budget = rate_limits.budget_mut(policy);
            budget.max_requests = parse_or(&lookup, &format!("{prefix}_MAX"), budget.max_requests)?;
            budget.window_secs =
                parse_or(&lookup, &format!("{prefix}_WINDOW_SECS"), budget.window_secs)?;
        }

        let trust_proxy_headers = parse_or(&lookup, "TRUST_PROXY_HEADERS", false)?;

        let metrics_bind = match lookup("METRICS_BIND") {
            Some(addr) if !addr.trim().is_empty() => {
                Some(addr.trim().parse().map_err(|_| ConfigError::Invalid {
                    var: "METRICS_BIND".to_string(),
                    reason: format!("'{addr}' is not an IP:PORT address"),
                })?)
            }
            _ => None,
        };

        Ok(ServerConfig {
            bind,
            database,
            auth,
            admin_emails,
            rate_limits,
            trust_proxy_headers,
            metrics_bind,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Invalid {
                var: "JWT_SECRET".to_string(),
                reason: format!("Must be at least {MIN_JWT_SECRET_LEN} characters (128-bit security)"),
            });
        }

        if self.auth.password_pepper.len() < MIN_PEPPER_LEN {
            return Err(ConfigError::Invalid {
                var: "PASSWORD_PEPPER".to_string(),
                reason: format!("Must be at least {MIN_PEPPER_LEN} characters (64-bit security)"),
            });
        }

        for (var, ttl) in [
            ("ACCESS_TOKEN_TTL_SECS", self.auth.access_token_ttl),
            ("REFRESH_TOKEN_TTL_SECS", self.auth.refresh_token_ttl),
            ("RESET_TOKEN_TTL_SECS", self.auth.reset_token_ttl),
        ] {
            if ttl <= Duration::zero() {
                return Err(ConfigError::Invalid {
                    var: var.to_string(),
                    reason: "Must be greater than 0".to_string(),
                });
            }
            if ttl > Duration::seconds(MAX_TOKEN_TTL_SECS) {
                return Err(ConfigError::Invalid {
                    var: var.to_string(),
                    reason: format!("Must not exceed {MAX_TOKEN_TTL_SECS} seconds"),
                });
            }
        }

        if self.auth.refresh_token_ttl <= self.auth.access_token_ttl {
            return Err(ConfigError::Invalid {
                var: "REFRESH_TOKEN_TTL_SECS".to_string(),
                reason: "Must be longer than the access token lifetime".to_string(),
            });
        }

        self.rate_limits
            .validate()
            .map_err(|e| ConfigError::Invalid {
                var: "RATE_LIMIT_*".to_string(),
                reason: e.to_string(),
            })?;

        if let Some(database) = &self.database
            && database.min_connections > database.max_connections
        {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed max connections ({})",
                    database.max_connections
                ),
            });
        }

        Ok(())
    }

    pub fn admin_policy(&self) -> AdminPolicy {
        AdminPolicy::new(&self.admin_emails)
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Parse a lifetime in seconds, rejecting values outside `chrono`'s range
fn parse_ttl<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = parse_or(lookup, key, default.num_seconds())?;
    Duration::try_seconds(secs).ok_or_else(|| ConfigError::Invalid {
        var: key.to_string(),
        reason: format!("{secs} seconds is out of range"),
    })
}

/// Parse a variable, falling back to `default` when it is unset or blank
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => {
            value.trim().parse().map_err(|_| ConfigError::Invalid {
                var: key.to_string(),
                reason: format!("Cannot parse '{value}'"),
            })
        }
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned(), ConfigOverrides::default())
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            ("JWT_SECRET", "0123456789abcdef0123456789abcdef"),
            ("PASSWORD_PEPPER", "0123456789abcdef"),
        ]
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingRequired {
            var: "JWT_SECRET".to_string(),
            hint: "Use openssl".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("JWT_SECRET"));
        assert!(msg.contains("Use openssl"));
    }

    #[test]
    fn test_defaults() {
        let config = load(&required()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.bind, "127.0.0.1:8080".parse().unwrap());
        assert!(config.database.is_none());
        assert_eq!(config.auth.access_token_ttl, Duration::minutes(15));
        assert_eq!(config.auth.refresh_token_ttl, Duration::days(7));
        assert_eq!(config.auth.reset_token_ttl, Duration::hours(1));
        assert_eq!(config.rate_limits, RateLimitConfig::default());
        assert!(!config.trust_proxy_headers);
        assert!(config.admin_policy().is_empty());
    }

    #[test]
    fn test_missing_secret() {
        let err = load(&[("PASSWORD_PEPPER", "0123456789abcdef")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { ref var, .. } if var == "JWT_SECRET"));
    }

    #[test]
    fn test_short_secret_rejected() {
        let config = load(&[
            ("JWT_SECRET", "short"),
            ("PASSWORD_PEPPER", "0123456789abcdef"),
        ])
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { ref var, .. }) if var == "JWT_SECRET"
        ));
    }

    #[test]
    fn test_overrides_from_env() {
        let mut vars = required();
        vars.extend([
            ("RATE_LIMIT_AUTH_MAX", "3"),
            ("RATE_LIMIT_HEAVY_WINDOW_SECS", "120"),
            ("ADMIN_EMAILS", "Root@Example.com, ops@example.com ,"),
            ("ACCESS_TOKEN_TTL_SECS", "60"),
            ("TRUST_PROXY_HEADERS", "true"),
            ("DATABASE_URL", "postgres://localhost/ledger"),
            ("DB_MAX_CONNECTIONS", "7"),
        ]);
        let config = load(&vars).unwrap();
        config.validate().unwrap();

        assert_eq!(config.rate_limits.auth.max_requests, 3);
        assert_eq!(config.rate_limits.heavy.window_secs, 120);
        assert_eq!(config.admin_emails.len(), 2);
        assert!(config.admin_policy().is_admin("root@example.com"));
        assert_eq!(config.auth.access_token_ttl, Duration::seconds(60));
        assert!(config.trust_proxy_headers);
        assert_eq!(config.database.unwrap().max_connections, 7);
    }

    #[test]
    fn test_zero_budget_rejected() {
        let mut vars = required();
        vars.push(("RATE_LIMIT_DESTRUCTIVE_MAX", "0"));
        let config = load(&vars).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unparsable_value_rejected() {
        let mut vars = required();
        vars.push(("RATE_LIMIT_CREATE_MAX", "many"));
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { ref var, .. }) if var == "RATE_LIMIT_CREATE_MAX"
        ));
    }

    #[test]
    fn test_ttl_beyond_duration_range_is_config_error() {
        let mut vars = required();
        vars.push(("ACCESS_TOKEN_TTL_SECS", "9223372036854775807"));
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { ref var, .. }) if var == "ACCESS_TOKEN_TTL_SECS"
        ));
    }

    #[test]
    fn test_oversized_ttl_rejected_by_validate() {
        let mut vars = required();
        vars.push(("REFRESH_TOKEN_TTL_SECS", "9000000000000"));
        let config = load(&vars).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { ref var, .. }) if var == "REFRESH_TOKEN_TTL_SECS"
        ));
    }
}
