//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use bracketeer::bracket::BracketFormat;
use bracketeer::db::DatabaseConfig;
use std::net::SocketAddr;

/// Default bind address
pub const DEFAULT_BIND: ([u8; 4], u16) = ([127, 0, 0, 1], 8080);

/// Default database URL when neither flag nor environment provides one
pub const DEFAULT_DATABASE_URL: &str = "postgres://postgres@localhost/bracketeer";

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Where tournaments are stored
    pub storage: StorageConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Bracket defaults
    pub bracket: BracketDefaultsConfig,
    /// Admin account created on startup when missing
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// Storage backend selection
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// PostgreSQL pool
    Postgres(DatabaseConfig),
    /// Process-local store, lost on restart
    Memory,
}

/// Security-related configuration
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// JWT signing secret (required)
    pub jwt_secret: String,
    /// Password hashing pepper (required)
    pub password_pepper: String,
    /// Access token lifetime
    pub token_lifetime_hours: i64,
}

/// Bracket defaults
#[derive(Debug, Clone)]
pub struct BracketDefaultsConfig {
    /// Format used when a start request names none
    pub default_format: BracketFormat,
    /// Buffered events per websocket subscriber
    pub event_capacity: usize,
}

/// Admin credentials from `BOOTSTRAP_ADMIN_USERNAME` / `BOOTSTRAP_ADMIN_PASSWORD`
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    /// * `memory` - Use the in-memory store instead of PostgreSQL
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
        memory: bool,
    ) -> Result<Self, ConfigError> {
        Self::from_lookup(
            |key| std::env::var(key).ok(),
            bind_override,
            database_url_override,
            memory,
        )
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(
        lookup: F,
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
        memory: bool,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Bind address
        let bind = match bind_override {
            Some(bind) => bind,
            None => match lookup("SERVER_BIND") {
                Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                    var: "SERVER_BIND".to_string(),
                    reason: format!("'{}' is not an IP:PORT address", raw),
                })?,
                None => SocketAddr::from(DEFAULT_BIND),
            },
        };

        // Storage
        let memory = memory || parse_or(&lookup, "BRACKETEER_MEMORY", false);
        let storage = if memory {
            StorageConfig::Memory
        } else {
            let database_url = database_url_override
                .or_else(|| lookup("DATABASE_URL"))
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

            StorageConfig::Postgres(DatabaseConfig {
                database_url,
                max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10),
                min_connections: parse_or(&lookup, "DB_MIN_CONNECTIONS", 1),
                connection_timeout_secs: parse_or(&lookup, "DB_CONNECTION_TIMEOUT_SECS", 5),
                idle_timeout_secs: parse_or(&lookup, "DB_IDLE_TIMEOUT_SECS", 300),
                max_lifetime_secs: parse_or(&lookup, "DB_MAX_LIFETIME_SECS", 1800),
            })
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

        let security = SecurityConfig {
            jwt_secret,
            password_pepper,
            token_lifetime_hours: parse_or(&lookup, "TOKEN_LIFETIME_HOURS", 12),
        };

        // Bracket defaults
        let default_format = match lookup("DEFAULT_BRACKET_FORMAT") {
            Some(raw) => raw
                .to_lowercase()
                .parse()
                .map_err(|_| ConfigError::Invalid {
                    var: "DEFAULT_BRACKET_FORMAT".to_string(),
                    reason: format!("'{}' is not 'single' or 'double'", raw),
                })?,
            None => BracketFormat::Single,
        };

        let bracket = BracketDefaultsConfig {
            default_format,
            event_capacity: parse_or(&lookup, "EVENT_CHANNEL_CAPACITY", 256),
        };

        let bootstrap_admin = match (
            lookup("BOOTSTRAP_ADMIN_USERNAME"),
            lookup("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(username), Some(password)) => Some(BootstrapAdmin { username, password }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::MissingRequired {
                    var: "BOOTSTRAP_ADMIN_PASSWORD".to_string(),
                    hint: "Set it together with BOOTSTRAP_ADMIN_USERNAME".to_string(),
                });
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingRequired {
                    var: "BOOTSTRAP_ADMIN_USERNAME".to_string(),
                    hint: "Set it together with BOOTSTRAP_ADMIN_PASSWORD".to_string(),
                });
            }
        };

        Ok(ServerConfig {
            bind,
            storage,
            security,
            bracket,
            bootstrap_admin,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate security params
        if self.security.jwt_secret.len() < 32 {
            return Err(ConfigError::Invalid {
                var: "JWT_SECRET".to_string(),
                reason: "Must be at least 32 characters (128-bit security)".to_string(),
            });
        }

        if self.security.password_pepper.len() < 16 {
            return Err(ConfigError::Invalid {
                var: "PASSWORD_PEPPER".to_string(),
                reason: "Must be at least 16 characters (64-bit security)".to_string(),
            });
        }

        if self.security.token_lifetime_hours <= 0 {
            return Err(ConfigError::Invalid {
                var: "TOKEN_LIFETIME_HOURS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.bracket.event_capacity == 0 {
            return Err(ConfigError::Invalid {
                var: "EVENT_CHANNEL_CAPACITY".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        // Validate pool sizes
        if let StorageConfig::Postgres(database) = &self.storage {
            if database.max_connections == 0 {
                return Err(ConfigError::Invalid {
                    var: "DB_MAX_CONNECTIONS".to_string(),
                    reason: "Must be greater than 0".to_string(),
                });
            }

            if database.min_connections > database.max_connections {
                return Err(ConfigError::Invalid {
                    var: "DB_MIN_CONNECTIONS".to_string(),
                    reason: format!(
                        "Cannot exceed max connections ({})",
                        database.max_connections
                    ),
                });
            }
        }

        Ok(())
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

/// Helper to parse a variable with default fallback
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
