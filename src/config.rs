//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;

use crate::error::AppError;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub chat: ChatConfig,
    pub realtime: RealtimeConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origin, or "*" for any origin
    pub cors_origin: String,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
    /// Maximum pooled connections
    pub max_connections: u32,
}

/// Authentication configuration
///
/// Sessions are issued by the external account service and signed with
/// the shared secret below.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session secret key (32+ bytes)
    pub session_secret: String,
}

/// Chat limits
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Longest accepted message body, in characters
    pub max_message_chars: usize,
    /// Length of the preview carried by new-message notifications
    pub preview_chars: usize,
}

/// Realtime channel configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Maximum concurrent WebSocket connections
    pub max_connections: usize,
    /// Outbound events queued per connection before it is dropped
    pub outbound_buffer: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter level when RUST_LOG is unset
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load and validate configuration
    ///
    /// Later sources win: built-in defaults, `config/default.toml`,
    /// `config/local.toml`, then `RAPPORT__SECTION__KEY` variables.
    pub fn load() -> Result<Self, AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.cors_origin", "*")?
            .set_default("database.path", "./data/rapport.db")?
            .set_default("database.max_connections", 8)?
            .set_default("chat.max_message_chars", 4000)?
            .set_default("chat.preview_chars", 50)?
            .set_default("realtime.max_connections", 1024)?
            .set_default("realtime.outbound_buffer", 256)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("RAPPORT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: Self = config.try_deserialize()?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<(), AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.auth.session_secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(AppError::Config(format!(
                "auth.session_secret must be at least {MIN_SESSION_SECRET_BYTES} bytes"
            )));
        }

        let limits = [
            ("database.max_connections", self.database.max_connections as usize),
            ("chat.max_message_chars", self.chat.max_message_chars),
            ("chat.preview_chars", self.chat.preview_chars),
            ("realtime.max_connections", self.realtime.max_connections),
            ("realtime.outbound_buffer", self.realtime.outbound_buffer),
        ];
        if let Some((key, _)) = limits.iter().find(|(_, value)| *value == 0) {
            return Err(AppError::Config(format!("{key} must be greater than 0")));
        }

        Ok(())
    }

    /// Settings that are accepted but probably not what was meant
    ///
    /// Returned rather than logged: configuration loads before the tracing
    /// subscriber exists.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            warnings.push(format!(
                "unknown logging.format {:?}; using pretty output",
                self.logging.format
            ));
        }
        warnings
    }
}
