//! Server configuration.
//!
//! A [`ServerConfig`] can be built in code or read from TOML:
//!
//! ```toml
//! host = "127.0.0.1"
//! port = 8080
//! max_request_size = 1048576
//! error_exposure = "generic"
//! ```
//!
//! Every key is optional; missing keys take the defaults of
//! [`ServerConfig::default`].

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Default cap on a buffered request, head and body together (8 MiB).
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Errors produced while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// What the client learns about a failed handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorExposure {
    /// The failure's own message is sent as `{"error": message}`.
    #[default]
    Detailed,
    /// Server-side failures (5xx) are reported as `"Internal Server Error"`;
    /// the real message only goes to the log.
    Generic,
}

/// Listening address and request handling limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_request_size: usize,
    pub error_exposure: ErrorExposure,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 8080,
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
            error_exposure: ErrorExposure::Detailed,
        }
    }
}

impl ServerConfig {
    /// Default configuration listening on `port` on all interfaces.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub fn max_request_size(mut self, bytes: usize) -> Self {
        self.max_request_size = bytes;
        self
    }

    #[must_use]
    pub fn error_exposure(mut self, exposure: ErrorExposure) -> Self {
        self.error_exposure = exposure;
        self
    }

    /// `host:port`, as passed to the TCP listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".to_owned()));
        }
        if self.max_request_size == 0 {
            return Err(ConfigError::Invalid(
                "max_request_size must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }
}
