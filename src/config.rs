//! Service configuration
//!
//! Layered as built-in defaults, then an optional TOML file, then
//! environment variables (`SERVICE_PORT`, `DATABASE_URL`, `MAX_CONNECTIONS`,
//! `API_PATH`, `REQUEST_TIMEOUT`, `LOG_FORMAT`).

use crate::error::{RecError, Result};
use crate::http_transport::HttpServerConfig;
use crate::logging::LogFormat;
use config::{Config, Environment, File, FileFormat, Map};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATABASE_URL: &str = "sqlite://rec.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_REQUEST_TIMEOUT: &str = "10s";

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub service_port: u16,
    pub database_url: String,
    pub max_connections: u32,
    /// Overrides the request path in generated page links
    #[serde(default)]
    pub api_path: Option<String>,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub log_format: LogFormat,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_port: DEFAULT_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            api_path: None,
            request_timeout: Duration::from_secs(10),
            log_format: LogFormat::default(),
        }
    }
}

impl ServiceConfig {
    /// Load from defaults, `file` if given, and the process environment
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::load_with_env(file, None)
    }

    /// Like [`ServiceConfig::load`], reading environment variables from
    /// `env` instead of the process when it is `Some`.
    pub fn load_with_env(file: Option<&Path>, env: Option<Map<String, String>>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("service_port", i64::from(DEFAULT_PORT))?
            .set_default("database_url", DEFAULT_DATABASE_URL)?
            .set_default("max_connections", i64::from(DEFAULT_MAX_CONNECTIONS))?
            .set_default("request_timeout", DEFAULT_REQUEST_TIMEOUT)?
            .set_default("log_format", "compact")?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        let config: Self = builder
            .add_source(Environment::default().try_parsing(true).source(env))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.service_port == 0 {
            return Err(RecError::config("SERVICE_PORT must not be 0"));
        }
        if self.database_url.trim().is_empty() {
            return Err(RecError::config("DATABASE_URL must not be empty"));
        }
        if self.max_connections == 0 {
            return Err(RecError::config("MAX_CONNECTIONS must be at least 1"));
        }
        Ok(())
    }

    pub fn http_server_config(&self) -> HttpServerConfig {
        HttpServerConfig {
            port: self.service_port,
            api_path: self.api_path.clone().filter(|p| !p.is_empty()),
            request_timeout: self.request_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> Option<Map<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::load_with_env(None, env(&[])).unwrap();
        assert_eq!(config.service_port, 8080);
        assert_eq!(config.database_url, "sqlite://rec.db");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.log_format, LogFormat::Compact);
        assert_eq!(config.api_path, None);
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "service_port = 9000\ndatabase_url = \"sqlite::memory:\"\nrequest_timeout = \"2s\"").unwrap();

        let config = ServiceConfig::load_with_env(
            Some(file.path()),
            env(&[("SERVICE_PORT", "9100"), ("API_PATH", "/api/observations"), ("LOG_FORMAT", "json")]),
        )
        .unwrap();

        assert_eq!(config.service_port, 9100);
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert_eq!(config.api_path.as_deref(), Some("/api/observations"));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_validate_rejects_port_zero_and_empty_url() {
        let err = ServiceConfig::load_with_env(None, env(&[("SERVICE_PORT", "0")])).unwrap_err();
        assert!(matches!(err, RecError::Config(_)));

        let config = ServiceConfig {
            database_url: " ".to_string(),
            ..ServiceConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = ServiceConfig::load_with_env(Some(Path::new("/nonexistent/rec.toml")), env(&[]))
            .unwrap_err();
        assert!(matches!(err, RecError::Config(_)));
    }
}
