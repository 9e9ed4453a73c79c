use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

use axum::http::HeaderValue;
use studio_core::chat::DEFAULT_MAX_MESSAGE_CHARS;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Log output format selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    pub database_url: String,
    /// Root directory for artifact blobs.
    pub storage_root: PathBuf,
    /// Upper bound for one chat message, in characters.
    pub chat_max_message_chars: usize,
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                  | Default                 |
    /// |--------------------------|-------------------------|
    /// | `HOST`                   | `0.0.0.0`               |
    /// | `PORT`                   | `3000`                  |
    /// | `CORS_ORIGINS`           | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                    |
    /// | `DATABASE_URL`           | `sqlite://studio.db`    |
    /// | `STORAGE_ROOT`           | `./storage`             |
    /// | `CHAT_MAX_MESSAGE_CHARS` | `4000`                  |
    /// | `LOG_FORMAT`             | `pretty` (or `json`)    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let host = var("HOST", "0.0.0.0");
        if host.parse::<IpAddr>().is_err() {
            return Err(invalid("HOST", "an IP address", host));
        }

        let port = parse("PORT", &var("PORT", "3000"), "a valid u16")?;

        let cors_origins: Vec<String> = var("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if let Some(bad) = cors_origins
            .iter()
            .find(|o| o.parse::<HeaderValue>().is_err())
        {
            return Err(invalid("CORS_ORIGINS", "a list of valid origins", bad.clone()));
        }

        let request_timeout_secs = parse(
            "REQUEST_TIMEOUT_SECS",
            &var("REQUEST_TIMEOUT_SECS", "30"),
            "a valid u64",
        )?;

        let chat_max_message_chars: usize = parse(
            "CHAT_MAX_MESSAGE_CHARS",
            &var("CHAT_MAX_MESSAGE_CHARS", &DEFAULT_MAX_MESSAGE_CHARS.to_string()),
            "a positive integer",
        )?;
        if chat_max_message_chars == 0 {
            return Err(invalid("CHAT_MAX_MESSAGE_CHARS", "a positive integer", "0".into()));
        }

        let log_format = match var("LOG_FORMAT", "pretty").to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" | "text" => LogFormat::Pretty,
            other => return Err(invalid("LOG_FORMAT", "'pretty' or 'json'", other.to_string())),
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            database_url: var("DATABASE_URL", "sqlite://studio.db"),
            storage_root: PathBuf::from(var("STORAGE_ROOT", "./storage")),
            chat_max_message_chars,
            log_format,
        })
    }
}

fn invalid(var: &'static str, expected: &'static str, value: String) -> ConfigError {
    ConfigError::Invalid {
        var,
        expected,
        value,
    }
}

fn parse<T: FromStr>(var: &'static str, value: &str, expected: &'static str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(var, expected, value.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.database_url, "sqlite://studio.db");
        assert_eq!(config.chat_max_message_chars, 4000);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("PORT", "8080"),
            ("CORS_ORIGINS", "http://a.test, http://b.test,"),
            ("CHAT_MAX_MESSAGE_CHARS", "500"),
            ("LOG_FORMAT", "JSON"),
            ("STORAGE_ROOT", "/var/lib/studio"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.chat_max_message_chars, 500);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.storage_root, PathBuf::from("/var/lib/studio"));
    }

    #[test]
    fn invalid_values_are_reported() {
        assert_matches!(
            load(&[("PORT", "http")]),
            Err(ConfigError::Invalid { var: "PORT", .. })
        );
        assert_matches!(
            load(&[("HOST", "localhost:3000")]),
            Err(ConfigError::Invalid { var: "HOST", .. })
        );
        assert_matches!(
            load(&[("CHAT_MAX_MESSAGE_CHARS", "0")]),
            Err(ConfigError::Invalid { var: "CHAT_MAX_MESSAGE_CHARS", .. })
        );
        assert_matches!(
            load(&[("LOG_FORMAT", "xml")]),
            Err(ConfigError::Invalid { var: "LOG_FORMAT", .. })
        );
    }
}
