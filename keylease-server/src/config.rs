//! Server configuration: defaults, an optional TOML file, and the environment.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:5000"
//! storage = "/var/lib/keylease/keys.json"
//! admin-password = "change-me"
//! session-ttl-secs = 43200
//! max-storage-bytes = 16777216
//! log = "info,keylease_core=debug"
//! ```

use crate::session::DEFAULT_SESSION_TTL_SECS;
use keylease_core::fs::DEFAULT_MAX_FILE_SIZE;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable holding the admin password.
pub const ADMIN_PASSWORD_ENV: &str = "KEYLEASE_ADMIN_PASSWORD";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Resolved server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub storage_path: PathBuf,
    pub admin_password: Option<String>,
    pub session_ttl_secs: i64,
    pub max_storage_bytes: u64,
    /// `EnvFilter` directives; the CLI verbosity flag applies when unset.
    pub log_filter: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 5000)),
            storage_path: PathBuf::from("keys.json"),
            admin_password: None,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            max_storage_bytes: DEFAULT_MAX_FILE_SIZE,
            log_filter: None,
        }
    }
}

/// Raw TOML structure matching the config file format.
#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    server: ServerSection,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ServerSection {
    bind: Option<SocketAddr>,
    storage: Option<PathBuf>,
    admin_password: Option<String>,
    session_ttl_secs: Option<i64>,
    max_storage_bytes: Option<u64>,
    log: Option<String>,
}

impl ServerConfig {
    /// Loads settings from a TOML file, filling unset values with defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parses settings from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(contents)?;
        let section = file.server;
        let defaults = Self::default();
        if let Some(ttl) = section.session_ttl_secs.filter(|ttl| *ttl <= 0) {
            return Err(ConfigError::Invalid {
                key: "session-ttl-secs",
                reason: format!("must be positive, got {ttl}"),
            });
        }
        Ok(Self {
            bind: section.bind.unwrap_or(defaults.bind),
            storage_path: section.storage.unwrap_or(defaults.storage_path),
            admin_password: section.admin_password.filter(|p| !p.is_empty()),
            session_ttl_secs: section.session_ttl_secs.unwrap_or(defaults.session_ttl_secs),
            max_storage_bytes: section.max_storage_bytes.unwrap_or(defaults.max_storage_bytes),
            log_filter: section.log,
        })
    }

    /// Applies an admin password taken from the environment, if one is set.
    #[must_use]
    pub fn with_admin_password_from(mut self, env_value: Option<String>) -> Self {
        if let Some(password) = env_value.filter(|p| !p.is_empty()) {
            self.admin_password = Some(password);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_defaults() {
        assert_eq!(ServerConfig::from_toml_str("").unwrap(), ServerConfig::default());
    }

    #[test]
    fn full_file() {
        let config = ServerConfig::from_toml_str(
            r#"
            [server]
            bind = "127.0.0.1:8080"
            storage = "/tmp/keys.json"
            admin-password = "secret"
            session-ttl-secs = 60
            max-storage-bytes = 1024
            log = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.bind, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.storage_path, PathBuf::from("/tmp/keys.json"));
        assert_eq!(config.admin_password.as_deref(), Some("secret"));
        assert_eq!(config.session_ttl_secs, 60);
        assert_eq!(config.max_storage_bytes, 1024);
        assert_eq!(config.log_filter.as_deref(), Some("debug"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            ServerConfig::from_toml_str("[server]\nport = 5000\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn non_positive_session_ttl_is_rejected() {
        for ttl in ["0", "-60"] {
            assert!(matches!(
                ServerConfig::from_toml_str(&format!("[server]\nsession-ttl-secs = {ttl}\n")),
                Err(ConfigError::Invalid { key: "session-ttl-secs", .. })
            ));
        }
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ServerConfig::load(&dir.path().join("absent.toml")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn environment_password_overrides_file() {
        let config = ServerConfig::from_toml_str("[server]\nadmin-password = \"file\"\n")
            .unwrap()
            .with_admin_password_from(Some("env".into()));
        assert_eq!(config.admin_password.as_deref(), Some("env"));

        let config = ServerConfig::default().with_admin_password_from(Some(String::new()));
        assert_eq!(config.admin_password, None);
    }
}
