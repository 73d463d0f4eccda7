//! Configuration management
//!
//! Settings are read in this order of precedence:
//! 1. Environment variables
//! 2. The `cb-gateway.toml` configuration file
//! 3. Default values
//!
//! `${VAR_NAME}` inside the file is replaced with the environment variable.

use cb_schedule::ReminderConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::{Error, Result};

/// Default configuration file name
pub const DEFAULT_CONFIG_PATH: &str = "cb-gateway.toml";

/// Matrix bot account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatrixConfig {
    /// Homeserver base URL
    #[serde(default = "default_homeserver")]
    pub homeserver: String,

    /// Fully qualified bot account, e.g. `@calendarbot:example.org`
    #[serde(default = "default_account_id")]
    pub account_id: String,

    /// Access token; the bot is disabled while empty
    #[serde(default)]
    pub token: String,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            homeserver: default_homeserver(),
            account_id: default_account_id(),
            token: String::new(),
        }
    }
}

fn default_homeserver() -> String {
    "https://example.org".to_string()
}

fn default_account_id() -> String {
    "@calendarbot:example.org".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "cb-gateway.db".to_string()
}

/// Main configuration for cb-gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Matrix bot configuration
    #[serde(default)]
    pub matrix: MatrixConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Reminder computation settings
    #[serde(default)]
    pub reminders: ReminderConfig,
}

impl Config {
    /// Replace `${VAR_NAME}` with the environment variable's value
    ///
    /// Unset variables expand to an empty string.
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next(); // consume '{'

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Parse a TOML document, expanding environment variables first
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let expanded = Self::expand_env_vars(content);
        let config: Config = toml::from_str(&expanded)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        config.reminders.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    ///
    /// Environment variables override file values.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load the file at `path`, creating it with defaults when missing
    ///
    /// Returns the configuration and whether the file was just created.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<(Self, bool)> {
        let path = path.as_ref();

        if path.exists() {
            return Ok((Self::from_toml_file(path)?, false));
        }

        let config = Self::default();
        config.write(path)?;
        info!("Created default configuration at {}", path.display());

        Ok((config, true))
    }

    /// Write the configuration as TOML
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path.as_ref(), content)?;

        // The file holds the access token.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path.as_ref(), std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Override settings from environment variables
    fn apply_env_overrides(&mut self) {
        if let Ok(homeserver) = std::env::var("MATRIX_HOMESERVER") {
            if !homeserver.is_empty() {
                self.matrix.homeserver = homeserver;
            }
        }
        if let Ok(account_id) = std::env::var("MATRIX_ACCOUNT_ID") {
            if !account_id.is_empty() {
                self.matrix.account_id = account_id;
            }
        }
        if let Ok(token) = std::env::var("MATRIX_TOKEN") {
            self.matrix.token = token;
        }
        if let Ok(path) = std::env::var("DB_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
    }

    /// Whether the Matrix bot can be started
    pub fn matrix_enabled(&self) -> bool {
        !self.matrix.token.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        // SAFETY: only this test touches this variable.
        unsafe { std::env::set_var("CB_TEST_EXPAND_TOKEN", "secret") };
        assert_eq!(
            Config::expand_env_vars("token = \"${CB_TEST_EXPAND_TOKEN}\""),
            "token = \"secret\""
        );
        assert_eq!(Config::expand_env_vars("${CB_TEST_UNSET_VAR_XYZ}x"), "x");
        assert_eq!(Config::expand_env_vars("$HOME"), "$HOME");
    }

    #[test]
    fn test_parse_toml() {
        let config = Config::from_toml_str(
            r#"
[matrix]
homeserver = "https://matrix.example.net"
token = "abc"

[reminders]
offsets_minutes = [0, 15]
"#,
        )
        .unwrap();

        assert_eq!(config.matrix.homeserver, "https://matrix.example.net");
        assert_eq!(config.matrix.account_id, "@calendarbot:example.org");
        assert_eq!(config.database.path, "cb-gateway.db");
        assert_eq!(config.reminders.offsets_minutes, vec![0, 15]);
        assert_eq!(config.reminders.horizon_hours, 24);
        assert!(config.matrix_enabled());
    }

    #[test]
    fn test_invalid_reminders_rejected() {
        let result = Config::from_toml_str("[reminders]\nrefresh_minutes = 0\n");
        assert!(matches!(result, Err(Error::Schedule(_))));
    }

    #[test]
    fn test_load_or_create() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("cb-gateway.toml");

        let (created, is_new) = Config::load_or_create(&path).unwrap();
        assert!(is_new);
        assert_eq!(created, Config::default());
        assert!(path.exists());

        let (loaded, is_new) = Config::load_or_create(&path).unwrap();
        assert!(!is_new);
        assert_eq!(loaded.reminders, created.reminders);
    }
}
