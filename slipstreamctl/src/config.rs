//! CLI configuration management
//!
//! The configuration file is a TOML document with one table per profile and an
//! `[alias]` table shared by all profiles:
//!
//! ```toml
//! [alias]
//! launch = "run image"
//!
//! [slipstream]
//! endpoint = "https://slipstream.sixsq.com"
//! username = "alice"
//! ```

use slipstream_core::{default_config_path, default_cookie_path, Result, SlipStreamError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use toml::{Table, Value};
use tracing::debug;

use crate::session::write_private;

/// Profile used when none is requested.
pub const DEFAULT_PROFILE: &str = "slipstream";

/// Endpoint used when the profile does not name one.
pub const DEFAULT_ENDPOINT: &str = "https://slipstream.sixsq.com";

/// Request timeout when the profile does not set one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const ALIAS_TABLE: &str = "alias";

/// Built-in command aliases, extended or overridden by the `[alias]` table.
pub fn default_aliases() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("deploy".to_string(), "run deployment".to_string()),
        ("launch".to_string(), "run image".to_string()),
    ])
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn string_table(table: &Table) -> BTreeMap<String, String> {
    table
        .iter()
        .map(|(k, v)| (k.clone(), value_to_string(v)))
        .collect()
}

/// Configuration store: one profile's settings plus the alias map
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    path: PathBuf,
    explicit: bool,
    profile: String,
    settings: BTreeMap<String, String>,
    aliases: BTreeMap<String, String>,
}

impl Config {
    /// Create an in-memory configuration with defaults.
    ///
    /// `path` is the explicitly requested file; `None` means the default file.
    pub fn new(path: Option<PathBuf>, profile: Option<String>) -> Self {
        let explicit = path.is_some();
        Self {
            path: path.unwrap_or_else(default_config_path),
            explicit,
            profile: profile.unwrap_or_else(|| DEFAULT_PROFILE.to_string()),
            settings: BTreeMap::from([("endpoint".to_string(), DEFAULT_ENDPOINT.to_string())]),
            aliases: default_aliases(),
        }
    }

    /// Create and read a configuration in one step.
    pub fn load(path: Option<PathBuf>, profile: Option<String>) -> Result<Self> {
        let mut config = Self::new(path, profile);
        config.read()?;
        Ok(config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    fn is_default_profile(&self) -> bool {
        self.profile == DEFAULT_PROFILE
    }

    /// Parse the file on disk, an absent file being an empty document.
    fn read_document(&self) -> Result<Option<Table>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)?;
        let table = content.parse::<Table>().map_err(|e| {
            SlipStreamError::Config(format!(
                "Failed to parse config file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(Some(table))
    }

    /// Merge the file's alias table and the active profile table.
    ///
    /// A missing default file is fine; an explicitly requested file must exist.
    /// A missing profile table is only an error for a non-default profile.
    pub fn read(&mut self) -> Result<()> {
        let document = match self.read_document()? {
            Some(document) => document,
            None if self.explicit => {
                return Err(SlipStreamError::Usage(format!(
                    "Config file '{}' does not exist.",
                    self.path.display()
                )))
            }
            None => Table::new(),
        };

        if let Some(Value::Table(aliases)) = document.get(ALIAS_TABLE) {
            self.aliases.extend(string_table(aliases));
        }

        match document.get(&self.profile) {
            Some(Value::Table(settings)) => {
                self.settings.extend(string_table(settings));
            }
            Some(_) => {
                return Err(SlipStreamError::Config(format!(
                    "'{}' in {} is not a table",
                    self.profile,
                    self.path.display()
                )))
            }
            None if !self.is_default_profile() => {
                return Err(SlipStreamError::ProfileNotFound(self.profile.clone()))
            }
            None => {}
        }

        debug!(
            "Read profile '{}' from {}",
            self.profile,
            self.path.display()
        );
        Ok(())
    }

    /// Persist the alias table and the active profile table.
    ///
    /// Other profiles in the file are left untouched.
    pub fn write(&self) -> Result<()> {
        let mut document = self.read_document()?.unwrap_or_default();

        let aliases: Table = self
            .aliases
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        document.insert(ALIAS_TABLE.to_string(), Value::Table(aliases));

        let settings: Table = self
            .settings
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        document.insert(self.profile.clone(), Value::Table(settings));

        let content = toml::to_string_pretty(&document).map_err(|e| {
            SlipStreamError::Config(format!("Failed to serialize config: {}", e))
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        write_private(&self.path, &content)?;

        debug!("Wrote profile '{}' to {}", self.profile, self.path.display());
        Ok(())
    }

    /// Remove a setting from memory and from the persisted profile table.
    pub fn clear(&mut self, key: &str) -> Result<()> {
        self.settings.remove(key);

        let Some(mut document) = self.read_document()? else {
            return self.missing_profile_on_clear();
        };

        match document.get_mut(&self.profile) {
            Some(Value::Table(settings)) => {
                if settings.remove(key).is_some() {
                    let content = toml::to_string_pretty(&document).map_err(|e| {
                        SlipStreamError::Config(format!("Failed to serialize config: {}", e))
                    })?;
                    write_private(&self.path, &content)?;
                }
                Ok(())
            }
            _ => self.missing_profile_on_clear(),
        }
    }

    fn missing_profile_on_clear(&self) -> Result<()> {
        if self.is_default_profile() {
            Ok(())
        } else {
            Err(SlipStreamError::ProfileNotFound(self.profile.clone()))
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.settings.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    pub fn endpoint(&self) -> &str {
        self.get("endpoint").unwrap_or(DEFAULT_ENDPOINT)
    }

    pub fn username(&self) -> Option<&str> {
        self.get("username")
    }

    /// Cookie jar location, `~/.slipstream/cookies.txt` unless overridden.
    pub fn cookie_file(&self) -> PathBuf {
        self.get("cookie_file")
            .map(PathBuf::from)
            .unwrap_or_else(default_cookie_path)
    }

    /// Request timeout in seconds.
    pub fn timeout(&self) -> Result<u64> {
        let Some(raw) = self.get("timeout") else {
            return Ok(DEFAULT_TIMEOUT_SECS);
        };

        match raw.trim().parse::<u64>() {
            Ok(timeout) if timeout > 0 => Ok(timeout),
            _ => Err(SlipStreamError::Config(format!(
                "Invalid timeout '{}'. Must be a positive number of seconds",
                raw
            ))),
        }
    }

    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }
}
