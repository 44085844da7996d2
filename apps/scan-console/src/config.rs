//! # Console Configuration
//!
//! ## Sources (later wins)
//! 1. Defaults (this file)
//! 2. `packstation.toml`: `--config <path>`, else the platform config dir
//!    (`~/.config/packstation/packstation.toml` on Linux)
//! 3. Environment variables (`PACKSTATION_*`)
//! 4. Command-line flags (`--db`, `--audit-dir`)
//!
//! ```toml
//! [station]
//! name = "station-2"
//! shop = "Atelier Dupont"
//!
//! [catalog]
//! database = "/var/lib/packstation/catalog.db"
//!
//! [audit]
//! root = "/srv/audit"
//!
//! [cues]
//! enabled = true
//! player = "aplay"
//! error = "/usr/share/packstation/error.wav"
//!
//! [debug]
//! shell_escape = false
//! log_file = "/var/log/packstation.log"
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use packstation_core::{Cue, SessionConfig};

pub const CONFIG_FILE_NAME: &str = "packstation.toml";

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsoleConfig {
    pub station: StationConfig,
    pub catalog: CatalogConfig,
    pub audit: AuditConfig,
    pub cues: CuesConfig,
    pub debug: DebugConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StationConfig {
    /// Printed in every transcript header.
    pub name: String,
    pub shop: String,
}

impl Default for StationConfig {
    fn default() -> Self {
        let session = SessionConfig::default();
        StationConfig {
            name: session.station,
            shop: session.shop,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    /// SQLite file, created if missing.
    pub database: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        CatalogConfig {
            database: PathBuf::from("catalog.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    /// Directory holding the `yyyymm/` period folders.
    pub root: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        AuditConfig {
            root: PathBuf::from("audit"),
        }
    }
}

/// Audio cues. Without a player (or without a sound file for a cue) the
/// terminal bell is rung instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CuesConfig {
    pub enabled: bool,
    /// Command invoked as `player <sound file>`.
    pub player: Option<String>,
    pub error: Option<PathBuf>,
    pub success: Option<PathBuf>,
    pub notify: Option<PathBuf>,
}

impl Default for CuesConfig {
    fn default() -> Self {
        CuesConfig {
            enabled: true,
            player: None,
            error: None,
            success: None,
            notify: None,
        }
    }
}

impl CuesConfig {
    pub fn sound(&self, cue: Cue) -> Option<&Path> {
        match cue {
            Cue::Error => self.error.as_deref(),
            Cue::Success => self.success.as_deref(),
            Cue::Notify => self.notify.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DebugConfig {
    /// Allows `!command` lines to run through `sh -c`.
    pub shell_escape: bool,
    /// Log to this file instead of stderr.
    pub log_file: Option<PathBuf>,
}

// =============================================================================
// Loading
// =============================================================================

impl ConsoleConfig {
    /// Defaults, then the config file, then `PACKSTATION_*` variables.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => ConsoleConfig::default(),
            },
        };
        config.apply_env(std::env::vars())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "Reading configuration");
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Applies `PACKSTATION_*` overrides from `vars`.
    pub fn apply_env<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            match key.as_str() {
                "PACKSTATION_STATION" => self.station.name = value,
                "PACKSTATION_SHOP" => self.station.shop = value,
                "PACKSTATION_DB" => self.catalog.database = PathBuf::from(value),
                "PACKSTATION_AUDIT_DIR" => self.audit.root = PathBuf::from(value),
                "PACKSTATION_CUES" => self.cues.enabled = parse_bool(&key, &value)?,
                "PACKSTATION_CUE_PLAYER" => self.cues.player = Some(value),
                "PACKSTATION_SHELL_ESCAPE" => self.debug.shell_escape = parse_bool(&key, &value)?,
                "PACKSTATION_LOG_FILE" => self.debug.log_file = Some(PathBuf::from(value)),
                _ => {}
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.station.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue("station.name".into()));
        }
        if self.catalog.database.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired("catalog.database".into()));
        }
        if self.audit.root.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired("audit.root".into()));
        }
        if self.cues.player.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(ConfigError::InvalidValue("cues.player".into()));
        }
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            station: self.station.name.clone(),
            shop: self.station.shop.clone(),
        }
    }
}

/// `packstation.toml` in the platform config directory.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "packstation", "packstation")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue(key.to_string())),
    }
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
