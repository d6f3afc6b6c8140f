//! Configuration module for graphvis-rs
//!
//! Settings for graph construction, the threaded viewer and logging.
//!
//! # Settings Location
//!
//! When no path is given, settings live in the platform config directory:
//! - **Linux**: `~/.config/dev.graphvis-rs/settings.json`
//! - **macOS**: `~/Library/Application Support/dev.graphvis-rs/settings.json`
//! - **Windows**: `%APPDATA%\dev.graphvis-rs\settings.json`
//!
//! Files ending in `.toml` are read and written as TOML, anything else as JSON.
//!
//! # Example
//!
//! ```ignore
//! use graphvis_rs::config::Settings;
//!
//! let settings = Settings::load_or_default(Settings::default_path());
//! let graph = Graph::with_config("g", &settings.graph);
//! ```

use crate::error::{GraphError, Result};
use crate::graph::NodeKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "dev.graphvis-rs";

/// Settings filename
pub const SETTINGS_FILE: &str = "settings.json";

/// Default log filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "info,graphvis_rs=debug";

/// Viewer wait between command checks
pub const DEFAULT_PUMP_TIMEOUT_MS: u64 = 20;

fn default_true() -> bool {
    true
}

fn default_pump_timeout_ms() -> u64 {
    DEFAULT_PUMP_TIMEOUT_MS
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

// ==================== Graph ====================

/// How new graphs behave
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Raise errors on duplicate ids and missing elements
    #[serde(default = "default_true")]
    pub strict_checking: bool,

    /// Create missing endpoint nodes when adding an edge
    #[serde(default)]
    pub auto_create: bool,

    /// Incidence policy of nodes created without an explicit kind
    #[serde(default)]
    pub node_kind: NodeKind,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            strict_checking: true,
            auto_create: false,
            node_kind: NodeKind::default(),
        }
    }
}

// ==================== View ====================

/// Threaded viewer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Report node moves made in the viewer back to its sinks
    #[serde(default = "default_true")]
    pub feedback_xyz: bool,

    /// How long the viewer waits for graph events before looking at its
    /// commands, in milliseconds. 0 waits for the next graph event.
    #[serde(default = "default_pump_timeout_ms")]
    pub pump_timeout_ms: u64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            feedback_xyz: true,
            pump_timeout_ms: DEFAULT_PUMP_TIMEOUT_MS,
        }
    }
}

// ==================== Logging ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directives
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Also write logs to this file
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            file: None,
        }
    }
}

// ==================== Settings ====================

/// All settings, as stored on disk
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub graph: GraphConfig,

    #[serde(default)]
    pub view: ViewConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn is_toml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "toml")
}

impl Settings {
    /// `<config dir>/dev.graphvis-rs/settings.json`, or a relative
    /// `settings.json` if the platform has no config directory.
    pub fn default_path() -> PathBuf {
        dirs_next::config_dir()
            .map(|p| p.join(APP_ID).join(SETTINGS_FILE))
            .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE))
    }

    /// Load settings from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GraphError::Config(format!("Failed to read settings {:?}: {}", path, e))
        })?;

        if is_toml(path) {
            toml::from_str(&content).map_err(|e| {
                GraphError::Config(format!("Failed to parse settings {:?}: {}", path, e))
            })
        } else {
            serde_json::from_str(&content).map_err(|e| {
                GraphError::Config(format!("Failed to parse settings {:?}: {}", path, e))
            })
        }
    }

    /// Load settings, returning defaults if any error occurs
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load settings, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save settings to disk
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                GraphError::Config(format!("Failed to create settings directory: {}", e))
            })?;
        }

        let content = if is_toml(path) {
            toml::to_string_pretty(self)
                .map_err(|e| GraphError::Config(format!("Failed to serialize settings: {}", e)))?
        } else {
            serde_json::to_string_pretty(self)
                .map_err(|e| GraphError::Config(format!("Failed to serialize settings: {}", e)))?
        };

        std::fs::write(path, content).map_err(|e| {
            GraphError::Config(format!("Failed to write settings {:?}: {}", path, e))
        })
    }
}
