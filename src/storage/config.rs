//! Configuration handling for takelog
//!
//! Configuration is stored in `.takelog/config.toml` (workspace) and
//! `~/.config/takelog/config.toml` (global).

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{RangeField, Strategy, MAX_CAMERAS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// What a save does when it runs into a duplicate
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Report the conflicts and leave the registry untouched
    #[default]
    Ask,
    Renumber,
    Overwrite,
    Swap,
    Cancel,
}

impl ConflictPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictPolicy::Ask => "ask",
            ConflictPolicy::Renumber => "renumber",
            ConflictPolicy::Overwrite => "overwrite",
            ConflictPolicy::Swap => "swap",
            ConflictPolicy::Cancel => "cancel",
        }
    }

    /// The strategy to apply without asking, if any
    pub fn strategy(&self) -> Option<Strategy> {
        match self {
            ConflictPolicy::Ask => None,
            ConflictPolicy::Renumber => Some(Strategy::RenumberForward),
            ConflictPolicy::Overwrite => Some(Strategy::Overwrite),
            ConflictPolicy::Swap => Some(Strategy::Swap),
            ConflictPolicy::Cancel => Some(Strategy::Cancel),
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ask" => Ok(ConflictPolicy::Ask),
            other => other
                .parse::<Strategy>()
                .map(|strategy| match strategy {
                    Strategy::RenumberForward => ConflictPolicy::Renumber,
                    Strategy::Overwrite => ConflictPolicy::Overwrite,
                    Strategy::Swap => ConflictPolicy::Swap,
                    Strategy::Cancel => ConflictPolicy::Cancel,
                })
                .map_err(ConfigError::Invalid),
        }
    }
}

/// Duplicate handling settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ConflictConfig {
    /// Strategy used when `--on-conflict` is not given
    pub default_strategy: ConflictPolicy,
}

/// Range edit settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeConfig {
    /// Field written by `takelog range` when `--field` is not given
    pub default_field: String,
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            default_field: "lens".to_string(),
        }
    }
}

impl RangeConfig {
    pub fn field(&self) -> Result<RangeField> {
        self.default_field
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("range.default_field: {}", e)).into())
    }
}

/// Workspace-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Cameras for `takelog project new` when `--cameras` is not given
    pub default_camera_count: u32,

    /// Name recorded as the logger of new projects
    /// (defaults to $TAKELOG_LOGGER, then $USER)
    pub logger: Option<String>,

    /// Duplicate handling
    pub conflicts: ConflictConfig,

    /// Range edit defaults
    pub range: RangeConfig,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            default_camera_count: 1,
            logger: None,
            conflicts: ConflictConfig::default(),
            range: RangeConfig::default(),
        }
    }
}

impl WorkspaceConfig {
    /// Gets the effective logger name from config, environment, or defaults
    pub fn effective_logger(&self) -> String {
        self.logger
            .clone()
            .or_else(|| std::env::var("TAKELOG_LOGGER").ok())
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "anonymous".to_string())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_camera_count == 0 {
            return Err(ConfigError::Invalid(
                "default_camera_count must be at least 1".to_string(),
            ));
        }
        if self.default_camera_count > MAX_CAMERAS {
            return Err(ConfigError::Invalid(format!(
                "default_camera_count must be at most {}",
                MAX_CAMERAS
            )));
        }
        Ok(())
    }
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,

    /// Editor command for editing shot details
    pub editor: Option<String>,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Combined configuration (global + workspace)
#[derive(Debug, Clone)]
pub struct Config {
    pub workspace: WorkspaceConfig,
    pub global: GlobalConfig,
    pub workspace_root: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from default locations
    pub fn load() -> Result<Self> {
        let global = Self::load_global()?;
        let workspace_root = Self::find_workspace_root();
        let workspace = match &workspace_root {
            Some(root) => Self::load_workspace_config(root)?,
            None => WorkspaceConfig::default(),
        };

        Ok(Self {
            workspace,
            global,
            workspace_root,
        })
    }

    /// Loads configuration for a specific workspace
    pub fn for_workspace(workspace_root: &Path) -> Result<Self> {
        let global = Self::load_global()?;
        let workspace = Self::load_workspace_config(workspace_root)?;

        Ok(Self {
            workspace,
            global,
            workspace_root: Some(workspace_root.to_path_buf()),
        })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "takelog", "takelog").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Loads global configuration
    pub fn load_global() -> Result<GlobalConfig> {
        let config_dir = match Self::global_config_dir() {
            Some(dir) => dir,
            None => return Ok(GlobalConfig::default()),
        };

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")
    }

    /// Loads workspace configuration from a specific root
    fn load_workspace_config(workspace_root: &Path) -> Result<WorkspaceConfig> {
        let config_path = workspace_root.join(".takelog").join("config.toml");

        if !config_path.exists() {
            return Ok(WorkspaceConfig::default());
        }

        let content = fs::read_to_string(&config_path).with_context(|| {
            format!("Failed to read workspace config: {}", config_path.display())
        })?;

        let config: WorkspaceConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse workspace config")?;
        config
            .validate()
            .with_context(|| format!("Invalid workspace config: {}", config_path.display()))?;
        Ok(config)
    }

    /// Finds the workspace root by looking for a `.takelog/` directory
    pub fn find_workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        Self::find_workspace_root_from(&current)
    }

    /// Walks up from `start` looking for a `.takelog/` directory
    pub fn find_workspace_root_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            if current.join(".takelog").is_dir() {
                return Some(current);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Returns the workspace root, or an error if not in a workspace
    pub fn require_workspace_root(&self) -> Result<&Path> {
        self.workspace_root
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Not in a takelog workspace. Run 'takelog init' first."))
    }

    /// Saves the workspace configuration
    pub fn save_workspace(&self) -> Result<()> {
        let root = self.require_workspace_root()?;
        let config_path = root.join(".takelog").join("config.toml");

        let content = toml::to_string_pretty(&self.workspace)
            .context("Failed to serialize workspace config")?;

        fs::write(&config_path, content).with_context(|| {
            format!("Failed to write workspace config: {}", config_path.display())
        })
    }
}
