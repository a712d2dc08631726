//! Workspace management
//!
//! Handles workspace initialization and provides access to the take store.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use super::{Config, JsonlStore};

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Not in a takelog workspace. Run 'takelog init' first.")]
    NotInWorkspace,
}

/// A takelog workspace: a directory containing `.takelog/`
pub struct Workspace {
    root: PathBuf,
    config: Config,
}

impl Workspace {
    /// Opens an existing workspace at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        if !root.join(".takelog").is_dir() {
            return Err(WorkspaceError::NotInWorkspace.into());
        }

        let config = Config::for_workspace(&root)?;

        Ok(Self { root, config })
    }

    /// Opens the workspace at the current directory or a parent
    pub fn open_current() -> Result<Self> {
        let root = Config::find_workspace_root().ok_or(WorkspaceError::NotInWorkspace)?;

        Self::open(root)
    }

    /// Initializes a workspace at the given path
    ///
    /// Existing files are left alone, so running it twice is harmless.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let takelog_dir = root.join(".takelog");

        let projects_dir = takelog_dir.join("projects");
        fs::create_dir_all(&projects_dir).with_context(|| {
            format!(
                "Failed to create projects directory: {}",
                projects_dir.display()
            )
        })?;

        // Create default config
        let config_path = takelog_dir.join("config.toml");
        if !config_path.exists() {
            let default_config = r#"# takelog configuration

# Cameras for 'takelog project new' without --cameras
default_camera_count = 1

# Name recorded as the logger of new projects
# logger = "your name"

[conflicts]
# ask | renumber | overwrite | swap | cancel
default_strategy = "ask"

[range]
# Field written by 'takelog range' without --field
default_field = "lens"
"#;
            fs::write(&config_path, default_config)
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        // Create .gitignore for .takelog
        let gitignore_path = takelog_dir.join(".gitignore");
        if !gitignore_path.exists() {
            let gitignore = r#"# Ignore interrupted writes
projects/*.tmp
"#;
            fs::write(&gitignore_path, gitignore).with_context(|| {
                format!("Failed to write .gitignore: {}", gitignore_path.display())
            })?;
        }

        log::info!("initialized workspace at {}", root.display());
        Self::open(root)
    }

    /// Returns the workspace root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the .takelog directory path
    pub fn takelog_dir(&self) -> PathBuf {
        self.root.join(".takelog")
    }

    /// Returns the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the take store
    pub fn store(&self) -> JsonlStore {
        JsonlStore::for_workspace(&self.root)
    }
}
