//! # Storage Layer
//!
//! Persistence for takelog workspaces with git-friendly file formats.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Project + takes | JSONL (project header, one take per line) | `.takelog/projects/{id}.jsonl` |
//! | Config | TOML | `.takelog/config.toml` |
//!
//! ## Concurrency Safety
//!
//! - [`JsonlStore`] uses file locking (`fs2`) for concurrent access
//! - Each project is written as a whole (temp file + rename), so the last
//!   write wins at project granularity
//!
//! ## Workspace Structure
//!
//! ```text
//! .takelog/
//! ├── projects/
//! │   └── p-1234567.jsonl   # Project header + its takes
//! └── config.toml           # Workspace configuration
//! ```
//!
//! ## Key Types
//!
//! - [`TakeStorage`] - What the take registry needs from a store
//! - [`Workspace`] - Entry point for accessing a takelog workspace
//! - [`JsonlStore`] - File-backed [`TakeStorage`]
//! - [`MemoryStore`] - In-memory [`TakeStorage`]
//! - [`Config`] - Workspace and global configuration

mod jsonl;
mod memory;
mod config;
mod workspace;

use anyhow::Result;

use crate::domain::{LogSheet, Project, ProjectId};

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;
pub use config::{Config, ConfigError, ConflictPolicy, GlobalConfig, OutputFormat, WorkspaceConfig};
pub use workspace::{Workspace, WorkspaceError};

/// A project together with all of its takes
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectTakes {
    pub project: Project,
    pub takes: Vec<LogSheet>,
}

/// Durable store of projects and their takes
///
/// Writes replace a project's whole record set. Failures are reported as-is;
/// retrying is up to the caller.
pub trait TakeStorage: Send + Sync {
    /// Loads a project and its takes, or `None` if the project does not exist
    fn load_project_takes(&self, project_id: &ProjectId) -> Result<Option<ProjectTakes>>;

    /// Replaces the stored project header and take set
    fn save_project_takes(&self, project: &Project, takes: &[LogSheet]) -> Result<()>;

    /// Lists every stored project
    fn list_projects(&self) -> Result<Vec<Project>>;

    /// Removes a project and all of its takes
    fn delete_project(&self, project_id: &ProjectId) -> Result<bool>;
}
