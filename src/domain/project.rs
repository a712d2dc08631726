//! Film project domain model
//!
//! A project groups the log sheets of one production and carries the
//! settings (camera count, logger) they were recorded under.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::camera::MAX_CAMERAS;
use super::id::ProjectId;

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("A project needs at least one camera")]
    NoCameras,

    #[error("Camera count can only grow: project has {current}, requested {requested}")]
    CameraCountDecrease { current: u32, requested: u32 },

    #[error("Too many cameras: {0} (at most {max})", max = MAX_CAMERAS)]
    TooManyCameras(u32),
}

fn default_camera_count() -> u32 {
    1
}

/// Recording settings of a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSettings {
    /// Number of cameras rolling on this production
    #[serde(default = "default_camera_count")]
    pub camera_count: u32,

    /// Name of the person keeping the log
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub logger: String,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            camera_count: 1,
            logger: String::new(),
        }
    }
}

impl ProjectSettings {
    pub fn is_multi_camera(&self) -> bool {
        self.camera_count > 1
    }
}

/// A film project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub settings: ProjectSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Creates a project with the given settings
    pub fn new(name: impl Into<String>, settings: ProjectSettings) -> Result<Self, SettingsError> {
        match settings.camera_count {
            0 => return Err(SettingsError::NoCameras),
            n if n > MAX_CAMERAS => return Err(SettingsError::TooManyCameras(n)),
            _ => {}
        }
        let name = name.into();
        let now = Utc::now();
        Ok(Self {
            id: ProjectId::new(&name, now),
            name,
            settings,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn camera_count(&self) -> u32 {
        self.settings.camera_count
    }

    /// Marks the project as modified
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Raises the camera count; lowering it is refused
    pub fn set_camera_count(&mut self, count: u32) -> Result<(), SettingsError> {
        let current = self.settings.camera_count;
        if count < current {
            return Err(SettingsError::CameraCountDecrease {
                current,
                requested: count,
            });
        }
        if count > MAX_CAMERAS {
            return Err(SettingsError::TooManyCameras(count));
        }
        if count != current {
            self.settings.camera_count = count;
            self.touch();
        }
        Ok(())
    }
}
