//! Per-camera recording state for multi-camera projects
//!
//! Each camera carries a "rolling" flag and an optional roll/card label. The
//! state is stored on the take being edited; the persisted form is a sparse
//! map so that records written with a different camera count still load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Most cameras a project can record with
pub const MAX_CAMERAS: u32 = 64;

#[derive(Debug, Error, PartialEq)]
pub enum CameraError {
    #[error("Unknown camera {camera}: project has {count} camera(s)")]
    UnknownCamera { camera: u32, count: u32 },
}

/// Recording state of a single camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraChannel {
    /// Whether the camera is rolling on this take
    pub rolling: bool,
    /// Roll or card label (e.g. `A003`)
    pub label: Option<String>,
}

impl Default for CameraChannel {
    fn default() -> Self {
        Self {
            rolling: true,
            label: None,
        }
    }
}

/// Recording state for every camera of a project, indexed by camera id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CameraRecForm", into = "CameraRecForm")]
pub struct CameraRecState {
    cameras: Vec<CameraChannel>,
}

/// Persisted entry for one camera; every field is optional on read
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedChannel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolling: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Persisted form of [`CameraRecState`]: camera id -> channel
pub type CameraRecForm = BTreeMap<u32, PersistedChannel>;

impl CameraRecState {
    /// All cameras rolling, no labels
    pub fn initialize(camera_count: u32) -> Self {
        Self {
            cameras: vec![CameraChannel::default(); clamp_count(camera_count)],
        }
    }

    /// Number of cameras tracked
    pub fn camera_count(&self) -> u32 {
        self.cameras.len() as u32
    }

    /// Returns the channel for a camera
    pub fn channel(&self, camera: u32) -> Result<&CameraChannel, CameraError> {
        self.cameras
            .get(camera as usize)
            .ok_or(CameraError::UnknownCamera {
                camera,
                count: self.camera_count(),
            })
    }

    /// Returns true if the camera is rolling (unknown cameras are not)
    pub fn is_rolling(&self, camera: u32) -> bool {
        self.channel(camera).map(|c| c.rolling).unwrap_or(false)
    }

    /// Camera ids currently rolling
    pub fn rolling_cameras(&self) -> Vec<u32> {
        self.cameras
            .iter()
            .enumerate()
            .filter(|(_, c)| c.rolling)
            .map(|(i, _)| i as u32)
            .collect()
    }

    /// Returns a copy with one camera's rolling flag flipped
    pub fn toggle(&self, camera: u32) -> Result<Self, CameraError> {
        let mut next = self.clone();
        let count = next.camera_count();
        let channel = next
            .cameras
            .get_mut(camera as usize)
            .ok_or(CameraError::UnknownCamera { camera, count })?;
        channel.rolling = !channel.rolling;
        Ok(next)
    }

    /// Returns a copy with one camera's roll/card label replaced
    pub fn with_label(&self, camera: u32, label: Option<String>) -> Result<Self, CameraError> {
        let mut next = self.clone();
        let count = next.camera_count();
        let channel = next
            .cameras
            .get_mut(camera as usize)
            .ok_or(CameraError::UnknownCamera { camera, count })?;
        channel.label = label.filter(|l| !l.trim().is_empty());
        Ok(next)
    }

    /// Returns a copy sized for `camera_count` cameras
    ///
    /// Added cameras get defaults; cameras beyond the count are dropped.
    pub fn resized(&self, camera_count: u32) -> Self {
        let mut cameras = self.cameras.clone();
        cameras.resize(clamp_count(camera_count), CameraChannel::default());
        Self { cameras }
    }

    /// Converts to the persisted form
    pub fn serialize(&self) -> CameraRecForm {
        self.cameras
            .iter()
            .enumerate()
            .map(|(i, c)| {
                (
                    i as u32,
                    PersistedChannel {
                        rolling: Some(c.rolling),
                        label: c.label.clone(),
                    },
                )
            })
            .collect()
    }

    /// Rebuilds state from a persisted form for a project with `camera_count` cameras
    pub fn deserialize(form: &CameraRecForm, camera_count: u32) -> Self {
        Self::from(form.clone()).resized(camera_count)
    }
}

fn clamp_count(camera_count: u32) -> usize {
    camera_count.clamp(1, MAX_CAMERAS) as usize
}

impl From<CameraRecForm> for CameraRecState {
    /// Entries for camera ids at or above [`MAX_CAMERAS`] are dropped
    fn from(form: CameraRecForm) -> Self {
        let count = form
            .range(..MAX_CAMERAS)
            .next_back()
            .and_then(|(max, _)| max.checked_add(1))
            .unwrap_or(1);
        if let Some((&id, _)) = form.range(MAX_CAMERAS..).next() {
            log::warn!("ignoring recording state of camera {} (limit {})", id, MAX_CAMERAS);
        }
        let cameras = (0..count)
            .map(|i| match form.get(&i) {
                Some(entry) => CameraChannel {
                    rolling: entry.rolling.unwrap_or(true),
                    label: entry.label.clone(),
                },
                None => CameraChannel::default(),
            })
            .collect();
        Self { cameras }
    }
}

impl From<CameraRecState> for CameraRecForm {
    fn from(state: CameraRecState) -> Self {
        state.serialize()
    }
}
