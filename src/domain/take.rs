//! Take (log sheet) domain model
//!
//! A log sheet records one take of one camera: scene, take number, file
//! number, classification and free-form template fields.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::camera::{CameraError, CameraRecState};
use super::id::{ProjectId, TakeId};
use super::numbering::{is_valid_number, MAX_NUMBER};
use super::range::RangeRequest;

#[derive(Debug, Error, PartialEq)]
pub enum TakeError {
    #[error("Scene label must not be empty")]
    EmptyScene,

    #[error("Invalid take number: {0} (expected 1..={max})", max = MAX_NUMBER)]
    InvalidTakeNumber(u32),

    #[error("Invalid file number: {0} (expected 1..={max})", max = MAX_NUMBER)]
    InvalidFileNumber(u32),

    #[error("Invalid insert sound speed: {0}")]
    InvalidSoundSpeed(f64),

    #[error(transparent)]
    Camera(#[from] CameraError),
}

/// Why a take was marked as waste
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WasteReason {
    Camera,
    Sound,
    Performance,
    Focus,
    Other,
}

impl WasteReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            WasteReason::Camera => "camera",
            WasteReason::Sound => "sound",
            WasteReason::Performance => "performance",
            WasteReason::Focus => "focus",
            WasteReason::Other => "other",
        }
    }
}

impl FromStr for WasteReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "camera" => Ok(WasteReason::Camera),
            "sound" => Ok(WasteReason::Sound),
            "performance" | "action" => Ok(WasteReason::Performance),
            "focus" => Ok(WasteReason::Focus),
            "other" => Ok(WasteReason::Other),
            other => Err(format!("Unknown waste reason: {}", other)),
        }
    }
}

/// Outcome of a take, with the payload that belongs to that outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    Good,
    Waste {
        #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
        reasons: BTreeSet<WasteReason>,
    },
    Insert {
        sound_speed: f64,
    },
}

impl Classification {
    /// Short label for listings
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Good => "good",
            Classification::Waste { .. } => "waste",
            Classification::Insert { .. } => "insert",
        }
    }

    fn validate(&self) -> Result<(), TakeError> {
        match self {
            Classification::Insert { sound_speed }
                if !sound_speed.is_finite() || *sound_speed <= 0.0 =>
            {
                Err(TakeError::InvalidSoundSpeed(*sound_speed))
            }
            _ => Ok(()),
        }
    }
}

/// Schemas that contribute extra data fields to a take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTemplate {
    CameraLog,
    ShotList,
    ScriptNotes,
}

impl FieldTemplate {
    pub const ALL: [FieldTemplate; 3] = [
        FieldTemplate::CameraLog,
        FieldTemplate::ShotList,
        FieldTemplate::ScriptNotes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldTemplate::CameraLog => "camera_log",
            FieldTemplate::ShotList => "shot_list",
            FieldTemplate::ScriptNotes => "script_notes",
        }
    }

    /// Field keys this template defines
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            FieldTemplate::CameraLog => &[
                "lens",
                "focal_length",
                "stop",
                "iso",
                "shutter",
                "white_balance",
                "filter",
                "fps",
            ],
            FieldTemplate::ShotList => &["shot_type", "movement", "framing", "description"],
            FieldTemplate::ScriptNotes => &["page", "timing", "continuity", "dialogue"],
        }
    }

    /// Finds the template that defines a field key
    pub fn for_field(key: &str) -> Option<FieldTemplate> {
        Self::ALL.into_iter().find(|t| t.fields().contains(&key))
    }
}

/// Template-defined extra data on a take
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TakeFields(BTreeMap<String, serde_json::Value>);

impl TakeFields {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Sets a value; `null` removes the key
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        let key = key.into();
        match value.into() {
            serde_json::Value::Null => {
                self.0.remove(&key);
            }
            value => {
                self.0.insert(key, value);
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.0.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }
}

impl FromIterator<(String, serde_json::Value)> for TakeFields {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        let mut fields = TakeFields::new();
        for (k, v) in iter {
            fields.set(k, v);
        }
        fields
    }
}

/// Normalizes a scene label (`" 12a "` becomes `"12A"`)
pub fn normalize_scene(scene: &str) -> String {
    scene.trim().to_uppercase()
}

/// Orders scene labels by their numeric prefix, then by the remainder
///
/// `2 < 10 < 10A < 10B < INSERT`
pub fn compare_scenes(a: &str, b: &str) -> Ordering {
    fn split(s: &str) -> (Option<u64>, &str) {
        let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
        (s[..digits].parse().ok(), &s[digits..])
    }

    let (na, ra) = split(a);
    let (nb, rb) = split(b);
    match (na, nb) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| ra.cmp(rb)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// One take of one camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSheet {
    /// Unique identifier
    pub id: TakeId,

    /// Owning project
    pub project_id: ProjectId,

    /// Scene label
    pub scene: String,

    /// Take number within the scene
    pub take_number: u32,

    /// Zero-based camera id (always 0 on single-camera projects)
    #[serde(default)]
    pub camera: u32,

    /// Camera file/clip number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_number: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,

    /// Free-text shot details
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub shot_details: String,

    /// Template fields (lens, shot type, script page, ...)
    #[serde(default, skip_serializing_if = "TakeFields::is_empty")]
    pub fields: TakeFields,

    /// Fields range edits must leave alone on this take
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub disabled_fields: BTreeSet<String>,

    /// Per-camera recording state (multi-camera projects only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cam_rec_state: Option<CameraRecState>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl LogSheet {
    /// Creates an unclassified take
    pub fn new(id: TakeId, scene: impl Into<String>, take_number: u32, camera: u32) -> Self {
        let now = Utc::now();
        Self {
            project_id: id.project_id(),
            id,
            scene: normalize_scene(&scene.into()),
            take_number,
            camera,
            file_number: None,
            classification: None,
            shot_details: String::new(),
            fields: TakeFields::new(),
            disabled_fields: BTreeSet::new(),
            cam_rec_state: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True if both takes occupy the same scene/take/camera slot
    pub fn same_slot(&self, other: &LogSheet) -> bool {
        self.camera == other.camera
            && self.take_number == other.take_number
            && self.scene == other.scene
    }

    /// Listing order: scene, then take number, then camera
    pub fn listing_cmp(&self, other: &LogSheet) -> Ordering {
        compare_scenes(&self.scene, &other.scene)
            .then_with(|| self.take_number.cmp(&other.take_number))
            .then_with(|| self.camera.cmp(&other.camera))
            .then_with(|| self.id.cmp(&other.id))
    }

    /// Returns true if range edits may write `field` on this take
    pub fn accepts_range_field(&self, field: &str) -> bool {
        !self.disabled_fields.contains(field)
    }

    /// Merges a patch; identity (`id`, `project_id`, `created_at`) never changes
    pub fn apply_patch(&mut self, patch: &TakePatch) {
        if let Some(scene) = &patch.scene {
            self.scene = normalize_scene(scene);
        }
        if let Some(n) = patch.take_number {
            self.take_number = n;
        }
        if let Some(camera) = patch.camera {
            self.camera = camera;
        }
        if let Some(file_number) = patch.file_number {
            self.file_number = file_number;
        }
        if let Some(classification) = &patch.classification {
            self.classification = classification.clone();
        }
        if let Some(details) = &patch.shot_details {
            self.shot_details = details.clone();
        }
        for (key, value) in &patch.fields {
            self.fields.set(key.clone(), value.clone());
        }
        if let Some(disabled) = &patch.disabled_fields {
            self.disabled_fields = disabled.clone();
        }
        if let Some(state) = &patch.cam_rec_state {
            self.cam_rec_state = state.clone();
        }
        self.updated_at = Utc::now();
    }

    /// Replaces every non-identity field with `source`'s
    pub fn replace_content_from(&mut self, source: &LogSheet) {
        self.scene = source.scene.clone();
        self.take_number = source.take_number;
        self.camera = source.camera;
        self.file_number = source.file_number;
        self.classification = source.classification.clone();
        self.shot_details = source.shot_details.clone();
        self.fields = source.fields.clone();
        self.disabled_fields = source.disabled_fields.clone();
        self.cam_rec_state = source.cam_rec_state.clone();
        self.updated_at = Utc::now();
    }
}

/// Partial update of a take
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TakePatch {
    pub scene: Option<String>,
    pub take_number: Option<u32>,
    pub camera: Option<u32>,
    pub file_number: Option<Option<u32>>,
    pub classification: Option<Option<Classification>>,
    pub shot_details: Option<String>,
    /// Field values to set (`null` removes)
    pub fields: BTreeMap<String, serde_json::Value>,
    pub disabled_fields: Option<BTreeSet<String>>,
    pub cam_rec_state: Option<Option<CameraRecState>>,
}

impl TakePatch {
    pub fn is_empty(&self) -> bool {
        *self == TakePatch::default()
    }
}

/// A take mutation submitted by the edit screen
///
/// `take_id` is set when an existing take is being edited.
#[derive(Debug, Clone, PartialEq)]
pub struct TakeEditRequest {
    pub project_id: ProjectId,
    pub take_id: Option<TakeId>,
    pub scene: String,
    pub take_number: u32,
    pub camera: u32,
    pub file_number: Option<u32>,
    pub classification: Option<Classification>,
    pub shot_details: String,
    pub fields: TakeFields,
    pub disabled_fields: BTreeSet<String>,
    pub cam_rec_state: Option<CameraRecState>,
    /// Bulk edit to apply alongside this save
    pub range: Option<RangeRequest>,
}

impl TakeEditRequest {
    /// A new-take request with every optional field empty
    pub fn new(project_id: ProjectId, scene: impl Into<String>, take_number: u32) -> Self {
        Self {
            project_id,
            take_id: None,
            scene: scene.into(),
            take_number,
            camera: 0,
            file_number: None,
            classification: None,
            shot_details: String::new(),
            fields: TakeFields::new(),
            disabled_fields: BTreeSet::new(),
            cam_rec_state: None,
            range: None,
        }
    }

    /// Pre-fills a request from a stored take, for editing it
    pub fn from_existing(take: &LogSheet) -> Self {
        Self {
            project_id: take.project_id.clone(),
            take_id: Some(take.id.clone()),
            scene: take.scene.clone(),
            take_number: take.take_number,
            camera: take.camera,
            file_number: take.file_number,
            classification: take.classification.clone(),
            shot_details: take.shot_details.clone(),
            fields: take.fields.clone(),
            disabled_fields: take.disabled_fields.clone(),
            cam_rec_state: take.cam_rec_state.clone(),
            range: None,
        }
    }

    pub fn with_camera(mut self, camera: u32) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_file_number(mut self, file_number: u32) -> Self {
        self.file_number = Some(file_number);
        self
    }

    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = Some(classification);
        self
    }

    /// Checks the request against the project's camera count
    pub fn validate(&self, camera_count: u32) -> Result<(), TakeError> {
        if normalize_scene(&self.scene).is_empty() {
            return Err(TakeError::EmptyScene);
        }
        if !is_valid_number(self.take_number as i64) {
            return Err(TakeError::InvalidTakeNumber(self.take_number));
        }
        if let Some(n) = self.file_number {
            if !is_valid_number(n as i64) {
                return Err(TakeError::InvalidFileNumber(n));
            }
        }
        if self.camera >= camera_count {
            return Err(CameraError::UnknownCamera {
                camera: self.camera,
                count: camera_count,
            }
            .into());
        }
        if let Some(classification) = &self.classification {
            classification.validate()?;
        }
        Ok(())
    }

    /// Builds the candidate record
    ///
    /// Recording state is kept only on multi-camera projects, resized to the
    /// current camera count.
    pub fn to_candidate(&self, id: TakeId, created_at: DateTime<Utc>, camera_count: u32) -> LogSheet {
        let cam_rec_state = (camera_count > 1).then(|| {
            self.cam_rec_state
                .as_ref()
                .map(|s| s.resized(camera_count))
                .unwrap_or_else(|| CameraRecState::initialize(camera_count))
        });

        LogSheet {
            id,
            project_id: self.project_id.clone(),
            scene: normalize_scene(&self.scene),
            take_number: self.take_number,
            camera: self.camera,
            file_number: self.file_number,
            classification: self.classification.clone(),
            shot_details: self.shot_details.clone(),
            fields: self.fields.clone(),
            disabled_fields: self.disabled_fields.clone(),
            cam_rec_state,
            created_at,
            updated_at: Utc::now(),
        }
    }
}

impl fmt::Display for LogSheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scene {} take {} cam {}",
            self.scene, self.take_number, self.camera
        )?;
        if let Some(n) = self.file_number {
            write!(f, " file {}", n)?;
        }
        Ok(())
    }
}
