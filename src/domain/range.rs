//! Range edits: one field value applied to a run of take numbers
//!
//! The applier only computes patches. Committing them is the registry's job,
//! so range edits go through the same duplicate checks as single edits.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

use super::id::TakeId;
use super::numbering::{expand_range, NumberingError};
use super::take::{normalize_scene, LogSheet, TakePatch};

#[derive(Debug, Error, PartialEq)]
pub enum RangeError {
    #[error(transparent)]
    Numbering(#[from] NumberingError),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// The take field a range edit writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeField {
    Scene,
    ShotDetails,
    /// A template field key such as `lens`
    Extra(String),
}

impl RangeField {
    /// Name used in `disabled_fields` and on the command line
    pub fn key(&self) -> &str {
        match self {
            RangeField::Scene => "scene",
            RangeField::ShotDetails => "shot_details",
            RangeField::Extra(key) => key,
        }
    }

    /// Builds the patch that writes `value` into this field
    pub fn patch(&self, value: &Value) -> Result<TakePatch, RangeError> {
        let mut patch = TakePatch::default();
        match self {
            RangeField::Scene => {
                let scene = value
                    .as_str()
                    .map(normalize_scene)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| RangeError::InvalidValue {
                        field: self.key().to_string(),
                        reason: "expected a non-empty scene label".to_string(),
                    })?;
                patch.scene = Some(scene);
            }
            RangeField::ShotDetails => {
                let text = match value {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                patch.shot_details = Some(text);
            }
            RangeField::Extra(key) => {
                patch.fields.insert(key.clone(), value.clone());
            }
        }
        Ok(patch)
    }
}

impl FromStr for RangeField {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        match key {
            "" => Err(RangeError::InvalidValue {
                field: String::new(),
                reason: "field name must not be empty".to_string(),
            }),
            "scene" => Ok(RangeField::Scene),
            "shot_details" | "details" => Ok(RangeField::ShotDetails),
            other => Ok(RangeField::Extra(other.to_string())),
        }
    }
}

impl fmt::Display for RangeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// "Apply this field's value to every take numbered `start..=end`"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSpec {
    pub field: RangeField,
    pub start: u32,
    pub end: u32,
    /// Limits the range to one scene; `None` covers the whole project
    pub scene: Option<String>,
}

impl RangeSpec {
    pub fn new(field: RangeField, start: u32, end: u32) -> Self {
        Self {
            field,
            start,
            end,
            scene: None,
        }
    }

    pub fn in_scene(mut self, scene: impl Into<String>) -> Self {
        self.scene = Some(normalize_scene(&scene.into()));
        self
    }

    fn covers_scene(&self, take: &LogSheet) -> bool {
        self.scene.as_ref().map_or(true, |s| *s == take.scene)
    }
}

/// A range declaration together with the value to write
#[derive(Debug, Clone, PartialEq)]
pub struct RangeRequest {
    pub spec: RangeSpec,
    pub value: Value,
}

/// Computes the patches a range edit produces
///
/// Numbers without a matching take are skipped, never created. Takes that
/// list the field in `disabled_fields` are left out.
pub fn apply(
    spec: &RangeSpec,
    value: &Value,
    takes_in_scope: &[LogSheet],
) -> Result<Vec<(TakeId, TakePatch)>, RangeError> {
    let numbers = expand_range(spec.start, spec.end)?;
    let patch = spec.field.patch(value)?;
    let key = spec.field.key();

    let mut patches = Vec::new();
    for number in numbers {
        for take in takes_in_scope
            .iter()
            .filter(|t| t.take_number == number && spec.covers_scene(t))
        {
            if take.accepts_range_field(key) {
                patches.push((take.id.clone(), patch.clone()));
            } else {
                log::debug!("range edit skips {} ({} disabled)", take.id, key);
            }
        }
    }

    Ok(patches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::id::ProjectId;
    use chrono::Utc;
    use serde_json::json;

    fn takes(numbers: &[u32]) -> (ProjectId, Vec<LogSheet>) {
        let p = ProjectId::new("Range", Utc::now());
        let takes = numbers
            .iter()
            .enumerate()
            .map(|(i, n)| LogSheet::new(p.take_id(i as u32 + 1), "1", *n, 0))
            .collect();
        (p, takes)
    }

    #[test]
    fn patches_only_existing_numbers_in_range() {
        let (_, takes) = takes(&[1, 3, 4, 6]);
        let spec = RangeSpec::new("lens".parse().unwrap(), 3, 5);

        let patches = apply(&spec, &json!("50mm"), &takes).unwrap();
        let patched: Vec<_> = patches.iter().map(|(id, _)| id.clone()).collect();

        assert_eq!(patched, vec![takes[1].id.clone(), takes[2].id.clone()]);
        assert_eq!(patches[0].1.fields.get("lens"), Some(&json!("50mm")));
    }

    #[test]
    fn disabled_field_is_skipped() {
        let (_, mut takes) = takes(&[1, 2, 3]);
        takes[1].disabled_fields.insert("lens".to_string());
        let spec = RangeSpec::new(RangeField::Extra("lens".to_string()), 1, 3);

        let patches = apply(&spec, &json!("35mm"), &takes).unwrap();
        assert_eq!(patches.len(), 2);
        assert!(patches.iter().all(|(id, _)| *id != takes[1].id));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let (_, takes) = takes(&[1, 2]);
        let spec = RangeSpec::new(RangeField::ShotDetails, 4, 2);

        assert_eq!(
            apply(&spec, &json!("x"), &takes),
            Err(RangeError::Numbering(NumberingError::InvalidRange {
                start: 4,
                end: 2
            }))
        );
    }

    #[test]
    fn scene_scope_narrows_the_range() {
        let (p, mut takes) = takes(&[1, 2]);
        takes.push(LogSheet::new(p.take_id(9), "2", 1, 0));
        let spec = RangeSpec::new(RangeField::ShotDetails, 1, 2).in_scene("2");

        let patches = apply(&spec, &json!("wide"), &takes).unwrap();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].0, p.take_id(9));
        assert_eq!(patches[0].1.shot_details.as_deref(), Some("wide"));
    }

    #[test]
    fn scene_field_needs_a_label() {
        assert!(RangeField::Scene.patch(&json!(12)).is_err());
        assert_eq!(
            RangeField::Scene.patch(&json!(" 4b ")).unwrap().scene.as_deref(),
            Some("4B")
        );
    }

    #[test]
    fn field_names_parse() {
        assert_eq!("scene".parse::<RangeField>().unwrap(), RangeField::Scene);
        assert_eq!("details".parse::<RangeField>().unwrap(), RangeField::ShotDetails);
        assert_eq!(
            "iso".parse::<RangeField>().unwrap(),
            RangeField::Extra("iso".to_string())
        );
        assert!("  ".parse::<RangeField>().is_err());
    }
}
