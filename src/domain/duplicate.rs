//! Duplicate detection for take mutations
//!
//! A candidate collides with an existing take of the same project and camera
//! when it reuses its scene/take number (content collision) or its file
//! number (naming collision). A record never conflicts with itself.

use std::collections::BTreeSet;

use serde::Serialize;

use super::id::TakeId;
use super::take::LogSheet;

/// Which uniqueness key a conflict violates
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Same scene, take number and camera
    SceneTake,
    /// Same file number on the same camera
    FileNumber,
}

impl ConflictKind {
    pub fn label(&self) -> &'static str {
        match self {
            ConflictKind::SceneTake => "scene/take",
            ConflictKind::FileNumber => "file number",
        }
    }
}

/// One existing take colliding with a candidate
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Conflict {
    pub take_id: TakeId,
    pub kind: ConflictKind,
}

/// Every collision of a candidate against the registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConflictSet {
    conflicts: Vec<Conflict>,
}

impl ConflictSet {
    pub fn new(mut conflicts: Vec<Conflict>) -> Self {
        conflicts.sort();
        conflicts.dedup();
        Self { conflicts }
    }

    /// Empty means the candidate can be committed as is
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts.iter()
    }

    pub fn has_kind(&self, kind: ConflictKind) -> bool {
        self.conflicts.iter().any(|c| c.kind == kind)
    }

    /// IDs of takes involved in a conflict of the given kind
    pub fn ids_of_kind(&self, kind: ConflictKind) -> BTreeSet<TakeId> {
        self.conflicts
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.take_id.clone())
            .collect()
    }

    /// IDs of every conflicting take
    pub fn take_ids(&self) -> BTreeSet<TakeId> {
        self.conflicts.iter().map(|c| c.take_id.clone()).collect()
    }

    /// The conflicting take, if every conflict points at the same one
    pub fn single_target(&self) -> Option<&TakeId> {
        let first = &self.conflicts.first()?.take_id;
        self.conflicts
            .iter()
            .all(|c| &c.take_id == first)
            .then_some(first)
    }
}

/// Checks a candidate against the existing takes
pub fn detect(existing: &[LogSheet], candidate: &LogSheet) -> ConflictSet {
    let mut conflicts = Vec::new();

    let peers = existing.iter().filter(|t| {
        t.project_id == candidate.project_id && t.camera == candidate.camera && t.id != candidate.id
    });

    for take in peers {
        if take.same_slot(candidate) {
            conflicts.push(Conflict {
                take_id: take.id.clone(),
                kind: ConflictKind::SceneTake,
            });
        }
        if candidate.file_number.is_some() && take.file_number == candidate.file_number {
            conflicts.push(Conflict {
                take_id: take.id.clone(),
                kind: ConflictKind::FileNumber,
            });
        }
    }

    if !conflicts.is_empty() {
        log::debug!(
            "{} conflict(s) for {} ({})",
            conflicts.len(),
            candidate.id,
            candidate
        );
    }

    ConflictSet::new(conflicts)
}

/// Every pair of takes in `takes` that violates a uniqueness key
///
/// Used to verify a whole record set before it is committed.
pub fn violations(takes: &[LogSheet]) -> Vec<(TakeId, Conflict)> {
    let mut found = Vec::new();
    for (i, take) in takes.iter().enumerate() {
        for conflict in detect(&takes[i + 1..], take).iter() {
            found.push((take.id.clone(), conflict.clone()));
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::id::ProjectId;
    use chrono::Utc;

    fn take(project: &ProjectId, seq: u32, scene: &str, n: u32, cam: u32, file: Option<u32>) -> LogSheet {
        let mut t = LogSheet::new(project.take_id(seq), scene, n, cam);
        t.file_number = file;
        t
    }

    #[test]
    fn empty_registry_has_no_conflicts() {
        let p = ProjectId::new("Test", Utc::now());
        let candidate = take(&p, 1, "1", 1, 0, Some(1));

        assert!(detect(&[], &candidate).is_empty());
    }

    #[test]
    fn scene_take_conflict_on_same_camera() {
        let p = ProjectId::new("Test", Utc::now());
        let existing = vec![take(&p, 1, "1", 1, 0, Some(1))];
        let candidate = take(&p, 2, "1", 1, 0, Some(2));

        let conflicts = detect(&existing, &candidate);
        assert_eq!(conflicts.len(), 1);
        assert!(conflicts.has_kind(ConflictKind::SceneTake));
        assert!(!conflicts.has_kind(ConflictKind::FileNumber));
    }

    #[test]
    fn other_camera_or_scene_does_not_conflict() {
        let p = ProjectId::new("Test", Utc::now());
        let existing = vec![
            take(&p, 1, "1", 1, 1, Some(1)),
            take(&p, 2, "2", 1, 0, Some(2)),
        ];
        let candidate = take(&p, 3, "1", 1, 0, Some(3));

        assert!(detect(&existing, &candidate).is_empty());
    }

    #[test]
    fn file_number_conflict_crosses_scenes() {
        let p = ProjectId::new("Test", Utc::now());
        let existing = vec![take(&p, 1, "4", 2, 0, Some(17))];
        let candidate = take(&p, 2, "5", 1, 0, Some(17));

        let conflicts = detect(&existing, &candidate);
        assert_eq!(conflicts.ids_of_kind(ConflictKind::FileNumber).len(), 1);
        assert_eq!(conflicts.single_target(), Some(&p.take_id(1)));
    }

    #[test]
    fn record_never_conflicts_with_itself() {
        let p = ProjectId::new("Test", Utc::now());
        let original = take(&p, 1, "1", 1, 0, Some(1));
        let mut edited = original.clone();
        edited.shot_details = "reframed".to_string();

        assert!(detect(&[original], &edited).is_empty());
    }

    #[test]
    fn missing_file_numbers_never_collide() {
        let p = ProjectId::new("Test", Utc::now());
        let existing = vec![take(&p, 1, "1", 1, 0, None)];
        let candidate = take(&p, 2, "1", 2, 0, None);

        assert!(detect(&existing, &candidate).is_empty());
    }

    #[test]
    fn single_target_requires_one_record() {
        let p = ProjectId::new("Test", Utc::now());
        let existing = vec![
            take(&p, 1, "1", 1, 0, Some(1)),
            take(&p, 2, "1", 2, 0, Some(9)),
        ];
        let candidate = take(&p, 3, "1", 1, 0, Some(9));

        let conflicts = detect(&existing, &candidate);
        assert_eq!(conflicts.len(), 2);
        assert!(conflicts.single_target().is_none());
    }

    #[test]
    fn violations_reports_pairs() {
        let p = ProjectId::new("Test", Utc::now());
        let takes = vec![
            take(&p, 1, "1", 1, 0, Some(1)),
            take(&p, 2, "1", 1, 0, Some(2)),
            take(&p, 3, "1", 2, 0, Some(3)),
        ];

        let found = violations(&takes);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, p.take_id(1));
        assert_eq!(found[0].1.take_id, p.take_id(2));
    }
}
