//! Take registry: the sole writer of a project's take records
//!
//! The registry holds one project and its takes in listing order. Every
//! mutation builds the next record set, hands it to storage, and only swaps
//! it in once the write succeeded. A failed write leaves the registry exactly
//! as it was.

use std::collections::BTreeSet;

use crate::domain::{
    detect, next_available, Changeset, ConflictSet, LogSheet, Project, ProjectId, TakeEditRequest,
    TakeId, TakePatch, MAX_NUMBER,
};
use crate::storage::TakeStorage;

use super::EngineError;

/// In-memory view of one project's takes
#[derive(Debug, Clone)]
pub struct TakeRegistry {
    project: Project,
    takes: Vec<LogSheet>,
}

impl TakeRegistry {
    /// Loads a project's takes from storage
    pub fn load(storage: &dyn TakeStorage, project_id: &ProjectId) -> Result<Self, EngineError> {
        let stored = storage
            .load_project_takes(project_id)
            .map_err(EngineError::persistence)?
            .ok_or_else(|| EngineError::ProjectNotFound(project_id.clone()))?;

        let mut takes = stored.takes;
        takes.sort_by(LogSheet::listing_cmp);

        log::debug!("loaded project {} ({} takes)", project_id, takes.len());
        Ok(Self {
            project: stored.project,
            takes,
        })
    }

    /// Persists a new, empty project
    pub fn create_project(storage: &dyn TakeStorage, project: Project) -> Result<Self, EngineError> {
        storage
            .save_project_takes(&project, &[])
            .map_err(EngineError::persistence)?;

        log::info!("created project {} ({})", project.id, project.name);
        Ok(Self {
            project,
            takes: Vec::new(),
        })
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Every take, ordered by scene, take number, camera
    pub fn takes(&self) -> &[LogSheet] {
        &self.takes
    }

    pub fn get(&self, id: &TakeId) -> Option<&LogSheet> {
        self.takes.iter().find(|t| &t.id == id)
    }

    pub fn find(&self, scene: &str, take_number: u32, camera: u32) -> Option<&LogSheet> {
        let scene = crate::domain::normalize_scene(scene);
        self.takes
            .iter()
            .find(|t| t.scene == scene && t.take_number == take_number && t.camera == camera)
    }

    /// Allocates the identifier for the next new take
    pub fn next_take_id(&self) -> TakeId {
        let next = self.takes.iter().map(|t| t.id.sequence()).max().unwrap_or(0) + 1;
        self.project.id.take_id(next)
    }

    /// The file number a new take on `camera` gets when none is given
    ///
    /// One past the highest used number, or the first gap once the highest
    /// number is taken.
    pub fn next_file_number(&self, camera: u32) -> Option<u32> {
        let used: BTreeSet<u32> = self
            .takes
            .iter()
            .filter(|t| t.camera == camera)
            .filter_map(|t| t.file_number)
            .collect();

        match used.iter().next_back() {
            None => Some(1),
            Some(&max) if max < MAX_NUMBER => Some(max + 1),
            Some(_) => next_available(&used, 1),
        }
    }

    /// Inserts a take that must not collide with anything
    pub fn create(&mut self, storage: &dyn TakeStorage, candidate: LogSheet) -> Result<LogSheet, EngineError> {
        self.check_record(&candidate)?;
        if self.get(&candidate.id).is_some() {
            return Err(EngineError::InvalidTake(format!(
                "take {} already exists",
                candidate.id
            )));
        }

        let conflicts = detect(&self.takes, &candidate);
        if !conflicts.is_empty() {
            return Err(EngineError::Duplicate(conflicts));
        }

        let mut takes = self.takes.clone();
        takes.push(candidate.clone());
        self.persist(storage, self.project.clone(), takes)?;

        log::info!("created take {} ({})", candidate.id, candidate);
        Ok(candidate)
    }

    /// Merges a patch into a stored take
    ///
    /// The patched record is validated and checked for duplicates like a new
    /// take would be.
    pub fn update(
        &mut self,
        storage: &dyn TakeStorage,
        id: &TakeId,
        patch: &TakePatch,
    ) -> Result<LogSheet, EngineError> {
        let mut updated = self
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::TakeNotFound(id.clone()))?;
        updated.apply_patch(patch);
        if !self.project.settings.is_multi_camera() {
            updated.cam_rec_state = None;
        }
        self.check_record(&updated)?;

        let conflicts = detect(&self.takes, &updated);
        if !conflicts.is_empty() {
            return Err(EngineError::Duplicate(conflicts));
        }

        let takes = self
            .takes
            .iter()
            .map(|t| if &t.id == id { updated.clone() } else { t.clone() })
            .collect();
        self.persist(storage, self.project.clone(), takes)?;

        log::info!("updated take {} ({})", updated.id, updated);
        Ok(updated)
    }

    /// Removes a take; returns false (and writes nothing) if it was not stored
    pub fn delete(&mut self, storage: &dyn TakeStorage, id: &TakeId) -> Result<bool, EngineError> {
        if self.get(id).is_none() {
            return Ok(false);
        }

        let takes = self.takes.iter().filter(|t| &t.id != id).cloned().collect();
        self.persist(storage, self.project.clone(), takes)?;

        log::info!("deleted take {}", id);
        Ok(true)
    }

    /// Commits a changeset as one write
    ///
    /// Every upserted record is checked against the resulting record set;
    /// any collision rejects the whole changeset.
    pub fn commit(&mut self, storage: &dyn TakeStorage, changeset: &Changeset) -> Result<(), EngineError> {
        for take in &changeset.upserts {
            self.check_record(take)?;
        }

        let after = changeset.apply_to(&self.takes);
        let conflicts: Vec<_> = changeset
            .upserts
            .iter()
            .flat_map(|take| detect(&after, take).iter().cloned().collect::<Vec<_>>())
            .collect();
        if !conflicts.is_empty() {
            return Err(EngineError::Duplicate(ConflictSet::new(conflicts)));
        }

        self.persist(storage, self.project.clone(), after)?;

        log::info!(
            "committed take {} ({} upserted, {} deleted)",
            changeset.primary,
            changeset.upserts.len(),
            changeset.deletes.len()
        );
        Ok(())
    }

    /// Raises the project's camera count
    ///
    /// Stored recording states grow with it so every camera has an entry.
    pub fn set_camera_count(&mut self, storage: &dyn TakeStorage, count: u32) -> Result<(), EngineError> {
        let mut project = self.project.clone();
        project.set_camera_count(count)?;
        if project == self.project {
            return Ok(());
        }

        let takes = self
            .takes
            .iter()
            .cloned()
            .map(|mut t| {
                t.cam_rec_state = t.cam_rec_state.map(|s| s.resized(count));
                t
            })
            .collect();
        self.persist(storage, project, takes)?;

        log::info!("project {} now records {} camera(s)", self.project.id, count);
        Ok(())
    }

    fn check_record(&self, take: &LogSheet) -> Result<(), EngineError> {
        if take.project_id != self.project.id {
            return Err(EngineError::InvalidTake(format!(
                "take {} does not belong to project {}",
                take.id, self.project.id
            )));
        }
        TakeEditRequest::from_existing(take).validate(self.project.camera_count())?;
        Ok(())
    }

    /// Writes the next state, then adopts it
    fn persist(
        &mut self,
        storage: &dyn TakeStorage,
        mut project: Project,
        mut takes: Vec<LogSheet>,
    ) -> Result<(), EngineError> {
        project.touch();
        takes.sort_by(LogSheet::listing_cmp);

        if let Err(err) = storage.save_project_takes(&project, &takes) {
            log::warn!("failed to persist project {}: {:#}", project.id, err);
            return Err(EngineError::persistence(err));
        }

        self.project = project;
        self.takes = takes;
        Ok(())
    }
}
