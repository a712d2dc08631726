//! Take service: the entry point the surrounding application calls
//!
//! One [`ProjectSession`] per project holds the registry and at most one
//! pending resolution workflow. Sessions are locked individually, so work on
//! one project never waits on another while edits to the same project run
//! one at a time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::domain::{
    apply_range, detect, expand_range, CameraError, CameraRecState, Changeset, ConflictSet,
    Decision, LogSheet, Project, ProjectId, ProjectSettings, RangeRequest, RangeSpec,
    ResolutionError, ResolutionWorkflow, Strategy, TakeEditRequest, TakeId, TakePatch,
};
use crate::storage::TakeStorage;

use super::{EngineError, TakeRegistry};

/// Identifies a save that is waiting for a resolution decision
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResolutionHandle {
    project_id: ProjectId,
    token: u64,
}

impl ResolutionHandle {
    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }
}

/// What the caller needs to present a pending conflict
#[derive(Debug, PartialEq)]
pub struct PendingResolution {
    pub handle: ResolutionHandle,
    pub candidate: LogSheet,
    pub conflicts: ConflictSet,
    pub strategies: Vec<Strategy>,
    /// Why the last chosen strategy was refused, if it was
    pub rejected: Option<EngineError>,
}

/// Outcome of a save or resolution attempt
#[derive(Debug, PartialEq)]
pub enum SaveResult {
    Committed(LogSheet),
    ConflictsPending(PendingResolution),
    Cancelled,
    Failed(EngineError),
}

impl SaveResult {
    /// The committed record, if the save went through
    pub fn committed(self) -> Option<LogSheet> {
        match self {
            SaveResult::Committed(take) => Some(take),
            _ => None,
        }
    }
}

struct PendingWorkflow {
    handle: ResolutionHandle,
    workflow: ResolutionWorkflow,
    range: Option<RangeRequest>,
}

struct ProjectSession {
    registry: TakeRegistry,
    pending: Option<PendingWorkflow>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct TakeService<S> {
    storage: S,
    sessions: Mutex<HashMap<ProjectId, Arc<Mutex<ProjectSession>>>>,
    next_token: AtomicU64,
}

impl<S: TakeStorage> TakeService<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            sessions: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn session(&self, project_id: &ProjectId) -> Result<Arc<Mutex<ProjectSession>>, EngineError> {
        if let Some(session) = lock(&self.sessions).get(project_id) {
            return Ok(Arc::clone(session));
        }

        // Loaded without the map lock; a racing loader's session wins
        let registry = TakeRegistry::load(&self.storage, project_id)?;
        let session = lock(&self.sessions)
            .entry(project_id.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(ProjectSession {
                    registry,
                    pending: None,
                }))
            })
            .clone();
        Ok(session)
    }

    fn with_registry<T>(
        &self,
        project_id: &ProjectId,
        f: impl FnOnce(&mut TakeRegistry, &S) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let session = self.session(project_id)?;
        let mut session = lock(&session);
        f(&mut session.registry, &self.storage)
    }

    // --- Projects ---

    pub fn create_project(
        &self,
        name: &str,
        settings: ProjectSettings,
    ) -> Result<Project, EngineError> {
        let project = Project::new(name, settings)?;
        let registry = TakeRegistry::create_project(&self.storage, project.clone())?;

        lock(&self.sessions).insert(
            project.id.clone(),
            Arc::new(Mutex::new(ProjectSession {
                registry,
                pending: None,
            })),
        );
        Ok(project)
    }

    pub fn projects(&self) -> Result<Vec<Project>, EngineError> {
        self.storage.list_projects().map_err(EngineError::persistence)
    }

    pub fn project(&self, project_id: &ProjectId) -> Result<Project, EngineError> {
        self.with_registry(project_id, |registry, _| Ok(registry.project().clone()))
    }

    /// Raises a project's camera count
    pub fn set_camera_count(&self, project_id: &ProjectId, count: u32) -> Result<Project, EngineError> {
        self.with_registry(project_id, |registry, storage| {
            registry.set_camera_count(storage, count)?;
            Ok(registry.project().clone())
        })
    }

    /// Deletes a project with all its takes
    pub fn delete_project(&self, project_id: &ProjectId) -> Result<bool, EngineError> {
        let mut sessions = lock(&self.sessions);
        let session = sessions.get(project_id).cloned();
        let guard = session.as_deref().map(|s| lock(s));

        let deleted = self
            .storage
            .delete_project(project_id)
            .map_err(EngineError::persistence)?;

        drop(guard);
        sessions.remove(project_id);
        if deleted {
            log::info!("deleted project {}", project_id);
        }
        Ok(deleted)
    }

    // --- Queries ---

    /// Takes of a project, ordered by scene, take number, camera
    pub fn list_takes(&self, project_id: &ProjectId) -> Result<Vec<LogSheet>, EngineError> {
        self.with_registry(project_id, |registry, _| Ok(registry.takes().to_vec()))
    }

    pub fn get_take(&self, take_id: &TakeId) -> Result<LogSheet, EngineError> {
        self.with_registry(&take_id.project_id(), |registry, _| {
            registry
                .get(take_id)
                .cloned()
                .ok_or_else(|| EngineError::TakeNotFound(take_id.clone()))
        })
    }

    pub fn find_take(
        &self,
        project_id: &ProjectId,
        scene: &str,
        take_number: u32,
        camera: u32,
    ) -> Result<Option<LogSheet>, EngineError> {
        self.with_registry(project_id, |registry, _| {
            Ok(registry.find(scene, take_number, camera).cloned())
        })
    }

    /// Reports what saving `request` would collide with, without saving
    pub fn check_take(&self, request: &TakeEditRequest) -> Result<ConflictSet, EngineError> {
        self.with_registry(&request.project_id, |registry, _| {
            let (candidate, _) = build_candidate(registry, request)?;
            Ok(detect(registry.takes(), &candidate))
        })
    }

    // --- Direct mutations ---

    /// Inserts a new take without offering resolution
    ///
    /// Fails with [`EngineError::Duplicate`] when the take collides.
    pub fn create_take(&self, request: &TakeEditRequest) -> Result<LogSheet, EngineError> {
        self.with_registry(&request.project_id, |registry, storage| {
            if let Some(id) = &request.take_id {
                return Err(EngineError::InvalidTake(format!("take {} already exists", id)));
            }
            let (candidate, _) = build_candidate(registry, request)?;
            registry.create(storage, candidate)
        })
    }

    pub fn update_take(&self, take_id: &TakeId, patch: &TakePatch) -> Result<LogSheet, EngineError> {
        self.with_registry(&take_id.project_id(), |registry, storage| {
            registry.update(storage, take_id, patch)
        })
    }

    /// Deletes takes; unknown IDs are skipped
    ///
    /// Returns the number of takes that were actually removed.
    pub fn delete_takes(&self, take_ids: &[TakeId]) -> Result<usize, EngineError> {
        let mut deleted = 0;
        for take_id in take_ids {
            let removed = match self.with_registry(&take_id.project_id(), |registry, storage| {
                registry.delete(storage, take_id)
            }) {
                Err(EngineError::ProjectNotFound(_)) => false,
                other => other?,
            };
            if removed {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    // --- Save with resolution ---

    /// Saves a new or edited take
    ///
    /// Conflicts are not an error: the result carries them together with a
    /// handle for [`resolve_conflict`](Self::resolve_conflict). A save on a
    /// project abandons any resolution still pending there.
    pub fn save_take(&self, request: TakeEditRequest) -> SaveResult {
        self.try_save(request).unwrap_or_else(SaveResult::Failed)
    }

    fn try_save(&self, request: TakeEditRequest) -> Result<SaveResult, EngineError> {
        let session = self.session(&request.project_id)?;
        let mut guard = lock(&session);
        let session = &mut *guard;

        if let Some(abandoned) = session.pending.take() {
            log::warn!(
                "abandoning pending resolution for take {}",
                abandoned.workflow.candidate().id
            );
        }

        let (candidate, previous) = build_candidate(&session.registry, &request)?;
        if let Some(range) = &request.range {
            check_range(range)?;
        }

        let mut workflow = ResolutionWorkflow::new(candidate, previous);
        match workflow.detect(session.registry.takes())? {
            Some(changeset) => {
                let take = self.commit(
                    &mut session.registry,
                    &mut workflow,
                    changeset,
                    request.range.as_ref(),
                )?;
                Ok(SaveResult::Committed(take))
            }
            None => {
                let handle = ResolutionHandle {
                    project_id: request.project_id.clone(),
                    token: self.next_token.fetch_add(1, Ordering::Relaxed),
                };
                let pending = describe(&handle, &workflow, None);
                session.pending = Some(PendingWorkflow {
                    handle,
                    workflow,
                    range: request.range,
                });
                Ok(SaveResult::ConflictsPending(pending))
            }
        }
    }

    /// Applies the chosen strategy to a pending save
    ///
    /// A refused strategy keeps the save pending with the refusal attached.
    /// A failed write keeps it pending too, so the same handle can retry.
    pub fn resolve_conflict(&self, handle: &ResolutionHandle, strategy: Strategy) -> SaveResult {
        self.try_resolve(handle, strategy)
            .unwrap_or_else(SaveResult::Failed)
    }

    fn try_resolve(
        &self,
        handle: &ResolutionHandle,
        strategy: Strategy,
    ) -> Result<SaveResult, EngineError> {
        let session = lock(&self.sessions)
            .get(&handle.project_id)
            .cloned()
            .ok_or(EngineError::StaleResolution)?;
        let mut guard = lock(&session);
        let session = &mut *guard;

        let mut pending = match session.pending.take() {
            Some(pending) if pending.handle == *handle => pending,
            other => {
                session.pending = other;
                return Err(EngineError::StaleResolution);
            }
        };

        let decision = match pending.workflow.choose(strategy, session.registry.takes()) {
            Ok(decision) => decision,
            Err(err @ ResolutionError::InvalidState { .. }) => return Err(err.into()),
            Err(err) => {
                let described = describe(handle, &pending.workflow, Some(err.into()));
                session.pending = Some(pending);
                return Ok(SaveResult::ConflictsPending(described));
            }
        };

        match decision {
            Decision::Cancelled => {
                log::debug!("save of take {} cancelled", pending.workflow.candidate().id);
                Ok(SaveResult::Cancelled)
            }
            Decision::Commit(changeset) => {
                match self.commit(
                    &mut session.registry,
                    &mut pending.workflow,
                    changeset,
                    pending.range.as_ref(),
                ) {
                    Ok(take) => Ok(SaveResult::Committed(take)),
                    Err(err) => {
                        pending.workflow.abort_resolving()?;
                        session.pending = Some(pending);
                        Err(err)
                    }
                }
            }
        }
    }

    /// Drops a pending save; returns false if the handle was not pending
    pub fn cancel_resolution(&self, handle: &ResolutionHandle) -> bool {
        matches!(
            self.resolve_conflict(handle, Strategy::Cancel),
            SaveResult::Cancelled
        )
    }

    /// Commits a workflow's changeset, with the declared range folded in
    fn commit(
        &self,
        registry: &mut TakeRegistry,
        workflow: &mut ResolutionWorkflow,
        mut changeset: Changeset,
        range: Option<&RangeRequest>,
    ) -> Result<LogSheet, EngineError> {
        if let Some(range) = range {
            let after = changeset.apply_to(registry.takes());
            let patches = apply_range(&range.spec, &range.value, &after)?;
            merge_patches(&mut changeset, &after, patches);
        }

        registry.commit(&self.storage, &changeset)?;
        workflow.mark_committed()?;

        registry
            .get(&changeset.primary)
            .cloned()
            .ok_or_else(|| EngineError::TakeNotFound(changeset.primary.clone()))
    }

    // --- Range edits ---

    /// Writes `value` into `spec.field` on every take the range covers
    ///
    /// All patched records are committed together or not at all. Returns
    /// the records as stored.
    pub fn apply_range_edit(
        &self,
        spec: &RangeSpec,
        value: &Value,
        project_id: &ProjectId,
    ) -> Result<Vec<LogSheet>, EngineError> {
        self.with_registry(project_id, |registry, storage| {
            let patches = apply_range(spec, value, registry.takes())?;
            let Some((primary, _)) = patches.first() else {
                log::debug!("range {}..{} matched no takes", spec.start, spec.end);
                return Ok(Vec::new());
            };

            let mut changeset = Changeset {
                upserts: Vec::new(),
                deletes: Vec::new(),
                primary: primary.clone(),
            };
            let ids: Vec<TakeId> = patches.iter().map(|(id, _)| id.clone()).collect();
            merge_patches(&mut changeset, registry.takes(), patches);
            registry.commit(storage, &changeset)?;

            Ok(ids
                .iter()
                .filter_map(|id| registry.get(id).cloned())
                .collect())
        })
    }

    // --- Camera recording state ---

    /// Flips one camera's rolling flag on a take
    pub fn toggle_camera_recording(
        &self,
        take_id: &TakeId,
        camera: u32,
    ) -> Result<CameraRecState, EngineError> {
        self.update_camera_state(take_id, |state| state.toggle(camera))
    }

    /// Sets or clears one camera's roll/card label on a take
    pub fn set_camera_label(
        &self,
        take_id: &TakeId,
        camera: u32,
        label: Option<String>,
    ) -> Result<CameraRecState, EngineError> {
        self.update_camera_state(take_id, |state| state.with_label(camera, label))
    }

    fn update_camera_state(
        &self,
        take_id: &TakeId,
        change: impl FnOnce(&CameraRecState) -> Result<CameraRecState, CameraError>,
    ) -> Result<CameraRecState, EngineError> {
        self.with_registry(&take_id.project_id(), |registry, storage| {
            let project = registry.project();
            if !project.settings.is_multi_camera() {
                return Err(EngineError::SingleCamera(project.id.clone()));
            }
            let count = project.camera_count();

            let take = registry
                .get(take_id)
                .ok_or_else(|| EngineError::TakeNotFound(take_id.clone()))?;
            let current = take
                .cam_rec_state
                .as_ref()
                .map(|s| s.resized(count))
                .unwrap_or_else(|| CameraRecState::initialize(count));
            let next = change(&current)?;

            let patch = TakePatch {
                cam_rec_state: Some(Some(next.clone())),
                ..Default::default()
            };
            registry.update(storage, take_id, &patch)?;
            Ok(next)
        })
    }
}

/// Validates a request and turns it into the record it would store
///
/// New takes get the next take ID and, when none is given, the next file
/// number on their camera. Edits keep the stored take's ID and creation time.
fn build_candidate(
    registry: &TakeRegistry,
    request: &TakeEditRequest,
) -> Result<(LogSheet, Option<LogSheet>), EngineError> {
    let count = registry.project().camera_count();
    request.validate(count)?;

    match &request.take_id {
        Some(id) => {
            let previous = registry
                .get(id)
                .cloned()
                .ok_or_else(|| EngineError::TakeNotFound(id.clone()))?;
            let candidate = request.to_candidate(id.clone(), previous.created_at, count);
            Ok((candidate, Some(previous)))
        }
        None => {
            let mut candidate = request.to_candidate(registry.next_take_id(), Utc::now(), count);
            if candidate.file_number.is_none() {
                candidate.file_number = registry.next_file_number(candidate.camera);
            }
            Ok((candidate, None))
        }
    }
}

fn check_range(range: &RangeRequest) -> Result<(), EngineError> {
    expand_range(range.spec.start, range.spec.end)?;
    range.spec.field.patch(&range.value)?;
    Ok(())
}

/// Folds range patches into a changeset, patching records it already upserts
fn merge_patches(changeset: &mut Changeset, base: &[LogSheet], patches: Vec<(TakeId, TakePatch)>) {
    for (id, patch) in patches {
        if let Some(existing) = changeset.upserts.iter_mut().find(|t| t.id == id) {
            existing.apply_patch(&patch);
        } else if let Some(take) = base.iter().find(|t| t.id == id) {
            let mut take = take.clone();
            take.apply_patch(&patch);
            changeset.upserts.push(take);
        }
    }
}

fn describe(
    handle: &ResolutionHandle,
    workflow: &ResolutionWorkflow,
    rejected: Option<EngineError>,
) -> PendingResolution {
    PendingResolution {
        handle: handle.clone(),
        candidate: workflow.candidate().clone(),
        conflicts: workflow.conflicts().clone(),
        strategies: workflow.strategies(),
        rejected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{violations, Classification, RangeField, SettingsError, MAX_NUMBER};
    use crate::storage::MemoryStore;
    use proptest::prelude::*;
    // The domain enum, not proptest's trait of the same name
    use crate::domain::Strategy;
    use serde_json::json;
    use std::thread;

    fn service(cameras: u32) -> (TakeService<MemoryStore>, ProjectId) {
        let service = TakeService::new(MemoryStore::new());
        let project = service
            .create_project(
                "Feature",
                ProjectSettings {
                    camera_count: cameras,
                    ..Default::default()
                },
            )
            .unwrap();
        (service, project.id)
    }

    fn save(service: &TakeService<MemoryStore>, project: &ProjectId, scene: &str, n: u32) -> LogSheet {
        service
            .save_take(TakeEditRequest::new(project.clone(), scene, n))
            .committed()
            .expect("save should commit")
    }

    fn pending(result: SaveResult) -> PendingResolution {
        match result {
            SaveResult::ConflictsPending(p) => p,
            other => panic!("expected pending conflicts, got {:?}", other),
        }
    }

    #[test]
    fn save_without_conflicts_commits() {
        let (service, project) = service(1);
        let take = save(&service, &project, "1", 1);

        assert_eq!(take.file_number, Some(1));
        assert_eq!(service.list_takes(&project).unwrap(), vec![take]);
    }

    #[test]
    fn renumber_forward_scenario() {
        let (service, project) = service(1);
        let old1 = save(&service, &project, "1", 1);
        let old2 = save(&service, &project, "1", 2);

        let pending = pending(service.save_take(TakeEditRequest::new(project.clone(), "1", 1)));
        assert_eq!(pending.conflicts.single_target(), Some(&old1.id));
        assert!(pending.strategies.contains(&Strategy::RenumberForward));

        let committed = service
            .resolve_conflict(&pending.handle, Strategy::RenumberForward)
            .committed()
            .unwrap();

        assert_eq!(committed.take_number, 1);
        assert_eq!(service.get_take(&old1.id).unwrap().take_number, 2);
        assert_eq!(service.get_take(&old2.id).unwrap().take_number, 3);
        assert!(violations(&service.list_takes(&project).unwrap()).is_empty());
    }

    #[test]
    fn overwrite_keeps_the_existing_identifier() {
        let (service, project) = service(1);
        let original = save(&service, &project, "1", 1);

        let request = TakeEditRequest::new(project.clone(), "1", 1)
            .with_file_number(1)
            .with_classification(Classification::Good);
        let pending = pending(service.save_take(request));
        let survivor = service
            .resolve_conflict(&pending.handle, Strategy::Overwrite)
            .committed()
            .unwrap();

        assert_eq!(survivor.id, original.id);
        assert_eq!(survivor.classification, Some(Classification::Good));
        assert_eq!(service.list_takes(&project).unwrap().len(), 1);
    }

    #[test]
    fn cancel_leaves_the_registry_identical() {
        let (service, project) = service(1);
        save(&service, &project, "1", 1);
        let before = service.list_takes(&project).unwrap();
        let writes = service.storage().write_count();

        let pending = pending(service.save_take(TakeEditRequest::new(project.clone(), "1", 1)));
        assert_eq!(
            service.resolve_conflict(&pending.handle, Strategy::Cancel),
            SaveResult::Cancelled
        );

        assert_eq!(service.list_takes(&project).unwrap(), before);
        assert_eq!(service.storage().write_count(), writes);
    }

    #[test]
    fn handles_go_stale_after_use_or_a_new_save() {
        let (service, project) = service(1);
        save(&service, &project, "1", 1);

        let first = pending(service.save_take(TakeEditRequest::new(project.clone(), "1", 1)));
        let second = pending(service.save_take(TakeEditRequest::new(project.clone(), "1", 1)));

        assert_eq!(
            service.resolve_conflict(&first.handle, Strategy::RenumberForward),
            SaveResult::Failed(EngineError::StaleResolution)
        );
        assert!(service.cancel_resolution(&second.handle));
        assert!(!service.cancel_resolution(&second.handle));
    }

    #[test]
    fn refused_strategy_keeps_the_save_pending() {
        let (service, project) = service(1);
        save(&service, &project, "1", 1);

        let first = pending(service.save_take(TakeEditRequest::new(project.clone(), "1", 1)));
        let retry = pending(service.resolve_conflict(&first.handle, Strategy::Swap));

        assert_eq!(retry.handle, first.handle);
        assert_eq!(retry.rejected, Some(EngineError::StrategyUnavailable(Strategy::Swap)));
        assert!(service
            .resolve_conflict(&retry.handle, Strategy::Overwrite)
            .committed()
            .is_some());
    }

    #[test]
    fn exhausted_renumber_falls_back_to_overwrite_and_cancel() {
        let (service, project) = service(1);
        save(&service, &project, "1", MAX_NUMBER - 1);
        save(&service, &project, "1", MAX_NUMBER);

        let first = pending(service.save_take(
            TakeEditRequest::new(project.clone(), "1", MAX_NUMBER - 1).with_file_number(1),
        ));
        let retry = pending(service.resolve_conflict(&first.handle, Strategy::RenumberForward));

        assert_eq!(retry.rejected, Some(EngineError::RenumberExhausted(MAX_NUMBER - 1)));
        assert_eq!(retry.strategies, vec![Strategy::Overwrite, Strategy::Cancel]);
    }

    #[test]
    fn failed_commit_can_be_retried_with_the_same_handle() {
        let (service, project) = service(1);
        save(&service, &project, "1", 1);
        let before = service.list_takes(&project).unwrap();

        let first = pending(service.save_take(TakeEditRequest::new(project.clone(), "1", 1)));
        service.storage().fail_writes(true);
        assert!(matches!(
            service.resolve_conflict(&first.handle, Strategy::RenumberForward),
            SaveResult::Failed(EngineError::Persistence(_))
        ));
        assert_eq!(service.list_takes(&project).unwrap(), before);

        service.storage().fail_writes(false);
        assert!(service
            .resolve_conflict(&first.handle, Strategy::RenumberForward)
            .committed()
            .is_some());
        assert_eq!(service.list_takes(&project).unwrap().len(), 2);
    }

    #[test]
    fn swap_exchanges_slots_of_an_edit() {
        let (service, project) = service(1);
        let a = save(&service, &project, "1", 1);
        let b = save(&service, &project, "1", 2);

        let mut request = TakeEditRequest::from_existing(&b);
        request.take_number = 1;
        let pending = pending(service.save_take(request));
        assert!(pending.strategies.contains(&Strategy::Swap));

        service
            .resolve_conflict(&pending.handle, Strategy::Swap)
            .committed()
            .unwrap();

        assert_eq!(service.get_take(&b.id).unwrap().take_number, 1);
        assert_eq!(service.get_take(&a.id).unwrap().take_number, 2);
    }

    #[test]
    fn editing_in_place_is_not_a_conflict() {
        let (service, project) = service(1);
        let take = save(&service, &project, "1", 1);

        let mut request = TakeEditRequest::from_existing(&take);
        request.shot_details = "wide".to_string();
        let updated = service.save_take(request).committed().unwrap();

        assert_eq!(updated.id, take.id);
        assert_eq!(updated.created_at, take.created_at);
        assert_eq!(updated.shot_details, "wide");
    }

    #[test]
    fn create_take_fails_on_duplicates() {
        let (service, project) = service(1);
        save(&service, &project, "1", 1);

        assert!(matches!(
            service.create_take(&TakeEditRequest::new(project.clone(), "1", 1)),
            Err(EngineError::Duplicate(_))
        ));
    }

    #[test]
    fn validation_errors_do_not_touch_the_registry() {
        let (service, project) = service(2);
        let writes = service.storage().write_count();

        let result = service.save_take(TakeEditRequest::new(project.clone(), "1", 1).with_camera(5));
        assert_eq!(
            result,
            SaveResult::Failed(EngineError::UnknownCamera { camera: 5, count: 2 })
        );
        assert_eq!(service.storage().write_count(), writes);
    }

    #[test]
    fn range_edit_sets_only_matching_takes() {
        let (service, project) = service(1);
        let ids: Vec<_> = [1, 3, 4, 6]
            .iter()
            .map(|n| save(&service, &project, "1", *n).id)
            .collect();

        let spec = RangeSpec::new(RangeField::Extra("lens".to_string()), 3, 5);
        let updated = service
            .apply_range_edit(&spec, &json!("50mm"), &project)
            .unwrap();

        assert_eq!(updated.len(), 2);
        for (id, expected) in ids.iter().zip([None, Some(json!("50mm")), Some(json!("50mm")), None]) {
            let take = service.get_take(id).unwrap();
            assert_eq!(take.fields.get("lens").cloned(), expected);
        }
    }

    #[test]
    fn conflicting_range_edit_changes_nothing() {
        let (service, project) = service(1);
        save(&service, &project, "1", 1);
        save(&service, &project, "2", 1);
        let before = service.list_takes(&project).unwrap();

        let spec = RangeSpec::new(RangeField::Scene, 1, 1).in_scene("1");
        assert!(matches!(
            service.apply_range_edit(&spec, &json!("2"), &project),
            Err(EngineError::Duplicate(_))
        ));
        assert_eq!(service.list_takes(&project).unwrap(), before);
    }

    #[test]
    fn inverted_range_is_rejected_before_any_write() {
        let (service, project) = service(1);
        save(&service, &project, "1", 1);
        let writes = service.storage().write_count();

        let spec = RangeSpec::new(RangeField::ShotDetails, 5, 2);
        assert_eq!(
            service.apply_range_edit(&spec, &json!("x"), &project),
            Err(EngineError::InvalidRange { start: 5, end: 2 })
        );
        assert_eq!(service.storage().write_count(), writes);
    }

    #[test]
    fn save_applies_the_declared_range_in_the_same_commit() {
        let (service, project) = service(1);
        let t2 = save(&service, &project, "1", 2);
        let t3 = save(&service, &project, "1", 3);
        let writes = service.storage().write_count();

        let mut request = TakeEditRequest::new(project.clone(), "1", 1);
        request.range = Some(RangeRequest {
            spec: RangeSpec::new(RangeField::ShotDetails, 1, 3),
            value: json!("dolly"),
        });
        let saved = service.save_take(request).committed().unwrap();

        assert_eq!(saved.shot_details, "dolly");
        assert_eq!(service.get_take(&t2.id).unwrap().shot_details, "dolly");
        assert_eq!(service.get_take(&t3.id).unwrap().shot_details, "dolly");
        assert_eq!(service.storage().write_count(), writes + 1);
    }

    #[test]
    fn toggling_one_camera_leaves_the_others() {
        let (service, project) = service(3);
        let take = save(&service, &project, "1", 1);

        let state = service.toggle_camera_recording(&take.id, 2).unwrap();
        assert!(state.is_rolling(0));
        assert!(state.is_rolling(1));
        assert!(!state.is_rolling(2));

        let stored = service.get_take(&take.id).unwrap();
        assert_eq!(stored.cam_rec_state, Some(state));
    }

    #[test]
    fn camera_count_above_limit_is_refused() {
        let (service, project) = service(2);

        assert_eq!(
            service.set_camera_count(&project, 4_000_000_000),
            Err(EngineError::Settings(SettingsError::TooManyCameras(4_000_000_000)))
        );
        assert_eq!(service.project(&project).unwrap().camera_count(), 2);
    }

    #[test]
    fn camera_state_needs_a_multi_camera_project() {
        let (service, project) = service(1);
        let take = save(&service, &project, "1", 1);

        assert_eq!(
            service.toggle_camera_recording(&take.id, 0),
            Err(EngineError::SingleCamera(project))
        );
    }

    #[test]
    fn unknown_camera_toggle_is_rejected() {
        let (service, project) = service(2);
        let take = save(&service, &project, "1", 1);

        assert_eq!(
            service.toggle_camera_recording(&take.id, 2),
            Err(EngineError::UnknownCamera { camera: 2, count: 2 })
        );
    }

    #[test]
    fn delete_takes_skips_unknown_ids() {
        let (service, project) = service(1);
        let take = save(&service, &project, "1", 1);

        let missing = project.take_id(99);
        assert_eq!(service.delete_takes(&[take.id.clone(), missing]).unwrap(), 1);
        assert_eq!(service.delete_takes(&[take.id]).unwrap(), 0);
    }

    #[test]
    fn deleting_a_project_invalidates_pending_handles() {
        let (service, project) = service(1);
        save(&service, &project, "1", 1);
        let pending = pending(service.save_take(TakeEditRequest::new(project.clone(), "1", 1)));

        assert!(service.delete_project(&project).unwrap());
        assert_eq!(
            service.resolve_conflict(&pending.handle, Strategy::Overwrite),
            SaveResult::Failed(EngineError::StaleResolution)
        );
        assert_eq!(
            service.list_takes(&project),
            Err(EngineError::ProjectNotFound(project))
        );
    }

    #[test]
    fn parallel_saves_keep_projects_consistent() {
        let service = TakeService::new(MemoryStore::new());
        let projects: Vec<ProjectId> = (0..3)
            .map(|i| {
                service
                    .create_project(&format!("Unit {}", i), ProjectSettings::default())
                    .unwrap()
                    .id
            })
            .collect();

        thread::scope(|scope| {
            for project in &projects {
                for worker in 0..4u32 {
                    let service = &service;
                    scope.spawn(move || {
                        for n in 1..=10u32 {
                            let scene = format!("{}", worker + 1);
                            let result = service.save_take(TakeEditRequest::new(project.clone(), scene, n));
                            assert!(matches!(result, SaveResult::Committed(_)));
                        }
                    });
                }
            }
        });

        for project in &projects {
            let takes = service.list_takes(project).unwrap();
            assert_eq!(takes.len(), 40);
            assert!(violations(&takes).is_empty());
        }
    }

    #[test]
    fn racing_first_opens_share_one_session() {
        let store = MemoryStore::new();
        let project = Project::new("Stored", ProjectSettings::default()).unwrap();
        store.save_project_takes(&project, &[]).unwrap();
        let service = TakeService::new(store);

        thread::scope(|scope| {
            for worker in 0..8u32 {
                let service = &service;
                let project = &project.id;
                scope.spawn(move || {
                    let request = TakeEditRequest::new(project.clone(), "1", worker + 1);
                    assert!(matches!(service.save_take(request), SaveResult::Committed(_)));
                });
            }
        });

        let reloaded = TakeRegistry::load(service.storage(), &project.id).unwrap();
        assert_eq!(reloaded.takes().len(), 8);
    }

    #[test]
    fn find_take_looks_up_a_slot() {
        let (service, project) = service(2);
        let take = save(&service, &project, "12a", 3);

        let found = service.find_take(&project, "12A", 3, 0).unwrap();
        assert_eq!(found.map(|t| t.id), Some(take.id));
        assert_eq!(service.find_take(&project, "12A", 3, 1).unwrap(), None);
        assert_eq!(service.find_take(&project, "12A", 4, 0).unwrap(), None);
    }

    proptest! {
        #[test]
        fn random_saves_never_leave_duplicates(
            edits in proptest::collection::vec((0u8..3, 1u32..6, 0usize..4), 1..40)
        ) {
            let (service, project) = service(2);
            let strategies = [Strategy::RenumberForward, Strategy::Overwrite, Strategy::Swap, Strategy::Cancel];

            for (scene, n, pick) in edits {
                let request = TakeEditRequest::new(project.clone(), scene.to_string(), n)
                    .with_camera(u32::from(scene % 2));
                if let SaveResult::ConflictsPending(p) = service.save_take(request) {
                    let _ = service.resolve_conflict(&p.handle, strategies[pick]);
                }
                let takes = service.list_takes(&project).unwrap();
                prop_assert!(violations(&takes).is_empty());
            }
        }
    }
}
