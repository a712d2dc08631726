//! In-memory take storage
//!
//! Keeps projects in a map behind a mutex. Writes can be made to fail on
//! demand, which is how the engine's write-then-confirm behavior is tested.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use anyhow::{bail, Result};

use super::{ProjectTakes, TakeStorage};
use crate::domain::{LogSheet, Project, ProjectId};

#[derive(Default)]
pub struct MemoryStore {
    projects: Mutex<BTreeMap<ProjectId, ProjectTakes>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following write fail until switched off again
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl TakeStorage for MemoryStore {
    fn load_project_takes(&self, project_id: &ProjectId) -> Result<Option<ProjectTakes>> {
        let projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(projects.get(project_id).cloned())
    }

    fn save_project_takes(&self, project: &Project, takes: &[LogSheet]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("simulated write failure for project {}", project.id);
        }

        let mut projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
        projects.insert(
            project.id.clone(),
            ProjectTakes {
                project: project.clone(),
                takes: takes.to_vec(),
            },
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn list_projects(&self) -> Result<Vec<Project>> {
        let projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
        let mut list: Vec<Project> = projects.values().map(|p| p.project.clone()).collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(list)
    }

    fn delete_project(&self, project_id: &ProjectId) -> Result<bool> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("simulated write failure for project {}", project_id);
        }

        let mut projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(projects.remove(project_id).is_some())
    }
}
