//! JSONL storage for projects and takes
//!
//! Each project lives in `.takelog/projects/{id}.jsonl`: the first line is the
//! project header, every following line one take. Uses file locking for
//! concurrent access safety.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use fs2::FileExt;
use serde::Serialize;

use super::{ProjectTakes, TakeStorage};
use crate::domain::{LogSheet, Project, ProjectId, TakeId};

/// Tag field naming the kind of record on a line
const RECORD_TAG: &str = "record";

/// One line of a project file (borrowed, for writing)
#[derive(Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum LineRef<'a> {
    Project(&'a Project),
    Take(&'a LogSheet),
}

/// Store for project files in JSONL format
pub struct JsonlStore {
    dir: PathBuf,
}

impl JsonlStore {
    /// Creates a store rooted at the given projects directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates the default store for a workspace
    pub fn for_workspace(workspace_root: &Path) -> Self {
        Self::new(workspace_root.join(".takelog").join("projects"))
    }

    /// Returns the projects directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file path of a project
    pub fn project_path(&self, project_id: &ProjectId) -> PathBuf {
        self.dir.join(format!("{}.jsonl", project_id))
    }

    fn read_file(&self, path: &Path) -> Result<ProjectTakes> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open project file: {}", path.display()))?;

        // Acquire shared lock for reading
        file.lock_shared()
            .context("Failed to acquire read lock on project file")?;

        let reader = BufReader::new(&file);
        let mut project = None;
        let mut takes: BTreeMap<TakeId, LogSheet> = BTreeMap::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read line {}", line_num + 1))?;

            if line.trim().is_empty() {
                continue;
            }

            let context = || format!("Failed to parse {} at line {}", path.display(), line_num + 1);

            // Internally tagged enums cannot read integer map keys (camera state)
            let mut value: serde_json::Value = serde_json::from_str(&line).with_context(context)?;
            let tag = value
                .as_object_mut()
                .and_then(|fields| fields.remove(RECORD_TAG))
                .and_then(|tag| tag.as_str().map(str::to_string));

            match tag.as_deref() {
                Some("project") => {
                    project = Some(serde_json::from_value(value).with_context(context)?);
                }
                // Later lines win for a repeated ID
                Some("take") => {
                    let take: LogSheet = serde_json::from_value(value).with_context(context)?;
                    takes.insert(take.id.clone(), take);
                }
                other => bail!(
                    "Unknown record {:?} in {} at line {}",
                    other,
                    path.display(),
                    line_num + 1
                ),
            }
        }

        let project = project
            .with_context(|| format!("Project header missing in {}", path.display()))?;

        Ok(ProjectTakes {
            project,
            takes: takes.into_values().collect(),
        })
    }
}

impl TakeStorage for JsonlStore {
    fn load_project_takes(&self, project_id: &ProjectId) -> Result<Option<ProjectTakes>> {
        let path = self.project_path(project_id);
        if !path.exists() {
            return Ok(None);
        }
        self.read_file(&path).map(Some)
    }

    fn save_project_takes(&self, project: &Project, takes: &[LogSheet]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create directory: {}", self.dir.display()))?;

        let path = self.project_path(&project.id);
        // Write to temp file first
        let temp_path = path.with_extension("jsonl.tmp");

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

            // Acquire exclusive lock
            file.lock_exclusive()
                .context("Failed to acquire write lock on project file")?;

            let mut writer = BufWriter::new(&file);

            let header = serde_json::to_string(&LineRef::Project(project))
                .context("Failed to serialize project")?;
            writeln!(writer, "{}", header).context("Failed to write project")?;

            let mut sorted: Vec<_> = takes.iter().collect();
            sorted.sort_by(|a, b| a.listing_cmp(b));

            for take in sorted {
                let line =
                    serde_json::to_string(&LineRef::Take(take)).context("Failed to serialize take")?;
                writeln!(writer, "{}", line).context("Failed to write take")?;
            }

            writer.flush().context("Failed to flush project file")?;
        }

        // Atomic rename
        fs::rename(&temp_path, &path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }

    fn list_projects(&self) -> Result<Vec<Project>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read directory: {}", self.dir.display()))?;

        let mut projects = Vec::new();
        for entry in entries {
            let path = entry.context("Failed to read directory entry")?.path();
            if path.extension().map(|e| e == "jsonl").unwrap_or(false) {
                projects.push(self.read_file(&path)?.project);
            }
        }

        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(projects)
    }

    fn delete_project(&self, project_id: &ProjectId) -> Result<bool> {
        let path = self.project_path(project_id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)
            .with_context(|| format!("Failed to remove project file: {}", path.display()))?;
        Ok(true)
    }
}
