//! Take CLI commands

use std::collections::BTreeSet;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde_json::Value;

use super::app::open_service;
use super::camera::print_camera_state;
use super::output::Output;
use crate::domain::{
    Classification, ConflictSet, LogSheet, ProjectId, TakeEditRequest, TakeId, TakePatch,
    WasteReason,
};
use crate::engine::{PendingResolution, SaveResult, TakeService};
use crate::storage::{ConflictPolicy, JsonlStore, Workspace};

#[derive(Subcommand)]
pub enum TakeCommands {
    /// Log a new take
    ///
    /// Examples:
    ///   takelog take add p-1234567 --scene 4 --take 1
    ///   takelog take add p-1234567 --scene 4A --take 2 --camera 1 --good
    ///   takelog take add p-1234567 --scene 4 --take 3 --waste focus,sound
    Add {
        /// Project ID
        project: String,

        /// Scene label
        #[arg(long)]
        scene: String,

        /// Take number
        #[arg(long = "take")]
        take_number: u32,

        #[command(flatten)]
        fields: TakeFieldArgs,
    },

    /// Edit a logged take
    Edit {
        /// Take ID
        id: String,

        /// New scene label
        #[arg(long)]
        scene: Option<String>,

        /// New take number
        #[arg(long = "take")]
        take_number: Option<u32>,

        #[command(flatten)]
        fields: TakeFieldArgs,
    },

    /// List takes of a project
    List {
        /// Project ID
        project: String,

        /// Only takes of this scene
        #[arg(long)]
        scene: Option<String>,
    },

    /// Show take details
    Show {
        /// Take ID
        id: String,
    },

    /// Delete takes (unknown IDs are ignored)
    Delete {
        /// Take IDs
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Report what a new take would collide with, without saving it
    Check {
        /// Project ID
        project: String,

        /// Scene label
        #[arg(long)]
        scene: String,

        /// Take number
        #[arg(long = "take")]
        take_number: u32,

        /// Camera id (0-based)
        #[arg(long, default_value = "0")]
        camera: u32,

        /// File number
        #[arg(long = "file")]
        file_number: Option<u32>,
    },

    /// Stop range edits from writing a field on a take
    Disable {
        /// Take ID
        id: String,

        /// Field name (e.g. lens, scene, shot_details)
        field: String,
    },

    /// Let range edits write a field on a take again
    Enable {
        /// Take ID
        id: String,

        /// Field name
        field: String,
    },
}

/// Take fields shared by `take add` and `take edit`
#[derive(Args)]
pub struct TakeFieldArgs {
    /// Camera id (0-based)
    #[arg(long)]
    camera: Option<u32>,

    /// File number (new takes get the next free one when omitted)
    #[arg(long = "file")]
    file_number: Option<u32>,

    /// Mark the take as good
    #[arg(long, conflicts_with_all = ["waste", "insert"])]
    good: bool,

    /// Mark the take as waste, with comma-separated reasons
    /// (camera, sound, performance, focus, other)
    #[arg(long, value_delimiter = ',', num_args = 0.., conflicts_with = "insert")]
    waste: Option<Vec<String>>,

    /// Mark the take as an insert recorded at this sound speed
    #[arg(long, value_name = "SPEED")]
    insert: Option<f64>,

    /// Free-text shot details
    #[arg(long)]
    details: Option<String>,

    /// Template field as KEY=VALUE (JSON values accepted, text otherwise)
    #[arg(long = "field", value_name = "KEY=VALUE")]
    fields: Vec<String>,

    /// What to do when the take collides with another
    /// (ask, renumber, overwrite, swap, cancel)
    #[arg(long = "on-conflict", value_name = "STRATEGY")]
    on_conflict: Option<String>,
}

impl TakeFieldArgs {
    fn classification(&self) -> Result<Option<Classification>> {
        if self.good {
            return Ok(Some(Classification::Good));
        }
        if let Some(reasons) = &self.waste {
            let reasons = reasons
                .iter()
                .filter(|r| !r.trim().is_empty())
                .map(|r| r.parse::<WasteReason>().map_err(anyhow::Error::msg))
                .collect::<Result<BTreeSet<_>>>()?;
            return Ok(Some(Classification::Waste { reasons }));
        }
        if let Some(sound_speed) = self.insert {
            return Ok(Some(Classification::Insert { sound_speed }));
        }
        Ok(None)
    }

    /// Writes the given options over `request`
    fn apply_to(&self, request: &mut TakeEditRequest) -> Result<()> {
        if let Some(camera) = self.camera {
            request.camera = camera;
        }
        if let Some(file_number) = self.file_number {
            request.file_number = Some(file_number);
        }
        if let Some(classification) = self.classification()? {
            request.classification = Some(classification);
        }
        if let Some(details) = &self.details {
            request.shot_details = details.clone();
        }
        for field in &self.fields {
            let (key, value) = parse_field(field)?;
            request.fields.set(key, value);
        }
        Ok(())
    }

    fn policy(&self, workspace: &Workspace) -> Result<ConflictPolicy> {
        match &self.on_conflict {
            Some(s) => Ok(s.parse()?),
            None => Ok(workspace.config().workspace.conflicts.default_strategy),
        }
    }
}

/// Parses `KEY=VALUE`; values that are not valid JSON are kept as text
pub(super) fn parse_field(input: &str) -> Result<(String, Value)> {
    let (key, raw) = input
        .split_once('=')
        .with_context(|| format!("Expected KEY=VALUE, got '{}'", input))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("Field name must not be empty in '{}'", input);
    }
    Ok((key.to_string(), parse_value(raw)))
}

pub(super) fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub fn run(cmd: TakeCommands, output: &Output) -> Result<()> {
    match cmd {
        TakeCommands::Add {
            project,
            scene,
            take_number,
            fields,
        } => add_take(output, &project, &scene, take_number, &fields),
        TakeCommands::Edit {
            id,
            scene,
            take_number,
            fields,
        } => edit_take(output, &id, scene, take_number, &fields),
        TakeCommands::List { project, scene } => list_takes(output, &project, scene.as_deref()),
        TakeCommands::Show { id } => show_take(output, &id),
        TakeCommands::Delete { ids } => delete_takes(output, &ids),
        TakeCommands::Check {
            project,
            scene,
            take_number,
            camera,
            file_number,
        } => check_take(output, &project, &scene, take_number, camera, file_number),
        TakeCommands::Disable { id, field } => set_field_enabled(output, &id, &field, false),
        TakeCommands::Enable { id, field } => set_field_enabled(output, &id, &field, true),
    }
}

fn add_take(
    output: &Output,
    project_str: &str,
    scene: &str,
    take_number: u32,
    args: &TakeFieldArgs,
) -> Result<()> {
    let (workspace, service) = open_service()?;
    let project_id: ProjectId = project_str.parse()?;

    let mut request = TakeEditRequest::new(project_id, scene, take_number);
    args.apply_to(&mut request)?;

    save(output, &service, request, args.policy(&workspace)?)
}

fn edit_take(
    output: &Output,
    id_str: &str,
    scene: Option<String>,
    take_number: Option<u32>,
    args: &TakeFieldArgs,
) -> Result<()> {
    let (workspace, service) = open_service()?;
    let id: TakeId = id_str.parse()?;

    let take = service.get_take(&id)?;
    let mut request = TakeEditRequest::from_existing(&take);
    if let Some(scene) = scene {
        request.scene = scene;
    }
    if let Some(take_number) = take_number {
        request.take_number = take_number;
    }
    args.apply_to(&mut request)?;

    save(output, &service, request, args.policy(&workspace)?)
}

/// Saves a take, resolving conflicts per `policy`
fn save(
    output: &Output,
    service: &TakeService<JsonlStore>,
    request: TakeEditRequest,
    policy: ConflictPolicy,
) -> Result<()> {
    let mut result = service.save_take(request);

    let retry = match (&result, policy.strategy()) {
        (SaveResult::ConflictsPending(pending), Some(strategy)) => {
            output.verbose_ctx(
                "take",
                &format!(
                    "{} conflict(s), resolving with '{}'",
                    pending.conflicts.len(),
                    strategy
                ),
            );
            Some((pending.handle.clone(), strategy))
        }
        _ => None,
    };
    if let Some((handle, strategy)) = retry {
        result = service.resolve_conflict(&handle, strategy);
    }

    match result {
        SaveResult::Committed(take) => {
            if output.is_json() {
                output.data(&take);
            } else {
                output.success(&format!("Saved take: {} - {}", take.id, take));
            }
            Ok(())
        }
        SaveResult::ConflictsPending(pending) => {
            report_pending(output, &pending);
            bail!(
                "Take conflicts with {} existing record(s); re-run with --on-conflict <strategy>",
                pending.conflicts.take_ids().len()
            )
        }
        SaveResult::Cancelled => {
            output.success("Save cancelled; nothing changed");
            Ok(())
        }
        SaveResult::Failed(err) => Err(err.into()),
    }
}

fn report_pending(output: &Output, pending: &PendingResolution) {
    let strategies: Vec<&str> = pending.strategies.iter().map(|s| s.as_str()).collect();

    if output.is_json() {
        output.data(&serde_json::json!({
            "candidate": pending.candidate,
            "conflicts": pending.conflicts,
            "strategies": strategies,
            "rejected": pending.rejected.as_ref().map(|e| e.to_string()),
        }));
        return;
    }

    if let Some(rejected) = &pending.rejected {
        output.warn(&format!("Strategy refused: {}", rejected));
    }
    output.warn(&format!("Conflicts for {}:", pending.candidate));
    for line in conflict_lines(&pending.conflicts) {
        output.warn(&line);
    }
    output.warn(&format!("Available strategies: {}", strategies.join(", ")));
}

fn conflict_lines(conflicts: &ConflictSet) -> Vec<String> {
    conflicts
        .iter()
        .map(|c| format!("  {:<16} {}", c.take_id, c.kind.label()))
        .collect()
}

fn list_takes(output: &Output, project_str: &str, scene: Option<&str>) -> Result<()> {
    let (_, service) = open_service()?;
    let project_id: ProjectId = project_str.parse()?;

    let mut takes = service.list_takes(&project_id)?;
    if let Some(scene) = scene {
        let scene = crate::domain::normalize_scene(scene);
        takes.retain(|t| t.scene == scene);
    }
    output.verbose_ctx("take", &format!("{} take(s) listed", takes.len()));

    if output.is_json() {
        output.data(&takes);
    } else if takes.is_empty() {
        match scene {
            Some(scene) => println!("No takes for scene {}", scene),
            None => println!("No takes"),
        }
    } else {
        println!(
            "{:<16} {:<6} {:<5} {:<4} {:<5} {:<7} DETAILS",
            "ID", "SCENE", "TAKE", "CAM", "FILE", "CLASS"
        );
        println!("{}", "-".repeat(70));

        for take in &takes {
            println!(
                "{:<16} {:<6} {:<5} {:<4} {:<5} {:<7} {}",
                take.id,
                take.scene,
                take.take_number,
                take.camera,
                take.file_number.map(|n| n.to_string()).unwrap_or_default(),
                take.classification.as_ref().map(|c| c.label()).unwrap_or("-"),
                take.shot_details
            );
        }
    }

    Ok(())
}

fn print_take(take: &LogSheet) {
    println!("ID:        {}", take.id);
    println!("Scene:     {}", take.scene);
    println!("Take:      {}", take.take_number);
    println!("Camera:    {}", take.camera);
    if let Some(n) = take.file_number {
        println!("File:      {}", n);
    }
    match &take.classification {
        Some(Classification::Waste { reasons }) if !reasons.is_empty() => {
            let reasons: Vec<&str> = reasons.iter().map(|r| r.as_str()).collect();
            println!("Class:     waste ({})", reasons.join(", "));
        }
        Some(Classification::Insert { sound_speed }) => {
            println!("Class:     insert at {}", sound_speed);
        }
        Some(other) => println!("Class:     {}", other.label()),
        None => {}
    }
    if !take.shot_details.is_empty() {
        println!("Details:   {}", take.shot_details);
    }
    println!("Created:   {}", take.created_at.format("%Y-%m-%d %H:%M"));
    println!("Updated:   {}", take.updated_at.format("%Y-%m-%d %H:%M"));

    if !take.fields.is_empty() {
        println!();
        println!("Fields:");
        for (key, value) in take.fields.iter() {
            let marker = if take.accepts_range_field(key) { "" } else { " (range edits off)" };
            match value {
                Value::String(s) => println!("  {}: {}{}", key, s, marker),
                other => println!("  {}: {}{}", key, other, marker),
            }
        }
    }

    let loose: Vec<&str> = take
        .disabled_fields
        .iter()
        .filter(|f| take.fields.get(f).is_none())
        .map(|f| f.as_str())
        .collect();
    if !loose.is_empty() {
        println!("Range edits off for: {}", loose.join(", "));
    }

    if let Some(state) = &take.cam_rec_state {
        println!();
        println!("Cameras:");
        print_camera_state(state);
    }
}

fn show_take(output: &Output, id_str: &str) -> Result<()> {
    let (_, service) = open_service()?;
    let id: TakeId = id_str.parse()?;

    let take = service.get_take(&id)?;

    if output.is_json() {
        output.data(&take);
    } else {
        print_take(&take);
    }

    Ok(())
}

fn delete_takes(output: &Output, id_strs: &[String]) -> Result<()> {
    let (_, service) = open_service()?;
    let ids = id_strs
        .iter()
        .map(|s| s.parse::<TakeId>())
        .collect::<Result<Vec<_>, _>>()?;

    let deleted = service.delete_takes(&ids)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "requested": ids.len(),
            "deleted": deleted,
        }));
    } else {
        output.success(&format!("Deleted {} of {} take(s)", deleted, ids.len()));
    }

    Ok(())
}

fn check_take(
    output: &Output,
    project_str: &str,
    scene: &str,
    take_number: u32,
    camera: u32,
    file_number: Option<u32>,
) -> Result<()> {
    let (_, service) = open_service()?;
    let project_id: ProjectId = project_str.parse()?;

    let mut request = TakeEditRequest::new(project_id, scene, take_number).with_camera(camera);
    request.file_number = file_number;

    let conflicts = service.check_take(&request)?;
    let occupant = service.find_take(&request.project_id, scene, take_number, camera)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "clear": conflicts.is_empty(),
            "occupied_by": occupant.as_ref().map(|t| &t.id),
            "conflicts": conflicts,
        }));
    } else if conflicts.is_empty() {
        println!("No conflicts");
    } else {
        if let Some(take) = &occupant {
            println!("Slot taken by {} ({})", take.id, take);
        }
        println!("{} conflict(s):", conflicts.len());
        for line in conflict_lines(&conflicts) {
            println!("{}", line);
        }
    }

    Ok(())
}

fn set_field_enabled(output: &Output, id_str: &str, field: &str, enabled: bool) -> Result<()> {
    let (_, service) = open_service()?;
    let id: TakeId = id_str.parse()?;
    let field = field.trim();
    if field.is_empty() {
        bail!("Field name must not be empty");
    }

    let take = service.get_take(&id)?;
    let mut disabled = take.disabled_fields.clone();
    let changed = if enabled {
        disabled.remove(field)
    } else {
        disabled.insert(field.to_string())
    };

    let take = if changed {
        let patch = TakePatch {
            disabled_fields: Some(disabled),
            ..Default::default()
        };
        service.update_take(&id, &patch)?
    } else {
        take
    };

    if output.is_json() {
        output.data(&take);
    } else {
        let state = if enabled { "enabled" } else { "disabled" };
        output.success(&format!("Range edits {} for '{}' on {}", state, field, take.id));
    }

    Ok(())
}
