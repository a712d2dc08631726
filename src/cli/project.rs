//! Project CLI commands

use std::collections::BTreeMap;

use anyhow::Result;
use clap::Subcommand;

use super::app::open_service;
use super::output::Output;
use crate::domain::{compare_scenes, format_runs, split_runs, LogSheet, ProjectId, ProjectSettings};

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Create a project
    ///
    /// Examples:
    ///   takelog project new "Night Shoot"
    ///   takelog project new "Two Unit" --cameras 2 --logger Sam
    New {
        /// Project name
        name: String,

        /// Number of cameras (defaults to default_camera_count)
        #[arg(long)]
        cameras: Option<u32>,

        /// Logger name (defaults to the configured logger)
        #[arg(long)]
        logger: Option<String>,
    },

    /// List projects
    List,

    /// Show project details and a per-scene take summary
    Show {
        /// Project ID
        id: String,
    },

    /// Raise the number of cameras
    Cameras {
        /// Project ID
        id: String,

        /// New camera count (cannot be lower than the current one)
        count: u32,
    },

    /// Delete a project and all of its takes
    Delete {
        /// Project ID
        id: String,
    },
}

pub fn run(cmd: ProjectCommands, output: &Output) -> Result<()> {
    match cmd {
        ProjectCommands::New {
            name,
            cameras,
            logger,
        } => new_project(output, &name, cameras, logger),
        ProjectCommands::List => list_projects(output),
        ProjectCommands::Show { id } => show_project(output, &id),
        ProjectCommands::Cameras { id, count } => set_cameras(output, &id, count),
        ProjectCommands::Delete { id } => delete_project(output, &id),
    }
}

fn new_project(output: &Output, name: &str, cameras: Option<u32>, logger: Option<String>) -> Result<()> {
    let (workspace, service) = open_service()?;
    let config = &workspace.config().workspace;

    let settings = ProjectSettings {
        camera_count: cameras.unwrap_or(config.default_camera_count),
        logger: logger.unwrap_or_else(|| config.effective_logger()),
    };
    output.verbose_ctx(
        "project",
        &format!("Creating '{}' with {} camera(s)", name, settings.camera_count),
    );

    let project = service.create_project(name, settings)?;

    if output.is_json() {
        output.data(&project);
    } else {
        output.success(&format!("Created project: {} - {}", project.id, project.name));
    }

    Ok(())
}

fn list_projects(output: &Output) -> Result<()> {
    let (_, service) = open_service()?;
    let projects = service.projects()?;

    if output.is_json() {
        output.data(&projects);
    } else if projects.is_empty() {
        println!("No projects");
    } else {
        println!("{:<12} {:<8} {:<16} NAME", "ID", "CAMERAS", "LOGGER");
        println!("{}", "-".repeat(60));

        for project in &projects {
            println!(
                "{:<12} {:<8} {:<16} {}",
                project.id,
                project.camera_count(),
                project.settings.logger,
                project.name
            );
        }
    }

    Ok(())
}

/// Take numbers per scene and camera, e.g. `1-3, 5`
fn scene_summary(takes: &[LogSheet]) -> Vec<(String, u32, String)> {
    let mut grouped: BTreeMap<(String, u32), Vec<u32>> = BTreeMap::new();
    for take in takes {
        grouped
            .entry((take.scene.clone(), take.camera))
            .or_default()
            .push(take.take_number);
    }

    let mut summary: Vec<_> = grouped
        .into_iter()
        .map(|((scene, camera), numbers)| (scene, camera, format_runs(&split_runs(numbers))))
        .collect();
    summary.sort_by(|a, b| compare_scenes(&a.0, &b.0).then_with(|| a.1.cmp(&b.1)));
    summary
}

fn show_project(output: &Output, id_str: &str) -> Result<()> {
    let (_, service) = open_service()?;
    let id: ProjectId = id_str.parse()?;

    let project = service.project(&id)?;
    let takes = service.list_takes(&id)?;
    let summary = scene_summary(&takes);

    if output.is_json() {
        let scenes: Vec<_> = summary
            .iter()
            .map(|(scene, camera, runs)| {
                serde_json::json!({
                    "scene": scene,
                    "camera": camera,
                    "takes": runs,
                })
            })
            .collect();
        output.data(&serde_json::json!({
            "project": project,
            "take_count": takes.len(),
            "scenes": scenes,
        }));
    } else {
        println!("ID:       {}", project.id);
        println!("Name:     {}", project.name);
        println!("Cameras:  {}", project.camera_count());
        if !project.settings.logger.is_empty() {
            println!("Logger:   {}", project.settings.logger);
        }
        println!("Created:  {}", project.created_at.format("%Y-%m-%d %H:%M"));
        println!("Updated:  {}", project.updated_at.format("%Y-%m-%d %H:%M"));
        println!("Takes:    {}", takes.len());

        if !summary.is_empty() {
            println!();
            for (scene, camera, runs) in &summary {
                if project.settings.is_multi_camera() {
                    println!("  Scene {} (cam {}): {}", scene, camera, runs);
                } else {
                    println!("  Scene {}: {}", scene, runs);
                }
            }
        }
    }

    Ok(())
}

fn set_cameras(output: &Output, id_str: &str, count: u32) -> Result<()> {
    let (_, service) = open_service()?;
    let id: ProjectId = id_str.parse()?;

    let project = service.set_camera_count(&id, count)?;

    if output.is_json() {
        output.data(&project);
    } else {
        output.success(&format!(
            "Project {} now has {} camera(s)",
            project.id,
            project.camera_count()
        ));
    }

    Ok(())
}

fn delete_project(output: &Output, id_str: &str) -> Result<()> {
    let (_, service) = open_service()?;
    let id: ProjectId = id_str.parse()?;

    if !service.delete_project(&id)? {
        anyhow::bail!("Project not found: {}", id);
    }

    output.success(&format!("Deleted project: {}", id));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_groups_runs_by_scene_and_camera() {
        let project = ProjectId::new("Summary", chrono::Utc::now());
        let takes: Vec<LogSheet> = [("10", 1, 0), ("2", 1, 0), ("2", 2, 0), ("2", 4, 0), ("2", 1, 1)]
            .iter()
            .enumerate()
            .map(|(i, (scene, n, cam))| LogSheet::new(project.take_id(i as u32 + 1), *scene, *n, *cam))
            .collect();

        assert_eq!(
            scene_summary(&takes),
            vec![
                ("2".to_string(), 0, "1-2, 4".to_string()),
                ("2".to_string(), 1, "1".to_string()),
                ("10".to_string(), 0, "1".to_string()),
            ]
        );
    }
}
