//! Camera recording state commands

use anyhow::Result;
use clap::Subcommand;

use super::app::open_service;
use super::output::Output;
use crate::domain::{CameraRecState, TakeId};

#[derive(Subcommand)]
pub enum CameraCommands {
    /// Flip a camera between rolling and stopped on a take
    Toggle {
        /// Take ID
        take: String,

        /// Camera id (0-based)
        camera: u32,
    },

    /// Set a camera's roll/card label on a take (omit to clear)
    Label {
        /// Take ID
        take: String,

        /// Camera id (0-based)
        camera: u32,

        /// Label, e.g. A012
        label: Option<String>,
    },
}

pub fn run(cmd: CameraCommands, output: &Output) -> Result<()> {
    let (_, service) = open_service()?;

    let (take_id, state) = match cmd {
        CameraCommands::Toggle { take, camera } => {
            let id: TakeId = take.parse()?;
            let state = service.toggle_camera_recording(&id, camera)?;
            output.verbose_ctx(
                "camera",
                &format!("cam {} is now {}", camera, rolling_label(&state, camera)),
            );
            (id, state)
        }
        CameraCommands::Label {
            take,
            camera,
            label,
        } => {
            let id: TakeId = take.parse()?;
            let state = service.set_camera_label(&id, camera, label)?;
            (id, state)
        }
    };

    if output.is_json() {
        output.data(&serde_json::json!({
            "take": take_id,
            "cameras": state.serialize(),
        }));
    } else {
        println!("{}:", take_id);
        print_camera_state(&state);
    }

    Ok(())
}

fn rolling_label(state: &CameraRecState, camera: u32) -> &'static str {
    if state.is_rolling(camera) {
        "rolling"
    } else {
        "stopped"
    }
}

pub(super) fn print_camera_state(state: &CameraRecState) {
    for camera in 0..state.camera_count() {
        let label = state
            .channel(camera)
            .ok()
            .and_then(|c| c.label.as_deref())
            .map(|l| format!(" [{}]", l))
            .unwrap_or_default();
        println!("  cam {}: {}{}", camera, rolling_label(state, camera), label);
    }
}
