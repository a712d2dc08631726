//! Range edit command

use anyhow::Result;
use clap::Args;
use serde_json::Value;

use super::app::open_service;
use super::output::Output;
use super::take::parse_value;
use crate::domain::{ProjectId, RangeField, RangeSpec};

/// Examples:
///   takelog range p-1234567 --from 3 --to 7 --value 50mm
///   takelog range p-1234567 --field shot_details --from 1 --to 4 --value "wide, dolly in"
///   takelog range p-1234567 --scene 12 --field iso --from 2 --to 5 --value 800
#[derive(Args)]
pub struct RangeArgs {
    /// Project ID
    project: String,

    /// Field to write (scene, shot_details, or a template field such as lens)
    #[arg(long)]
    field: Option<String>,

    /// First take number
    #[arg(long)]
    from: u32,

    /// Last take number (inclusive)
    #[arg(long)]
    to: u32,

    /// Value to write
    #[arg(long)]
    value: String,

    /// Only takes of this scene
    #[arg(long)]
    scene: Option<String>,
}

/// Scene and shot details take the value verbatim; template fields accept JSON
fn field_value(field: &RangeField, raw: &str) -> Value {
    match field {
        RangeField::Scene | RangeField::ShotDetails => Value::String(raw.to_string()),
        RangeField::Extra(_) => parse_value(raw),
    }
}

pub fn run(args: RangeArgs, output: &Output) -> Result<()> {
    let (workspace, service) = open_service()?;
    let project_id: ProjectId = args.project.parse()?;

    let field = match &args.field {
        Some(f) => f.parse::<RangeField>()?,
        None => workspace.config().workspace.range.field()?,
    };
    let value = field_value(&field, &args.value);

    let mut spec = RangeSpec::new(field, args.from, args.to);
    if let Some(scene) = &args.scene {
        spec = spec.in_scene(scene.as_str());
    }
    output.verbose_ctx(
        "range",
        &format!("Writing {} = {} to takes {}-{}", spec.field, value, spec.start, spec.end),
    );

    let updated = service.apply_range_edit(&spec, &value, &project_id)?;

    if output.is_json() {
        output.data(&updated);
    } else if updated.is_empty() {
        println!("No takes changed");
    } else {
        output.success(&format!("Updated {} take(s):", updated.len()));
        for take in &updated {
            println!("  {:<16} {}", take.id, take);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn template_fields_parse_json_values() {
        assert_eq!(field_value(&RangeField::Extra("iso".into()), "800"), json!(800));
        assert_eq!(field_value(&RangeField::Extra("lens".into()), "50mm"), json!("50mm"));
        assert_eq!(field_value(&RangeField::Scene, "12"), json!("12"));
        assert_eq!(field_value(&RangeField::ShotDetails, "true"), json!("true"));
    }
}
