//! Main CLI application structure

use anyhow::Result;
use clap::{Parser, Subcommand};

use super::output::{Output, OutputFormat};
use super::{camera, project, range, take};
use crate::engine::TakeService;
use crate::storage::{Config, JsonlStore, Workspace};

#[derive(Parser)]
#[command(name = "takelog")]
#[command(author, version, about = "Take registry for film production logging")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config's default_format)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new takelog workspace
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,
    },

    /// Manage projects
    #[command(subcommand)]
    Project(project::ProjectCommands),

    /// Manage takes
    #[command(subcommand)]
    Take(take::TakeCommands),

    /// Write one value into a field of every take in a number range
    Range(range::RangeArgs),

    /// Per-take camera recording state
    #[command(subcommand)]
    Camera(camera::CameraCommands),
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let format = match cli.format {
        Some(format) => format,
        None => Config::load_global()?.default_format.into(),
    };
    let output = Output::new(format, cli.verbose);

    output.verbose("takelog starting");

    match cli.command {
        Commands::Init { path } => {
            output.verbose_ctx("init", &format!("Initializing workspace at: {}", path));
            let workspace = Workspace::init(&path)?;
            output.verbose_ctx(
                "init",
                &format!("Created .takelog directory at: {}", workspace.takelog_dir().display()),
            );
            output.success(&format!(
                "Initialized takelog workspace at {}",
                workspace.root().display()
            ));
        }

        Commands::Project(cmd) => project::run(cmd, &output)?,
        Commands::Take(cmd) => take::run(cmd, &output)?,
        Commands::Range(args) => range::run(args, &output)?,
        Commands::Camera(cmd) => camera::run(cmd, &output)?,
    }

    output.verbose("Command completed successfully");
    Ok(())
}

/// `--verbose` forces debug logging; otherwise `RUST_LOG` or `warn` applies
fn init_logging(verbose: bool) {
    let env = env_logger::Env::default().default_filter_or("warn");
    let mut builder = env_logger::Builder::from_env(env);
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // A logger may already be installed when running embedded
    let _ = builder.try_init();
}

/// Opens the current workspace and a take service over its store
pub(super) fn open_service() -> Result<(Workspace, TakeService<JsonlStore>)> {
    let workspace = Workspace::open_current()?;
    let service = TakeService::new(workspace.store());
    Ok((workspace, service))
}
