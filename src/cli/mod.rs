//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Core | Workspace setup | `init` |
//! | Project | Production settings | `project new`, `project cameras` |
//! | Take | Log sheet entry | `take add`, `take edit`, `take check` |
//! | Range | Bulk field edits | `range p-1234567 --field lens --from 3 --to 5 --value 50mm` |
//! | Camera | Recording state | `camera toggle`, `camera label` |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug output, including engine logs:
//! ```bash
//! takelog --verbose take add p-1234567 --scene 1 --take 1
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod output;
mod project;
mod take;
mod range;
mod camera;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};
