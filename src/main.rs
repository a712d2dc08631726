//! takelog - Take registry for film production logging

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = takelog::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
