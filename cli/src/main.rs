//! Binary entry point: delegates entirely to the `pythinfer_cli` library
//! crate, which owns argument parsing and verb dispatch. Kept separate so
//! the dispatch logic is unit-testable without spawning a process.

use std::process::ExitCode;

fn main() -> ExitCode {
    match pythinfer_cli::run() {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::from(1)
        }
    }
}
