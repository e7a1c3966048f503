//! cgen - Command-line tool for expanding canvas test definitions into
//! runnable conformance test files.

use std::process::ExitCode;

use canvasgen::cli;

fn main() -> ExitCode {
    cli::run()
}
