//! Command-line interface implementation.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::generator::{generate_all, GenerateConfig};

const EXIT_SUCCESS: u8 = 0;
const EXIT_ERROR: u8 = 1;

/// cgen - Expand declarative canvas test definitions into conformance tests
#[derive(Parser)]
#[command(name = "cgen")]
#[command(about = "Expand declarative canvas test definitions into conformance test files")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate test files from YAML definitions
    Generate {
        /// Directory containing *.yaml test definition files
        #[arg(long, default_value = "yaml-new")]
        yaml: PathBuf,

        /// YAML file mapping test-name prefixes to output subdirectories
        #[arg(long)]
        name_to_dir: PathBuf,

        /// Directory holding the page templates
        #[arg(long, default_value = "templates")]
        templates: PathBuf,

        /// Output directory for element-hosted tests
        #[arg(long, default_value = "../element")]
        element_out: PathBuf,

        /// Output directory for offscreen-hosted tests
        #[arg(long, default_value = "../offscreen")]
        offscreen_out: PathBuf,
    },
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { yaml, name_to_dir, templates, element_out, offscreen_out } => {
            let config = GenerateConfig {
                yaml_dir: yaml,
                name_to_dir,
                templates_dir: templates,
                element_out,
                offscreen_out,
            };
            match generate_all(&config) {
                Ok(()) => ExitCode::from(EXIT_SUCCESS),
                Err(e) => {
                    eprintln!("Error: {e}");
                    ExitCode::from(EXIT_ERROR)
                }
            }
        }
    }
}
