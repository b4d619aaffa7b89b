use crate::config::config::SandboxConfig;
use crate::config::validator::validate_config;
use crate::observability::metrics::get_metrics;
use crate::sandbox::Sandbox;
use crate::vfs::{MissionDescriptor, MissionFile};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to ./pybox.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Wall-clock budget per run in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
    /// Print Prometheus metrics to stderr after the command
    #[arg(long, global = true)]
    metrics: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a mission's entry file (or a named file)
    Run {
        /// Mission descriptor JSON
        #[arg(long)]
        mission: PathBuf,
        /// Path of the file to run instead of the entry
        #[arg(long)]
        file: Option<String>,
    },
    /// Run hidden tests against a mission
    Test {
        /// Mission descriptor JSON
        #[arg(long)]
        mission: PathBuf,
        /// Test module source (defaults to the descriptor's `tests`)
        #[arg(long)]
        tests: Option<PathBuf>,
    },
    /// Execute a single program
    Exec {
        /// Source code as string
        #[arg(long, conflicts_with = "file")]
        code: Option<String>,
        /// Source file to run as main.py
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Validate the configuration and print the effective values
    CheckConfig,
}

pub fn run() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.timeout_ms)?;

    let ok = match cli.command {
        Commands::CheckConfig => {
            let validation = validate_config(&config)?;
            for warning in &validation.warnings {
                eprintln!("Warning: {}", warning);
            }
            emit_json(&config)?;
            true
        }
        Commands::Run { mission, file } => {
            let sandbox = Sandbox::new(config)?;
            let state = MissionDescriptor::load_from_file(&mission)?.initial_state();
            let result = match file {
                Some(path) => sandbox.execute_file(&state, &path),
                None => sandbox.execute(&state),
            };
            emit_json(&result)?;
            result.success
        }
        Commands::Test { mission, tests } => {
            let sandbox = Sandbox::new(config)?;
            let descriptor = MissionDescriptor::load_from_file(&mission)?;
            let test_source = match tests {
                Some(path) => read_source(&path)?,
                None => descriptor.tests.clone().with_context(|| {
                    format!(
                        "{} has no tests; pass --tests",
                        mission.display()
                    )
                })?,
            };
            let result = sandbox.run_tests(&descriptor.initial_state(), &test_source);
            emit_json(&result)?;
            result.run.success
        }
        Commands::Exec { code, file } => {
            let source = match (code, file) {
                (Some(code), _) => code,
                (None, Some(path)) => read_source(&path)?,
                (None, None) => anyhow::bail!("either --code or --file is required"),
            };
            let sandbox = Sandbox::new(config)?;
            let descriptor = MissionDescriptor {
                files: vec![MissionFile::entry("main.py", source)],
                ..Default::default()
            };
            let result = sandbox.execute(&descriptor.initial_state());
            emit_json(&result)?;
            result.success
        }
    };

    if cli.metrics {
        eprint!("{}", get_metrics().export_prometheus());
    }

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

fn load_config(path: Option<&Path>, timeout_ms: Option<u64>) -> Result<SandboxConfig> {
    let mut config = match path {
        Some(path) => SandboxConfig::load_from_file(path)?,
        None => SandboxConfig::load_default()?,
    };
    if timeout_ms.is_some() {
        config.exec_timeout_ms = timeout_ms;
    }
    Ok(config)
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
