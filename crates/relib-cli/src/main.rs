use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod dispatch;
mod prompt;
mod render;

use render::TerminalRenderer;

const LOG_ENV_VAR: &str = "RELIB_LOG";

#[derive(Parser, Debug)]
#[command(name = "relib")]
#[command(about = "Restore a project library from its lockfile", long_about = None)]
struct Cli {
    /// Project root; defaults to the current directory.
    #[arg(long, global = true)]
    project: Option<PathBuf>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install and remove packages until the library matches the lockfile.
    Restore(RestoreArgs),
    /// Show what a restore would do.
    Status(PlanArgs),
    /// List installed packages.
    Library {
        #[arg(long = "library")]
        library: Vec<PathBuf>,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct PlanArgs {
    #[arg(long)]
    lockfile: Option<PathBuf>,
    /// Library search path; the first one is the project library.
    #[arg(long = "library")]
    library: Vec<PathBuf>,
    /// Repository override as NAME=LOCATION.
    #[arg(long = "repo", value_parser = parse_repo_override)]
    repo: Vec<(String, String)>,
    /// Remove project-library packages the lockfile does not list.
    #[arg(long)]
    clean: bool,
    #[arg(long = "exclude")]
    exclude: Vec<String>,
    /// Restrict the restore to these packages.
    packages: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
struct RestoreArgs {
    #[command(flatten)]
    plan: PlanArgs,
    /// Ask before changing anything.
    #[arg(long)]
    prompt: bool,
    /// Do not pull in dependencies the lockfile does not list.
    #[arg(long)]
    no_recursive: bool,
    /// Reinstall these packages even when installed; `*` means all.
    #[arg(long = "rebuild")]
    rebuild: Vec<String>,
    #[arg(long)]
    runtime_version: Option<String>,
}

fn parse_repo_override(value: &str) -> Result<(String, String), String> {
    let Some((name, location)) = value.split_once('=') else {
        return Err(format!("expected NAME=LOCATION, got '{value}'"));
    };
    let name = name.trim();
    let location = location.trim();
    if name.is_empty() || location.is_empty() {
        return Err(format!("expected NAME=LOCATION, got '{value}'"));
    }
    Ok((name.to_string(), location.to_string()))
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_root = match cli.project {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let renderer = TerminalRenderer::current();

    match cli.command {
        Commands::Restore(args) => dispatch::run_restore(&project_root, &args, renderer),
        Commands::Status(args) => dispatch::run_status(&project_root, &args, renderer),
        Commands::Library { library } => dispatch::run_library(&project_root, &library, renderer),
    }
}
