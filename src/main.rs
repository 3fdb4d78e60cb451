use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

use sitewright::{Environment, Executor, Mode, Paths, SitewrightError, pipeline, watch};

/// Build a web front-end into a deployable output tree.
///
/// Typed script, stylesheets, markup, images, fonts, and config files are
/// transformed by a fixed task graph; `tsc` and `esbuild` must be available
/// on the PATH.
#[derive(Parser)]
#[command(name = "sitewright", version)]
struct Cli {
    /// Run as if started in this directory
    #[arg(long, short = 'C', value_name = "DIR", global = true)]
    root: Option<PathBuf>,

    /// Path table override file (default: sitewright.toml if present)
    #[arg(long, value_name = "FILE", global = true)]
    paths: Option<PathBuf>,

    /// Report per-file details
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Delete all generated output, then build everything
    Rebuild,
    /// Build every pipeline without cleaning first
    Build,
    /// Delete all generated output
    Clean,
    /// Build the script pipeline only
    BuildJs,
    /// Build the stylesheet pipeline only
    BuildStyles,
    /// Stay resident and re-run affected pipelines as sources change
    Watch,
}

impl Commands {
    fn task(self) -> &'static str {
        match self {
            Commands::Rebuild => "rebuild",
            Commands::Build => "build",
            Commands::Clean => "clean",
            Commands::BuildJs => "build-js",
            Commands::BuildStyles => "build-styles",
            Commands::Watch => "watch",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), SitewrightError> {
    if let Some(root) = &cli.root {
        std::env::set_current_dir(root)?;
    }

    let paths = match &cli.paths {
        Some(file) => Paths::load(file)?,
        None if std::path::Path::new("sitewright.toml").exists() => {
            Paths::load("sitewright.toml")?
        }
        None => Paths::default(),
    };

    let registry = pipeline::graph(&paths)?;

    let task = match cli.command {
        None => "default",
        Some(command) => command.task(),
    };

    let mode = match cli.command {
        Some(Commands::Watch) => Mode::Watch,
        _ => Mode::Build,
    };

    eprintln!(
        "Running {} in {} mode.",
        style("Sitewright").red(),
        style(task).blue()
    );

    let env = Environment {
        mode,
        verbose: cli.verbose,
    };

    match mode {
        Mode::Watch => {
            let targets = pipeline::watch_targets(&paths);
            watch(&registry, &targets, env)?;
        }
        Mode::Build => {
            Executor::new(&registry, env).run(task)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
