//! autobyte: fetch a remote script, run it, stream its output.
//!
//! # Usage
//!
//! ```bash
//! # Write a starter .autobyte/ directory with the default catalog
//! autobyte init
//!
//! # Show the catalog
//! autobyte list
//!
//! # Run a catalog entry, or any URL, passing extra arguments to the script
//! autobyte run check-drive-space
//! autobyte run https://example.com/tool.ps1 -- -Verbose
//! ```
//!
//! While a script runs, each line typed on stdin is forwarded to it and
//! Ctrl-C stops it.

mod render;

use ab_core::config::loader::{find_project_root, load_config};
use ab_core::init::{generate_autobyte_structure, InitOptions};
use ab_core::relay::TracingListener;
use ab_core::session::SessionController;
use ab_protocol::ipc::Event;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, WrapErr};
use colored::Colorize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "autobyte", version, about = "Fetch and run remote maintenance scripts")]
struct Cli {
    /// Project directory (defaults to the nearest ancestor holding .autobyte/).
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a .autobyte/ directory with the default script catalog.
    Init {
        /// Overwrite an existing .autobyte/ directory.
        #[arg(long)]
        force: bool,
        /// Write a single catalog entry.
        #[arg(long)]
        minimal: bool,
    },
    /// List the script catalog.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Run a catalog entry or a script URL.
    Run {
        /// Catalog name or URL.
        target: String,
        /// Display name for a URL target.
        #[arg(long)]
        name: Option<String>,
        /// Kill the script after this many seconds.
        #[arg(long)]
        timeout: Option<u64>,
        /// Arguments passed to the script.
        #[arg(last = true)]
        args: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let project = match cli.project {
        Some(dir) => dir,
        None => {
            let cwd = std::env::current_dir().wrap_err("Failed to read current directory")?;
            find_project_root(&cwd).unwrap_or(cwd)
        }
    };

    match cli.command {
        Commands::Init { force, minimal } => init(project, force, minimal).await,
        Commands::List { json } => list(&project, json).await,
        Commands::Run {
            target,
            name,
            timeout,
            args,
        } => run(&project, target, name, timeout, args).await,
    }
}

fn init_tracing(verbose: u8) -> color_eyre::Result<()> {
    let default = match verbose {
        0 => "warn",
        1 => "ab_core=info,ab_cli=info",
        _ => "ab_core=debug,ab_cli=debug",
    };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
    Ok(())
}

async fn init(target_dir: PathBuf, force: bool, minimal: bool) -> color_eyre::Result<ExitCode> {
    let written = generate_autobyte_structure(InitOptions {
        target_dir,
        force,
        minimal,
    })
    .await?;

    for path in &written {
        println!("{} {}", "created".green(), path.display());
    }
    println!("Run `autobyte list` to see the catalog.");
    Ok(ExitCode::SUCCESS)
}

async fn list(project: &Path, as_json: bool) -> color_eyre::Result<ExitCode> {
    let config = load_config(project).await?;

    if as_json {
        let entries: Vec<_> = config
            .scripts
            .iter()
            .map(|s| {
                json!({
                    "name": s.name,
                    "url": s.url,
                    "args": s.args,
                    "description": s.description,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(ExitCode::SUCCESS);
    }

    if config.scripts.is_empty() {
        println!("No scripts in the catalog. Run `autobyte init` to create one.");
        return Ok(ExitCode::SUCCESS);
    }

    let runner = ab_core::runner::ProcessRunner::from_config(&config.harness.runner);
    if !runner.interpreter_available() {
        eprintln!(
            "{} interpreter '{}' was not found on PATH",
            "warning:".yellow().bold(),
            runner.program()
        );
    }

    let width = config.scripts.iter().map(|s| s.name.len()).max().unwrap_or(0);
    for script in &config.scripts {
        let summary = script.description.lines().next().unwrap_or_default();
        println!("{}  {}", format!("{:width$}", script.name).bold(), summary);
    }
    Ok(ExitCode::SUCCESS)
}

async fn run(
    project: &Path,
    target: String,
    name: Option<String>,
    timeout: Option<u64>,
    extra_args: Vec<String>,
) -> color_eyre::Result<ExitCode> {
    let mut config = load_config(project).await?;
    if timeout.is_some() {
        config.harness.runner.job_timeout_secs = timeout;
    }

    let (url, display_name, mut args) = if target.contains("://") {
        let display_name = name.unwrap_or_else(|| render::display_name_from_url(&target));
        (target, display_name, Vec::new())
    } else {
        let Some(entry) = config.find_script(&target) else {
            bail!("No script named '{target}'. Run `autobyte list` to see the catalog.");
        };
        (
            entry.url.clone(),
            name.unwrap_or_else(|| entry.name.clone()),
            entry.args.clone(),
        )
    };
    args.extend(extra_args);

    let controller = SessionController::from_config(&config.harness)?;
    if !controller.runner().interpreter_available() {
        tracing::warn!(program = controller.runner().program(), "interpreter not found on PATH");
    }
    controller.subscribe(Arc::new(TracingListener));
    let (_subscription, mut events) = controller.relay().event_stream();

    let job_id = controller.run_script(url, display_name, args).await?;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let (state, exit_code) = loop {
        tokio::select! {
            event = events.next() => match event {
                Some(Event::JobLog { line, .. }) => render::print_line(&line),
                Some(Event::JobFinished { job_id: id, state, exit_code }) if id == job_id => {
                    break (state, exit_code);
                }
                Some(_) => {}
                None => bail!("event stream closed before the job finished"),
            },
            _ = tokio::signal::ctrl_c() => {
                if !controller.stop().await {
                    eprintln!("{} the script can only be stopped while it is running", "note:".yellow());
                }
            }
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(text)) => {
                    if let Err(e) = controller.send_input(&text).await {
                        eprintln!("{} {e}", "input ignored:".yellow());
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    tracing::debug!(error = %e, "stdin closed");
                    stdin_open = false;
                }
            },
        }
    };

    controller.shutdown().await;
    Ok(ExitCode::from(render::exit_status(state, exit_code)))
}
