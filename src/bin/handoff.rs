//! `handoff`: command-line front end for the self-updater.
//!
//! Checks the release feed, stages a newer release with a progress bar and
//! hands the install over to `handoff-swapper`.

use anyhow::Context;
use clap::{Parser, Subcommand};
use handoff::layout::DEFAULT_EXE_NAME;
use handoff::update::{AutoUpdatePreference, ExitProcess, UpdateState, UpdateWorker, WorkerEvent};
use handoff::{Orchestrator, Release, UpdaterConfig};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;

/// Self-updater for applications shipped as an executable plus `_internal`.
#[derive(Parser)]
#[command(name = "handoff", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,

    /// Also write logs to the application logs directory.
    #[arg(long)]
    log_file: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Query the release feed for a newer version.
    Check {
        /// Check even if the last check is recent or updates are disabled.
        #[arg(long)]
        force: bool,
    },

    /// Download, stage and apply an update, then exit.
    Install {
        /// Install this archive URL instead of querying the feed.
        #[arg(long)]
        url: Option<String>,

        /// Version label for `--url`.
        #[arg(long, default_value = "0.0.0", requires = "url")]
        version: String,

        /// Override the install directory.
        #[arg(long)]
        install_dir: Option<PathBuf>,

        /// Stage only; print the staging directory instead of swapping.
        #[arg(long)]
        stage_only: bool,

        /// Install without asking when `auto_update` is `ask`.
        #[arg(short, long)]
        yes: bool,

        /// Ignore the check interval and the `auto_update` preference.
        #[arg(long)]
        force: bool,
    },

    /// Show update state and the outcome of the last swap.
    Status,

    /// Skip a release version until a newer one appears.
    Dismiss {
        /// Version to skip.
        version: String,
    },

    /// Print the effective configuration.
    Config {
        /// Write the defaults to the config file if it does not exist.
        #[arg(long)]
        init: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _guard = handoff::logging::init(&handoff::logging::LogOptions {
        verbose: cli.verbose,
        file_dir: cli.log_file.then(handoff::app_dirs::logs_dir),
    });

    let config = UpdaterConfig::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;

    match cli.command {
        Command::Check { force } => run_check(config, force),
        Command::Install {
            url,
            version,
            install_dir,
            stage_only,
            yes,
            force,
        } => run_install(
            config,
            url.map(|u| Release::from_url(version, u)),
            install_dir,
            InstallFlags {
                stage_only,
                yes,
                force,
            },
        ),
        Command::Status => run_status(config),
        Command::Dismiss { version } => run_dismiss(&version),
        Command::Config { init } => run_config(config, cli.config, init),
    }
}

/// Why a feed query was skipped, if it was.
fn skip_reason(orchestrator: &Orchestrator, force: bool) -> Option<String> {
    let check = &orchestrator.config().check;
    if force {
        None
    } else if check.auto_update == AutoUpdatePreference::Never {
        Some("Automatic updates are disabled (auto_update = \"never\"), pass --force".to_owned())
    } else if !orchestrator.check_is_due() {
        Some(format!(
            "Checked less than {} hours ago, pass --force to check now",
            check.interval_hours
        ))
    } else {
        None
    }
}

fn run_check(config: UpdaterConfig, force: bool) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::new(config);
    if let Some(reason) = skip_reason(&orchestrator, force) {
        println!("{reason}");
        return Ok(());
    }
    match orchestrator.check_if_due(force) {
        Ok(Some(release)) => {
            println!(
                "Update available: {} -> {}",
                orchestrator.config().app.version,
                release.version
            );
            if !release.notes.is_empty() {
                println!("\n{}", release.notes);
            }
        }
        Ok(None) => println!("{} is up to date", orchestrator.config().app.version),
        Err(e) => {
            tracing::warn!(error = %e, "update check failed");
            println!("Could not check for updates: {e}");
        }
    }
    Ok(())
}

struct InstallFlags {
    stage_only: bool,
    yes: bool,
    force: bool,
}

fn run_install(
    config: UpdaterConfig,
    release: Option<Release>,
    install_dir: Option<PathBuf>,
    flags: InstallFlags,
) -> anyhow::Result<()> {
    let install_dir = match install_dir {
        Some(dir) => dir,
        None => config.install_dir()?,
    };
    let clean_stale = config.staging.clean_stale_on_start;
    let orchestrator = Arc::new(Orchestrator::new(config));

    if clean_stale {
        match orchestrator.cleanup_stale_stages() {
            Ok(0) => {}
            Ok(n) => tracing::info!(removed = n, "cleaned stale staging entries"),
            Err(e) => tracing::warn!(error = %e, "cannot clean staging root"),
        }
    }

    // An explicit --url is the user's choice and bypasses the check policy.
    let release = match release {
        Some(release) => release,
        None => {
            if let Some(reason) = skip_reason(&orchestrator, flags.force) {
                println!("{reason}");
                return Ok(());
            }
            let Some(release) = orchestrator.check_if_due(flags.force)? else {
                println!("{} is up to date", orchestrator.config().app.version);
                return Ok(());
            };
            let preference = orchestrator.config().check.auto_update;
            if !flags.force && !preference.permits_install(flags.yes) {
                println!(
                    "Update available: {} -> {}, run `handoff install --yes` to install it",
                    orchestrator.config().app.version,
                    release.version
                );
                return Ok(());
            }
            release
        }
    };

    println!("Installing {} into {}", release.version, install_dir.display());
    let worker = UpdateWorker::spawn(Arc::clone(&orchestrator), release, install_dir.clone());

    let pb = ProgressBar::new(100);
    if let Ok(style) = ProgressStyle::with_template("  {msg} [{bar:30}] {pos:>3}%") {
        pb.set_style(style);
    }
    pb.set_message("staging");

    let mut outcome = None;
    for event in worker.events().iter() {
        match event {
            WorkerEvent::Progress(value) => pb.set_position(u64::from(value)),
            WorkerEvent::Finished(result) => {
                outcome = Some(result);
                break;
            }
        }
    }
    pb.finish_and_clear();

    let staged = match outcome {
        Some(result) => result?,
        None => anyhow::bail!("update worker stopped without reporting"),
    };

    if flags.stage_only {
        println!("Staged {} at {}", staged.version, staged.stage_dir.display());
        return Ok(());
    }

    println!("Restarting to finish the update...");
    orchestrator
        .start_swap_and_exit(&install_dir, &staged.stage_dir, DEFAULT_EXE_NAME, &ExitProcess)
        .context("failed to start the swapper")?;
    Ok(())
}

fn run_status(config: UpdaterConfig) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::new(config);
    let state = UpdateState::load_from(orchestrator.state_path());

    println!("Version:        {}", orchestrator.config().app.version);
    println!("Auto-update:    {}", orchestrator.config().check.auto_update);
    match state.last_check {
        Some(at) => println!("Last check:     {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Last check:     never"),
    }
    if let Some(version) = &state.dismissed_release {
        println!("Dismissed:      {version}");
    }
    println!("Staging root:   {}", orchestrator.staging_root().display());

    if let Some(stage) = &state.last_handoff_stage {
        if stage.exists() {
            let log = orchestrator.layout().log_in(stage);
            println!("Last swap:      did not complete, see {}", log.display());
            if let Ok(text) = std::fs::read_to_string(&log) {
                for line in text.lines().rev().take(5).collect::<Vec<_>>().into_iter().rev() {
                    println!("  {line}");
                }
            }
        } else {
            println!("Last swap:      completed");
        }
    }
    Ok(())
}

fn run_dismiss(version: &str) -> anyhow::Result<()> {
    let path = UpdateState::state_file_path();
    let mut state = UpdateState::load_from(&path);
    state.dismissed_release = Some(version.to_owned());
    state.save_to(&path)?;
    println!("Dismissed {version}");
    Ok(())
}

fn run_config(config: UpdaterConfig, path: Option<PathBuf>, init: bool) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(UpdaterConfig::default_config_path);
    if init && !path.exists() {
        config.save_to_file(&path)?;
        println!("Wrote {}", path.display());
    }
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
