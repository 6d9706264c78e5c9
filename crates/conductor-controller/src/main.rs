//! conductor-controller - per-job controller process.
//!
//! Launched by the cluster manager once per job attempt. Recovery of any
//! prior attempt's commit outcome happens before anything else; a job whose
//! outcome is already decided makes this process exit abnormally with the
//! forced state recorded, which the hosting launcher must treat as an
//! expected terminal report rather than a crash.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use conductor_controller::{init_and_start, production_collaborators, JobController, LaunchContext};
use conductor_core::config::ControllerConfig;
use conductor_core::identity::{AttemptId, ContainerId};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// conductor per-job controller.
#[derive(Parser, Debug)]
#[command(name = "conductor-controller")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the controller configuration file.
    #[arg(short, long, default_value = "controller.toml")]
    config: PathBuf,

    /// Identity of this attempt, e.g. `attempt_1317529182569_0004_000002`.
    #[arg(long)]
    attempt_id: AttemptId,

    /// Identity of the container this controller runs in.
    #[arg(long)]
    container_id: ContainerId,

    /// Host this controller was placed on.
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Controller RPC port, if assigned.
    #[arg(long)]
    port: Option<u16>,

    /// Controller HTTP status port, if assigned.
    #[arg(long)]
    http_port: Option<u16>,

    /// Job submit time, milliseconds since the epoch.
    #[arg(long, default_value_t = 0)]
    submit_time: u64,

    /// Override the configured maximum attempts.
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Override the configured submitting user.
    #[arg(long)]
    user: Option<String>,

    /// Override the configured staging root.
    #[arg(long)]
    staging_root: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn load_config(args: &Args) -> anyhow::Result<ControllerConfig> {
    let mut config = if args.config.exists() {
        ControllerConfig::from_file(&args.config).context("failed to load configuration")?
    } else {
        ControllerConfig::default()
    };

    // CLI args override the config file.
    if let Some(max_attempts) = args.max_attempts {
        config.max_attempts = max_attempts;
    }
    if let Some(user) = &args.user {
        config.user.clone_from(user);
    }
    if let Some(staging_root) = &args.staging_root {
        config.staging_root.clone_from(staging_root);
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.clone()));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = ?err, "controller failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let config = load_config(&args)?;
    let max_attempts = config.max_attempts;

    let launch = LaunchContext {
        attempt_id: args.attempt_id,
        container_id: args.container_id,
        host: args.host,
        port: args.port,
        http_port: args.http_port,
        submit_time_ms: args.submit_time,
        max_attempts,
    };
    info!(
        attempt = %launch.attempt_id,
        container = %launch.container_id,
        "starting controller attempt"
    );

    let mut controller = JobController::new(launch, config, production_collaborators());

    if let Err(err) = init_and_start(&mut controller).await {
        // Expected whenever a prior attempt already decided the job's
        // outcome; the forced state is the report, the error is the signal.
        match controller.forced_state() {
            Some(forced) => {
                warn!(
                    error = %err,
                    forced_state = %forced,
                    error_shutdown = controller.error_triggered_shutdown(),
                    last_attempt = controller.is_last_attempt(),
                    "startup stopped by recovery"
                );
            }
            None => error!(error = %err, "startup failed before recovery completed"),
        }
        if controller.is_last_attempt() {
            info!("this was the final allowed attempt; no further attempt should be requested");
        }
        return Ok(ExitCode::FAILURE);
    }

    let mut sigterm = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("interrupt received; shutting down"),
        _ = sigterm.recv() => info!("SIGTERM received; shutting down"),
    }

    controller.shutdown().await;
    Ok(ExitCode::SUCCESS)
}
