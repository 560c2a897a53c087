//! edge-deploy - Supabase Edge Functions deployment tool
//!
//! Runs up to three sequential steps over one shared function manifest:
//! - package: assemble the local deployment directory (pure file I/O)
//! - register: upsert function metadata into the hosted database (best-effort)
//! - probe: POST smoke-test payloads to the deployed endpoints (best-effort)
//!
//! A failing step never aborts the later steps, but the process exit code
//! is non-zero if any step failed.

mod config;
mod manifest;
mod packager;
mod prober;
mod registrar;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Settings;
use crate::manifest::{default_manifest, FunctionSpec};

#[derive(Debug, Parser)]
#[command(name = "edge-deploy", about = "Package, register and smoke-test Supabase Edge Functions")]
struct Cli {
    /// Project root containing supabase/functions/
    #[arg(long)]
    project_root: Option<PathBuf>,

    /// Where to write the deployment package (default: <root>/supabase-deployment)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Path of a .env file to load before reading configuration
    #[arg(long)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Assemble the local deployment package only
    Package,
    /// Register function metadata in the hosted database only
    Register,
    /// Smoke-test the deployed functions only
    Probe,
    /// Run all three steps in order (the default)
    All,
}

/// One step's outcome, for the final summary and the exit code
#[derive(Debug)]
struct StepOutcome {
    step: &'static str,
    ok: bool,
}

/// Run the packaging step; an incomplete package counts as a failed step.
fn package_step(settings: &Settings, functions: &[FunctionSpec]) -> StepOutcome {
    tracing::info!("Creating deployment package...");
    let ok = match packager::package(settings, functions) {
        Ok(report) => {
            if !report.is_complete() {
                tracing::warn!("Package incomplete, missing sources: {:?}", report.skipped);
            }
            report.is_complete()
        }
        Err(err) => {
            tracing::error!("Packaging failed: {:#}", err);
            false
        }
    };
    StepOutcome { step: "package", ok }
}

/// Run the registration step; registration is advisory, so an error is
/// logged and folded into the outcome rather than propagated.
async fn register_step(settings: &Settings, functions: &[FunctionSpec]) -> StepOutcome {
    tracing::info!("Registering functions in database...");
    let ok = match registrar::register(settings, functions).await {
        Ok(count) => {
            tracing::info!("Registered {} functions", count);
            true
        }
        Err(err) => {
            tracing::warn!("Registration failed: {:#}", err);
            false
        }
    };
    StepOutcome { step: "register", ok }
}

/// Run the smoke-test step; the step passes only if every function
/// answered 200.
async fn probe_step(settings: &Settings, functions: &[FunctionSpec]) -> StepOutcome {
    tracing::info!("Testing deployed functions...");
    let ok = match prober::probe_all(
        &settings.functions_base_url(),
        &settings.anon_key,
        functions,
    )
    .await
    {
        Ok(results) => results.iter().all(|r| r.passed()),
        Err(err) => {
            tracing::error!("Probing failed: {:#}", err);
            false
        }
    };
    StepOutcome { step: "probe", ok }
}

/// Run the steps selected by `command`; every selected step runs even if
/// an earlier one failed.
async fn run_pipeline(
    command: Command,
    settings: &Settings,
    functions: &[FunctionSpec],
) -> Vec<StepOutcome> {
    let mut outcomes = Vec::new();

    if matches!(command, Command::Package | Command::All) {
        outcomes.push(package_step(settings, functions));
    }
    if matches!(command, Command::Register | Command::All) {
        outcomes.push(register_step(settings, functions).await);
    }
    if matches!(command, Command::Probe | Command::All) {
        outcomes.push(probe_step(settings, functions).await);
    }

    outcomes
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,edge_deploy=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.env_file {
        Some(ref path) => {
            if let Err(err) = dotenvy::from_path(path) {
                tracing::error!("Failed to load env file {:?}: {}", path, err);
                return ExitCode::FAILURE;
            }
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }

    let settings = match Settings::from_env(cli.project_root, cli.output_dir) {
        Ok(settings) => settings,
        Err(err) => {
            tracing::error!("Configuration error: {:#}", err);
            return ExitCode::FAILURE;
        }
    };

    let command = cli.command.unwrap_or(Command::All);
    let functions = default_manifest();
    let outcomes = run_pipeline(command, &settings, &functions).await;

    let mut failed = false;
    for outcome in &outcomes {
        if outcome.ok {
            tracing::info!("{}: ok", outcome.step);
        } else {
            tracing::warn!("{}: failed", outcome.step);
            failed = true;
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        tracing::info!("Deployment process completed");
        ExitCode::SUCCESS
    }
}
