// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Compose Updater - Entry point for the updater binary

use anyhow::Context;
use clap::{Parser, Subcommand};
use compose_updater::registry::DockerHubClient;
use compose_updater::report::{render_health_report, render_update_report};
use compose_updater::runner::ProcessRunner;
use compose_updater::waiter::PollingWaiter;
use compose_updater::{
    AppStore, AppUpdateFetcher, AppsDirectory, HealthChecker, Updater, UpdaterConfig, load_config,
};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "compose-updater")]
#[command(about = "Health checks and image tag updates for docker compose apps")]
#[command(
    long_about = "Keeps a directory of docker compose apps on their newest image tags.\n\
    \nEvery sub-directory of the apps directory is one app with its own compose file.\n\
    Updates are kept only when the restarted app passes its health check.\n\
    \nExamples:\n  \
    compose-updater healthcheck              # Check every app\n  \
    compose-updater update gitea             # Update a single app\n  \
    compose-updater -p /srv/apps update      # Update every app under /srv/apps"
)]
struct Cli {
    /// JSON config file, defaults are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Apps directory, overrides the config file
    #[arg(short = 'p', long, global = true)]
    apps_dir: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start every selected app and probe its endpoint
    Healthcheck {
        /// Apps to check, all apps when empty
        apps: Vec<String>,
    },

    /// Move the selected apps to their newest image tags, rolling back on failed health checks
    Update {
        /// Apps to update, all apps when empty
        apps: Vec<String>,
    },
}

fn resolve_config(cli: &Cli) -> anyhow::Result<UpdaterConfig> {
    let mut config = load_config(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(apps_dir) = &cli.apps_dir {
        config.apps_dir.clone_from(apps_dir);
    }
    Ok(config)
}

fn build_updater(config: &UpdaterConfig) -> anyhow::Result<Updater> {
    let store: Arc<dyn AppStore> = Arc::new(AppsDirectory::from_config(config));
    let registry =
        Arc::new(DockerHubClient::from_config(config).context("Failed to create registry client")?);
    let waiter =
        Arc::new(PollingWaiter::from_config(config).context("Failed to create readiness waiter")?);
    let health = Arc::new(HealthChecker::new(
        store.clone(),
        Arc::new(ProcessRunner),
        waiter,
        config,
    ));
    let fetcher = AppUpdateFetcher::new(store.clone(), registry);
    Ok(Updater::new(store, fetcher, health))
}

fn print_report<T: Serialize>(
    report: &T,
    json: bool,
    render: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", render(report));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to stderr, reports to stdout
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("compose_updater=info".parse()?),
        )
        .init();

    let config = resolve_config(&cli)?;
    info!("Using apps directory {}", config.apps_dir.display());
    let updater = build_updater(&config)?;

    let success = match &cli.command {
        Command::Healthcheck { apps } => {
            let report = updater
                .perform_health_check(apps)
                .await
                .context("Health check run failed")?;
            print_report(&report, cli.json, render_health_report)?;
            report.all_apps_healthy
        }
        Command::Update { apps } => {
            let report = updater
                .perform_update(apps)
                .await
                .context("Update run failed")?;
            print_report(&report, cli.json, render_update_report)?;
            report.was_successful
        }
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
