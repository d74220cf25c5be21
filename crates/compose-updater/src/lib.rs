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

//! Compose Updater - keeps a fleet of docker compose apps on their newest
//! image tags
//!
//! Each app lives in its own directory with a compose file. Updates are only
//! kept when the restarted app passes a health check; otherwise the original
//! compose file is restored.

pub mod apps;
pub mod compose;
pub mod config;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod health;
pub mod registry;
pub mod report;
pub mod runner;
pub mod tag_selector;
pub mod updater;
pub mod version;
pub mod waiter;

pub use apps::{AppStore, AppsDirectory};
pub use config::{UpdaterConfig, load_config};
pub use error::UpdaterError;
pub use fetcher::AppUpdateFetcher;
pub use health::{HealthCheck, HealthChecker};
pub use tag_selector::select_latest;
pub use updater::Updater;
pub use version::is_newer;
