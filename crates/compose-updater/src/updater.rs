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

//! Update orchestration: fetch, patch, verify and roll back per app, and the
//! sequential fleet loops on top of it.

use crate::apps::AppStore;
use crate::compose::update_compose_tags;
use crate::error::{Result, UpdaterError};
use crate::events::{UpdateEvent, report_event};
use crate::fetcher::AppUpdateFetcher;
use crate::health::HealthCheck;
use crate::report::{AppUpdateReport, HealthCheckReport, UpdateReport};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

pub struct Updater {
    store: Arc<dyn AppStore>,
    fetcher: AppUpdateFetcher,
    health: Arc<dyn HealthCheck>,
}

impl std::fmt::Debug for Updater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Updater")
            .field("fetcher", &self.fetcher)
            .finish_non_exhaustive()
    }
}

impl Updater {
    pub fn new(
        store: Arc<dyn AppStore>,
        fetcher: AppUpdateFetcher,
        health: Arc<dyn HealthCheck>,
    ) -> Self {
        Self {
            store,
            fetcher,
            health,
        }
    }

    /// Write the original compose bytes back. Failure leaves the app in an
    /// unknown state and is unrecoverable.
    fn restore(&self, app: &str, original: &[u8]) -> Result<()> {
        self.store.write_compose(app, original).map_err(|source| {
            error!("Failed to restore compose file of {app}: {source}");
            UpdaterError::Rollback {
                app: app.to_owned(),
                source,
            }
        })
    }

    /// Run one update cycle for `app`.
    ///
    /// Per-app failures end up in the returned report. Only a failed rollback
    /// of an applied compose change is returned as an error.
    pub async fn update_app(&self, app: &str) -> Result<AppUpdateReport> {
        info!("Checking {app} for updates");

        let original = match self.store.read_compose(app) {
            Ok(data) => data,
            Err(e) => {
                return Ok(AppUpdateReport::failed(app, "Failed to read compose file", e));
            }
        };

        let app_update = match self.fetcher.fetch(app).await {
            Ok(update) => update,
            Err(e) => {
                warn!("Failed to fetch updates of {app}: {e}");
                return Ok(AppUpdateReport::fetch_failed(app, e));
            }
        };

        if !app_update.was_update_found {
            info!("No update available for {app}");
            return Ok(AppUpdateReport::no_update(app));
        }

        report_event(&UpdateEvent::UpdateFound {
            app: app.to_owned(),
            updates: app_update.service_updates.clone(),
        });
        let started = Instant::now();

        // A failed write leaves the original in place, nothing to restore
        let patched = update_compose_tags(&original, &app_update.service_updates)
            .and_then(|data| self.store.write_compose(app, &data).map_err(UpdaterError::from));
        if let Err(e) = patched {
            warn!("Failed to apply update of {app}: {e}");
            return Ok(AppUpdateReport::not_applied(
                app,
                app_update,
                "Failed to apply update to compose file",
                e,
            ));
        }

        let health = self.health.check_app(app).await;
        if health.healthy {
            info!("Update of {app} verified");
            report_event(&UpdateEvent::UpdateApplied {
                app: app.to_owned(),
                updates: app_update.service_updates.clone(),
                duration_secs: started.elapsed().as_secs(),
            });
            return Ok(AppUpdateReport::applied(app_update, health));
        }

        warn!("Rolling back {app}: {}", health.error_message);
        self.restore(app, &original)?;
        report_event(&UpdateEvent::UpdateRolledBack {
            app: app.to_owned(),
            reason: health.error_message.clone(),
        });
        Ok(AppUpdateReport::rolled_back(app_update, health))
    }

    fn select_apps(&self, apps: &[String]) -> Result<Vec<String>> {
        if apps.is_empty() {
            self.store.list_apps()
        } else {
            Ok(apps.to_vec())
        }
    }

    /// Update the given apps, or every app when `apps` is empty, one at a time
    pub async fn perform_update(&self, apps: &[String]) -> Result<UpdateReport> {
        let apps = self.select_apps(apps)?;
        info!("Updating {} app(s)", apps.len());

        let mut report = UpdateReport::new();
        for app in &apps {
            report.push(self.update_app(app).await?);
        }
        Ok(report)
    }

    /// Health check the given apps, or every app when `apps` is empty
    pub async fn perform_health_check(&self, apps: &[String]) -> Result<HealthCheckReport> {
        let apps = self.select_apps(apps)?;
        info!("Health checking {} app(s)", apps.len());

        let mut report = HealthCheckReport::new();
        for app in &apps {
            let app_report = self.health.check_app(app).await;
            if !app_report.healthy {
                report_event(&UpdateEvent::HealthCheckFailed {
                    app: app.clone(),
                    error: app_report.error_message.clone(),
                });
            }
            report.push(app_report);
        }
        Ok(report)
    }
}
