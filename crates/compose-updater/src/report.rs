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

//! Update and health check report types and their text rendering

use serde::Serialize;
use std::fmt::Write as _;

/// A proposed or applied tag change for one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceUpdate {
    pub service_name: String,
    pub old_tag: String,
    pub new_tag: String,
}

/// Fetcher verdict for one app
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppUpdate {
    pub was_update_found: bool,
    pub service_updates: Vec<ServiceUpdate>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error_message: String,
}

impl AppUpdate {
    /// The terminal "nothing to do" verdict
    pub fn none() -> Self {
        Self::default()
    }

    pub fn found(service_updates: Vec<ServiceUpdate>) -> Self {
        Self {
            was_update_found: true,
            service_updates,
            error_message: String::new(),
        }
    }

    /// Looking for updates failed, no update is known
    pub fn failed(cause: impl std::fmt::Display) -> Self {
        Self {
            error_message: cause.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppHealthReport {
    pub app_name: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error_message: String,
}

impl AppHealthReport {
    pub fn healthy(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            healthy: true,
            error_message: String::new(),
        }
    }

    /// Failed report with a "<context>: <cause>" message
    pub fn failed(app_name: impl Into<String>, context: &str, cause: impl std::fmt::Display) -> Self {
        Self {
            app_name: app_name.into(),
            healthy: false,
            error_message: format!("{context}: {cause}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthCheckReport {
    pub all_apps_healthy: bool,
    pub app_health_reports: Vec<AppHealthReport>,
}

impl HealthCheckReport {
    pub fn new() -> Self {
        Self {
            all_apps_healthy: true,
            app_health_reports: Vec::new(),
        }
    }

    pub fn push(&mut self, report: AppHealthReport) {
        self.all_apps_healthy &= report.healthy;
        self.app_health_reports.push(report);
    }
}

/// Terminal result of one app's update cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppUpdateReport {
    pub app_name: String,
    pub was_successful: bool,
    pub was_update_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_updates: Option<AppUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_health_report: Option<AppHealthReport>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub update_error_message: String,
}

impl AppUpdateReport {
    pub fn no_update(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            was_successful: true,
            was_update_available: false,
            app_updates: None,
            app_health_report: None,
            update_error_message: String::new(),
        }
    }

    /// The update could not be applied, nothing was verified
    pub fn failed(app_name: impl Into<String>, context: &str, cause: impl std::fmt::Display) -> Self {
        Self {
            app_name: app_name.into(),
            was_successful: false,
            was_update_available: false,
            app_updates: None,
            app_health_report: None,
            update_error_message: format!("{context}: {cause}"),
        }
    }

    /// Looking for updates failed, the compose file was never touched
    pub fn fetch_failed(app_name: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        let app_update = AppUpdate::failed(cause);
        Self {
            app_name: app_name.into(),
            was_successful: false,
            was_update_available: false,
            update_error_message: format!("Failed to update app: {}", app_update.error_message),
            app_updates: Some(app_update),
            app_health_report: None,
        }
    }

    /// An update was found but writing it to the compose file failed
    pub fn not_applied(
        app_name: impl Into<String>,
        app_update: AppUpdate,
        context: &str,
        cause: impl std::fmt::Display,
    ) -> Self {
        Self {
            was_update_available: true,
            app_updates: Some(app_update),
            ..Self::failed(app_name, context, cause)
        }
    }

    /// The update was applied and verified
    pub fn applied(app_update: AppUpdate, health: AppHealthReport) -> Self {
        Self {
            app_name: health.app_name.clone(),
            was_successful: true,
            was_update_available: true,
            app_updates: Some(app_update),
            app_health_report: Some(health),
            update_error_message: String::new(),
        }
    }

    /// The update was applied, the health check rejected it and the compose
    /// file was rolled back
    pub fn rolled_back(app_update: AppUpdate, health: AppHealthReport) -> Self {
        Self {
            app_name: health.app_name.clone(),
            was_successful: false,
            was_update_available: true,
            update_error_message: health.error_message.clone(),
            app_updates: Some(app_update),
            app_health_report: Some(health),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    pub was_successful: bool,
    pub app_update_reports: Vec<AppUpdateReport>,
}

impl UpdateReport {
    pub fn new() -> Self {
        Self {
            was_successful: true,
            app_update_reports: Vec::new(),
        }
    }

    pub fn push(&mut self, report: AppUpdateReport) {
        self.was_successful &= report.was_successful;
        self.app_update_reports.push(report);
    }
}

pub fn render_health_report(report: &HealthCheckReport) -> String {
    let mut out = String::from("\nHealth Check Report:\n\n");
    for app in &report.app_health_reports {
        if app.healthy {
            let _ = writeln!(out, "- {}: OK", app.app_name);
        } else {
            let _ = writeln!(out, "- {}: {}", app.app_name, app.error_message);
        }
    }
    if report.all_apps_healthy {
        out.push_str("\nSummary: All apps are healthy\n");
    } else {
        out.push_str("\nSummary: Some apps are unhealthy\n");
    }
    out
}

pub fn render_update_report(report: &UpdateReport) -> String {
    let mut out = String::from("\nUpdate Report:\n\n");
    for app in &report.app_update_reports {
        render_app_update(app, &mut out);
    }
    if report.was_successful {
        out.push_str("\nSummary: Update successful\n");
    } else {
        out.push_str("\nSummary: Update failed\n");
    }
    out
}

fn render_app_update(app: &AppUpdateReport, out: &mut String) {
    if !app.was_successful {
        let message = match &app.app_health_report {
            Some(health) if !health.healthy => &health.error_message,
            _ => &app.update_error_message,
        };
        let _ = writeln!(out, "- {}: update failed - {message}", app.app_name);
        // The attempted changes, when one was found
        render_service_updates(app, out);
    } else if !app.was_update_available {
        let _ = writeln!(out, "- {}: no update available", app.app_name);
    } else {
        let _ = writeln!(out, "- {}: update worked", app.app_name);
        render_service_updates(app, out);
    }
}

fn render_service_updates(app: &AppUpdateReport, out: &mut String) {
    let Some(updates) = &app.app_updates else {
        return;
    };
    for update in &updates.service_updates {
        let _ = writeln!(
            out,
            "  - {}: {} -> {}",
            update.service_name, update.old_tag, update.new_tag
        );
    }
}
