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

//! Structured update lifecycle events

use crate::report::ServiceUpdate;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub enum UpdateEvent {
    UpdateFound {
        app: String,
        updates: Vec<ServiceUpdate>,
    },
    UpdateApplied {
        app: String,
        updates: Vec<ServiceUpdate>,
        duration_secs: u64,
    },
    UpdateRolledBack {
        app: String,
        reason: String,
    },
    HealthCheckFailed {
        app: String,
        error: String,
    },
}

/// Emit an event as a JSON log line.
///
/// Never fails: an event that cannot be serialized is logged as a warning
/// and the update flow carries on.
pub fn report_event(event: &UpdateEvent) {
    match serde_json::to_string(event) {
        Ok(json) => tracing::info!("Update event: {json}"),
        Err(e) => tracing::warn!("Failed to serialize update event {event:?}: {e}"),
    }
}
