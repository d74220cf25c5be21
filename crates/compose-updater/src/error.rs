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

//! Error types for the updater crate

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpdaterError {
    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("version parse error: {0}")]
    VersionParse(String),

    #[error("scheme mismatch: {current} vs {candidate}")]
    SchemeMismatch { current: String, candidate: String },

    #[error("{0}")]
    Compose(String),

    #[error("registry error: {0}")]
    Registry(String),

    #[error("process error: {0}")]
    Process(String),

    #[error("{target} not ready after {timeout_secs}s")]
    ReadinessTimeout { target: String, timeout_secs: u64 },

    /// Failure while looking for updates of an app, with the step that failed
    #[error("{context}: {source}")]
    Fetch {
        context: String,
        #[source]
        source: Box<UpdaterError>,
    },

    #[error("app not found: {0}")]
    AppNotFound(String),

    #[error("invalid app name: {0:?}")]
    InvalidAppName(String),

    /// The compose file of an app could not be restored. Its on-disk state
    /// is unknown, so the whole run must stop.
    #[error("rollback of {app} failed, compose file state is unknown: {source}")]
    Rollback {
        app: String,
        #[source]
        source: std::io::Error,
    },
}

impl UpdaterError {
    pub fn fetch(context: impl Into<String>, source: UpdaterError) -> Self {
        Self::Fetch {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Only a failed rollback is fatal to a fleet run.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::Rollback { .. })
    }
}

pub type Result<T> = std::result::Result<T, UpdaterError>;
