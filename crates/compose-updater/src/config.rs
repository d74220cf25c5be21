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

//! Configuration module for the updater

use crate::error::{Result, UpdaterError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_apps_dir() -> PathBuf {
    PathBuf::from("apps/production")
}

fn default_compose_file_name() -> String {
    "docker-compose.yml".to_owned()
}

fn default_descriptor_file_name() -> String {
    "app.yml".to_owned()
}

fn default_compose_command() -> String {
    "docker compose".to_owned()
}

fn default_registry_base_url() -> String {
    "https://registry.hub.docker.com".to_owned()
}

fn default_100() -> u32 {
    100
}

fn default_10() -> u32 {
    10
}

fn default_120() -> u64 {
    120
}

fn default_1000() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdaterConfig {
    /// Directory holding one sub-directory per app
    #[serde(default = "default_apps_dir")]
    pub apps_dir: PathBuf,

    /// Compose file name inside each app directory
    #[serde(default = "default_compose_file_name")]
    pub compose_file_name: String,

    /// Optional app descriptor (port/path) inside each app directory
    #[serde(default = "default_descriptor_file_name")]
    pub descriptor_file_name: String,

    /// Command used to drive compose stacks, e.g. "docker compose" or "podman-compose"
    #[serde(default = "default_compose_command")]
    pub compose_command: String,

    /// Docker Hub compatible registry API
    #[serde(default = "default_registry_base_url")]
    pub registry_base_url: String,

    /// Tags requested per registry page
    #[serde(default = "default_100")]
    pub registry_page_size: u32,

    /// Upper bound on registry pages followed per image
    #[serde(default = "default_10")]
    pub registry_max_pages: u32,

    /// How long to wait for the app port to accept connections
    #[serde(default = "default_120")]
    pub port_timeout_secs: u64,

    /// How long to wait for the app endpoint to answer without a 5xx
    #[serde(default = "default_120")]
    pub http_timeout_secs: u64,

    /// Delay between readiness attempts
    #[serde(default = "default_1000")]
    pub poll_interval_millis: u64,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            apps_dir: default_apps_dir(),
            compose_file_name: default_compose_file_name(),
            descriptor_file_name: default_descriptor_file_name(),
            compose_command: default_compose_command(),
            registry_base_url: default_registry_base_url(),
            registry_page_size: 100,
            registry_max_pages: 10,
            port_timeout_secs: 120,
            http_timeout_secs: 120,
            poll_interval_millis: 1000,
        }
    }
}

impl UpdaterConfig {
    pub fn port_timeout(&self) -> Duration {
        Duration::from_secs(self.port_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_millis)
    }
}

/// Load the config from a JSON file, or use defaults when no file is given
pub fn load_config(path: Option<&Path>) -> Result<UpdaterConfig> {
    let Some(path) = path else {
        return Ok(UpdaterConfig::default());
    };
    let content = std::fs::read_to_string(path).map_err(|e| {
        UpdaterError::Config(format!("Failed to read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&content)
        .map_err(|e| UpdaterError::Config(format!("Failed to parse config: {e}")))
}
