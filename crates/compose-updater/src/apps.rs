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

//! Access to the apps directory: app listing, compose files and descriptors

use crate::compose::{ComposeDocument, Service};
use crate::config::UpdaterConfig;
use crate::error::{Result, UpdaterError};
use serde::Deserialize;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const DEFAULT_PORT: &str = "80";
pub const DEFAULT_PATH: &str = "/";

/// Where an app answers its health probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppEndpoint {
    pub port: String,
    pub path: String,
}

impl Default for AppEndpoint {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_owned(),
            path: DEFAULT_PATH.to_owned(),
        }
    }
}

impl AppEndpoint {
    pub fn url(&self) -> String {
        format!("http://localhost:{}{}", self.port, self.path)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u64),
    Text(String),
}

/// Contents of an app descriptor file
#[derive(Debug, Default, Deserialize)]
struct AppDescriptor {
    #[serde(default)]
    port: Option<PortValue>,
    #[serde(default)]
    path: Option<String>,
}

impl AppDescriptor {
    fn into_endpoint(self) -> AppEndpoint {
        let mut endpoint = AppEndpoint::default();
        match self.port {
            Some(PortValue::Number(port)) => endpoint.port = port.to_string(),
            Some(PortValue::Text(port)) if !port.trim().is_empty() => {
                endpoint.port = port.trim().to_owned();
            }
            _ => {}
        }
        if let Some(path) = self.path.filter(|p| !p.is_empty()) {
            endpoint.path = if path.starts_with('/') {
                path
            } else {
                format!("/{path}")
            };
        }
        endpoint
    }
}

/// Filesystem and compose file accessor for the apps of a fleet
pub trait AppStore: Send + Sync {
    /// App names, sorted
    fn list_apps(&self) -> Result<Vec<String>>;

    fn app_dir(&self, app: &str) -> PathBuf;

    fn read_compose(&self, app: &str) -> Result<Vec<u8>>;

    /// Replace the compose file content of an app. On error the previous
    /// content must still be in place.
    fn write_compose(&self, app: &str, data: &[u8]) -> std::io::Result<()>;

    /// Port and path from the app descriptor, defaulting to 80 and "/"
    fn endpoint(&self, app: &str) -> Result<AppEndpoint>;

    fn services(&self, app: &str) -> Result<Vec<Service>> {
        let data = self.read_compose(app)?;
        ComposeDocument::from_slice(&data)?.services()
    }
}

/// Apps stored as sub-directories of a root directory
#[derive(Debug, Clone)]
pub struct AppsDirectory {
    root: PathBuf,
    compose_file_name: String,
    descriptor_file_name: String,
}

impl AppsDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let defaults = UpdaterConfig::default();
        Self {
            root: root.into(),
            compose_file_name: defaults.compose_file_name,
            descriptor_file_name: defaults.descriptor_file_name,
        }
    }

    pub fn from_config(config: &UpdaterConfig) -> Self {
        Self {
            root: config.apps_dir.clone(),
            compose_file_name: config.compose_file_name.clone(),
            descriptor_file_name: config.descriptor_file_name.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn existing_app_dir(&self, app: &str) -> Result<PathBuf> {
        if !is_valid_app_name(app) {
            return Err(UpdaterError::InvalidAppName(app.to_owned()));
        }
        let dir = self.app_dir(app);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(UpdaterError::AppNotFound(app.to_owned()))
        }
    }
}

/// A single path component naming a directory below the apps root
fn is_valid_app_name(app: &str) -> bool {
    !app.is_empty() && app != "." && app != ".." && !app.contains(['/', '\\'])
}

impl AppStore for AppsDirectory {
    fn list_apps(&self) -> Result<Vec<String>> {
        let mut apps = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                apps.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        apps.sort();
        Ok(apps)
    }

    fn app_dir(&self, app: &str) -> PathBuf {
        self.root.join(app)
    }

    fn read_compose(&self, app: &str) -> Result<Vec<u8>> {
        let path = self.existing_app_dir(app)?.join(&self.compose_file_name);
        fs::read(&path).map_err(|e| {
            tracing::error!("Failed to read {}: {e}", path.display());
            UpdaterError::Io(e)
        })
    }

    fn write_compose(&self, app: &str, data: &[u8]) -> std::io::Result<()> {
        if !is_valid_app_name(app) {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid app name: {app}"),
            ));
        }
        let dir = self.app_dir(app);
        let path = dir.join(&self.compose_file_name);

        // Atomic write, keeping the mode of the replaced file
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(data)?;
        if let Ok(metadata) = fs::metadata(&path) {
            tmp.as_file().set_permissions(metadata.permissions())?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }

    fn endpoint(&self, app: &str) -> Result<AppEndpoint> {
        let path = self.existing_app_dir(app)?.join(&self.descriptor_file_name);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(
                    "{} not found for {app}, using default port and path",
                    self.descriptor_file_name
                );
                return Ok(AppEndpoint::default());
            }
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(AppEndpoint::default());
        }
        let descriptor: AppDescriptor = serde_yaml::from_str(&content)?;
        Ok(descriptor.into_endpoint())
    }
}
