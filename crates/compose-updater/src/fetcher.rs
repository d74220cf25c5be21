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

//! Looks up newer image tags for the services of one app

use crate::apps::AppStore;
use crate::error::{Result, UpdaterError};
use crate::registry::RegistryClient;
use crate::report::{AppUpdate, ServiceUpdate};
use crate::tag_selector::select_latest;
use std::sync::Arc;
use tracing::{debug, info};

pub struct AppUpdateFetcher {
    store: Arc<dyn AppStore>,
    registry: Arc<dyn RegistryClient>,
}

impl std::fmt::Debug for AppUpdateFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppUpdateFetcher").finish_non_exhaustive()
    }
}

impl AppUpdateFetcher {
    pub fn new(store: Arc<dyn AppStore>, registry: Arc<dyn RegistryClient>) -> Self {
        Self { store, registry }
    }

    /// Collect the newest compatible tag of every service of `app`.
    ///
    /// An update is only reported when the service named like the app is
    /// among the updated ones; newer tags of auxiliary services alone are
    /// dropped.
    pub async fn fetch(&self, app: &str) -> Result<AppUpdate> {
        let services = self
            .store
            .services(app)
            .map_err(|e| UpdaterError::fetch("Failed to get images of app", e))?;

        let mut updates = Vec::new();
        for service in services {
            if service.tag.is_empty() {
                debug!("Service {} of {app} has no tag, skipping", service.name);
                continue;
            }

            let tags = self.registry.list_image_tags(&service.image).await.map_err(|e| {
                UpdaterError::fetch(format!("Failed to get tags for service {}", service.name), e)
            })?;
            let latest = select_latest(&service.tag, &tags).map_err(|e| {
                UpdaterError::fetch(
                    format!("Failed to select latest tag for service {}", service.name),
                    e,
                )
            })?;

            match latest {
                Some(new_tag) => {
                    info!("{app}/{}: {} -> {new_tag}", service.name, service.tag);
                    updates.push(ServiceUpdate {
                        service_name: service.name,
                        old_tag: service.tag,
                        new_tag,
                    });
                }
                None => debug!("No newer tag found for service {} of {app}", service.name),
            }
        }

        if updates.is_empty() {
            return Ok(AppUpdate::none());
        }
        if !updates.iter().any(|u| u.service_name == app) {
            info!(
                "Ignoring {} auxiliary update(s) of {app}, main service {app} is up to date",
                updates.len()
            );
            return Ok(AppUpdate::none());
        }
        Ok(AppUpdate::found(updates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::AppsDirectory;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeRegistry {
        tags: HashMap<String, Vec<String>>,
    }

    impl FakeRegistry {
        fn with(mut self, repository: &str, tags: &[&str]) -> Self {
            self.tags.insert(
                repository.to_owned(),
                tags.iter().map(|t| (*t).to_owned()).collect(),
            );
            self
        }
    }

    #[async_trait]
    impl RegistryClient for FakeRegistry {
        async fn list_image_tags(&self, repository: &str) -> Result<Vec<String>> {
            self.tags
                .get(repository)
                .cloned()
                .ok_or_else(|| UpdaterError::Registry(format!("unknown repository {repository}")))
        }
    }

    fn fetcher(compose: &str, registry: FakeRegistry) -> (TempDir, AppUpdateFetcher) {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("gitea");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("docker-compose.yml"), compose).unwrap();
        let fetcher = AppUpdateFetcher::new(
            Arc::new(AppsDirectory::new(temp.path())),
            Arc::new(registry),
        );
        (temp, fetcher)
    }

    const COMPOSE: &str = "\
services:
  gitea:
    image: gitea/gitea:1.21.0
  db:
    image: postgres:16.1
";

    fn update(service: &str, old: &str, new: &str) -> ServiceUpdate {
        ServiceUpdate {
            service_name: service.to_owned(),
            old_tag: old.to_owned(),
            new_tag: new.to_owned(),
        }
    }

    #[tokio::test]
    async fn test_main_and_auxiliary_updates() {
        let registry = FakeRegistry::default()
            .with("gitea/gitea", &["1.20.5", "1.21.0", "1.21.3", "1.22", "latest"])
            .with("postgres", &["16.1", "16.2", "16.2-alpine", "17"]);
        let (_temp, fetcher) = fetcher(COMPOSE, registry);

        let result = fetcher.fetch("gitea").await.unwrap();
        assert_eq!(
            result,
            AppUpdate::found(vec![
                update("gitea", "1.21.0", "1.21.3"),
                update("db", "16.1", "16.2"),
            ])
        );
    }

    #[tokio::test]
    async fn test_auxiliary_update_alone_is_gated() {
        let registry = FakeRegistry::default()
            .with("gitea/gitea", &["1.21.0", "1.20.0"])
            .with("postgres", &["16.2"]);
        let (_temp, fetcher) = fetcher(COMPOSE, registry);

        let result = fetcher.fetch("gitea").await.unwrap();
        assert_eq!(result, AppUpdate::none());
        assert!(result.service_updates.is_empty());
    }

    #[tokio::test]
    async fn test_nothing_newer() {
        let registry = FakeRegistry::default()
            .with("gitea/gitea", &["1.21.0"])
            .with("postgres", &[]);
        let (_temp, fetcher) = fetcher(COMPOSE, registry);

        assert_eq!(fetcher.fetch("gitea").await.unwrap(), AppUpdate::none());
    }

    #[tokio::test]
    async fn test_registry_failure_names_service() {
        let registry = FakeRegistry::default().with("gitea/gitea", &["1.21.3"]);
        let (_temp, fetcher) = fetcher(COMPOSE, registry);

        let err = fetcher.fetch("gitea").await.unwrap_err();
        assert!(
            err.to_string()
                .starts_with("Failed to get tags for service db: ")
        );
    }

    #[tokio::test]
    async fn test_unparsable_current_tag_names_service() {
        let compose = "services:\n  gitea:\n    image: gitea/gitea:nightly\n";
        let registry = FakeRegistry::default().with("gitea/gitea", &["1.21.3"]);
        let (_temp, fetcher) = fetcher(compose, registry);

        let err = fetcher.fetch("gitea").await.unwrap_err();
        assert!(
            err.to_string()
                .starts_with("Failed to select latest tag for service gitea: ")
        );
    }

    #[tokio::test]
    async fn test_untagged_and_build_services_are_skipped() {
        let compose = "\
services:
  gitea:
    image: gitea/gitea:1.21.0
  cache:
    image: redis
  worker:
    build: .
";
        let registry = FakeRegistry::default().with("gitea/gitea", &["1.21.1"]);
        let (_temp, fetcher) = fetcher(compose, registry);

        let result = fetcher.fetch("gitea").await.unwrap();
        assert_eq!(
            result,
            AppUpdate::found(vec![update("gitea", "1.21.0", "1.21.1")])
        );
    }

    #[tokio::test]
    async fn test_missing_services_key() {
        let (_temp, fetcher) = fetcher("version: '3'\n", FakeRegistry::default());

        let err = fetcher.fetch("gitea").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to get images of app: services key missing"
        );
    }
}
