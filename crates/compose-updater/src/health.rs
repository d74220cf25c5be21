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

//! Health checking of a single app
//!
//! The app is started from a throwaway copy of its compose file with the
//! probe port published, probed over TCP and HTTP, and always torn down
//! again afterwards.

use crate::apps::{AppEndpoint, AppStore};
use crate::compose::ComposeDocument;
use crate::config::UpdaterConfig;
use crate::error::Result;
use crate::report::AppHealthReport;
use crate::runner::CommandRunner;
use crate::waiter::ReadinessWaiter;
use async_trait::async_trait;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{info, warn};

#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check_app(&self, app: &str) -> AppHealthReport;
}

pub struct HealthChecker {
    store: Arc<dyn AppStore>,
    runner: Arc<dyn CommandRunner>,
    waiter: Arc<dyn ReadinessWaiter>,
    compose_command: String,
    port_timeout: Duration,
    http_timeout: Duration,
}

impl std::fmt::Debug for HealthChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthChecker")
            .field("compose_command", &self.compose_command)
            .field("port_timeout", &self.port_timeout)
            .field("http_timeout", &self.http_timeout)
            .finish_non_exhaustive()
    }
}

impl HealthChecker {
    pub fn new(
        store: Arc<dyn AppStore>,
        runner: Arc<dyn CommandRunner>,
        waiter: Arc<dyn ReadinessWaiter>,
        config: &UpdaterConfig,
    ) -> Self {
        Self {
            store,
            runner,
            waiter,
            compose_command: config.compose_command.clone(),
            port_timeout: config.port_timeout(),
            http_timeout: config.http_timeout(),
        }
    }

    /// Write the app's compose file, with the probe port published, to a
    /// temp file next to it. The file is removed when the handle drops.
    fn prepare_compose(&self, app: &str, port: &str) -> Result<NamedTempFile> {
        let mut document = ComposeDocument::from_slice(&self.store.read_compose(app)?)?;
        if !document.inject_port_mapping(app, port)? {
            tracing::debug!("{app} already publishes port {port}");
        }

        let mut file = tempfile::Builder::new()
            .prefix(".healthcheck-")
            .suffix(".yml")
            .tempfile_in(self.store.app_dir(app))?;
        file.write_all(&document.to_vec()?)?;
        file.flush()?;
        Ok(file)
    }

    async fn start_and_probe(
        &self,
        app: &str,
        dir: &Path,
        compose_file: &str,
        endpoint: &AppEndpoint,
    ) -> AppHealthReport {
        if let Err(e) = self
            .runner
            .run(dir, &self.compose_command, &["-f", compose_file, "up", "-d"])
            .await
        {
            return AppHealthReport::failed(app, "Failed to run docker-compose", e);
        }

        let ready = match self.waiter.wait_port(&endpoint.port, self.port_timeout).await {
            Ok(()) => self.waiter.wait_http(&endpoint.url(), self.http_timeout).await,
            Err(e) => Err(e),
        };
        match ready {
            Ok(()) => AppHealthReport::healthy(app),
            Err(e) => AppHealthReport::failed(app, "Failed to access index page", e),
        }
    }
}

#[async_trait]
impl HealthCheck for HealthChecker {
    async fn check_app(&self, app: &str) -> AppHealthReport {
        info!("Running health check for {app}");

        let endpoint = match self.store.endpoint(app) {
            Ok(endpoint) => endpoint,
            Err(e) => return AppHealthReport::failed(app, "Failed to get port", e),
        };

        let compose_file = match self.prepare_compose(app, &endpoint.port) {
            Ok(file) => file,
            Err(e) => {
                return AppHealthReport::failed(app, "Failed to inject port in docker-compose", e);
            }
        };

        let dir = self.store.app_dir(app);
        let file_arg = compose_file.path().to_string_lossy().into_owned();
        let report = self.start_and_probe(app, &dir, &file_arg, &endpoint).await;

        if let Err(e) = self
            .runner
            .run(&dir, &self.compose_command, &["-f", &file_arg, "down", "-v"])
            .await
        {
            warn!("Failed to stop {app} after health check: {e}");
        }
        if let Err(e) = compose_file.close() {
            warn!("Failed to remove health check compose file of {app}: {e}");
        }

        if report.healthy {
            info!("{app} is healthy");
        } else {
            warn!("{app} is unhealthy: {}", report.error_message);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::AppsDirectory;
    use crate::error::UpdaterError;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records every command and the compose file content seen by `up`
    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<String>>,
        started_with: Mutex<Option<String>>,
        fail_up: bool,
        fail_down: bool,
    }

    #[async_trait]
    impl CommandRunner for RecordingRunner {
        async fn run(&self, _dir: &Path, command: &str, args: &[&str]) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{command} {}", args.join(" ")));

            if args.contains(&"up") {
                *self.started_with.lock().unwrap() = fs::read_to_string(args[1]).ok();
                if self.fail_up {
                    return Err(UpdaterError::Process("pull access denied".to_owned()));
                }
            }
            if args.contains(&"down") && self.fail_down {
                return Err(UpdaterError::Process("no such project".to_owned()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeWaiter {
        port_down: bool,
        http_down: bool,
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ReadinessWaiter for FakeWaiter {
        async fn wait_port(&self, port: &str, timeout: Duration) -> Result<()> {
            if self.port_down {
                return Err(UpdaterError::ReadinessTimeout {
                    target: format!("port {port}"),
                    timeout_secs: timeout.as_secs(),
                });
            }
            Ok(())
        }

        async fn wait_http(&self, url: &str, timeout: Duration) -> Result<()> {
            self.urls.lock().unwrap().push(url.to_owned());
            if self.http_down {
                return Err(UpdaterError::ReadinessTimeout {
                    target: url.to_owned(),
                    timeout_secs: timeout.as_secs(),
                });
            }
            Ok(())
        }
    }

    const COMPOSE: &str = "services:\n  web:\n    image: nginx:1.25\n";

    fn app_fixture(descriptor: Option<&str>) -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("web");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("docker-compose.yml"), COMPOSE).unwrap();
        if let Some(descriptor) = descriptor {
            fs::write(dir.join("app.yml"), descriptor).unwrap();
        }
        (temp, dir)
    }

    fn checker(
        root: &Path,
        runner: Arc<RecordingRunner>,
        waiter: Arc<FakeWaiter>,
    ) -> HealthChecker {
        HealthChecker::new(
            Arc::new(AppsDirectory::new(root)),
            runner,
            waiter,
            &UpdaterConfig::default(),
        )
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_healthy_app() {
        let (temp, dir) = app_fixture(Some("port: 8080\npath: /login\n"));
        let runner = Arc::new(RecordingRunner::default());
        let waiter = Arc::new(FakeWaiter::default());

        let report = checker(temp.path(), runner.clone(), waiter.clone())
            .check_app("web")
            .await;

        assert_eq!(report, AppHealthReport::healthy("web"));
        assert_eq!(*waiter.urls.lock().unwrap(), vec!["http://localhost:8080/login"]);

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].starts_with("docker compose -f ") && calls[0].ends_with(" up -d"));
        assert!(calls[1].ends_with(" down -v"));

        // Port published in the throwaway copy only
        let started_with = runner.started_with.lock().unwrap().clone().unwrap();
        assert!(started_with.contains("8080:8080"));
        assert_eq!(fs::read_to_string(dir.join("docker-compose.yml")).unwrap(), COMPOSE);
        assert_eq!(dir_entries(&dir), vec!["app.yml", "docker-compose.yml"]);
    }

    #[tokio::test]
    async fn test_default_endpoint() {
        let (temp, _dir) = app_fixture(None);
        let runner = Arc::new(RecordingRunner::default());
        let waiter = Arc::new(FakeWaiter::default());

        let report = checker(temp.path(), runner.clone(), waiter.clone())
            .check_app("web")
            .await;

        assert!(report.healthy);
        assert_eq!(*waiter.urls.lock().unwrap(), vec!["http://localhost:80/"]);
        let started_with = runner.started_with.lock().unwrap().clone().unwrap();
        assert!(started_with.contains("80:80"));
    }

    #[tokio::test]
    async fn test_start_failure_still_tears_down() {
        let (temp, dir) = app_fixture(None);
        let runner = Arc::new(RecordingRunner {
            fail_up: true,
            ..Default::default()
        });
        let waiter = Arc::new(FakeWaiter::default());

        let report = checker(temp.path(), runner.clone(), waiter.clone())
            .check_app("web")
            .await;

        assert!(!report.healthy);
        assert!(report.error_message.starts_with("Failed to run docker-compose: "));
        assert!(waiter.urls.lock().unwrap().is_empty());
        assert!(runner.calls.lock().unwrap()[1].ends_with(" down -v"));
        assert_eq!(dir_entries(&dir), vec!["docker-compose.yml"]);
    }

    #[tokio::test]
    async fn test_port_never_opens() {
        let (temp, dir) = app_fixture(None);
        let runner = Arc::new(RecordingRunner::default());
        let waiter = Arc::new(FakeWaiter {
            port_down: true,
            ..Default::default()
        });

        let report = checker(temp.path(), runner.clone(), waiter.clone())
            .check_app("web")
            .await;

        assert_eq!(
            report.error_message,
            "Failed to access index page: port 80 not ready after 120s"
        );
        // HTTP probing never starts without the port
        assert!(waiter.urls.lock().unwrap().is_empty());
        assert_eq!(runner.calls.lock().unwrap().len(), 2);
        assert_eq!(dir_entries(&dir), vec!["docker-compose.yml"]);
    }

    #[tokio::test]
    async fn test_teardown_failure_keeps_verdict() {
        let (temp, dir) = app_fixture(None);
        let runner = Arc::new(RecordingRunner {
            fail_down: true,
            ..Default::default()
        });
        let waiter = Arc::new(FakeWaiter {
            http_down: true,
            ..Default::default()
        });

        let report = checker(temp.path(), runner, waiter).check_app("web").await;

        // Teardown failure does not change the verdict
        assert!(report.error_message.starts_with("Failed to access index page: "));
        assert_eq!(dir_entries(&dir), vec!["docker-compose.yml"]);
    }

    #[tokio::test]
    async fn test_invalid_descriptor() {
        let (temp, _dir) = app_fixture(Some("port: [8080\n"));
        let runner = Arc::new(RecordingRunner::default());

        let report = checker(temp.path(), runner.clone(), Arc::new(FakeWaiter::default()))
            .check_app("web")
            .await;

        assert!(report.error_message.starts_with("Failed to get port: "));
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unusable_compose_file() {
        let (temp, dir) = app_fixture(None);
        fs::write(dir.join("docker-compose.yml"), "version: '3'\n").unwrap();
        let runner = Arc::new(RecordingRunner::default());

        let report = checker(temp.path(), runner.clone(), Arc::new(FakeWaiter::default()))
            .check_app("web")
            .await;

        assert_eq!(
            report.error_message,
            "Failed to inject port in docker-compose: services key missing"
        );
        assert!(runner.calls.lock().unwrap().is_empty());
        assert_eq!(dir_entries(&dir), vec!["docker-compose.yml"]);
    }

    #[tokio::test]
    async fn test_app_outside_root_never_started() {
        let (temp, dir) = app_fixture(None);
        let runner = Arc::new(RecordingRunner::default());

        // Root is the app dir itself, so ".." would be the fixture root
        let report = checker(&dir, runner.clone(), Arc::new(FakeWaiter::default()))
            .check_app("..")
            .await;

        assert_eq!(report.error_message, "Failed to get port: invalid app name: \"..\"");
        assert!(runner.calls.lock().unwrap().is_empty());
        assert_eq!(dir_entries(temp.path()), vec!["web"]);
    }

    #[test]
    fn test_debug_shows_settings() {
        let temp = TempDir::new().unwrap();
        let debug = format!(
            "{:?}",
            checker(
                temp.path(),
                Arc::new(RecordingRunner::default()),
                Arc::new(FakeWaiter::default())
            )
        );
        assert!(debug.starts_with("HealthChecker"));
        assert!(debug.contains("compose_command: \"docker compose\""));
    }
}
