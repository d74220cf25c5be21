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

//! Readiness polling for freshly started apps

use crate::config::UpdaterConfig;
use crate::error::{Result, UpdaterError};
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;

#[async_trait]
pub trait ReadinessWaiter: Send + Sync {
    /// Wait until something accepts TCP connections on the local port
    async fn wait_port(&self, port: &str, timeout: Duration) -> Result<()>;

    /// Wait until the URL answers with anything but a server error
    async fn wait_http(&self, url: &str, timeout: Duration) -> Result<()>;
}

/// Polls at a fixed interval until ready or the deadline passes
#[derive(Debug, Clone)]
pub struct PollingWaiter {
    client: reqwest::Client,
    interval: Duration,
    request_timeout: Duration,
}

impl PollingWaiter {
    pub fn new(interval: Duration, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| UpdaterError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            interval,
            request_timeout,
        })
    }

    pub fn from_config(config: &UpdaterConfig) -> Result<Self> {
        Self::new(config.poll_interval(), Duration::from_secs(5))
    }

    async fn port_open(&self, port: u16) -> bool {
        matches!(
            tokio::time::timeout(self.request_timeout, TcpStream::connect(("127.0.0.1", port)))
                .await,
            Ok(Ok(_))
        )
    }

    async fn http_ready(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(response) if response.status().is_server_error() => {
                tracing::debug!("{url} answered {}", response.status());
                false
            }
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("{url} not reachable yet: {e}");
                false
            }
        }
    }

    async fn pause_before(&self, deadline: Instant) -> bool {
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        tokio::time::sleep(self.interval.min(deadline - now)).await;
        true
    }
}

#[async_trait]
impl ReadinessWaiter for PollingWaiter {
    async fn wait_port(&self, port: &str, timeout: Duration) -> Result<()> {
        let number: u16 = port
            .parse()
            .map_err(|_| UpdaterError::Config(format!("invalid port '{port}'")))?;
        let deadline = Instant::now() + timeout;

        loop {
            if self.port_open(number).await {
                tracing::debug!("Port {port} is open");
                return Ok(());
            }
            if !self.pause_before(deadline).await {
                return Err(UpdaterError::ReadinessTimeout {
                    target: format!("port {port}"),
                    timeout_secs: timeout.as_secs(),
                });
            }
        }
    }

    async fn wait_http(&self, url: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;

        loop {
            if self.http_ready(url).await {
                tracing::debug!("{url} is ready");
                return Ok(());
            }
            if !self.pause_before(deadline).await {
                return Err(UpdaterError::ReadinessTimeout {
                    target: url.to_owned(),
                    timeout_secs: timeout.as_secs(),
                });
            }
        }
    }
}
