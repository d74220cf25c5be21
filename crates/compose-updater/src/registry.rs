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

//! Container registry tag listing

use crate::config::UpdaterConfig;
use crate::error::{Result, UpdaterError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const USER_AGENT: &str = concat!("compose-updater/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// All tags published for an image repository (e.g. "nginx", "gitea/gitea")
    async fn list_image_tags(&self, repository: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Deserialize)]
struct TagsPage {
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    results: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

/// Docker Hub v2 repositories API client
#[derive(Debug, Clone)]
pub struct DockerHubClient {
    client: reqwest::Client,
    base_url: String,
    page_size: u32,
    max_pages: u32,
}

impl DockerHubClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let defaults = UpdaterConfig::default();
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| UpdaterError::Registry(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            page_size: defaults.registry_page_size,
            max_pages: defaults.registry_max_pages,
        })
    }

    pub fn from_config(config: &UpdaterConfig) -> Result<Self> {
        Ok(Self::new(&config.registry_base_url)?
            .with_page_size(config.registry_page_size)
            .with_max_pages(config.registry_max_pages))
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    async fn fetch_page(&self, url: &str) -> Result<TagsPage> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UpdaterError::Registry(format!("Request failed: {e}")))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_owned());
            return Err(UpdaterError::Registry(format!(
                "Registry API error {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| UpdaterError::Registry(format!("Failed to parse response: {e}")))
    }
}

/// Docker Hub namespace/name path for a repository. Official images live
/// under "library/"; images from other registries are rejected.
pub fn hub_repository_path(repository: &str) -> Result<String> {
    let repository = repository
        .strip_prefix("docker.io/")
        .or_else(|| repository.strip_prefix("index.docker.io/"))
        .unwrap_or(repository);

    let mut parts = repository.splitn(2, '/');
    let first = parts.next().unwrap_or_default();
    match parts.next() {
        None if first.is_empty() => Err(UpdaterError::Registry(
            "empty image repository".to_owned(),
        )),
        None => Ok(format!("library/{first}")),
        Some(_) if first.contains('.') || first.contains(':') || first == "localhost" => {
            Err(UpdaterError::Registry(format!(
                "unsupported registry host in {repository}, only Docker Hub is supported"
            )))
        }
        Some(_) => Ok(repository.to_owned()),
    }
}

#[async_trait]
impl RegistryClient for DockerHubClient {
    async fn list_image_tags(&self, repository: &str) -> Result<Vec<String>> {
        let path = hub_repository_path(repository)?;
        let mut url = Some(format!(
            "{}/v2/repositories/{path}/tags?page_size={}",
            self.base_url, self.page_size
        ));
        let mut tags = Vec::new();
        let mut pages = 0;

        while let Some(current) = url.take() {
            if pages >= self.max_pages {
                tracing::debug!("Stopping tag listing for {repository} after {pages} pages");
                break;
            }
            let page = self.fetch_page(&current).await?;
            pages += 1;
            tags.extend(page.results.into_iter().map(|t| t.name));
            url = page.next.filter(|next| !next.is_empty());
        }

        tracing::debug!("Found {} tags for {repository}", tags.len());
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[test]
    fn test_hub_repository_path() {
        assert_eq!(hub_repository_path("nginx").unwrap(), "library/nginx");
        assert_eq!(hub_repository_path("gitea/gitea").unwrap(), "gitea/gitea");
        assert_eq!(
            hub_repository_path("docker.io/library/redis").unwrap(),
            "library/redis"
        );
        assert!(hub_repository_path("ghcr.io/acme/app").is_err());
        assert!(hub_repository_path("localhost:5000/app").is_err());
        assert!(hub_repository_path("").is_err());
    }

    #[tokio::test]
    async fn test_list_image_tags_single_page() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/repositories/library/nginx/tags")
            .match_query(Matcher::Exact("page_size=100".to_owned()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "count": 3,
                    "next": null,
                    "results": [{"name": "1.25"}, {"name": "1.24"}, {"name": "latest"}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = DockerHubClient::new(server.url()).unwrap();
        let tags = client.list_image_tags("nginx").await.unwrap();
        assert_eq!(tags, vec!["1.25", "1.24", "latest"]);

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_image_tags_follows_next() {
        let mut server = Server::new_async().await;
        let next = format!(
            "{}/v2/repositories/gitea/gitea/tags?page=2&page_size=100",
            server.url()
        );
        let first = server
            .mock("GET", "/v2/repositories/gitea/gitea/tags")
            .match_query(Matcher::Exact("page_size=100".to_owned()))
            .with_status(200)
            .with_body(json!({"next": next, "results": [{"name": "1.21.1"}]}).to_string())
            .create_async()
            .await;
        let second = server
            .mock("GET", "/v2/repositories/gitea/gitea/tags")
            .match_query(Matcher::Exact("page=2&page_size=100".to_owned()))
            .with_status(200)
            .with_body(json!({"next": null, "results": [{"name": "1.21.0"}]}).to_string())
            .create_async()
            .await;

        let client = DockerHubClient::new(server.url()).unwrap();
        let tags = client.list_image_tags("gitea/gitea").await.unwrap();
        assert_eq!(tags, vec!["1.21.1", "1.21.0"]);

        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_image_tags_respects_max_pages() {
        let mut server = Server::new_async().await;
        let next = format!("{}/v2/repositories/library/redis/tags?page=2", server.url());
        let first = server
            .mock("GET", "/v2/repositories/library/redis/tags")
            .match_query(Matcher::Exact("page_size=100".to_owned()))
            .with_status(200)
            .with_body(json!({"next": next, "results": [{"name": "7.2"}]}).to_string())
            .create_async()
            .await;

        let client = DockerHubClient::new(server.url()).unwrap().with_max_pages(1);
        let tags = client.list_image_tags("redis").await.unwrap();
        assert_eq!(tags, vec!["7.2"]);

        first.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_image_tags_api_error() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/repositories/library/missing/tags")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(json!({"message": "object not found"}).to_string())
            .create_async()
            .await;

        let client = DockerHubClient::new(server.url()).unwrap();
        let result = client.list_image_tags("missing").await;
        assert!(matches!(result, Err(UpdaterError::Registry(msg)) if msg.contains("404")));

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_image_tags_invalid_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/repositories/library/nginx/tags")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = DockerHubClient::new(server.url()).unwrap();
        let result = client.list_image_tags("nginx").await;
        assert!(matches!(result, Err(UpdaterError::Registry(_))));

        mock.assert_async().await;
    }
}
