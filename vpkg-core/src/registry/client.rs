//! HTTP access to the registry index, repository manifests and package files

use serde::de::DeserializeOwned;

use super::{RegistryIndex, RepositoryManifest};
use crate::config::Settings;
use crate::error::{Result, VpkgError};

/// Client for one registry, constructed per command invocation
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: reqwest::Client,
    settings: Settings,
}

impl RegistryClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.content_timeout())
            .build()
            .map_err(|e| VpkgError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            settings: settings.clone(),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Fetch and parse the registry index
    pub async fn fetch_index(&self) -> Result<RegistryIndex> {
        let url = self.settings.registry_url.clone();
        tracing::debug!("Fetching registry index from {}", url);

        let body = self.get_text(&url).await?;
        RegistryIndex::from_yaml(&body, &url)
    }

    /// Fetch and parse one repository manifest
    pub async fn fetch_manifest(&self, manifest_url: &str) -> Result<RepositoryManifest> {
        tracing::debug!("Fetching repository manifest from {}", manifest_url);

        let body = self.get_text(manifest_url).await?;
        RepositoryManifest::from_yaml(&body, manifest_url)
    }

    /// Fetch a file relative to a repository base URL
    pub async fn fetch_file(&self, base_url: &str, relative_path: &str) -> Result<Vec<u8>> {
        let url = join_url(base_url, relative_path);
        tracing::debug!("Fetching {}", url);

        let response = self.send(&url).await.map_err(|e| match e {
            VpkgError::HttpStatus { url, status: 404 } => VpkgError::FileNotFound { url },
            other => other,
        })?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| VpkgError::network(&url, e))?;
        Ok(bytes.to_vec())
    }

    /// Whether `url` exists, using the short probe timeout
    ///
    /// Any failure counts as absent.
    pub async fn probe(&self, url: &str) -> bool {
        let result = self
            .client
            .head(url)
            .timeout(self.settings.probe_timeout())
            .send()
            .await;

        match result {
            Ok(response) => {
                tracing::debug!("Probe {} -> {}", url, response.status());
                response.status().is_success()
            }
            Err(e) => {
                tracing::debug!("Probe {} failed: {}", url, e);
                false
            }
        }
    }

    /// GET a JSON document (used for directory-listing APIs)
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.send(url).await?;
        let body = response
            .text()
            .await
            .map_err(|e| VpkgError::network(url, e))?;
        serde_json::from_str(&body).map_err(|e| VpkgError::schema(url, e))
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.send(url).await?;
        response.text().await.map_err(|e| VpkgError::network(url, e))
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| VpkgError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VpkgError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }
}

/// Join a base URL and a relative path with exactly one slash between them
pub fn join_url(base: &str, relative: &str) -> String {
    let relative = relative.trim_start_matches('/');
    if relative.is_empty() {
        return base.trim_end_matches('/').to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), relative)
}
