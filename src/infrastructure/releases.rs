//! GitHub releases API client used by the updater.

use crate::domain::error::{AppError, Result};
use crate::domain::release::ReleaseInfo;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

const USER_AGENT: &str = concat!("trace/", env!("CARGO_PKG_VERSION"));

#[async_trait]
pub trait ReleaseSource {
    async fn latest_release(&self) -> Result<ReleaseInfo>;

    /// Small text asset such as a checksum file.
    async fn fetch_text(&self, url: &str) -> Result<String>;

    /// Streams `url` into `dest` and returns the number of bytes written.
    async fn download_to(&self, url: &str, dest: &Path) -> Result<u64>;
}

pub struct GithubReleaseClient {
    client: reqwest::Client,
    api_base: String,
    owner: String,
    repo: String,
}

impl GithubReleaseClient {
    pub fn new(api_base: &str, owner: &str, repo: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
        }
    }

    pub fn latest_release_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_base, self.owner, self.repo
        )
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| AppError::UpdateError(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpdateError(format!(
                "Release API error ({}): {}",
                status, body
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl ReleaseSource for GithubReleaseClient {
    async fn latest_release(&self) -> Result<ReleaseInfo> {
        let url = self.latest_release_url();
        debug!(url = %url, "Checking latest release");
        let response = self.get(&url, Duration::from_secs(30)).await?;
        response
            .json::<ReleaseInfo>()
            .await
            .map_err(|e| AppError::ParseError(format!("Invalid release payload: {}", e)))
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.get(url, Duration::from_secs(30)).await?;
        response
            .text()
            .await
            .map_err(|e| AppError::UpdateError(format!("Failed to read {}: {}", url, e)))
    }

    async fn download_to(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut response = self.get(url, Duration::from_secs(600)).await?;
        let mut file = tokio::fs::File::create(dest).await.map_err(|e| {
            AppError::IoError(format!("Failed to create {}: {}", dest.display(), e))
        })?;

        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AppError::UpdateError(format!("Download interrupted: {}", e)))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(url, bytes = written, "Downloaded release asset");
        Ok(written)
    }
}
