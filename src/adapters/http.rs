use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::adapters::storage::LocalStorage;
use crate::core::{PageFetcher, Storage};
use crate::utils::error::{Result, ScoutError};

const USER_AGENT: &str = concat!("tee-times/", env!("CARGO_PKG_VERSION"));

/// HTTP `PageFetcher`，設定快照目錄時每個頁面都會另存一份
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    snapshots: Option<LocalStorage>,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            snapshots: None,
        })
    }

    pub fn with_snapshots(mut self, storage: LocalStorage) -> Self {
        self.snapshots = Some(storage);
        self
    }

    async fn snapshot(&self, url: &str, body: &str) {
        let Some(storage) = &self.snapshots else {
            return;
        };
        let name = snapshot_name(url);
        // 快照失敗不影響抓取
        if let Err(e) = storage.write_file(&name, body.as_bytes()).await {
            tracing::warn!("⚠️ Could not write snapshot {}: {}", name, e);
        } else {
            tracing::debug!("📁 Snapshot saved: {}", name);
        }
    }
}

/// 快照檔名，例如 `club_example_com_teetimes_searchmatrix_teedate_20261018.html`
pub fn snapshot_name(url: &str) -> String {
    let without_scheme = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url);
    let mut slug: String = without_scheme
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    while slug.contains("__") {
        slug = slug.replace("__", "_");
    }
    let slug: String = slug.trim_matches('_').chars().take(120).collect();
    format!("{}.html", if slug.is_empty() { "page" } else { slug.as_str() })
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        tracing::debug!("Fetching {}", url);
        let response = self.client.get(url).send().await?;

        let status = response.status();
        tracing::debug!("Response status: {}", status);
        if !status.is_success() {
            return Err(ScoutError::HttpStatusError {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        self.snapshot(url, &body).await;
        Ok(body)
    }
}
