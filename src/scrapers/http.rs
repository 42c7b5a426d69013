use crate::scrapers::stealth::HeaderProfile;
use crate::scrapers::traits::PageSource;
use crate::scrapers::types::PageRequest;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Page source for suppliers whose listings render without JavaScript
pub struct HttpPageSource {
    client: Client,
}

impl HttpPageSource {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(45))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch(&self, request: &PageRequest) -> Result<String> {
        let profile = HeaderProfile::random();
        debug!("Fetching URL: {}", request.url);

        let response = self
            .client
            .get(&request.url)
            .header(USER_AGENT, profile.user_agent)
            .header(ACCEPT_LANGUAGE, profile.accept_language)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", request.url))?;

        if !response.status().is_success() {
            warn!("{} returned status: {}", request.url, response.status());
            anyhow::bail!("Failed to fetch {}: {}", request.url, response.status());
        }

        let html = response.text().await.context("Failed to read response body")?;
        debug!("Downloaded {} bytes of HTML", html.len());

        if let Some(selector) = &request.wait_for {
            if !crate::scrapers::listing::contains_selector(&html, selector)? {
                anyhow::bail!("Selector {} not found on {}", selector, request.url);
            }
        }

        Ok(html)
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}
