use crate::scrapers::listing::parse_selector;
use crate::scrapers::traits::{CategoryDiscoverer, PageSource};
use crate::scrapers::types::{DiscoveredCategory, PageRequest};
use anyhow::Result;
use async_trait::async_trait;
use scraper::Html;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Discovers categories from the links inside one container of the home page
pub struct LinkListDiscoverer {
    source: Arc<dyn PageSource>,
    base_url: String,
    container_selector: String,
    limit: usize,
}

impl LinkListDiscoverer {
    pub fn new(
        source: Arc<dyn PageSource>,
        base_url: impl Into<String>,
        container_selector: impl Into<String>,
        limit: usize,
    ) -> Self {
        Self {
            source,
            base_url: base_url.into(),
            container_selector: container_selector.into(),
            limit,
        }
    }
}

/// Category links inside `container_selector`, keyed by their snake-cased text.
///
/// Duplicate keys get `_2`, `_3`, ... suffixes.
pub fn parse_menu_links(
    html: &str,
    container_selector: &str,
    base_url: &str,
    limit: usize,
) -> Result<Vec<DiscoveredCategory>> {
    let container = parse_selector(container_selector)?;
    let link = parse_selector("a[href]")?;
    let document = Html::parse_document(html);
    let base = Url::parse(base_url.trim_end_matches('/')).ok();

    let mut discovered = Vec::new();
    let mut seen = HashSet::new();
    let Some(section) = document.select(&container).next() else {
        debug!("Menu container {} not found", container_selector);
        return Ok(discovered);
    };

    for anchor in section.select(&link) {
        if discovered.len() >= limit {
            break;
        }
        let text = anchor.text().collect::<String>().trim().to_lowercase();
        if text.is_empty() {
            continue;
        }
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let url = match base.as_ref().and_then(|b| b.join(href).ok()) {
            Some(url) => url.to_string(),
            None => href.to_string(),
        };

        let base_key = text.replace(' ', "_");
        let mut key = base_key.clone();
        let mut suffix = 2;
        while seen.contains(&key) {
            key = format!("{}_{}", base_key, suffix);
            suffix += 1;
        }
        seen.insert(key.clone());
        discovered.push(DiscoveredCategory::named(key, url));
    }

    Ok(discovered)
}

#[async_trait]
impl CategoryDiscoverer for LinkListDiscoverer {
    async fn discover(&self) -> Result<Vec<DiscoveredCategory>> {
        info!("Discovering categories from {}", self.base_url);
        let request = PageRequest::new(self.base_url.as_str())
            .waiting_for(self.container_selector.as_str());
        let html = self.source.fetch(&request).await?;
        parse_menu_links(&html, &self.container_selector, &self.base_url, self.limit)
    }

    fn strategy_name(&self) -> &'static str {
        "links"
    }
}
