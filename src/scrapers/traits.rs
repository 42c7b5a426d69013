use crate::scrapers::types::{DiscoveredCategory, PageRequest};
use anyhow::Result;
use async_trait::async_trait;

/// Finds the category listing pages of one supplier
#[async_trait]
pub trait CategoryDiscoverer: Send + Sync {
    /// Discovered categories, in site order
    async fn discover(&self) -> Result<Vec<DiscoveredCategory>>;

    /// Get the name of the discovery strategy
    fn strategy_name(&self) -> &'static str;
}

/// Loads a page and returns its rendered HTML
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, request: &PageRequest) -> Result<String>;

    fn source_name(&self) -> &'static str;
}
