use crate::config::SupplierConfig;
use crate::scrapers::traits::CategoryDiscoverer;
use crate::scrapers::types::DiscoveredCategory;
use anyhow::Result;
use async_trait::async_trait;

/// Categories listed with a fixed `url` in the supplier config
pub struct CatalogDiscoverer {
    categories: Vec<DiscoveredCategory>,
}

impl CatalogDiscoverer {
    pub fn from_config(supplier: &SupplierConfig) -> Self {
        let categories = supplier
            .categories
            .iter()
            .filter_map(|(key, set)| {
                let url = set.url.as_deref()?;
                Some(DiscoveredCategory::named(key.as_str(), url))
            })
            .collect();
        Self { categories }
    }
}

#[async_trait]
impl CategoryDiscoverer for CatalogDiscoverer {
    async fn discover(&self) -> Result<Vec<DiscoveredCategory>> {
        Ok(self.categories.clone())
    }

    fn strategy_name(&self) -> &'static str {
        "catalog"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScraperConfig;

    #[tokio::test]
    async fn only_categories_with_urls_are_listed() {
        let config = ScraperConfig::from_yaml_str(
            r#"
suppliers:
  - name: Brico
    base_url: https://brico.example
    fetcher: http
    categories:
      paint:
        product_selector: div.card
        url: https://brico.example/peinture
      tiles:
        product_selector: div.card
"#,
        )
        .unwrap();

        let discovered = CatalogDiscoverer::from_config(&config.suppliers[0])
            .discover()
            .await
            .unwrap();
        assert_eq!(
            discovered,
            vec![DiscoveredCategory::named("paint", "https://brico.example/peinture")]
        );
    }
}
