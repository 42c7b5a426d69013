use crate::config::{DiscoveryKind, FetcherKind, ScrapeLimits, ScraperConfig, SupplierConfig};
use crate::models::Product;
use crate::scrapers::browser::{launch_browser, BrowserPageSource, PageSettings};
use crate::scrapers::castorama::MenuDiscoverer;
use crate::scrapers::catalog::CatalogDiscoverer;
use crate::scrapers::http::HttpPageSource;
use crate::scrapers::listing::ListingScraper;
use crate::scrapers::manomano::LinkListDiscoverer;
use crate::scrapers::traits::{CategoryDiscoverer, PageSource};
use anyhow::{Context, Result};
use headless_chrome::Browser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Options for one scrape run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub headed: bool,
    pub debug_dir: Option<PathBuf>,
    /// Dotenv file with `<NAME>_*_LIMIT` values the environment does not set
    pub env_file: Option<PathBuf>,
}

fn needs_browser(supplier: &SupplierConfig) -> bool {
    supplier.fetcher == FetcherKind::Browser || supplier.discovery == DiscoveryKind::Menu
}

fn page_source(
    supplier: &SupplierConfig,
    browser: Option<&Arc<Browser>>,
    settings: &PageSettings,
) -> Result<Arc<dyn PageSource>> {
    let source: Arc<dyn PageSource> = match supplier.fetcher {
        FetcherKind::Browser => {
            let browser = browser.cloned().context("Browser fetcher without a running browser")?;
            Arc::new(BrowserPageSource::new(browser, settings.clone()))
        }
        FetcherKind::Http => Arc::new(HttpPageSource::new()?),
    };
    Ok(source)
}

fn discoverer(
    supplier: &SupplierConfig,
    limits: &ScrapeLimits,
    source: Arc<dyn PageSource>,
    browser: Option<&Arc<Browser>>,
    settings: &PageSettings,
) -> Result<Box<dyn CategoryDiscoverer>> {
    let discoverer: Box<dyn CategoryDiscoverer> = match supplier.discovery {
        DiscoveryKind::Menu => {
            let browser = browser.cloned().context("Menu discovery needs a browser")?;
            Box::new(MenuDiscoverer::new(
                browser,
                settings.clone(),
                supplier.base_url.as_str(),
                *limits,
            ))
        }
        DiscoveryKind::Links => {
            let container = supplier
                .menu_selector
                .as_deref()
                .with_context(|| {
                    format!("{} uses link discovery but has no menu_selector", supplier.name)
                })?;
            Box::new(LinkListDiscoverer::new(
                source,
                supplier.base_url.as_str(),
                container,
                limits.category_limit + supplier.skip_categories,
            ))
        }
        DiscoveryKind::Catalog => Box::new(CatalogDiscoverer::from_config(supplier)),
    };
    Ok(discoverer)
}

/// Discover and scrape one supplier. Category failures are logged and skipped.
pub async fn scrape_supplier(
    supplier: &SupplierConfig,
    discoverer: &dyn CategoryDiscoverer,
    scraper: &ListingScraper<'_>,
) -> Vec<Product> {
    let discovered = match discoverer.discover().await {
        Ok(discovered) => discovered,
        Err(e) => {
            error!(
                "Category discovery ({}) failed for {}: {:#}",
                discoverer.strategy_name(),
                supplier.name,
                e
            );
            return Vec::new();
        }
    };
    info!("Discovered {} categories for {}", discovered.len(), supplier.name);

    let mut products = Vec::new();
    for category in discovered
        .iter()
        .skip(supplier.skip_categories)
        .take(scraper.limits().category_limit)
    {
        let Some(selectors) = supplier.selectors_for(category.key.selector_key()) else {
            warn!("No selectors configured for {} / {}", supplier.name, category.key);
            continue;
        };
        info!("Scraping {} / {}", supplier.name, category.key);
        let scraped = scraper.scrape(supplier, selectors, category).await;
        info!("Collected {} products from {}", scraped.len(), category.key);
        products.extend(scraped);
    }
    products
}

/// Scrape every supplier matching `selection` (`all` or a name)
pub async fn run(
    config: &ScraperConfig,
    selection: &str,
    options: &RunOptions,
) -> Result<Vec<Product>> {
    let suppliers = config.select(selection);
    if suppliers.is_empty() {
        warn!("No configured supplier matches '{}'", selection);
        return Ok(Vec::new());
    }

    let browser = if suppliers.iter().any(|s| needs_browser(s)) {
        Some(launch_browser(!options.headed)?)
    } else {
        None
    };

    let mut all = Vec::new();
    for supplier in suppliers {
        info!("=== Scraping {} ===", supplier.name);

        let prefix = supplier.env_prefix();
        let limits = ScrapeLimits::load(&prefix, options.env_file.as_deref()).unwrap_or_else(|e| {
            warn!("Using default scrape limits for {}: {:#}", supplier.name, e);
            ScrapeLimits::default()
        });
        info!("Limits for {}: {:?}", supplier.name, limits);

        let settings = PageSettings::for_supplier(supplier, options.debug_dir.clone());
        let source = match page_source(supplier, browser.as_ref(), &settings) {
            Ok(source) => source,
            Err(e) => {
                error!("Skipping {}: {:#}", supplier.name, e);
                continue;
            }
        };
        let discoverer = match discoverer(
            supplier,
            &limits,
            source.clone(),
            browser.as_ref(),
            &settings,
        ) {
            Ok(discoverer) => discoverer,
            Err(e) => {
                error!("Skipping {}: {:#}", supplier.name, e);
                continue;
            }
        };

        info!(
            "{}: {} discovery, {} pages",
            supplier.name,
            discoverer.strategy_name(),
            source.source_name()
        );
        let scraper = ListingScraper::new(source.as_ref(), limits);
        let products = scrape_supplier(supplier, discoverer.as_ref(), &scraper).await;
        info!("{}: {} products", supplier.name, products.len());
        all.extend(products);
    }

    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::types::{DiscoveredCategory, PageRequest};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct StaticPages(HashMap<String, String>);

    #[async_trait]
    impl PageSource for StaticPages {
        async fn fetch(&self, request: &PageRequest) -> Result<String> {
            self.0.get(&request.url).cloned().ok_or_else(|| anyhow!("offline"))
        }

        fn source_name(&self) -> &'static str {
            "static"
        }
    }

    struct FixedCategories(Vec<DiscoveredCategory>);

    #[async_trait]
    impl CategoryDiscoverer for FixedCategories {
        async fn discover(&self) -> Result<Vec<DiscoveredCategory>> {
            Ok(self.0.clone())
        }

        fn strategy_name(&self) -> &'static str {
            "fixed"
        }
    }

    struct BrokenDiscovery;

    #[async_trait]
    impl CategoryDiscoverer for BrokenDiscovery {
        async fn discover(&self) -> Result<Vec<DiscoveredCategory>> {
            Err(anyhow!("menu button not found"))
        }

        fn strategy_name(&self) -> &'static str {
            "broken"
        }
    }

    fn supplier() -> SupplierConfig {
        ScraperConfig::from_yaml_str(
            r#"
suppliers:
  - name: ManoMano
    base_url: https://www.manomano.fr
    skip_categories: 1
    categories:
      tiles:
        product_selector: a.product
        name_selector: p
"#,
        )
        .unwrap()
        .suppliers
        .remove(0)
    }

    fn card(name: &str, href: &str) -> String {
        format!(r#"<a class="product" href="{href}"><p>{name}</p></a>"#)
    }

    #[tokio::test]
    async fn skips_leading_categories_and_survives_failing_ones() {
        let mut pages = HashMap::new();
        pages.insert("https://www.manomano.fr/promo".to_string(), card("Promo", "/p/promo"));
        pages.insert("https://www.manomano.fr/wc".to_string(), card("WC suspendu", "/p/wc"));
        let source = StaticPages(pages);
        let discoverer = FixedCategories(vec![
            DiscoveredCategory::named("promo", "https://www.manomano.fr/promo"),
            DiscoveredCategory::named("douche", "https://www.manomano.fr/douche"),
            DiscoveredCategory::named("wc", "https://www.manomano.fr/wc"),
            DiscoveredCategory::named("jardin", "https://www.manomano.fr/jardin"),
        ]);
        let limits = ScrapeLimits {
            category_limit: 2,
            ..ScrapeLimits::default()
        };

        let scraper = ListingScraper::new(&source, limits).without_pacing();

        let products = scrape_supplier(&supplier(), &discoverer, &scraper).await;

        let names: Vec<_> = products.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["WC suspendu"]);
    }

    #[tokio::test]
    async fn failed_discovery_yields_no_products() {
        let source = StaticPages(HashMap::new());
        let scraper = ListingScraper::new(&source, ScrapeLimits::default());
        let products = scrape_supplier(&supplier(), &BrokenDiscovery, &scraper).await;
        assert!(products.is_empty());
    }
}
