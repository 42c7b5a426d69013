//! Product card extraction and pagination over category listing pages.

use crate::config::{ScrapeLimits, SelectorSet, SupplierConfig};
use crate::models::Product;
use crate::scrapers::stealth;
use crate::scrapers::traits::PageSource;
use crate::scrapers::types::{CategoryKey, DiscoveredCategory, PageRequest};
use anyhow::{anyhow, Result};
use chrono::Utc;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use url::Url;

/// First words that name a material rather than a brand
const GENERIC_MATERIALS: &[&str] = &[
    "plastique", "bois", "acier", "métal", "metal", "verre", "alu", "aluminium", "inox", "pvc",
    "cuivre", "laiton", "béton", "beton", "céramique", "ceramique", "résine", "resine",
    "polypropylène", "polypropylene", "polyéthylène", "polyethylene", "caoutchouc", "papier",
    "carton", "tissu", "coton", "laine", "soie", "nylon", "polyester", "polyamide",
    "polyuréthane", "polyurethane", "liège", "bambou", "osier", "rotin", "chanvre", "jute", "lin",
    "sisal", "coco", "peau", "cuir", "fourrure", "laqué", "laque", "émaillé", "emaille", "fonte",
    "granit", "marbre", "pierre", "ardoise", "terre", "terre-cuite", "porcelaine", "argile",
    "silicone", "graphite", "carbone", "chrome", "zinc", "titane", "plomb", "argent", "or",
    "bronze", "étain", "etain", "plastics", "wood", "steel", "glass", "iron", "copper", "brass",
    "concrete", "ceramic", "resin", "rubber", "paper", "cardboard", "fabric", "cotton", "wool",
    "silk", "cork", "bamboo", "rattan", "hemp", "linen", "coconut", "skin", "leather", "fur",
    "lacquered", "enameled", "cast", "granite", "marble", "stone", "slate", "clay", "porcelain",
    "silicon", "carbon", "titanium", "lead", "silver", "gold", "tin",
];

/// Size and pack-quantity patterns, tried in order
static UNIT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b\d+\s?(cm|m|pcs|places|personnes|L|kg|ml|mm)\b",
        r"(?i)\b(lot de|lot)\s*\d+",
        r"(?i)\bx\s?\d+",
        r"(?i)\b\d+\s?pi[eè]ces?\b",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

static PRICE_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\n\r\u{00A0}]+").expect("valid price regex"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("Invalid CSS selector {}: {:?}", selector, e))
}

fn parse_optional(selector: &Option<String>) -> Result<Option<Selector>> {
    selector.as_deref().map(parse_selector).transpose()
}

pub fn contains_selector(html: &str, selector: &str) -> Result<bool> {
    let selector = parse_selector(selector)?;
    Ok(Html::parse_document(html).select(&selector).next().is_some())
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop line breaks and non-breaking spaces, collapse the rest
pub fn clean_price(raw: &str) -> String {
    let without_noise = PRICE_NOISE.replace_all(raw, "");
    WHITESPACE.replace_all(&without_noise, " ").trim().to_string()
}

/// First word of the name, unless it names a material
pub fn brand_from_name(name: &str) -> Option<String> {
    let first = name.split_whitespace().next()?;
    if GENERIC_MATERIALS.contains(&first.to_lowercase().as_str()) {
        None
    } else {
        Some(first.to_string())
    }
}

/// Size or quantity mentioned in the name, e.g. `60 cm` or `lot de 4`
pub fn unit_from_name(name: &str) -> Option<String> {
    UNIT_PATTERNS
        .iter()
        .find_map(|pattern| pattern.find(name))
        .map(|m| m.as_str().to_string())
}

fn resolve(base: Option<&Url>, href: &str) -> String {
    match base.and_then(|base| base.join(href).ok()) {
        Some(url) => url.to_string(),
        None => href.to_string(),
    }
}

/// What the extractor needs to turn cards into records
pub struct ListingContext<'a> {
    pub supplier: &'a SupplierConfig,
    pub selectors: &'a SelectorSet,
    pub category: &'a DiscoveredCategory,
}

struct CompiledSelectors {
    product: Selector,
    name: Option<Selector>,
    price: Option<Selector>,
    url: Option<Selector>,
    brand: Option<Selector>,
    unit: Option<Selector>,
    image: Option<Selector>,
    any_link: Selector,
}

impl CompiledSelectors {
    fn compile(set: &SelectorSet) -> Result<Self> {
        Ok(Self {
            product: parse_selector(&set.product_selector)?,
            name: parse_optional(&set.name_selector)?,
            price: parse_optional(&set.price_selector)?,
            url: parse_optional(&set.url_selector)?,
            brand: parse_optional(&set.brand_selector)?,
            unit: parse_optional(&set.unit_selector)?,
            image: parse_optional(&set.image_selector)?,
            any_link: parse_selector("a[href]")?,
        })
    }
}

fn first<'a>(card: ElementRef<'a>, selector: Option<&Selector>) -> Option<ElementRef<'a>> {
    selector.and_then(|s| card.select(s).next())
}

/// Turn every product card on a listing page into a record.
///
/// Cards without a name or a link are skipped.
pub fn extract_products(html: &str, ctx: &ListingContext<'_>) -> Result<Vec<Product>> {
    let selectors = CompiledSelectors::compile(ctx.selectors)?;
    let document = Html::parse_document(html);
    let base = Url::parse(&ctx.supplier.base_url).ok();

    let (primary, secondary, tertiary) = match &ctx.category.key {
        CategoryKey::Path {
            primary,
            secondary,
            tertiary,
        } => (Some(primary.clone()), Some(secondary.clone()), tertiary.clone()),
        CategoryKey::Named(_) => (None, None, None),
    };

    let mut products = Vec::new();
    for (idx, card) in document.select(&selectors.product).enumerate() {
        let name = match &selectors.name {
            Some(selector) => card.select(selector).next().map(element_text),
            None => Some(element_text(card)),
        };
        let Some(name) = name.filter(|n| !n.is_empty()) else {
            debug!("Skipped card {}: no name", idx);
            continue;
        };

        let href = first(card, selectors.url.as_ref())
            .and_then(|link| link.value().attr("href"))
            .or_else(|| card.value().attr("href"))
            .or_else(|| {
                card.select(&selectors.any_link)
                    .next()
                    .and_then(|a| a.value().attr("href"))
            });
        let Some(href) = href.filter(|h| !h.is_empty()) else {
            debug!("Skipped card {} ({}): no link", idx, name);
            continue;
        };

        let price = first(card, selectors.price.as_ref())
            .map(|el| clean_price(&el.text().collect::<String>()))
            .filter(|p| !p.is_empty());

        let brand = match first(card, selectors.brand.as_ref()) {
            Some(el) => {
                let brand = match &ctx.selectors.brand_attribute {
                    Some(attr) => el.value().attr(attr).map(|v| v.trim().to_string()),
                    None => Some(element_text(el)),
                };
                brand.filter(|b| !b.is_empty())
            }
            None if ctx.supplier.brand_from_name => brand_from_name(&name),
            None => None,
        };

        let unit = ctx
            .supplier
            .unit_from_name
            .then(|| unit_from_name(&name))
            .flatten()
            .or_else(|| {
                first(card, selectors.unit.as_ref())
                    .map(element_text)
                    .filter(|u| !u.is_empty())
            });

        let image_url = first(card, selectors.image.as_ref())
            .and_then(|img| img.value().attr("src").or_else(|| img.value().attr("data-src")))
            .map(|src| resolve(base.as_ref(), src));

        products.push(Product {
            name,
            category: ctx.category.key.to_category(),
            price,
            url: resolve(base.as_ref(), href),
            brand,
            unit,
            image_url,
            supplier: ctx.supplier.name.clone(),
            category_primary: primary.clone(),
            category_secondary: secondary.clone(),
            category_tertiary: tertiary.clone(),
            scraped_at: Some(Utc::now()),
        });
    }

    Ok(products)
}

/// Absolute URL of the next listing page, if the link exists and is enabled
pub fn next_page_url(
    html: &str,
    pagination_selector: &str,
    base_url: &str,
) -> Result<Option<String>> {
    let selector = parse_selector(pagination_selector)?;
    let document = Html::parse_document(html);
    let Some(link) = document.select(&selector).next() else {
        return Ok(None);
    };

    let element = link.value();
    let disabled = element.attr("disabled").is_some()
        || element.attr("aria-disabled") == Some("true")
        || element.classes().any(|c| c.contains("disabled"));
    if disabled {
        return Ok(None);
    }

    let base = Url::parse(base_url).ok();
    Ok(element
        .attr("href")
        .filter(|href| !href.is_empty())
        .map(|href| resolve(base.as_ref(), href)))
}

/// Walks a category's listing pages through a [`PageSource`]
pub struct ListingScraper<'a> {
    source: &'a dyn PageSource,
    limits: ScrapeLimits,
    human_pacing: bool,
}

impl<'a> ListingScraper<'a> {
    pub fn new(source: &'a dyn PageSource, limits: ScrapeLimits) -> Self {
        Self {
            source,
            limits,
            human_pacing: true,
        }
    }

    pub fn limits(&self) -> &ScrapeLimits {
        &self.limits
    }

    /// Follow "next page" links immediately instead of after a random pause
    pub fn without_pacing(mut self) -> Self {
        self.human_pacing = false;
        self
    }

    /// Scrape one category; a failing page ends the category with what was collected so far.
    pub async fn scrape(
        &self,
        supplier: &SupplierConfig,
        selectors: &SelectorSet,
        category: &DiscoveredCategory,
    ) -> Vec<Product> {
        let ctx = ListingContext {
            supplier,
            selectors,
            category,
        };
        let mut results = Vec::new();
        let mut page_url = category.url.clone();
        let mut page_count = 0;

        if self.limits.product_limit == 0 || self.limits.page_limit == 0 {
            debug!("Limits leave nothing to scrape for {}", category.key);
            return results;
        }

        loop {
            let request = PageRequest::new(page_url.as_str())
                .waiting_for(selectors.product_selector.as_str());
            let html = match self.source.fetch(&request).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("Error scraping {}: {:#}", category.key, e);
                    break;
                }
            };

            let products = match extract_products(&html, &ctx) {
                Ok(products) => products,
                Err(e) => {
                    warn!("Error extracting {}: {:#}", category.key, e);
                    break;
                }
            };
            info!("Found {} products on {}", products.len(), page_url);

            for product in products {
                results.push(product);
                if results.len() >= self.limits.product_limit {
                    info!(
                        "Reached product limit ({}) for {}",
                        self.limits.product_limit, category.key
                    );
                    return results;
                }
            }

            page_count += 1;
            if page_count >= self.limits.page_limit {
                debug!("Reached page limit ({}) for {}", self.limits.page_limit, category.key);
                break;
            }

            match next_page_url(&html, &supplier.pagination_selector, &supplier.base_url) {
                Ok(Some(next)) if next != page_url => {
                    page_url = next;
                    if self.human_pacing {
                        tokio::time::sleep(stealth::page_turn_delay()).await;
                    }
                }
                Ok(_) => break,
                Err(e) => {
                    warn!("Bad pagination selector for {}: {:#}", supplier.name, e);
                    break;
                }
            }
        }

        results
    }
}
