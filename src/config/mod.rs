//! Scraper configuration.
//!
//! Supplier definitions come from a YAML file; per-supplier scrape limits
//! come from environment variables such as `CASTORAMA_PRODUCT_LIMIT`, with a
//! `.env` file next to the YAML filling in the ones the environment lacks.

use anyhow::{Context, Result};
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_CONFIG_PATH: &str = "config/scraper_config.yaml";
pub const DEFAULT_DATA_PATH: &str = "data/materials.json";
/// Dotenv file read from the config file's directory
pub const ENV_FILE_NAME: &str = ".env";

/// Complete scraper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub suppliers: Vec<SupplierConfig>,
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
}

/// How listing pages are fetched
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FetcherKind {
    #[default]
    Browser,
    Http,
}

/// How a supplier's category pages are found
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryKind {
    /// Click through the site's mega-menu
    Menu,
    /// Read the links inside `menu_selector` on the home page
    Links,
    /// Use the `url` of each configured category
    #[default]
    Catalog,
}

/// One supplier website
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierConfig {
    pub name: String,
    pub base_url: String,
    #[serde(default = "default_pagination_selector")]
    pub pagination_selector: String,
    #[serde(default)]
    pub fetcher: FetcherKind,
    #[serde(default)]
    pub discovery: DiscoveryKind,
    /// Mask automation markers in `navigator` before page scripts run
    #[serde(default)]
    pub stealth: bool,
    /// Seconds to wait after navigation (anti-bot interstitials)
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
    /// Buttons clicked after load when present: cookie banners, location drawers
    #[serde(default)]
    pub dismiss_selectors: Vec<String>,
    /// Container holding the category links on the home page
    #[serde(default)]
    pub menu_selector: Option<String>,
    /// Leading discovered categories to drop
    #[serde(default)]
    pub skip_categories: usize,
    /// Take the first word of the name as brand when no brand element exists
    #[serde(default)]
    pub brand_from_name: bool,
    /// Read the unit from size/quantity patterns in the name
    #[serde(default)]
    pub unit_from_name: bool,
    #[serde(default)]
    pub categories: BTreeMap<String, SelectorSet>,
}

/// CSS selectors for one kind of listing page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectorSet {
    pub product_selector: String,
    #[serde(default)]
    pub name_selector: Option<String>,
    #[serde(default)]
    pub price_selector: Option<String>,
    /// Link inside the card; the card's own `href` is used when unset
    #[serde(default)]
    pub url_selector: Option<String>,
    #[serde(default)]
    pub brand_selector: Option<String>,
    /// Attribute holding the brand (e.g. a logo's `alt`) instead of its text
    #[serde(default)]
    pub brand_attribute: Option<String>,
    #[serde(default)]
    pub unit_selector: Option<String>,
    #[serde(default)]
    pub image_selector: Option<String>,
    /// Listing URL for categories that are not discovered from the site
    #[serde(default)]
    pub url: Option<String>,
}

impl SupplierConfig {
    /// Selector set for a discovered category key, falling back to `tiles`
    /// and then to the first configured set.
    pub fn selectors_for(&self, key: &str) -> Option<&SelectorSet> {
        self.categories
            .get(key)
            .or_else(|| self.categories.get("tiles"))
            .or_else(|| self.categories.values().next())
    }

    pub fn env_prefix(&self) -> String {
        self.name.to_uppercase().replace([' ', '-'], "_")
    }
}

/// Per-supplier scrape limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeLimits {
    pub category_limit: usize,
    pub page_limit: usize,
    pub product_limit: usize,
    pub primary_limit: usize,
    pub secondary_limit: usize,
    pub tertiary_limit: usize,
}

impl Default for ScrapeLimits {
    fn default() -> Self {
        Self {
            category_limit: 2,
            page_limit: 10,
            product_limit: 100,
            primary_limit: 2,
            secondary_limit: 2,
            tertiary_limit: 2,
        }
    }
}

impl ScrapeLimits {
    /// Read `<PREFIX>_CATEGORY_LIMIT`, `<PREFIX>_PAGE_LIMIT`, ... from the
    /// process environment and then from `env_file`.
    pub fn load(prefix: &str, env_file: Option<&Path>) -> Result<Self> {
        let vars = collect_vars(env_file, std::env::vars())?;
        Self::from_vars(prefix, vars)
    }

    /// Each limit is read on its own: a malformed variable keeps that
    /// limit's default and is reported by name.
    fn from_vars(prefix: &str, vars: HashMap<String, String>) -> Result<Self> {
        let source = Environment::with_prefix(prefix)
            .try_parsing(true)
            .source(Some(vars));
        let settings = Config::builder()
            .add_source(source)
            .build()
            .context("Failed to read scrape limits from environment")?;

        let mut limits = Self::default();
        for (key, slot) in [
            ("category_limit", &mut limits.category_limit),
            ("page_limit", &mut limits.page_limit),
            ("product_limit", &mut limits.product_limit),
            ("primary_limit", &mut limits.primary_limit),
            ("secondary_limit", &mut limits.secondary_limit),
            ("tertiary_limit", &mut limits.tertiary_limit),
        ] {
            match settings.get::<usize>(key) {
                Ok(value) => *slot = value,
                Err(ConfigError::NotFound(_)) => {}
                Err(e) => warn!(
                    "Ignoring {}_{}, keeping {}: {}",
                    prefix,
                    key.to_uppercase(),
                    slot,
                    e
                ),
            }
        }
        Ok(limits)
    }
}

/// Variables from `env_file` overlaid with `process`; the process wins.
fn collect_vars(
    env_file: Option<&Path>,
    process: impl IntoIterator<Item = (String, String)>,
) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if let Some(path) = env_file {
        vars.extend(read_env_file(path)?);
    }
    vars.extend(process);
    Ok(vars)
}

/// `KEY=value` pairs of a dotenv file; a missing file reads as empty
fn read_env_file(path: &Path) -> Result<Vec<(String, String)>> {
    match dotenvy::from_path_iter(path) {
        Ok(iter) => iter
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Malformed env file {}", path.display())),
        Err(e) if e.not_found() => {
            debug!("No env file at {}", path.display());
            Ok(Vec::new())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read env file {}", path.display())),
    }
}

impl ScraperConfig {
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading scraper config from {}", path.display());
        let config = Config::builder()
            .add_source(File::from(path).format(FileFormat::Yaml))
            .build()
            .with_context(|| format!("Failed to read config file {}", path.display()))?
            .try_deserialize::<Self>()
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Yaml))
            .build()
            .context("Failed to parse config")?
            .try_deserialize::<Self>()
            .context("Invalid config")?;
        Ok(config)
    }

    /// Suppliers matching `selection` (`all` or a case-insensitive name).
    pub fn select(&self, selection: &str) -> Vec<&SupplierConfig> {
        self.suppliers
            .iter()
            .filter(|s| {
                selection.eq_ignore_ascii_case("all") || s.name.eq_ignore_ascii_case(selection)
            })
            .collect()
    }
}

fn default_output_path() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_PATH)
}

fn default_pagination_selector() -> String {
    r#"a[aria-label="Page suivante"]"#.to_string()
}

fn default_settle_secs() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    const SAMPLE: &str = r#"
suppliers:
  - name: Castorama
    base_url: https://www.castorama.fr
    discovery: menu
    brand_from_name: true
    dismiss_selectors:
      - 'button[data-test-id="location-drawer-close-button"]'
    categories:
      tiles:
        product_selector: 'a[data-test-id="product-card"]'
        name_selector: 'p[data-test-id="product-title"]'
        price_selector: 'div[data-test-id="product-price"]'
  - name: ManoMano
    base_url: https://www.manomano.fr
    stealth: true
    discovery: links
    skip_categories: 1
    menu_selector: section.ec_tSD
    categories:
      tiles:
        product_selector: a.product-card
        brand_selector: img.brand
        brand_attribute: alt
"#;

    #[test]
    fn parses_suppliers_with_defaults() {
        let config = ScraperConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.suppliers.len(), 2);
        assert_eq!(config.output_path, PathBuf::from(DEFAULT_DATA_PATH));

        let castorama = &config.suppliers[0];
        assert_eq!(castorama.pagination_selector, r#"a[aria-label="Page suivante"]"#);
        assert_eq!(castorama.fetcher, FetcherKind::Browser);
        assert_eq!(castorama.discovery, DiscoveryKind::Menu);
        assert_eq!(castorama.settle_secs, 10);
        assert!(castorama.brand_from_name);
        assert!(!castorama.stealth);

        let manomano = &config.suppliers[1];
        assert!(manomano.stealth);
        assert_eq!(manomano.discovery, DiscoveryKind::Links);
        assert_eq!(manomano.skip_categories, 1);
        assert_eq!(manomano.menu_selector.as_deref(), Some("section.ec_tSD"));
        let tiles = manomano.selectors_for("tiles").unwrap();
        assert_eq!(tiles.brand_attribute.as_deref(), Some("alt"));
    }

    #[test]
    fn selects_suppliers_case_insensitively() {
        let config = ScraperConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.select("all").len(), 2);
        let picked = config.select("manomano");
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name, "ManoMano");
        assert!(config.select("leroymerlin").is_empty());
    }

    #[test]
    fn unknown_category_falls_back_to_tiles() {
        let config = ScraperConfig::from_yaml_str(SAMPLE).unwrap();
        let castorama = &config.suppliers[0];
        let set = castorama.selectors_for("salle_de_bain").unwrap();
        assert_eq!(set.product_selector, r#"a[data-test-id="product-card"]"#);
    }

    #[test]
    fn limits_read_from_prefixed_environment() {
        let vars = vars(&[
            ("CASTORAMA_PRODUCT_LIMIT", "25"),
            ("CASTORAMA_CATEGORY_LIMIT", "4"),
            ("MANOMANO_PAGE_LIMIT", "1"),
        ]);

        let limits = ScrapeLimits::from_vars("CASTORAMA", vars).unwrap();
        assert_eq!(limits.product_limit, 25);
        assert_eq!(limits.category_limit, 4);
        assert_eq!(limits.page_limit, 10);
        assert_eq!(limits.tertiary_limit, 2);
    }

    #[test]
    fn malformed_limit_keeps_only_its_own_default() {
        let vars = vars(&[
            ("CASTORAMA_PAGE_LIMIT", "abc"),
            ("CASTORAMA_PRODUCT_LIMIT", "-3"),
            ("CASTORAMA_CATEGORY_LIMIT", "4"),
            ("CASTORAMA_TERTIARY_LIMIT", "7"),
        ]);

        let limits = ScrapeLimits::from_vars("CASTORAMA", vars).unwrap();
        assert_eq!(
            limits,
            ScrapeLimits {
                category_limit: 4,
                tertiary_limit: 7,
                ..ScrapeLimits::default()
            }
        );
    }

    #[test]
    fn env_file_fills_in_what_the_process_lacks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "# per-supplier limits\nMANOMANO_PAGE_LIMIT=3\nMANOMANO_PRODUCT_LIMIT=40\n",
        )
        .unwrap();

        let process = vec![("MANOMANO_PRODUCT_LIMIT".to_string(), "5".to_string())];
        let merged = collect_vars(Some(&path), process).unwrap();
        let limits = ScrapeLimits::from_vars("MANOMANO", merged).unwrap();
        assert_eq!(limits.page_limit, 3);
        assert_eq!(limits.product_limit, 5);
    }

    #[test]
    fn missing_env_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let merged = collect_vars(Some(&dir.path().join(".env")), Vec::new()).unwrap();
        assert!(merged.is_empty());
    }

    #[test]
    fn env_prefix_is_upper_snake() {
        let config = ScraperConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.suppliers[1].env_prefix(), "MANOMANO");
    }
}
