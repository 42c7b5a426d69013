use crate::config::ScrapeLimits;
use crate::scrapers::browser::{dismiss_overlays, with_tab, PageSettings};
use crate::scrapers::traits::CategoryDiscoverer;
use crate::scrapers::types::{CategoryKey, DiscoveredCategory};
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, Element, Tab};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

const MENU_BUTTON: &str = r#"button[data-test-id="menu-button-open"]"#;
const PRIMARY_LIST: &str = r#"ol[id^="megaNav-list[1]"]"#;
const SECONDARY_LIST: &str = r#"ol[data-test-id="subcategory-list-v2-level-2"]"#;
const TERTIARY_LIST: &str = r#"ol[data-test-id="subcategory-list-v2-level-3"]"#;
const MENU_LINK: &str = r#"li > a[data-test-id^="category-menu-link "]"#;

/// Walks the mega-menu (primary → secondary → tertiary) by clicking through it
#[derive(Clone)]
pub struct MenuDiscoverer {
    browser: Arc<Browser>,
    settings: PageSettings,
    base_url: String,
    limits: ScrapeLimits,
}

/// Menu labels carry badges and counts on extra lines
fn first_line(text: &str) -> String {
    text.trim().lines().next().unwrap_or_default().trim().to_string()
}

fn menu_links<'a>(tab: &'a Tab, list_selector: &str) -> Result<Vec<Element<'a>>> {
    let list = tab
        .wait_for_element_with_custom_timeout(list_selector, Duration::from_secs(7))
        .with_context(|| format!("Menu list {} not found", list_selector))?;
    list.find_elements(MENU_LINK)
}

impl MenuDiscoverer {
    pub fn new(
        browser: Arc<Browser>,
        settings: PageSettings,
        base_url: impl Into<String>,
        limits: ScrapeLimits,
    ) -> Self {
        Self {
            browser,
            settings,
            base_url: base_url.into(),
            limits,
        }
    }

    fn open_menu(&self, tab: &Tab) -> Result<()> {
        let button = tab
            .wait_for_element_with_custom_timeout(MENU_BUTTON, Duration::from_secs(15))
            .context("Menu button not found")?;
        button.scroll_into_view()?;
        button.click()?;
        tab.wait_for_element_with_custom_timeout(PRIMARY_LIST, Duration::from_secs(10))
            .context("Main menu did not open")?;
        Ok(())
    }

    /// Click the primary entry at `idx` and return its label
    fn select_primary(&self, tab: &Tab, idx: usize) -> Result<String> {
        let primaries = menu_links(tab, PRIMARY_LIST)?;
        let primary = primaries.get(idx).context("Primary category vanished")?;
        let name = first_line(&primary.get_inner_text()?);
        primary.click()?;
        tab.wait_for_element_with_custom_timeout(SECONDARY_LIST, Duration::from_secs(7))
            .with_context(|| format!("No secondary list for {}", name))?;
        Ok(name)
    }

    fn reopen_at(&self, tab: &Tab, primary_idx: usize) -> Result<()> {
        self.open_menu(tab)?;
        self.select_primary(tab, primary_idx)?;
        Ok(())
    }

    fn absolute(&self, href: &str) -> String {
        match Url::parse(&self.base_url).and_then(|base| base.join(href)) {
            Ok(url) => url.to_string(),
            Err(_) => href.to_string(),
        }
    }

    fn walk_secondary(
        &self,
        tab: &Tab,
        primary: &str,
        secondary_idx: usize,
        discovered: &mut Vec<DiscoveredCategory>,
    ) -> Result<()> {
        let secondaries = menu_links(tab, SECONDARY_LIST)?;
        let link = secondaries.get(secondary_idx).context("Secondary category vanished")?;
        let secondary = first_line(&link.get_inner_text()?);
        info!("  Secondary: {}", secondary);

        let url_before = tab.get_url();
        link.click()?;
        thread::sleep(Duration::from_secs(1));
        let url_after = tab.get_url();

        if url_after != url_before {
            info!("    [LEAF] {} > {} (no tertiary)", primary, secondary);
            discovered.push(DiscoveredCategory {
                key: CategoryKey::Path {
                    primary: primary.to_string(),
                    secondary,
                    tertiary: None,
                },
                url: url_after,
            });
            return Ok(());
        }

        let tertiaries = match menu_links(tab, TERTIARY_LIST) {
            Ok(links) => links,
            Err(_) => {
                warn!("    No tertiary for {} > {}", primary, secondary);
                return Ok(());
            }
        };

        for link in tertiaries.iter().take(self.limits.tertiary_limit) {
            let tertiary = first_line(&link.get_inner_text()?);
            let Some(href) = link.get_attribute_value("href")? else {
                continue;
            };
            let url = self.absolute(&href);
            info!("    Tertiary: {} ({})", tertiary, url);
            discovered.push(DiscoveredCategory {
                key: CategoryKey::Path {
                    primary: primary.to_string(),
                    secondary: secondary.clone(),
                    tertiary: Some(tertiary),
                },
                url,
            });
        }
        Ok(())
    }

    fn walk_primary(
        &self,
        tab: &Tab,
        primary_idx: usize,
        discovered: &mut Vec<DiscoveredCategory>,
    ) -> Result<()> {
        let primary = self.select_primary(tab, primary_idx)?;
        info!("Primary: {}", primary);

        let secondary_count = menu_links(tab, SECONDARY_LIST)?
            .len()
            .min(self.limits.secondary_limit);
        for secondary_idx in 0..secondary_count {
            if secondary_idx > 0 {
                self.reopen_at(tab, primary_idx)?;
            }
            if let Err(e) = self.walk_secondary(tab, &primary, secondary_idx, discovered) {
                warn!("Error in secondary category loop: {:#}", e);
            }
        }
        Ok(())
    }

    fn walk_blocking(&self) -> Result<Vec<DiscoveredCategory>> {
        with_tab(&self.browser, &self.settings, |tab| self.walk_menu(tab))
    }

    fn walk_menu(&self, tab: &Tab) -> Result<Vec<DiscoveredCategory>> {
        tab.navigate_to(&self.base_url)
            .with_context(|| format!("Failed to navigate to {}", self.base_url))?;
        tab.wait_until_navigated()?;
        dismiss_overlays(tab, &self.settings.dismiss_selectors);
        thread::sleep(Duration::from_secs(2));

        info!("Opening main menu...");
        self.open_menu(tab)?;
        let primary_count = menu_links(tab, PRIMARY_LIST)?
            .len()
            .min(self.limits.primary_limit);

        let mut discovered = Vec::new();
        for primary_idx in 0..primary_count {
            if primary_idx > 0 {
                if let Err(e) = self.open_menu(tab) {
                    warn!("Could not reopen menu: {:#}", e);
                    continue;
                }
            }
            if let Err(e) = self.walk_primary(tab, primary_idx, &mut discovered) {
                warn!("Error in primary category loop: {:#}", e);
            }
        }
        Ok(discovered)
    }
}

#[async_trait]
impl CategoryDiscoverer for MenuDiscoverer {
    async fn discover(&self) -> Result<Vec<DiscoveredCategory>> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.walk_blocking())
            .await
            .context("Menu discovery task panicked")?
    }

    fn strategy_name(&self) -> &'static str {
        "menu"
    }
}

#[cfg(test)]
mod tests {
    use super::first_line;

    #[test]
    fn menu_label_keeps_first_line() {
        assert_eq!(first_line("  Carrelage\n12 produits "), "Carrelage");
        assert_eq!(first_line(""), "");
    }
}
