use crate::config::SupplierConfig;
use crate::scrapers::stealth::{self, HeaderProfile, STEALTH_SCRIPT};
use crate::scrapers::traits::PageSource;
use crate::scrapers::types::PageRequest;
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(45);
const SELECTOR_TIMEOUT: Duration = Duration::from_secs(15);

/// Launch the Chrome instance shared by one scrape run
pub fn launch_browser(headless: bool) -> Result<Arc<Browser>> {
    info!("Launching {} Chrome...", if headless { "headless" } else { "headed" });

    let args: Vec<&OsStr> = [
        "--disable-blink-features=AutomationControlled",
        "--disable-dev-shm-usage",
        "--disable-infobars",
    ]
    .iter()
    .map(OsStr::new)
    .collect();

    let options = LaunchOptions {
        headless,
        sandbox: false,
        window_size: Some((1920, 1080)),
        idle_browser_timeout: Duration::from_secs(300),
        args,
        ..Default::default()
    };

    let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
    Ok(Arc::new(browser))
}

/// How pages of one supplier are opened
#[derive(Debug, Clone)]
pub struct PageSettings {
    pub stealth: bool,
    pub settle: Duration,
    pub dismiss_selectors: Vec<String>,
    /// Where to dump HTML and a screenshot when an expected selector never shows up
    pub debug_dir: Option<PathBuf>,
}

impl PageSettings {
    pub fn for_supplier(supplier: &SupplierConfig, debug_dir: Option<PathBuf>) -> Self {
        Self {
            stealth: supplier.stealth,
            settle: Duration::from_secs(supplier.settle_secs),
            dismiss_selectors: supplier.dismiss_selectors.clone(),
            debug_dir,
        }
    }
}

/// Open a fresh tab with a rotated fingerprint
fn open_tab(browser: &Browser, settings: &PageSettings) -> Result<Arc<Tab>> {
    let tab = browser.new_tab().context("Failed to open tab")?;
    tab.set_default_timeout(NAVIGATION_TIMEOUT);

    let profile = HeaderProfile::random();
    debug!("Using user agent {}", profile.user_agent);
    tab.set_user_agent(profile.user_agent, Some(profile.accept_language), None)
        .context("Failed to set user agent")?;

    if settings.stealth {
        tab.call_method(Page::AddScriptToEvaluateOnNewDocument {
            source: STEALTH_SCRIPT.to_string(),
            world_name: None,
            include_command_line_api: None,
            run_immediately: None,
        })
        .context("Failed to install stealth script")?;
    }

    Ok(tab)
}

/// Run `work` on a fresh tab, closing the tab on every exit path.
///
/// Dropping a `Tab` leaves its target open in the browser, so the close has
/// to be explicit.
pub fn with_tab<T>(
    browser: &Browser,
    settings: &PageSettings,
    work: impl FnOnce(&Tab) -> Result<T>,
) -> Result<T> {
    let tab = open_tab(browser, settings)?;
    let result = work(tab.as_ref());
    close_after(result, || tab.close(true))
}

fn close_after<T, E: std::fmt::Display>(
    result: Result<T>,
    close: impl FnOnce() -> std::result::Result<bool, E>,
) -> Result<T> {
    if let Err(e) = close() {
        debug!("Could not close tab: {}", e);
    }
    result
}

/// Click away cookie banners and location drawers that cover the listing
pub fn dismiss_overlays(tab: &Tab, selectors: &[String]) {
    for selector in selectors {
        if let Ok(button) = tab.find_element(selector) {
            match button.click() {
                Ok(_) => {
                    debug!("Dismissed overlay {}", selector);
                    thread::sleep(Duration::from_secs(1));
                }
                Err(e) => debug!("Could not click overlay {}: {}", selector, e),
            }
        }
    }
}

/// Scroll down in uneven steps so lazy-loaded cards render
pub fn human_scroll(tab: &Tab) {
    for (pixels, pause) in stealth::scroll_plan() {
        let _ = tab.evaluate(&format!("window.scrollBy(0, {});", pixels), false);
        thread::sleep(pause);
    }
}

/// Page source backed by headless Chrome
#[derive(Clone)]
pub struct BrowserPageSource {
    browser: Arc<Browser>,
    settings: PageSettings,
}

impl BrowserPageSource {
    pub fn new(browser: Arc<Browser>, settings: PageSettings) -> Self {
        Self { browser, settings }
    }

    fn load_blocking(&self, request: &PageRequest) -> Result<String> {
        with_tab(&self.browser, &self.settings, |tab| self.load_in_tab(tab, request))
    }

    fn load_in_tab(&self, tab: &Tab, request: &PageRequest) -> Result<String> {
        info!("Opening {}", request.url);
        tab.navigate_to(&request.url)
            .with_context(|| format!("Failed to navigate to {}", request.url))?;
        tab.wait_until_navigated()
            .with_context(|| format!("Navigation to {} did not finish", request.url))?;

        // Cloudflare-style interstitials need a moment before the listing renders
        thread::sleep(self.settings.settle);
        dismiss_overlays(tab, &self.settings.dismiss_selectors);
        human_scroll(tab);

        if let Some(selector) = &request.wait_for {
            if let Err(e) = tab.wait_for_element_with_custom_timeout(selector, SELECTOR_TIMEOUT) {
                self.capture_debug(tab, &request.url);
                return Err(e).with_context(|| {
                    format!("Selector {} never appeared on {}", selector, request.url)
                });
            }
        }

        let html = tab.get_content().context("Failed to read page HTML")?;
        debug!("Captured {} bytes of HTML", html.len());
        Ok(html)
    }

    fn capture_debug(&self, tab: &Tab, url: &str) {
        let Some(dir) = &self.settings.debug_dir else {
            return;
        };
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!("Could not create debug directory {}: {}", dir.display(), e);
            return;
        }

        if let Ok(html) = tab.get_content() {
            let path = dir.join("last_page.html");
            match std::fs::write(&path, html) {
                Ok(()) => info!("Saved HTML of {} to {}", url, path.display()),
                Err(e) => warn!("Could not save debug HTML: {}", e),
            }
        }

        if let Ok(png) = tab.capture_screenshot(
            Page::CaptureScreenshotFormatOption::Png,
            None,
            None,
            true,
        ) {
            let path = dir.join("last_page.png");
            if std::fs::write(&path, png).is_ok() {
                info!("Saved screenshot to {}", path.display());
            }
        }
    }
}

#[async_trait]
impl PageSource for BrowserPageSource {
    async fn fetch(&self, request: &PageRequest) -> Result<String> {
        let this = self.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || this.load_blocking(&request))
            .await
            .context("Browser task panicked")?
    }

    fn source_name(&self) -> &'static str {
        "browser"
    }
}

#[cfg(test)]
mod tests {
    use super::close_after;
    use anyhow::anyhow;
    use std::cell::Cell;

    #[test]
    fn tab_is_closed_when_work_fails() {
        let closed = Cell::new(false);
        let result: anyhow::Result<String> = close_after(Err(anyhow!("navigation failed")), || {
            closed.set(true);
            Ok::<_, anyhow::Error>(true)
        });
        assert!(closed.get());
        assert_eq!(result.unwrap_err().to_string(), "navigation failed");
    }

    #[test]
    fn close_failure_keeps_the_work_result() {
        let result = close_after(Ok("<html></html>".to_string()), || {
            Err::<bool, _>(anyhow!("target already gone"))
        });
        assert_eq!(result.unwrap(), "<html></html>");
    }
}
