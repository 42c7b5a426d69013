//! Request fingerprint rotation and human-like pacing.

use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;

pub const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 13; SM-G991B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Mobile Safari/537.36",
];

pub const ACCEPT_LANGUAGE: &str = "fr-FR,fr;q=0.9,en-US;q=0.8,en;q=0.7";

/// Injected before any page script runs
pub const STEALTH_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', {get: () => undefined});
window.chrome = { runtime: {} };
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3] });
Object.defineProperty(navigator, 'languages', { get: () => ['fr-FR', 'fr'] });
Object.defineProperty(HTMLIFrameElement.prototype, 'contentWindow', { get: function () { return window; } });
Object.defineProperty(screen, 'availTop', { get: () => 0 });
Object.defineProperty(navigator, 'platform', { get: () => 'Win32' });
"#;

/// Headers presented by one browser context or HTTP client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderProfile {
    pub user_agent: &'static str,
    pub accept_language: &'static str,
}

impl HeaderProfile {
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            user_agent: USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0]),
            accept_language: ACCEPT_LANGUAGE,
        }
    }
}

/// Wheel steps (pixels, pause) that mimic a reader scrolling down a listing
pub fn scroll_plan() -> Vec<(u32, Duration)> {
    let mut rng = rand::thread_rng();
    let steps = rng.gen_range(3..=6);
    (0..steps)
        .map(|_| {
            let pixels = rng.gen_range(200..=1000);
            let pause = Duration::from_millis(rng.gen_range(500..=1500));
            (pixels, pause)
        })
        .collect()
}

/// Delay before following a "next page" link
pub fn page_turn_delay() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(2000..=4000))
}
