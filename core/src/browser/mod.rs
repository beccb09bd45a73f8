use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{BrowserBackend, BrowserConfig};

pub mod cdp;
pub mod webdriver;

pub use cdp::CdpBrowser;
pub use webdriver::WebDriverBrowser;

/// The capability set shared by both backends. `open`, `click` and
/// `type_text` propagate failures to the caller; `get_content`,
/// `screenshot` and `evaluate` are best-effort and degrade to an
/// empty/`None` result.
#[async_trait]
pub trait Browser: Send {
    async fn open(&mut self, url: &str) -> Result<()>;

    async fn close(&mut self) -> Result<()>;

    async fn get_content(&mut self) -> String;

    /// Save a screenshot of the current page; returns whether a file was
    /// written.
    async fn screenshot(&mut self, path: &Path) -> bool;

    async fn click(&mut self, selector: &str) -> Result<()>;

    async fn type_text(&mut self, selector: &str, text: &str) -> Result<()>;

    async fn evaluate(&mut self, script: &str) -> Option<Value>;
}

/// Owns at most one live browser session. The session is created lazily
/// by `acquire` and torn down by `release`; callers pair the two around
/// each block of browser work.
pub struct BrowserManager {
    config: BrowserConfig,
    browser: Option<Box<dyn Browser>>,
}

impl BrowserManager {
    pub fn new(config: &BrowserConfig) -> Self {
        Self {
            config: config.clone(),
            browser: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.browser.is_some()
    }

    pub async fn acquire(&mut self) -> Result<&mut (dyn Browser + 'static)> {
        if self.browser.is_none() {
            let browser: Box<dyn Browser> = match self.config.backend {
                BrowserBackend::Cdp => Box::new(CdpBrowser::launch(&self.config).await?),
                BrowserBackend::Webdriver => {
                    Box::new(WebDriverBrowser::connect(&self.config).await?)
                }
            };
            info!("Browser session created ({:?})", self.config.backend);
            self.browser = Some(browser);
        }

        self.browser
            .as_mut()
            .map(|b| &mut **b)
            .context("Browser session unavailable")
    }

    pub async fn release(&mut self) {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("Error closing browser session: {e}");
            } else {
                info!("Browser session closed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_starts_without_session() {
        let manager = BrowserManager::new(&BrowserConfig::default());
        assert!(!manager.is_active());
    }

    #[tokio::test]
    async fn release_without_session_is_a_noop() {
        let mut manager = BrowserManager::new(&BrowserConfig::default());
        manager.release().await;
        assert!(!manager.is_active());
    }
}
