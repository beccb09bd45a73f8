use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as ChromiumBrowser, BrowserConfig as ChromiumConfig};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures_util::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::browser::Browser;
use crate::config::BrowserConfig;

/// Library-driven backend: launches its own Chromium and drives it over
/// the DevTools protocol.
pub struct CdpBrowser {
    browser: ChromiumBrowser,
    page: Page,
    handler_task: JoinHandle<()>,
    timeout: Duration,
}

impl CdpBrowser {
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let mut builder = ChromiumConfig::builder();
        if !config.headless {
            builder = builder.with_head();
        }
        let chromium_config = builder
            .build()
            .map_err(anyhow::Error::msg)
            .context("Invalid Chromium configuration")?;

        let (browser, mut handler) = ChromiumBrowser::launch(chromium_config)
            .await
            .context("Failed to launch Chromium")?;

        // The handler stream must be polled for the browser to make progress.
        let handler_task = tokio::spawn(async move {
            while handler.next().await.is_some() {}
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to open initial page")?;

        info!("CDP browser initialized");

        Ok(Self {
            browser,
            page,
            handler_task,
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }
}

#[async_trait]
impl Browser for CdpBrowser {
    async fn open(&mut self, url: &str) -> Result<()> {
        let navigation = async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, anyhow::Error>(())
        };

        match tokio::time::timeout(self.timeout, navigation).await {
            Ok(Ok(())) => {
                info!("Opened URL: {url}");
                Ok(())
            }
            Ok(Err(e)) => {
                error!("Error opening URL {url}: {e}");
                Err(e)
            }
            Err(_) => {
                error!("Timed out opening URL {url}");
                Err(anyhow::anyhow!("Navigation to {url} timed out"))
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        let result = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        result.map(|_| ()).context("Error closing CDP browser")
    }

    async fn get_content(&mut self) -> String {
        match self.page.content().await {
            Ok(content) => content,
            Err(e) => {
                error!("Error getting page content: {e}");
                String::new()
            }
        }
    }

    async fn screenshot(&mut self, path: &Path) -> bool {
        match self
            .page
            .save_screenshot(ScreenshotParams::builder().build(), path)
            .await
        {
            Ok(_) => {
                info!("Screenshot saved to {}", path.display());
                true
            }
            Err(e) => {
                error!("Error taking screenshot: {e}");
                false
            }
        }
    }

    async fn click(&mut self, selector: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .with_context(|| format!("Element not found: {selector}"))?;
        element
            .click()
            .await
            .with_context(|| format!("Error clicking on element {selector}"))?;
        info!("Clicked on element: {selector}");
        Ok(())
    }

    async fn type_text(&mut self, selector: &str, text: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .with_context(|| format!("Element not found: {selector}"))?;
        element
            .click()
            .await
            .with_context(|| format!("Error focusing element {selector}"))?;
        element
            .type_str(text)
            .await
            .with_context(|| format!("Error typing into element {selector}"))?;
        info!("Typed text into element: {selector}");
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> Option<Value> {
        match self.page.evaluate(script).await {
            Ok(result) => result.value().cloned(),
            Err(e) => {
                error!("Error evaluating script: {e}");
                None
            }
        }
    }
}
