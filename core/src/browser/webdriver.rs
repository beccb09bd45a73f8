use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::browser::Browser;
use crate::config::BrowserConfig;

/// Driver-driven backend: a minimal W3C WebDriver client speaking JSON
/// over HTTP to an external driver (geckodriver, chromedriver).
pub struct WebDriverBrowser {
    client: reqwest::Client,
    base_url: String,
    session_id: String,
}

impl WebDriverBrowser {
    pub async fn connect(config: &BrowserConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let base_url = config.webdriver_url.trim_end_matches('/').to_string();

        let mut chrome_args = vec!["--disable-gpu"];
        let mut firefox_args: Vec<&str> = Vec::new();
        if config.headless {
            chrome_args.push("--headless=new");
            firefox_args.push("-headless");
        }

        // Vendor-prefixed blocks; the driver ignores the foreign one.
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "goog:chromeOptions": { "args": chrome_args },
                    "moz:firefoxOptions": { "args": firefox_args },
                }
            }
        });

        let response = client
            .post(format!("{base_url}/session"))
            .json(&capabilities)
            .send()
            .await
            .with_context(|| format!("Failed to reach WebDriver at {base_url}"))?;
        let body = Self::check(response).await?;

        let session_id = body
            .pointer("/value/sessionId")
            .and_then(|v| v.as_str())
            .context("WebDriver session response missing sessionId")?
            .to_string();

        let browser = Self {
            client,
            base_url,
            session_id,
        };

        if let Err(e) = browser
            .post("/timeouts", json!({ "pageLoad": config.timeout_ms }))
            .await
        {
            warn!("Failed to set page load timeout: {e}");
        }

        info!("WebDriver browser initialized");
        Ok(browser)
    }

    async fn check(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            let message = body
                .pointer("/value/message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown WebDriver error");
            anyhow::bail!("WebDriver request failed ({status}): {message}");
        }

        Ok(body)
    }

    fn session_url(&self, path: &str) -> String {
        format!("{}/session/{}{path}", self.base_url, self.session_id)
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let response = self
            .client
            .post(self.session_url(path))
            .json(&body)
            .send()
            .await?;
        Self::check(response).await
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let response = self.client.get(self.session_url(path)).send().await?;
        Self::check(response).await
    }

    async fn find_element(&self, selector: &str) -> Result<String> {
        let body = self
            .post(
                "/element",
                json!({ "using": "css selector", "value": selector }),
            )
            .await
            .with_context(|| format!("Element not found: {selector}"))?;

        // The element id is keyed by the W3C element identifier constant;
        // take the first string value rather than hard-coding it.
        body.pointer("/value")
            .and_then(|v| v.as_object())
            .and_then(|obj| obj.values().find_map(|v| v.as_str()))
            .map(String::from)
            .with_context(|| format!("Malformed element response for {selector}"))
    }
}

#[async_trait]
impl Browser for WebDriverBrowser {
    async fn open(&mut self, url: &str) -> Result<()> {
        match self.post("/url", json!({ "url": url })).await {
            Ok(_) => {
                info!("Opened URL: {url}");
                Ok(())
            }
            Err(e) => {
                error!("Error opening URL {url}: {e}");
                Err(e)
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        let response = self
            .client
            .delete(self.session_url(""))
            .send()
            .await
            .context("Error closing WebDriver session")?;
        Self::check(response).await?;
        Ok(())
    }

    async fn get_content(&mut self) -> String {
        match self.get("/source").await {
            Ok(body) => body
                .pointer("/value")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            Err(e) => {
                error!("Error getting page content: {e}");
                String::new()
            }
        }
    }

    async fn screenshot(&mut self, path: &Path) -> bool {
        let encoded = match self.get("/screenshot").await {
            Ok(body) => body
                .pointer("/value")
                .and_then(|v| v.as_str())
                .map(String::from),
            Err(e) => {
                error!("Error taking screenshot: {e}");
                return false;
            }
        };

        let Some(encoded) = encoded else {
            error!("Screenshot response missing image data");
            return false;
        };

        match BASE64
            .decode(encoded.as_bytes())
            .map_err(anyhow::Error::from)
            .and_then(|bytes| std::fs::write(path, bytes).map_err(Into::into))
        {
            Ok(()) => {
                info!("Screenshot saved to {}", path.display());
                true
            }
            Err(e) => {
                error!("Error saving screenshot: {e}");
                false
            }
        }
    }

    async fn click(&mut self, selector: &str) -> Result<()> {
        let element = self.find_element(selector).await?;
        self.post(&format!("/element/{element}/click"), json!({}))
            .await
            .with_context(|| format!("Error clicking on element {selector}"))?;
        info!("Clicked on element: {selector}");
        Ok(())
    }

    async fn type_text(&mut self, selector: &str, text: &str) -> Result<()> {
        let element = self.find_element(selector).await?;
        self.post(&format!("/element/{element}/clear"), json!({}))
            .await
            .with_context(|| format!("Error clearing element {selector}"))?;
        self.post(
            &format!("/element/{element}/value"),
            json!({ "text": text }),
        )
        .await
        .with_context(|| format!("Error typing into element {selector}"))?;
        info!("Typed text into element: {selector}");
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> Option<Value> {
        match self
            .post("/execute/sync", json!({ "script": script, "args": [] }))
            .await
        {
            Ok(body) => body.pointer("/value").cloned(),
            Err(e) => {
                error!("Error evaluating script: {e}");
                None
            }
        }
    }
}
