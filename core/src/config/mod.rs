use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

const RONDO_DIR: &str = ".rondo";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub api_key: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-sonnet-20240229".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            api_key: std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BrowserBackend {
    Cdp,
    Webdriver,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub backend: BrowserBackend,
    pub headless: bool,
    pub timeout_ms: u64,
    pub webdriver_url: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            backend: BrowserBackend::Cdp,
            headless: true,
            timeout_ms: 30_000,
            webdriver_url: "http://127.0.0.1:4444".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub description: String,
    pub max_iterations: usize,
    pub memory_size: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "rondo".to_string(),
            description: "an assistant that helps with browsing and programming tasks"
                .to_string(),
            max_iterations: 10,
            memory_size: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 54656,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub browser: BrowserConfig,
    pub agent: AgentConfig,
    pub server: ServerConfig,
}

impl Config {
    pub fn load_or_default() -> Result<Self> {
        if config_exists() {
            load_config()
        } else {
            Ok(Config::default())
        }
    }

    /// Read a value by dotted path, e.g. `get("server.port")`. Unknown
    /// paths return `None` rather than failing.
    pub fn get(&self, path: &str) -> Option<Value> {
        let mut value = serde_json::to_value(self).ok()?;
        for key in path.split('.') {
            value = value.get(key)?.clone();
        }
        Some(value)
    }

    /// Update a value by dotted path, e.g. `set("server.port", 9000)`.
    pub fn set(&mut self, path: &str, new_value: impl Into<Value>) -> Result<()> {
        let mut root = serde_json::to_value(&*self)
            .with_context(|| "Failed to serialize config for update")?;

        let keys: Vec<&str> = path.split('.').collect();
        let (last, parents) = keys
            .split_last()
            .with_context(|| "Empty config path")?;

        let mut target = &mut root;
        for key in parents {
            target = target
                .as_object_mut()
                .with_context(|| format!("Config path '{path}' does not address an object"))?
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
        }
        target
            .as_object_mut()
            .with_context(|| format!("Config path '{path}' does not address an object"))?
            .insert(last.to_string(), new_value.into());

        *self = serde_json::from_value(root)
            .with_context(|| format!("Invalid value for config path '{path}'"))?;
        Ok(())
    }
}

pub fn get_rondo_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(RONDO_DIR)
}

pub fn get_config_path() -> PathBuf {
    get_rondo_dir().join("config.toml")
}

pub fn ensure_rondo_dir() -> Result<PathBuf> {
    let rondo_dir = get_rondo_dir();

    if !rondo_dir.exists() {
        std::fs::create_dir_all(&rondo_dir).with_context(|| {
            format!(
                "Failed to create rondo directory at {}",
                rondo_dir.display()
            )
        })?;
    }

    Ok(rondo_dir)
}

pub fn load_config() -> Result<Config> {
    let config_path = get_config_path();

    let content = std::fs::read_to_string(&config_path).with_context(|| {
        format!("Failed to read config from {}", config_path.display())
    })?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", config_path.display()))?;

    Ok(config)
}

pub fn save_config(config: &Config) -> Result<()> {
    ensure_rondo_dir()?;

    let config_path = get_config_path();
    let content =
        toml::to_string_pretty(config).with_context(|| "Failed to serialize config to TOML")?;

    std::fs::write(&config_path, content)
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    Ok(())
}

pub fn config_exists() -> bool {
    get_config_path().exists()
}
