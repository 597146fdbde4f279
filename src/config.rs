use crate::error::{LeadLabError, Result};
use leadlab_common::PageSize;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";
/// インポート進捗のポーリング間隔
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub api_token: Option<String>,
    pub default_page_size: PageSize,
    pub timeout_seconds: u64,
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_token: None,
            default_page_size: PageSize::Twenty,
            timeout_seconds: 30,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| LeadLabError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("leadlab").join("config.json"))
    }

    pub fn get_api_token(&self) -> Result<String> {
        // 環境変数を優先
        if let Ok(token) = std::env::var("LEADLAB_API_TOKEN") {
            if !token.trim().is_empty() {
                return Ok(token);
            }
        }

        self.api_token.clone().ok_or(LeadLabError::MissingToken)
    }

    /// 環境変数を優先。ファイルに保存される値は変えない
    pub fn get_base_url(&self) -> String {
        if let Ok(url) = std::env::var("LEADLAB_BASE_URL") {
            if !url.trim().is_empty() {
                return url;
            }
        }

        self.base_url.clone()
    }

    pub fn set_api_token(&mut self, token: String) -> Result<()> {
        self.api_token = Some(token);
        self.save()
    }

    pub fn set_base_url(&mut self, url: String) -> Result<()> {
        url::Url::parse(&url)
            .map_err(|e| LeadLabError::Config(format!("URLが不正です: {} ({})", url, e)))?;
        self.base_url = url;
        self.save()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
