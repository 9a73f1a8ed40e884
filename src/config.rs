use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Openrouter,
    Ollama,
    Openai,
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::Openrouter => write!(f, "openrouter"),
            LlmProvider::Ollama => write!(f, "ollama"),
            LlmProvider::Openai => write!(f, "openai"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    pub model: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Messages kept per conversation, system prompt excluded
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    /// Upper bound on one chat completion request
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// Returns the effective base_url: if the stored value is empty,
    /// fall back to the canonical URL for the configured provider.
    pub fn effective_base_url(&self) -> &str {
        if !self.base_url.is_empty() {
            return &self.base_url;
        }
        match self.provider {
            LlmProvider::Openrouter => "https://openrouter.ai/api/v1",
            LlmProvider::Ollama => "http://localhost:11434/v1",
            LlmProvider::Openai => "https://api.openai.com/v1",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    pub llm: Option<LlmConfig>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub idioms: IdiomsConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
}

/// The WeChat HTTP gateway the bot talks to
#[derive(Debug, Deserialize, Clone)]
pub struct BridgeConfig {
    pub base_url: String,
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub self_wxid: Option<String>,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RoutingConfig {
    /// Group ids the bot answers in; messages from other groups are ignored
    #[serde(default)]
    pub groups: Vec<String>,
    /// When set, group messages only reach commands if the bot is @-mentioned
    #[serde(default)]
    pub group_commands_require_mention: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProvidersConfig {
    #[serde(default = "default_pearktrue")]
    pub pearktrue: String,
    #[serde(default = "default_vvhan")]
    pub vvhan: String,
    #[serde(default = "default_cenguigui")]
    pub cenguigui: String,
    #[serde(default = "default_aa1")]
    pub aa1: String,
    #[serde(default = "default_lolimi")]
    pub lolimi: String,
    #[serde(default = "default_photos")]
    pub photos: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            pearktrue: default_pearktrue(),
            vvhan: default_vvhan(),
            cenguigui: default_cenguigui(),
            aa1: default_aa1(),
            lolimi: default_lolimi(),
            photos: default_photos(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProvidersConfig {
    /// Point every provider host at one base URL (used by tests against a mock server)
    #[cfg(test)]
    pub fn single_host(base: &str) -> Self {
        Self {
            pearktrue: base.to_string(),
            vvhan: base.to_string(),
            cenguigui: base.to_string(),
            aa1: base.to_string(),
            lolimi: base.to_string(),
            photos: base.to_string(),
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Resolved to an absolute path by `Config::load`, since replies hand
    /// these paths to the gateway process
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,
    /// Stored media older than this is deleted; 0 keeps everything
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
    #[serde(default = "default_cleanup_cron")]
    pub cleanup_cron: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            media_dir: default_media_dir(),
            retention_hours: default_retention_hours(),
            cleanup_cron: default_cleanup_cron(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionScope {
    /// One rank table per command family, shared by every chat
    Global,
    /// One rank table per (conversation, command family)
    #[default]
    Conversation,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default)]
    pub scope: SessionScope,
    #[serde(default = "default_session_capacity")]
    pub capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scope: SessionScope::default(),
            capacity: default_session_capacity(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IdiomsConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportsConfig {
    #[serde(default)]
    pub news_receivers: Vec<String>,
    #[serde(default)]
    pub weather_receivers: Vec<String>,
    #[serde(default = "default_news_cron")]
    pub news_cron: String,
    #[serde(default = "default_weather_cron")]
    pub weather_cron: String,
    #[serde(default = "default_news_board")]
    pub news_board: String,
    #[serde(default = "default_weather_city")]
    pub weather_city: String,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            news_receivers: Vec::new(),
            weather_receivers: Vec::new(),
            news_cron: default_news_cron(),
            weather_cron: default_weather_cron(),
            news_board: default_news_board(),
            weather_city: default_weather_city(),
        }
    }
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_system_prompt() -> String {
    "你是一个微信群里的聊天助手，回答简洁友好，不使用 Markdown。".to_string()
}

fn default_max_history() -> usize {
    20
}

fn default_llm_timeout_secs() -> u64 {
    60
}

fn default_listen() -> String {
    "127.0.0.1:10010".to_string()
}

fn default_queue_capacity() -> usize {
    64
}

fn default_pearktrue() -> String {
    "https://api.pearktrue.cn".to_string()
}

fn default_vvhan() -> String {
    "https://api.vvhan.com".to_string()
}

fn default_cenguigui() -> String {
    "https://api.cenguigui.cn".to_string()
}

fn default_aa1() -> String {
    "https://v.api.aa1.cn".to_string()
}

fn default_lolimi() -> String {
    "https://api.lolimi.cn".to_string()
}

fn default_photos() -> String {
    "https://3650000.xyz".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("media")
}

fn default_retention_hours() -> u64 {
    24
}

fn default_cleanup_cron() -> String {
    "0 0 * * * *".to_string()
}

fn default_session_capacity() -> usize {
    20
}

fn default_news_cron() -> String {
    "0 30 7 * * *".to_string()
}

fn default_weather_cron() -> String {
    "0 0 8 * * *".to_string()
}

fn default_news_board() -> String {
    "澎湃新闻".to_string()
}

fn default_weather_city() -> String {
    "北京".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config = Self::parse(&content)?;

        if !config.storage.media_dir.exists() {
            std::fs::create_dir_all(&config.storage.media_dir).with_context(|| {
                format!(
                    "Failed to create media directory: {}",
                    config.storage.media_dir.display()
                )
            })?;
        }
        config.storage.media_dir = std::fs::canonicalize(&config.storage.media_dir)
            .with_context(|| {
                format!(
                    "Failed to resolve media directory: {}",
                    config.storage.media_dir.display()
                )
            })?;

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;
        if config.session.capacity == 0 {
            anyhow::bail!("[session] capacity must be at least 1");
        }
        Ok(config)
    }
}
