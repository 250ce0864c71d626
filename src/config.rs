use crate::calendar::{CalendarStore, MemoryStore, SqliteStore};
use crate::error::{ConfigError, StoreError};
use crate::llm::chat_client::{DEFAULT_ENDPOINT, DEFAULT_MODEL};
use crate::llm::{ChatCompletionsProvider, CompletionProvider, OllamaProvider, ProviderChain};
use crate::planner::AssistantSettings;
use chrono::FixedOffset;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

static OFFSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([+-])(\d{1,2})(?::?(\d{2}))?$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

/// Runtime configuration. Later layers override earlier ones:
/// defaults, then the TOML file, then the environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fixed UTC offset, e.g. "+05:30".
    pub time_zone: String,
    pub provider_timeout_secs: u64,
    pub ollama_enabled: bool,
    pub ollama_url: String,
    pub ollama_model: String,
    pub chat_endpoint: String,
    pub chat_model: String,
    #[serde(skip)]
    pub chat_token: Option<String>,
    pub store: StoreBackend,
    pub database_url: String,
    pub socket_path: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub upcoming_days: i64,
    pub max_plan_events: usize,
    pub delete_confirmation_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            time_zone: "+05:30".to_string(),
            provider_timeout_secs: 60,
            ollama_enabled: true,
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "qwen2.5:7b".to_string(),
            chat_endpoint: DEFAULT_ENDPOINT.to_string(),
            chat_model: DEFAULT_MODEL.to_string(),
            chat_token: None,
            store: StoreBackend::Sqlite,
            database_url: "sqlite:almanac.db".to_string(),
            socket_path: None,
            log_dir: None,
            upcoming_days: 7,
            max_plan_events: 5,
            delete_confirmation_threshold: 5,
        }
    }
}

/// Parses "+05:30", "-0800", "+9", "Z" or "UTC".
pub fn parse_offset(value: &str) -> Result<FixedOffset, ConfigError> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return Ok(FixedOffset::east_opt(0).unwrap());
    }

    let invalid = || ConfigError::InvalidTimeZone(value.to_string());
    let caps = OFFSET.captures(value).ok_or_else(invalid)?;

    let hours: i32 = caps[2].parse().map_err(|_| invalid())?;
    let minutes: i32 = caps
        .get(3)
        .map_or(Ok(0), |m| m.as_str().parse())
        .map_err(|_| invalid())?;
    if hours > 14 || minutes >= 60 {
        return Err(invalid());
    }

    let seconds = (hours * 3600 + minutes * 60) * if &caps[1] == "-" { -1 } else { 1 };
    FixedOffset::east_opt(seconds).ok_or_else(invalid)
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

impl Config {
    /// Builds the layered configuration. Paths are used exactly as given.
    pub fn load(config_path: Option<&Path>, env_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(path) = env_file {
            dotenvy::from_path(path).map_err(|e| ConfigError::EnvFile {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        }

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Applies `ALMANAC_*` overrides and the chat token from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("ALMANAC_TIME_ZONE") {
            self.time_zone = v;
        }
        if let Some(v) = get("ALMANAC_TIMEOUT_SECS") {
            self.provider_timeout_secs = parse_value("ALMANAC_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("ALMANAC_OLLAMA_ENABLED") {
            self.ollama_enabled = parse_flag("ALMANAC_OLLAMA_ENABLED", &v)?;
        }
        if let Some(v) = get("ALMANAC_OLLAMA_URL") {
            self.ollama_url = v;
        }
        if let Some(v) = get("ALMANAC_OLLAMA_MODEL") {
            self.ollama_model = v;
        }
        if let Some(v) = get("ALMANAC_CHAT_ENDPOINT") {
            self.chat_endpoint = v;
        }
        if let Some(v) = get("ALMANAC_CHAT_MODEL") {
            self.chat_model = v;
        }
        if let Some(v) = get("ALMANAC_STORE") {
            self.store = match v.trim().to_lowercase().as_str() {
                "sqlite" => StoreBackend::Sqlite,
                "memory" => StoreBackend::Memory,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "ALMANAC_STORE".to_string(),
                        value: v.clone(),
                    });
                }
            };
        }
        if let Some(v) = get("ALMANAC_DATABASE_URL") {
            self.database_url = v;
        }
        if let Some(v) = get("ALMANAC_SOCKET") {
            self.socket_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("ALMANAC_LOG_DIR") {
            self.log_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("ALMANAC_UPCOMING_DAYS") {
            self.upcoming_days = parse_value("ALMANAC_UPCOMING_DAYS", &v)?;
        }

        if let Some(token) = get("GITHUB_TOKEN").or_else(|| get("OPENAI_API_KEY")) {
            self.chat_token = Some(token);
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_offset(&self.time_zone)?;

        if self.provider_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "provider_timeout_secs".to_string(),
                value: "0".to_string(),
            });
        }
        if self.upcoming_days < 1 {
            return Err(ConfigError::InvalidValue {
                key: "upcoming_days".to_string(),
                value: self.upcoming_days.to_string(),
            });
        }
        if self.ollama_enabled && self.ollama_model.trim().is_empty() {
            return Err(ConfigError::Missing("ollama_model"));
        }
        if self.chat_model.trim().is_empty() {
            return Err(ConfigError::Missing("chat_model"));
        }
        if self.store == StoreBackend::Sqlite && self.database_url.trim().is_empty() {
            return Err(ConfigError::Missing("database_url"));
        }

        Ok(())
    }

    pub fn time_zone(&self) -> Result<FixedOffset, ConfigError> {
        parse_offset(&self.time_zone)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn socket_path(&self) -> PathBuf {
        self.socket_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("almanac.sock"))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("almanac"))
    }

    pub fn settings(&self) -> Result<AssistantSettings, ConfigError> {
        Ok(AssistantSettings {
            time_zone: self.time_zone()?,
            upcoming_days: self.upcoming_days,
            max_plan_events: self.max_plan_events,
            delete_confirmation_threshold: self.delete_confirmation_threshold,
        })
    }

    pub async fn build_store(&self) -> Result<Arc<dyn CalendarStore>, StoreError> {
        match self.store {
            StoreBackend::Sqlite => Ok(Arc::new(SqliteStore::open(&self.database_url).await?)),
            StoreBackend::Memory => {
                warn!("using in-memory calendar, events are lost on exit");
                Ok(Arc::new(MemoryStore::new()))
            }
        }
    }

    /// The chat provider goes first when a token is set. Ollama is only
    /// added if it answers a health check.
    pub async fn build_providers(&self) -> ProviderChain {
        let mut providers: Vec<Arc<dyn CompletionProvider>> = Vec::new();

        if let Some(token) = &self.chat_token {
            providers.push(Arc::new(ChatCompletionsProvider::new(
                &self.chat_endpoint,
                &self.chat_model,
                token,
            )));
        }

        if self.ollama_enabled {
            let ollama = OllamaProvider::new(&self.ollama_url, &self.ollama_model);
            if ollama.health_check().await {
                providers.push(Arc::new(ollama));
            } else {
                warn!(url = %self.ollama_url, "ollama not reachable, skipping");
            }
        }

        let chain = ProviderChain::new(providers, self.provider_timeout());
        if chain.is_empty() {
            warn!("no completion provider available, running on rules only");
        } else {
            info!(providers = ?chain.names(), "completion providers ready");
        }
        chain
    }
}
