//! 配置文件加载
//!
//! 默认读取 `config.toml`，`UPLINK_ENDPOINT` / `UPLINK_TOKEN` 环境变量优先。

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use serde::Deserialize;
use thiserror::Error;
use url::Url;
use crate::auth::AuthSession;
use crate::core::{UploadMode, UploadOperation, DEFAULT_CHUNK_SIZE};
use crate::session::SessionConfig;
use crate::transport::{HttpTransportConfig, DEFAULT_UPLOAD_TIMEOUT};
use crate::utils::retry::RetryBuilder;

pub const ENDPOINT_ENV: &str = "UPLINK_ENDPOINT";
pub const TOKEN_ENV: &str = "UPLINK_TOKEN";

static CONFIG: OnceLock<Config> = OnceLock::new();

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModeSetting {
    #[default]
    Normal,
    Chunked,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_UPLOAD_TIMEOUT.as_secs()
}

fn default_max_attempts() -> u32 {
    1
}

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub endpoint: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub mode: ModeSetting,
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub file_path: Option<PathBuf>,
    #[serde(default)]
    pub operation: Option<UploadOperation>,
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(s)?;
        config.validated()
    }
}

impl Config {
    /// 读取配置文件并应用环境变量覆盖
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let config_str = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: Config = toml::from_str(&config_str)?;
        config.apply_overrides(
            std::env::var(ENDPOINT_ENV).ok(),
            std::env::var(TOKEN_ENV).ok(),
        );
        config.validated()
    }

    fn apply_overrides(&mut self, endpoint: Option<String>, token: Option<String>) {
        if let Some(endpoint) = endpoint.filter(|e| !e.trim().is_empty()) {
            self.endpoint = endpoint;
        }
        if let Some(token) = token {
            self.token = Some(token);
        }
    }

    fn validated(self) -> Result<Self, ConfigError> {
        self.endpoint_url()?;
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be greater than 0".to_string()));
        }
        if self.chunk_size == Some(0) {
            return Err(ConfigError::Invalid("chunk_size must be greater than 0".to_string()));
        }
        Ok(self)
    }

    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.endpoint)
            .map_err(|err| ConfigError::Invalid(format!("endpoint '{}': {}", self.endpoint, err)))?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ConfigError::Invalid(format!("unsupported endpoint scheme '{}'", scheme))),
        }
    }

    pub fn upload_mode(&self) -> UploadMode {
        match self.mode {
            ModeSetting::Normal => UploadMode::Normal,
            ModeSetting::Chunked => UploadMode::Chunked {
                chunk_size: self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            },
        }
    }

    pub fn auth(&self) -> AuthSession {
        match &self.token {
            Some(token) => AuthSession::with_token(token.as_str()),
            None => AuthSession::anonymous(),
        }
    }

    pub fn transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            ..HttpTransportConfig::default()
        }
    }

    pub fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        let retry = RetryBuilder::new().max_attempts(self.max_attempts).build();

        Ok(SessionConfig::new(self.endpoint_url()?)
            .with_auth(self.auth())
            .with_mode(self.upload_mode())
            .with_retry(retry))
    }
}

/// 加载并缓存全局配置，只在第一次调用时读取文件
pub fn init_config(path: impl AsRef<Path>) -> Result<&'static Config, ConfigError> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }

    let config = Config::load(path)?;
    Ok(CONFIG.get_or_init(|| config))
}

pub fn get_config() -> Option<&'static Config> {
    CONFIG.get()
}
