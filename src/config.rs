use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::controller::Timings;

const DEFAULT_ENV_PREFIX: &str = "LINKSEEK";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ui: UIConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Transport timeout; absent means a request waits for its response.
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: None,
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_user_agent() -> String {
    format!("linkseek/{}", crate::VERSION)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UIConfig {
    #[serde(default = "default_copy_feedback", with = "humantime_serde")]
    pub copy_feedback: Duration,
    #[serde(default = "default_add_feedback", with = "humantime_serde")]
    pub add_feedback: Duration,
    #[serde(default = "default_message_timeout", with = "humantime_serde")]
    pub message_timeout: Duration,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            copy_feedback: default_copy_feedback(),
            add_feedback: default_add_feedback(),
            message_timeout: default_message_timeout(),
        }
    }
}

impl UIConfig {
    pub fn timings(&self) -> Timings {
        Timings {
            copy_feedback: self.copy_feedback,
            add_feedback: self.add_feedback,
            message_timeout: self.message_timeout,
        }
    }
}

fn default_copy_feedback() -> Duration {
    Duration::from_secs(2)
}

fn default_add_feedback() -> Duration {
    Duration::from_secs(3)
}

fn default_message_timeout() -> Duration {
    Duration::from_secs(5)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            level: default_log_level(),
        }
    }
}

fn default_log_file() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("linkseek").join("linkseek.log"))
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.server.base_url.trim().is_empty() {
        base.server.base_url = other.server.base_url;
    }
    if other.server.timeout.is_some() {
        base.server.timeout = other.server.timeout;
    }
    if !other.server.user_agent.trim().is_empty() {
        base.server.user_agent = other.server.user_agent;
    }

    base.ui = other.ui;

    // A missing key already carries the default; an explicit null turns
    // file logging off.
    base.logging.file = other.logging.file;
    if !other.logging.level.is_empty() {
        base.logging.level = other.logging.level;
    }

    base
}

fn apply_env(cfg: &mut Config, prefix: &str) {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    for (key, value) in map {
        apply_env_value(cfg, &key, value);
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    let duration = |raw: &str| humantime::parse_duration(raw).ok();
    match key {
        "server.base_url" => cfg.server.base_url = value,
        "server.user_agent" => cfg.server.user_agent = value,
        "server.timeout" => {
            if let Some(parsed) = duration(&value) {
                cfg.server.timeout = Some(parsed);
            }
        }
        "ui.copy_feedback" => {
            if let Some(parsed) = duration(&value) {
                cfg.ui.copy_feedback = parsed;
            }
        }
        "ui.add_feedback" => {
            if let Some(parsed) = duration(&value) {
                cfg.ui.add_feedback = parsed;
            }
        }
        "ui.message_timeout" => {
            if let Some(parsed) = duration(&value) {
                cfg.ui.message_timeout = parsed;
            }
        }
        "logging.file" => cfg.logging.file = Some(PathBuf::from(value)),
        "logging.level" => cfg.logging.level = value,
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("linkseek").join("config.yaml"))
}
