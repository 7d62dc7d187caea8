
use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One installable input method as advertised to the helper daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputMethodInfo {
    pub name: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub description: String,
}

impl InputMethodInfo {
    pub fn new(name: &str, language: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            language: language.to_string(),
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub helper: HelperConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_input_methods")]
    pub input_methods: Vec<InputMethodInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelperConfig {
    pub socket_path: Option<String>, // If None, uses the helper daemon's default location
    #[serde(default = "default_auto_spawn")]
    pub auto_spawn: bool,
    #[serde(default = "default_server_command")]
    pub server_command: String,
    #[serde(default = "default_spawn_cooldown_secs")]
    pub spawn_cooldown_secs: u64,
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_file_enabled")]
    pub file_enabled: bool,
    pub file_path: Option<String>, // If None, uses default ~/.imhelper/logs/
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            helper: HelperConfig::default(),
            logging: LoggingConfig::default(),
            input_methods: default_input_methods(),
        }
    }
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            auto_spawn: default_auto_spawn(),
            server_command: default_server_command(),
            spawn_cooldown_secs: default_spawn_cooldown_secs(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_enabled: default_file_enabled(),
            file_path: None,
        }
    }
}

impl HelperConfig {
    pub fn spawn_cooldown(&self) -> Duration {
        Duration::from_secs(self.spawn_cooldown_secs)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}

impl BridgeConfig {
    pub async fn load() -> Result<Self> {
        let config_path = get_config_path()?;
        Self::load_from_path(&config_path).await
    }

    pub async fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }

    pub async fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| BridgeError::ConfigError(format!("Failed to serialize config: {e}")))?;

        tokio::fs::write(path, content).await?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.helper.reconnect_interval_ms == 0 {
            return Err(BridgeError::ConfigError(
                "Reconnect interval must be greater than 0".to_string(),
            ));
        }

        if self.helper.auto_spawn
            && shlex::split(&self.helper.server_command).is_none_or(|argv| argv.is_empty())
        {
            return Err(BridgeError::ConfigError(format!(
                "Invalid helper server command: {}",
                self.helper.server_command
            )));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(BridgeError::ConfigError(format!(
                "Invalid logging level: {}",
                self.logging.level
            )));
        }

        let mut seen = HashSet::new();
        for input_method in &self.input_methods {
            if input_method.name.is_empty() {
                return Err(BridgeError::ConfigError(
                    "Input method name must not be empty".to_string(),
                ));
            }
            if input_method.name.contains(['\t', '\n']) {
                return Err(BridgeError::ConfigError(format!(
                    "Input method name contains a tab or newline: {:?}",
                    input_method.name
                )));
            }
            if !seen.insert(input_method.name.as_str()) {
                return Err(BridgeError::ConfigError(format!(
                    "Duplicate input method: {}",
                    input_method.name
                )));
            }
        }

        Ok(())
    }

    pub fn resolve_socket_path(&self) -> PathBuf {
        match &self.helper.socket_path {
            Some(path) => PathBuf::from(path),
            None => default_socket_path(),
        }
    }

    pub fn get_log_dir(&self) -> PathBuf {
        match &self.logging.file_path {
            Some(path) => PathBuf::from(path),
            None => {
                let config_dir = get_config_dir().unwrap_or_else(|_| PathBuf::from(".imhelper"));
                config_dir.join("logs")
            }
        }
    }
}

pub fn get_config_dir() -> Result<PathBuf> {
    let home_dir = std::env::var("HOME")
        .map_err(|_| BridgeError::ConfigError("Could not determine home directory".to_string()))?;

    Ok(PathBuf::from(home_dir).join(".imhelper"))
}

pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.toml"))
}

/// Where the helper daemon listens when nothing overrides it
pub fn default_socket_path() -> PathBuf {
    let base = match std::env::var("XDG_RUNTIME_DIR") {
        Ok(runtime_dir) if !runtime_dir.is_empty() => PathBuf::from(runtime_dir).join("uim"),
        _ => {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".uim.d")
        }
    };

    base.join("socket").join("uim-helper")
}

// Default value functions for serde
fn default_auto_spawn() -> bool {
    true
}
fn default_server_command() -> String {
    "uim-helper-server".to_string()
}
fn default_spawn_cooldown_secs() -> u64 {
    5
}
fn default_reconnect_interval_ms() -> u64 {
    2000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_file_enabled() -> bool {
    false
}
fn default_input_methods() -> Vec<InputMethodInfo> {
    vec![InputMethodInfo::new("direct", "", "Direct input")]
}
