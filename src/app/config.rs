use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app::bridge::locator::resolve_bridge_program;
use crate::app::error::BridgeError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    /// Install directory of the bridge tool; every command session starts
    /// its shell here.
    #[serde(default)]
    pub bridge_dir: String,
    /// Bridge executable; empty means `adb` on PATH.
    #[serde(default)]
    pub bridge_command: String,
    /// Minimum file count expected in a complete bridge install.
    #[serde(default = "default_expected_tool_files")]
    pub expected_tool_files: u64,
    #[serde(default = "default_true")]
    pub prompt_on_error: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_expected_tool_files() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bridge_dir: String::new(),
            bridge_command: String::new(),
            expected_tool_files: default_expected_tool_files(),
            prompt_on_error: true,
            log_level: default_log_level(),
        }
    }
}

impl BridgeConfig {
    pub fn bridge_program(&self) -> String {
        resolve_bridge_program(&self.bridge_command)
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("DROIDBRIDGE_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".droidbridge_config.json")
}

pub fn backup_config_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".droidbridge_config.backup.json")
}

pub fn load_config() -> Result<BridgeConfig, BridgeError> {
    load_config_from_path(&config_path())
}

pub fn save_config(config: &BridgeConfig) -> Result<(), BridgeError> {
    save_config_to_path(config, &config_path(), &backup_config_path())
}

pub fn load_config_from_path(path: &Path) -> Result<BridgeConfig, BridgeError> {
    if !path.exists() {
        return Ok(BridgeConfig::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| BridgeError::system(format!("Failed to read config: {err}"), ""))?;
    let config: BridgeConfig = serde_json::from_str(&raw)
        .map_err(|err| BridgeError::system(format!("Failed to parse config: {err}"), ""))?;
    Ok(validate_config(config))
}

pub fn save_config_to_path(
    config: &BridgeConfig,
    path: &Path,
    backup_path: &Path,
) -> Result<(), BridgeError> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if path.exists() {
        let _ = fs::copy(path, backup_path);
    }
    let payload = serde_json::to_string_pretty(config)
        .map_err(|err| BridgeError::system(format!("Failed to serialize config: {err}"), ""))?;
    fs::write(path, payload)
        .map_err(|err| BridgeError::system(format!("Failed to write config: {err}"), ""))?;
    Ok(())
}

fn validate_config(mut config: BridgeConfig) -> BridgeConfig {
    if config.expected_tool_files == 0 {
        config.expected_tool_files = default_expected_tool_files();
    }
    let level = config.log_level.trim().to_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => config.log_level = level,
        _ => config.log_level = default_log_level(),
    }
    config
}

/// Sanity check required before any command session opens: the bridge
/// install directory must exist and hold at least the expected number of
/// files (a partial first-run extraction would otherwise fail later with
/// confusing shell errors).
pub fn verify_install(config: &BridgeConfig, trace_id: &str) -> Result<(), BridgeError> {
    let dir = Path::new(&config.bridge_dir);
    if config.bridge_dir.trim().is_empty() || !dir.is_dir() {
        return Err(BridgeError::validation(
            format!("Bridge install directory not found: {}", config.bridge_dir),
            trace_id,
        ));
    }
    let file_count = fs::read_dir(dir)
        .map_err(|err| {
            BridgeError::system(
                format!("Failed to inspect bridge install directory: {err}"),
                trace_id,
            )
        })?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .count() as u64;
    if file_count < config.expected_tool_files {
        return Err(BridgeError::validation(
            format!(
                "Bridge install looks incomplete: {file_count} files, expected at least {}",
                config.expected_tool_files
            ),
            trace_id,
        ));
    }
    Ok(())
}
