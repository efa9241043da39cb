//! Operator configuration.
//!
//! A small JSON file names the engine command, the project to open, and
//! the manual-attention exemptions used when deriving stage statuses.
//! Every field is optional on disk; missing fields take defaults and CLI
//! flags override whatever the file says.
use crate::status::Exemptions;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Fallback source for the engine command.
pub const ENGINE_COMMAND_ENV: &str = "SCREENFLOW_ENGINE_COMMAND";

const DEFAULT_QUEUE_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScreenflowConfig {
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_timeout_secs: Option<u64>,
    #[serde(default = "default_queue_limit")]
    pub queue_limit: usize,
    #[serde(default)]
    pub exemptions: Exemptions,
}

fn default_queue_limit() -> usize {
    DEFAULT_QUEUE_LIMIT
}

impl ScreenflowConfig {
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ScreenflowConfig {
    fn default() -> Self {
        default_config()
    }
}

pub fn default_config() -> ScreenflowConfig {
    ScreenflowConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        engine_command: None,
        project_id: None,
        base_path: None,
        call_timeout_secs: None,
        queue_limit: DEFAULT_QUEUE_LIMIT,
        exemptions: Exemptions::standard(),
    }
}

/// `$XDG_CONFIG_HOME/screenflow/config.json` or the platform equivalent.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("screenflow").join("config.json"))
}

pub fn load_config(path: &Path) -> Result<ScreenflowConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: ScreenflowConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    validate_config(&config).with_context(|| format!("validate config {}", path.display()))?;
    Ok(config)
}

/// Load the explicit path, else the default path when present, else defaults.
pub fn resolve_config(explicit: Option<&Path>) -> Result<ScreenflowConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    match default_config_path() {
        Some(path) if path.is_file() => load_config(&path),
        _ => Ok(default_config()),
    }
}

pub fn write_config(path: &Path, config: &ScreenflowConfig) -> Result<()> {
    validate_config(config)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create config dir {}", parent.display()))?;
    }
    let text = serde_json::to_string_pretty(config).context("serialize config")?;
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn validate_config(config: &ScreenflowConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    if config.queue_limit == 0 {
        return Err(anyhow!("queue_limit must be greater than zero"));
    }
    if config.call_timeout_secs == Some(0) {
        return Err(anyhow!(
            "call_timeout_secs must be greater than zero (omit it to wait indefinitely)"
        ));
    }
    if let Some(command) = &config.engine_command {
        if command.trim().is_empty() {
            return Err(anyhow!("engine_command must not be empty"));
        }
    }
    config.exemptions.validate().context("invalid exemptions")?;
    Ok(())
}

/// Engine command by priority: explicit flag, config, then environment.
pub fn resolve_engine_command(
    explicit: Option<&str>,
    config: &ScreenflowConfig,
) -> Result<String> {
    resolve_engine_command_with(explicit, config, std::env::var(ENGINE_COMMAND_ENV).ok())
}

fn resolve_engine_command_with(
    explicit: Option<&str>,
    config: &ScreenflowConfig,
    env_value: Option<String>,
) -> Result<String> {
    explicit
        .map(str::to_string)
        .or_else(|| config.engine_command.clone())
        .or(env_value)
        .filter(|command| !command.trim().is_empty())
        .ok_or_else(|| {
            anyhow!("no engine command; pass --engine, set engine_command, or set {ENGINE_COMMAND_ENV}")
        })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
