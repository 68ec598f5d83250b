use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::io::ConfigError;
use crate::core::controller::ControllerSettings;
use crate::core::progress::DEFAULT_TICK_INTERVAL;
use crate::ui::renderer::RendererKind;
use crate::ui::view::OutputFormat;
use crate::utils::url::{canonical_server_url, normalize_base_url};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";
pub const SERVER_URL_ENV_VAR: &str = "BLUECHAT_SERVER_URL";

/// Settings stored in `config.toml`. Unset keys fall back to defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renderer: Option<RendererKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_tool_details: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_tick_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    ServerUrl,
    Renderer,
    ShowToolDetails,
    ProgressTickMs,
    Output,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 5] = [
        ConfigKey::ServerUrl,
        ConfigKey::Renderer,
        ConfigKey::ShowToolDetails,
        ConfigKey::ProgressTickMs,
        ConfigKey::Output,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::ServerUrl => "server_url",
            ConfigKey::Renderer => "renderer",
            ConfigKey::ShowToolDetails => "show_tool_details",
            ConfigKey::ProgressTickMs => "progress_tick_ms",
            ConfigKey::Output => "output",
        }
    }

    /// Accepts `snake_case` and `kebab-case` spellings.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        let normalized = name.trim().replace('-', "_").to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == normalized)
            .ok_or_else(|| ConfigError::UnknownKey(name.to_string()))
    }
}

impl Config {
    pub fn renderer_kind(&self) -> RendererKind {
        self.renderer.unwrap_or_default()
    }

    pub fn show_tool_details(&self) -> bool {
        self.show_tool_details.unwrap_or(true)
    }

    pub fn tick_interval(&self) -> Duration {
        self.progress_tick_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TICK_INTERVAL)
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output.unwrap_or_default()
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            show_tool_details: self.show_tool_details(),
            tick_interval: self.tick_interval(),
        }
    }

    /// Server URL with precedence flag > environment > file > default.
    ///
    /// An address that does not parse is passed through trimmed so the first
    /// request reports it.
    pub fn resolve_server_url(&self, flag: Option<&str>, env: Option<String>) -> String {
        let chosen = flag
            .map(str::to_string)
            .or_else(|| env.filter(|value| !value.trim().is_empty()))
            .or_else(|| self.server_url.clone())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        canonical_server_url(&chosen).unwrap_or_else(|err| {
            warn!(url = %chosen, error = %err, "server URL does not parse");
            normalize_base_url(&chosen)
        })
    }

    pub fn set(&mut self, key: ConfigKey, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        let invalid = |expected: &str| ConfigError::InvalidValue {
            key: key.as_str().to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        };

        match key {
            ConfigKey::ServerUrl => {
                let url = canonical_server_url(value)
                    .map_err(|_| invalid("an http(s) URL such as http://127.0.0.1:8000"))?;
                self.server_url = Some(url);
            }
            ConfigKey::Renderer => {
                self.renderer =
                    Some(RendererKind::parse(value).ok_or_else(|| invalid("rich or fallback"))?);
            }
            ConfigKey::ShowToolDetails => {
                self.show_tool_details = Some(parse_bool(value).ok_or_else(|| invalid("on or off"))?);
            }
            ConfigKey::ProgressTickMs => {
                let ms = value
                    .parse::<u64>()
                    .ok()
                    .filter(|ms| *ms > 0)
                    .ok_or_else(|| invalid("a positive number of milliseconds"))?;
                self.progress_tick_ms = Some(ms);
            }
            ConfigKey::Output => {
                self.output = Some(OutputFormat::parse(value).ok_or_else(|| invalid("text or html"))?);
            }
        }
        Ok(())
    }

    pub fn unset(&mut self, key: ConfigKey) {
        match key {
            ConfigKey::ServerUrl => self.server_url = None,
            ConfigKey::Renderer => self.renderer = None,
            ConfigKey::ShowToolDetails => self.show_tool_details = None,
            ConfigKey::ProgressTickMs => self.progress_tick_ms = None,
            ConfigKey::Output => self.output = None,
        }
    }

    /// Effective value of `key` and whether it comes from the file.
    pub fn display_value(&self, key: ConfigKey) -> (String, bool) {
        match key {
            ConfigKey::ServerUrl => (
                self.server_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
                self.server_url.is_some(),
            ),
            ConfigKey::Renderer => (
                self.renderer_kind().as_str().to_string(),
                self.renderer.is_some(),
            ),
            ConfigKey::ShowToolDetails => (
                if self.show_tool_details() { "on" } else { "off" }.to_string(),
                self.show_tool_details.is_some(),
            ),
            ConfigKey::ProgressTickMs => (
                self.tick_interval().as_millis().to_string(),
                self.progress_tick_ms.is_some(),
            ),
            ConfigKey::Output => (
                self.output_format().as_str().to_string(),
                self.output.is_some(),
            ),
        }
    }

    pub fn describe(&self) -> String {
        ConfigKey::ALL
            .iter()
            .map(|key| {
                let (value, explicit) = self.display_value(*key);
                let suffix = if explicit { "" } else { " (default)" };
                format!("  {}: {value}{suffix}", key.as_str())
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Display a path with the home directory shortened to `~`.
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
