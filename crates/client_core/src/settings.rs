use std::{fs, time::Duration};

use shared::domain::WhiteboardId;
use thiserror::Error;
use toml::{Table, Value};
use tracing::warn;
use url::Url;

pub const SETTINGS_FILE: &str = "whiteboard.toml";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
/// The backend seeds exactly one whiteboard with this id.
pub const DEFAULT_WHITEBOARD_ID: WhiteboardId = WhiteboardId(1);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("invalid api base url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("unsupported api base url scheme '{0}', expected http or https")]
    UnsupportedScheme(String),
    #[error("{SETTINGS_FILE} is not valid toml: {0}")]
    File(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub whiteboard_id: WhiteboardId,
    /// No timeout when unset: a hung call keeps its loading state forever.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            whiteboard_id: DEFAULT_WHITEBOARD_ID,
            request_timeout: None,
        }
    }
}

pub fn load_settings() -> Result<ClientSettings, SettingsError> {
    let raw = fs::read_to_string(SETTINGS_FILE).ok();
    load_settings_from(raw.as_deref(), |key| std::env::var(key).ok())
}

/// Defaults, then the flat `whiteboard.toml` table, then environment
/// overrides. Numbers may be written bare or quoted; unparseable ones keep
/// the previous value.
pub fn load_settings_from(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ClientSettings, SettingsError> {
    let mut settings = ClientSettings::default();

    if let Some(raw) = file {
        let file_cfg: Table =
            toml::from_str(raw).map_err(|err| SettingsError::File(err.message().to_string()))?;
        if let Some(v) = file_value(&file_cfg, "api_base_url") {
            settings.api_base_url = v;
        }
        if let Some(v) = file_value(&file_cfg, "whiteboard_id") {
            apply_whiteboard_id(&mut settings, &v);
        }
        if let Some(v) = file_value(&file_cfg, "request_timeout_secs") {
            apply_timeout(&mut settings, &v);
        }
    }

    if let Some(v) = env("WHITEBOARD_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("APP__WHITEBOARD_ID") {
        apply_whiteboard_id(&mut settings, &v);
    }
    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        apply_timeout(&mut settings, &v);
    }

    settings.api_base_url = normalize_api_base_url(&settings.api_base_url)?;
    Ok(settings)
}

fn file_value(table: &Table, key: &str) -> Option<String> {
    match table.get(key)? {
        Value::String(v) => Some(v.clone()),
        Value::Integer(v) => Some(v.to_string()),
        other => {
            warn!(key, kind = other.type_str(), "ignoring settings value");
            None
        }
    }
}

fn apply_whiteboard_id(settings: &mut ClientSettings, raw: &str) {
    if let Ok(parsed) = raw.trim().parse::<i64>() {
        settings.whiteboard_id = WhiteboardId(parsed);
    }
}

fn apply_timeout(settings: &mut ClientSettings, raw: &str) {
    if let Ok(parsed) = raw.trim().parse::<u64>() {
        settings.request_timeout = (parsed > 0).then(|| Duration::from_secs(parsed));
    }
}

pub fn normalize_api_base_url(raw: &str) -> Result<String, SettingsError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(DEFAULT_API_BASE_URL.to_string());
    }

    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };

    let url = Url::parse(&candidate).map_err(|err| SettingsError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(SettingsError::UnsupportedScheme(other.to_string())),
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
