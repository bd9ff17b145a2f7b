use std::{fs, io, time::Duration};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::policy::RequestPolicy;

pub const SETTINGS_FILE: &str = "po_match.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub log_filter: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api".into(),
            request_timeout_secs: 30,
            log_filter: "info".into(),
        }
    }
}

impl ClientSettings {
    pub fn request_policy(&self) -> RequestPolicy {
        RequestPolicy::with_timeout(Duration::from_secs(self.request_timeout_secs.max(1)))
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    log_filter: Option<String>,
}

/// Defaults, then `po_match.toml` in the working directory, then environment.
pub fn load_settings() -> Result<ClientSettings> {
    let raw = match fs::read_to_string(SETTINGS_FILE) {
        Ok(raw) => Some(raw),
        Err(err) if err.kind() == io::ErrorKind::NotFound => None,
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {SETTINGS_FILE}"));
        }
    };
    resolve_settings(raw.as_deref(), |key| std::env::var(key).ok())
}

pub fn resolve_settings(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ClientSettings> {
    let mut settings = ClientSettings::default();

    if let Some(raw) = file {
        let file_cfg: FileSettings =
            toml::from_str(raw).with_context(|| format!("invalid {SETTINGS_FILE}"))?;
        if let Some(v) = file_cfg.api_base_url {
            settings.api_base_url = v;
        }
        if let Some(v) = file_cfg.request_timeout_secs {
            settings.request_timeout_secs = v;
        }
        if let Some(v) = file_cfg.log_filter {
            settings.log_filter = v;
        }
    }

    if let Some(v) = env("PO_MATCH_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        match v.trim().parse::<u64>() {
            Ok(parsed) => settings.request_timeout_secs = parsed,
            Err(_) => warn!(value = %v, "ignoring non-numeric APP__REQUEST_TIMEOUT_SECS"),
        }
    }

    if let Some(v) = env("RUST_LOG") {
        settings.log_filter = v;
    }
    if let Some(v) = env("APP__LOG_FILTER") {
        settings.log_filter = v;
    }

    settings.api_base_url = normalize_api_base_url(&settings.api_base_url);
    Ok(settings)
}

pub fn normalize_api_base_url(raw: &str) -> String {
    let raw = raw.trim().trim_end_matches('/');

    if raw.is_empty() {
        return ClientSettings::default().api_base_url;
    }

    if raw.contains("://") {
        return raw.to_string();
    }

    format!("http://{raw}")
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
