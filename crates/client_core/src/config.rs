use std::{fs, path::Path, time::Duration};

use anyhow::{anyhow, Context};
use serde::Deserialize;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: String,
    pub typing_quiet_window_ms: u64,
    pub request_timeout_secs: u64,
    pub event_channel_capacity: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080".into(),
            typing_quiet_window_ms: 3000,
            request_timeout_secs: 30,
            event_channel_capacity: 256,
        }
    }
}

impl ClientSettings {
    pub fn quiet_window(&self) -> Duration {
        Duration::from_millis(self.typing_quiet_window_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Live channel endpoint derived from the durable API base url.
    pub fn websocket_url(&self) -> anyhow::Result<Url> {
        let mut url = Url::parse(&self.server_url)
            .with_context(|| format!("invalid server url '{}'", self.server_url))?;
        let scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => return Err(anyhow!("unsupported server url scheme '{other}'")),
        };
        url.set_scheme(scheme)
            .map_err(|_| anyhow!("cannot switch '{}' to {scheme}", self.server_url))?;
        url.set_path("/ws");
        Ok(url)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    server_url: Option<String>,
    typing_quiet_window_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
    event_channel_capacity: Option<usize>,
}

pub fn load_settings() -> ClientSettings {
    let mut settings = load_settings_from(Path::new(DEFAULT_CONFIG_FILE));
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

pub fn load_settings_from(path: &Path) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<FileConfig>(&raw) {
            Ok(file_cfg) => apply_file_config(&mut settings, file_cfg),
            Err(err) => {
                tracing::warn!(path = %path.display(), "ignoring unreadable client config: {err}")
            }
        }
    }

    settings
}

fn apply_file_config(settings: &mut ClientSettings, file_cfg: FileConfig) {
    if let Some(v) = file_cfg.server_url {
        settings.server_url = normalize_server_url(&v);
    }
    if let Some(v) = file_cfg.typing_quiet_window_ms {
        settings.typing_quiet_window_ms = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = file_cfg.event_channel_capacity {
        settings.event_channel_capacity = v.max(1);
    }
}

pub fn apply_env_overrides<F>(settings: &mut ClientSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("CHAT_SERVER_URL") {
        settings.server_url = normalize_server_url(&v);
    }
    if let Some(v) = lookup("APP__SERVER_URL") {
        settings.server_url = normalize_server_url(&v);
    }

    if let Some(v) = lookup("APP__TYPING_QUIET_WINDOW_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.typing_quiet_window_ms = parsed;
        }
    }

    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }

    if let Some(v) = lookup("APP__EVENT_CHANNEL_CAPACITY") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.event_channel_capacity = parsed.max(1);
        }
    }
}

pub fn normalize_server_url(raw_server_url: &str) -> String {
    let raw_server_url = raw_server_url.trim().trim_end_matches('/');

    if raw_server_url.is_empty() {
        return ClientSettings::default().server_url;
    }

    if raw_server_url.contains("://") {
        return raw_server_url.to_string();
    }

    format!("http://{raw_server_url}")
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
