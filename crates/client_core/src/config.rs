//! Client settings: defaults, then `client.toml`, then environment.

use std::{fs, time::Duration};

use serde::Deserialize;
use tracing::warn;

use crate::poll::DEFAULT_POLL_INTERVAL;

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub server_url: String,
    pub poll_interval: Duration,
    /// Give up on a job after this many status checks. `None` polls until the
    /// service reports a terminal state.
    pub max_poll_ticks: Option<u32>,
    pub request_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_ticks: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    server_url: Option<String>,
    poll_interval_ms: Option<u64>,
    max_poll_ticks: Option<u32>,
    request_timeout_secs: Option<u64>,
}

pub fn load_settings() -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string("client.toml") {
        match toml::from_str::<RawSettings>(&raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.server_url {
                    settings.server_url = v;
                }
                if let Some(v) = file_cfg.poll_interval_ms {
                    settings.poll_interval = Duration::from_millis(v);
                }
                if let Some(v) = file_cfg.max_poll_ticks {
                    settings.max_poll_ticks = Some(v);
                }
                if let Some(v) = file_cfg.request_timeout_secs {
                    settings.request_timeout = Duration::from_secs(v);
                }
            }
            Err(err) => warn!("ignoring malformed client.toml: {err}"),
        }
    }

    if let Ok(v) = std::env::var("RENDER_SERVER_URL") {
        settings.server_url = v;
    }
    if let Ok(v) = std::env::var("RENDER_POLL_INTERVAL_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.poll_interval = Duration::from_millis(parsed);
        }
    }
    if let Ok(v) = std::env::var("RENDER_MAX_POLL_TICKS") {
        if let Ok(parsed) = v.parse::<u32>() {
            settings.max_poll_ticks = Some(parsed);
        }
    }
    if let Ok(v) = std::env::var("RENDER_REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout = Duration::from_secs(parsed);
        }
    }

    settings
}
