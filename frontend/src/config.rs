// frontend/src/config.rs
//
// Client settings. Everything has a default so an empty `{}` is a valid
// config; natively the file is looked up in the platform config dir and a
// couple of environment variables override it.

use crate::geolocation::GeoOptions;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_GEOCODE_URL: &str = "https://api.bigdatacloud.net/data/reverse-geocode-client";

#[cfg(not(target_arch = "wasm32"))]
pub const DEFAULT_NATIVE_BASE_URL: &str = "http://localhost:5000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend origin. Empty means "same origin as the page" on wasm.
    pub base_url: String,
    pub session_id: String,
    /// Empty means "ask the host" (`navigator.userAgent` on wasm).
    pub user_agent: String,
    pub geocode_url: String,
    pub request_timeout_ms: u64,
    pub location: LocationSettings,
    /// Native only: position served by the simulated geolocator.
    pub simulated_fix: Option<SimulatedFix>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            session_id: "unknown".to_string(),
            user_agent: String::new(),
            geocode_url: DEFAULT_GEOCODE_URL.to_string(),
            request_timeout_ms: 10_000,
            location: LocationSettings::default(),
            simulated_fix: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationSettings {
    pub high_accuracy: bool,
    pub timeout_ms: u64,
    pub maximum_age_ms: u64,
    pub watch_maximum_age_ms: u64,
    pub movement_threshold_km: f64,
    pub stale_after_minutes: i64,
    pub prompt_delay_ms: u64,
}

impl Default for LocationSettings {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout_ms: 10_000,
            maximum_age_ms: 5 * 60 * 1000,
            watch_maximum_age_ms: 10 * 60 * 1000,
            movement_threshold_km: 0.1,
            stale_after_minutes: 10,
            prompt_delay_ms: 3000,
        }
    }
}

impl LocationSettings {
    pub fn one_shot_options(&self) -> GeoOptions {
        GeoOptions {
            high_accuracy: self.high_accuracy,
            timeout: Duration::from_millis(self.timeout_ms),
            maximum_age: Duration::from_millis(self.maximum_age_ms),
        }
    }

    pub fn watch_options(&self) -> GeoOptions {
        GeoOptions {
            maximum_age: Duration::from_millis(self.watch_maximum_age_ms),
            ..self.one_shot_options()
        }
    }

    pub fn prompt_delay(&self) -> Duration {
        Duration::from_millis(self.prompt_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulatedFix {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_simulated_accuracy")]
    pub accuracy_meters: f64,
}

fn default_simulated_accuracy() -> f64 {
    10.0
}

impl ClientConfig {
    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw).context("invalid client config")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Backend origin with any trailing slash removed.
    pub fn resolved_base_url(&self) -> String {
        let base = self.base_url.trim().trim_end_matches('/');
        if !base.is_empty() {
            return base.to_string();
        }

        #[cfg(target_arch = "wasm32")]
        {
            web_sys::window()
                .and_then(|w| w.location().origin().ok())
                .unwrap_or_default()
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            DEFAULT_NATIVE_BASE_URL.to_string()
        }
    }

    pub fn resolved_user_agent(&self) -> String {
        if !self.user_agent.trim().is_empty() {
            return self.user_agent.clone();
        }

        #[cfg(target_arch = "wasm32")]
        {
            if let Some(ua) = web_sys::window().and_then(|w| w.navigator().user_agent().ok()) {
                return ua;
            }
        }

        concat!("safeindy-client/", env!("CARGO_PKG_VERSION")).to_string()
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use super::ClientConfig;
    use anyhow::Context;
    use std::path::{Path, PathBuf};

    pub const BASE_URL_ENV: &str = "SAFEINDY_BASE_URL";
    pub const SESSION_ID_ENV: &str = "SAFEINDY_SESSION_ID";

    pub fn default_config_path() -> Option<PathBuf> {
        let mut base = dirs::config_dir()?;
        base.push("safeindy");
        base.push("config.json");
        Some(base)
    }

    impl ClientConfig {
        pub fn load_file(path: &Path) -> anyhow::Result<Self> {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            Self::from_json_str(&raw).with_context(|| format!("parsing config {}", path.display()))
        }

        /// Explicit path if given, else the default location if it exists,
        /// else defaults; environment overrides applied last.
        pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
            let mut cfg = match explicit {
                Some(path) => Self::load_file(path)?,
                None => match default_config_path() {
                    Some(path) if path.exists() => Self::load_file(&path)?,
                    _ => Self::default(),
                },
            };
            cfg.apply_env_overrides(|key| std::env::var(key).ok());
            Ok(cfg)
        }

        pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
            if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
                self.base_url = url;
            }
            if let Some(id) = lookup(SESSION_ID_ENV).filter(|v| !v.trim().is_empty()) {
                self.session_id = id;
            }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::{default_config_path, BASE_URL_ENV, SESSION_ID_ENV};
