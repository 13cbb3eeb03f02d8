// src/config.rs
//! Service configuration: TOML file with env-var key resolution.
//!
//! All sections default sensibly so the service boots with no config file
//! at all; secrets are never stored in the file — `api_key = "ENV"` (the
//! default) reads the matching environment variable at load time.

use std::{env, fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "config/dealwatch.toml";
pub const ENV_CONFIG_PATH: &str = "DEALWATCH_CONFIG";

const DEFAULT_GEMINI_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent";
const DEFAULT_FCM_URL: &str = "https://fcm.googleapis.com/fcm/send";

fn default_gemini_url() -> String {
    DEFAULT_GEMINI_URL.to_string()
}
fn default_fcm_url() -> String {
    DEFAULT_FCM_URL.to_string()
}
fn default_env_key() -> String {
    "ENV".to_string()
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_interval_secs() -> u64 {
    4 * 3600
}
fn default_product_delay_ms() -> u64 {
    1500
}
fn default_push_workers() -> usize {
    5
}
fn default_push_queue_depth() -> usize {
    64
}
fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_url")]
    pub api_url: String,
    /// "ENV" means: read from GEMINI_API_KEY.
    #[serde(default = "default_env_key")]
    pub api_key: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_url: default_gemini_url(),
            api_key: default_env_key(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// How often the scheduler runs a full catalog pass.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Pause between consecutive products inside one batch (rate-limit
    /// guard for the generation service).
    #[serde(default = "default_product_delay_ms")]
    pub product_delay_ms: u64,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            product_delay_ms: default_product_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    #[serde(default = "default_fcm_url")]
    pub fcm_endpoint: String,
    /// "ENV" means: read from FCM_SERVER_KEY.
    #[serde(default = "default_env_key")]
    pub server_key: String,
    #[serde(default = "default_push_workers")]
    pub workers: usize,
    #[serde(default = "default_push_queue_depth")]
    pub queue_depth: usize,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            fcm_endpoint: default_fcm_url(),
            server_key: default_env_key(),
            workers: default_push_workers(),
            queue_depth: default_push_queue_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub updater: UpdaterConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load from `DEALWATCH_CONFIG` or the default path. A missing file
    /// yields defaults; a file that exists but does not parse is an error.
    pub fn load() -> Result<Self> {
        let path = env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(&path)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut cfg: AppConfig = if path.exists() {
            let data = fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?
        } else {
            AppConfig::default()
        };
        cfg.resolve_keys();
        cfg.sanitize();
        Ok(cfg)
    }

    fn resolve_keys(&mut self) {
        if self.gemini.api_key.trim().eq_ignore_ascii_case("env") {
            self.gemini.api_key = env::var("GEMINI_API_KEY").unwrap_or_else(|_| {
                warn!("GEMINI_API_KEY not set; price discovery calls will fail");
                String::new()
            });
        }
        if self.push.server_key.trim().eq_ignore_ascii_case("env") {
            self.push.server_key = env::var("FCM_SERVER_KEY").unwrap_or_default();
        }
    }

    fn sanitize(&mut self) {
        // Keep the scheduler from hammering the quota on a typo.
        if self.updater.interval_secs < 60 {
            self.updater.interval_secs = 60;
        }
        if self.push.workers == 0 {
            self.push.workers = default_push_workers();
        }
        if self.gemini.request_timeout_secs == 0 {
            self.gemini.request_timeout_secs = default_request_timeout_secs();
        }
    }
}
