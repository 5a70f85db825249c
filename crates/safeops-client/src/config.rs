use std::fs;
use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use safeops_core::Lang;
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_DASHBOARD_BASE: &str = "http://localhost:8787";
pub const DEFAULT_MISSIONS_BASE: &str = "http://127.0.0.1:8000";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(1500);
pub const DEFAULT_MAX_LOADING_WAIT: Duration = Duration::from_millis(1200);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the SafeOps dashboard API.
    pub dashboard_base: String,
    /// Base URL of the missions API used by the manager view.
    pub missions_base: String,
    /// Deadline applied to every individual GET.
    pub fetch_timeout: Duration,
    /// Upper bound on how long a refresh may keep the view in `loading`.
    pub max_loading_wait: Duration,
    pub poll_interval: Duration,
    pub lang: Lang,
    pub manager_enabled: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            dashboard_base: DEFAULT_DASHBOARD_BASE.to_string(),
            missions_base: DEFAULT_MISSIONS_BASE.to_string(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_loading_wait: DEFAULT_MAX_LOADING_WAIT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            lang: Lang::En,
            manager_enabled: true,
        }
    }
}

/// Partial configuration, as read from a TOML file or assembled from CLI
/// flags. Unset fields leave the current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverrides {
    pub dashboard_base: Option<String>,
    pub missions_base: Option<String>,
    pub fetch_timeout_ms: Option<u64>,
    pub max_loading_wait_ms: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub lang: Option<String>,
    pub manager_enabled: Option<bool>,
}

impl ConfigOverrides {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&raw)
    }
}

impl ClientConfig {
    pub fn apply(mut self, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        if let Some(base) = overrides.dashboard_base {
            self.dashboard_base = normalize_base_url(&base)?;
        }
        if let Some(base) = overrides.missions_base {
            self.missions_base = normalize_base_url(&base)?;
        }
        if let Some(ms) = overrides.fetch_timeout_ms {
            self.fetch_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.max_loading_wait_ms {
            self.max_loading_wait = Duration::from_millis(ms);
        }
        if let Some(secs) = overrides.poll_interval_secs {
            self.poll_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(code) = overrides.lang {
            self.lang = Lang::from_code(&code);
        }
        if let Some(enabled) = overrides.manager_enabled {
            self.manager_enabled = enabled;
        }
        Ok(self)
    }
}

/// Accepts `http`/`https` URLs and strips trailing slashes so endpoint paths
/// can be appended verbatim.
pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).map_err(|err| ConfigError::InvalidBaseUrl {
        url: trimmed.to_string(),
        reason: err.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidBaseUrl {
            url: trimmed.to_string(),
            reason: format!("unsupported scheme {}", url.scheme()),
        });
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

/// Feature flags are on unless set to something other than `true`.
pub fn feature_flag(raw: Option<&str>) -> bool {
    raw.is_none_or(|value| value.trim().eq_ignore_ascii_case("true"))
}
