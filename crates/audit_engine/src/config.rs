use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_WPT_BASE_URL: &str = "https://www.webpagetest.org";
pub const DEFAULT_ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_CLAUDE_MODEL: &str = "claude-3-5-sonnet-20240620";
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 60 * 60 * 24 * 7;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a whole number of seconds, got {value:?}")]
    InvalidSeconds { name: &'static str, value: String },
}

/// Test agent presets offered to the submitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocationPreset {
    #[default]
    DesktopCable,
    Mobile4g,
}

impl LocationPreset {
    pub fn id(self) -> &'static str {
        match self {
            LocationPreset::DesktopCable => "ec2-us-east-1:Chrome.Cable",
            LocationPreset::Mobile4g => "ec2-us-east-1:Chrome.4G",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LocationPreset::DesktopCable => "Desktop · Cable (US-East)",
            LocationPreset::Mobile4g => "Mobile · 4G (US-East)",
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl HttpSettings {
    pub(crate) fn build_client(&self) -> Result<reqwest::Client, crate::ApiError> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .build()
            .map_err(crate::error::map_reqwest_error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max: 5,
        }
    }
}

/// Server-side configuration, usually read from the environment.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub wpt_base_url: String,
    pub wpt_api_key: Option<String>,
    pub anthropic_url: String,
    pub claude_api_key: Option<String>,
    pub claude_model: String,
    pub a11y_scanner_url: Option<String>,
    pub cache_ttl_seconds: u64,
    pub rate_limit: RateLimitConfig,
    pub http: HttpSettings,
    pub title_timeout: Duration,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            wpt_base_url: DEFAULT_WPT_BASE_URL.to_string(),
            wpt_api_key: None,
            anthropic_url: DEFAULT_ANTHROPIC_URL.to_string(),
            claude_api_key: None,
            claude_model: DEFAULT_CLAUDE_MODEL.to_string(),
            a11y_scanner_url: None,
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            rate_limit: RateLimitConfig::default(),
            http: HttpSettings::default(),
            title_timeout: Duration::from_secs(3),
        }
    }
}

impl AuditConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let cache_ttl_seconds = match get("CACHE_TTL_SECONDS") {
            Some(value) => value
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidSeconds {
                    name: "CACHE_TTL_SECONDS",
                    value,
                })?,
            None => defaults.cache_ttl_seconds,
        };

        Ok(Self {
            wpt_base_url: get("WPT_BASE_URL").unwrap_or(defaults.wpt_base_url),
            wpt_api_key: get("WPT_API_KEY"),
            anthropic_url: get("ANTHROPIC_BASE_URL").unwrap_or(defaults.anthropic_url),
            claude_api_key: get("CLAUDE_API_KEY"),
            claude_model: get("CLAUDE_MODEL").unwrap_or(defaults.claude_model),
            a11y_scanner_url: get("A11Y_SCANNER_URL"),
            cache_ttl_seconds,
            ..defaults
        })
    }
}
