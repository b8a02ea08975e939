use shared::{Tier, TierLimits};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use strum::IntoEnumIterator;
use thiserror::Error;
use url::Url;

const DEFAULT_VISION_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_VISION_MODEL: &str = "gpt-4o-mini";
const DEFAULT_VISION_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("URL parsing failed: {0}")]
    UrlError(#[from] url::ParseError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Tier limits YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub base_url: Url,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

/// Per-tier caps. Starts from the built-in table; a YAML file may override
/// any subset of tiers.
#[derive(Debug, Clone, PartialEq)]
pub struct TierTable {
    limits: HashMap<Tier, TierLimits>,
}

impl Default for TierTable {
    fn default() -> Self {
        let limits = Tier::iter()
            .map(|tier| (tier, TierLimits::defaults_for(tier)))
            .collect();
        Self { limits }
    }
}

impl TierTable {
    pub fn limits_for(&self, tier: Tier) -> TierLimits {
        self.limits
            .get(&tier)
            .copied()
            .unwrap_or_else(|| TierLimits::defaults_for(tier))
    }

    pub fn with_overrides_from_yaml(mut self, yaml: &str) -> Result<Self, ConfigError> {
        let overrides: HashMap<Tier, TierLimits> = serde_yaml::from_str(yaml)?;
        for (tier, limits) in overrides {
            log::debug!("Overriding limits for tier {}", tier);
            self.limits.insert(tier, limits);
        }
        Ok(self)
    }
}

#[derive(Debug, Clone)]
pub struct StudioConfig {
    pub vision: VisionConfig,
    pub max_upload_bytes: usize,
    pub tiers: TierTable,
}

impl StudioConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("VISION_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_VISION_BASE_URL.to_string());
        let base_url = Url::parse(base_url.trim_end_matches('/'))?;

        let api_key = lookup("VISION_API_KEY").filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            log::warn!("VISION_API_KEY is not set; the HTTP vision service will be unavailable");
        }

        let model = lookup("VISION_MODEL").unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string());
        let timeout_secs = parse_or(&lookup, "VISION_TIMEOUT_SECS", DEFAULT_VISION_TIMEOUT_SECS)?;
        let max_upload_bytes = parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;

        let mut tiers = TierTable::default();
        if let Some(path) = lookup("TIER_LIMITS_PATH") {
            log::info!("Loading tier limits from {}", path);
            let yaml = std::fs::read_to_string(&path)?;
            tiers = tiers.with_overrides_from_yaml(&yaml)?;
        }

        Ok(Self {
            vision: VisionConfig {
                base_url,
                api_key,
                model,
                timeout: Duration::from_secs(timeout_secs),
            },
            max_upload_bytes,
            tiers,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(value) => {
            let parsed = value.trim().parse();
            parsed.map_err(|_| ConfigError::Invalid { key, value })
        }
        None => Ok(default),
    }
}
