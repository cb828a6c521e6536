//! Process settings.
//!
//! Read from `~/.leadscore/config.json` (or `$LEADSCORE_CONFIG`) when the
//! file exists, then overridden from the environment. Every field has a
//! default, so an empty object or no file at all is a valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::alerts::slack::DEFAULT_CHANNEL;
use crate::alerts::RetryPolicy;
use crate::error::ScoringError;
use crate::signals::normalizer::NormalizationParams;
use crate::signals::scoring::Weights;
use crate::signals::ScoringParams;
use crate::types::{AlertConfig, DEFAULT_HOT_THRESHOLD, DEFAULT_WARM_THRESHOLD};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default = "default_slack_channel")]
    pub channel: String,
    /// Unset means "on when a webhook URL is configured".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl Default for SlackSettings {
    fn default() -> Self {
        Self {
            webhook_url: None,
            channel: default_slack_channel(),
            enabled: None,
        }
    }
}

impl SlackSettings {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(self.webhook_url.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_true")]
    pub demo_mode: bool,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_hot_threshold")]
    pub hot_threshold: u32,
    #[serde(default = "default_warm_threshold")]
    pub warm_threshold: u32,
    #[serde(default)]
    pub slack: SlackSettings,
    #[serde(default)]
    pub weights: Weights,
    #[serde(default)]
    pub normalization: NormalizationParams,
    #[serde(default = "default_collector_timeout")]
    pub collector_timeout_secs: u64,
    #[serde(default)]
    pub notify: RetryPolicy,
    #[serde(default = "default_max_concurrent_leads")]
    pub max_concurrent_leads: usize,
    /// SQLite file. Unset keeps scores in memory only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
    /// Lead/record JSON import used when demo mode is off.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_path: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_true() -> bool {
    true
}
fn default_refresh_interval() -> u64 {
    3600
}
fn default_hot_threshold() -> u32 {
    DEFAULT_HOT_THRESHOLD
}
fn default_warm_threshold() -> u32 {
    DEFAULT_WARM_THRESHOLD
}
fn default_collector_timeout() -> u64 {
    30
}
fn default_max_concurrent_leads() -> usize {
    16
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_slack_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            demo_mode: true,
            refresh_interval_secs: default_refresh_interval(),
            hot_threshold: DEFAULT_HOT_THRESHOLD,
            warm_threshold: DEFAULT_WARM_THRESHOLD,
            slack: SlackSettings::default(),
            weights: Weights::default(),
            normalization: NormalizationParams::default(),
            collector_timeout_secs: default_collector_timeout(),
            notify: RetryPolicy::default(),
            max_concurrent_leads: default_max_concurrent_leads(),
            database_path: None,
            data_path: None,
            log_level: default_log_level(),
        }
    }
}

/// `~/.leadscore/config.json`, or `$LEADSCORE_CONFIG` when set.
pub fn config_path() -> Result<PathBuf, ScoringError> {
    if let Ok(path) = std::env::var("LEADSCORE_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir()
        .ok_or_else(|| ScoringError::Invariant("Could not find home directory".to_string()))?;
    Ok(home.join(".leadscore").join("config.json"))
}

impl Settings {
    /// Load from the default location and apply environment overrides.
    pub fn load() -> Result<Self, ScoringError> {
        let path = config_path()?;
        let mut settings = if path.exists() {
            Self::from_file(&path)?
        } else {
            log::info!("Config: no file at {}, using defaults", path.display());
            Self::default()
        };
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ScoringError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScoringError::Invariant(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| ScoringError::Invariant(format!("Failed to parse config: {}", e)))
    }

    /// Apply `LEADSCORE_*` / `SLACK_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ScoringError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ScoringError> {
            raw.trim().parse().map_err(|_| {
                ScoringError::Invariant(format!("{} has an invalid value '{}'", key, raw))
            })
        }

        if let Some(raw) = lookup("LEADSCORE_DEMO_MODE") {
            self.demo_mode = matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(raw) = lookup("LEADSCORE_HOT_THRESHOLD") {
            self.hot_threshold = parsed("LEADSCORE_HOT_THRESHOLD", &raw)?;
        }
        if let Some(raw) = lookup("LEADSCORE_WARM_THRESHOLD") {
            self.warm_threshold = parsed("LEADSCORE_WARM_THRESHOLD", &raw)?;
        }
        if let Some(raw) = lookup("LEADSCORE_REFRESH_INTERVAL") {
            self.refresh_interval_secs = parsed("LEADSCORE_REFRESH_INTERVAL", &raw)?;
        }
        if let Some(raw) = lookup("SLACK_WEBHOOK_URL") {
            self.slack.webhook_url = Some(raw).filter(|s| !s.trim().is_empty());
        }
        if let Some(raw) = lookup("SLACK_CHANNEL") {
            self.slack.channel = raw;
        }
        if let Some(raw) = lookup("LEADSCORE_DATABASE") {
            self.database_path = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("LEADSCORE_LOG_LEVEL") {
            self.log_level = raw;
        }
        Ok(())
    }

    pub fn scoring_params(&self) -> ScoringParams {
        ScoringParams {
            weights: self.weights.clone(),
            normalization: self.normalization.clone(),
        }
    }

    /// The alert configuration the process starts with.
    pub fn alert_config(&self) -> AlertConfig {
        AlertConfig {
            hot_threshold: self.hot_threshold,
            warm_threshold: self.warm_threshold,
            enable_slack: self.slack.is_enabled(),
        }
    }

    /// Parsed webhook URL, if one is configured.
    pub fn webhook_url(&self) -> Result<Option<Url>, ScoringError> {
        match self.slack.webhook_url.as_deref() {
            None => Ok(None),
            Some(raw) => {
                let url = Url::parse(raw).map_err(|e| {
                    ScoringError::Invariant(format!("Invalid Slack webhook URL: {}", e))
                })?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(ScoringError::Invariant(format!(
                        "Slack webhook URL must be http(s), got '{}'",
                        url.scheme()
                    )));
                }
                Ok(Some(url))
            }
        }
    }

    /// Everything the process refuses to start without.
    pub fn validate(&self) -> Result<(), ScoringError> {
        self.scoring_params().validate()?;
        self.alert_config()
            .validate()
            .map_err(|e| ScoringError::Invariant(e.to_string()))?;
        self.webhook_url()?;
        if self.refresh_interval_secs == 0 {
            return Err(ScoringError::Invariant(
                "refreshIntervalSecs must be positive".to_string(),
            ));
        }
        if self.max_concurrent_leads == 0 {
            return Err(ScoringError::Invariant(
                "maxConcurrentLeads must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
