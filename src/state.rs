//! Process-wide application state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::Notify;

use crate::alerts::{AlertDispatcher, DispatchOutcome, LogChannel, NotificationChannel, SlackWebhookChannel};
use crate::config::Settings;
use crate::db::SqliteStore;
use crate::error::ScoringError;
use crate::refresh::RefreshSummary;
use crate::scheduler::RefreshGuard;
use crate::signals::ScoringParams;
use crate::sources::{EngagementSource, MemorySource};
use crate::store::{LeadStore, MemoryStore};
use crate::types::AlertConfig;

/// Counters exposed by the metrics service.
#[derive(Debug, Default)]
pub struct Metrics {
    pub refresh_count: AtomicU64,
    pub notifications_sent: AtomicU64,
    pub notifications_failed: AtomicU64,
}

pub struct AppState {
    pub settings: Settings,
    /// Validated at construction, read-only afterwards.
    pub params: ScoringParams,
    alert_config: RwLock<Arc<AlertConfig>>,
    pub store: Arc<dyn LeadStore>,
    pub source: Arc<dyn EngagementSource>,
    pub dispatcher: AlertDispatcher,
    pub collector_timeout: Duration,
    /// Wakes the scheduler loop for an immediate pass.
    pub refresh_wake: Notify,
    pub refresh_guard: RefreshGuard,
    last_pass: RwLock<Option<RefreshSummary>>,
    pub metrics: Metrics,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wire explicit collaborators. Fails if the settings are invalid.
    pub fn new(
        settings: Settings,
        source: Arc<dyn EngagementSource>,
        store: Arc<dyn LeadStore>,
        channel: Arc<dyn NotificationChannel>,
    ) -> Result<Self, ScoringError> {
        settings.validate()?;

        Ok(Self {
            params: settings.scoring_params(),
            alert_config: RwLock::new(Arc::new(settings.alert_config())),
            dispatcher: AlertDispatcher::new(channel, settings.notify),
            collector_timeout: Duration::from_secs(settings.collector_timeout_secs),
            store,
            source,
            refresh_wake: Notify::new(),
            refresh_guard: RefreshGuard::default(),
            last_pass: RwLock::new(None),
            metrics: Metrics::default(),
            started_at: Utc::now(),
            settings,
        })
    }

    /// Build the collaborators the settings describe.
    pub fn from_settings(settings: Settings) -> Result<Self, ScoringError> {
        settings.validate()?;

        let store: Arc<dyn LeadStore> = match &settings.database_path {
            Some(path) => {
                log::info!("State: using SQLite store at {}", path.display());
                Arc::new(SqliteStore::open(path)?)
            }
            None => {
                log::info!("State: no database configured, scores are kept in memory");
                Arc::new(MemoryStore::new())
            }
        };

        let source: Arc<dyn EngagementSource> = if settings.demo_mode {
            Arc::new(MemorySource::demo(Utc::now())?)
        } else if let Some(path) = &settings.data_path {
            Arc::new(MemorySource::load_json(path)?)
        } else {
            log::warn!("State: demo mode off and no dataPath configured, no leads to score");
            Arc::new(MemorySource::new())
        };

        let channel: Arc<dyn NotificationChannel> = match settings.webhook_url()? {
            Some(url) if !settings.demo_mode => {
                Arc::new(SlackWebhookChannel::new(url, &settings.slack.channel))
            }
            _ => Arc::new(LogChannel),
        };

        Self::new(settings, source, store, channel)
    }

    /// Current alert configuration snapshot.
    pub fn alert_config(&self) -> Arc<AlertConfig> {
        self.alert_config.read().clone()
    }

    /// Replace the alert configuration as a whole. Rejected configs leave the
    /// current one untouched.
    pub fn replace_alert_config(&self, config: AlertConfig) -> Result<Arc<AlertConfig>, ScoringError> {
        config.validate()?;
        let config = Arc::new(config);
        *self.alert_config.write() = Arc::clone(&config);
        Ok(config)
    }

    pub fn last_pass(&self) -> Option<RefreshSummary> {
        self.last_pass.read().clone()
    }

    pub(crate) fn record_pass(&self, summary: &RefreshSummary) {
        self.metrics.refresh_count.fetch_add(1, Ordering::Relaxed);
        *self.last_pass.write() = Some(summary.clone());
    }

    pub(crate) fn record_dispatch(&self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Sent { .. } => {
                self.metrics.notifications_sent.fetch_add(1, Ordering::Relaxed);
            }
            DispatchOutcome::Failed { .. } => {
                self.metrics.notifications_failed.fetch_add(1, Ordering::Relaxed);
            }
            DispatchOutcome::Disabled => {}
        }
    }
}
