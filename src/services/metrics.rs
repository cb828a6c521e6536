// Metrics service: lead counts, refresh and notification counters, health.

use std::sync::atomic::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::alerts::ScoreSummary;
use crate::error::ScoringError;
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub leads_total: usize,
    pub leads_hot: usize,
    pub leads_warm: usize,
    pub leads_cold: usize,
    pub score_refresh_count: u64,
    pub slack_notifications_sent: u64,
    pub slack_notifications_failed: u64,
    pub last_refresh: Option<DateTime<Utc>>,
}

pub fn metrics_snapshot(state: &AppState) -> Result<MetricsSnapshot, ScoringError> {
    let scores = state.store.list_scores()?;
    let counts = ScoreSummary::from_scores(&scores);

    Ok(MetricsSnapshot {
        leads_total: counts.total,
        leads_hot: counts.hot,
        leads_warm: counts.warm,
        leads_cold: counts.cold,
        score_refresh_count: state.metrics.refresh_count.load(Ordering::Relaxed),
        slack_notifications_sent: state.metrics.notifications_sent.load(Ordering::Relaxed),
        slack_notifications_failed: state.metrics.notifications_failed.load(Ordering::Relaxed),
        last_refresh: state.last_pass().map(|p| p.finished_at),
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub demo_mode: bool,
    pub uptime_secs: i64,
    pub refresh_in_progress: bool,
    pub last_refresh: Option<DateTime<Utc>>,
}

pub fn health(state: &AppState) -> HealthStatus {
    HealthStatus {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        demo_mode: state.settings.demo_mode,
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        refresh_in_progress: state.refresh_guard.is_running(),
        last_refresh: state.last_pass().map(|p| p.finished_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::Settings;
    use crate::refresh::run_pass_at;
    use crate::sources::MemorySource;
    use crate::store::MemoryStore;
    use crate::test_utils::RecordingChannel;

    #[tokio::test]
    async fn test_metrics_after_demo_pass() {
        let mut settings = Settings::default();
        settings.slack.enabled = Some(true);
        let channel = Arc::new(RecordingChannel::default());
        let state = Arc::new(
            AppState::new(
                settings,
                Arc::new(MemorySource::demo(Utc::now()).unwrap()),
                Arc::new(MemoryStore::new()),
                channel.clone(),
            )
            .unwrap(),
        );

        let before = metrics_snapshot(&state).unwrap();
        assert_eq!(before.leads_total, 0);
        assert!(before.last_refresh.is_none());

        run_pass_at(&state, Utc::now()).await.unwrap();
        let after = metrics_snapshot(&state).unwrap();
        assert_eq!(after.leads_total, 5);
        assert_eq!(after.leads_hot + after.leads_warm + after.leads_cold, 5);
        assert_eq!(after.score_refresh_count, 1);
        assert_eq!(after.slack_notifications_sent, after.leads_hot as u64);
        assert_eq!(channel.hot_leads().len(), after.leads_hot);
    }

    #[test]
    fn test_health() {
        let state = AppState::new(
            Settings::default(),
            Arc::new(MemorySource::new()),
            Arc::new(MemoryStore::new()),
            Arc::new(RecordingChannel::default()),
        )
        .unwrap();
        let status = health(&state);
        assert_eq!(status.status, "healthy");
        assert!(status.demo_mode);
        assert!(!status.refresh_in_progress);
    }
}
