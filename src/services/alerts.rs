// Alerts service: alert configuration and test notifications.

use serde::Serialize;

use crate::error::ScoringError;
use crate::signals::ScoringParams;
use crate::state::AppState;
use crate::types::AlertConfig;

pub fn get_alert_config(state: &AppState) -> AlertConfig {
    *state.alert_config()
}

/// Replace the alert configuration. Takes effect from the next pass; a pass
/// already running keeps the snapshot it started with.
pub fn update_alert_config(
    state: &AppState,
    config: AlertConfig,
) -> Result<AlertConfig, ScoringError> {
    let applied = state.replace_alert_config(config)?;
    log::info!(
        "Alerts service: updated alert config: hot={}, warm={}, slack={}",
        applied.hot_threshold,
        applied.warm_threshold,
        applied.enable_slack
    );
    Ok(*applied)
}

/// Weights and normalization parameters in effect. Read-only.
pub fn get_scoring_params(state: &AppState) -> ScoringParams {
    state.params.clone()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestAlertResult {
    pub channel: &'static str,
    pub lead_id: String,
    pub score: u8,
}

/// Send a synthetic hot lead through the configured channel.
pub async fn send_test_alert(state: &AppState) -> Result<TestAlertResult, ScoringError> {
    let alert = state.dispatcher.send_test_alert().await?;
    log::info!(
        "Alerts service: test alert sent through {}",
        state.dispatcher.channel_name()
    );
    Ok(TestAlertResult {
        channel: state.dispatcher.channel_name(),
        lead_id: alert.lead_id,
        score: alert.score,
    })
}
