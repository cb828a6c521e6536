//! Alert dispatcher.
//!
//! Sends hot-lead notifications with bounded retry and records the attempt
//! as the lead's `AlertState`. The state is recorded whatever the outcome:
//! a lead whose alert failed or was disabled is not alerted again until it
//! leaves hot and comes back.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{HotLeadAlert, NotificationChannel, ScoreSummary};
use crate::error::ScoringError;
use crate::store::LeadStore;
use crate::types::{AlertConfig, AlertState, Category, EngagementSummary, LeadProfile, LeadScore};

/// Retry settings for a single notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    /// Per-attempt timeout.
    pub timeout_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            timeout_secs: 10,
        }
    }
}

impl RetryPolicy {
    /// Backoff before attempt `attempt` (1-based); doubles each time.
    fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(2).min(16);
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(1 << exp))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent { attempts: u32 },
    /// Notifications are switched off; nothing was sent.
    Disabled,
    Failed { attempts: u32, error: String },
}

/// A send that gave up, with the number of attempts actually made.
struct SendFailure {
    attempts: u32,
    error: ScoringError,
}

pub struct AlertDispatcher {
    channel: Arc<dyn NotificationChannel>,
    policy: RetryPolicy,
}

impl AlertDispatcher {
    pub fn new(channel: Arc<dyn NotificationChannel>, policy: RetryPolicy) -> Self {
        Self { channel, policy }
    }

    pub fn channel_name(&self) -> &'static str {
        self.channel.name()
    }

    /// Send the hot-lead alert for `score`, honouring `enable_slack`.
    pub async fn dispatch(
        &self,
        config: &AlertConfig,
        profile: &LeadProfile,
        score: &LeadScore,
    ) -> DispatchOutcome {
        if !config.enable_slack {
            log::info!(
                "Dispatcher: notifications disabled, not alerting for {} (score {})",
                profile.display_name(),
                score.score
            );
            return DispatchOutcome::Disabled;
        }

        let alert = HotLeadAlert::new(profile, score);
        match self.send_with_retry(&alert).await {
            Ok(attempts) => DispatchOutcome::Sent { attempts },
            Err(SendFailure { attempts, error }) => {
                log::error!(
                    "Dispatcher: hot lead alert for {} failed after {} attempt(s): {}",
                    score.lead_id,
                    attempts,
                    error
                );
                DispatchOutcome::Failed {
                    attempts,
                    error: error.to_string(),
                }
            }
        }
    }

    /// Dispatch and record the attempt as the lead's alert state.
    pub async fn notify_hot_lead(
        &self,
        store: &dyn LeadStore,
        config: &AlertConfig,
        profile: &LeadProfile,
        score: &LeadScore,
    ) -> Result<DispatchOutcome, ScoringError> {
        let outcome = self.dispatch(config, profile, score).await;
        store.put_alert_state(&AlertState {
            lead_id: score.lead_id.clone(),
            last_category: Category::Hot,
            notified_at: Utc::now(),
        })?;
        Ok(outcome)
    }

    /// Post-refresh summary. Failures are logged only.
    pub async fn send_summary(&self, config: &AlertConfig, summary: &ScoreSummary) -> bool {
        if !config.enable_slack {
            return false;
        }
        let timeout = Duration::from_secs(self.policy.timeout_secs);
        match tokio::time::timeout(timeout, self.channel.send_summary(summary)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                log::warn!("Dispatcher: summary notification failed: {}", e);
                false
            }
            Err(_) => {
                log::warn!(
                    "Dispatcher: summary notification timed out after {}s",
                    self.policy.timeout_secs
                );
                false
            }
        }
    }

    /// Send a synthetic hot lead through the channel. Ignores `enable_slack`
    /// and leaves alert state untouched.
    pub async fn send_test_alert(&self) -> Result<HotLeadAlert, ScoringError> {
        let alert = test_alert();
        self.send_with_retry(&alert).await.map_err(|f| f.error)?;
        Ok(alert)
    }

    async fn send_with_retry(&self, alert: &HotLeadAlert) -> Result<u32, SendFailure> {
        let max_attempts = self.policy.max_attempts.max(1);
        let timeout = Duration::from_secs(self.policy.timeout_secs);
        let mut last_err = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.policy.backoff(attempt)).await;
            }

            let result = match tokio::time::timeout(timeout, self.channel.send_hot_lead(alert)).await
            {
                Ok(r) => r,
                Err(_) => Err(ScoringError::timeout(
                    format!("{} notification for {}", self.channel.name(), alert.lead_id),
                    self.policy.timeout_secs,
                )),
            };

            match result {
                Ok(()) => return Ok(attempt),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    log::warn!(
                        "Dispatcher: attempt {}/{} for {} failed: {}",
                        attempt,
                        max_attempts,
                        alert.lead_id,
                        e
                    );
                    last_err = Some(e);
                }
                Err(error) => {
                    return Err(SendFailure {
                        attempts: attempt,
                        error,
                    })
                }
            }
        }

        Err(SendFailure {
            attempts: max_attempts,
            error: last_err.unwrap_or_else(|| {
                ScoringError::External("notification was never attempted".to_string())
            }),
        })
    }
}

fn test_alert() -> HotLeadAlert {
    HotLeadAlert {
        lead_id: "test-123".to_string(),
        email: "test@example.com".to_string(),
        name: Some("Test Lead".to_string()),
        company: Some("Test Company".to_string()),
        job_title: Some("Test Title".to_string()),
        deal_stage: Some("opportunity"),
        score: 85,
        category: Category::Hot,
        engagement: EngagementSummary {
            email_opens: 10,
            email_clicks: 5,
            website_visits: 8,
            crm_activities: 3,
            ..Default::default()
        },
        computed_at: Utc::now(),
    }
}
