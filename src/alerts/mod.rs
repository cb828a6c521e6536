//! Hot-lead notifications.
//!
//! A `NotificationChannel` delivers two kinds of messages: the per-lead
//! hot alert and the post-refresh summary. The dispatcher decides when to
//! send and owns retry; channels only make one attempt per call.

pub mod dispatcher;
pub mod slack;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ScoringError;
use crate::signals::normalizer::DealStage;
use crate::types::{Category, EngagementSummary, LeadProfile, LeadScore};

pub use dispatcher::{AlertDispatcher, DispatchOutcome, RetryPolicy};
pub use slack::SlackWebhookChannel;

/// Payload of a hot-lead notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotLeadAlert {
    pub lead_id: String,
    pub email: String,
    pub name: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub deal_stage: Option<&'static str>,
    pub score: u8,
    pub category: Category,
    pub engagement: EngagementSummary,
    pub computed_at: DateTime<Utc>,
}

impl HotLeadAlert {
    pub fn new(profile: &LeadProfile, score: &LeadScore) -> Self {
        Self {
            lead_id: score.lead_id.clone(),
            email: profile.email.clone(),
            name: profile.name.clone(),
            company: profile.company.clone(),
            job_title: profile.job_title.clone(),
            deal_stage: DealStage::from_normalized(score.features.deal_stage).map(|s| s.label()),
            score: score.score,
            category: score.category,
            engagement: score.engagement.clone(),
            computed_at: score.computed_at,
        }
    }
}

/// Category counts after a refresh pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreSummary {
    pub total: usize,
    pub hot: usize,
    pub warm: usize,
    pub cold: usize,
}

impl ScoreSummary {
    pub fn from_scores<'a>(scores: impl IntoIterator<Item = &'a LeadScore>) -> Self {
        let mut summary = Self::default();
        for score in scores {
            summary.total += 1;
            match score.category {
                Category::Hot => summary.hot += 1,
                Category::Warm => summary.warm += 1,
                Category::Cold => summary.cold += 1,
            }
        }
        summary
    }
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    async fn send_hot_lead(&self, alert: &HotLeadAlert) -> Result<(), ScoringError>;

    async fn send_summary(&self, summary: &ScoreSummary) -> Result<(), ScoringError>;
}

/// Channel that only logs. Used in demo mode and when no webhook is set.
#[derive(Debug, Default)]
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send_hot_lead(&self, alert: &HotLeadAlert) -> Result<(), ScoringError> {
        log::info!(
            "[DEMO] Would send hot lead alert: {} ({}) score {}",
            alert.email,
            alert.company.as_deref().unwrap_or("N/A"),
            alert.score
        );
        Ok(())
    }

    async fn send_summary(&self, summary: &ScoreSummary) -> Result<(), ScoringError> {
        log::info!(
            "[DEMO] Would send score update: {} leads, {} hot, {} warm",
            summary.total,
            summary.hot,
            summary.warm
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::make_score;

    #[test]
    fn test_alert_carries_profile_and_stage() {
        let mut profile = LeadProfile::new("demo-1", "sarah@techcorp.example");
        profile.name = Some("Sarah Johnson".to_string());
        profile.company = Some("TechCorp Industries".to_string());

        let mut score = make_score("demo-1", 88, Category::Hot);
        score.features.deal_stage = DealStage::Opportunity.normalized();

        let alert = HotLeadAlert::new(&profile, &score);
        assert_eq!(alert.name.as_deref(), Some("Sarah Johnson"));
        assert_eq!(alert.deal_stage, Some("opportunity"));
        assert_eq!(alert.score, 88);
    }

    #[test]
    fn test_summary_counts_categories() {
        let scores = vec![
            make_score("a", 90, Category::Hot),
            make_score("b", 60, Category::Warm),
            make_score("c", 10, Category::Cold),
            make_score("d", 5, Category::Cold),
        ];
        let summary = ScoreSummary::from_scores(&scores);
        assert_eq!(
            summary,
            ScoreSummary { total: 4, hot: 1, warm: 1, cold: 2 }
        );
    }

    #[tokio::test]
    async fn test_log_channel_never_fails() {
        let profile = LeadProfile::new("a", "a@example.com");
        let alert = HotLeadAlert::new(&profile, &make_score("a", 90, Category::Hot));
        assert!(LogChannel.send_hot_lead(&alert).await.is_ok());
        assert!(LogChannel.send_summary(&ScoreSummary::default()).await.is_ok());
    }
}
