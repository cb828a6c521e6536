//! Slack incoming-webhook channel.
//!
//! Posts attachment-style messages to a webhook URL. The channel makes a
//! single attempt per call; timeouts and retries belong to the dispatcher.

use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

use super::{HotLeadAlert, NotificationChannel, ScoreSummary};
use crate::error::ScoringError;

pub const DEFAULT_CHANNEL: &str = "#sales-alerts";
const BOT_USERNAME: &str = "LeadScore Bot";
const FOOTER: &str = "LeadScore";
const FOOTER_ICON: &str = "https://platform.slack-edge.com/img/default_application_icon.png";

pub struct SlackWebhookChannel {
    client: reqwest::Client,
    webhook_url: Url,
    channel: String,
}

impl SlackWebhookChannel {
    pub fn new(webhook_url: Url, channel: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
            channel: channel.to_string(),
        }
    }

    async fn post(&self, message: &Value) -> Result<(), ScoringError> {
        let resp = self
            .client
            .post(self.webhook_url.clone())
            .json(message)
            .send()
            .await
            .map_err(|e| ScoringError::External(format!("Slack webhook request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ScoringError::External(format!(
                "Slack webhook error {}: {}",
                status, text
            )));
        }
        Ok(())
    }
}

fn or_na(value: Option<&str>) -> &str {
    value.unwrap_or("N/A")
}

pub fn hot_lead_message(channel: &str, alert: &HotLeadAlert) -> Value {
    json!({
        "channel": channel,
        "username": BOT_USERNAME,
        "icon_emoji": ":fire:",
        "attachments": [{
            "color": "#ff0000",
            "title": format!("\u{1F525} Hot Lead Alert - Score: {}", alert.score),
            "fields": [
                { "title": "Name", "value": or_na(alert.name.as_deref()), "short": true },
                { "title": "Company", "value": or_na(alert.company.as_deref()), "short": true },
                { "title": "Email", "value": alert.email, "short": true },
                { "title": "Job Title", "value": or_na(alert.job_title.as_deref()), "short": true },
                { "title": "Deal Stage", "value": or_na(alert.deal_stage), "short": true },
                { "title": "Score", "value": format!("{}/100", alert.score), "short": true },
                {
                    "title": "Engagement",
                    "value": format!(
                        "{} opens, {} clicks, {} visits, {} CRM activities",
                        alert.engagement.email_opens,
                        alert.engagement.email_clicks,
                        alert.engagement.website_visits,
                        alert.engagement.crm_activities
                    ),
                    "short": false
                }
            ],
            "footer": FOOTER,
            "footer_icon": FOOTER_ICON,
            "ts": alert.computed_at.timestamp()
        }]
    })
}

pub fn summary_message(channel: &str, summary: &ScoreSummary) -> Value {
    json!({
        "channel": channel,
        "username": BOT_USERNAME,
        "icon_emoji": ":chart_with_upwards_trend:",
        "text": format!("Lead scores updated: {} total leads", summary.total),
        "attachments": [{
            "color": "#36a64f",
            "fields": [
                { "title": "Hot Leads", "value": summary.hot.to_string(), "short": true },
                { "title": "Warm Leads", "value": summary.warm.to_string(), "short": true },
                { "title": "Cold Leads", "value": summary.cold.to_string(), "short": true }
            ],
            "footer": FOOTER,
            "ts": chrono::Utc::now().timestamp()
        }]
    })
}

#[async_trait]
impl NotificationChannel for SlackWebhookChannel {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn send_hot_lead(&self, alert: &HotLeadAlert) -> Result<(), ScoringError> {
        self.post(&hot_lead_message(&self.channel, alert)).await?;
        log::info!("Slack: sent hot lead alert for {}", alert.email);
        Ok(())
    }

    async fn send_summary(&self, summary: &ScoreSummary) -> Result<(), ScoringError> {
        self.post(&summary_message(&self.channel, summary)).await?;
        log::info!("Slack: sent score update summary");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::make_score;
    use crate::types::{Category, LeadProfile};

    #[test]
    fn test_hot_lead_message_fields() {
        let mut profile = LeadProfile::new("demo-3", "jen@enterprise.example");
        profile.name = Some("Jennifer Martinez".to_string());
        let alert = HotLeadAlert::new(&profile, &make_score("demo-3", 91, Category::Hot));

        let msg = hot_lead_message(DEFAULT_CHANNEL, &alert);
        assert_eq!(msg["channel"], "#sales-alerts");
        assert_eq!(msg["username"], "LeadScore Bot");
        assert_eq!(msg["icon_emoji"], ":fire:");

        let fields = msg["attachments"][0]["fields"].as_array().unwrap();
        assert_eq!(fields[0]["value"], "Jennifer Martinez");
        assert_eq!(fields[1]["value"], "N/A");
        assert_eq!(fields[2]["value"], "jen@enterprise.example");
        assert_eq!(fields[5]["value"], "91/100");
        assert!(msg["attachments"][0]["title"]
            .as_str()
            .unwrap()
            .ends_with("Score: 91"));
    }

    #[test]
    fn test_summary_message_counts() {
        let summary = ScoreSummary { total: 12, hot: 2, warm: 4, cold: 6 };
        let msg = summary_message("#leads", &summary);
        assert_eq!(msg["text"], "Lead scores updated: 12 total leads");
        let fields = msg["attachments"][0]["fields"].as_array().unwrap();
        assert_eq!(fields[0]["value"], "2");
        assert_eq!(fields[2]["value"], "6");
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_retryable() {
        // Port 9 on localhost has nothing listening
        let url = Url::parse("http://127.0.0.1:9/hook").unwrap();
        let channel = SlackWebhookChannel::new(url, DEFAULT_CHANNEL);
        let err = channel
            .send_summary(&ScoreSummary::default())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
