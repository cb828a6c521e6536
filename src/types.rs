use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScoringError;

// ---------------------------------------------------------------------------
// Engagement records
// ---------------------------------------------------------------------------

/// Collector that produced an engagement record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordSource {
    Email,
    Web,
    Crm,
}

impl RecordSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordSource::Email => "email",
            RecordSource::Web => "web",
            RecordSource::Crm => "crm",
        }
    }
}

/// What happened. `StageChange` and `CompanySize` carry their value in
/// `EngagementRecord::value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementKind {
    Open,
    Click,
    Reply,
    Visit,
    Call,
    Meeting,
    Note,
    CrmEmail,
    StageChange,
    CompanySize,
}

impl EngagementKind {
    /// The collector each kind originates from.
    pub fn source(&self) -> RecordSource {
        match self {
            EngagementKind::Open | EngagementKind::Click | EngagementKind::Reply => {
                RecordSource::Email
            }
            EngagementKind::Visit => RecordSource::Web,
            EngagementKind::Call
            | EngagementKind::Meeting
            | EngagementKind::Note
            | EngagementKind::CrmEmail
            | EngagementKind::StageChange
            | EngagementKind::CompanySize => RecordSource::Crm,
        }
    }

    /// Calls, meetings and notes feed the `crm_activities` feature.
    pub fn is_crm_activity(&self) -> bool {
        matches!(
            self,
            EngagementKind::Call | EngagementKind::Meeting | EngagementKind::Note
        )
    }

    /// Everything except firmographic data counts as an interaction for recency.
    pub fn is_interaction(&self) -> bool {
        !matches!(self, EngagementKind::CompanySize)
    }

    pub fn requires_value(&self) -> bool {
        matches!(self, EngagementKind::StageChange | EngagementKind::CompanySize)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementKind::Open => "open",
            EngagementKind::Click => "click",
            EngagementKind::Reply => "reply",
            EngagementKind::Visit => "visit",
            EngagementKind::Call => "call",
            EngagementKind::Meeting => "meeting",
            EngagementKind::Note => "note",
            EngagementKind::CrmEmail => "crm_email",
            EngagementKind::StageChange => "stage_change",
            EngagementKind::CompanySize => "company_size",
        }
    }
}

/// A single normalized engagement event, as delivered by a collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementRecord {
    pub source: RecordSource,
    pub lead_id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: EngagementKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl EngagementRecord {
    pub fn new(lead_id: &str, kind: EngagementKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            source: kind.source(),
            lead_id: lead_id.to_string(),
            timestamp,
            kind,
            value: None,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    /// Structural checks a record must pass before it contributes to a
    /// feature. Range checks specific to a feature live in the normalizer.
    pub fn validate(&self, expected_lead: &str) -> Result<(), ScoringError> {
        if self.lead_id != expected_lead {
            return Err(ScoringError::Data(format!(
                "record for '{}' delivered with lead '{}'",
                self.lead_id, expected_lead
            )));
        }
        if self.source != self.kind.source() {
            return Err(ScoringError::Data(format!(
                "kind '{}' cannot come from source '{}'",
                self.kind.as_str(),
                self.source.as_str()
            )));
        }
        match self.value {
            Some(v) if !v.is_finite() || v < 0.0 => Err(ScoringError::Data(format!(
                "{} value {} is not a non-negative number",
                self.kind.as_str(),
                v
            ))),
            None if self.kind.requires_value() => Err(ScoringError::Data(format!(
                "{} record without a value",
                self.kind.as_str()
            ))),
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Features
// ---------------------------------------------------------------------------

/// The fixed feature set, in weight-table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    EmailOpensRecent,
    EmailClickRate,
    WebsiteVisits,
    CrmActivities,
    DealStage,
    CompanySize,
    Recency,
}

impl Feature {
    pub const ALL: [Feature; 7] = [
        Feature::EmailOpensRecent,
        Feature::EmailClickRate,
        Feature::WebsiteVisits,
        Feature::CrmActivities,
        Feature::DealStage,
        Feature::CompanySize,
        Feature::Recency,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Feature::EmailOpensRecent => "email_opens_recent",
            Feature::EmailClickRate => "email_click_rate",
            Feature::WebsiteVisits => "website_visits",
            Feature::CrmActivities => "crm_activities",
            Feature::DealStage => "deal_stage",
            Feature::CompanySize => "company_size",
            Feature::Recency => "recency",
        }
    }
}

/// Normalized per-lead features, each in [0, 1]. Serializes as a map with
/// all seven feature names present.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    pub email_opens_recent: f64,
    pub email_click_rate: f64,
    pub website_visits: f64,
    pub crm_activities: f64,
    pub deal_stage: f64,
    pub company_size: f64,
    pub recency: f64,
}

impl FeatureVector {
    /// Every feature set to `value`, clamped to [0, 1].
    pub fn uniform(value: f64) -> Self {
        let mut v = Self::default();
        for feature in Feature::ALL {
            v.set(feature, value);
        }
        v
    }

    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::EmailOpensRecent => self.email_opens_recent,
            Feature::EmailClickRate => self.email_click_rate,
            Feature::WebsiteVisits => self.website_visits,
            Feature::CrmActivities => self.crm_activities,
            Feature::DealStage => self.deal_stage,
            Feature::CompanySize => self.company_size,
            Feature::Recency => self.recency,
        }
    }

    /// Set a feature. Values are clamped to [0, 1]; NaN becomes 0.
    pub fn set(&mut self, feature: Feature, value: f64) {
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        let slot = match feature {
            Feature::EmailOpensRecent => &mut self.email_opens_recent,
            Feature::EmailClickRate => &mut self.email_click_rate,
            Feature::WebsiteVisits => &mut self.website_visits,
            Feature::CrmActivities => &mut self.crm_activities,
            Feature::DealStage => &mut self.deal_stage,
            Feature::CompanySize => &mut self.company_size,
            Feature::Recency => &mut self.recency,
        };
        *slot = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        Feature::ALL.into_iter().map(move |f| (f, self.get(f)))
    }
}

/// Raw engagement counts within the lookback window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementSummary {
    pub email_opens: u32,
    pub email_clicks: u32,
    pub email_replies: u32,
    pub website_visits: u32,
    pub crm_activities: u32,
    pub last_email_open: Option<DateTime<Utc>>,
    pub last_website_visit: Option<DateTime<Utc>>,
    pub last_crm_activity: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Leads and scores
// ---------------------------------------------------------------------------

/// Contact details of a lead, as known to the CRM collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadProfile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
}

impl LeadProfile {
    pub fn new(id: &str, email: &str) -> Self {
        Self {
            id: id.to_string(),
            email: email.to_string(),
            name: None,
            company: None,
            job_title: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

/// Priority tier. Ordered `Cold < Warm < Hot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Cold,
    Warm,
    Hot,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Cold => "cold",
            Category::Warm => "warm",
            Category::Hot => "hot",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cold" => Some(Category::Cold),
            "warm" => Some(Category::Warm),
            "hot" => Some(Category::Hot),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current score of a lead, with the inputs it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadScore {
    pub lead_id: String,
    pub score: u8,
    pub category: Category,
    pub computed_at: DateTime<Utc>,
    pub features: FeatureVector,
    pub engagement: EngagementSummary,
    pub last_activity: Option<DateTime<Utc>>,
}

impl LeadScore {
    /// Same score, category and inputs, ignoring when it was computed.
    pub fn same_result(&self, other: &LeadScore) -> bool {
        self.lead_id == other.lead_id
            && self.score == other.score
            && self.category == other.category
            && self.features == other.features
            && self.engagement == other.engagement
    }
}

/// Last notification recorded for a lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertState {
    pub lead_id: String,
    pub last_category: Category,
    pub notified_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Alert configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_HOT_THRESHOLD: u32 = 75;
pub const DEFAULT_WARM_THRESHOLD: u32 = 50;

/// Thresholds and notification switch, replaced as a whole by the admin
/// update and read as a snapshot by every refresh pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertConfig {
    pub hot_threshold: u32,
    pub warm_threshold: u32,
    pub enable_slack: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            hot_threshold: DEFAULT_HOT_THRESHOLD,
            warm_threshold: DEFAULT_WARM_THRESHOLD,
            enable_slack: false,
        }
    }
}

impl AlertConfig {
    /// Both thresholds within [0, 100] and `hot > warm`.
    pub fn validate(&self) -> Result<(), ScoringError> {
        if self.hot_threshold > 100 {
            return Err(ScoringError::Validation(format!(
                "hot_threshold {} is above 100",
                self.hot_threshold
            )));
        }
        if self.warm_threshold >= self.hot_threshold {
            return Err(ScoringError::Validation(format!(
                "warm_threshold {} must be less than hot_threshold {}",
                self.warm_threshold, self.hot_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_ordering() {
        assert!(Category::Cold < Category::Warm);
        assert!(Category::Warm < Category::Hot);
        assert_eq!(Category::parse("warm"), Some(Category::Warm));
        assert_eq!(Category::parse("lukewarm"), None);
    }

    #[test]
    fn test_feature_vector_serializes_all_keys() {
        let json = serde_json::to_value(FeatureVector::default()).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 7);
        for feature in Feature::ALL {
            assert_eq!(obj[feature.name()], 0.0);
        }
    }

    #[test]
    fn test_feature_vector_set_clamps() {
        let mut v = FeatureVector::default();
        v.set(Feature::Recency, 1.7);
        v.set(Feature::DealStage, -0.2);
        v.set(Feature::CompanySize, f64::NAN);
        assert_eq!(v.recency, 1.0);
        assert_eq!(v.deal_stage, 0.0);
        assert_eq!(v.company_size, 0.0);
    }

    #[test]
    fn test_alert_config_rejects_inverted_thresholds() {
        let config = AlertConfig { hot_threshold: 50, warm_threshold: 60, enable_slack: true };
        assert!(matches!(config.validate(), Err(ScoringError::Validation(_))));

        let equal = AlertConfig { hot_threshold: 60, warm_threshold: 60, enable_slack: true };
        assert!(equal.validate().is_err());
    }

    #[test]
    fn test_alert_config_rejects_out_of_range() {
        let config = AlertConfig { hot_threshold: 101, warm_threshold: 60, enable_slack: false };
        assert!(config.validate().is_err());
        assert!(AlertConfig::default().validate().is_ok());
    }

    #[test]
    fn test_record_validation() {
        let now = Utc::now();
        let ok = EngagementRecord::new("lead-1", EngagementKind::Open, now);
        assert!(ok.validate("lead-1").is_ok());
        assert!(ok.validate("lead-2").is_err());

        let mut wrong_source = ok.clone();
        wrong_source.source = RecordSource::Web;
        assert!(wrong_source.validate("lead-1").is_err());

        let no_value = EngagementRecord::new("lead-1", EngagementKind::StageChange, now);
        assert!(no_value.validate("lead-1").is_err());

        let negative = EngagementRecord::new("lead-1", EngagementKind::CompanySize, now)
            .with_value(-4.0);
        assert!(negative.validate("lead-1").is_err());
    }

    #[test]
    fn test_record_deserializes_from_collector_json() {
        let json = r#"{
            "source": "crm",
            "lead_id": "demo-1",
            "timestamp": "2026-01-05T10:00:00Z",
            "kind": "stage_change",
            "value": 5
        }"#;
        let record: EngagementRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.kind, EngagementKind::StageChange);
        assert_eq!(record.value, Some(5.0));
        assert!(record.validate("demo-1").is_ok());
    }
}
