//! Engagement normalizer.
//!
//! Folds a lead's raw engagement records into the fixed seven-feature
//! vector the scorer consumes, plus the raw counts shown to sales. Missing
//! data yields 0 for the affected feature; malformed records are skipped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScoringError;
use crate::types::{EngagementKind, EngagementRecord, EngagementSummary, Feature, FeatureVector};

use super::decay;

/// Caps, windows and decay constants for feature normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NormalizationParams {
    /// Window for `email_opens_recent`.
    pub opens_window_days: u32,
    /// Opens within the window that saturate `email_opens_recent`.
    pub opens_cap: f64,
    /// Window for clicks, visits and CRM activities.
    pub lookback_days: u32,
    /// Decayed visit mass that saturates `website_visits`.
    pub visits_cap: f64,
    pub visit_half_life_days: f64,
    /// Calls + meetings + notes that saturate `crm_activities`.
    pub crm_activities_cap: f64,
    /// Age of the last interaction at which `recency` reaches 0.
    pub recency_cutoff_days: f64,
}

impl Default for NormalizationParams {
    fn default() -> Self {
        Self {
            opens_window_days: 7,
            opens_cap: 10.0,
            lookback_days: 30,
            visits_cap: 8.0,
            visit_half_life_days: 7.0,
            crm_activities_cap: 6.0,
            recency_cutoff_days: 30.0,
        }
    }
}

impl NormalizationParams {
    pub fn validate(&self) -> Result<(), ScoringError> {
        let positive = [
            ("opensCap", self.opens_cap),
            ("visitsCap", self.visits_cap),
            ("visitHalfLifeDays", self.visit_half_life_days),
            ("crmActivitiesCap", self.crm_activities_cap),
            ("recencyCutoffDays", self.recency_cutoff_days),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ScoringError::Invariant(format!(
                    "normalization parameter {} must be positive, got {}",
                    name, value
                )));
            }
        }
        if self.opens_window_days == 0 || self.lookback_days == 0 {
            return Err(ScoringError::Invariant(
                "normalization windows must be at least one day".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Deal stage and company size
// ---------------------------------------------------------------------------

/// Pipeline stages in order. The ordinal is what `stage_change` records carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DealStage {
    Subscriber = 1,
    Lead = 2,
    MarketingQualified = 3,
    Qualified = 4,
    Opportunity = 5,
    Customer = 6,
}

impl DealStage {
    const COUNT: f64 = 6.0;

    pub fn from_ordinal(ordinal: f64) -> Option<Self> {
        if ordinal.fract() != 0.0 {
            return None;
        }
        match ordinal as i64 {
            1 => Some(DealStage::Subscriber),
            2 => Some(DealStage::Lead),
            3 => Some(DealStage::MarketingQualified),
            4 => Some(DealStage::Qualified),
            5 => Some(DealStage::Opportunity),
            6 => Some(DealStage::Customer),
            _ => None,
        }
    }

    /// Map a CRM lifecycle label to a stage (case-insensitive).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "subscriber" => Some(DealStage::Subscriber),
            "lead" => Some(DealStage::Lead),
            "marketing_qualified" | "marketingqualifiedlead" | "mql" => {
                Some(DealStage::MarketingQualified)
            }
            "qualified" | "salesqualifiedlead" | "sql" => Some(DealStage::Qualified),
            "opportunity" => Some(DealStage::Opportunity),
            "customer" => Some(DealStage::Customer),
            _ => None,
        }
    }

    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    /// Position in the pipeline scaled to (0, 1]; `Customer` is 1.0.
    pub fn normalized(&self) -> f64 {
        self.ordinal() as f64 / Self::COUNT
    }

    /// Inverse of `normalized`, for reading a stage back from a feature snapshot.
    pub fn from_normalized(value: f64) -> Option<Self> {
        Self::from_ordinal((value * Self::COUNT).round())
    }

    pub fn label(&self) -> &'static str {
        match self {
            DealStage::Subscriber => "subscriber",
            DealStage::Lead => "lead",
            DealStage::MarketingQualified => "marketing_qualified",
            DealStage::Qualified => "qualified",
            DealStage::Opportunity => "opportunity",
            DealStage::Customer => "customer",
        }
    }
}

/// Parse an employee count as CRMs export it: "250", "51-200" (upper bound
/// of the range) or "1000+".
pub fn parse_employee_count(raw: &str) -> Option<u32> {
    let raw = raw.trim().trim_end_matches('+');
    let upper = match raw.split_once('-') {
        Some((_, hi)) => hi,
        None => raw,
    };
    upper.trim().replace(',', "").parse().ok()
}

/// Employee count → bucket value. 0 means unknown.
pub fn company_size_bucket(employees: f64) -> f64 {
    match employees {
        e if e < 1.0 => 0.0,
        e if e <= 10.0 => 0.2,
        e if e <= 50.0 => 0.4,
        e if e <= 200.0 => 0.6,
        e if e <= 1000.0 => 0.8,
        _ => 1.0,
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Output of one normalization run for a lead.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub features: FeatureVector,
    pub engagement: EngagementSummary,
    pub last_activity: Option<DateTime<Utc>>,
}

fn latest(slot: &mut Option<DateTime<Utc>>, at: DateTime<Utc>) {
    if slot.map_or(true, |current| at > current) {
        *slot = Some(at);
    }
}

/// Normalize all records of `lead_id` as of `now`.
pub fn normalize(
    lead_id: &str,
    records: &[EngagementRecord],
    now: DateTime<Utc>,
    params: &NormalizationParams,
) -> Normalized {
    let mut engagement = EngagementSummary::default();
    let mut last_activity: Option<DateTime<Utc>> = None;
    let mut recent_opens = 0u32;
    let mut visit_mass = 0.0_f64;
    let mut stage: Option<(DateTime<Utc>, DealStage)> = None;
    let mut employees: Option<(DateTime<Utc>, f64)> = None;

    for record in records {
        if let Err(e) = record.validate(lead_id) {
            log::debug!("Normalizer: skipping record for {}: {}", lead_id, e);
            continue;
        }

        let age = decay::age_days(record.timestamp, now);
        let in_lookback = age <= params.lookback_days as f64;

        match record.kind {
            EngagementKind::Open => {
                if age <= params.opens_window_days as f64 {
                    recent_opens += 1;
                }
                if in_lookback {
                    engagement.email_opens += 1;
                    latest(&mut engagement.last_email_open, record.timestamp);
                }
            }
            EngagementKind::Click => {
                if in_lookback {
                    engagement.email_clicks += 1;
                }
            }
            EngagementKind::Reply => {
                if in_lookback {
                    engagement.email_replies += 1;
                }
            }
            EngagementKind::Visit => {
                if in_lookback {
                    engagement.website_visits += 1;
                    visit_mass += decay::decayed_weight(1.0, age, params.visit_half_life_days);
                    latest(&mut engagement.last_website_visit, record.timestamp);
                }
            }
            EngagementKind::Call | EngagementKind::Meeting | EngagementKind::Note => {
                if in_lookback {
                    engagement.crm_activities += 1;
                    latest(&mut engagement.last_crm_activity, record.timestamp);
                }
            }
            EngagementKind::CrmEmail => {
                if in_lookback {
                    latest(&mut engagement.last_crm_activity, record.timestamp);
                }
            }
            EngagementKind::StageChange => {
                // validate() guarantees the value is present
                let ordinal = record.value.unwrap_or_default();
                let Some(parsed) = DealStage::from_ordinal(ordinal) else {
                    log::debug!(
                        "Normalizer: skipping stage ordinal {} for {}",
                        ordinal,
                        lead_id
                    );
                    continue;
                };
                if stage.map_or(true, |(at, _)| record.timestamp >= at) {
                    stage = Some((record.timestamp, parsed));
                }
            }
            EngagementKind::CompanySize => {
                let count = record.value.unwrap_or_default();
                if employees.map_or(true, |(at, _)| record.timestamp >= at) {
                    employees = Some((record.timestamp, count));
                }
            }
        }

        if record.kind.is_interaction() {
            latest(&mut last_activity, record.timestamp);
        }
    }

    let mut features = FeatureVector::default();
    features.set(
        Feature::EmailOpensRecent,
        recent_opens as f64 / params.opens_cap,
    );
    features.set(
        Feature::EmailClickRate,
        engagement.email_clicks as f64 / engagement.email_opens.max(1) as f64,
    );
    features.set(Feature::WebsiteVisits, visit_mass / params.visits_cap);
    features.set(
        Feature::CrmActivities,
        engagement.crm_activities as f64 / params.crm_activities_cap,
    );
    features.set(
        Feature::DealStage,
        stage.map_or(0.0, |(_, s)| s.normalized()),
    );
    features.set(
        Feature::CompanySize,
        employees.map_or(0.0, |(_, count)| company_size_bucket(count)),
    );
    features.set(
        Feature::Recency,
        last_activity.map_or(0.0, |at| {
            decay::linear_falloff(decay::age_days(at, now), params.recency_cutoff_days)
        }),
    );

    Normalized {
        features,
        engagement,
        last_activity,
    }
}
