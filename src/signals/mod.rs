//! Scoring core: normalization, weighted scoring, transition detection.
//!
//! Raw engagement records are folded into a seven-feature vector, weighted
//! into a 0–100 score, bucketed by the alert thresholds, and compared with
//! the lead's previous state to detect entries into hot.

pub mod decay;
pub mod normalizer;
pub mod scoring;
pub mod threshold;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScoringError;
use crate::types::{AlertConfig, EngagementRecord, LeadScore};

use self::normalizer::NormalizationParams;
use self::scoring::Weights;

/// Static scoring parameters, validated once at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringParams {
    pub weights: Weights,
    pub normalization: NormalizationParams,
}

impl ScoringParams {
    pub fn validate(&self) -> Result<(), ScoringError> {
        self.weights.validate()?;
        self.normalization.validate()
    }
}

/// Normalize, score and categorize one lead as of `now`.
pub fn score_lead(
    lead_id: &str,
    records: &[EngagementRecord],
    now: DateTime<Utc>,
    params: &ScoringParams,
    config: &AlertConfig,
) -> LeadScore {
    let normalized = normalizer::normalize(lead_id, records, now, &params.normalization);
    let score = scoring::score(&normalized.features, &params.weights);

    LeadScore {
        lead_id: lead_id.to_string(),
        score,
        category: scoring::categorize(score, config),
        computed_at: now,
        features: normalized.features,
        engagement: normalized.engagement,
        last_activity: normalized.last_activity,
    }
}
