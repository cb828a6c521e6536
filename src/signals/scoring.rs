//! Weighted lead scorer.
//!
//! Composes the seven normalized features into a 0–100 priority score
//! using a fixed weight table, then maps the score onto cold/warm/hot.
//!
//! Default weights:
//! - Email opens, last 7 days (0.25)
//! - Email click rate (0.20)
//! - Website visits, recency-decayed (0.20)
//! - CRM activities (0.15)
//! - Deal stage (0.10)
//! - Company size (0.05)
//! - Recency of last interaction (0.05)

use serde::{Deserialize, Serialize};

use crate::error::ScoringError;
use crate::types::{AlertConfig, Category, Feature, FeatureVector};

/// Tolerance for the weights-sum-to-one check.
const WEIGHT_SUM_EPSILON: f64 = 1e-6;

/// Fixed feature weights. Must sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Weights {
    pub email_opens_recent: f64,
    pub email_click_rate: f64,
    pub website_visits: f64,
    pub crm_activities: f64,
    pub deal_stage: f64,
    pub company_size: f64,
    pub recency: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            email_opens_recent: 0.25,
            email_click_rate: 0.20,
            website_visits: 0.20,
            crm_activities: 0.15,
            deal_stage: 0.10,
            company_size: 0.05,
            recency: 0.05,
        }
    }
}

impl Weights {
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

    pub fn sum(&self) -> f64 {
        Feature::ALL.iter().map(|f| self.get(*f)).sum()
    }

    /// Every weight finite and non-negative, total within epsilon of 1.0.
    pub fn validate(&self) -> Result<(), ScoringError> {
        for feature in Feature::ALL {
            let w = self.get(feature);
            if !w.is_finite() || w < 0.0 {
                return Err(ScoringError::Invariant(format!(
                    "weight for {} must be a non-negative number, got {}",
                    feature.name(),
                    w
                )));
            }
        }
        let total = self.sum();
        if (total - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(ScoringError::Invariant(format!(
                "feature weights must sum to 1.0, got {}",
                total
            )));
        }
        Ok(())
    }
}

/// Weighted sum in [0, 1] before scaling.
pub fn raw_score(features: &FeatureVector, weights: &Weights) -> f64 {
    features
        .iter()
        .map(|(feature, value)| weights.get(feature) * value.clamp(0.0, 1.0))
        .sum()
}

/// Score a feature vector: `round(Σ wᵢ·fᵢ × 100)` clamped to [0, 100].
pub fn score(features: &FeatureVector, weights: &Weights) -> u8 {
    let scaled = (raw_score(features, weights) * 100.0).round();
    if scaled.is_nan() {
        return 0;
    }
    scaled.clamp(0.0, 100.0) as u8
}

/// Map a score to its category. Lower bounds are inclusive.
pub fn categorize(score: u8, config: &AlertConfig) -> Category {
    let score = score as u32;
    if score >= config.hot_threshold {
        Category::Hot
    } else if score >= config.warm_threshold {
        Category::Warm
    } else {
        Category::Cold
    }
}

/// Per-feature weighted contribution in score points, for explaining a score.
pub fn breakdown(features: &FeatureVector, weights: &Weights) -> Vec<(&'static str, f64)> {
    features
        .iter()
        .map(|(feature, value)| (feature.name(), weights.get(feature) * value * 100.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds(hot: u32, warm: u32) -> AlertConfig {
        AlertConfig {
            hot_threshold: hot,
            warm_threshold: warm,
            enable_slack: false,
        }
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let weights = Weights::default();
        assert!((weights.sum() - 1.0).abs() < WEIGHT_SUM_EPSILON);
        assert!(weights.validate().is_ok());
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let heavy = Weights {
            email_opens_recent: 0.5,
            ..Default::default()
        };
        assert!(matches!(heavy.validate(), Err(ScoringError::Invariant(_))));

        let negative = Weights {
            email_opens_recent: 0.35,
            recency: -0.05,
            ..Default::default()
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_zero_vector_scores_zero_and_is_cold() {
        let s = score(&FeatureVector::default(), &Weights::default());
        assert_eq!(s, 0);
        assert_eq!(categorize(s, &AlertConfig::default()), Category::Cold);
    }

    #[test]
    fn test_full_vector_scores_hundred_and_is_hot() {
        let s = score(&FeatureVector::uniform(1.0), &Weights::default());
        assert_eq!(s, 100);
        assert_eq!(categorize(s, &AlertConfig::default()), Category::Hot);
    }

    #[test]
    fn test_score_is_bounded_on_a_grid() {
        let weights = Weights::default();
        let steps = [0.0, 0.13, 0.5, 0.77, 1.0];
        for a in steps {
            for b in steps {
                let mut v = FeatureVector::uniform(a);
                v.email_opens_recent = b;
                v.recency = 1.0 - b;
                let s = score(&v, &weights);
                assert!(s <= 100, "score {} out of range for {:?}", s, v);
            }
        }
    }

    #[test]
    fn test_score_is_deterministic() {
        let v = FeatureVector {
            email_opens_recent: 0.3,
            email_click_rate: 0.45,
            website_visits: 0.61,
            crm_activities: 0.2,
            deal_stage: 5.0 / 6.0,
            company_size: 0.8,
            recency: 0.9,
        };
        let weights = Weights::default();
        let first = score(&v, &weights);
        for _ in 0..100 {
            assert_eq!(score(&v, &weights), first);
        }
    }

    #[test]
    fn test_weighted_sum_scales_to_points() {
        // 0.25·0.5 + 0.20·0.5 + 0.05·0.1 = 0.23 → 23
        let v = FeatureVector {
            email_opens_recent: 0.5,
            email_click_rate: 0.5,
            recency: 0.1,
            ..Default::default()
        };
        assert_eq!(score(&v, &Weights::default()), 23);
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let config = thresholds(80, 60);
        assert_eq!(categorize(80, &config), Category::Hot);
        assert_eq!(categorize(79, &config), Category::Warm);
        assert_eq!(categorize(60, &config), Category::Warm);
        assert_eq!(categorize(59, &config), Category::Cold);
    }

    #[test]
    fn test_category_monotonic_in_score() {
        let config = thresholds(75, 50);
        let mut previous = Category::Cold;
        for s in 0..=100u8 {
            let c = categorize(s, &config);
            assert!(c >= previous, "category dropped at score {}", s);
            previous = c;
        }
    }

    #[test]
    fn test_breakdown_sums_to_raw_score() {
        let v = FeatureVector::uniform(0.5);
        let weights = Weights::default();
        let total: f64 = breakdown(&v, &weights).iter().map(|(_, pts)| pts).sum();
        assert!((total - raw_score(&v, &weights) * 100.0).abs() < 1e-9);
        assert_eq!(breakdown(&v, &weights).len(), 7);
    }
}
