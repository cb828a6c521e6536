//! Hot-lead transition detection.
//!
//! Per-lead state machine over {cold, warm, hot}. A never-seen lead starts
//! cold. Only an entry into hot is notification-worthy; staying hot, cooling
//! down, or moving between cold and warm never is.

use crate::types::{AlertState, Category, LeadScore};

/// Outcome of comparing a lead's new score with what was recorded before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Entered hot from a lower tier. Notify.
    BecameHot { from: Category },
    /// Was hot, still hot.
    RemainedHot,
    /// Entered hot, but a hot notification newer than the previous score is
    /// already on record.
    AlreadyNotified { from: Category },
    /// Not hot after this pass.
    BelowHot { from: Category, to: Category },
}

impl Transition {
    pub fn fires(&self) -> bool {
        matches!(self, Transition::BecameHot { .. })
    }
}

/// Decide whether `current` is a fresh entry into hot.
pub fn evaluate(
    previous: Option<&LeadScore>,
    alert: Option<&AlertState>,
    current: &LeadScore,
) -> Transition {
    let from = previous.map_or(Category::Cold, |p| p.category);

    if current.category != Category::Hot {
        return Transition::BelowHot {
            from,
            to: current.category,
        };
    }
    if from == Category::Hot {
        return Transition::RemainedHot;
    }

    // A hot alert recorded after the previous score was computed means this
    // entry was already announced; the score history was lost or rolled back.
    let announced = alert.is_some_and(|a| {
        a.last_category == Category::Hot
            && previous.map_or(true, |p| a.notified_at >= p.computed_at)
    });
    if announced {
        return Transition::AlreadyNotified { from };
    }

    Transition::BecameHot { from }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EngagementSummary, FeatureVector};
    use chrono::{DateTime, Duration, Utc};

    fn scored(category: Category, at: DateTime<Utc>) -> LeadScore {
        LeadScore {
            lead_id: "lead-1".to_string(),
            score: match category {
                Category::Cold => 10,
                Category::Warm => 60,
                Category::Hot => 90,
            },
            category,
            computed_at: at,
            features: FeatureVector::default(),
            engagement: EngagementSummary::default(),
            last_activity: None,
        }
    }

    fn alerted(at: DateTime<Utc>) -> AlertState {
        AlertState {
            lead_id: "lead-1".to_string(),
            last_category: Category::Hot,
            notified_at: at,
        }
    }

    #[test]
    fn test_unknown_lead_entering_hot_fires() {
        let now = Utc::now();
        let t = evaluate(None, None, &scored(Category::Hot, now));
        assert_eq!(t, Transition::BecameHot { from: Category::Cold });
        assert!(t.fires());
    }

    #[test]
    fn test_warm_to_hot_fires() {
        let now = Utc::now();
        let prev = scored(Category::Warm, now - Duration::hours(1));
        let t = evaluate(Some(&prev), None, &scored(Category::Hot, now));
        assert_eq!(t, Transition::BecameHot { from: Category::Warm });
    }

    #[test]
    fn test_hot_to_hot_does_not_fire() {
        let now = Utc::now();
        let prev = scored(Category::Hot, now - Duration::hours(1));
        let t = evaluate(Some(&prev), Some(&alerted(now - Duration::hours(1))), &scored(Category::Hot, now));
        assert_eq!(t, Transition::RemainedHot);
        assert!(!t.fires());
    }

    #[test]
    fn test_cooling_never_fires() {
        let now = Utc::now();
        let prev = scored(Category::Warm, now - Duration::hours(1));
        let t = evaluate(Some(&prev), None, &scored(Category::Cold, now));
        assert_eq!(t, Transition::BelowHot { from: Category::Warm, to: Category::Cold });

        let up = evaluate(Some(&scored(Category::Cold, now)), None, &scored(Category::Warm, now));
        assert!(!up.fires());
    }

    #[test]
    fn test_reentering_hot_after_cooling_fires_again() {
        let now = Utc::now();
        let alert = alerted(now - Duration::hours(3));
        let prev = scored(Category::Warm, now - Duration::hours(1));
        let t = evaluate(Some(&prev), Some(&alert), &scored(Category::Hot, now));
        assert!(t.fires());
    }

    #[test]
    fn test_alert_newer_than_previous_score_suppresses() {
        let now = Utc::now();
        let prev = scored(Category::Warm, now - Duration::hours(2));
        let alert = alerted(now - Duration::hours(1));
        let t = evaluate(Some(&prev), Some(&alert), &scored(Category::Hot, now));
        assert_eq!(t, Transition::AlreadyNotified { from: Category::Warm });
    }

    #[test]
    fn test_lost_score_history_with_alert_on_record_suppresses() {
        let now = Utc::now();
        let alert = alerted(now - Duration::days(2));
        let t = evaluate(None, Some(&alert), &scored(Category::Hot, now));
        assert!(!t.fires());
    }
}
