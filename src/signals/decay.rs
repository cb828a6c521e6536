//! Temporal decay for engagement weighting (pure math, no I/O).

use chrono::{DateTime, Utc};

/// Weight of an event `age_days` old under exponential half-life decay:
/// `weight * 2^(-age / half_life)`. Non-positive half-lives disable decay.
pub fn decayed_weight(weight: f64, age_days: f64, half_life_days: f64) -> f64 {
    if half_life_days <= 0.0 {
        return weight;
    }
    weight * (-age_days.max(0.0) / half_life_days).exp2()
}

/// Linear falloff from 1.0 at age 0 to 0.0 at `cutoff_days` and beyond.
pub fn linear_falloff(age_days: f64, cutoff_days: f64) -> f64 {
    if cutoff_days <= 0.0 {
        return 0.0;
    }
    (1.0 - age_days.max(0.0) / cutoff_days).clamp(0.0, 1.0)
}

/// Fractional days between `at` and `now`. Future timestamps count as age 0.
pub fn age_days(at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let secs = (now - at).num_seconds() as f64;
    (secs / 86400.0).max(0.0)
}
