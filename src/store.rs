//! Read/write contract for current lead scores and alert states.
//!
//! The engine never locks around the store: a refresh pass is the only
//! writer, and each call is atomic per lead.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::db::StoreError;
use crate::types::{AlertState, Category, LeadScore};

/// One entry of a lead's score history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScorePoint {
    pub score: u8,
    pub category: Category,
    pub computed_at: DateTime<Utc>,
}

pub trait LeadStore: Send + Sync {
    fn get_score(&self, lead_id: &str) -> Result<Option<LeadScore>, StoreError>;

    /// Insert or replace the current score of a lead.
    fn put_score(&self, score: &LeadScore) -> Result<(), StoreError>;

    fn list_scores(&self) -> Result<Vec<LeadScore>, StoreError>;

    fn get_alert_state(&self, lead_id: &str) -> Result<Option<AlertState>, StoreError>;

    fn put_alert_state(&self, state: &AlertState) -> Result<(), StoreError>;

    /// Most recent first. Stores that keep no history return nothing.
    fn score_history(&self, _lead_id: &str, _limit: usize) -> Result<Vec<ScorePoint>, StoreError> {
        Ok(Vec::new())
    }
}

/// Non-persistent store for deployments without a database.
#[derive(Default)]
pub struct MemoryStore {
    scores: DashMap<String, LeadScore>,
    alerts: DashMap<String, AlertState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LeadStore for MemoryStore {
    fn get_score(&self, lead_id: &str) -> Result<Option<LeadScore>, StoreError> {
        Ok(self.scores.get(lead_id).map(|entry| entry.value().clone()))
    }

    fn put_score(&self, score: &LeadScore) -> Result<(), StoreError> {
        self.scores.insert(score.lead_id.clone(), score.clone());
        Ok(())
    }

    fn list_scores(&self) -> Result<Vec<LeadScore>, StoreError> {
        Ok(self.scores.iter().map(|entry| entry.value().clone()).collect())
    }

    fn get_alert_state(&self, lead_id: &str) -> Result<Option<AlertState>, StoreError> {
        Ok(self.alerts.get(lead_id).map(|entry| entry.value().clone()))
    }

    fn put_alert_state(&self, state: &AlertState) -> Result<(), StoreError> {
        self.alerts.insert(state.lead_id.clone(), state.clone());
        Ok(())
    }
}
