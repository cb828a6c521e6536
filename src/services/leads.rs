// Leads service: ranked lead views, single-lead detail, manual refresh.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ScoringError;
use crate::scheduler::{self, RefreshOutcome};
use crate::signals::scoring;
use crate::state::AppState;
use crate::store::ScorePoint;
use crate::types::{Category, EngagementSummary, FeatureVector, LeadProfile, LeadScore};

/// One lead as shown to sales.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadView {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub score: u8,
    pub score_category: Category,
    pub last_activity: Option<DateTime<Utc>>,
    pub engagement_summary: EngagementSummary,
    pub computed_at: DateTime<Utc>,
    /// The lead was not rescored by the latest pass.
    pub stale: bool,
}

/// A lead with the inputs behind its score.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadDetail {
    #[serde(flatten)]
    pub lead: LeadView,
    pub features: FeatureVector,
    /// Points contributed by each feature.
    pub score_breakdown: Vec<FeatureContribution>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureContribution {
    pub feature: &'static str,
    pub points: f64,
}

/// Filters for `list_leads`.
#[derive(Debug, Clone, Default)]
pub struct LeadQuery {
    pub category: Option<Category>,
    pub min_score: Option<u8>,
    pub limit: Option<usize>,
}

fn to_view(
    score: LeadScore,
    profile: Option<&LeadProfile>,
    pass_started: Option<DateTime<Utc>>,
) -> LeadView {
    LeadView {
        email: profile.map(|p| p.email.clone()).unwrap_or_default(),
        name: profile.and_then(|p| p.name.clone()),
        company: profile.and_then(|p| p.company.clone()),
        job_title: profile.and_then(|p| p.job_title.clone()),
        score: score.score,
        score_category: score.category,
        last_activity: score.last_activity,
        engagement_summary: score.engagement,
        computed_at: score.computed_at,
        stale: pass_started.is_some_and(|started| score.computed_at < started),
        id: score.lead_id,
    }
}

/// Lead profiles keyed by id. An unreachable source yields no profiles so
/// reads still serve the last stored scores.
async fn profiles(state: &AppState) -> HashMap<String, LeadProfile> {
    let leads = match tokio::time::timeout(state.collector_timeout, state.source.list_leads()).await
    {
        Ok(Ok(leads)) => leads,
        Ok(Err(e)) => {
            log::warn!("Leads service: lead profiles unavailable: {}", e);
            return HashMap::new();
        }
        Err(_) => {
            log::warn!(
                "Leads service: listing lead profiles timed out after {}s",
                state.collector_timeout.as_secs()
            );
            return HashMap::new();
        }
    };
    leads.into_iter().map(|p| (p.id.clone(), p)).collect()
}

/// Scored leads, highest score first.
pub async fn list_leads(state: &AppState, query: &LeadQuery) -> Result<Vec<LeadView>, ScoringError> {
    let profiles = profiles(state).await;
    let pass_started = state.last_pass().map(|p| p.started_at);

    let mut scores = state.store.list_scores()?;
    scores.retain(|s| {
        query.category.map_or(true, |c| s.category == c)
            && query.min_score.map_or(true, |min| s.score >= min)
    });
    scores.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.lead_id.cmp(&b.lead_id)));
    if let Some(limit) = query.limit {
        scores.truncate(limit);
    }

    Ok(scores
        .into_iter()
        .map(|s| {
            let profile = profiles.get(&s.lead_id);
            to_view(s, profile, pass_started)
        })
        .collect())
}

pub async fn get_lead(state: &AppState, lead_id: &str) -> Result<LeadDetail, ScoringError> {
    let score = state
        .store
        .get_score(lead_id)?
        .ok_or_else(|| ScoringError::LeadNotFound(lead_id.to_string()))?;
    let profiles = profiles(state).await;
    let pass_started = state.last_pass().map(|p| p.started_at);

    let features = score.features;
    let score_breakdown = scoring::breakdown(&features, &state.params.weights)
        .into_iter()
        .map(|(feature, points)| FeatureContribution { feature, points })
        .collect();

    Ok(LeadDetail {
        lead: to_view(score, profiles.get(lead_id), pass_started),
        features,
        score_breakdown,
    })
}

pub fn score_history(
    state: &AppState,
    lead_id: &str,
    limit: usize,
) -> Result<Vec<ScorePoint>, ScoringError> {
    if state.store.get_score(lead_id)?.is_none() {
        return Err(ScoringError::LeadNotFound(lead_id.to_string()));
    }
    Ok(state.store.score_history(lead_id, limit)?)
}

/// Manual refresh. Runs the pass in the caller's task unless one is already
/// in flight, in which case a single follow-up is queued.
pub async fn refresh_scores(state: &Arc<AppState>) -> Result<RefreshOutcome, ScoringError> {
    log::info!("Leads service: manual score refresh requested");
    scheduler::refresh_now(state).await
}
