//! One refresh pass over every known lead.
//!
//! For each lead: fetch records (bounded by the collector timeout),
//! normalize and score, compare with the stored state, write the new score,
//! and notify on entry into hot. Leads run concurrently up to
//! `maxConcurrentLeads`. A lead that fails is skipped for this pass and
//! keeps its previous score.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::alerts::{DispatchOutcome, ScoreSummary};
use crate::error::ScoringError;
use crate::signals::threshold::{self, Transition};
use crate::signals::score_lead;
use crate::state::AppState;
use crate::types::{AlertConfig, LeadProfile, LeadScore};

/// Result of a completed pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub pass_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub hot: usize,
    pub warm: usize,
    pub cold: usize,
    pub alerts_sent: usize,
    /// Entered hot while notifications were switched off.
    pub alerts_disabled: usize,
    /// Entered hot but an alert was already on record.
    pub alerts_suppressed: usize,
    pub alerts_failed: usize,
    pub skipped: Vec<String>,
}

/// What happened to one lead during a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadOutcome {
    pub score: LeadScore,
    pub transition: Transition,
    pub dispatch: Option<DispatchOutcome>,
}

/// Run a pass as of the current time.
pub async fn run_pass(state: &Arc<AppState>) -> Result<RefreshSummary, ScoringError> {
    run_pass_at(state, Utc::now()).await
}

/// Run a pass with every lead scored as of `now`.
pub async fn run_pass_at(
    state: &Arc<AppState>,
    now: DateTime<Utc>,
) -> Result<RefreshSummary, ScoringError> {
    let pass_id = uuid::Uuid::new_v4().to_string();
    let config = state.alert_config();
    let timeout = state.collector_timeout;

    log::info!("Refresh: pass {} starting", pass_id);

    let leads = match tokio::time::timeout(timeout, state.source.list_leads()).await {
        Ok(result) => result?,
        Err(_) => return Err(ScoringError::timeout("List leads", timeout.as_secs())),
    };
    let lead_ids: Vec<String> = leads.iter().map(|l| l.id.clone()).collect();

    let permits = Arc::new(Semaphore::new(state.settings.max_concurrent_leads.max(1)));
    let mut tasks = JoinSet::new();
    for profile in leads {
        let state = Arc::clone(state);
        let config = Arc::clone(&config);
        let permits = Arc::clone(&permits);
        tasks.spawn(async move {
            // The semaphore is never closed
            let _permit = permits.acquire_owned().await.ok();
            let result = process_lead(&state, &config, &profile, now).await;
            (profile.id, result)
        });
    }

    let mut summary = RefreshSummary {
        pass_id,
        started_at: now,
        finished_at: now,
        total: 0,
        hot: 0,
        warm: 0,
        cold: 0,
        alerts_sent: 0,
        alerts_disabled: 0,
        alerts_suppressed: 0,
        alerts_failed: 0,
        skipped: Vec::new(),
    };
    let mut processed = HashSet::new();

    while let Some(joined) = tasks.join_next().await {
        let (lead_id, result) = match joined {
            Ok(pair) => pair,
            Err(e) => {
                log::error!("Refresh: lead task panicked: {}", e);
                continue;
            }
        };
        match result {
            Ok(outcome) => {
                processed.insert(lead_id);
                if matches!(outcome.transition, Transition::AlreadyNotified { .. }) {
                    summary.alerts_suppressed += 1;
                }
                match outcome.dispatch {
                    Some(DispatchOutcome::Sent { .. }) => summary.alerts_sent += 1,
                    Some(DispatchOutcome::Disabled) => summary.alerts_disabled += 1,
                    Some(DispatchOutcome::Failed { .. }) => summary.alerts_failed += 1,
                    None => {}
                }
            }
            Err(e) => {
                log::warn!("Refresh: skipping {} this pass: {}", lead_id, e);
            }
        }
    }

    summary.skipped = lead_ids
        .into_iter()
        .filter(|id| !processed.contains(id))
        .collect();

    let current = state.store.list_scores()?;
    let counts = ScoreSummary::from_scores(&current);
    summary.total = counts.total;
    summary.hot = counts.hot;
    summary.warm = counts.warm;
    summary.cold = counts.cold;

    state.dispatcher.send_summary(&config, &counts).await;

    summary.finished_at = Utc::now();
    state.record_pass(&summary);

    log::info!(
        "Refresh: pass {} done: {} leads ({} hot, {} warm, {} cold), {} alerts sent, {} skipped",
        summary.pass_id,
        summary.total,
        summary.hot,
        summary.warm,
        summary.cold,
        summary.alerts_sent,
        summary.skipped.len()
    );

    Ok(summary)
}

async fn process_lead(
    state: &AppState,
    config: &AlertConfig,
    profile: &LeadProfile,
    now: DateTime<Utc>,
) -> Result<LeadOutcome, ScoringError> {
    let timeout = state.collector_timeout;
    let records = match tokio::time::timeout(timeout, state.source.fetch_records(&profile.id)).await
    {
        Ok(result) => result?,
        Err(_) => {
            return Err(ScoringError::timeout(
                format!("Fetch records for {}", profile.id),
                timeout.as_secs(),
            ))
        }
    };

    let score = score_lead(&profile.id, &records, now, &state.params, config);
    apply_score(state, config, profile, score).await
}

/// Store a freshly computed score and notify if it is a new entry into hot.
pub async fn apply_score(
    state: &AppState,
    config: &AlertConfig,
    profile: &LeadProfile,
    score: LeadScore,
) -> Result<LeadOutcome, ScoringError> {
    let previous = state.store.get_score(&score.lead_id)?;
    let alert = state.store.get_alert_state(&score.lead_id)?;
    let transition = threshold::evaluate(previous.as_ref(), alert.as_ref(), &score);
    if previous.as_ref().is_some_and(|p| p.same_result(&score)) {
        log::debug!("Refresh: {} unchanged at {}", score.lead_id, score.score);
    }

    state.store.put_score(&score)?;

    let dispatch = match transition {
        Transition::BecameHot { from } => {
            log::info!(
                "Refresh: {} became hot ({} -> hot, score {})",
                score.lead_id,
                from,
                score.score
            );
            let outcome = state
                .dispatcher
                .notify_hot_lead(state.store.as_ref(), config, profile, &score)
                .await?;
            state.record_dispatch(&outcome);
            Some(outcome)
        }
        Transition::AlreadyNotified { .. } => {
            log::debug!(
                "Refresh: {} re-entered hot with an alert already on record",
                score.lead_id
            );
            None
        }
        Transition::RemainedHot | Transition::BelowHot { .. } => None,
    };

    Ok(LeadOutcome {
        score,
        transition,
        dispatch,
    })
}
