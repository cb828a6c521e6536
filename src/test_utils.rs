//! Shared test fixtures.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::alerts::{HotLeadAlert, NotificationChannel, RetryPolicy, ScoreSummary};
use crate::error::ScoringError;
use crate::sources::{EngagementSource, MemorySource};
use crate::types::{
    Category, EngagementKind, EngagementRecord, EngagementSummary, FeatureVector, LeadProfile,
    LeadScore,
};

pub fn make_score(lead_id: &str, score: u8, category: Category) -> LeadScore {
    LeadScore {
        lead_id: lead_id.to_string(),
        score,
        category,
        computed_at: Utc::now(),
        features: FeatureVector::uniform(score as f64 / 100.0),
        engagement: EngagementSummary::default(),
        last_activity: None,
    }
}

/// Retry policy with millisecond backoff so failure tests stay fast.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff_ms: 1,
        timeout_secs: 5,
    }
}

/// Records that saturate every feature as of `now`.
pub fn saturated_records(lead_id: &str, now: DateTime<Utc>) -> Vec<EngagementRecord> {
    let mut records = Vec::new();
    for (kind, n) in [
        (EngagementKind::Open, 12),
        (EngagementKind::Click, 12),
        (EngagementKind::Visit, 9),
        (EngagementKind::Call, 6),
    ] {
        records.extend((0..n).map(|_| EngagementRecord::new(lead_id, kind, now)));
    }
    records.push(EngagementRecord::new(lead_id, EngagementKind::StageChange, now).with_value(6.0));
    records.push(EngagementRecord::new(lead_id, EngagementKind::CompanySize, now).with_value(5000.0));
    records
}

/// Source with one lead per id and no records.
pub fn source_with_leads(ids: &[&str]) -> MemorySource {
    let source = MemorySource::new();
    for id in ids {
        source.upsert_lead(LeadProfile::new(id, &format!("{}@example.com", id)));
    }
    source
}

/// Channel that records what it was asked to send.
#[derive(Default)]
pub struct RecordingChannel {
    hot: Mutex<Vec<String>>,
    summaries: Mutex<Vec<ScoreSummary>>,
}

impl RecordingChannel {
    pub fn hot_leads(&self) -> Vec<String> {
        self.hot.lock().clone()
    }

    pub fn summaries(&self) -> Vec<ScoreSummary> {
        self.summaries.lock().clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send_hot_lead(&self, alert: &HotLeadAlert) -> Result<(), ScoringError> {
        self.hot.lock().push(alert.lead_id.clone());
        Ok(())
    }

    async fn send_summary(&self, summary: &ScoreSummary) -> Result<(), ScoringError> {
        self.summaries.lock().push(*summary);
        Ok(())
    }
}

/// Channel that fails the first `fail_first` attempts (or every attempt).
/// Failures are transient unless built with `rejecting`.
pub struct FailingChannel {
    fail_first: Option<u32>,
    rejects: bool,
    attempts: AtomicU32,
}

impl FailingChannel {
    pub fn always() -> Self {
        Self {
            fail_first: None,
            rejects: false,
            attempts: AtomicU32::new(0),
        }
    }

    pub fn failing_first(n: u32) -> Self {
        Self {
            fail_first: Some(n),
            rejects: false,
            attempts: AtomicU32::new(0),
        }
    }

    /// Every attempt fails with a non-retryable error.
    pub fn rejecting() -> Self {
        Self {
            fail_first: None,
            rejects: true,
            attempts: AtomicU32::new(0),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationChannel for FailingChannel {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn send_hot_lead(&self, _alert: &HotLeadAlert) -> Result<(), ScoringError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        match self.fail_first {
            Some(n) if attempt > n => Ok(()),
            _ if self.rejects => Err(ScoringError::Validation("invalid_payload".to_string())),
            _ => Err(ScoringError::External("webhook returned 503".to_string())),
        }
    }

    async fn send_summary(&self, _summary: &ScoreSummary) -> Result<(), ScoringError> {
        Err(ScoringError::External("webhook returned 503".to_string()))
    }
}

/// Wraps a source and never answers `fetch_records` for stalled leads.
pub struct StallingSource {
    inner: Arc<MemorySource>,
    stalled: Mutex<HashSet<String>>,
}

impl StallingSource {
    pub fn new(inner: Arc<MemorySource>) -> Self {
        Self {
            inner,
            stalled: Mutex::new(HashSet::new()),
        }
    }

    pub fn stall(&self, lead_id: &str) {
        self.stalled.lock().insert(lead_id.to_string());
    }

    pub fn resume(&self, lead_id: &str) {
        self.stalled.lock().remove(lead_id);
    }
}

#[async_trait]
impl EngagementSource for StallingSource {
    async fn list_leads(&self) -> Result<Vec<LeadProfile>, ScoringError> {
        self.inner.list_leads().await
    }

    async fn fetch_records(&self, lead_id: &str) -> Result<Vec<EngagementRecord>, ScoringError> {
        let stalled = self.stalled.lock().contains(lead_id);
        if stalled {
            std::future::pending::<()>().await;
        }
        self.inner.fetch_records(lead_id).await
    }
}

/// Source whose collector is down: every call fails.
pub struct UnreachableSource;

#[async_trait]
impl EngagementSource for UnreachableSource {
    async fn list_leads(&self) -> Result<Vec<LeadProfile>, ScoringError> {
        Err(ScoringError::External("crm down".to_string()))
    }

    async fn fetch_records(&self, _lead_id: &str) -> Result<Vec<EngagementRecord>, ScoringError> {
        Err(ScoringError::External("crm down".to_string()))
    }
}
