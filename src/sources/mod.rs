//! Engagement collectors.
//!
//! The engine only sees leads and their engagement records through
//! `EngagementSource`. Collectors for real CRMs, email trackers and web
//! analytics implement it; `MemorySource` is the in-process collector used
//! for demo mode, JSON imports and tests.

pub mod demo;
pub mod memory;

use async_trait::async_trait;

use crate::error::ScoringError;
use crate::types::{EngagementRecord, LeadProfile};

pub use memory::MemorySource;

#[async_trait]
pub trait EngagementSource: Send + Sync {
    /// Every lead the engine should score.
    async fn list_leads(&self) -> Result<Vec<LeadProfile>, ScoringError>;

    /// All engagement records known for one lead, in any order.
    async fn fetch_records(&self, lead_id: &str) -> Result<Vec<EngagementRecord>, ScoringError>;
}
