//! In-process engagement collector.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Deserialize;

use super::EngagementSource;
use crate::error::ScoringError;
use crate::signals::normalizer::{parse_employee_count, DealStage};
use crate::types::{EngagementKind, EngagementRecord, LeadProfile};

struct LeadEntry {
    profile: LeadProfile,
    records: Vec<EngagementRecord>,
}

/// JSON import format: `{ "leads": [...], "records": [...] }`.
#[derive(Debug, Deserialize)]
struct ImportFile {
    #[serde(default)]
    leads: Vec<ImportLead>,
    #[serde(default)]
    records: Vec<EngagementRecord>,
}

/// A lead as exported by the CRM. Lifecycle stage and employee count come as
/// CRM text ("opportunity", "51-200") and become stage / company size records
/// stamped `updated_at`.
#[derive(Debug, Deserialize)]
struct ImportLead {
    #[serde(flatten)]
    profile: LeadProfile,
    #[serde(default)]
    lifecycle_stage: Option<String>,
    #[serde(default)]
    num_employees: Option<String>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

/// Leads and records held in memory, keyed by lead id.
#[derive(Default)]
pub struct MemorySource {
    leads: RwLock<BTreeMap<String, LeadEntry>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a lead, or replace the profile of a known one. Records are kept.
    pub fn upsert_lead(&self, profile: LeadProfile) {
        let mut leads = self.leads.write();
        match leads.get_mut(&profile.id) {
            Some(entry) => entry.profile = profile,
            None => {
                leads.insert(
                    profile.id.clone(),
                    LeadEntry {
                        profile,
                        records: Vec::new(),
                    },
                );
            }
        }
    }

    pub fn lead_count(&self) -> usize {
        self.leads.read().len()
    }

    /// Append a record to its lead. Unknown leads are rejected.
    pub fn push(&self, record: EngagementRecord) -> Result<(), ScoringError> {
        let mut leads = self.leads.write();
        let entry = leads
            .get_mut(&record.lead_id)
            .ok_or_else(|| ScoringError::LeadNotFound(record.lead_id.clone()))?;
        entry.records.push(record);
        Ok(())
    }

    fn track(&self, lead_id: &str, kind: EngagementKind, at: DateTime<Utc>) -> Result<(), ScoringError> {
        self.push(EngagementRecord::new(lead_id, kind, at))
    }

    pub fn track_email_open(&self, lead_id: &str, at: DateTime<Utc>) -> Result<(), ScoringError> {
        self.track(lead_id, EngagementKind::Open, at)
    }

    pub fn track_email_click(&self, lead_id: &str, at: DateTime<Utc>) -> Result<(), ScoringError> {
        self.track(lead_id, EngagementKind::Click, at)
    }

    pub fn track_email_reply(&self, lead_id: &str, at: DateTime<Utc>) -> Result<(), ScoringError> {
        self.track(lead_id, EngagementKind::Reply, at)
    }

    pub fn track_website_visit(&self, lead_id: &str, at: DateTime<Utc>) -> Result<(), ScoringError> {
        self.track(lead_id, EngagementKind::Visit, at)
    }

    /// Calls, meetings, notes and logged emails. Other kinds are rejected.
    pub fn track_crm_activity(
        &self,
        lead_id: &str,
        kind: EngagementKind,
        at: DateTime<Utc>,
    ) -> Result<(), ScoringError> {
        if !kind.is_crm_activity() && kind != EngagementKind::CrmEmail {
            return Err(ScoringError::Data(format!(
                "'{}' is not a CRM activity",
                kind.as_str()
            )));
        }
        self.track(lead_id, kind, at)
    }

    pub fn record_stage_change(
        &self,
        lead_id: &str,
        stage: DealStage,
        at: DateTime<Utc>,
    ) -> Result<(), ScoringError> {
        self.push(
            EngagementRecord::new(lead_id, EngagementKind::StageChange, at)
                .with_value(stage.ordinal() as f64),
        )
    }

    pub fn record_company_size(
        &self,
        lead_id: &str,
        employees: u32,
        at: DateTime<Utc>,
    ) -> Result<(), ScoringError> {
        self.push(
            EngagementRecord::new(lead_id, EngagementKind::CompanySize, at)
                .with_value(employees as f64),
        )
    }

    /// Build a source from a JSON export. Records for leads missing from
    /// `leads` are dropped with a warning.
    pub fn load_json(path: &Path) -> Result<Self, ScoringError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScoringError::Data(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ScoringError> {
        let import: ImportFile = serde_json::from_str(content)
            .map_err(|e| ScoringError::Data(format!("Failed to parse lead import: {}", e)))?;

        let source = Self::new();
        let imported_at = Utc::now();
        for lead in import.leads {
            let lead_id = lead.profile.id.clone();
            let at = lead.updated_at.unwrap_or(imported_at);
            source.upsert_lead(lead.profile);

            if let Some(label) = lead.lifecycle_stage.as_deref() {
                match DealStage::from_label(label) {
                    Some(stage) => source.record_stage_change(&lead_id, stage, at)?,
                    None => log::warn!(
                        "MemorySource: unknown lifecycle stage '{}' for {}",
                        label,
                        lead_id
                    ),
                }
            }
            if let Some(raw) = lead.num_employees.as_deref() {
                match parse_employee_count(raw) {
                    Some(employees) => source.record_company_size(&lead_id, employees, at)?,
                    None => log::warn!(
                        "MemorySource: unparseable employee count '{}' for {}",
                        raw,
                        lead_id
                    ),
                }
            }
        }

        let mut dropped = 0usize;
        for record in import.records {
            if source.push(record).is_err() {
                dropped += 1;
            }
        }
        if dropped > 0 {
            log::warn!(
                "MemorySource: dropped {} records for leads missing from the import",
                dropped
            );
        }
        Ok(source)
    }
}

#[async_trait]
impl EngagementSource for MemorySource {
    async fn list_leads(&self) -> Result<Vec<LeadProfile>, ScoringError> {
        Ok(self
            .leads
            .read()
            .values()
            .map(|entry| entry.profile.clone())
            .collect())
    }

    async fn fetch_records(&self, lead_id: &str) -> Result<Vec<EngagementRecord>, ScoringError> {
        self.leads
            .read()
            .get(lead_id)
            .map(|entry| entry.records.clone())
            .ok_or_else(|| ScoringError::LeadNotFound(lead_id.to_string()))
    }
}
