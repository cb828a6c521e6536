//! Demo data set, used when `demoMode` is on.
//!
//! Five contacts spanning the tiers. Each is described by its engagement
//! totals and most recent touch per channel; records are laid out one per
//! day going back from that touch.

use chrono::{DateTime, Duration, Utc};

use super::MemorySource;
use crate::error::ScoringError;
use crate::signals::normalizer::DealStage;
use crate::types::{EngagementKind, EngagementRecord, LeadProfile};

struct DemoContact {
    id: &'static str,
    email: &'static str,
    name: &'static str,
    company: &'static str,
    job_title: &'static str,
    employees: u32,
    stage: DealStage,
    created_days_ago: i64,
    opens: u32,
    clicks: u32,
    visits: u32,
    crm_activities: u32,
    last_open_hours: i64,
    last_visit_hours: i64,
    last_crm_hours: i64,
}

const CONTACTS: &[DemoContact] = &[
    DemoContact {
        id: "demo-1",
        email: "sarah.johnson@techcorp.com",
        name: "Sarah Johnson",
        company: "TechCorp Industries",
        job_title: "VP of Engineering",
        employees: 250,
        stage: DealStage::Opportunity,
        created_days_ago: 30,
        opens: 15,
        clicks: 8,
        visits: 12,
        crm_activities: 6,
        last_open_hours: 2,
        last_visit_hours: 4,
        last_crm_hours: 24,
    },
    DemoContact {
        id: "demo-2",
        email: "michael.chen@startupco.io",
        name: "Michael Chen",
        company: "StartupCo",
        job_title: "CTO",
        employees: 25,
        stage: DealStage::Qualified,
        created_days_ago: 15,
        opens: 3,
        clicks: 1,
        visits: 2,
        crm_activities: 1,
        last_open_hours: 7 * 24,
        last_visit_hours: 10 * 24,
        last_crm_hours: 14 * 24,
    },
    DemoContact {
        id: "demo-3",
        email: "jennifer.martinez@enterprise.com",
        name: "Jennifer Martinez",
        company: "Enterprise Solutions Inc",
        job_title: "Director of Sales",
        employees: 5000,
        stage: DealStage::Opportunity,
        created_days_ago: 45,
        opens: 22,
        clicks: 12,
        visits: 18,
        crm_activities: 10,
        last_open_hours: 1,
        last_visit_hours: 3,
        last_crm_hours: 6,
    },
    DemoContact {
        id: "demo-4",
        email: "david.kim@smallbiz.net",
        name: "David Kim",
        company: "Small Business LLC",
        job_title: "Owner",
        employees: 5,
        stage: DealStage::Subscriber,
        created_days_ago: 60,
        opens: 1,
        clicks: 0,
        visits: 1,
        crm_activities: 0,
        last_open_hours: 30 * 24,
        last_visit_hours: 45 * 24,
        last_crm_hours: 0,
    },
    DemoContact {
        id: "demo-5",
        email: "amanda.williams@growthco.com",
        name: "Amanda Williams",
        company: "GrowthCo",
        job_title: "Head of Marketing",
        employees: 150,
        stage: DealStage::Opportunity,
        created_days_ago: 20,
        opens: 10,
        clicks: 6,
        visits: 8,
        crm_activities: 4,
        last_open_hours: 12,
        last_visit_hours: 18,
        last_crm_hours: 48,
    },
];

const CRM_KINDS: [EngagementKind; 3] = [
    EngagementKind::Meeting,
    EngagementKind::Call,
    EngagementKind::Note,
];

fn daily(
    lead_id: &str,
    kind: EngagementKind,
    count: u32,
    last: DateTime<Utc>,
) -> impl Iterator<Item = EngagementRecord> + '_ {
    (0..count).map(move |i| EngagementRecord::new(lead_id, kind, last - Duration::days(i as i64)))
}

impl MemorySource {
    /// The demo data set, with timestamps relative to `now`.
    pub fn demo(now: DateTime<Utc>) -> Result<Self, ScoringError> {
        let source = Self::new();

        for c in CONTACTS {
            source.upsert_lead(LeadProfile {
                id: c.id.to_string(),
                email: c.email.to_string(),
                name: Some(c.name.to_string()),
                company: Some(c.company.to_string()),
                job_title: Some(c.job_title.to_string()),
            });

            let created = now - Duration::days(c.created_days_ago);
            source.record_company_size(c.id, c.employees, created)?;
            source.record_stage_change(c.id, c.stage, created)?;

            let last_open = now - Duration::hours(c.last_open_hours);
            let last_visit = now - Duration::hours(c.last_visit_hours);
            for record in daily(c.id, EngagementKind::Open, c.opens, last_open)
                .chain(daily(c.id, EngagementKind::Click, c.clicks, last_open))
                .chain(daily(c.id, EngagementKind::Visit, c.visits, last_visit))
            {
                source.push(record)?;
            }

            let last_crm = now - Duration::hours(c.last_crm_hours);
            for i in 0..c.crm_activities {
                let kind = CRM_KINDS[i as usize % CRM_KINDS.len()];
                source.track_crm_activity(c.id, kind, last_crm - Duration::days(i as i64))?;
            }
        }

        log::info!("MemorySource: loaded {} demo contacts", CONTACTS.len());
        Ok(source)
    }
}
