//! SQLite-backed lead store.
//!
//! Used when `databasePath` is configured; otherwise scores stay in the
//! in-memory store. Holds the current score and alert state per lead, plus a
//! score history row each time a lead's score or category changes. Feature
//! and engagement snapshots are stored as JSON text.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use crate::store::{LeadStore, ScorePoint};
use crate::types::{AlertState, Category, LeadScore};

/// Errors specific to store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Snapshot serialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("Corrupt stored row for {lead_id}: {reason}")]
    Corrupt { lead_id: String, reason: String },

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(StoreError::CreateDir)?;
            }
        }

        let conn = Connection::open(path)?;

        // WAL so the read API never waits on a refresh pass
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(include_str!("schema.sql"))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn parse_ts(lead_id: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            lead_id: lead_id.to_string(),
            reason: format!("bad timestamp '{}': {}", raw, e),
        })
}

fn parse_category(lead_id: &str, raw: &str) -> Result<Category, StoreError> {
    Category::parse(raw).ok_or_else(|| StoreError::Corrupt {
        lead_id: lead_id.to_string(),
        reason: format!("unknown category '{}'", raw),
    })
}

/// Raw `lead_scores` row before JSON/timestamp decoding.
struct ScoreRow {
    lead_id: String,
    score: i64,
    category: String,
    computed_at: String,
    features_json: String,
    engagement_json: String,
    last_activity: Option<String>,
}

impl ScoreRow {
    const COLUMNS: &'static str = "lead_id, score, category, computed_at, features_json, \
                                   engagement_json, last_activity";

    fn map(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            lead_id: row.get(0)?,
            score: row.get(1)?,
            category: row.get(2)?,
            computed_at: row.get(3)?,
            features_json: row.get(4)?,
            engagement_json: row.get(5)?,
            last_activity: row.get(6)?,
        })
    }

    fn decode(self) -> Result<LeadScore, StoreError> {
        let score = u8::try_from(self.score)
            .ok()
            .filter(|s| *s <= 100)
            .ok_or_else(|| StoreError::Corrupt {
                lead_id: self.lead_id.clone(),
                reason: format!("score {} out of range", self.score),
            })?;
        let last_activity = match self.last_activity.as_deref() {
            Some(raw) => Some(parse_ts(&self.lead_id, raw)?),
            None => None,
        };

        Ok(LeadScore {
            score,
            category: parse_category(&self.lead_id, &self.category)?,
            computed_at: parse_ts(&self.lead_id, &self.computed_at)?,
            features: serde_json::from_str(&self.features_json)?,
            engagement: serde_json::from_str(&self.engagement_json)?,
            last_activity,
            lead_id: self.lead_id,
        })
    }
}

impl LeadStore for SqliteStore {
    fn get_score(&self, lead_id: &str) -> Result<Option<LeadScore>, StoreError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                &format!("SELECT {} FROM lead_scores WHERE lead_id = ?1", ScoreRow::COLUMNS),
                params![lead_id],
                ScoreRow::map,
            )
            .optional()?;
        row.map(ScoreRow::decode).transpose()
    }

    fn put_score(&self, score: &LeadScore) -> Result<(), StoreError> {
        let features_json = serde_json::to_string(&score.features)?;
        let engagement_json = serde_json::to_string(&score.engagement)?;
        let computed_at = score.computed_at.to_rfc3339();

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let current: Option<(i64, String)> = tx
            .query_row(
                "SELECT score, category FROM lead_scores WHERE lead_id = ?1",
                params![score.lead_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let changed = current.map_or(true, |(s, c)| {
            s != score.score as i64 || c != score.category.as_str()
        });

        tx.execute(
            "INSERT INTO lead_scores (
                lead_id, score, category, computed_at, features_json, engagement_json, last_activity
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(lead_id) DO UPDATE SET
                score = excluded.score,
                category = excluded.category,
                computed_at = excluded.computed_at,
                features_json = excluded.features_json,
                engagement_json = excluded.engagement_json,
                last_activity = excluded.last_activity",
            params![
                score.lead_id,
                score.score as i64,
                score.category.as_str(),
                computed_at,
                features_json,
                engagement_json,
                score.last_activity.map(|t| t.to_rfc3339()),
            ],
        )?;

        if changed {
            tx.execute(
                "INSERT INTO lead_score_history (lead_id, score, category, computed_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    score.lead_id,
                    score.score as i64,
                    score.category.as_str(),
                    computed_at
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn list_scores(&self) -> Result<Vec<LeadScore>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM lead_scores ORDER BY score DESC, lead_id",
            ScoreRow::COLUMNS
        ))?;
        let rows = stmt
            .query_map([], ScoreRow::map)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ScoreRow::decode).collect()
    }

    fn get_alert_state(&self, lead_id: &str) -> Result<Option<AlertState>, StoreError> {
        let conn = self.conn.lock();
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT last_category, notified_at FROM alert_states WHERE lead_id = ?1",
                params![lead_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((category, notified_at)) => Ok(Some(AlertState {
                lead_id: lead_id.to_string(),
                last_category: parse_category(lead_id, &category)?,
                notified_at: parse_ts(lead_id, &notified_at)?,
            })),
            None => Ok(None),
        }
    }

    fn put_alert_state(&self, state: &AlertState) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO alert_states (lead_id, last_category, notified_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(lead_id) DO UPDATE SET
                last_category = excluded.last_category,
                notified_at = excluded.notified_at",
            params![
                state.lead_id,
                state.last_category.as_str(),
                state.notified_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn score_history(&self, lead_id: &str, limit: usize) -> Result<Vec<ScorePoint>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT score, category, computed_at FROM lead_score_history
             WHERE lead_id = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![lead_id, limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(score, category, computed_at)| {
                Ok(ScorePoint {
                    score: score.clamp(0, 100) as u8,
                    category: parse_category(lead_id, &category)?,
                    computed_at: parse_ts(lead_id, &computed_at)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::make_score;
    use chrono::Duration;

    fn temp_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteStore::open(&dir.path().join("state").join("leadscore.db"))
            .expect("open store");
        (dir, store)
    }

    #[test]
    fn test_score_roundtrip_preserves_snapshot() {
        let (_dir, store) = temp_store();
        let mut score = make_score("lead-1", 82, Category::Hot);
        score.features.deal_stage = 5.0 / 6.0;
        score.engagement.email_opens = 14;
        score.last_activity = Some(score.computed_at - Duration::hours(2));

        store.put_score(&score).unwrap();
        let loaded = store.get_score("lead-1").unwrap().unwrap();
        assert_eq!(loaded.score, 82);
        assert_eq!(loaded.category, Category::Hot);
        assert_eq!(loaded.features, score.features);
        assert_eq!(loaded.engagement, score.engagement);
        assert_eq!(
            loaded.computed_at.timestamp(),
            score.computed_at.timestamp()
        );
    }

    #[test]
    fn test_missing_lead_is_none() {
        let (_dir, store) = temp_store();
        assert!(store.get_score("nobody").unwrap().is_none());
        assert!(store.get_alert_state("nobody").unwrap().is_none());
    }

    #[test]
    fn test_list_scores_orders_by_score() {
        let (_dir, store) = temp_store();
        store.put_score(&make_score("a", 20, Category::Cold)).unwrap();
        store.put_score(&make_score("b", 90, Category::Hot)).unwrap();
        store.put_score(&make_score("c", 55, Category::Warm)).unwrap();

        let ids: Vec<_> = store
            .list_scores()
            .unwrap()
            .into_iter()
            .map(|s| s.lead_id)
            .collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_history_records_only_changes() {
        let (_dir, store) = temp_store();
        store.put_score(&make_score("lead-1", 55, Category::Cold)).unwrap();
        store.put_score(&make_score("lead-1", 55, Category::Cold)).unwrap();
        store.put_score(&make_score("lead-1", 65, Category::Warm)).unwrap();
        store.put_score(&make_score("lead-1", 82, Category::Hot)).unwrap();

        let history = store.score_history("lead-1", 10).unwrap();
        let scores: Vec<u8> = history.iter().map(|p| p.score).collect();
        assert_eq!(scores, vec![82, 65, 55]);
    }

    #[test]
    fn test_alert_state_upsert() {
        let (_dir, store) = temp_store();
        let first = AlertState {
            lead_id: "lead-1".to_string(),
            last_category: Category::Hot,
            notified_at: Utc::now() - Duration::days(1),
        };
        store.put_alert_state(&first).unwrap();
        let second = AlertState {
            notified_at: Utc::now(),
            ..first.clone()
        };
        store.put_alert_state(&second).unwrap();

        let loaded = store.get_alert_state("lead-1").unwrap().unwrap();
        assert_eq!(loaded.notified_at.timestamp(), second.notified_at.timestamp());
        assert_eq!(loaded.last_category, Category::Hot);
    }

    #[test]
    fn test_reopen_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leadscore.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.put_score(&make_score("lead-1", 70, Category::Warm)).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get_score("lead-1").unwrap().unwrap().score, 70);
    }

    #[tokio::test]
    async fn test_hot_lead_not_realerted_after_restart() {
        use std::sync::Arc;

        use crate::config::Settings;
        use crate::refresh::run_pass_at;
        use crate::state::AppState;
        use crate::test_utils::{fast_retry, saturated_records, source_with_leads, RecordingChannel};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leadscore.db");
        let now = Utc::now();
        let source = Arc::new(source_with_leads(&["hot-lead"]));
        for record in saturated_records("hot-lead", now) {
            source.push(record).unwrap();
        }
        let channel = Arc::new(RecordingChannel::default());

        let mut settings = Settings {
            notify: fast_retry(),
            ..Default::default()
        };
        settings.slack.enabled = Some(true);

        for restart in 0..2 {
            let state = AppState::new(
                settings.clone(),
                source.clone(),
                Arc::new(SqliteStore::open(&path).unwrap()),
                channel.clone(),
            )
            .unwrap();
            let summary = run_pass_at(&Arc::new(state), now + Duration::minutes(restart))
                .await
                .unwrap();
            assert_eq!(summary.hot, 1);
        }

        assert_eq!(channel.hot_leads().len(), 1);
    }
}
