//! SQLite-backed checkpoint persistence. One row per session — the
//! latest snapshot replaces any prior one, so recovery always resumes
//! from the most recent committed step.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::debug;

use aegis_core::error::{AegisError, Result};
use aegis_core::traits::{CheckpointRecord, Checkpointer, CheckpointSummary};
use aegis_core::types::{SessionId, WorkflowNode};

pub struct SqliteCheckpointStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = "PRAGMA journal_mode=WAL;
PRAGMA synchronous=NORMAL;

CREATE TABLE IF NOT EXISTS checkpoints (
    session_id TEXT PRIMARY KEY,
    step INTEGER NOT NULL,
    next_node TEXT NOT NULL,
    state_json TEXT NOT NULL,
    timestamp TEXT NOT NULL
);";

impl SqliteCheckpointStore {
    /// Open or create the checkpoint database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(store_err)?;
        Self::with_connection(conn)
    }

    /// In-memory store for tests; nothing survives the process.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(store_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| AegisError::Checkpoint(e.to_string()))
    }
}

impl Checkpointer for SqliteCheckpointStore {
    fn save(&self, record: &CheckpointRecord) -> Result<()> {
        let state_json = serde_json::to_string(&record.state)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO checkpoints (session_id, step, next_node, state_json, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(session_id) DO UPDATE SET
                 step = excluded.step,
                 next_node = excluded.next_node,
                 state_json = excluded.state_json,
                 timestamp = excluded.timestamp",
            params![
                record.session_id.0,
                record.step as i64,
                record.next_node.as_str(),
                state_json,
                record.timestamp.to_rfc3339(),
            ],
        )
        .map_err(store_err)?;
        debug!(session = %record.session_id, step = record.step, next = %record.next_node, "Checkpoint saved");
        Ok(())
    }

    fn load(&self, session_id: &SessionId) -> Result<Option<CheckpointRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT session_id, step, next_node, state_json, timestamp
                 FROM checkpoints WHERE session_id = ?1",
            )
            .map_err(store_err)?;

        let row = stmt
            .query_row(params![session_id.0], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(store_err(other)),
            })?;

        let Some((sid, step, next_node, state_json, timestamp)) = row else {
            return Ok(None);
        };

        Ok(Some(CheckpointRecord {
            session_id: SessionId(sid),
            step: step as u32,
            next_node: parse_node(&next_node)?,
            state: serde_json::from_str(&state_json)?,
            timestamp: parse_timestamp(&timestamp),
        }))
    }

    fn delete(&self, session_id: &SessionId) -> Result<usize> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM checkpoints WHERE session_id = ?1",
            params![session_id.0],
        )
        .map_err(store_err)
    }

    fn list(&self) -> Result<Vec<CheckpointSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT session_id, step, next_node, timestamp
                 FROM checkpoints ORDER BY timestamp DESC",
            )
            .map_err(store_err)?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(store_err)?;

        let mut summaries = Vec::new();
        for row in rows {
            let (sid, step, next_node, timestamp) = row.map_err(store_err)?;
            summaries.push(CheckpointSummary {
                session_id: SessionId(sid),
                step: step as u32,
                next_node: parse_node(&next_node)?,
                timestamp: parse_timestamp(&timestamp),
            });
        }
        Ok(summaries)
    }
}

fn store_err(e: rusqlite::Error) -> AegisError {
    AegisError::Checkpoint(e.to_string())
}

fn parse_node(s: &str) -> Result<WorkflowNode> {
    WorkflowNode::parse_directive(s)
        .map_err(|_| AegisError::Checkpoint(format!("corrupt checkpoint node: {s}")))
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_core::state::{SessionState, StateUpdate};
    use aegis_core::types::{AgentName, AlertContext, Finding, ScenarioCode};

    fn record(session_id: SessionId, step: u32, next: WorkflowNode) -> CheckpointRecord {
        let alert = AlertContext::new(
            "A-002",
            ScenarioCode::Structuring,
            "CUST-102",
            "3 cash deposits in 7 days",
        );
        let state = SessionState::new_resolve(session_id.clone(), alert).apply(
            StateUpdate::default().with_finding(Finding::new(
                AgentName::Investigator,
                "aggregate_recent_deposits: 28500",
            )),
        );
        CheckpointRecord {
            session_id,
            step,
            next_node: next,
            state,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn round_trip_preserves_state_and_cursor() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        let sid = SessionId::new();
        store
            .save(&record(sid.clone(), 3, WorkflowNode::Adjudicator))
            .unwrap();

        let loaded = store.load(&sid).unwrap().unwrap();
        assert_eq!(loaded.step, 3);
        assert_eq!(loaded.next_node, WorkflowNode::Adjudicator);
        assert_eq!(loaded.state.findings.len(), 1);
        assert_eq!(
            loaded.state.findings[0].content,
            "aggregate_recent_deposits: 28500"
        );
    }

    #[test]
    fn save_replaces_prior_snapshot() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        let sid = SessionId::new();
        store
            .save(&record(sid.clone(), 1, WorkflowNode::Investigator))
            .unwrap();
        store
            .save(&record(sid.clone(), 2, WorkflowNode::Router))
            .unwrap();

        let loaded = store.load(&sid).unwrap().unwrap();
        assert_eq!(loaded.step, 2);
        assert_eq!(loaded.next_node, WorkflowNode::Router);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn sessions_are_isolated() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        let a = SessionId::new();
        let b = SessionId::new();
        store
            .save(&record(a.clone(), 1, WorkflowNode::Investigator))
            .unwrap();
        store
            .save(&record(b.clone(), 5, WorkflowNode::Terminal))
            .unwrap();

        assert_eq!(store.load(&a).unwrap().unwrap().step, 1);
        assert_eq!(store.load(&b).unwrap().unwrap().step, 5);
        assert_eq!(store.delete(&a).unwrap(), 1);
        assert!(store.load(&a).unwrap().is_none());
        assert!(store.load(&b).unwrap().is_some());
    }

    #[test]
    fn unknown_session_loads_none() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        assert!(store.load(&SessionId::new()).unwrap().is_none());
        assert_eq!(store.delete(&SessionId::new()).unwrap(), 0);
    }

    #[test]
    fn survives_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints/aegis.db");
        let sid = SessionId::new();

        {
            let store = SqliteCheckpointStore::open(&path).unwrap();
            store
                .save(&record(sid.clone(), 4, WorkflowNode::ActionExecutor))
                .unwrap();
        }

        let store = SqliteCheckpointStore::open(&path).unwrap();
        let loaded = store.load(&sid).unwrap().unwrap();
        assert_eq!(loaded.step, 4);
        assert_eq!(loaded.next_node, WorkflowNode::ActionExecutor);
    }
}
