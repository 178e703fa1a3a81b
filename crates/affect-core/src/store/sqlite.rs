//! SQLite WAL persistence for sessions and derived records
//!
//! - WAL mode: readers never block the pipeline's writes
//! - Append-only tables for events, fused states and assessments
//! - Records stored as JSON payloads next to the columns used for filtering
//!   and ordering
//!
//! rusqlite is synchronous, so every call hops onto tokio's blocking pool and
//! takes the connection mutex there.

use anyhow::Context;
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use super::RecordStore;
use crate::alert::{AlertStatus, SystemAlert};
use crate::assessment::PsychologicalAssessment;
use crate::error::{AffectError, Result};
use crate::fusion::FusedEmotionState;
use crate::modality::ModalityEvent;
use crate::session::{AnalysisSession, SessionId};
use crate::types::Timestamp;

pub struct SqliteStore {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStore").field("path", &self.path).finish()
    }
}

impl SqliteStore {
    /// Open (or create) the database in WAL mode and run migrations.
    ///
    /// ```no_run
    /// use affect_core::store::SqliteStore;
    /// let store = SqliteStore::open(".affect/affect.db").unwrap();
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Self::connect(&path).map_err(into_affect)?;
        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(path: &Path) -> anyhow::Result<Connection> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory '{}'", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("opening SQLite database '{}'", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .context("configuring SQLite pragmas")?;

        migrate(&conn)?;
        Ok(conn)
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> anyhow::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await
        .map_err(|e| AffectError::Store(format!("blocking store task failed: {e}")))?
        .map_err(into_affect)
    }
}

/// Idempotent schema setup
fn migrate(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS sessions (
            id            TEXT PRIMARY KEY,
            status        TEXT NOT NULL,
            started_at_us INTEGER NOT NULL,
            payload_json  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS modality_events (
            seq           INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id    TEXT NOT NULL,
            modality      TEXT NOT NULL,
            ts_us         INTEGER NOT NULL,
            payload_json  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_events_session
            ON modality_events(session_id, ts_us);

        CREATE TABLE IF NOT EXISTS fused_states (
            seq           INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id    TEXT NOT NULL,
            ts_us         INTEGER NOT NULL,
            payload_json  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_fused_session
            ON fused_states(session_id, ts_us);

        CREATE TABLE IF NOT EXISTS assessments (
            seq           INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id    TEXT NOT NULL,
            ts_us         INTEGER NOT NULL,
            risk_level    TEXT NOT NULL,
            payload_json  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_assessments_session
            ON assessments(session_id, ts_us);

        CREATE TABLE IF NOT EXISTS alerts (
            seq           INTEGER PRIMARY KEY AUTOINCREMENT,
            id            TEXT NOT NULL UNIQUE,
            session_id    TEXT NOT NULL,
            alert_type    TEXT NOT NULL,
            severity      TEXT NOT NULL,
            status        TEXT NOT NULL,
            created_at_us INTEGER NOT NULL,
            payload_json  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_alerts_created
            ON alerts(created_at_us DESC);
        CREATE INDEX IF NOT EXISTS idx_alerts_session
            ON alerts(session_id, created_at_us DESC);
        ",
    )
    .context("migrating SQLite schema")?;
    Ok(())
}

/// Typed errors pass through; everything else becomes a store error.
fn into_affect(e: anyhow::Error) -> AffectError {
    match e.downcast::<AffectError>() {
        Ok(inner) => inner,
        Err(e) => AffectError::Store(format!("{e:#}")),
    }
}

fn micros(ts: Timestamp) -> i64 {
    ts.timestamp_micros()
}

fn decode<T: DeserializeOwned>(payload: &str, what: &str) -> anyhow::Result<T> {
    serde_json::from_str(payload).with_context(|| format!("decoding stored {what}"))
}

fn query_payloads(conn: &Connection, sql: &str, key: &str) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn load_alert(conn: &Connection, id: Uuid) -> anyhow::Result<Option<SystemAlert>> {
    let payload: Option<String> = conn
        .query_row(
            "SELECT payload_json FROM alerts WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )
        .optional()
        .context("SELECT alerts by id")?;
    payload.map(|p| decode(&p, "alert")).transpose()
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn create_session(&self, session: &AnalysisSession) -> Result<()> {
        let payload = serde_json::to_string(session)?;
        let (id, status, started) = (
            session.id.to_string(),
            session.status.to_string(),
            micros(session.started_at),
        );
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, status, started_at_us, payload_json)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, status, started, payload],
            )
            .context("INSERT sessions")?;
            Ok(())
        })
        .await
    }

    async fn update_session(&self, session: &AnalysisSession) -> Result<()> {
        let payload = serde_json::to_string(session)?;
        let session_id = session.id;
        let status = session.status.to_string();
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE sessions SET status = ?2, payload_json = ?3 WHERE id = ?1",
                    params![session_id.to_string(), status, payload],
                )
                .context("UPDATE sessions")?;
            if changed == 0 {
                return Err(AffectError::SessionNotFound(session_id).into());
            }
            Ok(())
        })
        .await
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<AnalysisSession>> {
        self.with_conn(move |conn| {
            let payload: Option<String> = conn
                .query_row(
                    "SELECT payload_json FROM sessions WHERE id = ?1",
                    params![id.to_string()],
                    |row| row.get(0),
                )
                .optional()
                .context("SELECT sessions")?;
            payload.map(|p| decode(&p, "session")).transpose()
        })
        .await
    }

    async fn append_event(&self, session_id: SessionId, event: &ModalityEvent) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        let modality = event.modality().to_string();
        let ts = micros(event.timestamp());
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO modality_events (session_id, modality, ts_us, payload_json)
                 VALUES (?1, ?2, ?3, ?4)",
                params![session_id.to_string(), modality, ts, payload],
            )
            .context("INSERT modality_events")?;
            Ok(())
        })
        .await
    }

    async fn append_fused_state(&self, state: &FusedEmotionState) -> Result<()> {
        let payload = serde_json::to_string(state)?;
        let (session_id, ts) = (state.session_id.to_string(), micros(state.timestamp));
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO fused_states (session_id, ts_us, payload_json) VALUES (?1, ?2, ?3)",
                params![session_id, ts, payload],
            )
            .context("INSERT fused_states")?;
            Ok(())
        })
        .await
    }

    async fn append_assessment(&self, assessment: &PsychologicalAssessment) -> Result<()> {
        let payload = serde_json::to_string(assessment)?;
        let session_id = assessment.session_id.to_string();
        let ts = micros(assessment.timestamp);
        let level = assessment.risk_level.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO assessments (session_id, ts_us, risk_level, payload_json)
                 VALUES (?1, ?2, ?3, ?4)",
                params![session_id, ts, level, payload],
            )
            .context("INSERT assessments")?;
            Ok(())
        })
        .await
    }

    async fn append_alert(&self, alert: &SystemAlert) -> Result<()> {
        let payload = serde_json::to_string(alert)?;
        let row = (
            alert.id.to_string(),
            alert.session_id.to_string(),
            alert.alert_type.to_string(),
            alert.severity.to_string(),
            alert.status.to_string(),
            micros(alert.created_at),
        );
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO alerts
                 (id, session_id, alert_type, severity, status, created_at_us, payload_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![row.0, row.1, row.2, row.3, row.4, row.5, payload],
            )
            .context("INSERT alerts")?;
            Ok(())
        })
        .await
    }

    async fn latest_assessment(
        &self,
        session_id: SessionId,
    ) -> Result<Option<PsychologicalAssessment>> {
        self.with_conn(move |conn| {
            let payload: Option<String> = conn
                .query_row(
                    "SELECT payload_json FROM assessments WHERE session_id = ?1
                     ORDER BY ts_us DESC, seq DESC LIMIT 1",
                    params![session_id.to_string()],
                    |row| row.get(0),
                )
                .optional()
                .context("SELECT latest assessment")?;
            payload.map(|p| decode(&p, "assessment")).transpose()
        })
        .await
    }

    async fn latest_fused_state(&self, session_id: SessionId) -> Result<Option<FusedEmotionState>> {
        self.with_conn(move |conn| {
            let payload: Option<String> = conn
                .query_row(
                    "SELECT payload_json FROM fused_states WHERE session_id = ?1
                     ORDER BY ts_us DESC, seq DESC LIMIT 1",
                    params![session_id.to_string()],
                    |row| row.get(0),
                )
                .optional()
                .context("SELECT latest fused state")?;
            payload.map(|p| decode(&p, "fused state")).transpose()
        })
        .await
    }

    async fn list_events(&self, session_id: SessionId) -> Result<Vec<ModalityEvent>> {
        self.with_conn(move |conn| {
            query_payloads(
                conn,
                "SELECT payload_json FROM modality_events WHERE session_id = ?1
                 ORDER BY ts_us, seq",
                &session_id.to_string(),
            )
            .context("SELECT modality_events")?
            .iter()
            .map(|p| decode(p, "event"))
            .collect()
        })
        .await
    }

    async fn list_fused_states(&self, session_id: SessionId) -> Result<Vec<FusedEmotionState>> {
        self.with_conn(move |conn| {
            query_payloads(
                conn,
                "SELECT payload_json FROM fused_states WHERE session_id = ?1 ORDER BY ts_us, seq",
                &session_id.to_string(),
            )
            .context("SELECT fused_states")?
            .iter()
            .map(|p| decode(p, "fused state"))
            .collect()
        })
        .await
    }

    async fn list_assessments(&self, session_id: SessionId) -> Result<Vec<PsychologicalAssessment>> {
        self.with_conn(move |conn| {
            query_payloads(
                conn,
                "SELECT payload_json FROM assessments WHERE session_id = ?1 ORDER BY ts_us, seq",
                &session_id.to_string(),
            )
            .context("SELECT assessments")?
            .iter()
            .map(|p| decode(p, "assessment"))
            .collect()
        })
        .await
    }

    async fn list_alerts(&self, session_id: Option<SessionId>) -> Result<Vec<SystemAlert>> {
        self.with_conn(move |conn| {
            let payloads = match session_id {
                Some(id) => query_payloads(
                    conn,
                    "SELECT payload_json FROM alerts WHERE session_id = ?1
                     ORDER BY created_at_us DESC, seq DESC",
                    &id.to_string(),
                ),
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT payload_json FROM alerts ORDER BY created_at_us DESC, seq DESC",
                    )?;
                    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()
                        .map_err(anyhow::Error::from)
                }
            }
            .context("SELECT alerts")?;
            payloads.iter().map(|p| decode(p, "alert")).collect()
        })
        .await
    }

    async fn get_alert(&self, id: Uuid) -> Result<Option<SystemAlert>> {
        self.with_conn(move |conn| load_alert(conn, id)).await
    }

    async fn set_alert_status(
        &self,
        id: Uuid,
        status: AlertStatus,
        at: Timestamp,
    ) -> Result<SystemAlert> {
        self.with_conn(move |conn| {
            let mut alert = load_alert(conn, id)?.ok_or(AffectError::AlertNotFound(id))?;
            alert.transition(status, at)?;

            let payload = serde_json::to_string(&alert).context("encoding alert")?;
            conn.execute(
                "UPDATE alerts SET status = ?2, payload_json = ?3 WHERE id = ?1",
                params![id.to_string(), alert.status.to_string(), payload],
            )
            .context("UPDATE alerts")?;
            Ok(alert)
        })
        .await
    }
}
