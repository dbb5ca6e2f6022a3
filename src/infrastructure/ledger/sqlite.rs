use crate::domain::entities::opinion::ModelOpinion;
use crate::domain::error::DomainError;
use crate::domain::ports::opinion_ledger::{OpinionLedger, OpinionRecord};
use crate::domain::values::signal::Signal;
use crate::infrastructure::ledger::migrations::run_migrations;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;
use tracing::warn;

const SELECT_COLUMNS: &str = "SELECT opinion_id, model_id, request_id, asset, signal, confidence, uncertainty, rationale, latency_ms, consensus_signal, included, recorded_at, settled_at FROM opinions";

pub struct SqliteOpinionLedger {
    conn: Mutex<Connection>,
    capacity_per_model: usize,
}

impl SqliteOpinionLedger {
    pub fn open(path: &Path, capacity_per_model: usize) -> Result<Self, DomainError> {
        let conn = Connection::open(path)
            .map_err(|e| DomainError::Database(format!("DB error: {e}")))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| DomainError::Database(format!("WAL error: {e}")))?;
        Self::with_connection(conn, capacity_per_model)
    }

    pub fn in_memory(capacity_per_model: usize) -> Result<Self, DomainError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DomainError::Database(format!("DB error: {e}")))?;
        Self::with_connection(conn, capacity_per_model)
    }

    fn with_connection(conn: Connection, capacity_per_model: usize) -> Result<Self, DomainError> {
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            capacity_per_model: capacity_per_model.max(1),
        })
    }

    fn parse_time(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| {
                warn!(value = raw, "invalid timestamp in opinion ledger");
                DateTime::<Utc>::UNIX_EPOCH
            })
    }

    fn row_to_record(row: &rusqlite::Row) -> Result<OpinionRecord, rusqlite::Error> {
        let signal_str: String = row.get(4)?;
        let rationale_json: String = row.get(7)?;
        let consensus_str: Option<String> = row.get(9)?;
        let recorded_str: String = row.get(11)?;
        let settled_str: Option<String> = row.get(12)?;

        let signal: Signal = signal_str.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, e.into())
        })?;

        Ok(OpinionRecord {
            opinion: ModelOpinion {
                opinion_id: row.get(0)?,
                model_id: row.get(1)?,
                signal,
                confidence: row.get(5)?,
                uncertainty: row.get(6)?,
                rationale: serde_json::from_str(&rationale_json).unwrap_or_default(),
                latency_ms: row.get::<_, i64>(8)?.max(0) as u64,
            },
            request_id: row.get(2)?,
            asset: row.get(3)?,
            consensus_signal: consensus_str.and_then(|s| s.parse().ok()),
            included: row.get(10)?,
            recorded_at: Self::parse_time(&recorded_str),
            settled_at: settled_str.as_deref().map(Self::parse_time),
        })
    }
}

impl OpinionLedger for SqliteOpinionLedger {
    fn record(&self, records: &[OpinionRecord]) -> Result<(), DomainError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let tx = conn.transaction()?;
        let mut models = BTreeSet::new();

        for r in records {
            let rationale = serde_json::to_string(&r.opinion.rationale)
                .map_err(|e| DomainError::Parse(e.to_string()))?;
            tx.execute(
                "INSERT OR REPLACE INTO opinions (opinion_id, model_id, request_id, asset, signal, confidence, uncertainty, rationale, latency_ms, consensus_signal, included, recorded_at, settled_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    r.opinion.opinion_id,
                    r.opinion.model_id,
                    r.request_id,
                    r.asset,
                    r.opinion.signal.to_string(),
                    r.opinion.confidence,
                    r.opinion.uncertainty,
                    rationale,
                    r.opinion.latency_ms.min(i64::MAX as u64) as i64,
                    r.consensus_signal.map(|s| s.to_string()),
                    r.included,
                    r.recorded_at.to_rfc3339(),
                    r.settled_at.map(|dt| dt.to_rfc3339()),
                ],
            ).map_err(|e| DomainError::Database(format!("Failed to record opinion: {e}")))?;
            models.insert(r.opinion.model_id.as_str());
        }

        for model_id in models {
            tx.execute(
                "DELETE FROM opinions WHERE model_id = ?1 AND opinion_id NOT IN (
                     SELECT opinion_id FROM opinions WHERE model_id = ?1
                     ORDER BY recorded_at DESC, rowid DESC LIMIT ?2)",
                params![model_id, self.capacity_per_model as i64],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get(&self, opinion_id: &str) -> Result<Option<OpinionRecord>, DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE opinion_id = ?1"))?;
        let mut rows = stmt.query_map(params![opinion_id], Self::row_to_record)?;
        match rows.next() {
            Some(r) => Ok(Some(r?)),
            None => Ok(None),
        }
    }

    fn mark_settled(&self, opinion_id: &str, at: DateTime<Utc>) -> Result<(), DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let rows = conn.execute(
            "UPDATE opinions SET settled_at = ?1 WHERE opinion_id = ?2 AND settled_at IS NULL",
            params![at.to_rfc3339(), opinion_id],
        ).map_err(|e| DomainError::Database(format!("Failed to settle opinion: {e}")))?;
        if rows > 0 {
            return Ok(());
        }
        let exists = conn
            .query_row(
                "SELECT 1 FROM opinions WHERE opinion_id = ?1",
                params![opinion_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if exists {
            Err(DomainError::InvalidInput(format!("opinion {opinion_id} already settled")))
        } else {
            Err(DomainError::NotFound(format!("Opinion not found: {opinion_id}")))
        }
    }

    fn recent(&self, model_id: &str, limit: usize) -> Result<Vec<OpinionRecord>, DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE model_id = ?1 ORDER BY recorded_at DESC, rowid DESC LIMIT ?2"
        ))?;
        let records = stmt
            .query_map(params![model_id, limit as i64], Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
