use rusqlite::Connection;

use crate::domain::error::DomainError;

pub fn run_migrations(conn: &Connection) -> Result<(), DomainError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS opinions (
            opinion_id TEXT PRIMARY KEY,
            model_id TEXT NOT NULL,
            request_id TEXT NOT NULL,
            asset TEXT NOT NULL,
            signal TEXT NOT NULL,
            confidence REAL NOT NULL,
            uncertainty REAL NOT NULL,
            rationale TEXT NOT NULL DEFAULT '[]',
            latency_ms INTEGER NOT NULL DEFAULT 0,
            consensus_signal TEXT,
            included INTEGER NOT NULL DEFAULT 1,
            recorded_at TEXT NOT NULL,
            settled_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_opinions_model_recorded ON opinions(model_id, recorded_at);
        CREATE INDEX IF NOT EXISTS idx_opinions_request ON opinions(request_id);
        "
    ).map_err(|e| DomainError::Database(format!("Migration failed: {e}")))
}
