//! SQLite persistence for the calculation audit log.
//!
//! RULE: Only store.rs talks to the database.
//! The calculator never touches the store; audit.rs records and replays.

use crate::{error::EngineResult, types::AuditId};
use rusqlite::{params, Connection, OptionalExtension};

pub struct AuditStore {
    conn: Connection,
}

/// One recorded calculation, stored as serialised snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub audit_id:       AuditId,
    pub as_of:          String,
    pub jurisdiction:   String,
    pub dealer_id:      String,
    pub engine_version: String,
    pub input_json:     String,
    pub rules_json:     String,
    pub dealer_json:    String,
    pub result_json:    String,
}

const SELECT_COLUMNS: &str = "audit_id, as_of, jurisdiction, dealer_id, engine_version,
     input_json, rules_json, dealer_json, result_json";

impl AuditStore {
    /// Open (or create) the audit database at `path`.
    pub fn open(path: &str) -> EngineResult<Self> {
        let conn = Connection::open(path)?;
        // WAL only matters for real files; :memory: ignores it.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> EngineResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_calculation_audit.sql"))?;
        Ok(())
    }

    pub fn insert(&self, record: &AuditRecord) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO calculation_audit
                (audit_id, as_of, jurisdiction, dealer_id, engine_version,
                 input_json, rules_json, dealer_json, result_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.audit_id,
                record.as_of,
                record.jurisdiction,
                record.dealer_id,
                record.engine_version,
                record.input_json,
                record.rules_json,
                record.dealer_json,
                record.result_json,
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, audit_id: &str) -> EngineResult<Option<AuditRecord>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM calculation_audit WHERE audit_id = ?1");
        let record = self
            .conn
            .query_row(&sql, params![audit_id], row_to_record)
            .optional()?;
        Ok(record)
    }

    /// Most recent records for a `STATE/County` label, newest first.
    pub fn recent_for_jurisdiction(
        &self,
        jurisdiction: &str,
        limit: usize,
    ) -> EngineResult<Vec<AuditRecord>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM calculation_audit
             WHERE jurisdiction = ?1 ORDER BY seq DESC LIMIT ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![jurisdiction, limit as i64], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn count(&self) -> EngineResult<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM calculation_audit", [], |row| row.get(0))?;
        Ok(n)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditRecord> {
    Ok(AuditRecord {
        audit_id:       row.get(0)?,
        as_of:          row.get(1)?,
        jurisdiction:   row.get(2)?,
        dealer_id:      row.get(3)?,
        engine_version: row.get(4)?,
        input_json:     row.get(5)?,
        rules_json:     row.get(6)?,
        dealer_json:    row.get(7)?,
        result_json:    row.get(8)?,
    })
}
