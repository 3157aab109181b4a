//! SQLite diagnostics persistence.
//!
//! RULE: Only store.rs talks to the database.
//! The orchestrator calls store methods — it never executes SQL
//! directly. The store holds run metadata, per-target residuals, and
//! loss trajectories; the reweighted microdata itself is persisted by
//! the surrounding dataset pipeline, never here.

use crate::{
    error::CalibResult,
    optimizer::TargetResidual,
    types::Year,
};
use rusqlite::{params, Connection};

pub struct DiagStore {
    conn: Connection,
}

impl DiagStore {
    pub fn open(path: &str) -> CalibResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> CalibResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> CalibResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_diagnostics.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(&self, run_id: &str, seed: u64, version: &str) -> CalibResult<()> {
        self.conn.execute(
            "INSERT INTO run (run_id, seed, version, started_at) VALUES (?1, ?2, ?3, ?4)",
            params![run_id, seed as i64, version, 0i64],
        )?;
        Ok(())
    }

    // ── Per-target residuals ───────────────────────────────────

    pub fn insert_residuals(
        &self,
        run_id: &str,
        year: Year,
        residuals: &[TargetResidual],
    ) -> CalibResult<()> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO target_residual (run_id, year, label, target, estimate, rel_error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for r in residuals {
            stmt.execute(params![run_id, year, r.label, r.target, r.estimate, r.rel_error])?;
        }
        Ok(())
    }

    pub fn residuals_for_year(&self, run_id: &str, year: Year) -> CalibResult<Vec<TargetResidual>> {
        let mut stmt = self.conn.prepare(
            "SELECT label, target, estimate, rel_error
             FROM target_residual WHERE run_id = ?1 AND year = ?2 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![run_id, year], |row| {
            Ok(TargetResidual {
                label:     row.get(0)?,
                target:    row.get(1)?,
                estimate:  row.get(2)?,
                rel_error: row.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Residuals with the largest absolute relative error first.
    /// Used by the runner's end-of-run summary.
    pub fn worst_residuals(
        &self,
        run_id: &str,
        year: Year,
        limit: usize,
    ) -> CalibResult<Vec<TargetResidual>> {
        let mut stmt = self.conn.prepare(
            "SELECT label, target, estimate, rel_error
             FROM target_residual WHERE run_id = ?1 AND year = ?2
             ORDER BY ABS(rel_error) DESC LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![run_id, year, limit as i64], |row| {
            Ok(TargetResidual {
                label:     row.get(0)?,
                target:    row.get(1)?,
                estimate:  row.get(2)?,
                rel_error: row.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    // ── Loss curve ─────────────────────────────────────────────

    pub fn insert_loss_sample(
        &self,
        run_id: &str,
        year: Year,
        iteration: usize,
        loss: f64,
    ) -> CalibResult<()> {
        self.conn.execute(
            "INSERT INTO loss_curve (run_id, year, iteration, loss) VALUES (?1, ?2, ?3, ?4)",
            params![run_id, year, iteration as i64, loss],
        )?;
        Ok(())
    }

    pub fn loss_curve(&self, run_id: &str, year: Year) -> CalibResult<Vec<(usize, f64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT iteration, loss FROM loss_curve
             WHERE run_id = ?1 AND year = ?2 ORDER BY iteration",
        )?;
        let rows = stmt.query_map(params![run_id, year], |row| {
            Ok((row.get::<_, i64>(0)? as usize, row.get(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}
