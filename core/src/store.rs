//! SQLite persistence for generated tables.
//!
//! RULE: Only store.rs talks to the database.
//! The generator never touches storage; a runner hands batches here.

use crate::{
    error::{GenError, GenResult},
    record::TransactionRecord,
};
use rusqlite::{params, Connection, OptionalExtension};

pub struct DatasetStore {
    conn: Connection,
}

impl DatasetStore {
    /// Open (or create) the dataset database at `path`.
    pub fn open(path: &str) -> GenResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode: better concurrent read performance for analysts.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> GenResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> GenResult<()> {
        self.conn.execute_batch(include_str!("../../migrations/001_dataset.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(
        &self,
        run_id: &str,
        seed: u64,
        calibration_version: &str,
        requested_count: u64,
    ) -> GenResult<()> {
        self.conn.execute(
            "INSERT INTO run (run_id, seed, calibration_version, requested_count)
             VALUES (?1, ?2, ?3, ?4)",
            params![run_id, seed.to_string(), calibration_version, requested_count as i64],
        )?;
        Ok(())
    }

    pub fn finish_run(&self, run_id: &str, status: &str, written_count: u64) -> GenResult<()> {
        self.conn.execute(
            "UPDATE run SET status = ?2, written_count = ?3 WHERE run_id = ?1",
            params![run_id, status, written_count as i64],
        )?;
        Ok(())
    }

    /// `base` if unused, else the first free `base-2`, `base-3`, ...
    pub fn next_run_id(&self, base: &str) -> GenResult<String> {
        let mut stmt = self.conn.prepare("SELECT 1 FROM run WHERE run_id = ?1")?;
        let mut candidate = base.to_string();
        let mut attempt = 1u32;
        while stmt.exists(params![candidate])? {
            attempt += 1;
            candidate = format!("{base}-{attempt}");
        }
        Ok(candidate)
    }

    pub fn run_seed(&self, run_id: &str) -> GenResult<Option<u64>> {
        let seed: Option<String> = self
            .conn
            .query_row(
                "SELECT seed FROM run WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        seed.map(|s| {
            s.parse::<u64>()
                .map_err(|e| GenError::Other(anyhow::anyhow!("run {run_id}: bad stored seed {s}: {e}")))
        })
        .transpose()
    }

    pub fn run_status(&self, run_id: &str) -> GenResult<Option<String>> {
        let status = self
            .conn
            .query_row(
                "SELECT status FROM run WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(status)
    }

    // ── Transactions ───────────────────────────────────────────

    /// Append one batch inside a single SQL transaction.
    pub fn append_batch(&self, run_id: &str, batch: &[TransactionRecord<'_>]) -> GenResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO transactions (
                    run_id, transaction_id, timestamp, merchant_id, merchant_category,
                    geography, currency, payment_method, amount_usd, pre_auth_risk_score,
                    status, failure_code, is_retryable, retry_recovered, is_recoverable,
                    hour_of_day, day_of_week, is_weekend, month, year
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                           ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            )?;
            for r in batch {
                stmt.execute(params![
                    run_id,
                    r.transaction_id,
                    r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                    r.merchant_id,
                    r.merchant_category,
                    r.geography,
                    r.currency,
                    r.payment_method,
                    r.amount_usd,
                    r.pre_auth_risk_score,
                    r.status.as_str(),
                    r.failure_code,
                    r.is_retryable,
                    r.retry_recovered,
                    r.is_recoverable,
                    r.hour_of_day,
                    r.day_of_week,
                    r.is_weekend,
                    r.month,
                    r.year,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn transaction_count(&self, run_id: &str) -> GenResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn failure_count(&self, run_id: &str) -> GenResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE run_id = ?1 AND status = 'failed'",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// (category, failures), most failures first.
    pub fn failures_by_category(&self, run_id: &str) -> GenResult<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT merchant_category, COUNT(*) AS n FROM transactions
             WHERE run_id = ?1 AND status = 'failed'
             GROUP BY merchant_category
             ORDER BY n DESC, merchant_category ASC",
        )?;
        let rows = stmt.query_map(params![run_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn revenue_leakage_usd(&self, run_id: &str) -> GenResult<f64> {
        let total: Option<f64> = self.conn.query_row(
            "SELECT SUM(amount_usd) FROM transactions WHERE run_id = ?1 AND is_recoverable = 1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(total.unwrap_or(0.0))
    }
}
