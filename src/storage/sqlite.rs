use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{ComplexityTier, EstimationResult, EstimationSummary};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: i64,
    pub repository: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub summary: EstimationSummary,
}

/// Append-only history of finished estimation runs.
pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_db()?;
        Ok(storage)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_db()?;
        Ok(storage)
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Storage("connection lock poisoned".to_string()))
    }

    fn init_db(&self) -> Result<()> {
        self.conn()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id INTEGER PRIMARY KEY,
                repository TEXT NOT NULL,
                model TEXT NOT NULL,
                created_at TEXT NOT NULL,
                issue_count INTEGER NOT NULL,
                total_cost REAL NOT NULL,
                average_cost REAL NOT NULL,
                summary_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS estimations (
                id INTEGER PRIMARY KEY,
                run_id INTEGER NOT NULL REFERENCES runs(id),
                position INTEGER NOT NULL,
                issue_number INTEGER NOT NULL,
                title TEXT NOT NULL,
                complexity TEXT NOT NULL,
                estimated_cost REAL NOT NULL,
                reasoning TEXT NOT NULL,
                labels_json TEXT NOT NULL,
                url TEXT NOT NULL,
                UNIQUE(run_id, position)
            );

            CREATE INDEX IF NOT EXISTS idx_runs_repository ON runs(repository);
            CREATE INDEX IF NOT EXISTS idx_estimations_run_id ON estimations(run_id);
            "#,
        )?;

        Ok(())
    }

    /// Stores a run and its results in one transaction; returns the run id.
    pub fn save_run(
        &self,
        repository: &str,
        model: &str,
        summary: &EstimationSummary,
        results: &[EstimationResult],
    ) -> Result<i64> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let summary_json = serde_json::to_string(summary)?;
        tx.execute(
            r#"
            INSERT INTO runs (repository, model, created_at, issue_count, total_cost, average_cost, summary_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                repository,
                model,
                Utc::now().to_rfc3339(),
                summary.issue_count as i64,
                summary.total_cost,
                summary.average_cost,
                summary_json,
            ],
        )?;
        let run_id = tx.last_insert_rowid();

        for (position, result) in results.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO estimations (run_id, position, issue_number, title, complexity, estimated_cost, reasoning, labels_json, url)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    run_id,
                    position as i64,
                    result.issue_number as i64,
                    result.title,
                    result.complexity.as_str(),
                    result.estimated_cost,
                    result.reasoning,
                    serde_json::to_string(&result.labels)?,
                    result.url,
                ],
            )?;
        }

        tx.commit()?;
        Ok(run_id)
    }

    /// Most recent first.
    pub fn list_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, repository, model, created_at, summary_json
            FROM runs
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut runs = Vec::new();
        for row in rows {
            let (id, repository, model, created_at, summary_json) = row?;
            runs.push(RunRecord {
                id,
                repository,
                model,
                created_at: DateTime::parse_from_rfc3339(&created_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
                summary: serde_json::from_str(&summary_json)?,
            });
        }
        Ok(runs)
    }

    pub fn get_run_results(&self, run_id: i64) -> Result<Vec<EstimationResult>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT issue_number, title, complexity, estimated_cost, reasoning, labels_json, url
            FROM estimations
            WHERE run_id = ?1
            ORDER BY position ASC
            "#,
        )?;

        let rows = stmt.query_map(params![run_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (issue_number, title, complexity, estimated_cost, reasoning, labels_json, url) = row?;
            let complexity = ComplexityTier::parse(&complexity).ok_or_else(|| {
                Error::ParseError(format!("Unknown complexity in storage: {}", complexity))
            })?;
            results.push(EstimationResult {
                issue_number: issue_number as u64,
                title,
                complexity,
                estimated_cost,
                reasoning,
                labels: serde_json::from_str(&labels_json)?,
                url,
            });
        }
        Ok(results)
    }
}
