use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use serde_json::Value;
use uuid::Uuid;

use super::traits::{JobQueue, JobSource};
use super::types::{ClaimedJob, EnqueueRequest, JobHandle, JobInfo, JobStatus, QueueName};
use super::QueueError;
use crate::metrics;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS queue_jobs (
        id TEXT PRIMARY KEY,
        queue TEXT NOT NULL,
        task TEXT NOT NULL,
        payload TEXT NOT NULL,
        status TEXT NOT NULL,
        timeout_secs INTEGER NOT NULL,
        result TEXT,
        error TEXT,
        enqueued_at INTEGER NOT NULL,
        started_at INTEGER,
        ended_at INTEGER
    );

    CREATE INDEX IF NOT EXISTS idx_queue_jobs_claim ON queue_jobs(queue, status, enqueued_at);
"#;

const SELECT_INFO: &str = "SELECT id, queue, task, status, timeout_secs, enqueued_at, \
     started_at, ended_at, result, error FROM queue_jobs";

/// SQLite-backed job queue shared by the server and worker processes.
pub struct SqliteJobQueue {
    conn: Mutex<Connection>,
}

impl SqliteJobQueue {
    /// Open (or create) the queue at `path`.
    pub fn new(path: &Path) -> Result<Self, QueueError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")?;
        Self::with_connection(conn)
    }

    /// In-memory queue, useful for testing.
    pub fn in_memory() -> Result<Self, QueueError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, QueueError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, QueueError> {
        self.conn
            .lock()
            .map_err(|_| QueueError::Database("connection mutex poisoned".to_string()))
    }

    fn set_outcome(
        &self,
        job_id: &str,
        status: JobStatus,
        result: Option<String>,
        error: Option<&str>,
    ) -> Result<(), QueueError> {
        let now = Utc::now().timestamp_millis();
        let conn = self.lock()?;
        conn.execute(
            "UPDATE queue_jobs SET status = ?1, result = ?2, error = ?3, ended_at = ?4 WHERE id = ?5",
            params![status.as_str(), result, error, now, job_id],
        )?;
        Ok(())
    }
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn row_to_info(row: &Row<'_>) -> rusqlite::Result<(JobInfo, String, String, Option<String>)> {
    let queue: String = row.get(1)?;
    let status: String = row.get(3)?;
    let timeout_secs: i64 = row.get(4)?;
    let enqueued_at: i64 = row.get(5)?;
    let started_at: Option<i64> = row.get(6)?;
    let ended_at: Option<i64> = row.get(7)?;
    let result: Option<String> = row.get(8)?;

    let info = JobInfo {
        job_id: row.get(0)?,
        queue: QueueName::Default,
        task: row.get(2)?,
        status: JobStatus::Queued,
        timeout_secs: timeout_secs.max(0) as u64,
        enqueued_at: millis_to_datetime(enqueued_at),
        started_at: started_at.map(millis_to_datetime),
        ended_at: ended_at.map(millis_to_datetime),
        result: None,
        error: row.get(9)?,
    };
    Ok((info, queue, status, result))
}

/// Resolves the text columns of a fetched row.
fn finish_info(
    (mut info, queue, status, result): (JobInfo, String, String, Option<String>),
) -> Result<JobInfo, QueueError> {
    info.queue = queue.parse()?;
    info.status = JobStatus::parse(&status)
        .ok_or_else(|| QueueError::Database(format!("invalid job status: {}", status)))?;
    info.result = result.map(|r| serde_json::from_str(&r)).transpose()?;
    Ok(info)
}

impl JobQueue for SqliteJobQueue {
    fn enqueue(&self, request: EnqueueRequest) -> Result<JobHandle, QueueError> {
        let job_id = Uuid::new_v4().to_string();
        let payload = serde_json::to_string(&request.payload)?;
        let now = Utc::now();

        {
            let conn = self.lock()?;
            conn.execute(
                r#"
                INSERT INTO queue_jobs (id, queue, task, payload, status, timeout_secs, enqueued_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    job_id,
                    request.queue.as_str(),
                    request.task,
                    payload,
                    JobStatus::Queued.as_str(),
                    request.timeout.as_secs() as i64,
                    now.timestamp_millis(),
                ],
            )?;
        }

        metrics::JOBS_TOTAL
            .with_label_values(&[request.queue.as_str(), JobStatus::Queued.as_str()])
            .inc();
        tracing::info!(job_id = %job_id, queue = %request.queue, task = %request.task, "Job enqueued");

        Ok(JobHandle {
            job_id,
            queue: request.queue,
            enqueued_at: now,
        })
    }

    fn job_info(&self, job_id: &str) -> Result<Option<JobInfo>, QueueError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_INFO),
                params![job_id],
                row_to_info,
            )
            .optional()?;
        row.map(finish_info).transpose()
    }

    fn list_jobs(&self, queue: QueueName, limit: usize) -> Result<Vec<JobInfo>, QueueError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE queue = ?1 ORDER BY enqueued_at DESC, rowid DESC LIMIT ?2",
            SELECT_INFO
        ))?;
        let rows = stmt
            .query_map(params![queue.as_str(), limit as i64], row_to_info)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(finish_info).collect()
    }
}

impl JobSource for SqliteJobQueue {
    fn claim_next(&self, queues: &[QueueName]) -> Result<Option<ClaimedJob>, QueueError> {
        if queues.is_empty() {
            return Ok(None);
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let sql = format!(
            "SELECT id, queue, task, payload, timeout_secs FROM queue_jobs \
             WHERE status = 'queued' AND queue IN ({}) \
             ORDER BY enqueued_at ASC, rowid ASC LIMIT 1",
            placeholders(queues.len())
        );
        let row = tx
            .query_row(
                &sql,
                params_from_iter(queues.iter().map(|q| q.as_str())),
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((job_id, queue, task, payload, timeout_secs)) = row else {
            return Ok(None);
        };

        tx.execute(
            "UPDATE queue_jobs SET status = 'started', started_at = ?1 WHERE id = ?2",
            params![Utc::now().timestamp_millis(), job_id],
        )?;
        tx.commit()?;

        Ok(Some(ClaimedJob {
            job_id,
            queue: queue.parse()?,
            task,
            payload: serde_json::from_str::<Value>(&payload)?,
            timeout: Duration::from_secs(timeout_secs.max(0) as u64),
        }))
    }

    fn finish(&self, job_id: &str, result: &Value) -> Result<(), QueueError> {
        let result = serde_json::to_string(result)?;
        self.set_outcome(job_id, JobStatus::Finished, Some(result), None)
    }

    fn fail(&self, job_id: &str, error: &str) -> Result<(), QueueError> {
        self.set_outcome(job_id, JobStatus::Failed, None, Some(error))
    }

    fn requeue_interrupted(&self, queues: &[QueueName]) -> Result<usize, QueueError> {
        if queues.is_empty() {
            return Ok(0);
        }
        let conn = self.lock()?;
        let sql = format!(
            "UPDATE queue_jobs SET status = 'queued', started_at = NULL \
             WHERE status = 'started' AND queue IN ({})",
            placeholders(queues.len())
        );
        Ok(conn.execute(&sql, params_from_iter(queues.iter().map(|q| q.as_str())))?)
    }
}
