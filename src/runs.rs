use crate::db::DbPool;
use crate::error::Result;
use crate::types::run::{RunOutcome, RunRecord};

pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Append a finished run to the history table. Returns the new row id.
pub fn record_run(pool: &DbPool, started_at: i64, outcome: &RunOutcome) -> Result<i64> {
    let (transactions, anomalies, report_path) = match outcome {
        RunOutcome::NoData => (0, 0, None),
        RunOutcome::NoAnomalies { transactions } => (*transactions, 0, None),
        RunOutcome::ReportWritten {
            transactions,
            anomalies,
            path,
        } => (
            *transactions,
            *anomalies,
            Some(path.display().to_string()),
        ),
    };
    insert_run(
        pool,
        started_at,
        outcome.label(),
        transactions as i64,
        anomalies as i64,
        report_path.as_deref(),
        None,
    )
}

/// Record a run that stopped on an error.
pub fn record_failure(
    pool: &DbPool,
    started_at: i64,
    transactions: usize,
    anomalies: usize,
    error: &str,
) -> Result<i64> {
    insert_run(
        pool,
        started_at,
        "failed",
        transactions as i64,
        anomalies as i64,
        None,
        Some(error),
    )
}

fn insert_run(
    pool: &DbPool,
    started_at: i64,
    outcome: &str,
    transactions: i64,
    anomalies: i64,
    report_path: Option<&str>,
    error: Option<&str>,
) -> Result<i64> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO pipeline_runs (started_at, finished_at, outcome, transactions, anomalies, report_path, error)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            started_at,
            now_millis(),
            outcome,
            transactions,
            anomalies,
            report_path,
            error,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Most recent runs first.
pub fn list_runs(pool: &DbPool, limit: u32) -> Result<Vec<RunRecord>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, started_at, finished_at, outcome, transactions, anomalies, report_path, error
         FROM pipeline_runs ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map([limit], |row| {
        Ok(RunRecord {
            id: row.get(0)?,
            started_at: row.get(1)?,
            finished_at: row.get(2)?,
            outcome: row.get(3)?,
            transactions: row.get(4)?,
            anomalies: row.get(5)?,
            report_path: row.get(6)?,
            error: row.get(7)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn test_pool() -> (tempfile::TempDir, DbPool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::open(&dir.path().join("test.sqlite")).unwrap();
        (dir, pool)
    }

    #[test]
    fn list_runs_empty_on_fresh_db() {
        let (_dir, pool) = test_pool();
        assert!(list_runs(&pool, 10).unwrap().is_empty());
    }

    #[test]
    fn record_and_list_newest_first() {
        let (_dir, pool) = test_pool();
        record_run(&pool, now_millis(), &RunOutcome::NoData).unwrap();
        record_run(
            &pool,
            now_millis(),
            &RunOutcome::ReportWritten {
                transactions: 120,
                anomalies: 3,
                path: "output/anomaly_report.json".into(),
            },
        )
        .unwrap();

        let runs = list_runs(&pool, 10).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].outcome, "report_written");
        assert_eq!(runs[0].transactions, 120);
        assert_eq!(runs[0].anomalies, 3);
        assert_eq!(
            runs[0].report_path.as_deref(),
            Some("output/anomaly_report.json")
        );
        assert_eq!(runs[1].outcome, "no_data");
        assert!(runs[1].finished_at >= runs[1].started_at);
    }

    #[test]
    fn failures_keep_error_text() {
        let (_dir, pool) = test_pool();
        record_failure(&pool, now_millis(), 50, 2, "disk full").unwrap();
        let runs = list_runs(&pool, 1).unwrap();
        assert_eq!(runs[0].outcome, "failed");
        assert_eq!(runs[0].error.as_deref(), Some("disk full"));
        assert!(runs[0].report_path.is_none());
    }

    #[test]
    fn limit_is_respected() {
        let (_dir, pool) = test_pool();
        for _ in 0..5 {
            record_run(&pool, now_millis(), &RunOutcome::NoData).unwrap();
        }
        assert_eq!(list_runs(&pool, 3).unwrap().len(), 3);
    }
}
