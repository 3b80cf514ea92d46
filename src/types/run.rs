use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Terminal state of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RunOutcome {
    NoData,
    NoAnomalies { transactions: usize },
    ReportWritten {
        transactions: usize,
        anomalies: usize,
        path: PathBuf,
    },
}

impl RunOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::NoData => "no_data",
            RunOutcome::NoAnomalies { .. } => "no_anomalies",
            RunOutcome::ReportWritten { .. } => "report_written",
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::NoData => f.write_str("no data found"),
            RunOutcome::NoAnomalies { transactions } => {
                write!(f, "no anomalies detected in {} transactions", transactions)
            }
            RunOutcome::ReportWritten {
                anomalies, path, ..
            } => write!(
                f,
                "report with {} anomalies written to {}",
                anomalies,
                path.display()
            ),
        }
    }
}

/// A row of the `pipeline_runs` history table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: i64,
    /// Unix timestamp (milliseconds).
    pub started_at: i64,
    /// Unix timestamp (milliseconds).
    pub finished_at: i64,
    /// One of `no_data`, `no_anomalies`, `report_written`, `failed`.
    pub outcome: String,
    pub transactions: i64,
    pub anomalies: i64,
    pub report_path: Option<String>,
    pub error: Option<String>,
}
