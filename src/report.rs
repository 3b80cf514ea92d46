use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::types::anomaly::EnrichedAnomaly;

/// Write the report as a pretty JSON array. The file only appears once fully
/// written: content goes to a temp file beside the target, which is then renamed.
pub fn write_report(path: &Path, anomalies: &[EnrichedAnomaly]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(tmp.as_file_mut(), formatter);
        anomalies.serialize(&mut ser)?;
    }
    tmp.as_file_mut().write_all(b"\n")?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(path)?;

    info!(path = %path.display(), anomalies = anomalies.len(), "Report saved");
    Ok(())
}

pub fn read_report(path: &Path) -> Result<Vec<EnrichedAnomaly>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::anomaly::{
        Anomaly, AnomalyDate, AnomalyType, Explanation, MetricValue, RiskLevel,
    };
    use chrono::NaiveDate;

    fn sample() -> Vec<EnrichedAnomaly> {
        vec![
            EnrichedAnomaly {
                anomaly: Anomaly {
                    date: AnomalyDate::Day(NaiveDate::from_ymd_opt(2026, 1, 4).unwrap()),
                    context: "category: TV".to_string(),
                    anomaly_type: AnomalyType::RevenueSpike,
                    details: "Spike of 207.69% from normal".to_string(),
                    metric_value: MetricValue::Decimal(1000.5),
                },
                explanation: Explanation {
                    possible_reason: "Festival promotion".to_string(),
                    risk_level: RiskLevel::Low,
                    suggested_action: "Restock".to_string(),
                    confidence_score: 0.7,
                },
            },
            EnrichedAnomaly {
                anomaly: Anomaly {
                    date: AnomalyDate::Aggregate,
                    context: "product: X, discount: 15%".to_string(),
                    anomaly_type: AnomalyType::AbnormalDiscountUsage,
                    details: "transaction volume 400.00% above normal for this discount tier"
                        .to_string(),
                    metric_value: MetricValue::Integer(50),
                },
                explanation: Explanation::fallback(),
            },
        ]
    }

    #[test]
    fn write_creates_dirs_and_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output").join("anomaly_report.json");
        write_report(&path, &sample()).unwrap();

        let back = read_report(&path).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn output_is_array_of_flat_objects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_report(&path, &sample()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("[\n    {"));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let items = value.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["date"], "aggregate");
        assert_eq!(items[1]["metric_value"], 50);
        assert_eq!(items[0].as_object().unwrap().len(), 9);
    }

    #[test]
    fn failed_write_leaves_previous_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_report(&path, &sample()).unwrap();

        // A directory in the way makes the rename fail.
        let blocked = dir.path().join("blocked");
        std::fs::create_dir_all(blocked.join("inner")).unwrap();
        assert!(write_report(&blocked, &sample()).is_err());

        assert_eq!(read_report(&path).unwrap().len(), 2);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn empty_report_is_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_report(&path, &[]).unwrap();
        assert!(read_report(&path).unwrap().is_empty());
    }
}
