pub mod client;

use std::future::Future;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::anomaly::{Anomaly, EnrichedAnomaly, Explanation, RiskLevel};

pub use client::ChatExplainer;

pub const FALLBACK_SYSTEM_PROMPT: &str = "you are seshat ai, an intelligent sales anomaly and insight engine. \
analyze the provided anomaly and always respond in valid json format with the following keys: \
possible_reason (string), risk_level (string: low/medium/high), \
suggested_action (string), confidence_score (float between 0.0 and 1.0).";

/// Produces an explanation for one anomaly. Implementations may fail; callers
/// go through [`enrich`] so a failure only degrades the record.
pub trait Explainer: Send + Sync + 'static {
    fn explain(&self, anomaly: &Anomaly) -> impl Future<Output = Result<Explanation>> + Send;
}

/// Read the system prompt, or use the built-in one when the file is absent.
pub fn load_system_prompt(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(prompt) if !prompt.trim().is_empty() => prompt,
        Ok(_) => {
            warn!(path = %path.display(), "Prompt file is empty, using built-in prompt");
            FALLBACK_SYSTEM_PROMPT.to_string()
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Prompt file unavailable, using built-in prompt");
            FALLBACK_SYSTEM_PROMPT.to_string()
        }
    }
}

/// The user turn sent to the model for one anomaly.
pub fn user_message(anomaly: &Anomaly) -> String {
    format!(
        "analyze this anomaly and provide insights in valid json format:\n\
         date: {}\n\
         context: {}\n\
         anomaly type: {}\n\
         details: {}\n\
         metric value: {}",
        anomaly.date, anomaly.context, anomaly.anomaly_type, anomaly.details, anomaly.metric_value
    )
}

/// Interpret the model's JSON answer. Missing keys get neutral defaults; a body
/// that is not a JSON object is an error.
pub fn parse_explanation(content: &str) -> Result<Explanation> {
    let value: serde_json::Value = serde_json::from_str(content.trim())?;
    let obj = value
        .as_object()
        .ok_or_else(|| Error::Llm("response is not a JSON object".to_string()))?;

    let text = |key: &str, default: &str| -> String {
        obj.get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| default.to_string())
    };

    let confidence_score = obj
        .get("confidence_score")
        .and_then(|v| {
            v.as_f64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
        })
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or(0.0);

    Ok(Explanation {
        possible_reason: text("possible_reason", "analysis failed"),
        risk_level: obj
            .get("risk_level")
            .and_then(|v| v.as_str())
            .map(RiskLevel::parse_lenient)
            .unwrap_or(RiskLevel::Unknown),
        suggested_action: text("suggested_action", "manual review required"),
        confidence_score,
    })
}

/// Merge an anomaly with its explanation outcome. Errors become the fallback
/// payload; the anomaly itself is always kept.
pub fn enrich(anomaly: Anomaly, outcome: Result<Explanation>) -> EnrichedAnomaly {
    let explanation = match outcome {
        Ok(explanation) => explanation,
        Err(e) => {
            warn!(
                error = %e,
                date = %anomaly.date,
                context = %anomaly.context,
                "Explanation failed, attaching fallback"
            );
            Explanation::fallback()
        }
    };
    EnrichedAnomaly {
        anomaly,
        explanation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::anomaly::{AnomalyDate, AnomalyType, MetricValue};

    fn sample() -> Anomaly {
        Anomaly {
            date: AnomalyDate::Aggregate,
            context: "product: headphones, discount: 25%".to_string(),
            anomaly_type: AnomalyType::AbnormalDiscountUsage,
            details: "transaction volume 85.00% above normal for this discount tier".to_string(),
            metric_value: MetricValue::Integer(150),
        }
    }

    #[test]
    fn user_message_lists_all_fields() {
        let msg = user_message(&sample());
        assert!(msg.starts_with("analyze this anomaly and provide insights in valid json format:\n"));
        assert!(msg.contains("date: aggregate\n"));
        assert!(msg.contains("context: product: headphones, discount: 25%\n"));
        assert!(msg.contains("anomaly type: abnormal discount usage\n"));
        assert!(msg.ends_with("metric value: 150"));
    }

    #[test]
    fn parse_full_response() {
        let content = r#"{
            "possible_reason": "Clearance sale",
            "risk_level": "High",
            "suggested_action": "Audit coupon codes",
            "confidence_score": 0.82
        }"#;
        let exp = parse_explanation(content).unwrap();
        assert_eq!(exp.possible_reason, "Clearance sale");
        assert_eq!(exp.risk_level, RiskLevel::High);
        assert_eq!(exp.suggested_action, "Audit coupon codes");
        assert!((exp.confidence_score - 0.82).abs() < 1e-9);
    }

    #[test]
    fn parse_fills_missing_keys() {
        let exp = parse_explanation(r#"{"risk_level": "medium"}"#).unwrap();
        assert_eq!(exp.possible_reason, "analysis failed");
        assert_eq!(exp.risk_level, RiskLevel::Medium);
        assert_eq!(exp.suggested_action, "manual review required");
        assert_eq!(exp.confidence_score, 0.0);
    }

    #[test]
    fn parse_clamps_and_coerces_confidence() {
        let high = parse_explanation(r#"{"confidence_score": 7}"#).unwrap();
        assert_eq!(high.confidence_score, 1.0);
        let text = parse_explanation(r#"{"confidence_score": "0.4"}"#).unwrap();
        assert!((text.confidence_score - 0.4).abs() < 1e-9);
        let junk = parse_explanation(r#"{"confidence_score": "very"}"#).unwrap();
        assert_eq!(junk.confidence_score, 0.0);
    }

    #[test]
    fn parse_rejects_non_objects() {
        assert!(parse_explanation("not json").is_err());
        assert!(matches!(parse_explanation("[1, 2]"), Err(Error::Llm(_))));
    }

    #[test]
    fn enrich_failure_keeps_anomaly() {
        let enriched = enrich(sample(), Err(Error::Llm("timeout".to_string())));
        assert_eq!(enriched.anomaly, sample());
        assert!(enriched.explanation.is_fallback());
        assert_eq!(enriched.explanation.risk_level, RiskLevel::Unknown);
        assert_eq!(enriched.explanation.confidence_score, 0.0);
    }

    #[test]
    fn missing_prompt_file_uses_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let prompt = load_system_prompt(&dir.path().join("absent.txt"));
        assert_eq!(prompt, FALLBACK_SYSTEM_PROMPT);

        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "be brief").unwrap();
        assert_eq!(load_system_prompt(&path), "be brief");
    }
}
