use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Date reported for the discount-misuse source, which has no per-day grain.
pub const AGGREGATE_DATE: &str = "aggregate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalyDate {
    Day(NaiveDate),
    Aggregate,
}

impl fmt::Display for AnomalyDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnomalyDate::Day(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            AnomalyDate::Aggregate => f.write_str(AGGREGATE_DATE),
        }
    }
}

impl Serialize for AnomalyDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AnomalyDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s == AGGREGATE_DATE {
            return Ok(AnomalyDate::Aggregate);
        }
        NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map(AnomalyDate::Day)
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyType {
    #[serde(rename = "revenue spike")]
    RevenueSpike,
    #[serde(rename = "revenue drop")]
    RevenueDrop,
    #[serde(rename = "quantity surge")]
    QuantitySurge,
    #[serde(rename = "abnormal discount usage")]
    AbnormalDiscountUsage,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyType::RevenueSpike => "revenue spike",
            AnomalyType::RevenueDrop => "revenue drop",
            AnomalyType::QuantitySurge => "quantity surge",
            AnomalyType::AbnormalDiscountUsage => "abnormal discount usage",
        }
    }
}

impl fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw aggregate value that triggered a flag. Counts and quantities stay integral
/// on the wire; revenue keeps its decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Integer(i64),
    Decimal(f64),
}

impl MetricValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            MetricValue::Integer(v) => v as f64,
            MetricValue::Decimal(v) => v,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Integer(v) => write!(f, "{}", v),
            MetricValue::Decimal(v) => write!(f, "{:?}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub date: AnomalyDate,
    pub context: String,
    pub anomaly_type: AnomalyType,
    pub details: String,
    pub metric_value: MetricValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Unknown,
}

impl RiskLevel {
    /// Case-insensitive parse of a model-supplied label; anything unexpected is `Unknown`.
    pub fn parse_lenient(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => RiskLevel::Low,
            "medium" => RiskLevel::Medium,
            "high" => RiskLevel::High,
            _ => RiskLevel::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub possible_reason: String,
    pub risk_level: RiskLevel,
    pub suggested_action: String,
    pub confidence_score: f64,
}

impl Explanation {
    /// Payload attached when the model could not be reached or answered badly.
    pub fn fallback() -> Self {
        Self {
            possible_reason: "error communicating with seshat ai model.".to_string(),
            risk_level: RiskLevel::Unknown,
            suggested_action: "verify api key and model availability.".to_string(),
            confidence_score: 0.0,
        }
    }

    pub fn is_fallback(&self) -> bool {
        *self == Self::fallback()
    }
}

/// An anomaly plus its explanation, serialized as one flat nine-field object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedAnomaly {
    #[serde(flatten)]
    pub anomaly: Anomaly,
    #[serde(flatten)]
    pub explanation: Explanation,
}
