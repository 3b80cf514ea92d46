use tracing::debug;

use crate::detector::OutlierDetector;
use crate::types::aggregate::{AggregateTables, DateCategoryRow, DateCityRow, ProductDiscountRow};
use crate::types::anomaly::{Anomaly, AnomalyDate, AnomalyType, MetricValue};
use crate::types::config::DetectionConfig;

/// Turns detector output into labelled anomaly records, one pass per source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyClassifier {
    detector: OutlierDetector,
    discount_cutoff: f64,
}

impl AnomalyClassifier {
    pub fn new(detector: OutlierDetector, discount_cutoff: f64) -> Self {
        Self {
            detector,
            discount_cutoff,
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(
            OutlierDetector::new(config.z_threshold, config.spread),
            config.discount_cutoff,
        )
    }

    /// Category revenue, then category quantity, then city revenue, then
    /// discount misuse. Sources are concatenated, never merged or deduplicated.
    pub fn classify(
        &self,
        date_category: &[DateCategoryRow],
        date_city: &[DateCityRow],
        product_discount: &[ProductDiscountRow],
    ) -> Vec<Anomaly> {
        let mut anomalies = self.category_revenue(date_category);
        anomalies.extend(self.category_quantity(date_category));
        anomalies.extend(self.city_revenue(date_city));
        anomalies.extend(self.discount_misuse(product_discount));
        anomalies
    }

    pub fn classify_tables(&self, tables: &AggregateTables) -> Vec<Anomaly> {
        self.classify(
            &tables.date_category,
            &tables.date_city,
            &tables.product_discount,
        )
    }

    fn category_revenue(&self, rows: &[DateCategoryRow]) -> Vec<Anomaly> {
        let found: Vec<Anomaly> = self
            .detector
            .detect(rows, |r| r.total_revenue)
            .into_iter()
            .map(|f| {
                revenue_anomaly(
                    f.row.sale_date,
                    format!("category: {}", f.row.category),
                    f.score,
                    f.pct_from_normal,
                    f.row.total_revenue,
                )
            })
            .collect();
        debug!(count = found.len(), "Category revenue anomalies");
        found
    }

    fn category_quantity(&self, rows: &[DateCategoryRow]) -> Vec<Anomaly> {
        let found: Vec<Anomaly> = self
            .detector
            .detect(rows, |r| r.total_quantity as f64)
            .into_iter()
            .filter(|f| f.score > 0.0)
            .map(|f| Anomaly {
                date: AnomalyDate::Day(f.row.sale_date),
                context: format!("category: {}", f.row.category),
                anomaly_type: AnomalyType::QuantitySurge,
                details: format!("surge of {:.2}% above normal", f.pct_from_normal),
                metric_value: MetricValue::Integer(f.row.total_quantity),
            })
            .collect();
        debug!(count = found.len(), "Category quantity anomalies");
        found
    }

    fn city_revenue(&self, rows: &[DateCityRow]) -> Vec<Anomaly> {
        let found: Vec<Anomaly> = self
            .detector
            .detect(rows, |r| r.total_revenue)
            .into_iter()
            .map(|f| {
                revenue_anomaly(
                    f.row.sale_date,
                    format!("city: {}", f.row.city),
                    f.score,
                    f.pct_from_normal,
                    f.row.total_revenue,
                )
            })
            .collect();
        debug!(count = found.len(), "City revenue anomalies");
        found
    }

    /// Unusually many transactions at a high discount tier.
    fn discount_misuse(&self, rows: &[ProductDiscountRow]) -> Vec<Anomaly> {
        let found: Vec<Anomaly> = self
            .detector
            .detect(rows, |r| r.transaction_count as f64)
            .into_iter()
            .filter(|f| f.score > 0.0 && f.row.discount_percent > self.discount_cutoff)
            .map(|f| Anomaly {
                date: AnomalyDate::Aggregate,
                context: format!(
                    "product: {}, discount: {}%",
                    f.row.product_name,
                    format_percent(f.row.discount_percent)
                ),
                anomaly_type: AnomalyType::AbnormalDiscountUsage,
                details: format!(
                    "transaction volume {:.2}% above normal for this discount tier",
                    f.pct_from_normal
                ),
                metric_value: MetricValue::Integer(f.row.transaction_count as i64),
            })
            .collect();
        debug!(count = found.len(), "Discount misuse anomalies");
        found
    }
}

impl Default for AnomalyClassifier {
    fn default() -> Self {
        Self::from_config(&DetectionConfig::default())
    }
}

fn revenue_anomaly(
    date: chrono::NaiveDate,
    context: String,
    score: f64,
    pct_from_normal: f64,
    revenue: f64,
) -> Anomaly {
    let (anomaly_type, word) = if score > 0.0 {
        (AnomalyType::RevenueSpike, "Spike")
    } else {
        (AnomalyType::RevenueDrop, "Drop")
    };
    Anomaly {
        date: AnomalyDate::Day(date),
        context,
        anomaly_type,
        details: format!("{} of {:.2}% from normal", word, pct_from_normal.abs()),
        metric_value: MetricValue::Decimal(revenue),
    }
}

/// `15.0` renders as `15`, `12.5` stays `12.5`.
fn format_percent(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
