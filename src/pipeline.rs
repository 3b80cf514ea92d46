use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::aggregate;
use crate::classifier::AnomalyClassifier;
use crate::db::DbPool;
use crate::error::{Error, Result};
use crate::explain::{enrich, Explainer};
use crate::loader;
use crate::report;
use crate::runs;
use crate::types::anomaly::{Anomaly, EnrichedAnomaly};
use crate::types::config::Config;
use crate::types::run::RunOutcome;

/// Result of the pure part of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub transactions: usize,
    pub anomalies: Vec<Anomaly>,
}

pub struct Pipeline<E: Explainer> {
    pool: DbPool,
    classifier: AnomalyClassifier,
    explainer: Arc<E>,
    output_path: PathBuf,
    max_concurrency: usize,
}

impl<E: Explainer> Pipeline<E> {
    pub fn new(pool: DbPool, config: &Config, explainer: E) -> Self {
        Self {
            pool,
            classifier: AnomalyClassifier::from_config(&config.detection),
            explainer: Arc::new(explainer),
            output_path: config.output_path.clone(),
            max_concurrency: config.llm.max_concurrency.max(1),
        }
    }

    pub fn detect(&self) -> Result<Option<Detection>> {
        detect(&self.pool, &self.classifier)
    }

    /// Run every stage and record the outcome in the run history.
    pub async fn run(&self) -> Result<RunOutcome> {
        let started_at = runs::now_millis();
        info!("Starting anomaly detection pipeline");

        let mut progress = (0usize, 0usize);
        match self.execute(&mut progress).await {
            Ok(outcome) => {
                if let Err(e) = runs::record_run(&self.pool, started_at, &outcome) {
                    warn!(error = %e, "Could not record pipeline run");
                }
                info!(outcome = outcome.label(), "Pipeline finished: {}", outcome);
                Ok(outcome)
            }
            Err(e) => {
                error!(error = %e, "Pipeline failed");
                let (transactions, anomalies) = progress;
                if let Err(re) =
                    runs::record_failure(&self.pool, started_at, transactions, anomalies, &e.to_string())
                {
                    warn!(error = %re, "Could not record failed pipeline run");
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, progress: &mut (usize, usize)) -> Result<RunOutcome> {
        let detection = match self.detect()? {
            Some(d) => d,
            None => {
                info!("No data found in the database; run setup-db first");
                return Ok(RunOutcome::NoData);
            }
        };
        *progress = (detection.transactions, detection.anomalies.len());

        if detection.anomalies.is_empty() {
            info!("No anomalies detected");
            return Ok(RunOutcome::NoAnomalies {
                transactions: detection.transactions,
            });
        }

        info!(
            anomalies = detection.anomalies.len(),
            max_concurrency = self.max_concurrency,
            "Generating explanations"
        );
        let enriched = explain_all(
            Arc::clone(&self.explainer),
            detection.anomalies,
            self.max_concurrency,
        )
        .await;

        report::write_report(&self.output_path, &enriched)?;

        Ok(RunOutcome::ReportWritten {
            transactions: detection.transactions,
            anomalies: enriched.len(),
            path: self.output_path.clone(),
        })
    }
}

/// Load, aggregate and classify. `None` when there is nothing to analyse.
pub fn detect(pool: &DbPool, classifier: &AnomalyClassifier) -> Result<Option<Detection>> {
    info!("Loading sales data");
    let transactions = match loader::load_transactions(pool)? {
        Some(t) if !t.is_empty() => t,
        _ => return Ok(None),
    };

    info!(transactions = transactions.len(), "Aggregating");
    let tables = aggregate::aggregate(&transactions);
    debug!(
        date_category = tables.date_category.len(),
        date_city = tables.date_city.len(),
        product_discount = tables.product_discount.len(),
        "Aggregate tables built"
    );

    info!("Running anomaly detection");
    let anomalies = classifier.classify_tables(&tables);
    info!(count = anomalies.len(), "Potential anomalies found");

    Ok(Some(Detection {
        transactions: transactions.len(),
        anomalies,
    }))
}

/// Explain every anomaly with at most `max_concurrency` requests in flight.
/// Output order matches input order and every anomaly comes back, explained or
/// with the fallback payload.
pub async fn explain_all<E: Explainer>(
    explainer: Arc<E>,
    anomalies: Vec<Anomaly>,
    max_concurrency: usize,
) -> Vec<EnrichedAnomaly> {
    let total = anomalies.len();

    if max_concurrency <= 1 {
        let mut enriched = Vec::with_capacity(total);
        for (i, anomaly) in anomalies.into_iter().enumerate() {
            let outcome = explainer.explain(&anomaly).await;
            enriched.push(enrich(anomaly, outcome));
            debug!(done = i + 1, total, "Explained anomaly");
        }
        return enriched;
    }

    let semaphore = Arc::new(Semaphore::new(max_concurrency));
    let mut set = JoinSet::new();
    for (idx, anomaly) in anomalies.iter().cloned().enumerate() {
        let explainer = Arc::clone(&explainer);
        let semaphore = Arc::clone(&semaphore);
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let outcome = explainer.explain(&anomaly).await;
            (idx, enrich(anomaly, outcome))
        });
    }

    let mut slots: Vec<Option<EnrichedAnomaly>> = vec![None; total];
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, enriched)) => {
                slots[idx] = Some(enriched);
                debug!(done = idx + 1, total, "Explained anomaly");
            }
            Err(e) => warn!(error = %e, "Explanation task did not complete"),
        }
    }

    slots
        .into_iter()
        .zip(anomalies)
        .map(|(slot, anomaly)| {
            slot.unwrap_or_else(|| {
                enrich(anomaly, Err(Error::Llm("explanation task aborted".to_string())))
            })
        })
        .collect()
}
