use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::app::ports::ReportOutputPort;
use crate::config::PipelineConfig;
use crate::constants::{ANOMALIES_REPORT, BIAS_REPORT, STATS_REPORT};
use crate::error::PipelineError;
use crate::observability::metrics;
use crate::pipeline::processing::anomaly::{AnomalyDetector, AnomalyReport};
use crate::pipeline::processing::bias::{policy_for, BiasLevel, BiasReport};
use crate::pipeline::processing::stats::{summarize, StatsSummary};
use crate::pipeline::table::TrialTable;

/// The three reports computed over one cleaned snapshot
#[derive(Debug, Clone)]
pub struct ReportSet {
    pub stats: StatsSummary,
    pub anomalies: AnomalyReport,
    pub bias: BiasReport,
    /// report name -> path written
    pub paths: BTreeMap<String, String>,
}

/// Use case for the stats, anomaly and bias reports
pub struct ReportUseCase {
    config: Arc<PipelineConfig>,
    output: Box<dyn ReportOutputPort>,
}

impl ReportUseCase {
    pub fn new(config: PipelineConfig, output: Box<dyn ReportOutputPort>) -> Self {
        Self {
            config: Arc::new(config),
            output,
        }
    }

    /// Compute the reports concurrently on blocking threads, then write them
    pub async fn run(&self, table: Arc<TrialTable>) -> Result<ReportSet> {
        let started = Instant::now();
        let pipeline = self.config.name.as_str();

        let detector = AnomalyDetector::from_pipeline(&self.config)?;
        let policy = policy_for(&self.config.bias);

        let stats_task = {
            let table = Arc::clone(&table);
            let config = Arc::clone(&self.config);
            tokio::task::spawn_blocking(move || summarize(&table, &config))
        };
        let anomaly_task = {
            let table = Arc::clone(&table);
            tokio::task::spawn_blocking(move || detector.detect(&table))
        };
        let bias_task = {
            let table = Arc::clone(&table);
            tokio::task::spawn_blocking(move || policy.evaluate(&table))
        };

        let (stats, anomalies, bias) =
            tokio::try_join!(stats_task, anomaly_task, bias_task).map_err(PipelineError::from)?;

        info!(
            "Stats computed: {} trials, {} columns",
            stats.total_trials, stats.total_columns
        );

        metrics::anomaly::findings(pipeline, anomalies.total_anomalies);
        metrics::anomaly::quality_score(pipeline, anomalies.data_quality_score);
        if anomalies.total_anomalies > 0 {
            warn!(
                findings = anomalies.total_anomalies,
                score = anomalies.data_quality_score,
                "Anomalies detected"
            );
        } else {
            info!("No anomalies detected, score {}", anomalies.data_quality_score);
        }

        metrics::bias::warnings(pipeline, bias.warnings.len());
        metrics::bias::level(pipeline, level_value(bias.bias_level));
        for warning in &bias.warnings {
            warn!("Bias warning: {}", warning);
        }
        info!("Bias level: {}", bias.bias_level.as_str());

        let mut paths = BTreeMap::new();
        paths.insert(STATS_REPORT.to_string(), self.write(STATS_REPORT, &stats).await?);
        paths.insert(ANOMALIES_REPORT.to_string(), self.write(ANOMALIES_REPORT, &anomalies).await?);
        paths.insert(BIAS_REPORT.to_string(), self.write(BIAS_REPORT, &bias).await?);

        metrics::stage_duration(pipeline, "reports", started.elapsed().as_secs_f64());

        Ok(ReportSet {
            stats,
            anomalies,
            bias,
            paths,
        })
    }

    async fn write<T: Serialize>(&self, name: &str, report: &T) -> Result<String> {
        let path = self.output.write_report(name, &serde_json::to_value(report)?).await?;
        metrics::reports::written(&self.config.name, name);
        info!("Saved {} to {}", name, path);
        Ok(path)
    }
}

fn level_value(level: BiasLevel) -> u8 {
    match level {
        BiasLevel::Low => 0,
        BiasLevel::Medium => 1,
        BiasLevel::High => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::mocks::MockReports;
    use crate::constants::*;
    use crate::pipeline::table::Cell;

    fn cleaned(rows: usize) -> TrialTable {
        let columns = vec![
            NCT_NUMBER.to_string(),
            SEX.to_string(),
            ENROLLMENT.to_string(),
            LOCATIONS.to_string(),
            DISEASE_TYPE.to_string(),
        ];
        let rows: Vec<Vec<Cell>> = (0..rows)
            .map(|i| {
                vec![
                    Some(format!("NCT{:08}", i)),
                    Some("ALL".to_string()),
                    Some("100".to_string()),
                    Some("Site, United States".to_string()),
                    Some("Type 2 Diabetes".to_string()),
                ]
            })
            .collect();
        TrialTable::from_rows(columns, rows).unwrap()
    }

    #[tokio::test]
    async fn test_reports_are_written() {
        let reports = MockReports::default();
        let use_case = ReportUseCase::new(PipelineConfig::diabetes(), Box::new(reports.clone()));

        let set = use_case.run(Arc::new(cleaned(20))).await.unwrap();

        assert_eq!(set.stats.total_trials, 20);
        assert_eq!(set.anomalies.total_rows, 20);
        // all trials are US-based
        assert_eq!(set.bias.warnings.len(), 1);
        assert!(set.bias.warnings[0].starts_with("GEOGRAPHIC BIAS"));
        assert_eq!(set.bias.bias_level, BiasLevel::Medium);
        assert_eq!(set.paths.len(), 3);

        let written = reports.reports.lock().await;
        assert!(written.contains_key(STATS_REPORT));
        assert!(written.contains_key(ANOMALIES_REPORT));
        assert_eq!(written[BIAS_REPORT]["policy"], "rules");
    }

    #[tokio::test]
    async fn test_slice_policy_marks_missing_columns() {
        let reports = MockReports::default();
        let use_case = ReportUseCase::new(PipelineConfig::breast_cancer(), Box::new(reports.clone()));

        let set = use_case.run(Arc::new(cleaned(5))).await.unwrap();
        assert_eq!(set.bias.bias_level, BiasLevel::Low);

        let written = reports.reports.lock().await;
        assert_eq!(written[BIAS_REPORT]["slices"][PHASES]["error"], "column_not_found");
    }
}
