use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use tracing::{info, warn};

use crate::app::ports::{ReportOutputPort, TableSinkPort};
use crate::config::PipelineConfig;
use crate::constants::QUALITY_STATS_REPORT;
use crate::observability::metrics;
use crate::pipeline::processing::quality_gate::{
    DefaultQualityGate, QualityGate, QualityGateOutcome, QualityGateVerdict,
};
use crate::pipeline::table::TrialTable;

/// Gate outcome plus where its stats report went
#[derive(Debug, Clone)]
pub struct QualityGateResult {
    pub outcome: QualityGateOutcome,
    pub report_path: String,
}

/// Use case for cleaning the enriched table and deciding whether to continue
pub struct QualityGateUseCase {
    pipeline: String,
    quality_gate: Box<dyn QualityGate + Send + Sync>,
    sink: Box<dyn TableSinkPort>,
    reports: Box<dyn ReportOutputPort>,
}

impl QualityGateUseCase {
    pub fn new(
        pipeline: impl Into<String>,
        quality_gate: Box<dyn QualityGate + Send + Sync>,
        sink: Box<dyn TableSinkPort>,
        reports: Box<dyn ReportOutputPort>,
    ) -> Self {
        Self {
            pipeline: pipeline.into(),
            quality_gate,
            sink,
            reports,
        }
    }

    /// Create a use case with the default quality gate for `config`
    pub fn with_default_quality_gate(
        config: &PipelineConfig,
        sink: Box<dyn TableSinkPort>,
        reports: Box<dyn ReportOutputPort>,
    ) -> Self {
        Self::new(
            config.name.clone(),
            Box::new(DefaultQualityGate::from_pipeline(config)),
            sink,
            reports,
        )
    }

    /// Clean `table`, replace the file at `output` with the cleaned table and
    /// write the quality stats report. Both are written even on `Halt`.
    pub async fn run(&self, table: TrialTable, output: &Path) -> Result<QualityGateResult> {
        let started = Instant::now();

        let outcome = self.quality_gate.run(table)?;
        let stats = &outcome.stats;

        metrics::quality_gate::rows(&self.pipeline, stats.total_rows, stats.rows_after_cleaning);
        metrics::quality_gate::duplicates_removed(&self.pipeline, stats.duplicates_removed);
        metrics::quality_gate::null_values(&self.pipeline, stats.issues.null_values);
        metrics::quality_gate::verdict(&self.pipeline, outcome.verdict.as_str());

        info!(
            rows_in = stats.total_rows,
            rows_out = stats.rows_after_cleaning,
            duplicates_removed = stats.duplicates_removed,
            null_values = stats.issues.null_values,
            extra_whitespace = stats.issues.extra_whitespace,
            "Quality gate cleaned table"
        );

        self.sink.write_table(output, &outcome.table).await?;
        let report_path = self
            .reports
            .write_report(QUALITY_STATS_REPORT, &serde_json::to_value(stats)?)
            .await?;
        metrics::reports::written(&self.pipeline, QUALITY_STATS_REPORT);
        info!("Quality stats saved to {}", report_path);

        match outcome.verdict {
            QualityGateVerdict::Continue => info!("Quality gate passed, continuing"),
            QualityGateVerdict::Halt => warn!(
                "Quality gate halted: {} null values over {} rows",
                stats.issues.null_values, stats.total_rows
            ),
        }

        metrics::stage_duration(&self.pipeline, "quality_gate", started.elapsed().as_secs_f64());
        Ok(QualityGateResult {
            outcome,
            report_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::mocks::{MockReports, MockTables};
    use crate::constants::*;
    use crate::pipeline::table::Cell;

    fn table(rows: Vec<Vec<Cell>>) -> TrialTable {
        TrialTable::from_rows(vec![NCT_NUMBER.into(), STUDY_TITLE.into()], rows).unwrap()
    }

    fn cell(v: &str) -> Cell {
        Some(v.to_string())
    }

    #[tokio::test]
    async fn test_quality_gate_use_case() {
        let tables = MockTables::default();
        let reports = MockReports::default();
        let use_case = QualityGateUseCase::with_default_quality_gate(
            &PipelineConfig::diabetes(),
            Box::new(tables.clone()),
            Box::new(reports.clone()),
        );

        let input = table(vec![
            vec![cell("NCT00000001"), cell("  Insulin   pump  ")],
            vec![cell("NCT00000001"), None],
            vec![cell("NCT00000002"), cell("T2DM &amp; diet")],
        ]);
        let output = Path::new("enriched.csv");
        let result = use_case.run(input, output).await.unwrap();
        assert_eq!(result.report_path, "memory://quality_stats");
        let outcome = result.outcome;

        assert_eq!(outcome.verdict, QualityGateVerdict::Continue);
        assert_eq!(outcome.stats.duplicates_removed, 1);

        let written = tables.get(output).await.unwrap();
        let titles: Vec<_> = written.column(STUDY_TITLE).unwrap().collect();
        assert_eq!(
            titles,
            vec![Some("Insulin pump"), Some("Type 2 Diabetes Mellitus & diet")]
        );

        let reports = reports.reports.lock().await;
        let stats = &reports[QUALITY_STATS_REPORT];
        assert_eq!(stats["total_rows"], 3);
        assert_eq!(stats["rows_after_cleaning"], 2);
    }

    #[tokio::test]
    async fn test_halt_still_writes_outputs() {
        let tables = MockTables::default();
        let reports = MockReports::default();
        let use_case = QualityGateUseCase::with_default_quality_gate(
            &PipelineConfig::diabetes(),
            Box::new(tables.clone()),
            Box::new(reports.clone()),
        );

        let rows = (0..10).map(|i| vec![cell(&format!("NCT{:08}", i)), None]).collect();
        let outcome = use_case
            .run(table(rows), Path::new("out.csv"))
            .await
            .unwrap()
            .outcome;

        assert_eq!(outcome.verdict, QualityGateVerdict::Halt);
        assert!(tables.get(Path::new("out.csv")).await.is_some());
        assert!(reports.reports.lock().await.contains_key(QUALITY_STATS_REPORT));
    }
}
