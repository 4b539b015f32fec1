use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::{info, warn};

use crate::app::enrich_use_case::EnrichUseCase;
use crate::app::ingest_use_case::IngestUseCase;
use crate::app::ports::ReportOutputPort;
use crate::app::quality_gate_use_case::QualityGateUseCase;
use crate::app::report_use_case::ReportUseCase;
use crate::app::validate_use_case::ValidateUseCase;
use crate::config::PipelinePaths;
use crate::constants::{QUALITY_STATS_REPORT, SUMMARY_REPORT};
use crate::observability::metrics;
use crate::pipeline::processing::quality_gate::QualityStats;
use crate::pipeline::processing::summary::{PipelineSummary, RunOutcome};
use crate::pipeline::processing::validate::ValidationReport;

/// How a full run ended
#[derive(Debug, Clone)]
pub enum PipelineRun {
    /// Stopped before the quality gate
    ValidationFailed(ValidationReport),
    /// The quality gate said halt; cleaned table and stats were still written
    Halted(QualityStats),
    Completed(Box<PipelineSummary>),
}

impl PipelineRun {
    pub fn should_continue(&self) -> bool {
        matches!(self, PipelineRun::Completed(_))
    }
}

/// Use case chaining every stage of one disease pipeline
pub struct PipelineUseCase {
    pipeline: String,
    paths: PipelinePaths,
    /// Without ingestion the run starts from the raw table already on disk
    ingest: Option<IngestUseCase>,
    enrich: EnrichUseCase,
    validate: ValidateUseCase,
    quality_gate: QualityGateUseCase,
    reports: ReportUseCase,
    summary_output: Box<dyn ReportOutputPort>,
}

impl PipelineUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pipeline: impl Into<String>,
        paths: PipelinePaths,
        ingest: Option<IngestUseCase>,
        enrich: EnrichUseCase,
        validate: ValidateUseCase,
        quality_gate: QualityGateUseCase,
        reports: ReportUseCase,
        summary_output: Box<dyn ReportOutputPort>,
    ) -> Self {
        Self {
            pipeline: pipeline.into(),
            paths,
            ingest,
            enrich,
            validate,
            quality_gate,
            reports,
            summary_output,
        }
    }

    /// ingest, enrich, validate, quality gate, then the reports and summary
    pub async fn run(&self) -> Result<PipelineRun> {
        let started = Instant::now();
        info!("Starting {} pipeline run", self.pipeline);

        if let Some(ingest) = &self.ingest {
            ingest.run(&self.paths.raw_file).await?;
        }

        let enriched = self
            .enrich
            .run(&self.paths.raw_file, &self.paths.enriched_file)
            .await?;

        let validation = self.validate.check(&enriched)?;
        if !validation.passed() {
            warn!("Validation failed, halting pipeline");
            return Ok(PipelineRun::ValidationFailed(validation));
        }

        let gated = self
            .quality_gate
            .run(enriched, &self.paths.enriched_file)
            .await?;
        if !gated.outcome.verdict.should_continue() {
            return Ok(PipelineRun::Halted(gated.outcome.stats));
        }

        let table = Arc::new(gated.outcome.table);
        let report_set = self.reports.run(Arc::clone(&table)).await?;

        let mut report_paths = report_set.paths.clone();
        report_paths.insert(QUALITY_STATS_REPORT.to_string(), gated.report_path);

        let summary = PipelineSummary::new(
            RunOutcome {
                condition: &self.pipeline,
                validation_passed: true,
                quality_verdict: gated.outcome.verdict,
                stats: &report_set.stats,
                anomalies: &report_set.anomalies,
                bias: &report_set.bias,
                table_fingerprint: table.fingerprint(),
            },
            report_paths,
        );

        let path = self
            .summary_output
            .write_report(SUMMARY_REPORT, &serde_json::to_value(&summary)?)
            .await?;
        metrics::reports::written(&self.pipeline, SUMMARY_REPORT);
        metrics::stage_duration(&self.pipeline, "pipeline", started.elapsed().as_secs_f64());

        info!(
            run_id = %summary.run_id,
            total_trials = summary.total_trials,
            quality_score = summary.data_quality_score,
            bias_level = summary.bias_level.as_str(),
            "Pipeline complete, summary saved to {}",
            path
        );

        Ok(PipelineRun::Completed(Box::new(summary)))
    }
}
