//! Metrics for the trial pipeline
//!
//! Recording goes through the `metrics` facade with Prometheus naming. A
//! recorder is only installed by [`init`]; without one every helper here is
//! a no-op, which is what the tests rely on.

use std::fmt;
use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Every metric name the pipeline records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Ingest
    IngestStudiesFlattened,
    IngestDuplicatesSkipped,
    IngestMissingIdSkipped,
    IngestRowsEnriched,

    // Validation
    ValidationRuns,
    ValidationErrors,
    ValidationNotices,

    // Quality gate
    QualityGateRowsIn,
    QualityGateRowsOut,
    QualityGateDuplicatesRemoved,
    QualityGateNullValues,
    QualityGateVerdicts,

    // Anomaly
    AnomalyFindings,
    AnomalyQualityScore,

    // Bias
    BiasWarnings,
    BiasLevel,

    // Reports
    ReportsWritten,
    StageDuration,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::IngestStudiesFlattened => "trials_ingest_studies_flattened_total",
            MetricName::IngestDuplicatesSkipped => "trials_ingest_duplicates_skipped_total",
            MetricName::IngestMissingIdSkipped => "trials_ingest_missing_id_skipped_total",
            MetricName::IngestRowsEnriched => "trials_ingest_rows_enriched_total",

            MetricName::ValidationRuns => "trials_validation_runs_total",
            MetricName::ValidationErrors => "trials_validation_errors_total",
            MetricName::ValidationNotices => "trials_validation_notices_total",

            MetricName::QualityGateRowsIn => "trials_quality_gate_rows_in",
            MetricName::QualityGateRowsOut => "trials_quality_gate_rows_out",
            MetricName::QualityGateDuplicatesRemoved => "trials_quality_gate_duplicates_removed_total",
            MetricName::QualityGateNullValues => "trials_quality_gate_null_values",
            MetricName::QualityGateVerdicts => "trials_quality_gate_verdicts_total",

            MetricName::AnomalyFindings => "trials_anomaly_findings",
            MetricName::AnomalyQualityScore => "trials_anomaly_data_quality_score",

            MetricName::BiasWarnings => "trials_bias_warnings",
            MetricName::BiasLevel => "trials_bias_level",

            MetricName::ReportsWritten => "trials_reports_written_total",
            MetricName::StageDuration => "trials_stage_duration_seconds",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            IngestStudiesFlattened,
            IngestDuplicatesSkipped,
            IngestMissingIdSkipped,
            IngestRowsEnriched,
            ValidationRuns,
            ValidationErrors,
            ValidationNotices,
            QualityGateRowsIn,
            QualityGateRowsOut,
            QualityGateDuplicatesRemoved,
            QualityGateNullValues,
            QualityGateVerdicts,
            AnomalyFindings,
            AnomalyQualityScore,
            BiasWarnings,
            BiasLevel,
            ReportsWritten,
            StageDuration,
        ]
        .into_iter()
    }

    /// (stage, description)
    pub fn metadata(&self) -> (&'static str, &'static str) {
        match self {
            MetricName::IngestStudiesFlattened => ("ingest", "Studies flattened into trial rows"),
            MetricName::IngestDuplicatesSkipped => ("ingest", "Studies skipped for a repeated identifier"),
            MetricName::IngestMissingIdSkipped => ("ingest", "Studies skipped for a missing identifier"),
            MetricName::IngestRowsEnriched => ("ingest", "Rows classified and tagged"),
            MetricName::ValidationRuns => ("validation", "Validation runs by result"),
            MetricName::ValidationErrors => ("validation", "Validation errors by kind"),
            MetricName::ValidationNotices => ("validation", "Tolerated validation notices"),
            MetricName::QualityGateRowsIn => ("quality_gate", "Rows entering the quality gate"),
            MetricName::QualityGateRowsOut => ("quality_gate", "Rows left after cleaning"),
            MetricName::QualityGateDuplicatesRemoved => ("quality_gate", "Duplicate rows removed"),
            MetricName::QualityGateNullValues => ("quality_gate", "Null text values before cleaning"),
            MetricName::QualityGateVerdicts => ("quality_gate", "Quality gate verdicts"),
            MetricName::AnomalyFindings => ("anomaly", "Anomaly findings per run"),
            MetricName::AnomalyQualityScore => ("anomaly", "Data quality score"),
            MetricName::BiasWarnings => ("bias", "Bias warnings per run"),
            MetricName::BiasLevel => ("bias", "Bias level (0 low, 1 medium, 2 high)"),
            MetricName::ReportsWritten => ("reports", "Report documents written"),
            MetricName::StageDuration => ("pipeline", "Stage duration in seconds"),
        }
    }
}

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder for this process
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    HANDLE
        .set(handle)
        .map_err(|_| "Prometheus recorder already installed")?;
    info!("Metrics system initialized");
    Ok(())
}

/// Prometheus text exposition of everything recorded so far
pub fn render() -> Option<String> {
    HANDLE.get().map(|handle| handle.render())
}

/// Record how long a stage took
pub fn stage_duration(pipeline: &str, stage: &'static str, secs: f64) {
    ::metrics::histogram!(
        MetricName::StageDuration.as_str(),
        "pipeline" => pipeline.to_string(),
        "stage" => stage
    )
    .record(secs);
}

// ============================================================================
// Ingest Metrics
// ============================================================================

pub mod ingest {
    use super::MetricName;

    pub fn studies_flattened(pipeline: &str, count: usize) {
        ::metrics::counter!(MetricName::IngestStudiesFlattened.as_str(), "pipeline" => pipeline.to_string())
            .increment(count as u64);
    }

    pub fn skipped(pipeline: &str, duplicates: usize, missing_ids: usize) {
        ::metrics::counter!(MetricName::IngestDuplicatesSkipped.as_str(), "pipeline" => pipeline.to_string())
            .increment(duplicates as u64);
        ::metrics::counter!(MetricName::IngestMissingIdSkipped.as_str(), "pipeline" => pipeline.to_string())
            .increment(missing_ids as u64);
    }

    pub fn rows_enriched(pipeline: &str, count: usize) {
        ::metrics::counter!(MetricName::IngestRowsEnriched.as_str(), "pipeline" => pipeline.to_string())
            .increment(count as u64);
    }
}

// ============================================================================
// Validation Metrics
// ============================================================================

pub mod validation {
    use super::MetricName;

    /// Record a validation run
    pub fn run(pipeline: &str, passed: bool) {
        let result = if passed { "passed" } else { "failed" };
        ::metrics::counter!(
            MetricName::ValidationRuns.as_str(),
            "pipeline" => pipeline.to_string(),
            "result" => result
        )
        .increment(1);
    }

    pub fn error(pipeline: &str, kind: &str) {
        ::metrics::counter!(
            MetricName::ValidationErrors.as_str(),
            "pipeline" => pipeline.to_string(),
            "kind" => kind.to_string()
        )
        .increment(1);
    }

    pub fn notices(pipeline: &str, count: usize) {
        ::metrics::counter!(MetricName::ValidationNotices.as_str(), "pipeline" => pipeline.to_string())
            .increment(count as u64);
    }
}

// ============================================================================
// Quality Gate Metrics
// ============================================================================

pub mod quality_gate {
    use super::MetricName;

    pub fn rows(pipeline: &str, rows_in: usize, rows_out: usize) {
        ::metrics::gauge!(MetricName::QualityGateRowsIn.as_str(), "pipeline" => pipeline.to_string())
            .set(rows_in as f64);
        ::metrics::gauge!(MetricName::QualityGateRowsOut.as_str(), "pipeline" => pipeline.to_string())
            .set(rows_out as f64);
    }

    pub fn duplicates_removed(pipeline: &str, count: usize) {
        ::metrics::counter!(
            MetricName::QualityGateDuplicatesRemoved.as_str(),
            "pipeline" => pipeline.to_string()
        )
        .increment(count as u64);
    }

    pub fn null_values(pipeline: &str, count: usize) {
        ::metrics::gauge!(MetricName::QualityGateNullValues.as_str(), "pipeline" => pipeline.to_string())
            .set(count as f64);
    }

    /// Record the gate decision (`continue` or `halt`)
    pub fn verdict(pipeline: &str, verdict: &'static str) {
        ::metrics::counter!(
            MetricName::QualityGateVerdicts.as_str(),
            "pipeline" => pipeline.to_string(),
            "verdict" => verdict
        )
        .increment(1);
    }
}

// ============================================================================
// Anomaly Metrics
// ============================================================================

pub mod anomaly {
    use super::MetricName;

    pub fn findings(pipeline: &str, count: usize) {
        ::metrics::gauge!(MetricName::AnomalyFindings.as_str(), "pipeline" => pipeline.to_string())
            .set(count as f64);
    }

    pub fn quality_score(pipeline: &str, score: f64) {
        ::metrics::gauge!(MetricName::AnomalyQualityScore.as_str(), "pipeline" => pipeline.to_string())
            .set(score);
    }
}

// ============================================================================
// Bias Metrics
// ============================================================================

pub mod bias {
    use super::MetricName;

    pub fn warnings(pipeline: &str, count: usize) {
        ::metrics::gauge!(MetricName::BiasWarnings.as_str(), "pipeline" => pipeline.to_string())
            .set(count as f64);
    }

    /// 0 for low, 1 for medium, 2 for high
    pub fn level(pipeline: &str, level: u8) {
        ::metrics::gauge!(MetricName::BiasLevel.as_str(), "pipeline" => pipeline.to_string())
            .set(level as f64);
    }
}

// ============================================================================
// Report Metrics
// ============================================================================

pub mod reports {
    use super::MetricName;

    pub fn written(pipeline: &str, report: &str) {
        ::metrics::counter!(
            MetricName::ReportsWritten.as_str(),
            "pipeline" => pipeline.to_string(),
            "report" => report.to_string()
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_metric_names_are_unique_and_prefixed() {
        let names: Vec<&str> = MetricName::all_metrics().map(|m| m.as_str()).collect();
        let unique: HashSet<&str> = names.iter().copied().collect();
        assert_eq!(names.len(), unique.len());
        assert!(names.iter().all(|n| n.starts_with("trials_")));
    }

    #[test]
    fn test_display_matches_as_str() {
        for metric in MetricName::all_metrics() {
            assert_eq!(metric.to_string(), metric.as_str());
            assert!(!metric.metadata().1.is_empty());
        }
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        ingest::studies_flattened("diabetes", 3);
        quality_gate::verdict("diabetes", "continue");
        bias::level("diabetes", 2);
        assert!(render().is_none());
    }
}
