use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::processing::anomaly::{AnomalyPresence, AnomalyReport};
use crate::pipeline::processing::bias::{BiasLevel, BiasReport};
use crate::pipeline::processing::quality_gate::QualityGateVerdict;
use crate::pipeline::processing::stats::StatsSummary;

/// Consolidated record of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub run_id: Uuid,
    pub pipeline_run_date: DateTime<Utc>,
    pub condition: String,
    pub total_trials: usize,
    pub data_quality_score: f64,
    pub bias_level: BiasLevel,
    pub validation_passed: bool,
    pub quality_verdict: QualityGateVerdict,
    pub anomalies: AnomalyPresence,
    /// SHA-256 of the cleaned table the reports were computed from
    pub table_fingerprint: String,
    /// report name -> path written
    pub reports: BTreeMap<String, String>,
}

/// Everything a run produced that the summary is built from
pub struct RunOutcome<'a> {
    pub condition: &'a str,
    pub validation_passed: bool,
    pub quality_verdict: QualityGateVerdict,
    pub stats: &'a StatsSummary,
    pub anomalies: &'a AnomalyReport,
    pub bias: &'a BiasReport,
    pub table_fingerprint: String,
}

impl PipelineSummary {
    pub fn new(outcome: RunOutcome<'_>, reports: BTreeMap<String, String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            pipeline_run_date: Utc::now(),
            condition: outcome.condition.to_string(),
            total_trials: outcome.stats.total_trials,
            data_quality_score: outcome.anomalies.data_quality_score,
            bias_level: outcome.bias.bias_level,
            validation_passed: outcome.validation_passed,
            quality_verdict: outcome.quality_verdict,
            anomalies: outcome.anomalies.presence(),
            table_fingerprint: outcome.table_fingerprint,
            reports,
        }
    }
}
