use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{AnomalyConfig, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::{numeric_values, round2};
use crate::pipeline::table::TrialTable;

/// Whether an anomaly scan found anything. Distinct from the quality gate's
/// continue/halt verdict: `Detected` only drives alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyPresence {
    Detected,
    Clear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighMissingColumn {
    pub column: String,
    pub missing_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierFinding {
    pub field: String,
    pub count: usize,
    pub lower_fence: f64,
    pub upper_fence: f64,
    /// First few outlying values in row order
    pub examples: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountFinding {
    pub column: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyCategories {
    pub missing_required_columns: Vec<String>,
    pub high_missing: Vec<HighMissingColumn>,
    pub outliers: Vec<OutlierFinding>,
    pub duplicates: Vec<CountFinding>,
    pub invalid_formats: Vec<CountFinding>,
}

impl AnomalyCategories {
    pub fn finding_count(&self) -> usize {
        self.missing_required_columns.len()
            + self.high_missing.len()
            + self.outliers.len()
            + self.duplicates.len()
            + self.invalid_formats.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub total_rows: usize,
    pub total_anomalies: usize,
    pub anomalies: AnomalyCategories,
    /// `100 - findings / rows * 100`, clamped to [0, 100]; 0 on an empty table
    pub data_quality_score: f64,
    pub high_missing_threshold: f64,
}

impl AnomalyReport {
    pub fn presence(&self) -> AnomalyPresence {
        if self.anomalies.finding_count() > 0 {
            AnomalyPresence::Detected
        } else {
            AnomalyPresence::Clear
        }
    }
}

pub fn quality_score(findings: usize, rows: usize) -> f64 {
    if rows == 0 {
        return 0.0;
    }
    round2(100.0 - findings as f64 / rows as f64 * 100.0).clamp(0.0, 100.0)
}

/// Quantile with linear interpolation between closest ranks; `sorted` must be ascending
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

/// Statistical scan of a cleaned table
pub struct AnomalyDetector {
    pub config: AnomalyConfig,
    pub id_column: String,
    id_pattern: Regex,
}

impl AnomalyDetector {
    pub fn new(config: AnomalyConfig, id_column: impl Into<String>, id_pattern: &str) -> Result<Self> {
        let id_pattern = Regex::new(id_pattern).map_err(|e| {
            PipelineError::Config(format!("invalid id_pattern '{}': {}", id_pattern, e))
        })?;
        Ok(Self {
            config,
            id_column: id_column.into(),
            id_pattern,
        })
    }

    pub fn from_pipeline(config: &PipelineConfig) -> Result<Self> {
        Self::new(config.anomaly.clone(), config.id_column.clone(), &config.id_pattern)
    }

    pub fn detect(&self, table: &TrialTable) -> AnomalyReport {
        let mut anomalies = AnomalyCategories {
            missing_required_columns: self
                .config
                .required_columns
                .iter()
                .filter(|c| !table.has_column(c))
                .cloned()
                .collect(),
            high_missing: self.high_missing(table),
            ..AnomalyCategories::default()
        };

        if self.config.check_outliers {
            anomalies.outliers = self
                .config
                .numeric_columns
                .iter()
                .filter_map(|c| self.outliers(table, c))
                .collect();
        }

        if let Some(ids) = table.column(&self.id_column) {
            let ids: Vec<Option<&str>> = ids.collect();

            if self.config.check_duplicates {
                let distinct: HashSet<&Option<&str>> = ids.iter().collect();
                let count = ids.len() - distinct.len();
                if count > 0 {
                    anomalies.duplicates.push(CountFinding {
                        column: self.id_column.clone(),
                        count,
                    });
                }
            }

            if self.config.check_id_format {
                let count = ids
                    .iter()
                    .filter(|id| !id.map(|v| self.id_pattern.is_match(v)).unwrap_or(false))
                    .count();
                if count > 0 {
                    anomalies.invalid_formats.push(CountFinding {
                        column: self.id_column.clone(),
                        count,
                    });
                }
            }
        }

        let total_anomalies = anomalies.finding_count();
        AnomalyReport {
            total_rows: table.len(),
            total_anomalies,
            data_quality_score: quality_score(total_anomalies, table.len()),
            high_missing_threshold: self.config.high_missing_threshold,
            anomalies,
        }
    }

    fn high_missing(&self, table: &TrialTable) -> Vec<HighMissingColumn> {
        if table.is_empty() {
            return Vec::new();
        }
        table
            .columns()
            .iter()
            .filter_map(|column| {
                let fraction = table.missing_fraction(column)?;
                (fraction >= self.config.high_missing_threshold).then(|| HighMissingColumn {
                    column: column.clone(),
                    missing_percentage: round2(fraction * 100.0),
                })
            })
            .collect()
    }

    fn outliers(&self, table: &TrialTable, column: &str) -> Option<OutlierFinding> {
        let values = numeric_values(table, column)?;
        let mut sorted = values.clone();
        sorted.sort_by(f64::total_cmp);

        let q1 = quantile(&sorted, 0.25)?;
        let q3 = quantile(&sorted, 0.75)?;
        let iqr = q3 - q1;
        let lower_fence = q1 - self.config.iqr_multiplier * iqr;
        let upper_fence = q3 + self.config.iqr_multiplier * iqr;

        let outlying: Vec<f64> = values
            .into_iter()
            .filter(|v| *v < lower_fence || *v > upper_fence)
            .collect();
        if outlying.is_empty() {
            return None;
        }
        Some(OutlierFinding {
            field: column.to_string(),
            count: outlying.len(),
            lower_fence,
            upper_fence,
            examples: outlying
                .into_iter()
                .take(self.config.max_outlier_examples)
                .collect(),
        })
    }
}
