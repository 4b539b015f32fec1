//! Data-level bias slicing.
//!
//! The primitives here ([`representation`], [`missingness_by_slice`],
//! [`count_matching`], [`geography_split`]) are shared by two scoring
//! policies: [`SliceBiasPolicy`] reports representation and missingness per
//! requested column, [`RuleBiasPolicy`] runs fixed domain checks that raise
//! warnings. Both produce a [`BiasReport`] whose `bias_level` is derived only
//! from the warning count.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{BiasPolicyConfig, RuleBiasConfig, SliceBiasConfig};
use crate::constants::{DOMESTIC_MARKER, MISSING_LABEL};
use crate::pipeline::processing::round2;
use crate::pipeline::table::TrialTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BiasLevel {
    Low,
    Medium,
    High,
}

impl BiasLevel {
    /// 0 warnings is `Low`, 1 is `Medium`, 2 or more is `High`
    pub fn from_warning_count(warnings: usize) -> Self {
        match warnings {
            0 => BiasLevel::Low,
            1 => BiasLevel::Medium,
            _ => BiasLevel::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BiasLevel::Low => "LOW",
            BiasLevel::Medium => "MEDIUM",
            BiasLevel::High => "HIGH",
        }
    }
}

/// Value counts, with missing cells under `MISSING`, and their share of all rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Representation {
    pub counts: BTreeMap<String, usize>,
    pub pct: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeographySplit {
    pub us_trials: usize,
    pub international_trials: usize,
    pub us_percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceError {
    ColumnNotFound,
}

/// One entry of [`BiasReport::slices`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SliceReport {
    NotFound {
        error: SliceError,
    },
    Representation {
        representation: Representation,
        /// important column -> slice value -> missing fraction
        missingness_by_slice: BTreeMap<String, BTreeMap<String, f64>>,
    },
    Geography(GeographySplit),
    Counts(BTreeMap<String, usize>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasReport {
    pub policy: String,
    pub total_trials: usize,
    pub slice_columns_requested: Vec<String>,
    pub slice_columns_found: Vec<String>,
    pub slices: BTreeMap<String, SliceReport>,
    pub warnings: Vec<String>,
    pub overall_bias_score: usize,
    pub bias_level: BiasLevel,
}

impl BiasReport {
    fn new(policy: &str, table: &TrialTable, requested: Vec<String>) -> Self {
        let found = requested
            .iter()
            .filter(|c| table.has_column(c))
            .cloned()
            .collect();
        Self {
            policy: policy.to_string(),
            total_trials: table.len(),
            slice_columns_requested: requested,
            slice_columns_found: found,
            slices: BTreeMap::new(),
            warnings: Vec::new(),
            overall_bias_score: 0,
            bias_level: BiasLevel::Low,
        }
    }

    fn finish(mut self) -> Self {
        self.overall_bias_score = self.warnings.len();
        self.bias_level = BiasLevel::from_warning_count(self.warnings.len());
        self
    }
}

pub fn representation(table: &TrialTable, column: &str) -> Option<Representation> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for value in table.column(column)? {
        *counts
            .entry(value.unwrap_or(MISSING_LABEL).to_string())
            .or_default() += 1;
    }
    let total = table.len() as f64;
    let pct = counts
        .iter()
        .map(|(k, v)| (k.clone(), *v as f64 / total))
        .collect();
    Some(Representation { counts, pct })
}

/// Per slice value of `slice_column`, the missing fraction of each present
/// column in `columns`
pub fn missingness_by_slice(
    table: &TrialTable,
    slice_column: &str,
    columns: &[String],
) -> Option<BTreeMap<String, BTreeMap<String, f64>>> {
    let slice_idx = table.column_index(slice_column)?;
    let mut out = BTreeMap::new();

    for column in columns {
        let Some(idx) = table.column_index(column) else {
            continue;
        };
        // slice value -> (missing, rows)
        let mut groups: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for row in table.rows() {
            let key = row[slice_idx].as_deref().unwrap_or(MISSING_LABEL);
            let entry = groups.entry(key).or_default();
            entry.1 += 1;
            if row[idx].is_none() {
                entry.0 += 1;
            }
        }
        let fractions = groups
            .into_iter()
            .map(|(k, (missing, rows))| (k.to_string(), missing as f64 / rows as f64))
            .collect();
        out.insert(column.clone(), fractions);
    }
    Some(out)
}

/// Rows whose value contains any of `patterns`, ignoring case
pub fn count_matching(table: &TrialTable, column: &str, patterns: &[String]) -> Option<usize> {
    let patterns: Vec<String> = patterns.iter().map(|p| p.to_lowercase()).collect();
    let count = table
        .column(column)?
        .flatten()
        .filter(|v| {
            let lower = v.to_lowercase();
            patterns.iter().any(|p| lower.contains(p.as_str()))
        })
        .count();
    Some(count)
}

/// Split rows into those mentioning the United States and the rest
pub fn geography_split(table: &TrialTable, column: &str) -> Option<GeographySplit> {
    let us_trials = count_matching(table, column, &[DOMESTIC_MARKER.to_string()])?;
    let total = table.len();
    let us_percentage = if total > 0 {
        round2(us_trials as f64 / total as f64 * 100.0)
    } else {
        0.0
    };
    Some(GeographySplit {
        us_trials,
        international_trials: total - us_trials,
        us_percentage,
    })
}

/// Counts of present values only
fn value_counts(table: &TrialTable, column: &str) -> Option<BTreeMap<String, usize>> {
    let mut counts = BTreeMap::new();
    for value in table.column(column)?.flatten() {
        *counts.entry(value.to_string()).or_default() += 1;
    }
    Some(counts)
}

/// A scoring policy over the shared slicing primitives
pub trait BiasPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, table: &TrialTable) -> BiasReport;
}

pub fn policy_for(config: &BiasPolicyConfig) -> Box<dyn BiasPolicy> {
    match config {
        BiasPolicyConfig::Rules(rules) => Box::new(RuleBiasPolicy::new(rules.clone())),
        BiasPolicyConfig::Slices(slices) => Box::new(SliceBiasPolicy::new(slices.clone())),
    }
}

/// Representation and missingness per requested column; never warns
pub struct SliceBiasPolicy {
    pub config: SliceBiasConfig,
}

impl SliceBiasPolicy {
    pub fn new(config: SliceBiasConfig) -> Self {
        Self { config }
    }
}

impl BiasPolicy for SliceBiasPolicy {
    fn name(&self) -> &'static str {
        "slices"
    }

    fn evaluate(&self, table: &TrialTable) -> BiasReport {
        let mut report = BiasReport::new(self.name(), table, self.config.slice_columns.clone());

        for column in &self.config.slice_columns {
            let slice = match (
                representation(table, column),
                missingness_by_slice(table, column, &self.config.missingness_columns),
            ) {
                (Some(representation), Some(missingness_by_slice)) => SliceReport::Representation {
                    representation,
                    missingness_by_slice,
                },
                _ => SliceReport::NotFound {
                    error: SliceError::ColumnNotFound,
                },
            };
            report.slices.insert(column.clone(), slice);
        }
        report.finish()
    }
}

/// Fixed checks on age, sex, classification and geography
pub struct RuleBiasPolicy {
    pub config: RuleBiasConfig,
}

impl RuleBiasPolicy {
    pub fn new(config: RuleBiasConfig) -> Self {
        Self { config }
    }

    fn check_age(&self, table: &TrialTable, report: &mut BiasReport) {
        let cfg = &self.config;
        let mut slices = BTreeMap::new();
        for slice in &cfg.age_slices {
            let Some(count) = count_matching(table, &cfg.age_column, &slice.patterns) else {
                return;
            };
            slices.insert(slice.name.clone(), count);
        }

        let total = table.len();
        if let Some(&pediatric) = slices.get(&cfg.pediatric_slice) {
            if (pediatric as f64) < total as f64 * cfg.pediatric_min_fraction {
                report.warnings.push(format!(
                    "LOW pediatric representation: {} trials ({:.1}%)",
                    pediatric,
                    percent(pediatric, total)
                ));
            }
        }
        report.slices.insert("age".to_string(), SliceReport::Counts(slices));
    }

    fn check_sex(&self, table: &TrialTable, report: &mut BiasReport) {
        let cfg = &self.config;
        let Some(counts) = value_counts(table, &cfg.sex_column) else {
            return;
        };

        let (mut male, mut female) = (0usize, 0usize);
        for (value, count) in &counts {
            let lower = value.to_lowercase();
            if lower.contains("female") {
                female += count;
            } else if lower.contains("male") {
                male += count;
            }
        }

        if male > 0 && female > 0 {
            let ratio = male as f64 / female as f64;
            if ratio > cfg.sex_ratio_max || ratio < cfg.sex_ratio_min {
                report.warnings.push(format!(
                    "SEX IMBALANCE: Male={}, Female={} (ratio: {:.2})",
                    male, female, ratio
                ));
            }
        }
        report.slices.insert("sex".to_string(), SliceReport::Counts(counts));
    }

    fn check_classification(&self, table: &TrialTable, report: &mut BiasReport) {
        let column = &self.config.classification_column;
        if let Some(counts) = value_counts(table, column) {
            report.slices.insert(column.clone(), SliceReport::Counts(counts));
        }
    }

    fn check_geography(&self, table: &TrialTable, report: &mut BiasReport) {
        let cfg = &self.config;
        let Some(split) = geography_split(table, &cfg.location_column) else {
            return;
        };
        let total = table.len();
        if total > 0 && split.us_trials as f64 / total as f64 > cfg.max_domestic_fraction {
            report.warnings.push(format!(
                "GEOGRAPHIC BIAS: {:.1}% US-only trials",
                split.us_percentage
            ));
        }
        report
            .slices
            .insert("geography".to_string(), SliceReport::Geography(split));
    }
}

impl BiasPolicy for RuleBiasPolicy {
    fn name(&self) -> &'static str {
        "rules"
    }

    fn evaluate(&self, table: &TrialTable) -> BiasReport {
        let cfg = &self.config;
        let requested = vec![
            cfg.age_column.clone(),
            cfg.sex_column.clone(),
            cfg.classification_column.clone(),
            cfg.location_column.clone(),
        ];
        let mut report = BiasReport::new(self.name(), table, requested);

        self.check_age(table, &mut report);
        self.check_sex(table, &mut report);
        self.check_classification(table, &mut report);
        self.check_geography(table, &mut report);
        report.finish()
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}
