use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{PipelineConfig, QualityConfig};
use crate::error::Result;
use crate::pipeline::processing::dedup::dedupe;
use crate::pipeline::processing::normalize::TextNormalizer;
use crate::pipeline::table::TrialTable;

static EXTRA_WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s{2,}").expect("whitespace pattern is a valid regex"));

/// Whether the pipeline should keep going after the quality gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityGateVerdict {
    Continue,
    Halt,
}

impl QualityGateVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityGateVerdict::Continue => "continue",
            QualityGateVerdict::Halt => "halt",
        }
    }

    pub fn should_continue(&self) -> bool {
        matches!(self, QualityGateVerdict::Continue)
    }
}

/// Text issues counted over the configured text columns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityIssues {
    pub null_values: usize,
    /// Values containing a run of two or more whitespace characters
    pub extra_whitespace: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityStats {
    pub total_rows: usize,
    pub total_columns: usize,
    pub rows_after_cleaning: usize,
    pub duplicates_removed: usize,
    /// Measured before cleaning
    pub issues: QualityIssues,
    pub issues_after_cleaning: QualityIssues,
    pub missing_by_column: BTreeMap<String, usize>,
}

/// Cleaned table plus what the gate measured and decided
#[derive(Debug, Clone)]
pub struct QualityGateOutcome {
    pub table: TrialTable,
    pub stats: QualityStats,
    pub verdict: QualityGateVerdict,
}

/// Trait for the clean, dedupe and decide checkpoint
pub trait QualityGate: Send + Sync {
    /// Consume the table and return it cleaned along with the decision
    fn run(&self, table: TrialTable) -> Result<QualityGateOutcome>;
}

/// Quality gate driven by [`QualityConfig`]
pub struct DefaultQualityGate {
    pub config: QualityConfig,
    /// Identity key used for deduplication
    pub id_column: String,
    normalizer: TextNormalizer,
}

impl DefaultQualityGate {
    pub fn new(config: QualityConfig, id_column: impl Into<String>) -> Self {
        Self {
            config,
            id_column: id_column.into(),
            normalizer: TextNormalizer::new(),
        }
    }

    pub fn from_pipeline(config: &PipelineConfig) -> Self {
        Self::new(config.quality.clone(), config.id_column.clone())
    }

    /// Configured text columns that the table actually has
    fn present_text_columns<'a>(&'a self, table: &TrialTable) -> Vec<&'a str> {
        self.config
            .text_columns
            .iter()
            .filter(|c| table.has_column(c))
            .map(String::as_str)
            .collect()
    }

    fn count_issues(&self, table: &TrialTable) -> QualityIssues {
        let mut issues = QualityIssues::default();
        for column in self.present_text_columns(table) {
            if let Some(values) = table.column(column) {
                for value in values {
                    match value {
                        None => issues.null_values += 1,
                        Some(v) if EXTRA_WHITESPACE.is_match(v) => issues.extra_whitespace += 1,
                        Some(_) => {}
                    }
                }
            }
        }
        issues
    }

    /// `Halt` when nulls over the text columns exceed the configured share
    /// of rows. The ratio can exceed 1 because several columns are counted.
    pub fn decide(&self, stats: &QualityStats) -> QualityGateVerdict {
        if stats.total_rows == 0 {
            return QualityGateVerdict::Continue;
        }
        let ratio = stats.issues.null_values as f64 / stats.total_rows as f64;
        if ratio > self.config.halt_null_fraction {
            QualityGateVerdict::Halt
        } else {
            QualityGateVerdict::Continue
        }
    }
}

impl QualityGate for DefaultQualityGate {
    fn run(&self, mut table: TrialTable) -> Result<QualityGateOutcome> {
        let total_rows = table.len();
        let total_columns = table.column_count();
        let issues = self.count_issues(&table);

        for column in self.present_text_columns(&table) {
            table.map_column(column, |v| self.normalizer.normalize(v))?;
        }

        let deduped = dedupe(table, &self.id_column);
        let table = deduped.table;

        let missing_by_column = table
            .columns()
            .iter()
            .map(|c| (c.clone(), table.missing_count(c).unwrap_or(0)))
            .collect();

        let stats = QualityStats {
            total_rows,
            total_columns,
            rows_after_cleaning: table.len(),
            duplicates_removed: deduped.removed,
            issues,
            issues_after_cleaning: self.count_issues(&table),
            missing_by_column,
        };
        let verdict = self.decide(&stats);

        Ok(QualityGateOutcome {
            table,
            stats,
            verdict,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;

    fn gate() -> DefaultQualityGate {
        DefaultQualityGate::from_pipeline(&PipelineConfig::diabetes())
    }

    fn table_with_null_titles(rows: usize, nulls: usize) -> TrialTable {
        let mut table = TrialTable::new([NCT_NUMBER, STUDY_TITLE]);
        for i in 0..rows {
            let title = if i < nulls { None } else { Some(format!("Trial {}", i)) };
            table
                .push_row(vec![Some(format!("NCT{:08}", i)), title])
                .unwrap();
        }
        table
    }

    #[test]
    fn test_heavy_nulls_halt() {
        let outcome = gate().run(table_with_null_titles(100, 85)).unwrap();
        assert_eq!(outcome.stats.issues.null_values, 85);
        assert_eq!(outcome.verdict, QualityGateVerdict::Halt);
    }

    #[test]
    fn test_light_nulls_continue() {
        let outcome = gate().run(table_with_null_titles(100, 5)).unwrap();
        assert_eq!(outcome.verdict, QualityGateVerdict::Continue);
    }

    #[test]
    fn test_empty_table_continues() {
        let outcome = gate().run(TrialTable::new([NCT_NUMBER])).unwrap();
        assert_eq!(outcome.stats.total_rows, 0);
        assert_eq!(outcome.verdict, QualityGateVerdict::Continue);
    }

    #[test]
    fn test_cleans_text_and_removes_duplicates() {
        let table = TrialTable::from_rows(
            vec![NCT_NUMBER.into(), STUDY_TITLE.into(), CONDITIONS.into()],
            vec![
                vec![
                    Some("NCT00000001".into()),
                    Some("  T1DM &amp; obesity  diabetes diabetes  ".into()),
                    None,
                ],
                vec![
                    Some("NCT00000001".into()),
                    Some("Duplicate".into()),
                    Some("T2D".into()),
                ],
                vec![Some("NCT00000002".into()), Some("Plain".into()), None],
            ],
        )
        .unwrap();

        let outcome = gate().run(table).unwrap();

        assert_eq!(outcome.stats.total_rows, 3);
        assert_eq!(outcome.stats.rows_after_cleaning, 2);
        assert_eq!(outcome.stats.duplicates_removed, 1);
        assert_eq!(outcome.stats.issues.extra_whitespace, 1);
        assert_eq!(outcome.stats.issues.null_values, 2);
        assert_eq!(outcome.stats.issues_after_cleaning.extra_whitespace, 0);
        assert_eq!(outcome.stats.missing_by_column[CONDITIONS], 1);

        let conditions: Vec<_> = outcome.table.column(CONDITIONS).unwrap().collect();
        assert_eq!(conditions[0], Some("Type 2 Diabetes Mellitus"));
    }

    #[test]
    fn test_enriched_duplicates_collapse_to_one_row_per_trial() {
        use crate::pipeline::processing::enrich::{enrich, DiabetesClassifier};

        let config = PipelineConfig::diabetes();
        let row = |id: &str, condition: &str| {
            vec![Some(id.to_string()), Some("Insulin study".to_string()), Some(condition.to_string())]
        };
        let table = TrialTable::from_rows(
            vec![NCT_NUMBER.into(), STUDY_TITLE.into(), CONDITIONS.into()],
            vec![
                row("NCT00000001", "Type 1 Diabetes Mellitus"),
                row("NCT00000001", "Type 1 Diabetes Mellitus"),
                row("NCT00000002", "Type 2 Diabetes"),
            ],
        )
        .unwrap();

        let enriched = enrich(table, &DiabetesClassifier, &config).unwrap();
        let outcome = DefaultQualityGate::from_pipeline(&config).run(enriched).unwrap();

        assert_eq!(outcome.stats.duplicates_removed, 1);
        assert_eq!(outcome.verdict, QualityGateVerdict::Continue);
        let ids: Vec<_> = outcome.table.column(NCT_NUMBER).unwrap().collect();
        assert_eq!(ids, vec![Some("NCT00000001"), Some("NCT00000002")]);
        let labels: Vec<_> = outcome.table.column(DISEASE_TYPE).unwrap().collect();
        assert_eq!(labels, vec![Some("Type 1 Diabetes"), Some("Type 2 Diabetes")]);
    }

    #[test]
    fn test_blank_cells_count_as_nulls() {
        let table = TrialTable::from_rows(
            vec![NCT_NUMBER.into(), STUDY_TITLE.into()],
            vec![
                vec![Some("NCT00000001".into()), Some("   ".into())],
                vec![Some("NCT00000002".into()), Some("".into())],
                vec![Some("NCT00000003".into()), Some("Titled".into())],
            ],
        )
        .unwrap();

        let outcome = gate().run(table).unwrap();
        assert_eq!(outcome.stats.issues.null_values, 2);
        assert_eq!(outcome.stats.issues.extra_whitespace, 0);
    }

    #[test]
    fn test_absent_text_columns_are_skipped() {
        let table = TrialTable::from_rows(
            vec![NCT_NUMBER.into()],
            vec![vec![Some("NCT00000001".into())]],
        )
        .unwrap();
        let outcome = gate().run(table).unwrap();
        assert_eq!(outcome.stats.issues, QualityIssues::default());
    }

    #[test]
    fn test_verdict_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&QualityGateVerdict::Halt).unwrap(),
            "\"halt\""
        );
        assert_eq!(QualityGateVerdict::Continue.as_str(), "continue");
    }
}
