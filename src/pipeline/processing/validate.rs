use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::pipeline::table::TrialTable;

/// Categories of validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    MissingColumns,
    EmptyTable,
    TooFewRows,
    InvalidIdentifiers,
    MissingDerivedValues,
    UnknownClassification,
    CriticalColumnMissing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub message: String,
}

/// Everything the validator found. Only `errors` fail the table; `notices`
/// are tolerated drift the caller should log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub notices: Vec<String>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has(&self, kind: ValidationErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    fn error(&mut self, kind: ValidationErrorKind, message: String) {
        self.errors.push(ValidationError { kind, message });
    }
}

/// Run every structural and format check, accumulating all findings
pub fn validate(table: &TrialTable, config: &PipelineConfig) -> Result<ValidationReport> {
    let rules = &config.validation;
    let mut report = ValidationReport::default();
    let rows = table.len();

    if rows == 0 {
        report.error(
            ValidationErrorKind::EmptyTable,
            "table is empty, no trials loaded".to_string(),
        );
    } else if rows < rules.min_rows {
        report.error(
            ValidationErrorKind::TooFewRows,
            format!("suspiciously few trials: only {} rows", rows),
        );
    }

    let missing: Vec<&str> = rules
        .required_columns
        .iter()
        .filter(|c| !table.has_column(c))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        report.error(
            ValidationErrorKind::MissingColumns,
            format!("missing required columns: {}", missing.join(", ")),
        );
    }

    // Fraction checks are meaningless without rows
    if rows == 0 {
        return Ok(report);
    }

    check_identifiers(table, config, &mut report)?;
    check_derived_columns(table, config, &mut report);

    for column in &rules.critical_columns {
        if let Some(fraction) = table.missing_fraction(column) {
            if fraction > rules.max_critical_missing_fraction {
                report.error(
                    ValidationErrorKind::CriticalColumnMissing,
                    format!("{} is {:.1}% missing", column, fraction * 100.0),
                );
            }
        }
    }

    Ok(report)
}

fn check_identifiers(
    table: &TrialTable,
    config: &PipelineConfig,
    report: &mut ValidationReport,
) -> Result<()> {
    let Some(ids) = table.column(&config.id_column) else {
        return Ok(());
    };
    let pattern = Regex::new(&config.id_pattern).map_err(|e| {
        PipelineError::Config(format!("invalid id_pattern '{}': {}", config.id_pattern, e))
    })?;

    let invalid = ids
        .filter(|id| !id.map(|v| pattern.is_match(v)).unwrap_or(false))
        .count();
    if invalid == 0 {
        return Ok(());
    }

    let fraction = invalid as f64 / table.len() as f64;
    if fraction > config.validation.max_invalid_id_fraction {
        report.error(
            ValidationErrorKind::InvalidIdentifiers,
            format!(
                "{} ({:.1}%) rows have an invalid {}",
                invalid,
                fraction * 100.0,
                config.id_column
            ),
        );
    } else {
        report.notices.push(format!(
            "{} rows have a non-standard {} (tolerated)",
            invalid, config.id_column
        ));
    }
    Ok(())
}

fn check_derived_columns(table: &TrialTable, config: &PipelineConfig, report: &mut ValidationReport) {
    let rules = &config.validation;
    let classification = &config.enrichment.classification_column;

    if let Some(values) = table.column(classification) {
        let (mut nulls, mut unknown) = (0usize, 0usize);
        for value in values {
            match value {
                None => nulls += 1,
                Some(v) if v == rules.unknown_label => unknown += 1,
                Some(_) => {}
            }
        }
        if nulls > 0 {
            report.error(
                ValidationErrorKind::MissingDerivedValues,
                format!("{} has {} missing values", classification, nulls),
            );
        }
        let fraction = unknown as f64 / table.len() as f64;
        if fraction > rules.max_unknown_fraction {
            report.error(
                ValidationErrorKind::UnknownClassification,
                format!(
                    "{} is '{}' for {} ({:.1}%) trials, classification may be broken",
                    classification,
                    rules.unknown_label,
                    unknown,
                    fraction * 100.0
                ),
            );
        }
    }

    let source = &config.enrichment.source_column;
    if let Some(nulls) = table.missing_count(source) {
        if nulls > 0 {
            report.error(
                ValidationErrorKind::MissingDerivedValues,
                format!("{} has {} missing values", source, nulls),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;

    fn enriched(rows: usize, id: impl Fn(usize) -> Option<String>) -> TrialTable {
        let columns: Vec<String> = PipelineConfig::diabetes()
            .validation
            .required_columns
            .clone();
        let mut table = TrialTable::new(columns.clone());
        for i in 0..rows {
            let row = columns
                .iter()
                .map(|c| match c.as_str() {
                    NCT_NUMBER => id(i),
                    DISEASE_TYPE => Some("Type 2 Diabetes".to_string()),
                    DATA_SOURCE => Some(DATA_SOURCE_TAG.to_string()),
                    _ => Some(format!("{} {}", c, i)),
                })
                .collect();
            table.push_row(row).unwrap();
        }
        table
    }

    fn good_id(i: usize) -> Option<String> {
        Some(format!("NCT{:08}", i))
    }

    #[test]
    fn test_clean_table_passes() {
        let report = validate(&enriched(20, good_id), &PipelineConfig::diabetes()).unwrap();
        assert!(report.passed(), "{:?}", report.errors);
        assert!(report.notices.is_empty());
    }

    #[test]
    fn test_empty_table_fails() {
        let report = validate(&enriched(0, good_id), &PipelineConfig::diabetes()).unwrap();
        assert!(report.has(ValidationErrorKind::EmptyTable));
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn test_too_few_rows_fails() {
        let report = validate(&enriched(9, good_id), &PipelineConfig::diabetes()).unwrap();
        assert!(report.has(ValidationErrorKind::TooFewRows));
    }

    #[test]
    fn test_missing_columns_reported_once() {
        let table = TrialTable::new([NCT_NUMBER]);
        let report = validate(&table, &PipelineConfig::diabetes()).unwrap();
        let missing: Vec<_> = report
            .errors
            .iter()
            .filter(|e| e.kind == ValidationErrorKind::MissingColumns)
            .collect();
        assert_eq!(missing.len(), 1);
        assert!(missing[0].message.contains(STUDY_TITLE));
    }

    #[test]
    fn test_few_bad_identifiers_are_a_notice() {
        let table = enriched(20, |i| if i == 0 { Some("BAD".into()) } else { good_id(i) });
        let report = validate(&table, &PipelineConfig::diabetes()).unwrap();
        assert!(report.passed());
        assert_eq!(report.notices.len(), 1);
    }

    #[test]
    fn test_many_bad_identifiers_fail() {
        let table = enriched(20, |i| if i < 3 { None } else { good_id(i) });
        let report = validate(&table, &PipelineConfig::diabetes()).unwrap();
        assert!(report.has(ValidationErrorKind::InvalidIdentifiers));
    }

    #[test]
    fn test_unknown_classification_majority_fails() {
        let mut table = enriched(20, good_id);
        let mut n = 0;
        table
            .map_column(DISEASE_TYPE, |v| {
                n += 1;
                if n <= 11 {
                    Some(UNKNOWN_LABEL.to_string())
                } else {
                    v.map(str::to_string)
                }
            })
            .unwrap();
        let report = validate(&table, &PipelineConfig::diabetes()).unwrap();
        assert!(report.has(ValidationErrorKind::UnknownClassification));
    }

    #[test]
    fn test_critical_column_mostly_missing_fails() {
        let mut table = enriched(20, good_id);
        let mut n = 0;
        table
            .map_column(STUDY_TITLE, |v| {
                n += 1;
                if n <= 17 {
                    None
                } else {
                    v.map(str::to_string)
                }
            })
            .unwrap();
        let report = validate(&table, &PipelineConfig::diabetes()).unwrap();
        assert!(report.has(ValidationErrorKind::CriticalColumnMissing));
    }

    #[test]
    fn test_all_checks_accumulate() {
        let mut table = enriched(5, |_| Some("BAD".into()));
        table.map_column(DATA_SOURCE, |_| None).unwrap();
        let report = validate(&table, &PipelineConfig::diabetes()).unwrap();
        assert!(report.has(ValidationErrorKind::TooFewRows));
        assert!(report.has(ValidationErrorKind::InvalidIdentifiers));
        assert!(report.has(ValidationErrorKind::MissingDerivedValues));
    }
}
