use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::pipeline::processing::bias::{geography_split, GeographySplit};
use crate::pipeline::processing::{numeric_values, round2};
use crate::pipeline::table::TrialTable;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedValue {
    pub value: String,
    pub count: usize,
}

/// Descriptive aggregation of a cleaned table. Sections whose column is
/// absent are left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub total_trials: usize,
    pub total_columns: usize,
    pub columns: Vec<String>,
    pub distributions: BTreeMap<String, BTreeMap<String, usize>>,
    /// Ranked by count descending, then value ascending
    pub top_values: BTreeMap<String, Vec<RankedValue>>,
    pub numeric: BTreeMap<String, NumericSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geography: Option<GeographySplit>,
    /// Columns with at least one missing cell
    pub missing_values: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_ids: Option<usize>,
}

fn counts(table: &TrialTable, column: &str) -> Option<BTreeMap<String, usize>> {
    let mut counts = BTreeMap::new();
    for value in table.column(column)?.flatten() {
        *counts.entry(value.to_string()).or_default() += 1;
    }
    Some(counts)
}

fn top_n(table: &TrialTable, column: &str, limit: usize) -> Option<Vec<RankedValue>> {
    let mut ranked: Vec<RankedValue> = counts(table, column)?
        .into_iter()
        .map(|(value, count)| RankedValue { value, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    ranked.truncate(limit);
    Some(ranked)
}

fn numeric_summary(table: &TrialTable, column: &str) -> Option<NumericSummary> {
    let mut values = numeric_values(table, column)?;
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);

    let count = values.len();
    let total: f64 = values.iter().sum();
    let median = if count % 2 == 1 {
        values[count / 2]
    } else {
        (values[count / 2 - 1] + values[count / 2]) / 2.0
    };
    Some(NumericSummary {
        count,
        mean: round2(total / count as f64),
        median: round2(median),
        min: values[0],
        max: values[count - 1],
        total,
    })
}

pub fn summarize(table: &TrialTable, config: &PipelineConfig) -> StatsSummary {
    let stats = &config.stats;

    let distributions = stats
        .distributions
        .iter()
        .filter_map(|d| Some((d.key.clone(), counts(table, &d.column)?)))
        .collect();
    let top_values = stats
        .top_values
        .iter()
        .filter_map(|t| Some((t.key.clone(), top_n(table, &t.column, t.limit)?)))
        .collect();
    let numeric = stats
        .numeric_columns
        .iter()
        .filter_map(|n| Some((n.key.clone(), numeric_summary(table, &n.column)?)))
        .collect();
    let geography = stats
        .location_column
        .as_deref()
        .and_then(|c| geography_split(table, c));

    let missing_values = table
        .columns()
        .iter()
        .filter_map(|c| {
            let missing = table.missing_count(c)?;
            (missing > 0).then(|| (c.clone(), missing))
        })
        .collect();

    let unique_ids = table
        .column(&config.id_column)
        .map(|ids| ids.flatten().collect::<HashSet<_>>().len());

    StatsSummary {
        total_trials: table.len(),
        total_columns: table.column_count(),
        columns: table.columns().to_vec(),
        distributions,
        top_values,
        numeric,
        geography,
        missing_values,
        unique_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;

    fn cell(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    fn sample() -> TrialTable {
        TrialTable::from_rows(
            vec![
                NCT_NUMBER.into(),
                RECRUITMENT_STATUS.into(),
                SPONSOR.into(),
                ENROLLMENT.into(),
                LOCATIONS.into(),
            ],
            vec![
                vec![cell("NCT00000001"), cell("RECRUITING"), cell("NIH"), cell("100"), cell("Boston, United States")],
                vec![cell("NCT00000002"), cell("RECRUITING"), cell("Mayo"), cell("50"), cell("Paris, France")],
                vec![cell("NCT00000003"), cell("COMPLETED"), cell("NIH"), cell("unknown"), None],
                vec![cell("NCT00000004"), cell("RECRUITING"), cell("Aardvark"), cell("25"), cell("Austin, United States")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_summarize_counts_and_sections() {
        let summary = summarize(&sample(), &PipelineConfig::diabetes());

        assert_eq!(summary.total_trials, 4);
        assert_eq!(summary.total_columns, 5);
        assert_eq!(summary.distributions["recruitment_status"]["RECRUITING"], 3);
        assert!(!summary.distributions.contains_key("sex_distribution"));
        assert!(!summary.top_values.contains_key("age_distribution"));
        assert_eq!(summary.unique_ids, Some(4));
        assert_eq!(summary.missing_values.get(LOCATIONS), Some(&1));
        assert!(!summary.missing_values.contains_key(SPONSOR));
    }

    #[test]
    fn test_numeric_summary_excludes_non_numeric() {
        let summary = summarize(&sample(), &PipelineConfig::diabetes());
        let enrollment = &summary.numeric["enrollment"];

        assert_eq!(enrollment.count, 3);
        assert_eq!(enrollment.mean, 58.33);
        assert_eq!(enrollment.median, 50.0);
        assert_eq!(enrollment.min, 25.0);
        assert_eq!(enrollment.max, 100.0);
        assert_eq!(enrollment.total, 175.0);
    }

    #[test]
    fn test_top_values_rank_by_count_then_value() {
        let summary = summarize(&sample(), &PipelineConfig::diabetes());
        let sponsors: Vec<_> = summary.top_values["top_sponsors"]
            .iter()
            .map(|r| (r.value.as_str(), r.count))
            .collect();
        assert_eq!(sponsors, vec![("NIH", 2), ("Aardvark", 1), ("Mayo", 1)]);
    }

    #[test]
    fn test_geography_split() {
        let summary = summarize(&sample(), &PipelineConfig::diabetes());
        let geo = summary.geography.unwrap();
        assert_eq!(geo.us_trials, 2);
        assert_eq!(geo.international_trials, 2);
        assert_eq!(geo.us_percentage, 50.0);
    }

    #[test]
    fn test_empty_table_omits_numeric() {
        let summary = summarize(&TrialTable::new([ENROLLMENT]), &PipelineConfig::diabetes());
        assert_eq!(summary.total_trials, 0);
        assert!(summary.numeric.is_empty());
        assert!(summary.unique_ids.is_none());
    }
}
