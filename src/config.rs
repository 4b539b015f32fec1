use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::error::{PipelineError, Result};

/// Which condition classifier enrichment runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    Diabetes,
    BreastCancer,
}

/// Configuration for one disease pipeline.
///
/// Every threshold and column list the stages use lives here, so the
/// diabetes and breast-cancer pipelines run the same code with different
/// data. Missing TOML fields fall back to the diabetes preset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Condition name; also names the data directory and log directory
    pub name: String,
    /// Identity key of a trial row
    pub id_column: String,
    /// Regex every identifier is expected to match
    pub id_pattern: String,
    /// Free-text column the classifier reads
    pub conditions_column: String,
    pub enrichment: EnrichmentConfig,
    pub validation: ValidationConfig,
    pub quality: QualityConfig,
    pub anomaly: AnomalyConfig,
    pub bias: BiasPolicyConfig,
    pub stats: StatsConfig,
}

/// Derived columns added during enrichment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub classifier: ClassifierKind,
    /// Column receiving the classifier's label
    pub classification_column: String,
    /// Column receiving the provenance tag
    pub source_column: String,
    pub source_tag: String,
    /// Optional constant label column (e.g. `disease = breast_cancer`)
    pub label_column: Option<LabelColumn>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelColumn {
    pub column: String,
    pub value: String,
}

/// Structural and format checks run before the quality gate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub required_columns: Vec<String>,
    /// Tables with fewer rows fail as suspiciously small
    pub min_rows: usize,
    /// Invalid identifiers above this fraction fail validation
    pub max_invalid_id_fraction: f64,
    /// Unknown classifications above this fraction fail validation
    pub max_unknown_fraction: f64,
    pub unknown_label: String,
    pub critical_columns: Vec<String>,
    /// Critical columns missing above this fraction fail validation
    pub max_critical_missing_fraction: f64,
}

/// Text cleaning and the continue/halt decision
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Columns normalized and counted for text issues
    pub text_columns: Vec<String>,
    /// Null count over total rows above this fraction halts the pipeline
    pub halt_null_fraction: f64,
}

/// Anomaly scan thresholds and per-check switches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub required_columns: Vec<String>,
    /// Columns missing at or above this fraction are reported
    pub high_missing_threshold: f64,
    pub numeric_columns: Vec<String>,
    /// IQR fence multiplier
    pub iqr_multiplier: f64,
    pub max_outlier_examples: usize,
    pub check_outliers: bool,
    pub check_duplicates: bool,
    pub check_id_format: bool,
}

/// Bias scoring policy, selected with `policy = "rules" | "slices"`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum BiasPolicyConfig {
    Rules(RuleBiasConfig),
    Slices(SliceBiasConfig),
}

/// Fixed domain checks producing warnings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleBiasConfig {
    pub age_column: String,
    pub sex_column: String,
    pub classification_column: String,
    pub location_column: String,
    /// Named age brackets matched by case-insensitive substring
    pub age_slices: Vec<AgeSlice>,
    /// Age bracket checked against `pediatric_min_fraction`
    pub pediatric_slice: String,
    pub pediatric_min_fraction: f64,
    pub sex_ratio_min: f64,
    pub sex_ratio_max: f64,
    /// Share of trials mentioning the domestic marker above which a warning fires
    pub max_domestic_fraction: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgeSlice {
    pub name: String,
    pub patterns: Vec<String>,
}

/// Generic representation/missingness slicing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SliceBiasConfig {
    pub slice_columns: Vec<String>,
    /// Columns whose per-slice missingness is reported
    pub missingness_columns: Vec<String>,
}

/// Descriptive aggregation for dashboards
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Full value-count breakdowns
    pub distributions: Vec<ColumnKey>,
    /// Ranked top-N tables for high-cardinality columns
    pub top_values: Vec<TopValues>,
    pub numeric_columns: Vec<ColumnKey>,
    pub location_column: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnKey {
    /// Key used in the stats report
    pub key: String,
    pub column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopValues {
    pub key: String,
    pub column: String,
    pub limit: usize,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn column_key(key: &str, column: &str) -> ColumnKey {
    ColumnKey {
        key: key.to_string(),
        column: column.to_string(),
    }
}

impl PipelineConfig {
    /// Diabetes pipeline: rule-based bias scoring, all anomaly checks on
    pub fn diabetes() -> Self {
        Self {
            name: DIABETES_PIPELINE.to_string(),
            id_column: NCT_NUMBER.to_string(),
            id_pattern: NCT_ID_PATTERN.to_string(),
            conditions_column: CONDITIONS.to_string(),
            enrichment: EnrichmentConfig::default(),
            validation: ValidationConfig::default(),
            quality: QualityConfig::default(),
            anomaly: AnomalyConfig::default(),
            bias: BiasPolicyConfig::Rules(RuleBiasConfig::default()),
            stats: StatsConfig::default(),
        }
    }

    /// Breast-cancer pipeline: subtype slugs, generic slicing, 70% missingness cutoff
    pub fn breast_cancer() -> Self {
        let mut required = strings(&[
            NCT_NUMBER,
            STUDY_TITLE,
            RECRUITMENT_STATUS,
            CONDITIONS,
            SEX,
        ]);
        required.extend(strings(&[CANCER_TYPE, DATA_SOURCE]));

        Self {
            name: BREAST_CANCER_PIPELINE.to_string(),
            enrichment: EnrichmentConfig {
                classifier: ClassifierKind::BreastCancer,
                classification_column: CANCER_TYPE.to_string(),
                source_column: DATA_SOURCE.to_string(),
                source_tag: DATA_SOURCE_TAG.to_string(),
                label_column: Some(LabelColumn {
                    column: DISEASE.to_string(),
                    value: BREAST_CANCER_PIPELINE.to_string(),
                }),
            },
            validation: ValidationConfig {
                required_columns: required,
                ..ValidationConfig::default()
            },
            anomaly: AnomalyConfig {
                high_missing_threshold: 0.70,
                check_outliers: false,
                check_id_format: false,
                ..AnomalyConfig::default()
            },
            bias: BiasPolicyConfig::Slices(SliceBiasConfig::default()),
            stats: StatsConfig {
                distributions: vec![
                    column_key("recruitment_status", RECRUITMENT_STATUS),
                    column_key("cancer_type_distribution", CANCER_TYPE),
                    column_key("sex_distribution", SEX),
                    column_key("phase_distribution", PHASES),
                ],
                ..StatsConfig::default()
            },
            ..Self::diabetes()
        }
    }

    /// Load a TOML config; absent fields take the diabetes defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.check()?;
        Ok(config)
    }

    /// Reject thresholds outside [0, 1] and identifier patterns that do not compile
    pub fn check(&self) -> Result<()> {
        Regex::new(&self.id_pattern).map_err(|e| {
            PipelineError::Config(format!("Invalid id_pattern '{}': {}", self.id_pattern, e))
        })?;

        let mut fractions = vec![
            ("validation.max_invalid_id_fraction", self.validation.max_invalid_id_fraction),
            ("validation.max_unknown_fraction", self.validation.max_unknown_fraction),
            (
                "validation.max_critical_missing_fraction",
                self.validation.max_critical_missing_fraction,
            ),
            ("quality.halt_null_fraction", self.quality.halt_null_fraction),
            ("anomaly.high_missing_threshold", self.anomaly.high_missing_threshold),
        ];
        if let BiasPolicyConfig::Rules(rules) = &self.bias {
            fractions.push(("bias.pediatric_min_fraction", rules.pediatric_min_fraction));
            fractions.push(("bias.max_domestic_fraction", rules.max_domestic_fraction));
            if rules.sex_ratio_min > rules.sex_ratio_max {
                return Err(PipelineError::Config(format!(
                    "bias.sex_ratio_min ({}) exceeds bias.sex_ratio_max ({})",
                    rules.sex_ratio_min, rules.sex_ratio_max
                )));
            }
        }

        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(PipelineError::Config(format!(
                    "{} must be between 0 and 1, got {}",
                    name, value
                )));
            }
        }

        if self.anomaly.iqr_multiplier < 0.0 {
            return Err(PipelineError::Config(
                "anomaly.iqr_multiplier must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::diabetes()
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierKind::Diabetes,
            classification_column: DISEASE_TYPE.to_string(),
            source_column: DATA_SOURCE.to_string(),
            source_tag: DATA_SOURCE_TAG.to_string(),
            label_column: None,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            required_columns: strings(&[
                NCT_NUMBER,
                STUDY_TITLE,
                RECRUITMENT_STATUS,
                CONDITIONS,
                BRIEF_SUMMARY,
                INTERVENTIONS,
                SPONSOR,
                ENROLLMENT,
                AGE,
                SEX,
                LOCATIONS,
                DISEASE_TYPE,
                DATA_SOURCE,
            ]),
            min_rows: 10,
            max_invalid_id_fraction: 0.10,
            max_unknown_fraction: 0.50,
            unknown_label: UNKNOWN_LABEL.to_string(),
            critical_columns: strings(&[NCT_NUMBER, STUDY_TITLE, CONDITIONS]),
            max_critical_missing_fraction: 0.80,
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            text_columns: strings(&[
                STUDY_TITLE,
                CONDITIONS,
                BRIEF_SUMMARY,
                INTERVENTIONS,
                SPONSOR,
                LOCATIONS,
            ]),
            halt_null_fraction: 0.80,
        }
    }
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            required_columns: strings(&[NCT_NUMBER]),
            high_missing_threshold: 0.50,
            numeric_columns: strings(&[ENROLLMENT]),
            iqr_multiplier: 1.5,
            max_outlier_examples: 5,
            check_outliers: true,
            check_duplicates: true,
            check_id_format: true,
        }
    }
}

impl Default for BiasPolicyConfig {
    fn default() -> Self {
        BiasPolicyConfig::Rules(RuleBiasConfig::default())
    }
}

impl Default for RuleBiasConfig {
    fn default() -> Self {
        let slice = |name: &str, patterns: &[&str]| AgeSlice {
            name: name.to_string(),
            patterns: strings(patterns),
        };
        Self {
            age_column: AGE.to_string(),
            sex_column: SEX.to_string(),
            classification_column: DISEASE_TYPE.to_string(),
            location_column: LOCATIONS.to_string(),
            age_slices: vec![
                slice("pediatric", &["Child", "Pediatric"]),
                slice("adult", &["Adult", "18"]),
                slice("elderly", &["65", "Elder", "Senior", "Older"]),
                slice("all_ages", &["All"]),
            ],
            pediatric_slice: "pediatric".to_string(),
            pediatric_min_fraction: 0.05,
            sex_ratio_min: 0.5,
            sex_ratio_max: 2.0,
            max_domestic_fraction: 0.80,
        }
    }
}

impl Default for SliceBiasConfig {
    fn default() -> Self {
        Self {
            slice_columns: strings(&[SEX, PHASES, STUDY_TYPE, RECRUITMENT_STATUS]),
            missingness_columns: strings(&[
                NCT_NUMBER,
                CONDITIONS,
                STUDY_TITLE,
                RECRUITMENT_STATUS,
                PHASES,
                SEX,
                AGE,
                ENROLLMENT,
                STUDY_TYPE,
            ]),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            distributions: vec![
                column_key("recruitment_status", RECRUITMENT_STATUS),
                column_key("disease_type_distribution", DISEASE_TYPE),
                column_key("sex_distribution", SEX),
            ],
            top_values: vec![
                TopValues {
                    key: "age_distribution".to_string(),
                    column: AGE.to_string(),
                    limit: 10,
                },
                TopValues {
                    key: "top_sponsors".to_string(),
                    column: SPONSOR.to_string(),
                    limit: 10,
                },
            ],
            numeric_columns: vec![column_key("enrollment", ENROLLMENT)],
            location_column: Some(LOCATIONS.to_string()),
        }
    }
}

/// File layout of one pipeline under the data directory
#[derive(Debug, Clone, PartialEq)]
pub struct PipelinePaths {
    pub raw_file: PathBuf,
    pub enriched_file: PathBuf,
    pub reports_dir: PathBuf,
}

impl PipelinePaths {
    /// `<data>/<name>/raw/<name>_trials_raw.csv`,
    /// `<data>/<name>/processed/<name>_trials_enriched.csv`,
    /// `<data>/<name>/reports/`
    pub fn new(data_dir: &Path, name: &str) -> Self {
        let base = data_dir.join(name);
        Self {
            raw_file: base.join("raw").join(format!("{}_trials_raw.csv", name)),
            enriched_file: base
                .join("processed")
                .join(format!("{}_trials_enriched.csv", name)),
            reports_dir: base.join("reports"),
        }
    }

    pub fn report(&self, report_name: &str) -> PathBuf {
        self.reports_dir.join(format!("{}.json", report_name))
    }
}
