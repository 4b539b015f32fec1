/// Column names of the flattened registry extract.
///
/// These match the headers of the registry's own CSV export so raw extracts
/// from either source line up.
pub const NCT_NUMBER: &str = "NCT Number";
pub const STUDY_TITLE: &str = "Study Title";
pub const RECRUITMENT_STATUS: &str = "Recruitment Status";
pub const BRIEF_SUMMARY: &str = "Brief Summary";
pub const CONDITIONS: &str = "Conditions";
pub const INTERVENTIONS: &str = "Interventions";
pub const SPONSOR: &str = "Sponsor";
pub const ENROLLMENT: &str = "Enrollment";
pub const AGE: &str = "Age";
pub const SEX: &str = "Sex";
pub const LOCATIONS: &str = "Locations";
pub const PHASES: &str = "Phases";
pub const STUDY_TYPE: &str = "Study Type";

// Derived columns added by enrichment
pub const DISEASE_TYPE: &str = "disease_type";
pub const CANCER_TYPE: &str = "cancer_type";
pub const DISEASE: &str = "disease";
pub const DATA_SOURCE: &str = "data_source";

/// Provenance tag written to the source column
pub const DATA_SOURCE_TAG: &str = "ClinicalTrials.gov";

/// Separator for multi-valued fields (conditions, ages, locations, ...)
pub const MULTI_VALUE_SEPARATOR: &str = "|";

/// Registry identifier format
pub const NCT_ID_PATTERN: &str = r"^NCT\d{8}$";

/// Classification label for rows with no conditions
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Bucket used for missing values in frequency tables
pub const MISSING_LABEL: &str = "MISSING";

/// Marker for the geographic split
pub const DOMESTIC_MARKER: &str = "United States";

// Pipeline names
pub const DIABETES_PIPELINE: &str = "diabetes";
pub const BREAST_CANCER_PIPELINE: &str = "breast_cancer";

// Report artifact names
pub const QUALITY_STATS_REPORT: &str = "quality_stats";
pub const STATS_REPORT: &str = "stats";
pub const ANOMALIES_REPORT: &str = "anomalies";
pub const BIAS_REPORT: &str = "bias_report";
pub const SUMMARY_REPORT: &str = "pipeline_summary";

/// Columns of a flattened trial record, in table order
pub fn record_columns() -> Vec<&'static str> {
    vec![
        NCT_NUMBER,
        STUDY_TITLE,
        RECRUITMENT_STATUS,
        BRIEF_SUMMARY,
        CONDITIONS,
        INTERVENTIONS,
        SPONSOR,
        ENROLLMENT,
        AGE,
        SEX,
        LOCATIONS,
        PHASES,
        STUDY_TYPE,
    ]
}
