use crate::config::{ClassifierKind, PipelineConfig};
use crate::constants::UNKNOWN_LABEL;
use crate::error::Result;
use crate::pipeline::table::TrialTable;

/// Maps a free-text conditions field to a label. Total: every input,
/// including an absent one, yields a label.
pub trait ConditionClassifier: Send + Sync {
    fn classify(&self, conditions: Option<&str>) -> String;
}

/// How a marker is looked for in the lower-cased conditions text
#[derive(Debug, Clone, Copy)]
enum Marker {
    /// Anywhere in the text
    Phrase(&'static str),
    /// As a whole alphanumeric token, so `niddm` never matches `iddm`
    Word(&'static str),
}

use Marker::{Phrase, Word};

/// Ordered rules; first match wins
const DIABETES_RULES: &[(&str, &[Marker])] = &[
    (
        "Type 1 Diabetes",
        &[
            Phrase("type 1"),
            Phrase("juvenile"),
            Word("t1d"),
            Word("t1dm"),
            Word("iddm"),
            Word("lada"),
        ],
    ),
    (
        "Type 2 Diabetes",
        &[
            Phrase("type 2"),
            Phrase("non-insulin dependent"),
            Word("t2d"),
            Word("t2dm"),
            Word("niddm"),
        ],
    ),
    ("Gestational Diabetes", &[Phrase("gestational"), Word("gdm")]),
    (
        "Pre-Diabetes",
        &[
            Phrase("prediabetes"),
            Phrase("pre-diabetes"),
            Phrase("impaired glucose"),
        ],
    ),
    ("Diabetes Insipidus", &[Phrase("insipidus")]),
    (
        "Rare Diabetes",
        &[Phrase("neonatal"), Phrase("monogenic"), Word("mody")],
    ),
];

pub const DIABETES_FALLBACK: &str = "Diabetes (General)";
pub const BREAST_CANCER_FALLBACK: &str = "breast_cancer";

/// Diabetes subtype from the conditions text
#[derive(Debug, Default, Clone, Copy)]
pub struct DiabetesClassifier;

impl ConditionClassifier for DiabetesClassifier {
    fn classify(&self, conditions: Option<&str>) -> String {
        let Some(text) = conditions else {
            return UNKNOWN_LABEL.to_string();
        };
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let matches = |marker: &Marker| match marker {
            Phrase(p) => lower.contains(p),
            Word(w) => words.contains(w),
        };

        DIABETES_RULES
            .iter()
            .find(|(_, markers)| markers.iter().any(|m| matches(m)))
            .map(|(label, _)| label.to_string())
            .unwrap_or_else(|| DIABETES_FALLBACK.to_string())
    }
}

/// Breast-cancer subtype slug from the first `|`-separated condition naming
/// both "breast" and "cancer"
#[derive(Debug, Default, Clone, Copy)]
pub struct BreastCancerClassifier;

impl ConditionClassifier for BreastCancerClassifier {
    fn classify(&self, conditions: Option<&str>) -> String {
        let Some(text) = conditions else {
            return UNKNOWN_LABEL.to_string();
        };
        text.split('|')
            .find(|condition| {
                let lower = condition.to_lowercase();
                lower.contains("breast") && lower.contains("cancer")
            })
            .map(slugify)
            .unwrap_or_else(|| BREAST_CANCER_FALLBACK.to_string())
    }
}

/// Lower-case, spaces to `_`, keep alphanumerics and `_`, collapse and trim `_`
pub fn slugify(text: &str) -> String {
    let kept: String = text
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();

    let mut slug = String::with_capacity(kept.len());
    for c in kept.chars() {
        if c == '_' && slug.ends_with('_') {
            continue;
        }
        slug.push(c);
    }
    slug.trim_matches('_').to_string()
}

pub fn classifier_for(kind: ClassifierKind) -> Box<dyn ConditionClassifier> {
    match kind {
        ClassifierKind::Diabetes => Box::new(DiabetesClassifier),
        ClassifierKind::BreastCancer => Box::new(BreastCancerClassifier),
    }
}

/// Add the classification, source tag and optional label columns.
///
/// Columns already present are overwritten in place, so enriching twice
/// leaves the column set unchanged. A table without the conditions column
/// classifies every row as absent input.
pub fn enrich(
    mut table: TrialTable,
    classifier: &dyn ConditionClassifier,
    config: &PipelineConfig,
) -> Result<TrialTable> {
    let rows = table.len();
    let labels: Vec<Option<String>> = match table.column(&config.conditions_column) {
        Some(values) => values.map(|v| Some(classifier.classify(v))).collect(),
        None => vec![Some(classifier.classify(None)); rows],
    };

    let enrichment = &config.enrichment;
    table.set_column(&enrichment.classification_column, labels)?;
    table.set_column(
        &enrichment.source_column,
        vec![Some(enrichment.source_tag.clone()); rows],
    )?;
    if let Some(label) = &enrichment.label_column {
        table.set_column(&label.column, vec![Some(label.value.clone()); rows])?;
    }
    Ok(table)
}
