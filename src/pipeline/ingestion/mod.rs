// Pipeline ingestion: flattening registry study documents into trial rows

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{record_columns, MULTI_VALUE_SEPARATOR};
use crate::error::Result;
use crate::pipeline::table::{Cell, TrialTable};

/// Locations kept per study
pub const MAX_LOCATIONS: usize = 3;

/// One flattened study. Multi-valued fields are joined with `|`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub nct_number: String,
    pub study_title: Option<String>,
    pub recruitment_status: Option<String>,
    pub brief_summary: Option<String>,
    pub conditions: Option<String>,
    pub interventions: Option<String>,
    pub sponsor: Option<String>,
    pub enrollment: Option<String>,
    pub age: Option<String>,
    pub sex: Option<String>,
    pub locations: Option<String>,
    pub phases: Option<String>,
    pub study_type: Option<String>,
}

impl TrialRecord {
    /// Cells in [`record_columns`] order
    pub fn into_row(self) -> Vec<Cell> {
        vec![
            Some(self.nct_number),
            self.study_title,
            self.recruitment_status,
            self.brief_summary,
            self.conditions,
            self.interventions,
            self.sponsor,
            self.enrollment,
            self.age,
            self.sex,
            self.locations,
            self.phases,
            self.study_type,
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlattenOutcome {
    pub records: Vec<TrialRecord>,
    /// Studies whose identifier was already seen
    pub duplicates_skipped: usize,
    /// Studies without a usable identifier
    pub missing_id_skipped: usize,
}

impl FlattenOutcome {
    pub fn into_table(self) -> Result<TrialTable> {
        TrialTable::from_rows(
            record_columns().into_iter().map(String::from).collect(),
            self.records.into_iter().map(TrialRecord::into_row).collect(),
        )
    }
}

/// Flatten study documents into trial records.
///
/// Each document may be a page (`{"studies": [...]}`), an array of pages, a
/// bare array of studies or a single study. Fields with an unexpected shape
/// are treated as missing; nothing here fails.
pub fn flatten_studies(documents: &[Value]) -> FlattenOutcome {
    let mut studies = Vec::new();
    for document in documents {
        collect_studies(document, &mut studies);
    }

    let mut outcome = FlattenOutcome::default();
    let mut seen = HashSet::new();
    for study in studies {
        let Some(record) = flatten_study(study) else {
            outcome.missing_id_skipped += 1;
            continue;
        };
        if !seen.insert(record.nct_number.clone()) {
            outcome.duplicates_skipped += 1;
            continue;
        }
        outcome.records.push(record);
    }
    outcome
}

fn collect_studies<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_studies(item, out);
            }
        }
        Value::Object(map) => {
            if let Some(studies) = map.get("studies") {
                collect_studies(studies, out);
            } else if map.contains_key("protocolSection") {
                out.push(value);
            }
        }
        _ => {}
    }
}

/// Flatten one study; `None` when it has no identifier
pub fn flatten_study(study: &Value) -> Option<TrialRecord> {
    let proto = study.get("protocolSection")?;
    let module = |name: &str| proto.get(name).filter(|m| m.is_object());

    let ident = module("identificationModule");
    let nct_number = text(ident, &["nctId"])?;

    let design = module("designModule");
    let eligibility = module("eligibilityModule");

    Some(TrialRecord {
        nct_number,
        study_title: text(ident, &["briefTitle"]),
        recruitment_status: text(module("statusModule"), &["overallStatus"]),
        brief_summary: text(module("descriptionModule"), &["briefSummary"]),
        conditions: joined(
            module("conditionsModule").and_then(|m| m.get("conditions")),
            |v| v.as_str(),
        ),
        interventions: joined(
            module("armsInterventionsModule").and_then(|m| m.get("interventions")),
            |v| v.get("name").and_then(Value::as_str),
        ),
        sponsor: text(
            module("sponsorCollaboratorsModule"),
            &["leadSponsor", "name"],
        ),
        enrollment: design
            .and_then(|d| d.get("enrollmentInfo"))
            .and_then(|e| e.get("count"))
            .and_then(number_text),
        age: joined(eligibility.and_then(|e| e.get("stdAges")), |v| v.as_str()),
        sex: text(eligibility, &["sex"]),
        locations: locations(module("contactsLocationsModule").and_then(|c| c.get("locations"))),
        phases: joined(design.and_then(|d| d.get("phases")), |v| v.as_str()),
        study_type: text(design, &["studyType"]),
    })
}

/// Trimmed non-empty string at `path` below `root`
fn text(root: Option<&Value>, path: &[&str]) -> Option<String> {
    let mut current = root?;
    for key in path {
        current = current.get(key)?;
    }
    non_empty(current.as_str()?)
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Join the usable items of an array with the multi-value separator
fn joined<'a, F>(array: Option<&'a Value>, item: F) -> Option<String>
where
    F: Fn(&'a Value) -> Option<&'a str>,
{
    let parts: Vec<&str> = array?
        .as_array()?
        .iter()
        .filter_map(item)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(MULTI_VALUE_SEPARATOR))
}

fn number_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => match n.as_u64() {
            Some(whole) => Some(whole.to_string()),
            None => Some(n.to_string()),
        },
        Value::String(s) => non_empty(s),
        _ => None,
    }
}

/// First few locations rendered as `facility, country`
fn locations(array: Option<&Value>) -> Option<String> {
    let rendered: Vec<String> = array?
        .as_array()?
        .iter()
        .take(MAX_LOCATIONS)
        .filter_map(|location| match location {
            Value::String(s) => non_empty(s),
            Value::Object(_) => {
                let facility = match location.get("facility") {
                    Some(Value::String(s)) => non_empty(s),
                    Some(f @ Value::Object(_)) => text(Some(f), &["name"]),
                    _ => None,
                };
                let country = text(Some(location), &["country"]);
                let parts: Vec<String> = [facility, country].into_iter().flatten().collect();
                (!parts.is_empty()).then(|| parts.join(", "))
            }
            _ => None,
        })
        .collect();
    (!rendered.is_empty()).then(|| rendered.join(MULTI_VALUE_SEPARATOR))
}
