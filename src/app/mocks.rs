//! In-memory ports shared by the use case tests

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::app::ports::{ReportOutputPort, StudySourcePort, TableSinkPort, TableSourcePort};
use crate::pipeline::table::TrialTable;

pub struct MockStudySource {
    pub documents: Vec<Value>,
}

#[async_trait]
impl StudySourcePort for MockStudySource {
    async fn load_documents(&self) -> anyhow::Result<Vec<Value>> {
        Ok(self.documents.clone())
    }
}

/// Path-keyed table store; clones share the same storage
#[derive(Clone, Default)]
pub struct MockTables {
    pub tables: Arc<Mutex<HashMap<PathBuf, TrialTable>>>,
}

impl MockTables {
    pub async fn insert(&self, path: &Path, table: TrialTable) {
        self.tables.lock().await.insert(path.to_path_buf(), table);
    }

    pub async fn get(&self, path: &Path) -> Option<TrialTable> {
        self.tables.lock().await.get(path).cloned()
    }
}

#[async_trait]
impl TableSourcePort for MockTables {
    async fn read_table(&self, path: &Path) -> anyhow::Result<TrialTable> {
        self.get(path)
            .await
            .ok_or_else(|| anyhow::anyhow!("no table at {}", path.display()))
    }
}

#[async_trait]
impl TableSinkPort for MockTables {
    async fn write_table(&self, path: &Path, table: &TrialTable) -> anyhow::Result<()> {
        self.insert(path, table.clone()).await;
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MockReports {
    pub reports: Arc<Mutex<BTreeMap<String, Value>>>,
}

#[async_trait]
impl ReportOutputPort for MockReports {
    async fn write_report(&self, name: &str, report: &Value) -> anyhow::Result<String> {
        self.reports.lock().await.insert(name.to_string(), report.clone());
        Ok(format!("memory://{}", name))
    }
}

/// A registry study with the fields every stage looks at
pub fn study(id: &str, conditions: &str, sex: &str, country: &str) -> Value {
    json!({
        "protocolSection": {
            "identificationModule": {"nctId": id, "briefTitle": format!("Study {}", id)},
            "statusModule": {"overallStatus": "RECRUITING"},
            "descriptionModule": {"briefSummary": "An  interventional   study."},
            "conditionsModule": {"conditions": [conditions]},
            "armsInterventionsModule": {"interventions": [{"name": "Insulin glargine"}]},
            "sponsorCollaboratorsModule": {"leadSponsor": {"name": "NIDDK"}},
            "designModule": {
                "enrollmentInfo": {"count": 100},
                "phases": ["PHASE2"],
                "studyType": "INTERVENTIONAL"
            },
            "eligibilityModule": {"stdAges": ["CHILD", "ADULT"], "sex": sex},
            "contactsLocationsModule": {"locations": [{"facility": "Site", "country": country}]}
        }
    })
}

/// Twelve diabetes studies with valid identifiers, one repeated
pub fn diabetes_page() -> Value {
    let mut studies: Vec<Value> = (1..=12)
        .map(|i| {
            let conditions = if i % 2 == 0 { "Type 1 Diabetes" } else { "T2DM" };
            let country = if i % 3 == 0 { "Germany" } else { "United States" };
            study(&format!("NCT{:08}", i), conditions, "ALL", country)
        })
        .collect();
    studies.push(study("NCT00000001", "Type 2 Diabetes", "ALL", "Canada"));
    json!({ "studies": studies })
}
