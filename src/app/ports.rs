use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use crate::pipeline::table::TrialTable;

/// Raw registry study documents, already fetched
#[async_trait]
pub trait StudySourcePort: Send + Sync {
    async fn load_documents(&self) -> anyhow::Result<Vec<Value>>;
}

#[async_trait]
pub trait TableSourcePort: Send + Sync {
    async fn read_table(&self, path: &Path) -> anyhow::Result<TrialTable>;
}

#[async_trait]
pub trait TableSinkPort: Send + Sync {
    /// Replace whatever is at `path` with `table`
    async fn write_table(&self, path: &Path, table: &TrialTable) -> anyhow::Result<()>;
}

/// Named JSON report documents
#[async_trait]
pub trait ReportOutputPort: Send + Sync {
    /// Write the report and return where it went
    async fn write_report(&self, name: &str, report: &Value) -> anyhow::Result<String>;
}
