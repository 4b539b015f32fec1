use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::info;

use crate::app::ports::ReportOutputPort;

/// Writes each report as pretty-printed `<name>.json` under one directory
pub struct JsonReportAdapter {
    reports_dir: PathBuf,
}

impl JsonReportAdapter {
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
        }
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }
}

#[async_trait::async_trait]
impl ReportOutputPort for JsonReportAdapter {
    async fn write_report(&self, name: &str, report: &Value) -> anyhow::Result<String> {
        fs::create_dir_all(&self.reports_dir)?;

        let path = self.reports_dir.join(format!("{}.json", name));
        let json = serde_json::to_string_pretty(report)?;
        fs::write(&path, json)?;

        info!("Report written: {}", path.display());
        Ok(path.display().to_string())
    }
}
