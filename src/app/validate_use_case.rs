use std::path::Path;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::app::ports::TableSourcePort;
use crate::config::PipelineConfig;
use crate::observability::metrics;
use crate::pipeline::processing::validate::{validate, ValidationReport};
use crate::pipeline::table::TrialTable;

/// Use case for the structural checks run before the quality gate
pub struct ValidateUseCase {
    config: PipelineConfig,
    source: Box<dyn TableSourcePort>,
}

impl ValidateUseCase {
    pub fn new(config: PipelineConfig, source: Box<dyn TableSourcePort>) -> Self {
        Self { config, source }
    }

    /// Validate a table already in memory, logging every finding
    pub fn check(&self, table: &TrialTable) -> Result<ValidationReport> {
        let report = validate(table, &self.config)?;
        let pipeline = &self.config.name;

        for notice in &report.notices {
            warn!("Validation notice: {}", notice);
        }
        metrics::validation::notices(pipeline, report.notices.len());

        for err in &report.errors {
            error!(kind = ?err.kind, "Validation error: {}", err.message);
            let kind = serde_json::to_value(err.kind)?;
            metrics::validation::error(pipeline, kind.as_str().unwrap_or("unknown"));
        }
        metrics::validation::run(pipeline, report.passed());

        if report.passed() {
            info!("Validation passed: {} rows, {} columns", table.len(), table.column_count());
        } else {
            warn!("Validation failed with {} errors", report.errors.len());
        }
        Ok(report)
    }

    /// Read the table at `path` and validate it
    pub async fn run(&self, path: &Path) -> Result<ValidationReport> {
        let table = self.source.read_table(path).await?;
        self.check(&table)
    }
}
