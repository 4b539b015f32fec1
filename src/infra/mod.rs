pub mod csv_table_adapter;
pub mod json_report_adapter;
pub mod study_file_adapter;

pub use csv_table_adapter::CsvTableAdapter;
pub use json_report_adapter::JsonReportAdapter;
pub use study_file_adapter::JsonStudyFileAdapter;

use std::path::Path;

use crate::app::enrich_use_case::EnrichUseCase;
use crate::app::ingest_use_case::IngestUseCase;
use crate::app::pipeline_use_case::PipelineUseCase;
use crate::app::quality_gate_use_case::QualityGateUseCase;
use crate::app::report_use_case::ReportUseCase;
use crate::app::validate_use_case::ValidateUseCase;
use crate::config::{PipelineConfig, PipelinePaths};

/// Full pipeline over CSV tables and JSON reports laid out by `paths`.
/// With `studies` the run starts by ingesting them; otherwise from the raw table.
pub fn file_backed_pipeline(
    config: &PipelineConfig,
    paths: &PipelinePaths,
    studies: Option<&Path>,
) -> PipelineUseCase {
    let reports = || Box::new(JsonReportAdapter::new(&paths.reports_dir));
    let ingest = studies.map(|studies| {
        IngestUseCase::new(
            config.name.clone(),
            Box::new(JsonStudyFileAdapter::new(studies)),
            Box::new(CsvTableAdapter::new()),
        )
    });

    PipelineUseCase::new(
        config.name.clone(),
        paths.clone(),
        ingest,
        EnrichUseCase::with_configured_classifier(
            config.clone(),
            Box::new(CsvTableAdapter::new()),
            Box::new(CsvTableAdapter::new()),
        ),
        ValidateUseCase::new(config.clone(), Box::new(CsvTableAdapter::new())),
        QualityGateUseCase::with_default_quality_gate(config, Box::new(CsvTableAdapter::new()), reports()),
        ReportUseCase::new(config.clone(), reports()),
        reports(),
    )
}
