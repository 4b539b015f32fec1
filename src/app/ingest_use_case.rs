use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use tracing::{info, warn};

use crate::app::ports::{StudySourcePort, TableSinkPort};
use crate::observability::metrics;
use crate::pipeline::ingestion::flatten_studies;
use crate::pipeline::table::TrialTable;

/// What ingestion produced
#[derive(Debug, Clone)]
pub struct IngestResult {
    pub table: TrialTable,
    pub duplicates_skipped: usize,
    pub missing_id_skipped: usize,
}

/// Use case for flattening fetched study documents into the raw trial table
pub struct IngestUseCase {
    pipeline: String,
    source: Box<dyn StudySourcePort>,
    sink: Box<dyn TableSinkPort>,
}

impl IngestUseCase {
    pub fn new(pipeline: impl Into<String>, source: Box<dyn StudySourcePort>, sink: Box<dyn TableSinkPort>) -> Self {
        Self {
            pipeline: pipeline.into(),
            source,
            sink,
        }
    }

    /// Flatten every loaded document and write the raw table to `raw_file`
    pub async fn run(&self, raw_file: &Path) -> Result<IngestResult> {
        let started = Instant::now();

        let documents = self.source.load_documents().await?;
        info!("Loaded {} study documents for {}", documents.len(), self.pipeline);

        let outcome = flatten_studies(&documents);
        let duplicates_skipped = outcome.duplicates_skipped;
        let missing_id_skipped = outcome.missing_id_skipped;

        metrics::ingest::studies_flattened(&self.pipeline, outcome.records.len());
        metrics::ingest::skipped(&self.pipeline, duplicates_skipped, missing_id_skipped);
        if duplicates_skipped > 0 || missing_id_skipped > 0 {
            warn!(
                duplicates = duplicates_skipped,
                missing_ids = missing_id_skipped,
                "Skipped studies while flattening"
            );
        }

        let table = outcome.into_table()?;
        self.sink.write_table(raw_file, &table).await?;
        info!("Saved {} raw trials to {}", table.len(), raw_file.display());

        metrics::stage_duration(&self.pipeline, "ingest", started.elapsed().as_secs_f64());

        Ok(IngestResult {
            table,
            duplicates_skipped,
            missing_id_skipped,
        })
    }
}
