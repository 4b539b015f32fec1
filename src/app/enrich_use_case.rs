use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use tracing::info;

use crate::app::ports::{TableSinkPort, TableSourcePort};
use crate::config::PipelineConfig;
use crate::observability::metrics;
use crate::pipeline::processing::enrich::{classifier_for, enrich, ConditionClassifier};
use crate::pipeline::table::TrialTable;

/// Use case for classifying trials and tagging them with their source
pub struct EnrichUseCase {
    config: PipelineConfig,
    classifier: Box<dyn ConditionClassifier>,
    source: Box<dyn TableSourcePort>,
    sink: Box<dyn TableSinkPort>,
}

impl EnrichUseCase {
    pub fn new(
        config: PipelineConfig,
        classifier: Box<dyn ConditionClassifier>,
        source: Box<dyn TableSourcePort>,
        sink: Box<dyn TableSinkPort>,
    ) -> Self {
        Self {
            config,
            classifier,
            source,
            sink,
        }
    }

    /// Create a use case with the classifier the config names
    pub fn with_configured_classifier(
        config: PipelineConfig,
        source: Box<dyn TableSourcePort>,
        sink: Box<dyn TableSinkPort>,
    ) -> Self {
        let classifier = classifier_for(config.enrichment.classifier);
        Self::new(config, classifier, source, sink)
    }

    /// Enrich a table already in memory
    pub fn enrich_table(&self, table: TrialTable) -> Result<TrialTable> {
        let enriched = enrich(table, self.classifier.as_ref(), &self.config)?;
        metrics::ingest::rows_enriched(&self.config.name, enriched.len());
        Ok(enriched)
    }

    /// Read `input`, enrich it and write the result to `output`
    pub async fn run(&self, input: &Path, output: &Path) -> Result<TrialTable> {
        let started = Instant::now();

        let table = self.source.read_table(input).await?;
        info!("Loaded {} trials from {}", table.len(), input.display());

        let enriched = self.enrich_table(table)?;
        self.sink.write_table(output, &enriched).await?;
        info!(
            column = %self.config.enrichment.classification_column,
            "Saved {} enriched trials to {}",
            enriched.len(),
            output.display()
        );

        metrics::stage_duration(&self.config.name, "enrich", started.elapsed().as_secs_f64());
        Ok(enriched)
    }
}
