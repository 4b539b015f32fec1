use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::app::ports::{TableSinkPort, TableSourcePort};
use crate::error::Result;
use crate::pipeline::table::{Cell, TrialTable};

/// Delimited trial tables with a header row. An empty field is a missing
/// value in both directions.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvTableAdapter;

impl CsvTableAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn read(path: &Path) -> Result<TrialTable> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
        let columns: Vec<String> = reader.headers()?.iter().map(String::from).collect();

        let mut table = TrialTable::new(columns);
        for record in reader.records() {
            let record = record?;
            let row: Vec<Cell> = record
                .iter()
                .map(|field| (!field.is_empty()).then(|| field.to_string()))
                .collect();
            table.push_row(row)?;
        }
        debug!("Read {} rows from {}", table.len(), path.display());
        Ok(table)
    }

    /// Write to a sibling temp file and rename it over `path`, so readers
    /// never see a half-written table
    pub fn write(path: &Path, table: &TrialTable) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let tmp = temp_path(path);
        {
            let mut writer = csv::Writer::from_path(&tmp)?;
            writer.write_record(table.columns())?;
            for row in table.rows() {
                writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        info!("Wrote {} rows to {}", table.len(), path.display());
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "table.csv".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

#[async_trait::async_trait]
impl TableSourcePort for CsvTableAdapter {
    async fn read_table(&self, path: &Path) -> anyhow::Result<TrialTable> {
        Ok(Self::read(path)?)
    }
}

#[async_trait::async_trait]
impl TableSinkPort for CsvTableAdapter {
    async fn write_table(&self, path: &Path, table: &TrialTable) -> anyhow::Result<()> {
        Ok(Self::write(path, table)?)
    }
}
