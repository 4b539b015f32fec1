use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::info;

use crate::app::ports::StudySourcePort;
use crate::error::{PipelineError, Result};

/// Study documents saved by the fetcher: one JSON file, an NDJSON file
/// (`.ndjson` / `.jsonl`, one document per line), or a directory of either
pub struct JsonStudyFileAdapter {
    path: PathBuf,
}

impl JsonStudyFileAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<Vec<Value>> {
        if !self.path.is_dir() {
            return read_file(&self.path);
        }

        let mut files: Vec<PathBuf> = fs::read_dir(&self.path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_ndjson(p) || p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        let mut documents = Vec::new();
        for file in files {
            documents.extend(read_file(&file)?);
        }
        Ok(documents)
    }
}

fn is_ndjson(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "ndjson" || ext == "jsonl")
}

fn read_file(path: &Path) -> Result<Vec<Value>> {
    let content = fs::read_to_string(path)?;
    let invalid = |line: Option<usize>, e: serde_json::Error| {
        let at = line.map(|l| format!(" line {}", l)).unwrap_or_default();
        PipelineError::InvalidDocument(format!("{}{}: {}", path.display(), at, e))
    };

    if is_ndjson(path) {
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| serde_json::from_str(line).map_err(|e| invalid(Some(i + 1), e)))
            .collect()
    } else {
        let document = serde_json::from_str(&content).map_err(|e| invalid(None, e))?;
        Ok(vec![document])
    }
}

#[async_trait::async_trait]
impl StudySourcePort for JsonStudyFileAdapter {
    async fn load_documents(&self) -> anyhow::Result<Vec<Value>> {
        let documents = self.load()?;
        info!("Loaded {} documents from {}", documents.len(), self.path.display());
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_single_json_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("page.json");
        fs::write(&path, r#"{"studies": []}"#).unwrap();

        let docs = JsonStudyFileAdapter::new(&path).load().unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0]["studies"].is_array());
    }

    #[test]
    fn test_ndjson_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("studies.ndjson");
        fs::write(&path, "{\"a\": 1}\n\n{\"a\": 2}\n").unwrap();

        let docs = JsonStudyFileAdapter::new(&path).load().unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn test_directory_reads_json_files_in_name_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("page_2.json"), r#"{"page": 2}"#).unwrap();
        fs::write(dir.path().join("page_1.json"), r#"{"page": 1}"#).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let docs = JsonStudyFileAdapter::new(dir.path()).load().unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["page"], 1);
    }

    #[test]
    fn test_malformed_json_names_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.jsonl");
        fs::write(&path, "{\"ok\": true}\n{not json\n").unwrap();

        let err = JsonStudyFileAdapter::new(&path).load().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidDocument(_)));
        assert!(err.to_string().contains("line 2"));
    }
}
