use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde_json::{json, Value};
use tempfile::tempdir;

use trial_pipeline::app::pipeline_use_case::PipelineRun;
use trial_pipeline::config::{PipelineConfig, PipelinePaths};
use trial_pipeline::constants::*;
use trial_pipeline::infra::{file_backed_pipeline, CsvTableAdapter};

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/resources/diabetes_studies.json")
}

fn read_report(paths: &PipelinePaths, name: &str) -> Value {
    let content = fs::read_to_string(paths.report(name)).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[tokio::test]
async fn test_diabetes_run_writes_tables_and_reports() -> Result<()> {
    let data_dir = tempdir()?;
    let config = PipelineConfig::diabetes();
    let paths = PipelinePaths::new(data_dir.path(), &config.name);

    let run = file_backed_pipeline(&config, &paths, Some(fixture().as_path()))
        .run()
        .await?;
    assert!(run.should_continue(), "run did not complete: {:?}", run);

    // 14 studies: one repeated identifier, one without an identifier
    let raw = CsvTableAdapter::read(&paths.raw_file)?;
    assert_eq!(raw.len(), 12);
    assert_eq!(raw.columns().len(), record_columns().len());

    let cleaned = CsvTableAdapter::read(&paths.enriched_file)?;
    assert_eq!(cleaned.len(), 12);
    assert!(cleaned.has_column(DISEASE_TYPE));
    assert!(cleaned.has_column(DATA_SOURCE));

    let ids: Vec<_> = cleaned.column(NCT_NUMBER).unwrap().collect();
    let conditions: Vec<_> = cleaned.column(CONDITIONS).unwrap().collect();
    let niddm = ids.iter().position(|id| *id == Some("NCT00001007")).unwrap();
    assert_eq!(conditions[niddm], Some("Type 2 Diabetes Mellitus"));
    let labels: Vec<_> = cleaned.column(DISEASE_TYPE).unwrap().collect();
    assert_eq!(labels[niddm], Some("Type 2 Diabetes"));

    let quality = read_report(&paths, QUALITY_STATS_REPORT);
    assert_eq!(quality["total_rows"], 12);
    assert_eq!(quality["issues"]["null_values"], 0);
    assert_eq!(quality["issues_after_cleaning"]["extra_whitespace"], 0);

    // one enrollment of 5000 against a median near 80
    let anomalies = read_report(&paths, ANOMALIES_REPORT);
    assert_eq!(anomalies["total_anomalies"], 1);
    assert_eq!(anomalies["anomalies"]["outliers"][0]["examples"], json!([5000.0]));
    assert_eq!(anomalies["data_quality_score"], 91.67);

    let bias = read_report(&paths, BIAS_REPORT);
    assert_eq!(bias["bias_level"], "LOW");
    assert_eq!(bias["slices"]["geography"]["us_trials"], 7);

    let summary = read_report(&paths, SUMMARY_REPORT);
    assert_eq!(summary["condition"], DIABETES_PIPELINE);
    assert_eq!(summary["total_trials"], 12);
    assert_eq!(summary["quality_verdict"], "continue");
    assert_eq!(summary["anomalies"], "detected");
    assert_eq!(summary["reports"].as_object().unwrap().len(), 4);
    assert_eq!(summary["table_fingerprint"], cleaned.fingerprint());

    Ok(())
}

#[tokio::test]
async fn test_rerun_from_raw_table_is_deterministic() -> Result<()> {
    let data_dir = tempdir()?;
    let config = PipelineConfig::diabetes();
    let paths = PipelinePaths::new(data_dir.path(), &config.name);

    let first = file_backed_pipeline(&config, &paths, Some(fixture().as_path())).run().await?;
    let second = file_backed_pipeline(&config, &paths, None).run().await?;

    match (first, second) {
        (PipelineRun::Completed(a), PipelineRun::Completed(b)) => {
            assert_eq!(a.table_fingerprint, b.table_fingerprint);
            assert_eq!(a.data_quality_score, b.data_quality_score);
            assert_ne!(a.run_id, b.run_id);
        }
        other => panic!("expected two completed runs, got {:?}", other),
    }
    Ok(())
}

fn write_studies(dir: &Path, studies: Vec<Value>) -> PathBuf {
    let path = dir.join("studies.json");
    fs::write(&path, serde_json::to_string(&json!({ "studies": studies })).unwrap()).unwrap();
    path
}

#[tokio::test]
async fn test_sparse_breast_cancer_extract_halts() -> Result<()> {
    let data_dir = tempdir()?;
    let config = PipelineConfig::breast_cancer();
    let paths = PipelinePaths::new(data_dir.path(), &config.name);

    // titles and conditions only: four of the six text columns are empty
    let studies = (1..=10)
        .map(|i| {
            json!({"protocolSection": {
                "identificationModule": {"nctId": format!("NCT{:08}", i), "briefTitle": "HER2+ study"},
                "conditionsModule": {"conditions": ["HER2-positive Breast Cancer"]},
                "eligibilityModule": {"sex": "FEMALE"}
            }})
        })
        .collect();
    let studies_file = write_studies(data_dir.path(), studies);

    let run = file_backed_pipeline(&config, &paths, Some(studies_file.as_path()))
        .run()
        .await?;

    let PipelineRun::Halted(stats) = run else {
        panic!("expected the quality gate to halt");
    };
    assert_eq!(stats.issues.null_values, 40);
    assert!(paths.report(QUALITY_STATS_REPORT).exists());
    assert!(!paths.report(SUMMARY_REPORT).exists());

    let cleaned = CsvTableAdapter::read(&paths.enriched_file)?;
    let types: Vec<_> = cleaned.column(CANCER_TYPE).unwrap().collect();
    assert!(types.iter().all(|t| *t == Some("her2positive_breast_cancer")));
    Ok(())
}

#[tokio::test]
async fn test_too_few_trials_fail_validation() -> Result<()> {
    let data_dir = tempdir()?;
    let config = PipelineConfig::diabetes();
    let paths = PipelinePaths::new(data_dir.path(), &config.name);

    let studies = vec![json!({"protocolSection": {
        "identificationModule": {"nctId": "NCT00000001", "briefTitle": "Lone study"},
        "conditionsModule": {"conditions": ["T1D"]}
    }})];
    let studies_file = write_studies(data_dir.path(), studies);

    let run = file_backed_pipeline(&config, &paths, Some(studies_file.as_path()))
        .run()
        .await?;

    assert!(matches!(run, PipelineRun::ValidationFailed(_)));
    assert!(!paths.reports_dir.exists());
    Ok(())
}

#[tokio::test]
async fn test_missing_raw_table_is_fatal() {
    let data_dir = tempdir().unwrap();
    let config = PipelineConfig::diabetes();
    let paths = PipelinePaths::new(data_dir.path(), &config.name);

    assert!(file_backed_pipeline(&config, &paths, None).run().await.is_err());
}
