pub mod ports;
pub mod ingest_use_case;
pub mod enrich_use_case;
pub mod validate_use_case;
pub mod quality_gate_use_case;
pub mod report_use_case;
pub mod pipeline_use_case;

#[cfg(test)]
pub(crate) mod mocks;
