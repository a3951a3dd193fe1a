use crate::error::ForecastError;
use crate::features::{FEATURE_COUNT, FEATURE_NAMES};
use crate::pipeline::TrainedPipeline;
use anyhow::{Context, Result};
use bincode::Options;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

const PIPELINE_ARTIFACT_VERSION: u32 = 1;
// A fitted pipeline is a few hundred bytes; anything larger is not ours.
const MAX_ARTIFACT_BYTES: u64 = 1 << 20;

fn artifact_codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_ARTIFACT_BYTES)
}

/// On-disk envelope around a fitted pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineArtifact {
    pub version: u32,
    pub ticker: String,
    pub trained_at: DateTime<Utc>,
    pub feature_names: Vec<String>,
    pub pipeline: TrainedPipeline,
}

impl PipelineArtifact {
    pub fn new(ticker: &str, pipeline: TrainedPipeline) -> Self {
        Self {
            version: PIPELINE_ARTIFACT_VERSION,
            ticker: ticker.to_string(),
            trained_at: Utc::now(),
            feature_names: FEATURE_NAMES.iter().map(|name| name.to_string()).collect(),
            pipeline,
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.version != PIPELINE_ARTIFACT_VERSION {
            return Err(format!(
                "artifact version mismatch (found {}, expected {})",
                self.version, PIPELINE_ARTIFACT_VERSION
            ));
        }
        if self.feature_names.len() != FEATURE_COUNT
            || self
                .feature_names
                .iter()
                .zip(FEATURE_NAMES.iter())
                .any(|(found, expected)| found != expected)
        {
            return Err(format!(
                "artifact features {:?} do not match {:?}",
                self.feature_names, FEATURE_NAMES
            ));
        }
        self.pipeline.validate()
    }
}

/// Writes the artifact, creating parent directories and replacing any file
/// already at `path`.
pub fn save_pipeline<P: AsRef<Path>>(artifact: &PipelineArtifact, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create model directory {}", parent.display())
            })?;
        }
    }

    let file = File::create(path)
        .with_context(|| format!("Unable to create model file at {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    artifact_codec()
        .serialize_into(&mut writer, artifact)
        .context("Failed to serialize pipeline")?;
    writer
        .flush()
        .context("Failed to flush pipeline to disk")?;
    Ok(())
}

/// Reads and validates an artifact. Every failure is `ModelNotFound`.
pub fn load_pipeline<P: AsRef<Path>>(path: P) -> Result<PipelineArtifact, ForecastError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(ForecastError::model_not_found(path, "no such file"));
    }

    let file = File::open(path)
        .map_err(|err| ForecastError::model_not_found(path, format!("cannot open: {}", err)))?;
    let artifact: PipelineArtifact = artifact_codec()
        .deserialize_from(BufReader::new(file))
        .map_err(|err| ForecastError::model_not_found(path, format!("decode failed: {}", err)))?;
    artifact
        .validate()
        .map_err(|reason| ForecastError::model_not_found(path, reason))?;

    Ok(artifact)
}
