//! File-backed configuration for the `idforge` binary and for embedders.
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! gives a runnable local setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::batch::BatchOptions;
use crate::pipeline::PipelineConfig;
use crate::workflow::DEFAULT_MAX_ARTIFACT_BYTES;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub concurrency: usize,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        let options = BatchOptions::default();
        Self {
            concurrency: options.concurrency,
            max_retries: options.max_retries,
            backoff_ms: options.backoff.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Barcode/QR generator endpoint.
    pub codec_base_url: String,
    /// Public profile pages, encoded into landscape-back QR codes.
    pub profile_base_url: String,
    /// Organisation name printed on card backs.
    pub issuer: String,
    pub upload_url: String,
    pub record_base_url: String,
    pub http_timeout_ms: u64,
    pub render_scale: f32,
    pub image_timeout_ms: u64,
    pub max_artifact_bytes: usize,
    /// Regular-weight TTF used for all card text; greeked blocks without it.
    pub font_path: Option<PathBuf>,
    pub bold_font_path: Option<PathBuf>,
    pub batch: BatchConfig,
}

impl Default for ExportConfig {
    fn default() -> Self {
        let pipeline = PipelineConfig::default();
        Self {
            codec_base_url: "http://localhost:8080/codec".into(),
            profile_base_url: "http://localhost:8080/profile".into(),
            issuer: "Human Resources".into(),
            upload_url: "http://localhost:8080/documents".into(),
            record_base_url: "http://localhost:8080/api".into(),
            http_timeout_ms: 15_000,
            render_scale: pipeline.render_scale,
            image_timeout_ms: pipeline.image_timeout.as_millis() as u64,
            max_artifact_bytes: DEFAULT_MAX_ARTIFACT_BYTES,
            font_path: None,
            bold_font_path: None,
            batch: BatchConfig::default(),
        }
    }
}

impl ExportConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ExportConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.render_scale.is_finite() && self.render_scale > 0.0) {
            return Err(ConfigError::Invalid {
                field: "render_scale",
                reason: format!("{} is not a positive number", self.render_scale),
            });
        }
        if self.max_artifact_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_artifact_bytes",
                reason: "must be greater than zero".into(),
            });
        }
        if self.batch.concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "batch.concurrency",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            render_scale: self.render_scale,
            image_timeout: Duration::from_millis(self.image_timeout_ms),
        }
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            concurrency: self.batch.concurrency,
            max_retries: self.batch.max_retries,
            backoff: Duration::from_millis(self.batch.backoff_ms),
        }
    }
}
