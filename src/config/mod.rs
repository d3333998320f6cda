//! Pipeline files and engine settings.
//!
//! A pipeline file lists the stages to run, in order, with their parameters
//! and the engine settings to run them with. JSON (`.json`) is the primary
//! format; TOML (`.toml`) is accepted as well, chosen by file extension.
//!
//! # Example
//!
//! ```json
//! {
//!   "version": 1,
//!   "name": "threshold",
//!   "settings": { "log_filter": "info", "parallel_chunk_tuples": 4096 },
//!   "stages": [
//!     {
//!       "stage_type": "CreateAttributeMatrix",
//!       "params": { "Path": ["M", "cells", ""], "TupleDims": [8], "Category": "Cell" }
//!     }
//!   ]
//! }
//! ```

use crate::error::{ArrayFlowError, Result};
use crate::pipeline::params::ParameterSet;
use crate::pipeline::stage::DEFAULT_CHUNK_TUPLES;
use crate::pipeline::stage_type::StageType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current pipeline file format version.
pub const PIPELINE_FILE_VERSION: u32 = 1;

/// Default log filter when neither `RUST_LOG` nor the file sets one.
pub const DEFAULT_LOG_FILTER: &str = "info,arrayflow=debug";

/// On-disk format of a pipeline file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Toml,
}

impl FileFormat {
    /// Pick the format from the extension. Anything but `.toml` is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => FileFormat::Toml,
            _ => FileFormat::Json,
        }
    }
}

// ==================== Engine Settings ====================

/// Settings that shape how a pipeline runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// `tracing` filter directive, e.g. `"info,arrayflow=debug"`.
    pub log_filter: String,

    /// When set, logs are also written to this file.
    pub log_file: Option<PathBuf>,

    /// Tuples handed to one parallel worker.
    pub parallel_chunk_tuples: usize,

    /// Forward per-stage progress messages.
    pub emit_progress: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_file: None,
            parallel_chunk_tuples: DEFAULT_CHUNK_TUPLES,
            emit_progress: true,
        }
    }
}

// ==================== Stage Config ====================

/// One stage entry of a pipeline file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub stage_type: StageType,

    /// Label shown in reports instead of the stage's own name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default)]
    pub params: ParameterSet,
}

impl StageConfig {
    pub fn new(stage_type: StageType, params: ParameterSet) -> Self {
        Self {
            stage_type,
            label: None,
            params,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

// ==================== Pipeline File ====================

/// A saved pipeline: ordered stages plus engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineFile {
    /// File format version for future compatibility
    #[serde(default = "default_pipeline_version")]
    pub version: u32,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub settings: EngineSettings,

    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

fn default_pipeline_version() -> u32 {
    PIPELINE_FILE_VERSION
}

impl Default for PipelineFile {
    fn default() -> Self {
        Self {
            version: PIPELINE_FILE_VERSION,
            name: String::new(),
            settings: EngineSettings::default(),
            stages: Vec::new(),
        }
    }
}

impl PipelineFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder-style stage append.
    pub fn with_stage(mut self, stage: StageConfig) -> Self {
        self.stages.push(stage);
        self
    }

    /// Load a pipeline file, choosing the format by extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ArrayFlowError::Config(format!("Failed to read pipeline file {:?}: {}", path, e))
        })?;

        let file = Self::parse(&content, FileFormat::from_path(path)).map_err(|e| {
            ArrayFlowError::Config(format!("Failed to parse pipeline file {:?}: {}", path, e))
        })?;

        if file.version > PIPELINE_FILE_VERSION {
            tracing::warn!(
                "Pipeline file {:?} has version {}, newer than supported version {}",
                path,
                file.version,
                PIPELINE_FILE_VERSION
            );
        }
        tracing::debug!(stages = file.stages.len(), "Loaded pipeline file {:?}", path);
        Ok(file)
    }

    /// Parse pipeline file text in the given format.
    pub fn parse(content: &str, format: FileFormat) -> Result<Self> {
        match format {
            FileFormat::Json => serde_json::from_str(content)
                .map_err(|e| ArrayFlowError::Serialization(e.to_string())),
            FileFormat::Toml => {
                toml::from_str(content).map_err(|e| ArrayFlowError::Serialization(e.to_string()))
            }
        }
    }

    /// Serialize in the given format.
    pub fn render(&self, format: FileFormat) -> Result<String> {
        match format {
            FileFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| ArrayFlowError::Serialization(e.to_string())),
            FileFormat::Toml => toml::to_string_pretty(self)
                .map_err(|e| ArrayFlowError::Serialization(e.to_string())),
        }
    }

    /// Save to disk, choosing the format by extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                ArrayFlowError::Config(format!("Failed to create pipeline directory: {}", e))
            })?;
        }

        let content = self.render(FileFormat::from_path(path))?;
        std::fs::write(path, content).map_err(|e| {
            ArrayFlowError::Config(format!("Failed to write pipeline file {:?}: {}", path, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ArrayPath;

    fn sample() -> PipelineFile {
        PipelineFile::new("sample").with_stage(
            StageConfig::new(
                StageType::CreateAttributeMatrix,
                ParameterSet::new()
                    .with("Path", ArrayPath::matrix("M", "cells"))
                    .with("TupleDims", vec![8i64])
                    .with("Category", "Cell"),
            )
            .with_label("cells"),
        )
    }

    #[test]
    fn test_settings_defaults_fill_missing_fields() {
        let settings: EngineSettings = serde_json::from_str(r#"{"emit_progress": false}"#).unwrap();
        assert!(!settings.emit_progress);
        assert_eq!(settings.log_filter, DEFAULT_LOG_FILTER);
        assert_eq!(settings.parallel_chunk_tuples, DEFAULT_CHUNK_TUPLES);
    }

    #[test]
    fn test_json_round_trip() {
        let file = sample();
        let json = file.render(FileFormat::Json).unwrap();
        let parsed = PipelineFile::parse(&json, FileFormat::Json).unwrap();
        assert_eq!(parsed, file);
    }

    #[test]
    fn test_toml_round_trip() {
        let file = sample();
        let text = file.render(FileFormat::Toml).unwrap();
        let parsed = PipelineFile::parse(&text, FileFormat::Toml).unwrap();
        assert_eq!(parsed, file);
    }

    #[test]
    fn test_minimal_json() {
        let parsed = PipelineFile::parse(
            r#"{"stages": [{"stage_type": "RenameArray"}]}"#,
            FileFormat::Json,
        )
        .unwrap();
        assert_eq!(parsed.version, PIPELINE_FILE_VERSION);
        assert_eq!(parsed.stages[0].stage_type, StageType::RenameArray);
        assert!(parsed.stages[0].params.is_empty());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(FileFormat::from_path(Path::new("a.toml")), FileFormat::Toml);
        assert_eq!(FileFormat::from_path(Path::new("a.json")), FileFormat::Json);
        assert_eq!(FileFormat::from_path(Path::new("a")), FileFormat::Json);
    }

    #[test]
    fn test_parse_error_is_serialization() {
        assert!(matches!(
            PipelineFile::parse("{", FileFormat::Json),
            Err(ArrayFlowError::Serialization(_))
        ));
    }
}
