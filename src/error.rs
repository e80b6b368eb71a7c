use std::path::PathBuf;
use thiserror::Error;

use crate::record::StageId;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum SkillError {
    #[error("Skills manifest not found: {0}")]
    CatalogNotFound(PathBuf),

    #[error("Skills manifest is malformed: {0}")]
    CatalogMalformed(String),

    #[error("Skill not found: {0}")]
    UnknownCapability(String),

    #[error("Reference '{reference}' not found for skill '{skill}'")]
    ReferenceNotFound { skill: String, reference: String },

    #[error("Skill file for '{skill}' not found: {path}")]
    DocumentNotFound { skill: String, path: PathBuf },

    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of the external reasoning capability. The orchestration core
/// treats every variant the same way.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Execution timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Process failed with exit code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("No fixture response for stage '{0}'")]
    MissingFixture(String),

    #[error("Fixture failure: {0}")]
    Scripted(String),

    #[error("Provider returned an empty response")]
    EmptyResponse,
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("No JSON object found in response")]
    NoJson,

    #[error("Response does not match the expected shape: {0}")]
    Shape(#[from] serde_json::Error),
}

/// A failure localized to one stage. Always recovered by the orchestrator.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Skill(#[from] SkillError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Stage task panicked: {0}")]
    Panicked(String),
}

impl StageError {
    /// Human-readable note appended to the run's error list.
    pub fn note(&self, stage: StageId) -> String {
        format!("{} agent error: {}", stage, self)
    }
}

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Skill catalog unavailable: {0}")]
    Catalog(#[from] SkillError),

    #[error("Failed to acquire semaphore: {0}")]
    Semaphore(#[from] tokio::sync::AcquireError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Failed to access checkpoint '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Checkpoint is not valid JSON: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Thread id must not be empty")]
    EmptyThreadId,
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to create output directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Failed to write report: {0}")]
    WriteReport(std::io::Error),

    #[error("Parcel id must not be empty")]
    EmptyParcelId,

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
