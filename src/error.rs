use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Command '{command}' does not exist")]
    MissingTool { command: String },

    #[error("Process '{command}' exited with failure")]
    Subprocess { command: String },

    #[error("Expected artifact does not exist: {path}")]
    MissingArtifact { path: PathBuf },

    #[error("Build cache does not exist: {path}")]
    MissingCache { path: PathBuf },

    #[error("Unknown build alias '{alias}'")]
    UnknownAlias { alias: String },

    #[error("Invalid {field} '{value}' (expected one of: {expected})")]
    InvalidComboField {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Repository root not found: no '{marker}' above {start}")]
    RepoRootNotFound { marker: &'static str, start: PathBuf },

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
