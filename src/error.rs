use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScaffoldError {
    #[error("Could not prepare '{path}': {source}")]
    Environment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not find a data directory for scaffold.")]
    NoDataDir,
    #[error("Invalid config file '{path}': {message}")]
    Config { path: PathBuf, message: String },
    #[error("Template '{name}' does not exist (it should exist at {path})")]
    TemplateNotFound { name: String, path: PathBuf },
    #[error("No command found in the edited buffer.")]
    EmptyCommand,
    #[error("No template specified.")]
    NoTemplateSpecified,
    #[error("Run index {index} is out of range (history holds {len} runs)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("History store '{path}' is corrupt at line {line}")]
    HistoryCorrupt { path: PathBuf, line: usize },
    #[error("Could not launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization Error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = ScaffoldError> = std::result::Result<T, E>;
