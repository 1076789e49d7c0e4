//! Error taxonomy for the store, publishing, and spider pipelines.
//!
//! Core operations return [`NavError`]; the HTTP layer maps each variant to a
//! status code and a `{ "message": ... }` body. Per-entry probe failures are
//! not errors at all: they are recorded on the entry as a
//! [`Health`](crate::models::Health) value.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the core while reading, validating, or persisting data.
#[derive(Error, Debug)]
pub enum NavError {
    /// A primary JSON store could not be parsed.
    #[error("Failed to parse '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The YAML config is malformed.
    #[error("Failed to parse config '{path}': {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The settings document is missing or malformed. Never replaced by a default.
    #[error("Failed to read settings '{path}': {details}")]
    SettingsRead { path: PathBuf, details: String },

    /// Failed to read a file
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write a file
    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Serializing a value for persistence failed.
    #[error("Failed to serialize '{path}': {details}")]
    Serialize { path: PathBuf, details: String },

    /// The rendered HTML lacks a marker needed for an in-place rewrite.
    #[error("Template marker '{marker}' not found in '{path}'")]
    TemplateMarkerMissing { path: PathBuf, marker: String },

    /// No rendered index.html exists yet (first-time setup).
    #[error("Please create index.html first")]
    MissingIndexHtml,

    /// Missing or incorrect `Authorization` token.
    #[error("Bad credentials")]
    Auth,

    /// A request payload failed validation.
    #[error("{0}")]
    Validation(String),
}

impl NavError {
    pub fn validation(message: impl Into<String>) -> Self {
        NavError::Validation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, NavError>;
