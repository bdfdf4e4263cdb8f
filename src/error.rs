use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that abort a run.
///
/// Everything here is raised before the worker pool starts or while the
/// report is written. Per-target failures never become a `ReconError`; they
/// are carried inside an [`OutcomeRecord`](crate::OutcomeRecord) as a
/// [`CaptureError`].
#[derive(Debug, Error)]
pub enum ReconError {
    #[error("Need an input source (one of --xml, --list, --dir, --url)")]
    MissingInput,

    #[error("{0} already exists")]
    OutputExists(PathBuf),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Failed to read targets from {path}: {reason}")]
    TargetSource { path: PathBuf, reason: String },

    #[error("Invalid nmap XML in {path}: {reason}")]
    XmlParse { path: PathBuf, reason: String },

    #[error("No Chrome/Chromium executable found")]
    BrowserNotFound,

    #[error("Browser launch failed: {0}")]
    BrowserLaunchFailed(String),

    #[error("Failed to write report {path}: {reason}")]
    Report { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl ReconError {
    /// Errors the user can fix by changing flags or the environment.
    /// These are raised before any worker is spawned.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ReconError::MissingInput
                | ReconError::OutputExists(_)
                | ReconError::ConfigurationError(_)
                | ReconError::TargetSource { .. }
                | ReconError::XmlParse { .. }
                | ReconError::BrowserNotFound
                | ReconError::SerializationError(_)
        )
    }
}

impl From<std::io::Error> for ReconError {
    fn from(err: std::io::Error) -> Self {
        ReconError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ReconError {
    fn from(err: serde_json::Error) -> Self {
        ReconError::SerializationError(err.to_string())
    }
}

/// Why a single capture did not produce its artifacts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CaptureError {
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Artifact write failed: {0}")]
    Artifact(String),
}

impl CaptureError {
    /// Short label used as the `reason` of the failed-capture metric.
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureError::Timeout(_) => "timeout",
            CaptureError::Navigation(_) => "navigation",
            CaptureError::Browser(_) => "browser",
            CaptureError::Artifact(_) => "artifact",
        }
    }
}
