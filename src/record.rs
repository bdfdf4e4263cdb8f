use crate::CaptureError;
use std::path::PathBuf;
use std::time::Duration;

/// A capture destination: URL or host, exactly as the input produced it.
pub type Target = String;

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureStatus {
    Captured,
    Failed(CaptureError),
}

/// The result of attempting to capture one target.
///
/// Built by a worker, appended to the [`ResultStore`](crate::ResultStore)
/// once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeRecord {
    /// The target as produced by the input, never rewritten.
    pub target: Target,
    /// The URL the browser was pointed at.
    pub url: String,
    pub status: CaptureStatus,
    /// Screenshot path relative to the output directory.
    pub screenshot: Option<PathBuf>,
    /// Saved page source, relative to the output directory.
    pub source: Option<PathBuf>,
    pub page_title: Option<String>,
    pub final_url: Option<String>,
    pub http_status: Option<u16>,
    pub headers: Vec<(String, String)>,
    pub duration: Duration,
    pub worker_id: usize,
}

impl OutcomeRecord {
    pub fn captured(target: impl Into<Target>, url: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            url: url.into(),
            status: CaptureStatus::Captured,
            screenshot: None,
            source: None,
            page_title: None,
            final_url: None,
            http_status: None,
            headers: Vec::new(),
            duration: Duration::ZERO,
            worker_id: 0,
        }
    }

    pub fn failed(target: impl Into<Target>, url: impl Into<String>, error: CaptureError) -> Self {
        Self {
            status: CaptureStatus::Failed(error),
            ..Self::captured(target, url)
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, CaptureStatus::Captured)
    }

    pub fn error(&self) -> Option<&CaptureError> {
        match &self.status {
            CaptureStatus::Captured => None,
            CaptureStatus::Failed(error) => Some(error),
        }
    }
}
