//! Run configuration with serde serialization/deserialization
//!
//! A [`Config`] is assembled once, from defaults, an optional JSON file and
//! command-line overrides, validated, and then shared read-only by every
//! component of the run.

use crate::ReconError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Name of the report written inside the output directory.
pub const REPORT_FILE_NAME: &str = "peepshot.html";

/// Prefix of the timestamped output directory used when `--output` is absent.
pub const OUTPUT_DIR_PREFIX: &str = "peepshot_";

/// Main configuration structure for a scan
///
/// # Examples
///
/// ```rust
/// use peepshot::Config;
///
/// let config = Config {
///     threads: 4,
///     timeout_secs: 15,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Number of concurrent capture workers (default: 1)
    ///
    /// Exactly this many workers are spawned. Zero is rejected by
    /// [`Config::validate`].
    pub threads: usize,

    /// Per-capture timeout in seconds (default: 8)
    ///
    /// Scoped to one target, not to the whole run.
    pub timeout_secs: u64,

    /// Output directory requested by the user (default: timestamped)
    pub output_dir: Option<PathBuf>,

    /// Verbose logging (default: false)
    pub verbose: bool,

    /// Path to Chrome/Chromium executable (default: auto-detect)
    pub chrome_path: Option<PathBuf>,

    /// Browser viewport used for screenshots
    pub viewport: Viewport,

    /// Custom User-Agent for the browser and the header fetch
    pub user_agent: Option<String>,

    /// Seconds between progress log lines; `None` disables progress logging
    pub progress_interval: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads: 1,
            timeout_secs: 8,
            output_dir: None,
            verbose: false,
            chrome_path: None,
            viewport: Viewport::default(),
            user_agent: None,
            progress_interval: None,
        }
    }
}

impl Config {
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.threads == 0 {
            return Err(ReconError::ConfigurationError(
                "Thread count must be greater than 0".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(ReconError::ConfigurationError(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(ReconError::ConfigurationError(
                "Viewport dimensions must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Parse a JSON configuration document. Missing fields take defaults.
    pub fn from_json(content: &str) -> Result<Self, ReconError> {
        Ok(serde_json::from_str(content)?)
    }
}

/// Browser viewport used when rendering pages
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Viewport {
    /// Viewport width in pixels (default: 1280)
    pub width: u32,

    /// Viewport height in pixels (default: 800)
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

/// Chrome command-line arguments for headless capture
///
/// Certificate errors are ignored: recon targets routinely serve self-signed
/// or mismatched certificates and should still be captured.
pub fn get_chrome_args(config: &Config) -> Vec<String> {
    let mut args = vec![
        "--headless".to_string(),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--disable-extensions".to_string(),
        "--disable-default-apps".to_string(),
        "--disable-sync".to_string(),
        "--no-first-run".to_string(),
        "--hide-scrollbars".to_string(),
        "--mute-audio".to_string(),
        "--ignore-certificate-errors".to_string(),
        "--allow-running-insecure-content".to_string(),
        format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        ),
        format!(
            "--user-data-dir={}",
            std::env::temp_dir()
                .join(format!("peepshot-chrome-{}", std::process::id()))
                .display()
        ),
    ];

    if let Some(user_agent) = &config.user_agent {
        args.push(format!("--user-agent={user_agent}"));
    }

    args
}

pub fn create_browser_config(
    config: &Config,
    chrome_path: &std::path::Path,
) -> Result<chromiumoxide::browser::BrowserConfig, ReconError> {
    use chromiumoxide::browser::BrowserConfig;

    BrowserConfig::builder()
        .chrome_executable(chrome_path)
        .window_size(config.viewport.width, config.viewport.height)
        .request_timeout(config.capture_timeout())
        .args(get_chrome_args(config))
        .build()
        .map_err(ReconError::BrowserLaunchFailed)
}
