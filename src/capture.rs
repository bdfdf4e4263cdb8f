//! Per-target capture through a shared headless Chromium
//!
//! The [`Capturer`] trait is the seam between the scan core and the
//! browser. Workers only ever see the trait; [`ChromeCapturer`] is the
//! production implementation.

use crate::{
    artifact_stem, create_browser_config, normalize_target, CaptureError, Config, OutcomeRecord,
    ReconError,
};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use dashmap::DashMap;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::Instant as Deadline;
use tracing::{debug, info, warn};

/// Captures one target.
///
/// Implementations must not fail or panic for unreachable or slow targets:
/// every such condition is reported as a failed [`OutcomeRecord`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Capturer: Send + Sync {
    async fn capture(&self, target: &str, timeout: Duration) -> OutcomeRecord;
}

/// Artifacts written for a successful page load.
#[derive(Debug)]
struct PageArtifacts {
    screenshot: PathBuf,
    source: PathBuf,
    page_title: Option<String>,
    final_url: Option<String>,
}

pub struct ChromeCapturer {
    browser: RwLock<Browser>,
    handler: tokio::task::JoinHandle<()>,
    http: reqwest::Client,
    output_dir: PathBuf,
    stems: ArtifactNamer,
}

impl ChromeCapturer {
    /// Launch Chromium and prepare the header client.
    ///
    /// Artifacts are written to `output_dir`, which must already exist.
    pub async fn launch(
        config: &Config,
        chrome_path: &Path,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self, ReconError> {
        let browser_config = create_browser_config(config, chrome_path)?;
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ReconError::BrowserLaunchFailed(e.to_string()))?;

        // The handler drives the DevTools connection and must be polled
        // for as long as the browser is in use.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {}", e);
                }
            }
            debug!("Browser handler stream ended");
        });

        let mut http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.capture_timeout());
        if let Some(user_agent) = &config.user_agent {
            http = http.user_agent(user_agent.clone());
        }
        let http = http
            .build()
            .map_err(|e| ReconError::ConfigurationError(e.to_string()))?;

        info!("Launched browser {}", chrome_path.display());

        Ok(Self {
            browser: RwLock::new(browser),
            handler,
            http,
            output_dir: output_dir.into(),
            stems: ArtifactNamer::new(),
        })
    }

    pub async fn shutdown(&self) {
        let mut browser = self.browser.write().await;
        if let Err(e) = browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        self.handler.abort();
    }

    async fn capture_page(
        &self,
        url: &str,
        stem: &str,
        budget: &CaptureBudget,
    ) -> Result<PageArtifacts, CaptureError> {
        let page = budget
            .run(async {
                let browser = self.browser.read().await;
                browser
                    .new_page("about:blank")
                    .await
                    .map_err(|e| CaptureError::Browser(e.to_string()))
            })
            .await?;

        let result = budget.run(self.render(&page, url, stem)).await;

        // Closing shares the deadline; a page left open dies with the browser.
        if let Err(e) = budget
            .run(async {
                page.close()
                    .await
                    .map_err(|e| CaptureError::Browser(e.to_string()))
            })
            .await
        {
            debug!("Failed to close page for {}: {}", url, e);
        }

        result
    }

    async fn render(&self, page: &Page, url: &str, stem: &str) -> Result<PageArtifacts, CaptureError> {
        page.goto(url)
            .await
            .map_err(|e| CaptureError::Navigation(e.to_string()))?;

        let page_title = page.get_title().await.ok().flatten();
        let final_url = page.url().await.ok().flatten();

        let screenshot = PathBuf::from(format!("{stem}.png"));
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        page.save_screenshot(params, self.output_dir.join(&screenshot))
            .await
            .map_err(|e| CaptureError::Artifact(e.to_string()))?;

        let source = PathBuf::from(format!("{stem}.html"));
        let content = page
            .content()
            .await
            .map_err(|e| CaptureError::Browser(e.to_string()))?;
        tokio::fs::write(self.output_dir.join(&source), content)
            .await
            .map_err(|e| CaptureError::Artifact(e.to_string()))?;

        Ok(PageArtifacts {
            screenshot,
            source,
            page_title,
            final_url,
        })
    }

    async fn fetch_headers(&self, url: &str) -> Option<(u16, Vec<(String, String)>)> {
        match self.http.get(url).send().await {
            Ok(response) => {
                let headers = response
                    .headers()
                    .iter()
                    .map(|(name, value)| {
                        (
                            name.as_str().to_string(),
                            value.to_str().unwrap_or("<binary>").to_string(),
                        )
                    })
                    .collect();
                Some((response.status().as_u16(), headers))
            }
            Err(e) => {
                debug!("Header fetch for {} failed: {}", url, e);
                None
            }
        }
    }
}

#[async_trait]
impl Capturer for ChromeCapturer {
    async fn capture(&self, target: &str, limit: Duration) -> OutcomeRecord {
        let start = Instant::now();
        let url = normalize_target(target);
        let stem = self.stems.claim(&url);
        let budget = CaptureBudget::new(limit);

        let (page, headers) = tokio::join!(
            self.capture_page(&url, &stem, &budget),
            self.fetch_headers(&url)
        );

        let mut record = match page {
            Ok(artifacts) => {
                let mut record = OutcomeRecord::captured(target, url.as_str());
                record.screenshot = Some(artifacts.screenshot);
                record.source = Some(artifacts.source);
                record.page_title = artifacts.page_title;
                record.final_url = artifacts.final_url;
                record
            }
            Err(e) => OutcomeRecord::failed(target, url.as_str(), e),
        };

        if let Some((status, headers)) = headers {
            record.http_status = Some(status);
            record.headers = headers;
        }
        record.duration = start.elapsed();
        record
    }
}

/// One deadline shared by every browser step of a capture.
#[derive(Debug, Clone, Copy)]
pub struct CaptureBudget {
    limit: Duration,
    deadline: Deadline,
}

impl CaptureBudget {
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            deadline: Deadline::now() + limit,
        }
    }

    /// Run `step` with whatever is left of the budget. Running out reports
    /// the full limit, not the remainder.
    pub async fn run<T, F>(&self, step: F) -> Result<T, CaptureError>
    where
        F: Future<Output = Result<T, CaptureError>>,
    {
        tokio::time::timeout_at(self.deadline, step)
            .await
            .map_err(|_| CaptureError::Timeout(self.limit))?
    }
}

/// Hands out artifact stems that are unique within one run.
#[derive(Debug, Default)]
pub struct ArtifactNamer {
    stems: DashMap<String, usize>,
}

impl ArtifactNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stem for `url`; a repeated stem gets a `-N` suffix.
    pub fn claim(&self, url: &str) -> String {
        let stem = artifact_stem(url);
        let mut count = self.stems.entry(stem.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            stem
        } else {
            format!("{}-{}", stem, *count)
        }
    }
}

const CHROME_NAMES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

const CHROME_INSTALL_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/usr/bin/google-chrome",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/usr/sbin/chromium",
    "/snap/bin/chromium",
];

/// Find the browser executable.
///
/// An explicit path wins and must exist. Otherwise `CHROME_PATH`, then
/// well-known install locations, then `PATH` are searched.
pub fn locate_chrome(explicit: Option<&Path>) -> Result<PathBuf, ReconError> {
    if let Some(path) = explicit {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(ReconError::ConfigurationError(format!(
                "Chrome executable {} does not exist",
                path.display()
            )))
        };
    }

    let from_env = std::env::var_os("CHROME_PATH").map(PathBuf::from);
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    find_chrome(from_env, CHROME_INSTALL_PATHS, &path_var).ok_or(ReconError::BrowserNotFound)
}

fn find_chrome(
    from_env: Option<PathBuf>,
    install_paths: &[&str],
    path_var: &std::ffi::OsStr,
) -> Option<PathBuf> {
    if let Some(path) = from_env.filter(|p| p.is_file()) {
        return Some(path);
    }

    if let Some(path) = install_paths
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
    {
        return Some(path);
    }

    std::env::split_paths(path_var).find_map(|dir| {
        CHROME_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}
