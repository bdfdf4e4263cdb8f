//! # peepshot
//!
//! A reconnaissance aid that screenshots every web target of a scan and
//! collects the results into a single static HTML report.
//!
//! Targets come from an nmap XML export, a directory of exports, a flat
//! list, or a single address. Each one is visited by a shared headless
//! Chromium; the screenshot, page source, title and response headers are
//! saved into a fresh output directory next to `peepshot.html`.
//!
//! ## Pipeline
//!
//! | Stage | Module | Notes |
//! |-------|--------|-------|
//! | Target intake | [`targets`] | XML / list / dir / single, deduplicated |
//! | Worker pool | [`worker`] | exactly `threads` workers, one sentinel each |
//! | Capture | [`capture`] | per-target timeout, failures become records |
//! | Result store | [`store`] | mutex-guarded, snapshot for reporting |
//! | Orchestration | [`session`] | drain join, then one report |
//! | Interrupt | [`interrupt`] | Ctrl-C writes a partial report and exits 1 |
//!
//! ## Library usage
//!
//! ```rust,no_run
//! use peepshot::{ChromeCapturer, Config, InterruptMonitor, RunSession, locate_chrome};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config { threads: 4, ..Default::default() };
//!     let chrome = locate_chrome(None)?;
//!     std::fs::create_dir("scan")?;
//!
//!     let capturer = Arc::new(ChromeCapturer::launch(&config, &chrome, "scan").await?);
//!     let session = RunSession::new(config, capturer, "scan");
//!     let outcome = session
//!         .run(vec!["https://example.com".to_string()], InterruptMonitor::install())
//!         .await?;
//!     println!("report: {}", outcome.report().display());
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! peepshot --xml scan.xml --threads 8
//! peepshot --list urls.txt --timeout 15 --output client-web
//! peepshot --url https://10.0.0.5:8443
//! ```

/// Run configuration
pub mod config;

/// Error types
pub mod error;

/// Target intake from scan exports and lists
pub mod targets;

/// Outcome records
pub mod record;

/// Shared result store
pub mod store;

/// Headless browser capture
pub mod capture;

/// Intake queue, workers and the worker pool
pub mod worker;

/// User interrupt handling
pub mod interrupt;

/// Run orchestration
pub mod session;

/// Output directory guard
pub mod output;

/// HTML report
pub mod report;

/// Command-line interface implementation
pub mod cli;

/// Capture metrics
pub mod metrics;

/// Utility functions and helpers
pub mod utils;

#[cfg(test)]
mod tests;

pub use capture::*;
pub use cli::*;
pub use config::*;
pub use error::*;
pub use interrupt::*;
pub use metrics::*;
pub use output::*;
pub use record::*;
pub use report::*;
pub use session::*;
pub use store::*;
pub use targets::*;
pub use utils::*;
pub use worker::*;
