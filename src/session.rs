//! Run orchestration
//!
//! A [`RunSession`] owns one scan end to end: it starts the worker pool,
//! feeds it every target, and writes the report exactly once, either after
//! the pool has fully drained or, on interrupt, from whatever the store
//! holds at that moment.

use crate::{
    write_report, Capturer, Config, InterruptMonitor, OutcomeRecord, ProgressTracker, ReconError,
    ResultStore, Target, WorkerPool, REPORT_FILE_NAME,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug)]
pub enum RunOutcome {
    /// Every worker drained; the report holds one record per target.
    Completed {
        records: Vec<OutcomeRecord>,
        report: PathBuf,
    },
    /// The user interrupted; the report is a best-effort snapshot.
    Interrupted {
        records: Vec<OutcomeRecord>,
        report: PathBuf,
    },
}

impl RunOutcome {
    pub fn records(&self) -> &[OutcomeRecord] {
        match self {
            RunOutcome::Completed { records, .. } | RunOutcome::Interrupted { records, .. } => {
                records
            }
        }
    }

    pub fn report(&self) -> &Path {
        match self {
            RunOutcome::Completed { report, .. } | RunOutcome::Interrupted { report, .. } => report,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Completed { .. } => 0,
            RunOutcome::Interrupted { .. } => 1,
        }
    }
}

pub struct RunSession {
    config: Config,
    capturer: Arc<dyn Capturer>,
    store: ResultStore,
    output_dir: PathBuf,
}

impl RunSession {
    pub fn new(config: Config, capturer: Arc<dyn Capturer>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            capturer,
            store: ResultStore::new(),
            output_dir: output_dir.into(),
        }
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(REPORT_FILE_NAME)
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Capture every target and write the report.
    ///
    /// Targets are dispatched in order; completion order is arbitrary. The
    /// normal-path report is only written after every worker has consumed
    /// its sentinel and exited.
    pub async fn run(
        &self,
        targets: Vec<Target>,
        mut interrupt: InterruptMonitor,
    ) -> Result<RunOutcome, ReconError> {
        self.config.validate()?;

        let progress = Arc::new(ProgressTracker::new(targets.len()));
        let mut pool = WorkerPool::start(
            self.config.threads,
            self.capturer.clone(),
            self.store.clone(),
            self.config.capture_timeout(),
            progress.clone(),
        )?;

        for target in targets {
            pool.enqueue(target)?;
        }
        pool.close();

        let progress_logger = self
            .config
            .progress_interval
            .filter(|secs| *secs > 0)
            .map(|secs| spawn_progress_logger(progress.clone(), Duration::from_secs(secs)));

        let interrupted = tokio::select! {
            _ = pool.drain() => false,
            _ = interrupt.triggered() => true,
        };

        if let Some(logger) = progress_logger {
            logger.abort();
        }

        let report = self.report_path();
        if interrupted {
            // In-flight captures are cancelled, not awaited.
            pool.abort().await;
            let records = self.store.snapshot().await;
            warn!(
                "Interrupted with {} of {} targets recorded",
                records.len(),
                pool.dispatched()
            );
            write_report(&records, &report).await?;
            return Ok(RunOutcome::Interrupted { records, report });
        }

        let records = self.store.snapshot().await;
        info!(
            "Scan finished: {} targets, {} records",
            pool.dispatched(),
            records.len()
        );
        write_report(&records, &report).await?;
        Ok(RunOutcome::Completed { records, report })
    }
}

fn spawn_progress_logger(tracker: Arc<ProgressTracker>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;

        while !tracker.is_complete() {
            interval.tick().await;
            let progress = tracker.get_progress();
            info!(
                "Progress: {}/{} - captured: {}, failed: {}, rate: {:.1}/s, ETA: {:?}",
                progress.completed,
                progress.total,
                progress.success,
                progress.errors,
                progress.rate,
                progress.eta
            );
        }
    })
}
