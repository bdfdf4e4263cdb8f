use crate::{CaptureError, Capturer, OutcomeRecord, ReconError, ResultStore, ScanMetrics, Target};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

/// One entry of the intake queue.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkItem {
    Target(Target),
    /// Sentinel: the worker that receives it exits its loop.
    Stop,
}

type SharedReceiver = Arc<Mutex<mpsc::UnboundedReceiver<WorkItem>>>;

pub struct ScanWorker {
    id: usize,
    capturer: Arc<dyn Capturer>,
    store: ResultStore,
    timeout: Duration,
    metrics: ScanMetrics,
    progress: Arc<ProgressTracker>,
    is_running: Arc<AtomicBool>,
    processed_count: Arc<AtomicUsize>,
    error_count: Arc<AtomicUsize>,
}

impl ScanWorker {
    pub fn new(
        id: usize,
        capturer: Arc<dyn Capturer>,
        store: ResultStore,
        timeout: Duration,
        progress: Arc<ProgressTracker>,
    ) -> Self {
        Self {
            id,
            capturer,
            store,
            timeout,
            metrics: ScanMetrics::new(),
            progress,
            is_running: Arc::new(AtomicBool::new(false)),
            processed_count: Arc::new(AtomicUsize::new(0)),
            error_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Pull targets until a sentinel arrives or the queue is closed.
    pub async fn run(&self, requests: SharedReceiver) {
        debug!("Starting scan worker {}", self.id);
        self.is_running.store(true, Ordering::Relaxed);

        loop {
            // Only the dequeue happens under the lock; captures run unlocked.
            let item = {
                let mut receiver = requests.lock().await;
                receiver.recv().await
            };

            match item {
                Some(WorkItem::Target(target)) => {
                    let record = self.process_target(target).await;
                    self.store.append(record).await;
                }
                Some(WorkItem::Stop) | None => break,
            }
        }

        self.is_running.store(false, Ordering::Relaxed);
        debug!("Scan worker {} drained", self.id);
    }

    async fn process_target(&self, target: Target) -> OutcomeRecord {
        debug!("Worker {} capturing {}", self.id, target);

        // Run the capture as its own task so a panicking capturer costs
        // one record, not the worker.
        let capturer = self.capturer.clone();
        let timeout = self.timeout;
        let task_target = target.clone();
        let task = tokio::spawn(async move { capturer.capture(&task_target, timeout).await });
        // Aborting the worker drops this guard and takes the capture down too.
        let _guard = AbortOnDrop(task.abort_handle());
        let outcome = task.await;

        let mut record = match outcome {
            Ok(record) => record,
            Err(e) => {
                warn!("Worker {} capture of {} aborted: {}", self.id, target, e);
                OutcomeRecord::failed(
                    target.clone(),
                    crate::normalize_target(&target),
                    CaptureError::Browser(format!("capture task failed: {e}")),
                )
            }
        };
        record.worker_id = self.id;

        let success = record.is_success();
        self.metrics.record_capture(record.duration, record.error());
        self.progress.record_completion(success);

        if success {
            self.processed_count.fetch_add(1, Ordering::Relaxed);
            debug!("Worker {} captured {}", self.id, record.target);
        } else {
            self.error_count.fetch_add(1, Ordering::Relaxed);
            debug!(
                "Worker {} failed to capture {}: {:?}",
                self.id,
                record.target,
                record.error()
            );
        }

        record
    }

    pub fn get_stats(&self) -> WorkerStats {
        WorkerStats {
            id: self.id,
            is_running: self.is_running.load(Ordering::Relaxed),
            processed_count: self.processed_count.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
        }
    }
}

struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl Clone for ScanWorker {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            capturer: self.capturer.clone(),
            store: self.store.clone(),
            timeout: self.timeout,
            metrics: self.metrics.clone(),
            progress: self.progress.clone(),
            is_running: self.is_running.clone(),
            processed_count: self.processed_count.clone(),
            error_count: self.error_count.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerStats {
    pub id: usize,
    pub is_running: bool,
    pub processed_count: usize,
    pub error_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Running,
    Draining,
    Stopped,
}

/// Fixed-size set of workers fed from one intake queue.
///
/// Lifecycle: [`start`](Self::start) → [`enqueue`](Self::enqueue) each
/// target → [`close`](Self::close) → [`drain`](Self::drain). The pool is
/// only `Stopped` once every worker has consumed its sentinel and its task
/// has been joined.
pub struct WorkerPool {
    workers: Vec<ScanWorker>,
    handles: Vec<JoinHandle<()>>,
    request_sender: mpsc::UnboundedSender<WorkItem>,
    state: PoolState,
    dispatched: usize,
}

impl WorkerPool {
    pub fn start(
        worker_count: usize,
        capturer: Arc<dyn Capturer>,
        store: ResultStore,
        timeout: Duration,
        progress: Arc<ProgressTracker>,
    ) -> Result<Self, ReconError> {
        if worker_count == 0 {
            return Err(ReconError::ConfigurationError(
                "Worker pool needs at least one worker".to_string(),
            ));
        }

        let (request_sender, request_receiver) = mpsc::unbounded_channel();
        let shared_receiver = Arc::new(Mutex::new(request_receiver));

        let workers: Vec<ScanWorker> = (0..worker_count)
            .map(|id| {
                ScanWorker::new(
                    id,
                    capturer.clone(),
                    store.clone(),
                    timeout,
                    progress.clone(),
                )
            })
            .collect();

        let handles = workers
            .iter()
            .map(|worker| {
                let worker = worker.clone();
                let rx = shared_receiver.clone();
                tokio::spawn(async move { worker.run(rx).await })
            })
            .collect();

        info!("Started {} scan workers", worker_count);

        Ok(Self {
            workers,
            handles,
            request_sender,
            state: PoolState::Running,
            dispatched: 0,
        })
    }

    pub fn enqueue(&mut self, target: Target) -> Result<(), ReconError> {
        if self.state != PoolState::Running {
            return Err(ReconError::ConfigurationError(format!(
                "Cannot enqueue into a {:?} pool",
                self.state
            )));
        }

        self.request_sender
            .send(WorkItem::Target(target))
            .map_err(|e| ReconError::IoError(format!("intake queue closed: {e}")))?;
        self.dispatched += 1;
        Ok(())
    }

    /// Push one sentinel per worker. No targets are accepted afterwards.
    pub fn close(&mut self) {
        if self.state != PoolState::Running {
            return;
        }

        for _ in 0..self.workers.len() {
            // A send only fails once every worker has exited already.
            let _ = self.request_sender.send(WorkItem::Stop);
        }
        self.state = PoolState::Draining;
        debug!("Intake closed after {} targets", self.dispatched);
    }

    /// Wait for every worker to exit.
    pub async fn drain(&mut self) {
        self.close();

        // Handles stay in place until all are joined so that an abort after
        // a cancelled drain still reaches every worker.
        for handle in self.handles.iter_mut() {
            if let Err(e) = handle.await {
                warn!("Scan worker task ended abnormally: {}", e);
            }
        }
        self.handles.clear();
        self.state = PoolState::Stopped;
        info!(
            "Worker pool stopped: {} captured, {} failed",
            self.total_processed(),
            self.total_errors()
        );
    }

    /// Cancel every worker together with its in-flight capture.
    ///
    /// Returns once the worker tasks are gone; their captures are not
    /// awaited to completion.
    pub async fn abort(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
        for handle in self.handles.iter_mut() {
            match handle.await {
                Err(e) if !e.is_cancelled() => warn!("Scan worker task ended abnormally: {}", e),
                _ => {}
            }
        }
        self.handles.clear();
        for worker in &self.workers {
            worker.is_running.store(false, Ordering::Relaxed);
        }
        self.state = PoolState::Stopped;
    }

    pub fn state(&self) -> PoolState {
        self.state
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    pub fn get_worker_stats(&self) -> Vec<WorkerStats> {
        self.workers.iter().map(|w| w.get_stats()).collect()
    }

    pub fn total_processed(&self) -> usize {
        self.workers.iter().map(|w| w.get_stats().processed_count).sum()
    }

    pub fn total_errors(&self) -> usize {
        self.workers.iter().map(|w| w.get_stats().error_count).sum()
    }

    pub fn active_workers(&self) -> usize {
        self.workers.iter().filter(|w| w.get_stats().is_running).count()
    }
}

pub struct ProgressTracker {
    total: usize,
    completed: AtomicUsize,
    errors: AtomicUsize,
    start_time: std::time::Instant,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn record_completion(&self, success: bool) {
        self.completed.fetch_add(1, Ordering::Release);
        if !success {
            self.errors.fetch_add(1, Ordering::Release);
        }
    }

    pub fn get_progress(&self) -> ProgressInfo {
        // `completed` is bumped before `errors`, so reading `errors` first
        // keeps it at or below `completed`.
        let errors = self.errors.load(Ordering::Acquire);
        let completed = self.completed.load(Ordering::Acquire);
        let elapsed = self.start_time.elapsed();
        let rate = if elapsed.as_secs_f64() > 0.0 {
            completed as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        ProgressInfo {
            total: self.total,
            completed,
            errors,
            success: completed.saturating_sub(errors),
            elapsed,
            rate,
            eta: if completed > 0 && rate > 0.0 {
                let remaining = self.total.saturating_sub(completed);
                Some(Duration::from_secs_f64(remaining as f64 / rate))
            } else {
                None
            },
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed.load(Ordering::Relaxed) >= self.total
    }
}

#[derive(Debug, Clone)]
pub struct ProgressInfo {
    pub total: usize,
    pub completed: usize,
    pub errors: usize,
    pub success: usize,
    pub elapsed: Duration,
    pub rate: f64,
    pub eta: Option<Duration>,
}
