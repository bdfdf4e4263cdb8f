#[cfg(test)]
mod session_tests {
    use crate::{
        normalize_target, CaptureError, Capturer, Config, InterruptMonitor, MockCapturer,
        OutcomeRecord, PoolState, ProgressTracker, ReconError, ResultStore, RunOutcome,
        RunSession, WorkerPool,
    };
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::oneshot;

    /// Capturer whose behaviour is scripted per target.
    #[derive(Default)]
    struct ScriptedCapturer {
        delay: Duration,
        fail: HashSet<String>,
        hang: HashSet<String>,
        panic_on: HashSet<String>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedCapturer {
        fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl Capturer for ScriptedCapturer {
        async fn capture(&self, target: &str, timeout: Duration) -> OutcomeRecord {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if self.panic_on.contains(target) {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                panic!("browser crashed on {target}");
            }
            if self.hang.contains(target) {
                std::future::pending::<()>().await;
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.fail.contains(target) {
                OutcomeRecord::failed(target, normalize_target(target), CaptureError::Timeout(timeout))
            } else {
                OutcomeRecord::captured(target, normalize_target(target))
            }
        }
    }

    fn config(threads: usize) -> Config {
        Config {
            threads,
            ..Default::default()
        }
    }

    fn targets(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn record_targets(outcome: &RunOutcome) -> Vec<String> {
        let mut seen: Vec<String> = outcome.records().iter().map(|r| r.target.clone()).collect();
        seen.sort();
        seen
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_three_targets_two_workers() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockCapturer::new();
        mock.expect_capture()
            .times(3)
            .returning(|target, _| OutcomeRecord::captured(target, normalize_target(target)));

        let session = RunSession::new(config(2), Arc::new(mock), dir.path());
        let outcome = session
            .run(targets(&["a.test", "b.test", "c.test"]), InterruptMonitor::disabled())
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::Completed { .. }));
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(record_targets(&outcome), vec!["a.test", "b.test", "c.test"]);

        let html = std::fs::read_to_string(outcome.report()).unwrap();
        assert!(html.contains("3 targets: 3 captured, 0 failed"));
        for name in ["a.test", "b.test", "c.test"] {
            assert!(html.contains(&format!(">{name}<")));
        }
    }

    #[tokio::test]
    async fn test_zero_targets_writes_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockCapturer::new();
        mock.expect_capture().never();

        let session = RunSession::new(config(1), Arc::new(mock), dir.path());
        let outcome = session
            .run(Vec::new(), InterruptMonitor::disabled())
            .await
            .unwrap();

        assert_eq!(outcome.exit_code(), 0);
        assert!(outcome.records().is_empty());
        let html = std::fs::read_to_string(dir.path().join("peepshot.html")).unwrap();
        assert!(html.contains("<section id=\"results\">"));
        assert!(html.contains("No targets were captured."));
    }

    #[tokio::test]
    async fn test_timeout_is_passed_to_capturer() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockCapturer::new();
        mock.expect_capture()
            .withf(|target, timeout| target == "a.test" && *timeout == Duration::from_secs(13))
            .times(1)
            .returning(|target, _| OutcomeRecord::captured(target, normalize_target(target)));

        let config = Config {
            timeout_secs: 13,
            ..Default::default()
        };
        let session = RunSession::new(config, Arc::new(mock), dir.path());
        session
            .run(targets(&["a.test"]), InterruptMonitor::disabled())
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_every_target_recorded_for_any_worker_count() {
        let names: Vec<String> = (0..25).map(|i| format!("host{i}.test")).collect();

        for threads in [1, 2, 4, 8] {
            let dir = tempfile::tempdir().unwrap();
            let capturer = Arc::new(ScriptedCapturer::with_delay(Duration::from_millis(2)));
            let session = RunSession::new(config(threads), capturer.clone(), dir.path());

            let outcome = session
                .run(names.clone(), InterruptMonitor::disabled())
                .await
                .unwrap();

            let recorded = record_targets(&outcome);
            let unique: HashSet<&String> = recorded.iter().collect();
            assert_eq!(recorded.len(), names.len(), "threads={threads}");
            assert_eq!(unique.len(), names.len(), "threads={threads}");
            assert!(recorded.iter().all(|t| names.contains(t)));
            assert_eq!(capturer.calls.load(Ordering::SeqCst), names.len());
            assert!(outcome.records().iter().all(|r| r.worker_id < threads));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_bounded_by_worker_count() {
        let dir = tempfile::tempdir().unwrap();
        let capturer = Arc::new(ScriptedCapturer::with_delay(Duration::from_millis(20)));
        let names: Vec<String> = (0..12).map(|i| format!("10.0.0.{i}")).collect();

        let session = RunSession::new(config(3), capturer.clone(), dir.path());
        session
            .run(names, InterruptMonitor::disabled())
            .await
            .unwrap();

        assert!(capturer.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_failed_captures_still_produce_records() {
        let dir = tempfile::tempdir().unwrap();
        let capturer = ScriptedCapturer {
            fail: ["b.test".to_string()].into_iter().collect(),
            ..Default::default()
        };

        let session = RunSession::new(config(2), Arc::new(capturer), dir.path());
        let outcome = session
            .run(targets(&["a.test", "b.test"]), InterruptMonitor::disabled())
            .await
            .unwrap();

        assert_eq!(outcome.records().len(), 2);
        let failed = outcome
            .records()
            .iter()
            .find(|r| r.target == "b.test")
            .unwrap();
        assert!(matches!(failed.error(), Some(CaptureError::Timeout(_))));

        let html = std::fs::read_to_string(outcome.report()).unwrap();
        assert!(html.contains("2 targets: 1 captured, 1 failed"));
    }

    #[tokio::test]
    async fn test_panicking_capture_does_not_kill_worker() {
        let dir = tempfile::tempdir().unwrap();
        let capturer = ScriptedCapturer {
            panic_on: ["b.test".to_string()].into_iter().collect(),
            ..Default::default()
        };

        // A single worker must survive the panic to capture c.test.
        let session = RunSession::new(config(1), Arc::new(capturer), dir.path());
        let outcome = session
            .run(targets(&["a.test", "b.test", "c.test"]), InterruptMonitor::disabled())
            .await
            .unwrap();

        assert_eq!(record_targets(&outcome), vec!["a.test", "b.test", "c.test"]);
        let crashed = outcome
            .records()
            .iter()
            .find(|r| r.target == "b.test")
            .unwrap();
        assert!(matches!(crashed.error(), Some(CaptureError::Browser(_))));
        assert_eq!(crashed.url, "http://b.test");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_interrupt_writes_partial_report() {
        let dir = tempfile::tempdir().unwrap();
        let capturer = ScriptedCapturer {
            hang: ["stuck.test".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let session = RunSession::new(config(1), Arc::new(capturer), dir.path());

        let (tx, rx) = oneshot::channel::<()>();
        let monitor = InterruptMonitor::from_future(async move {
            let _ = rx.await;
        });

        let trigger = async {
            while session.store().len().await < 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            tx.send(()).unwrap();
        };

        let (outcome, _) = tokio::join!(
            session.run(targets(&["a.test", "stuck.test", "c.test"]), monitor),
            trigger
        );
        let outcome = outcome.unwrap();

        assert!(matches!(outcome, RunOutcome::Interrupted { .. }));
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(record_targets(&outcome), vec!["a.test"]);

        let html = std::fs::read_to_string(outcome.report()).unwrap();
        assert!(html.contains(">a.test<"));
        assert!(!html.contains(">c.test<"));
    }

    #[tokio::test]
    async fn test_zero_threads_rejected_before_any_capture() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockCapturer::new();
        mock.expect_capture().never();

        let session = RunSession::new(config(0), Arc::new(mock), dir.path());
        let err = session
            .run(targets(&["a.test"]), InterruptMonitor::disabled())
            .await
            .unwrap_err();

        assert!(err.is_configuration());
        assert!(!dir.path().join("peepshot.html").exists());
    }

    #[tokio::test]
    async fn test_pool_lifecycle() {
        let store = ResultStore::new();
        let capturer = Arc::new(ScriptedCapturer::default());
        let mut pool = WorkerPool::start(
            2,
            capturer,
            store.clone(),
            Duration::from_secs(8),
            Arc::new(ProgressTracker::new(2)),
        )
        .unwrap();

        assert_eq!(pool.state(), PoolState::Running);
        assert_eq!(pool.worker_count(), 2);

        pool.enqueue("a.test".to_string()).unwrap();
        pool.enqueue("b.test".to_string()).unwrap();
        pool.close();
        assert_eq!(pool.state(), PoolState::Draining);
        assert!(matches!(
            pool.enqueue("late.test".to_string()),
            Err(ReconError::ConfigurationError(_))
        ));

        pool.drain().await;
        assert_eq!(pool.state(), PoolState::Stopped);
        assert_eq!(pool.dispatched(), 2);
        assert_eq!(pool.total_processed(), 2);
        assert_eq!(pool.total_errors(), 0);
        assert_eq!(pool.active_workers(), 0);
        assert_eq!(store.len().await, 2);
        assert_eq!(pool.get_worker_stats().len(), 2);
    }

    #[tokio::test]
    async fn test_pool_rejects_zero_workers() {
        let result = WorkerPool::start(
            0,
            Arc::new(ScriptedCapturer::default()),
            ResultStore::new(),
            Duration::from_secs(8),
            Arc::new(ProgressTracker::new(0)),
        );
        assert!(matches!(result, Err(ReconError::ConfigurationError(_))));
    }
}
