use std::future::Future;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// Listens for the user's interrupt for the lifetime of one run.
///
/// The signal is subscribed once, when the monitor is created, and never
/// re-armed. [`triggered`](Self::triggered) resolves at most once.
pub struct InterruptMonitor {
    receiver: Option<oneshot::Receiver<()>>,
    listener: Option<JoinHandle<()>>,
}

impl InterruptMonitor {
    /// Subscribe to Ctrl-C.
    pub fn install() -> Self {
        Self::from_future(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for interrupt: {}", e);
                std::future::pending::<()>().await;
            }
        })
    }

    /// Trigger when `signal` completes.
    pub fn from_future<F>(signal: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let listener = tokio::spawn(async move {
            signal.await;
            warn!("Captured interrupt, stopping scanner");
            let _ = sender.send(());
        });

        Self {
            receiver: Some(receiver),
            listener: Some(listener),
        }
    }

    /// A monitor that never fires.
    pub fn disabled() -> Self {
        Self {
            receiver: None,
            listener: None,
        }
    }

    /// Resolves when the interrupt arrives; pends forever otherwise.
    pub async fn triggered(&mut self) {
        match self.receiver.as_mut() {
            Some(receiver) => {
                if receiver.await.is_ok() {
                    self.receiver = None;
                    return;
                }
                // Listener went away without firing.
                self.receiver = None;
                std::future::pending::<()>().await
            }
            None => std::future::pending::<()>().await,
        }
    }
}

impl Drop for InterruptMonitor {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}
