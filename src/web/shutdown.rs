//! Graceful shutdown for the web server
//!
//! The first termination signal stops the accept loop and starts the grace
//! period. In-flight conversions may finish during the grace period; once it
//! elapses an immediate shutdown is broadcast and every running subprocess is
//! killed. A second termination signal exits the process right away.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::exit_codes;

/// Default grace period after the first termination signal
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// How long killed requests get to release their subprocess on hard exit
const HARD_EXIT_REAP: Duration = Duration::from_millis(500);

/// Shutdown configuration
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Time in-flight requests get to complete
    pub grace_period: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

impl ShutdownConfig {
    /// Create config with custom grace period
    pub fn with_grace_period(grace_period: Duration) -> Self {
        Self { grace_period }
    }
}

/// Shutdown result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownResult {
    /// Every in-flight request completed
    Success,
    /// Grace period elapsed, remaining requests were aborted
    Timeout { pending_requests: usize },
}

impl ShutdownResult {
    /// Check if shutdown was clean
    pub fn is_success(&self) -> bool {
        matches!(self, ShutdownResult::Success)
    }

    /// Get the number of aborted requests if timed out
    pub fn pending_requests(&self) -> Option<usize> {
        match self {
            ShutdownResult::Timeout { pending_requests } => Some(*pending_requests),
            ShutdownResult::Success => None,
        }
    }
}

/// Shutdown signal types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Stop accepting, let in-flight requests finish
    Graceful,
    /// Kill in-flight subprocesses
    Immediate,
}

/// Shutdown coordinator shared by the accept loop and every request
#[derive(Clone)]
pub struct ShutdownCoordinator {
    config: ShutdownConfig,
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
    is_shutting_down: Arc<AtomicBool>,
    is_immediate: Arc<AtomicBool>,
    in_flight: Arc<AtomicUsize>,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator
    pub fn new(config: ShutdownConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);
        Self {
            config,
            shutdown_tx,
            is_shutting_down: Arc::new(AtomicBool::new(false)),
            is_immediate: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get the shutdown configuration
    pub fn config(&self) -> &ShutdownConfig {
        &self.config
    }

    /// Get the grace period
    pub fn grace_period(&self) -> Duration {
        self.config.grace_period
    }

    /// Trigger graceful shutdown
    pub fn trigger_shutdown(&self) {
        self.is_shutting_down.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(ShutdownSignal::Graceful);
    }

    /// Trigger immediate shutdown
    pub fn trigger_immediate(&self) {
        self.is_shutting_down.store(true, Ordering::SeqCst);
        self.is_immediate.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(ShutdownSignal::Immediate);
    }

    /// Check if shutdown is in progress
    pub fn is_shutting_down(&self) -> bool {
        self.is_shutting_down.load(Ordering::SeqCst)
    }

    /// Check if in-flight work must be aborted
    pub fn is_immediate(&self) -> bool {
        self.is_immediate.load(Ordering::SeqCst)
    }

    /// Subscribe to shutdown signals
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownSignal> {
        self.shutdown_tx.subscribe()
    }

    /// Resolves once any shutdown has been triggered
    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.subscribe();
        if self.is_shutting_down() {
            return;
        }
        loop {
            match rx.recv().await {
                Ok(_) => return,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => std::future::pending::<()>().await,
            }
        }
    }

    /// Resolves once an immediate shutdown has been triggered
    pub async fn wait_for_immediate(&self) {
        let mut rx = self.subscribe();
        if self.is_immediate() {
            return;
        }
        loop {
            match rx.recv().await {
                Ok(ShutdownSignal::Immediate) => return,
                Ok(ShutdownSignal::Graceful) | Err(broadcast::error::RecvError::Lagged(_)) => {
                    if self.is_immediate() {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => std::future::pending::<()>().await,
            }
        }
    }

    /// Mark a request as in flight until the guard is dropped
    pub fn track(&self) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            in_flight: self.in_flight.clone(),
        }
    }

    /// Number of requests currently in flight
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight counter on drop
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Returns when SIGINT or SIGTERM is received
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Translate process signals into coordinator triggers.
///
/// The first signal starts a graceful shutdown, the second one exits the
/// process immediately.
pub fn spawn_signal_watcher(coordinator: ShutdownCoordinator) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        warn!(
            grace_period = ?coordinator.grace_period(),
            "shutdown signal received; starting graceful shutdown"
        );
        coordinator.trigger_shutdown();

        wait_for_shutdown_signal().await;
        warn!("second shutdown signal received; exiting immediately");
        coordinator.trigger_immediate();
        // process::exit skips destructors, so let the handlers kill their children first
        let _ = tokio::time::timeout(HARD_EXIT_REAP, async {
            while coordinator.in_flight() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        std::process::exit(exit_codes::GENERAL_ERROR);
    })
}

/// Wait for the server future to finish within the grace period.
///
/// When the grace period elapses, an immediate shutdown is broadcast so that
/// in-flight subprocesses are killed, and `abort_drain` bounds how long the
/// aborted requests get to answer and clean up.
pub async fn drain<F>(
    coordinator: &ShutdownCoordinator,
    server: F,
    abort_drain: Duration,
) -> std::io::Result<ShutdownResult>
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    tokio::pin!(server);

    match tokio::time::timeout(coordinator.grace_period(), &mut server).await {
        Ok(result) => {
            result?;
            info!("all requests completed");
            Ok(ShutdownResult::Success)
        }
        Err(_) => {
            let pending_requests = coordinator.in_flight();
            warn!(pending_requests, "grace period elapsed; aborting in-flight conversions");
            coordinator.trigger_immediate();
            let _ = tokio::time::timeout(abort_drain, &mut server).await;
            Ok(ShutdownResult::Timeout { pending_requests })
        }
    }
}
