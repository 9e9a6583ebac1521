// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Graceful shutdown coordination.
//!
//! OS signals (SIGTERM, SIGINT) and in-process requests both end up in
//! [`ShutdownCoordinator::initiate_shutdown`]; the HTTP server and the
//! background purge task each hold a [`ShutdownSignal`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

// =============================================================================
// ShutdownCoordinator
// =============================================================================

/// Coordinates graceful shutdown across components.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    sender: broadcast::Sender<()>,
    shutdown_initiated: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    /// Creates a new shutdown coordinator.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            sender,
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns a signal that resolves once shutdown starts.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.sender.subscribe(),
            shutdown_initiated: self.shutdown_initiated.clone(),
        }
    }

    /// Initiates shutdown. Idempotent.
    pub fn initiate_shutdown(&self) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("Shutdown initiated");
            let _ = self.sender.send(());
        }
    }

    /// Returns true if shutdown has been initiated.
    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Waits for SIGTERM/SIGINT (Ctrl+C elsewhere), then initiates shutdown.
    /// Returns early if shutdown was initiated in-process.
    pub async fn listen_for_signals(&self) {
        let in_process = self.shutdown_signal();

        tokio::select! {
            _ = os_signal() => {}
            _ = in_process.wait() => return,
        }

        self.initiate_shutdown();
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn os_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM"),
                _ = sigint.recv() => info!("Received SIGINT"),
            }
        }
        _ => {
            warn!("Failed to register signal handlers, falling back to Ctrl+C");
            ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn os_signal() {
    ctrl_c().await;
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C"),
        Err(e) => {
            warn!(error = %e, "Ctrl+C handler unavailable; waiting indefinitely");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// ShutdownSignal
// =============================================================================

/// Resolves when shutdown is signaled.
pub struct ShutdownSignal {
    receiver: broadcast::Receiver<()>,
    shutdown_initiated: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Waits for the shutdown signal.
    pub async fn wait(mut self) {
        if self.shutdown_initiated.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.receiver.recv().await;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_signal() {
        let coordinator = ShutdownCoordinator::new();
        let signal = coordinator.shutdown_signal();

        let clone = coordinator.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            clone.initiate_shutdown();
        });

        tokio::time::timeout(Duration::from_secs(1), signal.wait())
            .await
            .expect("shutdown signal should resolve");
        assert!(coordinator.is_shutdown_initiated());
    }

    #[tokio::test]
    async fn test_signal_after_shutdown_resolves_immediately() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.initiate_shutdown();
        coordinator.initiate_shutdown();

        tokio::time::timeout(Duration::from_millis(100), coordinator.shutdown_signal().wait())
            .await
            .expect("late subscriber should not hang");
    }

    #[tokio::test]
    async fn test_listener_returns_on_in_process_shutdown() {
        let coordinator = ShutdownCoordinator::new();
        let listener = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.listen_for_signals().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        coordinator.initiate_shutdown();
        tokio::time::timeout(Duration::from_secs(1), listener)
            .await
            .expect("listener should stop")
            .unwrap();
    }
}
