//! Scheduler loop: periodically delivers due notifications.
//!
//! One cycle = one `process_due_notifications` call followed by a sleep of the
//! configured interval. Cycles never overlap: the sleep starts only after the
//! previous cycle has fully completed.
//!
//! Each cycle runs in its own task, so an error *or a panic* inside it is
//! logged and the loop carries on. The stop signal (a `watch` channel) is
//! observed between cycles and during the sleep; a running cycle is never
//! interrupted.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::service::NotificationService;

/// Default delay between cycles (5 minutes).
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Stopped,
}

/// Background delivery loop.
pub struct SchedulerLoop {
    service: NotificationService,
    interval: Duration,
}

impl SchedulerLoop {
    pub fn new(service: NotificationService, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Spawn the loop on the tokio runtime.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(SchedulerState::Running);

        let task = tokio::spawn(async move {
            self.run(shutdown_rx).await;
            // Receiver may be gone if the handle was dropped.
            let _ = state_tx.send(SchedulerState::Stopped);
        });

        SchedulerHandle {
            shutdown_tx,
            state_rx,
            task,
        }
    }

    /// Run cycles until `shutdown` becomes `true` (or its sender is dropped).
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Notification scheduler started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.run_cycle().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Notification scheduler stopped");
    }

    /// Execute one cycle, containing every failure.
    pub async fn run_cycle(&self) {
        let service = self.service.clone();
        let cycle = tokio::spawn(async move { service.process_due_notifications().await });

        match cycle.await {
            Ok(Ok(report)) if report.is_idle() => {
                tracing::debug!("No due notifications");
            }
            Ok(Ok(report)) if report.has_failures() => {
                tracing::warn!(
                    attempted = report.attempted,
                    succeeded = report.succeeded,
                    failed = report.failed,
                    skipped = report.skipped,
                    "Notification cycle finished with failures"
                );
            }
            Ok(Ok(report)) => {
                tracing::info!(
                    attempted = report.attempted,
                    succeeded = report.succeeded,
                    skipped = report.skipped,
                    "Notification cycle finished"
                );
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Notification cycle failed");
            }
            Err(e) => {
                tracing::error!(error = %e, "Notification cycle aborted");
            }
        }
    }
}

/// Handle to a spawned scheduler.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<SchedulerState>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn state(&self) -> SchedulerState {
        *self.state_rx.borrow()
    }

    /// Signal the loop to stop and wait for it to exit.
    pub async fn shutdown(mut self) -> SchedulerState {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = (&mut self.task).await {
            tracing::error!(error = %e, "Notification scheduler task failed");
        }
        *self.state_rx.borrow()
    }
}
