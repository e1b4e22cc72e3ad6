//! Active-Set Poller.
//!
//! Refreshes the status of every non-terminal meeting on a fixed period.
//! The timer only exists while the active set is non-empty: it is dropped
//! when the last meeting goes terminal and re-armed by the next store change
//! that brings an active meeting back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::bounded;
use super::store::MeetingStore;

/// Outcome counts of one poll cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub polled: usize,
    pub applied: usize,
    pub stale: usize,
    pub failed: usize,
}

enum FetchOutcome {
    Applied,
    Stale,
    Failed,
}

#[derive(Clone)]
pub struct ActiveSetPoller {
    store: MeetingStore,
    interval: Duration,
    armed: Arc<AtomicBool>,
}

impl ActiveSetPoller {
    pub fn new(store: MeetingStore, interval: Duration) -> Self {
        Self {
            store,
            interval,
            armed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the recurring timer is currently running.
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Fetch the status of every active meeting once.
    ///
    /// Fetches run concurrently, each bounded by the store's request timeout.
    /// A failed fetch is logged and skipped; the meeting stays active so the
    /// next tick retries it.
    pub async fn tick(&self) -> TickReport {
        let active = self.store.active().await;
        let mut report = TickReport {
            polled: active.len(),
            ..TickReport::default()
        };

        let mut fetches = JoinSet::new();
        for meeting in active {
            let ticket = self.store.begin_status_fetch(&meeting.id).await;
            let store = self.store.clone();
            fetches.spawn(async move {
                let api = store.api();
                match bounded(
                    "get meeting status",
                    store.request_timeout(),
                    api.get_meeting(&ticket.id),
                )
                .await
                {
                    Ok(fresh) => {
                        if store.apply_status(&ticket, fresh).await {
                            FetchOutcome::Applied
                        } else {
                            FetchOutcome::Stale
                        }
                    }
                    Err(e) => {
                        warn!("Error updating meeting {}: {}", ticket.id, e);
                        FetchOutcome::Failed
                    }
                }
            });
        }

        while let Some(joined) = fetches.join_next().await {
            match joined {
                Ok(FetchOutcome::Applied) => report.applied += 1,
                Ok(FetchOutcome::Stale) => report.stale += 1,
                Ok(FetchOutcome::Failed) => report.failed += 1,
                Err(e) => {
                    warn!("Status fetch task ended abnormally: {}", e);
                    report.failed += 1;
                }
            }
        }

        debug!("Poll tick finished: {:?}", report);
        report
    }

    /// Drive the poll cycle until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut changes = self.store.subscribe();

        loop {
            if self.store.active().await.is_empty() {
                debug!("No active meetings, polling paused");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        continue;
                    }
                }
            }

            if !self.poll_until_idle(&cancel).await {
                break;
            }
        }

        self.armed.store(false, Ordering::SeqCst);
        debug!("Poller stopped");
    }

    /// Tick until the active set empties (`true`) or `cancel` fires (`false`).
    async fn poll_until_idle(&self, cancel: &CancellationToken) -> bool {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.armed.store(true, Ordering::SeqCst);
        info!(
            "Polling active meetings every {}s",
            self.interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = self.tick() => {}
            }

            if self.store.active().await.is_empty() {
                self.armed.store(false, Ordering::SeqCst);
                info!("All meetings finished, polling stopped");
                return true;
            }
        }
    }

    pub fn spawn(&self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.clone().run(cancel))
    }
}
