//! Sweep scheduler.
//!
//! Polls every configured source in order, then sleeps `poll_interval`.
//! A refresh signal cuts the sleep short. Only a revoked fetching identity
//! ends the loop with an error, whether a source reports it or the revocation
//! flag is raised. Every other per-source failure is logged and retried on
//! the next sweep.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{error, info, warn};

use crate::error::PollError;
use crate::poller::source_poller::SourcePoller;

/// Raise the shutdown flag and wake a sleeping scheduler.
pub fn request_shutdown(shutdown: &AtomicBool, refresh: &Notify) {
    shutdown.store(true, Ordering::SeqCst);
    refresh.notify_one();
}

/// Drives a `SourcePoller` over all sources on a fixed interval.
pub struct Scheduler {
    poller: SourcePoller,
    sources: Vec<String>,
    interval: Duration,
    refresh: Arc<Notify>,
    shutdown: Arc<AtomicBool>,
    revoked: Option<Arc<AtomicBool>>,
}

impl Scheduler {
    pub fn new(
        poller: SourcePoller,
        sources: Vec<String>,
        interval: Duration,
        refresh: Arc<Notify>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            poller,
            sources,
            interval,
            refresh,
            shutdown,
            revoked: None,
        }
    }

    /// Stop with `PollError::IdentityRevoked` once `revoked` is raised.
    pub fn with_revoked_flag(mut self, revoked: Arc<AtomicBool>) -> Self {
        self.revoked = Some(revoked);
        self
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn check_revoked(&self) -> Result<(), PollError> {
        match &self.revoked {
            Some(flag) if flag.load(Ordering::SeqCst) => {
                error!("Fetching identity revoked; stopping scheduler");
                Err(PollError::IdentityRevoked {
                    reason: "bot token rejected".into(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Run sweeps until shutdown or a fatal identity error.
    pub async fn run(&self) -> Result<(), PollError> {
        info!(
            sources = self.sources.len(),
            interval_secs = self.interval.as_secs(),
            "Scheduler started"
        );

        while !self.is_shutdown() {
            self.check_revoked()?;
            self.run_sweep().await?;
            if self.is_shutdown() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.refresh.notified() => {
                    if !self.is_shutdown() {
                        info!("Refresh requested; polling now");
                    }
                }
            }
        }

        info!("Scheduler stopped");
        Ok(())
    }

    /// One pass over every source. Returns how many sources completed.
    pub async fn run_sweep(&self) -> Result<usize, PollError> {
        let mut completed = 0;
        for source in &self.sources {
            if self.is_shutdown() {
                break;
            }
            match self.poller.poll_source(source).await {
                Ok(_) => completed += 1,
                Err(e) if e.is_fatal() => {
                    error!(source = %source, reason = %e, "Fatal poll error; stopping scheduler");
                    return Err(e);
                }
                Err(e) => {
                    warn!(source = %source, reason = %e, "Source poll failed; retrying next sweep");
                }
            }
        }
        Ok(completed)
    }
}
