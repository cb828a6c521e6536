//! Refresh scheduler.
//!
//! Runs a refresh pass on startup and then every `refreshIntervalSecs`, or
//! sooner when woken by a manual request. At most one pass runs at a time;
//! triggers that arrive while a pass is in flight collapse into a single
//! follow-up pass that starts as soon as the current one finishes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::ScoringError;
use crate::refresh::{self, RefreshSummary};
use crate::state::AppState;

/// Single-flight guard with a coalescing follow-up flag.
#[derive(Debug, Default)]
pub struct RefreshGuard {
    running: AtomicBool,
    pending: AtomicBool,
}

impl RefreshGuard {
    /// Take the guard, or leave a follow-up request for the holder.
    fn try_enter(&self) -> bool {
        loop {
            if self
                .running
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.pending.store(false, Ordering::Release);
                return true;
            }
            self.pending.store(true, Ordering::Release);
            if self.running.load(Ordering::Acquire) {
                return false;
            }
            // The holder released between our two checks; try again
        }
    }

    /// Called by the holder after a pass. Returns true when a follow-up pass
    /// was requested, in which case the caller still holds the guard.
    fn finish(&self) -> bool {
        loop {
            if self.pending.swap(false, Ordering::AcqRel) {
                return true;
            }
            self.running.store(false, Ordering::Release);

            // A trigger may have landed after the swap but before the release
            if !self.pending.load(Ordering::Acquire) {
                return false;
            }
            if self
                .running
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return false;
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Completed(RefreshSummary),
    /// A pass was already running; one follow-up pass will run after it.
    Coalesced,
}

pub struct RefreshScheduler {
    state: Arc<AppState>,
}

impl RefreshScheduler {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Loop forever: pass, then sleep until the interval elapses or a wake.
    pub async fn run(self) {
        let interval = Duration::from_secs(self.state.settings.refresh_interval_secs);
        log::info!(
            "Scheduler: refreshing every {}s",
            self.state.settings.refresh_interval_secs
        );

        loop {
            if let Err(e) = self.refresh_now().await {
                log::error!("Scheduler: refresh pass failed: {}", e);
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {},
                _ = self.state.refresh_wake.notified() => {
                    log::info!("Scheduler: woken by manual refresh request");
                },
            }
        }
    }

    /// Ask the loop for an immediate pass without waiting for it.
    pub fn request_refresh(&self) {
        request_refresh(&self.state);
    }

    pub async fn refresh_now(&self) -> Result<RefreshOutcome, ScoringError> {
        refresh_now(&self.state).await
    }
}

pub fn request_refresh(state: &AppState) {
    state.refresh_wake.notify_one();
}

/// Run a guarded pass in the caller's task and return its summary.
pub async fn refresh_now(state: &Arc<AppState>) -> Result<RefreshOutcome, ScoringError> {
    let guard = &state.refresh_guard;
    if !guard.try_enter() {
        log::info!("Scheduler: pass in flight, follow-up queued");
        return Ok(RefreshOutcome::Coalesced);
    }

    let mut result = refresh::run_pass(state).await;
    while guard.finish() {
        log::info!("Scheduler: running queued follow-up pass");
        result = refresh::run_pass(state).await;
    }

    result.map(RefreshOutcome::Completed)
}
