//! Background refresh of rule contents.
//!
//! A [`Refresher`] owns one named thread per filter. The thread sleeps on the
//! filter's [`CancelToken`] for the configured interval, then refreshes every
//! rule in order. Startup refresh runs synchronously in
//! [`Refresher::initialize`] and any failure there is returned to the caller;
//! failures during periodic cycles are logged and the affected rule keeps its
//! last good snapshot.
//!
//! ```text
//! Initializing -> Ready -> Refreshing -> Ready -> ... -> Stopped
//! ```

use parking_lot::RwLock;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::fetch::{CancelToken, Fetcher, RefreshContext};
use crate::{Error, Result, Rule};

/// Lifecycle state of a [`Refresher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefresherState {
    /// Created, startup refresh not finished yet
    Initializing,
    /// Waiting for the next tick
    Ready,
    /// A periodic cycle is running
    Refreshing,
    /// Shut down; no further refreshes
    Stopped,
}

/// Outcome of one refresh cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Rules whose snapshot was replaced
    pub refreshed: usize,
    /// Rules that kept their previous snapshot
    pub failed: usize,
}

/// State shared with the background thread.
struct Shared {
    rules: Vec<Arc<Rule>>,
    fetcher: Arc<Fetcher>,
    timeout: Duration,
    cancel: CancelToken,
    state: RwLock<RefresherState>,
}

impl Shared {
    fn set_state(&self, state: RefresherState) {
        *self.state.write() = state;
    }

    fn refresh_rule(&self, rule: &Rule) -> Result<()> {
        let ctx = RefreshContext::new(&self.cancel, self.timeout);
        rule.refresh(&self.fetcher, &ctx)
    }

    fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();
        if self.cancel.is_cancelled() {
            return report;
        }
        self.set_state(RefresherState::Refreshing);

        for rule in &self.rules {
            if self.cancel.is_cancelled() {
                break;
            }
            match self.refresh_rule(rule) {
                Ok(()) => report.refreshed += 1,
                Err(Error::Cancelled) => break,
                Err(e) => {
                    log::error!("Failed to update rule {:?}: {}", rule.locations(), e);
                    report.failed += 1;
                }
            }
        }

        if !self.cancel.is_cancelled() {
            self.set_state(RefresherState::Ready);
        }
        report
    }

    fn run(&self, interval: Duration) {
        while !self.cancel.wait_timeout(interval) {
            log::debug!("Start updating IP lists");
            let report = self.run_cycle();
            log::debug!(
                "Finish updating IP lists: {} refreshed, {} failed",
                report.refreshed,
                report.failed
            );
        }
        self.set_state(RefresherState::Stopped);
        log::debug!("Refresher exit");
    }
}

/// Keeps a set of rules current.
pub struct Refresher {
    shared: Arc<Shared>,
    interval: Duration,
    handle: Option<JoinHandle<()>>,
}

impl Refresher {
    /// Create a refresher. Nothing runs until [`initialize`](Self::initialize)
    /// and [`start`](Self::start).
    pub fn new(
        rules: Vec<Arc<Rule>>,
        fetcher: Arc<Fetcher>,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                rules,
                fetcher,
                timeout,
                cancel: CancelToken::new(),
                state: RwLock::new(RefresherState::Initializing),
            }),
            interval,
            handle: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RefresherState {
        *self.shared.state.read()
    }

    /// Interval between periodic cycles.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Timeout of a single rule refresh.
    pub fn timeout(&self) -> Duration {
        self.shared.timeout
    }

    /// Check if the background thread is running.
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Refresh every rule once, stopping at the first failure.
    pub fn initialize(&self) -> Result<()> {
        self.shared.set_state(RefresherState::Initializing);
        for rule in &self.shared.rules {
            self.shared.refresh_rule(rule)?;
        }
        self.shared.set_state(RefresherState::Ready);
        Ok(())
    }

    /// Run one periodic cycle on the calling thread.
    pub fn refresh_cycle(&self) -> CycleReport {
        self.shared.run_cycle()
    }

    /// Spawn the background thread.
    pub fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }
        if self.shared.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let shared = Arc::clone(&self.shared);
        let interval = self.interval;
        let handle = thread::Builder::new()
            .name("ipgate-refresh".to_string())
            .spawn(move || shared.run(interval))?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Cancel in-flight work and join the background thread.
    pub fn stop(&mut self) {
        self.shared.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Refresher thread panicked");
            }
        }
        self.shared.set_state(RefresherState::Stopped);
    }
}

impl Drop for Refresher {
    fn drop(&mut self) {
        self.stop();
    }
}
