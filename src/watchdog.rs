//! Liveness monitor for independently terminating components
//!
//! The crawler, downloader and dispatcher each finish on their own schedule. The
//! [`WatchDog`] polls their liveness predicates and resolves exactly once, when
//! every registered component has been active at some point and all of them are
//! idle at the same time.

use crate::config::WatchdogConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// A component that reports whether it still has outstanding asynchronous work
pub trait Watchable: Send + Sync {
    /// Name used in log messages
    fn name(&self) -> &str;

    /// Returns true while the component has outstanding work
    fn is_alive(&self) -> bool;

    /// Returns true if the component has been alive at any point
    ///
    /// Components that may finish between two polls should latch this, or the
    /// watchdog never learns that they started.
    fn was_ever_alive(&self) -> bool {
        self.is_alive()
    }
}

/// Shared liveness flag a component flips while it works
///
/// Clones share the same flag, so the owning task keeps one copy and hands
/// another to the [`WatchDog`]. Having been alive once is latched.
#[derive(Debug, Clone)]
pub struct Liveness {
    name: Arc<str>,
    alive: Arc<AtomicBool>,
    started: Arc<AtomicBool>,
}

impl Liveness {
    /// Creates a flag that starts out idle
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            alive: Arc::new(AtomicBool::new(false)),
            started: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_alive(&self, alive: bool) {
        if alive {
            self.started.store(true, Ordering::Release);
        }
        self.alive.store(alive, Ordering::Release);
    }

    /// Raises the flag until the returned guard is dropped
    pub fn enter(&self) -> LivenessGuard {
        self.set_alive(true);
        LivenessGuard(self.clone())
    }
}

/// Keeps a [`Liveness`] flag raised while held
///
/// Moved into the task doing the work, it clears the flag on every exit path,
/// including a panic unwinding out of that task.
#[derive(Debug)]
pub struct LivenessGuard(Liveness);

impl Drop for LivenessGuard {
    fn drop(&mut self) {
        self.0.set_alive(false);
    }
}

impl Watchable for Liveness {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn was_ever_alive(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }
}

/// Polls a set of [`Watchable`] components and signals global completion once
pub struct WatchDog {
    members: Vec<Arc<dyn Watchable>>,
    poll_interval: Duration,
    quiet_ticks: u32,
}

impl WatchDog {
    /// Creates a watchdog polling every `poll_interval`
    ///
    /// `quiet_ticks` consecutive all-idle readings are required before completion,
    /// so a component caught between two phases of work is not mistaken for done.
    pub fn new(poll_interval: Duration, quiet_ticks: u32) -> Self {
        Self {
            members: Vec::new(),
            poll_interval,
            quiet_ticks: quiet_ticks.max(1),
        }
    }

    pub fn from_config(config: &WatchdogConfig) -> Self {
        Self::new(
            Duration::from_millis(config.poll_interval_ms),
            config.quiet_ticks,
        )
    }

    /// Registers a component; registration order is irrelevant
    pub fn add_watchable(&mut self, component: Arc<dyn Watchable>) {
        tracing::debug!("Watching component '{}'", component.name());
        self.members.push(component);
    }

    /// Number of registered components
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Polls until all components are permanently idle
    ///
    /// Consumes the watchdog: polling starts here, nothing can be registered
    /// afterwards and the completion is observed exactly once. A component that
    /// has never been seen alive keeps the watchdog waiting.
    pub async fn wait_all_dead(self) {
        if self.members.is_empty() {
            tracing::warn!("WatchDog started without any watched components");
            return;
        }

        let mut seen_alive = vec![false; self.members.len()];
        let mut quiet = 0u32;
        let mut ticks = 0u64;

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            ticks += 1;

            let mut any_alive = false;
            for (member, seen) in self.members.iter().zip(seen_alive.iter_mut()) {
                if member.is_alive() {
                    *seen = true;
                    any_alive = true;
                } else if !*seen && member.was_ever_alive() {
                    *seen = true;
                }
            }

            if any_alive || seen_alive.iter().any(|seen| !seen) {
                quiet = 0;
                continue;
            }

            quiet += 1;
            tracing::trace!("All components idle ({}/{})", quiet, self.quiet_ticks);

            if quiet >= self.quiet_ticks {
                tracing::info!(
                    "All {} watched components finished after {} checks",
                    self.members.len(),
                    ticks
                );
                return;
            }
        }
    }
}
