//! Background reaping of abandoned tuner slots.
//!
//! Consumers that disconnect without releasing would otherwise hold their
//! slot forever. Streams must heartbeat through [`TunerLease::touch`]. A
//! grant that stays silent longer than the idle timeout is freed; an opened
//! stream has its [`TunerLease::expired`] token cancelled and keeps its slot
//! until the owner closes it.
//!
//! [`TunerLease::touch`]: crate::tuner::TunerLease::touch
//! [`TunerLease::expired`]: crate::tuner::TunerLease::expired

use std::time::Duration;

use log::{debug, info};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::tuner::allocator::TunerAllocator;

/// Lease supervision settings, from the `[lease]` config section.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct LeaseConfig {
    /// Seconds without a heartbeat before a slot is reaped. 0 disables reaping.
    pub idle_timeout_secs: u64,
    /// Seconds between reaper passes.
    pub reap_interval_secs: u64,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 300,
            reap_interval_secs: 30,
        }
    }
}

/// Periodically reaps idle slots from a [`TunerAllocator`].
pub struct LeaseSupervisor {
    allocator: TunerAllocator,
    config: LeaseConfig,
}

impl LeaseSupervisor {
    pub fn new(allocator: TunerAllocator, config: LeaseConfig) -> Self {
        Self { allocator, config }
    }

    /// Run one reaper pass. Returns the number of slots freed.
    pub fn reap_once(&self) -> usize {
        if self.config.idle_timeout_secs == 0 {
            return 0;
        }
        self.allocator
            .reap_idle(Duration::from_secs(self.config.idle_timeout_secs))
            .len()
    }

    /// Spawn the reaper loop; it stops when `cancel` fires.
    ///
    /// Returns `None` when reaping is disabled.
    pub fn spawn(self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        if self.config.idle_timeout_secs == 0 {
            info!("[LeaseSupervisor] Idle timeout is 0, slot reaping disabled");
            return None;
        }

        let interval = Duration::from_secs(self.config.reap_interval_secs.max(1));
        info!(
            "[LeaseSupervisor] Reaping slots idle for more than {}s every {}s",
            self.config.idle_timeout_secs,
            interval.as_secs()
        );

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("[LeaseSupervisor] Stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let reaped = self.reap_once();
                        if reaped > 0 {
                            info!("[LeaseSupervisor] Reaped {} idle slot(s)", reaped);
                        }
                    }
                }
            }
        }))
    }
}
