//! Liveness Monitor
//!
//! Sweeps the registry once per period. A session whose flag is still clear from
//! the previous sweep is evicted; every other session has its flag cleared and is
//! asked to probe its client. A pong between sweeps sets the flag again, so an
//! unresponsive client is evicted after exactly one missed period.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::registry::{SessionCommand, SessionRegistry};

pub const DEFAULT_LIVENESS_PERIOD: Duration = Duration::from_secs(30);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub probed: usize,
    pub evicted: usize,
    /// Sessions that went away between the snapshot and the command
    pub skipped: usize,
}

pub struct LivenessMonitor {
    registry: Arc<SessionRegistry>,
    period: Duration,
}

impl LivenessMonitor {
    pub fn new(registry: Arc<SessionRegistry>, period: Duration) -> Self {
        Self { registry, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run one sweep over a snapshot of the registry.
    pub fn sweep(&self) -> SweepStats {
        let mut stats = SweepStats::default();

        for handle in self.registry.snapshot() {
            let command = if handle.liveness.check_and_reset() {
                SessionCommand::Probe
            } else {
                SessionCommand::Evict
            };

            if !handle.send(command) {
                stats.skipped += 1;
                continue;
            }

            match command {
                SessionCommand::Probe => stats.probed += 1,
                SessionCommand::Evict => {
                    info!(session_id = %handle.id, "Evicting unresponsive session");
                    stats.evicted += 1;
                }
            }
        }

        stats
    }

    /// Sweep every period until `cancel` fires. The first sweep happens one period
    /// after start.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(period_secs = self.period.as_secs(), "Liveness monitor started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let stats = self.sweep();
                    debug!(
                        probed = stats.probed,
                        evicted = stats.evicted,
                        skipped = stats.skipped,
                        "Liveness sweep complete"
                    );
                }
                () = cancel.cancelled() => {
                    info!("Liveness monitor stopped");
                    break;
                }
            }
        }
    }
}
