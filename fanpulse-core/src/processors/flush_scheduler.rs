//! FlushScheduler processor.
//!
//! Emits a `FlushTick` every `flush_interval` on a broadcast channel. Every
//! partition runner subscribes and force-flushes its pending batch on each
//! tick, so a quiet partition still emits within one interval.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info};

use crate::events::{FlushTick, FlushTickSender};

pub struct FlushScheduler {
    interval: Duration,
    tick_tx: FlushTickSender,
}

impl FlushScheduler {
    pub fn new(interval: Duration, tick_tx: FlushTickSender) -> Self {
        Self { interval, tick_tx }
    }

    /// Run the FlushScheduler until shutdown is signaled.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut seq = 0u64;

        info!(
            interval_ms = self.interval.as_millis() as u64,
            "FlushScheduler started"
        );

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("FlushScheduler received shutdown signal");
                        break;
                    }
                }

                fired_at = ticker.tick() => {
                    seq += 1;
                    let tick = FlushTick {
                        seq,
                        fired_at: fired_at.into_std(),
                    };
                    if self.tick_tx.send(tick).is_err() {
                        debug!(seq, "No partition runner listening for flush ticks");
                    }
                }
            }
        }

        info!(ticks = seq, "FlushScheduler shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::flush_tick_channel;

    #[tokio::test(start_paused = true)]
    async fn ticks_are_numbered_from_one() {
        let (tick_tx, mut tick_rx) = flush_tick_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = FlushScheduler::new(Duration::from_millis(100), tick_tx);
        let handle = tokio::spawn(scheduler.run(shutdown_rx));

        let started = Instant::now();
        assert_eq!(tick_rx.recv().await.unwrap().seq, 1);
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(tick_rx.recv().await.unwrap().seq, 2);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
