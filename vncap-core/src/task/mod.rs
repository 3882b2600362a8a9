//! Cancellable background tasks.
//!
//! A [`PeriodicTask`] owns a spawned tokio task that fires on a fixed
//! period and posts a [`Tick`] into a bounded channel. The task never
//! touches shared state; whoever owns the receiver decides what a tick
//! means. Dropping or cancelling the handle ends the task.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Types
pub type TickReceiver = mpsc::Receiver<Tick>;

/// One timer expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick;

pub struct PeriodicTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Spawns the ticker on `runtime`.
    ///
    /// The first tick fires one full `period` after spawning. The channel
    /// holds a single tick; while it is full the task waits, so a slow
    /// consumer stalls the timer instead of queueing ticks.
    pub fn spawn(runtime: &Handle, period: Duration) -> (Self, TickReceiver) {
        let (tx, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = runtime.spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        tokio::select! {
                            _ = token.cancelled() => break,
                            sent = tx.send(Tick) => {
                                if sent.is_err() {
                                    // receiver dropped
                                    break;
                                }
                            }
                        }
                    }
                }
            }
        });

        (Self { cancel, handle }, rx)
    }

    /// Request the task to stop. Returns immediately.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        let _ = (&mut self.handle).await;
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_on_period() {
        let (task, mut rx) = PeriodicTask::spawn(&Handle::current(), Duration::from_millis(100));
        let start = tokio::time::Instant::now();

        rx.recv().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(100));
        rx.recv().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(200));

        task.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_closes_channel() {
        let (task, mut rx) = PeriodicTask::spawn(&Handle::current(), Duration::from_millis(50));
        task.cancel();
        assert!(rx.recv().await.is_none());
        task.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn drop_stops_task() {
        let (task, mut rx) = PeriodicTask::spawn(&Handle::current(), Duration::from_millis(50));
        drop(task);
        assert!(rx.recv().await.is_none());
    }
}
