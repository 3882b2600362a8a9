//! Update-request scheduling policies.
//!
//! An [`UpdateScheduler`] decides *when* the next framebuffer update is
//! requested; the capture loop decides what to do with the answer.
//!
//! | Policy     | First request    | Later requests                          |
//! |------------|------------------|-----------------------------------------|
//! | `Reactive` | full, on `start` | incremental, one per received frame     |
//! | `Periodic` | full, on `start` | incremental, one per timer tick         |
//!
//! Reactive follows the server's real rendering pace. Periodic gives a
//! steady output cadence regardless of how quickly the server answers.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tracing::debug;

use crate::error::SchedulerError;
use crate::task::{PeriodicTask, Tick, TickReceiver};

// ── FbUpdatable ──────────────────────────────────────────────────

/// Receiver of the requests a scheduler issues.
pub trait FbUpdatable {
    fn request_update(&mut self, incremental: bool);
}

// ── SchedulerKind ────────────────────────────────────────────────

/// Which policy a capture session uses. Acts as the scheduler factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SchedulerKind {
    /// Request the next frame as soon as the previous one lands.
    #[default]
    Reactive,
    /// Request a frame every `period`.
    Periodic { period: Duration },
}

impl SchedulerKind {
    /// Periodic policy running at `fps` frames per second.
    pub fn from_fps(fps: f64) -> Result<Self, SchedulerError> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(SchedulerError::ZeroPeriod);
        }
        Ok(SchedulerKind::Periodic {
            period: Duration::from_secs_f64(1.0 / fps),
        })
    }

    /// Build a fresh, stopped scheduler of this kind.
    pub fn build(&self) -> Result<UpdateScheduler, SchedulerError> {
        match *self {
            SchedulerKind::Reactive => Ok(UpdateScheduler::reactive()),
            SchedulerKind::Periodic { period } => UpdateScheduler::periodic(period),
        }
    }
}

// ── SchedulerState ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    #[default]
    Stopped,
    Running,
}

// ── UpdateScheduler ──────────────────────────────────────────────

/// A request-scheduling policy and its private state.
///
/// Misuse (`start` while running, `stop` while stopped) returns a
/// [`SchedulerError`] and leaves the scheduler unchanged.
pub enum UpdateScheduler {
    Reactive {
        state: SchedulerState,
    },
    Periodic {
        period: Duration,
        /// Timer task and its tick channel; `Some` exactly while running.
        timer: Option<(PeriodicTask, TickReceiver)>,
    },
}

impl UpdateScheduler {
    pub fn reactive() -> Self {
        UpdateScheduler::Reactive {
            state: SchedulerState::Stopped,
        }
    }

    pub fn periodic(period: Duration) -> Result<Self, SchedulerError> {
        if period.is_zero() {
            return Err(SchedulerError::ZeroPeriod);
        }
        Ok(UpdateScheduler::Periodic {
            period,
            timer: None,
        })
    }

    /// Policy name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            UpdateScheduler::Reactive { .. } => "reactive",
            UpdateScheduler::Periodic { .. } => "periodic",
        }
    }

    pub fn state(&self) -> SchedulerState {
        match self {
            UpdateScheduler::Reactive { state } => *state,
            UpdateScheduler::Periodic { timer: Some(_), .. } => SchedulerState::Running,
            UpdateScheduler::Periodic { timer: None, .. } => SchedulerState::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// Issue the initial full-canvas request and start the policy.
    ///
    /// The periodic policy spawns its timer and fails with
    /// [`SchedulerError::NoRuntime`] outside a tokio runtime, before any
    /// request is issued.
    pub fn start(&mut self, target: &mut impl FbUpdatable) -> Result<(), SchedulerError> {
        let name = self.name();
        match self {
            UpdateScheduler::Reactive { state } => {
                if *state == SchedulerState::Running {
                    return Err(SchedulerError::AlreadyRunning(name));
                }
                *state = SchedulerState::Running;
            }
            UpdateScheduler::Periodic { period, timer } => {
                if timer.is_some() {
                    return Err(SchedulerError::AlreadyRunning(name));
                }
                let runtime =
                    Handle::try_current().map_err(|_| SchedulerError::NoRuntime(name))?;
                *timer = Some(PeriodicTask::spawn(&runtime, *period));
            }
        }
        debug!(scheduler = name, "scheduler started");
        target.request_update(false);
        Ok(())
    }

    /// Stop issuing requests. A periodic timer is cancelled.
    pub fn stop(&mut self) -> Result<(), SchedulerError> {
        let name = self.name();
        match self {
            UpdateScheduler::Reactive { state } => {
                if *state == SchedulerState::Stopped {
                    return Err(SchedulerError::NotRunning(name));
                }
                *state = SchedulerState::Stopped;
            }
            UpdateScheduler::Periodic { timer, .. } => match timer.take() {
                Some((task, _ticks)) => task.cancel(),
                None => return Err(SchedulerError::NotRunning(name)),
            },
        }
        debug!(scheduler = name, "scheduler stopped");
        Ok(())
    }

    /// Stop, and for the periodic policy wait until its timer task has
    /// exited.
    pub async fn shutdown(&mut self) -> Result<(), SchedulerError> {
        let task = match self {
            UpdateScheduler::Periodic { timer, .. } => timer.take().map(|(task, _ticks)| task),
            UpdateScheduler::Reactive { .. } => None,
        };
        match task {
            Some(task) => {
                task.shutdown().await;
                debug!(scheduler = self.name(), "scheduler shut down");
                Ok(())
            }
            None => self.stop(),
        }
    }

    /// A frame arrived. Reactive policies ask for the next one.
    pub fn on_frame_received(&mut self, target: &mut impl FbUpdatable) {
        if let UpdateScheduler::Reactive {
            state: SchedulerState::Running,
        } = self
        {
            target.request_update(true);
        }
    }

    /// The periodic timer fired.
    pub fn on_tick(&mut self, target: &mut impl FbUpdatable) {
        if let UpdateScheduler::Periodic { timer: Some(_), .. } = self {
            target.request_update(true);
        }
    }

    /// Wait for the next timer tick.
    ///
    /// Never resolves for a reactive or stopped scheduler, which makes it
    /// safe to poll unconditionally from a `select!`.
    pub async fn next_tick(&mut self) -> Tick {
        if let UpdateScheduler::Periodic {
            timer: Some((_, ticks)),
            ..
        } = self
        {
            if let Some(tick) = ticks.recv().await {
                return tick;
            }
        }
        std::future::pending().await
    }
}

impl std::fmt::Debug for UpdateScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateScheduler::Reactive { state } => {
                f.debug_struct("Reactive").field("state", state).finish()
            }
            UpdateScheduler::Periodic { period, .. } => f
                .debug_struct("Periodic")
                .field("period", period)
                .field("state", &self.state())
                .finish(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
