//! Lifecycle of a capture loop.
//!
//! Transitions are validated and return `Result` instead of panicking.

use std::time::Instant;

use crate::error::CaptureError;

/// The current phase of a [`CaptureLoop`](crate::rfb::capture::CaptureLoop).
///
/// ```text
///  Idle ──► Capturing ──► Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapturePhase {
    #[default]
    Idle,

    /// Recording is in progress.
    Capturing {
        /// When recording began.
        since: Instant,
    },

    /// Terminal. A stopped loop cannot be restarted.
    Stopped,
}

impl std::fmt::Display for CapturePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Capturing { .. } => write!(f, "Capturing"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

impl CapturePhase {
    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Capturing { .. })
    }

    /// How long recording has been running. `None` outside `Capturing`.
    pub fn capturing_duration(&self) -> Option<std::time::Duration> {
        match self {
            Self::Capturing { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Capturing`.
    ///
    /// Valid from: `Idle`.
    pub fn begin_capture(&mut self) -> Result<(), CaptureError> {
        match self {
            Self::Idle => {
                *self = Self::Capturing {
                    since: Instant::now(),
                };
                Ok(())
            }
            other => Err(CaptureError::InvalidPhase {
                from: *other,
                to: Self::Capturing {
                    since: Instant::now(),
                },
            }),
        }
    }

    /// Transition to `Stopped`.
    ///
    /// Valid from: `Capturing`.
    pub fn finish(&mut self) -> Result<(), CaptureError> {
        match self {
            Self::Capturing { .. } => {
                *self = Self::Stopped;
                Ok(())
            }
            other => Err(CaptureError::InvalidPhase {
                from: *other,
                to: Self::Stopped,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_to_capturing_to_stopped() {
        let mut phase = CapturePhase::default();
        assert_eq!(phase, CapturePhase::Idle);

        phase.begin_capture().unwrap();
        assert!(phase.is_capturing());
        assert!(phase.capturing_duration().is_some());

        phase.finish().unwrap();
        assert_eq!(phase, CapturePhase::Stopped);
        assert!(phase.capturing_duration().is_none());
    }

    #[test]
    fn stopped_is_terminal() {
        let mut phase = CapturePhase::Stopped;
        let err = phase.begin_capture().unwrap_err();
        assert!(matches!(
            err,
            CaptureError::InvalidPhase {
                from: CapturePhase::Stopped,
                ..
            }
        ));
    }

    #[test]
    fn cannot_finish_from_idle() {
        let mut phase = CapturePhase::Idle;
        assert!(phase.finish().is_err());
        assert_eq!(phase, CapturePhase::Idle);
    }

    #[test]
    fn display_names() {
        assert_eq!(CapturePhase::Idle.to_string(), "Idle");
        assert_eq!(CapturePhase::Stopped.to_string(), "Stopped");
    }
}
