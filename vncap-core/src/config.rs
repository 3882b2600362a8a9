//! Capture configuration.
//!
//! Built by the caller and passed into [`record`](crate::rfb::capture::record)
//! or [`CaptureLoop::new`](crate::rfb::capture::CaptureLoop::new).
//! There is no process-wide default instance.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::rfb::scheduler::SchedulerKind;
use crate::rfb::timeline::PalettePolicy;

/// Settings for one recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Update-request policy; builds a fresh scheduler per recording.
    pub scheduler: SchedulerKind,
    /// Handling of frames with more than 256 colors.
    pub palette: PalettePolicy,
}

impl CaptureConfig {
    pub fn reactive() -> Self {
        Self {
            scheduler: SchedulerKind::Reactive,
            ..Self::default()
        }
    }

    pub fn periodic(period: Duration) -> Self {
        Self {
            scheduler: SchedulerKind::Periodic { period },
            ..Self::default()
        }
    }

    pub fn with_palette(mut self, palette: PalettePolicy) -> Self {
        self.palette = palette;
        self
    }
}
