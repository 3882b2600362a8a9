//! Domain-specific error types for framebuffer capture.
//!
//! All fallible operations return `Result<T, CaptureError>` or one of the
//! narrower enums below, which convert into it with `?`.
//! Scheduler and phase misuse are typed errors, never panics.

use thiserror::Error;

use crate::rfb::phase::CapturePhase;

/// The canonical error type returned by a capture session.
#[derive(Debug, Error)]
pub enum CaptureError {
    // ── Session Errors ───────────────────────────────────────────
    /// The session reported a transport failure. Not retried.
    #[error("connection error: {0}")]
    Connection(String),

    // ── Protocol Errors ──────────────────────────────────────────
    /// The server sent something the capture loop cannot interpret.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    // ── Misuse Errors ────────────────────────────────────────────
    /// The update scheduler was driven out of order.
    #[error("scheduler misuse: {0}")]
    Scheduler(#[from] SchedulerError),

    /// A capture loop was started from a phase that does not allow it.
    #[error("invalid capture phase transition: {from} -> {to}")]
    InvalidPhase {
        from: CapturePhase,
        to: CapturePhase,
    },

    // ── Output Errors ────────────────────────────────────────────
    /// The recorded snapshots could not be turned into a timeline.
    #[error("timeline error: {0}")]
    Timeline(#[from] TimelineError),

    /// The animated-image encoder rejected the timeline.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Writing encoded output failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

// ── SessionError ──────────────────────────────────────────────────

/// Events delivered on a session's error channel.
///
/// `EndOfStream` is the normal way a server ends a recording and is
/// translated into a successful return by the capture loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("end of stream")]
    EndOfStream,

    #[error("connection error: {0}")]
    Connection(String),
}

// ── ProtocolError ─────────────────────────────────────────────────

/// The server misbehaved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A non-update message arrived on the update channel.
    #[error("unexpected {0} message, expected framebuffer update")]
    UnexpectedMessage(&'static str),

    /// A rectangle could not be merged into the framebuffer.
    #[error(transparent)]
    FrameBuffer(#[from] FrameBufferError),
}

// ── FrameBufferError ──────────────────────────────────────────────

/// Errors raised while merging rectangles into a [`FrameBuffer`].
///
/// [`FrameBuffer`]: crate::rfb::framebuffer::FrameBuffer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameBufferError {
    #[error(
        "rectangle {width}x{height} at ({x},{y}) exceeds framebuffer {fb_width}x{fb_height}"
    )]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        fb_width: u32,
        fb_height: u32,
    },

    /// A merge was attempted before any full-canvas rectangle was applied.
    #[error("no baseline frame has been established")]
    NoBaseline,

    #[error("baseline frame already established")]
    BaselineExists,

    #[error("baseline rectangle must cover the full canvas")]
    NotFullCanvas,

    #[error("rectangle carries {actual} pixels, expected {expected}")]
    PixelCountMismatch { expected: usize, actual: usize },
}

// ── SchedulerError ────────────────────────────────────────────────

/// Misuse of an [`UpdateScheduler`](crate::rfb::scheduler::UpdateScheduler).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("{0} scheduler already running")]
    AlreadyRunning(&'static str),

    #[error("{0} scheduler not running")]
    NotRunning(&'static str),

    #[error("periodic scheduler period must be non-zero")]
    ZeroPeriod,

    #[error("{0} scheduler needs a tokio runtime for its timer")]
    NoRuntime(&'static str),
}

// ── TimelineError ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimelineError {
    /// Timestamps must outnumber snapshots by exactly one.
    #[error("expected {expected} timestamps for the recorded snapshots, got {actual}")]
    TimestampCount { expected: usize, actual: usize },

    #[error("frame {frame} has {colors} distinct colors, palette limit is 256")]
    PaletteOverflow { frame: usize, colors: usize },
}

// ── Convenient From implementations ──────────────────────────────

impl From<FrameBufferError> for CaptureError {
    fn from(e: FrameBufferError) -> Self {
        CaptureError::Protocol(ProtocolError::FrameBuffer(e))
    }
}

impl From<image::ImageError> for CaptureError {
    fn from(e: image::ImageError) -> Self {
        CaptureError::Encoding(e.to_string())
    }
}
