//! # vncap-core
//!
//! Records a remote framebuffer session into an animated-image timeline.
//!
//! This crate contains:
//! - **FrameBuffer**: reconstructs the full screen from a baseline and
//!   partial rectangle updates
//! - **UpdateScheduler**: reactive or periodic update-request policies
//! - **CaptureLoop**: the single-task event loop tying session, scheduler
//!   and cancellation together
//! - **Timeline**: paletted frames with centisecond delays, plus a GIF
//!   encoder in `codec`
//! - **Error**: `CaptureError` and the narrower enums it wraps
//!
//! The remote-framebuffer wire protocol is not implemented here. A
//! protocol client hands over an already-negotiated [`Session`].

pub mod codec;
pub mod config;
pub mod error;
pub mod rfb;
pub mod task;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::{GifTimelineEncoder, Repeat};
pub use config::CaptureConfig;
pub use error::{
    CaptureError, FrameBufferError, ProtocolError, SchedulerError, SessionError, TimelineError,
};
pub use rfb::{
    CaptureLoop, CapturePhase, Color, FbUpdatable, FrameBuffer, PalettePolicy, PalettedImage,
    Rectangle, Recording, SchedulerKind, SchedulerState, ServerMessage, Session, SessionPeer,
    Snapshot, Timeline, TimelineAssembler, TimelineFrame, UpdateMessage, UpdateRequest,
    UpdateScheduler, record, record_default,
};
pub use task::{PeriodicTask, Tick};
