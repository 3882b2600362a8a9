//! # rfb — remote framebuffer capture pipeline
//!
//! ```text
//!  Session ──ServerMessage──► CaptureLoop ──merge──► FrameBuffer
//!     ▲                          │    │                  │
//!     └──────UpdateRequest───────┘    │              snapshot
//!                                     ▼                  ▼
//!                              UpdateScheduler       Recording ──► TimelineAssembler ──► Timeline
//! ```
//!
//! ## Sub-modules
//!
//! | Module        | Purpose                                              |
//! |---------------|------------------------------------------------------|
//! | `types`       | Colors, rectangles, requests, server messages         |
//! | `framebuffer` | Baseline + partial-rectangle merge, snapshots         |
//! | `scheduler`   | Reactive / periodic update-request policies           |
//! | `session`     | Channel view of an already-negotiated session         |
//! | `phase`       | `Idle → Capturing → Stopped` lifecycle                |
//! | `capture`     | The event loop and the `record` entry points          |
//! | `timeline`    | Palette build and inter-frame delays                  |

pub mod capture;
pub mod framebuffer;
pub mod phase;
pub mod scheduler;
pub mod session;
pub mod timeline;
pub mod types;

// ── Re-exports ───────────────────────────────────────────────────

pub use capture::{CaptureLoop, record, record_default};
pub use framebuffer::{FrameBuffer, Snapshot};
pub use phase::CapturePhase;
pub use scheduler::{FbUpdatable, SchedulerKind, SchedulerState, UpdateScheduler};
pub use session::{Session, SessionPeer};
pub use timeline::{
    PalettePolicy, PalettedImage, Recording, Timeline, TimelineAssembler, TimelineFrame,
};
pub use types::{Color, Rectangle, ServerMessage, UpdateMessage, UpdateRequest};
