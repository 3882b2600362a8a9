//! The capture side's view of an established remote-framebuffer session.
//!
//! Wire-level concerns (handshake, security, pixel-format negotiation,
//! message framing) belong to whatever protocol client fills the
//! channels. The capture loop only sees:
//!
//! ```text
//!            outbound: UpdateRequest ──────►
//!  Session   inbound:  ServerMessage ◄──────   SessionPeer (server side)
//!            errors:   SessionError  ◄──────
//! ```
//!
//! All channels hold a single message, so a slow consumer stalls its
//! producer rather than queueing frames.

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::SessionError;
use crate::rfb::types::{ServerMessage, UpdateMessage, UpdateRequest};

/// Depth of every session channel.
pub const CHANNEL_DEPTH: usize = 1;

// ── Session ──────────────────────────────────────────────────────

/// An already-negotiated session, owned by the caller of a recording.
#[derive(Debug)]
pub struct Session {
    width: u32,
    height: u32,
    pub(crate) outbound: mpsc::Sender<UpdateRequest>,
    pub(crate) inbound: mpsc::Receiver<ServerMessage>,
    pub(crate) errors: mpsc::Receiver<SessionError>,
}

impl Session {
    /// Create a session and the matching server-side endpoints.
    pub fn pair(width: u32, height: u32) -> (Session, SessionPeer) {
        let (req_tx, req_rx) = mpsc::channel(CHANNEL_DEPTH);
        let (msg_tx, msg_rx) = mpsc::channel(CHANNEL_DEPTH);
        let (err_tx, err_rx) = mpsc::channel(CHANNEL_DEPTH);

        let session = Session::from_channels(width, height, req_tx, msg_rx, err_rx);
        let peer = SessionPeer {
            requests: req_rx,
            updates: msg_tx,
            errors: err_tx,
        };
        (session, peer)
    }

    /// Wrap channels owned by an external protocol client.
    pub fn from_channels(
        width: u32,
        height: u32,
        outbound: mpsc::Sender<UpdateRequest>,
        inbound: mpsc::Receiver<ServerMessage>,
        errors: mpsc::Receiver<SessionError>,
    ) -> Self {
        Self {
            width,
            height,
            outbound,
            inbound,
            errors,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Release the session. Further server sends fail with a closed
    /// channel error, which tells the peer to stop.
    pub fn close(mut self) {
        self.inbound.close();
        self.errors.close();
        debug!(width = self.width, height = self.height, "session closed");
    }
}

// ── SessionPeer ──────────────────────────────────────────────────

/// Server-side endpoints of a [`Session`].
#[derive(Debug)]
pub struct SessionPeer {
    /// Requests forwarded by the capture loop.
    pub requests: mpsc::Receiver<UpdateRequest>,
    /// Messages delivered to the capture loop.
    pub updates: mpsc::Sender<ServerMessage>,
    /// Out-of-band session status.
    pub errors: mpsc::Sender<SessionError>,
}

impl SessionPeer {
    /// Wait for the next update request. `None` once the session is gone.
    pub async fn next_request(&mut self) -> Option<UpdateRequest> {
        self.requests.recv().await
    }

    /// Deliver a framebuffer update. Returns `false` if the session closed.
    pub async fn send_update(&self, update: UpdateMessage) -> bool {
        self.updates.send(update.into()).await.is_ok()
    }

    /// Signal a clean end of stream.
    pub async fn end_stream(&self) -> bool {
        self.errors.send(SessionError::EndOfStream).await.is_ok()
    }
}
