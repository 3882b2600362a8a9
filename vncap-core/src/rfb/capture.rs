//! The capture event loop.
//!
//! A single task owns the [`FrameBuffer`], the [`UpdateScheduler`] and
//! the [`Recording`], and reacts to whichever source is ready:
//!
//! - a server message on the session's inbound channel,
//! - a session status event (end of stream or connection failure),
//! - a periodic scheduler tick,
//! - the caller's cancellation token.
//!
//! Requests the scheduler issues are queued and forwarded to the session
//! at the top of every iteration. Nothing here is shared across tasks,
//! so there are no locks.

use std::collections::VecDeque;
use std::time::Instant;

use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CaptureConfig;
use crate::error::{CaptureError, ProtocolError, SessionError};
use crate::rfb::framebuffer::FrameBuffer;
use crate::rfb::phase::CapturePhase;
use crate::rfb::scheduler::{FbUpdatable, UpdateScheduler};
use crate::rfb::session::Session;
use crate::rfb::timeline::{Recording, Timeline};
use crate::rfb::types::{ServerMessage, UpdateMessage, UpdateRequest};

// ── PendingRequests ──────────────────────────────────────────────

/// Requests issued by the scheduler, waiting to be forwarded.
#[derive(Debug, Default)]
struct PendingRequests(VecDeque<bool>);

impl FbUpdatable for PendingRequests {
    fn request_update(&mut self, incremental: bool) {
        self.0.push_back(incremental);
    }
}

/// Whether the loop keeps going after handling an event.
enum Flow {
    Continue,
    Finished,
}

/// Current instant on tokio's clock, which honours paused test time.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

// ── CaptureLoop ──────────────────────────────────────────────────

/// Drives one recording from the first request to termination.
#[derive(Debug)]
pub struct CaptureLoop {
    framebuffer: FrameBuffer,
    scheduler: UpdateScheduler,
    phase: CapturePhase,
    pending: PendingRequests,
    recording: Recording,
    requests_sent: u64,
    updates_received: u64,
}

impl CaptureLoop {
    pub fn new(width: u32, height: u32, config: &CaptureConfig) -> Result<Self, CaptureError> {
        Ok(Self {
            framebuffer: FrameBuffer::new(width, height),
            scheduler: config.scheduler.build()?,
            phase: CapturePhase::Idle,
            pending: PendingRequests::default(),
            recording: Recording::new(width, height),
            requests_sent: 0,
            updates_received: 0,
        })
    }

    pub fn phase(&self) -> CapturePhase {
        self.phase
    }

    /// Record until `cancel` fires or the session ends.
    ///
    /// End of stream is a normal return. Connection failures and
    /// protocol violations end the loop with an error. Either way the
    /// loop ends in [`CapturePhase::Stopped`] and cannot be run again.
    pub async fn run(
        &mut self,
        session: &mut Session,
        cancel: CancellationToken,
    ) -> Result<Recording, CaptureError> {
        self.phase.begin_capture()?;
        info!(
            width = self.framebuffer.width(),
            height = self.framebuffer.height(),
            scheduler = self.scheduler.name(),
            "capture started"
        );

        let result = self.capture(session, &cancel).await;

        if self.scheduler.is_running() {
            self.scheduler.shutdown().await?;
        }
        self.recording.finish(now());
        let elapsed = self.phase.capturing_duration();
        self.phase.finish()?;

        info!(
            elapsed = ?elapsed,
            frames = self.recording.len(),
            requests = self.requests_sent,
            updates = self.updates_received,
            "capture stopped"
        );

        result.map(|()| {
            let (w, h) = (self.recording.width(), self.recording.height());
            std::mem::replace(&mut self.recording, Recording::new(w, h))
        })
    }

    // ── Internal ─────────────────────────────────────────────────

    async fn capture(
        &mut self,
        session: &mut Session,
        cancel: &CancellationToken,
    ) -> Result<(), CaptureError> {
        self.scheduler.start(&mut self.pending)?;

        loop {
            if let Flow::Finished = self.forward_requests(session) {
                debug!("outbound channel closed");
                return Ok(());
            }

            // Updates already queued are applied before a queued end-of-stream.
            let flow = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("capture cancelled");
                    Flow::Finished
                }
                msg = session.inbound.recv() => match msg {
                    Some(msg) => self.on_message(msg)?,
                    None => {
                        debug!("inbound channel closed");
                        Flow::Finished
                    }
                },
                Some(event) = session.errors.recv() => match event {
                    SessionError::EndOfStream => {
                        info!("session reached end of stream");
                        Flow::Finished
                    }
                    SessionError::Connection(reason) => {
                        warn!(%reason, "session failed");
                        return Err(CaptureError::Connection(reason));
                    }
                },
                _ = self.scheduler.next_tick() => {
                    self.scheduler.on_tick(&mut self.pending);
                    Flow::Continue
                }
            };

            if let Flow::Finished = flow {
                return Ok(());
            }
        }
    }

    /// Send queued requests. A request that finds the outbound slot
    /// still occupied is dropped: the queued one already asks for the
    /// whole canvas.
    fn forward_requests(&mut self, session: &Session) -> Flow {
        let (width, height) = (self.framebuffer.width(), self.framebuffer.height());

        while let Some(incremental) = self.pending.0.pop_front() {
            let request = UpdateRequest::full_canvas(width, height, incremental);
            match session.outbound.try_send(request) {
                Ok(()) => self.requests_sent += 1,
                Err(TrySendError::Full(_)) => {
                    debug!(incremental, "update request coalesced");
                }
                Err(TrySendError::Closed(_)) => return Flow::Finished,
            }
        }
        Flow::Continue
    }

    fn on_message(&mut self, msg: ServerMessage) -> Result<Flow, CaptureError> {
        let update = match msg {
            ServerMessage::FramebufferUpdate(update) => update,
            other => {
                warn!(kind = other.kind(), "unexpected server message");
                return Err(ProtocolError::UnexpectedMessage(other.kind()).into());
            }
        };

        let arrived_at = now();
        self.updates_received += 1;
        self.scheduler.on_frame_received(&mut self.pending);

        if !self.framebuffer.has_baseline() {
            self.try_establish_baseline(update)?;
            return Ok(Flow::Continue);
        }

        self.framebuffer.apply_rectangles(&update.rects)?;

        // Each frame is shown from its own arrival until the next one.
        if let Some(snapshot) = self.framebuffer.snapshot() {
            self.recording.push_frame(snapshot, arrived_at);
        }
        Ok(Flow::Continue)
    }

    /// Accept `update` as the baseline if it starts with a full-canvas
    /// rectangle, otherwise drop it.
    fn try_establish_baseline(&mut self, update: UpdateMessage) -> Result<(), CaptureError> {
        let (width, height) = (self.framebuffer.width(), self.framebuffer.height());
        let mut rects = update.rects.into_iter();

        match rects.next() {
            Some(first) if first.is_full_canvas(width, height) => {
                self.framebuffer.establish_baseline(first)?;
                let rest: Vec<_> = rects.collect();
                self.framebuffer.apply_rectangles(&rest)?;
                debug!(width, height, "baseline established");
            }
            _ => debug!("update before baseline discarded"),
        }
        Ok(())
    }

}

// ── Entry points ─────────────────────────────────────────────────

/// Record `session` into a timeline, then close the session.
///
/// The session is closed whether recording succeeds or fails.
pub async fn record(
    mut session: Session,
    config: &CaptureConfig,
    cancel: CancellationToken,
) -> Result<Timeline, CaptureError> {
    let result: Result<Timeline, CaptureError> = async {
        let mut capture = CaptureLoop::new(session.width(), session.height(), config)?;
        let recording = capture.run(&mut session, cancel).await?;
        Ok(recording.assemble(config.palette)?)
    }
    .await;

    session.close();
    result
}

/// [`record`] with the default configuration (reactive scheduling).
pub async fn record_default(
    session: Session,
    cancel: CancellationToken,
) -> Result<Timeline, CaptureError> {
    record(session, &CaptureConfig::default(), cancel).await
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::rfb::session::SessionPeer;
    use crate::rfb::types::{Color, Rectangle};

    fn full(color: Color) -> UpdateMessage {
        UpdateMessage::new(vec![Rectangle::filled(0, 0, 4, 4, color)])
    }

    fn partial(color: Color) -> UpdateMessage {
        UpdateMessage::new(vec![Rectangle::filled(2, 2, 2, 2, color)])
    }

    /// Answer each request with the next update, then end the stream.
    async fn serve(mut peer: SessionPeer, updates: Vec<UpdateMessage>) {
        for update in updates {
            if peer.next_request().await.is_none() {
                return;
            }
            if !peer.send_update(update).await {
                return;
            }
        }
        peer.next_request().await;
        peer.end_stream().await;
    }

    #[tokio::test(start_paused = true)]
    async fn end_of_stream_finishes_cleanly() {
        let (mut session, peer) = Session::pair(4, 4);
        let server = tokio::spawn(serve(
            peer,
            vec![full(Color::BLACK), partial(Color::WHITE), partial(Color::BLACK)],
        ));

        let mut capture = CaptureLoop::new(4, 4, &CaptureConfig::default()).unwrap();
        let recording = capture
            .run(&mut session, CancellationToken::new())
            .await
            .unwrap();
        server.await.unwrap();

        assert_eq!(capture.phase(), CapturePhase::Stopped);
        assert_eq!(recording.len(), 2);
        assert_eq!(recording.timestamps().len(), 3);
        assert!(recording.timestamps().windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(recording.snapshots()[0].pixel(3, 3), Color::WHITE);
        assert_eq!(recording.snapshots()[1].pixel(3, 3), Color::BLACK);
    }

    #[tokio::test(start_paused = true)]
    async fn updates_before_baseline_are_discarded() {
        let (mut session, peer) = Session::pair(4, 4);
        let server = tokio::spawn(serve(
            peer,
            vec![
                partial(Color::WHITE),
                full(Color::BLACK),
                partial(Color::WHITE),
            ],
        ));

        let mut capture = CaptureLoop::new(4, 4, &CaptureConfig::default()).unwrap();
        let recording = capture
            .run(&mut session, CancellationToken::new())
            .await
            .unwrap();
        server.await.unwrap();

        assert_eq!(recording.len(), 1);
        assert_eq!(recording.snapshots()[0].pixel(0, 0), Color::BLACK);
        assert_eq!(recording.snapshots()[0].pixel(2, 2), Color::WHITE);
    }

    #[tokio::test(start_paused = true)]
    async fn non_update_message_is_a_protocol_error() {
        let (mut session, mut peer) = Session::pair(4, 4);
        let server = tokio::spawn(async move {
            peer.next_request().await;
            let _ = peer.updates.send(ServerMessage::Bell).await;
            peer
        });

        let mut capture = CaptureLoop::new(4, 4, &CaptureConfig::default()).unwrap();
        let err = capture
            .run(&mut session, CancellationToken::new())
            .await
            .unwrap_err();
        let _peer = server.await.unwrap();

        assert!(matches!(
            err,
            CaptureError::Protocol(ProtocolError::UnexpectedMessage("bell"))
        ));
        assert_eq!(capture.phase(), CapturePhase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_bounds_rectangle_is_a_protocol_error() {
        let (mut session, peer) = Session::pair(4, 4);
        let bad = UpdateMessage::new(vec![Rectangle::filled(3, 3, 2, 2, Color::WHITE)]);
        let server = tokio::spawn(serve(peer, vec![full(Color::BLACK), bad]));

        let mut capture = CaptureLoop::new(4, 4, &CaptureConfig::default()).unwrap();
        let err = capture
            .run(&mut session, CancellationToken::new())
            .await
            .unwrap_err();
        drop(session);
        server.await.unwrap();

        assert!(matches!(err, CaptureError::Protocol(ProtocolError::FrameBuffer(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn connection_error_is_surfaced() {
        let (mut session, mut peer) = Session::pair(4, 4);
        let server = tokio::spawn(async move {
            peer.next_request().await;
            let _ = peer
                .errors
                .send(SessionError::Connection("reset by peer".into()))
                .await;
            peer
        });

        let mut capture = CaptureLoop::new(4, 4, &CaptureConfig::default()).unwrap();
        let err = capture
            .run(&mut session, CancellationToken::new())
            .await
            .unwrap_err();
        let _peer = server.await.unwrap();

        assert!(matches!(err, CaptureError::Connection(ref r) if r == "reset by peer"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_an_idle_session() {
        let (mut session, _peer) = Session::pair(4, 4);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let mut capture = CaptureLoop::new(4, 4, &CaptureConfig::default()).unwrap();
        let recording = capture.run(&mut session, cancel).await.unwrap();

        assert!(recording.is_empty());
        assert_eq!(recording.timestamps().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_cannot_be_restarted() {
        let (mut session, _peer) = Session::pair(4, 4);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut capture = CaptureLoop::new(4, 4, &CaptureConfig::default()).unwrap();
        capture.run(&mut session, cancel.clone()).await.unwrap();

        let err = capture.run(&mut session, cancel).await.unwrap_err();
        assert!(matches!(
            err,
            CaptureError::InvalidPhase {
                from: CapturePhase::Stopped,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn record_closes_session_on_failure() {
        let (session, mut peer) = Session::pair(4, 4);
        let server = tokio::spawn(async move {
            peer.next_request().await;
            let _ = peer
                .updates
                .send(ServerMessage::ServerCutText("clip".into()))
                .await;
            // The closed session drops its request sender.
            assert!(peer.next_request().await.is_none());
        });

        let err = record_default(session, CancellationToken::new())
            .await
            .unwrap_err();
        server.await.unwrap();
        assert!(matches!(err, CaptureError::Protocol(_)));
    }
}
