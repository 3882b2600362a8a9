//! Synthetic framebuffer server.
//!
//! Stands in for a real remote-framebuffer connection: answers each
//! update request with a square that moves across a gradient backdrop.
//! A non-incremental request always gets the full canvas.

use std::time::Duration;

use tracing::{debug, info};

use vncap_core::{Color, Rectangle, SessionPeer, UpdateMessage, UpdateRequest};

use crate::config::DemoConfig;

/// Pixels the square moves per update.
const STEP: u32 = 4;

/// Scripted source that drives the server side of a session.
#[derive(Debug, Clone)]
pub struct DemoServer {
    width: u32,
    height: u32,
    frames: u32,
    render_delay: Duration,
    square: u32,
}

impl DemoServer {
    pub fn new(config: &DemoConfig) -> Self {
        let width = config.width.max(1);
        let height = config.height.max(1);
        Self {
            width,
            height,
            frames: config.frames,
            render_delay: Duration::from_millis(config.render_delay_ms),
            square: (width.min(height) / 4).max(1),
        }
    }

    /// Serve requests until the recorder goes away or the frame budget
    /// runs out, in which case the stream is ended cleanly.
    pub async fn serve(self, mut peer: SessionPeer) {
        let mut sent = 0u32;
        while let Some(request) = peer.next_request().await {
            tokio::time::sleep(self.render_delay).await;

            let update = self.respond(&request, sent);
            if !peer.send_update(update).await {
                debug!(sent, "recorder closed the session");
                return;
            }
            sent += 1;

            if self.frames != 0 && sent >= self.frames {
                // Hold the last frame for one more render interval.
                if peer.next_request().await.is_some() {
                    tokio::time::sleep(self.render_delay).await;
                }
                info!(sent, "demo source finished");
                peer.end_stream().await;
                return;
            }
        }
        debug!(sent, "request channel closed");
    }

    fn respond(&self, request: &UpdateRequest, frame: u32) -> UpdateMessage {
        if !request.incremental || frame == 0 {
            let mut rects = vec![self.backdrop()];
            rects.push(self.square_at(frame));
            return UpdateMessage::new(rects);
        }
        // Repaint where the square was, then draw it at the new spot.
        UpdateMessage::new(vec![self.backdrop_at(frame - 1), self.square_at(frame)])
    }

    fn backdrop(&self) -> Rectangle {
        self.backdrop_region(0, 0, self.width, self.height)
    }

    fn backdrop_at(&self, frame: u32) -> Rectangle {
        let (x, y) = self.position(frame);
        self.backdrop_region(x, y, self.square, self.square)
    }

    fn backdrop_region(&self, x: u32, y: u32, width: u32, height: u32) -> Rectangle {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for row in y..y + height {
            for col in x..x + width {
                pixels.push(self.backdrop_color(col, row));
            }
        }
        Rectangle::new(x, y, width, height, pixels)
    }

    /// Vertical gradient in 16 bands.
    fn backdrop_color(&self, _x: u32, y: u32) -> Color {
        let band = (y * 16 / self.height) as u8;
        Color::rgb(16, 16 + band * 4, 48 + band * 8)
    }

    fn square_at(&self, frame: u32) -> Rectangle {
        let (x, y) = self.position(frame);
        let shade = (frame % 8) as u8 * 32;
        Rectangle::filled(x, y, self.square, self.square, Color::rgb(255, shade, 0))
    }

    /// Bounces horizontally along the middle row band.
    fn position(&self, frame: u32) -> (u32, u32) {
        let span = self.width - self.square;
        let y = (self.height - self.square) / 2;
        if span == 0 {
            return (0, y);
        }
        let travel = (frame * STEP) % (2 * span);
        let x = if travel <= span { travel } else { 2 * span - travel };
        (x, y)
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use vncap_core::{CaptureConfig, Session, record};

    use super::*;

    fn config(frames: u32) -> DemoConfig {
        DemoConfig {
            width: 40,
            height: 20,
            frames,
            render_delay_ms: 10,
        }
    }

    #[test]
    fn first_response_is_full_canvas() {
        let server = DemoServer::new(&config(5));
        let update = server.respond(&UpdateRequest::full_canvas(40, 20, false), 0);
        assert!(update.rects[0].is_full_canvas(40, 20));
    }

    #[test]
    fn incremental_response_covers_old_and_new_square() {
        let server = DemoServer::new(&config(5));
        let update = server.respond(&UpdateRequest::full_canvas(40, 20, true), 3);
        assert_eq!(update.rects.len(), 2);
        assert_eq!(update.rects[0].x, server.position(2).0);
        assert_eq!(update.rects[1].x, server.position(3).0);
        assert_eq!(update.rects[1].width, server.square);
    }

    #[test]
    fn square_stays_on_canvas() {
        let server = DemoServer::new(&config(0));
        for frame in 0..200 {
            let (x, y) = server.position(frame);
            assert!(x + server.square <= server.width, "frame {frame}");
            assert!(y + server.square <= server.height, "frame {frame}");
        }
    }

    #[test]
    fn degenerate_canvas_does_not_panic() {
        let server = DemoServer::new(&DemoConfig {
            width: 1,
            height: 1,
            frames: 1,
            render_delay_ms: 0,
        });
        assert_eq!(server.position(7), (0, 0));
        let update = server.respond(&UpdateRequest::full_canvas(1, 1, false), 0);
        assert!(update.rects[0].is_full_canvas(1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn records_until_the_source_ends() {
        let demo = config(6);
        let (session, peer) = Session::pair(demo.width, demo.height);
        let server = tokio::spawn(DemoServer::new(&demo).serve(peer));

        let timeline = record(session, &CaptureConfig::reactive(), CancellationToken::new())
            .await
            .unwrap();
        server.await.unwrap();

        assert_eq!(timeline.len(), 5);
        assert_eq!(timeline.delays().collect::<Vec<_>>(), vec![1; 5]);
    }
}
