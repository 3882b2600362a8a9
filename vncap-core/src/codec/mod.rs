//! Animated GIF output for an assembled [`Timeline`].
//!
//! Frames reach the encoder as RGBA expanded from each
//! [`PalettedImage`](crate::rfb::timeline::PalettedImage); the encoder
//! builds its own per-frame palette from those pixels. A frame with at
//! most 256 colors is palettized exactly, so the colors match the
//! assembled palette even though its ordering and indices are not
//! reused.

use std::io::Write;

use image::codecs::gif::{GifEncoder, Repeat as GifRepeat};
use image::{Delay, Frame, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CaptureError;
use crate::rfb::timeline::Timeline;

/// How many times the animation plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Repeat {
    /// Play once and stop on the last frame.
    #[default]
    Once,
    /// Loop forever.
    Infinite,
    /// Play `n` additional times after the first.
    Times(u16),
}

/// Encodes timelines as animated GIFs.
#[derive(Debug, Clone, Copy)]
pub struct GifTimelineEncoder {
    repeat: Repeat,
    /// Encoder speed, 1 (best) ..= 30 (fastest).
    speed: i32,
}

impl Default for GifTimelineEncoder {
    fn default() -> Self {
        Self {
            repeat: Repeat::Once,
            speed: 10,
        }
    }
}

impl GifTimelineEncoder {
    pub fn new(repeat: Repeat) -> Self {
        Self {
            repeat,
            ..Self::default()
        }
    }

    /// Encoder speed, clamped to `1..=30`.
    pub fn with_speed(mut self, speed: i32) -> Self {
        self.speed = speed.clamp(1, 30);
        self
    }

    /// Write `timeline` to `writer`.
    pub fn encode<W: Write>(&self, timeline: &Timeline, writer: W) -> Result<(), CaptureError> {
        if timeline.is_empty() {
            return Err(CaptureError::Encoding("timeline has no frames".into()));
        }

        let mut encoder = GifEncoder::new_with_speed(writer, self.speed);
        match self.repeat {
            Repeat::Once => {}
            Repeat::Infinite => encoder.set_repeat(GifRepeat::Infinite)?,
            Repeat::Times(n) => encoder.set_repeat(GifRepeat::Finite(n))?,
        }

        let mut frames = Vec::with_capacity(timeline.len());
        for (i, frame) in timeline.frames.iter().enumerate() {
            let image = &frame.image;
            let buffer = RgbaImage::from_raw(image.width, image.height, image.to_rgba())
                .ok_or_else(|| CaptureError::Encoding(format!("frame {i} has a short buffer")))?;
            let delay = Delay::from_numer_denom_ms(u32::from(frame.delay_cs) * 10, 1);
            frames.push(Frame::from_parts(buffer, 0, 0, delay));
        }

        encoder.encode_frames(frames)?;
        debug!(
            frames = timeline.len(),
            width = timeline.width,
            height = timeline.height,
            "gif encoded"
        );
        Ok(())
    }

    /// Encode into an in-memory buffer.
    pub fn encode_to_vec(&self, timeline: &Timeline) -> Result<Vec<u8>, CaptureError> {
        let mut out = Vec::new();
        self.encode(timeline, &mut out)?;
        Ok(out)
    }
}
