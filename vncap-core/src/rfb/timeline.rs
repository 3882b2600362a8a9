//! From captured snapshots to an encoder-ready timeline.
//!
//! A [`Recording`] is what the capture loop produces: snapshots in
//! arrival order, each stamped when it arrived, plus the instant the
//! recording ended. The [`TimelineAssembler`] turns it into paletted
//! images with per-frame delays in centiseconds, the tick size of
//! animated GIFs.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::TimelineError;
use crate::rfb::framebuffer::Snapshot;
use crate::rfb::types::Color;

/// Largest palette an indexed frame may carry.
pub const MAX_PALETTE_COLORS: usize = 256;

/// Per-channel bit reductions tried by [`PalettePolicy::Reduce`], in
/// order. The last level leaves 3-3-2 bits, which always fits.
const REDUCTION_LEVELS: [[u32; 3]; 7] = [
    [0, 0, 0],
    [1, 1, 1],
    [2, 2, 2],
    [3, 3, 3],
    [4, 4, 4],
    [5, 5, 5],
    [5, 5, 6],
];

// ── PalettePolicy ────────────────────────────────────────────────

/// What to do with a frame holding more than 256 distinct colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PalettePolicy {
    /// Drop low-order channel bits until the frame fits.
    #[default]
    Reduce,
    /// Fail with [`TimelineError::PaletteOverflow`].
    Strict,
}

// ── PalettedImage ────────────────────────────────────────────────

/// An indexed-color image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PalettedImage {
    pub width: u32,
    pub height: u32,
    /// Distinct colors in first-appearance order (row-major scan).
    pub palette: Vec<Color>,
    /// One palette index per pixel, row-major.
    pub indices: Vec<u8>,
}

impl PalettedImage {
    /// Index `snapshot`, applying `policy` when it has too many colors.
    /// `frame` only labels the error.
    pub fn from_snapshot(
        snapshot: &Snapshot,
        policy: PalettePolicy,
        frame: usize,
    ) -> Result<Self, TimelineError> {
        let levels: &[[u32; 3]] = match policy {
            PalettePolicy::Strict => &REDUCTION_LEVELS[..1],
            PalettePolicy::Reduce => &REDUCTION_LEVELS,
        };

        for &shift in levels {
            if let Some((palette, indices)) = index_colors(snapshot.pixels(), shift) {
                return Ok(Self {
                    width: snapshot.width(),
                    height: snapshot.height(),
                    palette,
                    indices,
                });
            }
        }

        Err(TimelineError::PaletteOverflow {
            frame,
            colors: count_colors(snapshot.pixels()),
        })
    }

    /// Color at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn color_at(&self, x: u32, y: u32) -> Color {
        let i = y as usize * self.width as usize + x as usize;
        self.palette[self.indices[i] as usize]
    }

    /// Expand to tightly packed RGBA bytes (alpha always 255).
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.indices.len() * 4);
        for &i in &self.indices {
            let c = self.palette[i as usize];
            out.extend_from_slice(&[c.r, c.g, c.b, 0xFF]);
        }
        out
    }
}

/// Build a palette for `pixels` after reducing each by `shift`.
/// Returns `None` as soon as a 257th color shows up.
fn index_colors(pixels: &[Color], shift: [u32; 3]) -> Option<(Vec<Color>, Vec<u8>)> {
    let mut lookup: HashMap<Color, u8> = HashMap::new();
    let mut palette = Vec::new();
    let mut indices = Vec::with_capacity(pixels.len());

    for &px in pixels {
        let color = px.reduce(shift);
        let index = match lookup.get(&color) {
            Some(&i) => i,
            None => {
                if palette.len() == MAX_PALETTE_COLORS {
                    return None;
                }
                let i = palette.len() as u8;
                palette.push(color);
                lookup.insert(color, i);
                i
            }
        };
        indices.push(index);
    }
    Some((palette, indices))
}

fn count_colors(pixels: &[Color]) -> usize {
    pixels.iter().collect::<HashSet<_>>().len()
}

// ── Timeline ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineFrame {
    pub image: PalettedImage,
    /// How long this frame stays on screen, in 1/100 s.
    pub delay_cs: u16,
}

/// Ordered frames handed to an animated-image encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    pub width: u32,
    pub height: u32,
    pub frames: Vec<TimelineFrame>,
}

impl Timeline {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn delays(&self) -> impl Iterator<Item = u16> + '_ {
        self.frames.iter().map(|f| f.delay_cs)
    }
}

/// Convert an elapsed duration to centiseconds, rounded to nearest.
pub fn centiseconds(elapsed: Duration) -> u16 {
    let cs = (elapsed.as_millis() + 5) / 10;
    u16::try_from(cs).unwrap_or(u16::MAX)
}

// ── TimelineAssembler ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct TimelineAssembler {
    policy: PalettePolicy,
}

impl TimelineAssembler {
    pub fn new(policy: PalettePolicy) -> Self {
        Self { policy }
    }

    /// Pair each snapshot with its display delay.
    ///
    /// `timestamps` must hold exactly one more entry than `snapshots`;
    /// `delay[i]` is the gap between `timestamps[i]` and `timestamps[i + 1]`.
    pub fn assemble(
        &self,
        width: u32,
        height: u32,
        snapshots: &[Snapshot],
        timestamps: &[Instant],
    ) -> Result<Timeline, TimelineError> {
        if timestamps.len() != snapshots.len() + 1 {
            return Err(TimelineError::TimestampCount {
                expected: snapshots.len() + 1,
                actual: timestamps.len(),
            });
        }

        let frames = snapshots
            .iter()
            .zip(timestamps.windows(2))
            .enumerate()
            .map(|(i, (snapshot, pair))| {
                Ok::<_, TimelineError>(TimelineFrame {
                    image: PalettedImage::from_snapshot(snapshot, self.policy, i)?,
                    delay_cs: centiseconds(pair[1].saturating_duration_since(pair[0])),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Timeline {
            width,
            height,
            frames,
        })
    }
}

// ── Recording ────────────────────────────────────────────────────

/// Raw output of a capture loop.
///
/// Holds `snapshots.len() + 1` timestamps once finished: one per
/// snapshot plus the instant recording ended.
#[derive(Debug, Clone)]
pub struct Recording {
    width: u32,
    height: u32,
    snapshots: Vec<Snapshot>,
    timestamps: Vec<Instant>,
}

impl Recording {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            snapshots: Vec::new(),
            timestamps: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn timestamps(&self) -> &[Instant] {
        &self.timestamps
    }

    /// Number of captured frames.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub(crate) fn push_frame(&mut self, snapshot: Snapshot, shown_at: Instant) {
        self.snapshots.push(snapshot);
        self.timestamps.push(shown_at);
    }

    /// Append the trailing timestamp that closes the last frame.
    pub(crate) fn finish(&mut self, at: Instant) {
        self.timestamps.push(at);
    }

    pub fn assemble(&self, policy: PalettePolicy) -> Result<Timeline, TimelineError> {
        TimelineAssembler::new(policy).assemble(
            self.width,
            self.height,
            &self.snapshots,
            &self.timestamps,
        )
    }
}

// ── Tests ────────────────────────────────────────────────────────
