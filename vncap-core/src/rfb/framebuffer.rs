//! Canonical full-resolution framebuffer.
//!
//! Reconstructs the remote screen from a baseline full-canvas rectangle
//! followed by partial updates. Rectangles are applied in draw order, so
//! when two rectangles of one update overlap the later one wins.

use std::sync::Arc;

use crate::error::FrameBufferError;
use crate::rfb::types::{Color, Rectangle};

// ── Snapshot ─────────────────────────────────────────────────────

/// An immutable copy of the framebuffer taken at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    width: u32,
    height: u32,
    pixels: Arc<[Color]>,
}

impl Snapshot {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    /// Pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Color {
        self.pixels[y as usize * self.width as usize + x as usize]
    }
}

// ── FrameBuffer ──────────────────────────────────────────────────

/// Owns the reconstructed screen.
///
/// The backing store is only allocated once [`establish_baseline`]
/// succeeds; until then merges fail with [`FrameBufferError::NoBaseline`].
///
/// [`establish_baseline`]: Self::establish_baseline
#[derive(Debug)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Option<Vec<Color>>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn has_baseline(&self) -> bool {
        self.pixels.is_some()
    }

    /// Pixel at `(x, y)`, or `None` before the baseline or out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let pixels = self.pixels.as_ref()?;
        Some(pixels[y as usize * self.width as usize + x as usize])
    }

    /// Install `rect` as the initial screen contents.
    ///
    /// Only a rectangle covering the whole canvas qualifies, and only once.
    pub fn establish_baseline(&mut self, rect: Rectangle) -> Result<(), FrameBufferError> {
        if self.pixels.is_some() {
            return Err(FrameBufferError::BaselineExists);
        }
        if !rect.is_full_canvas(self.width, self.height) {
            return Err(FrameBufferError::NotFullCanvas);
        }
        self.validate(&rect)?;
        self.pixels = Some(rect.pixels);
        Ok(())
    }

    /// Merge `rects` into the buffer in list order.
    ///
    /// Every rectangle is validated before any pixel is written, so a
    /// failed update leaves the buffer unchanged.
    pub fn apply_rectangles(&mut self, rects: &[Rectangle]) -> Result<(), FrameBufferError> {
        if !self.has_baseline() {
            return Err(FrameBufferError::NoBaseline);
        }
        for rect in rects {
            self.validate(rect)?;
        }

        let fb_width = self.width as usize;
        let Some(pixels) = self.pixels.as_mut() else {
            return Err(FrameBufferError::NoBaseline);
        };

        for rect in rects {
            let width = rect.width as usize;
            for row in 0..rect.height {
                let start = (rect.y + row) as usize * fb_width + rect.x as usize;
                pixels[start..start + width].copy_from_slice(rect.row(row));
            }
        }
        Ok(())
    }

    /// Copy the current contents, or `None` before the baseline.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.pixels.as_ref().map(|pixels| Snapshot {
            width: self.width,
            height: self.height,
            pixels: Arc::from(pixels.as_slice()),
        })
    }

    // ── Internal ─────────────────────────────────────────────────

    fn validate(&self, rect: &Rectangle) -> Result<(), FrameBufferError> {
        let right = rect.x.checked_add(rect.width);
        let bottom = rect.y.checked_add(rect.height);
        let in_bounds = matches!(right, Some(r) if r <= self.width)
            && matches!(bottom, Some(b) if b <= self.height);
        if !in_bounds {
            return Err(FrameBufferError::OutOfBounds {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                fb_width: self.width,
                fb_height: self.height,
            });
        }

        let expected = rect.width as usize * rect.height as usize;
        if rect.pixels.len() != expected {
            return Err(FrameBufferError::PixelCountMismatch {
                expected,
                actual: rect.pixels.len(),
            });
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Color = Color::rgb(255, 0, 0);
    const BLUE: Color = Color::rgb(0, 0, 255);

    fn with_baseline(w: u32, h: u32, fill: Color) -> FrameBuffer {
        let mut fb = FrameBuffer::new(w, h);
        fb.establish_baseline(Rectangle::filled(0, 0, w, h, fill))
            .unwrap();
        fb
    }

    #[test]
    fn merge_before_baseline_is_rejected() {
        let mut fb = FrameBuffer::new(10, 20);
        let err = fb
            .apply_rectangles(&[Rectangle::filled(5, 10, 5, 10, Color::WHITE)])
            .unwrap_err();
        assert_eq!(err, FrameBufferError::NoBaseline);
        assert!(!fb.has_baseline());
        assert!(fb.snapshot().is_none());
    }

    #[test]
    fn baseline_requires_full_canvas() {
        let mut fb = FrameBuffer::new(10, 20);
        let err = fb
            .establish_baseline(Rectangle::filled(0, 0, 10, 10, Color::BLACK))
            .unwrap_err();
        assert_eq!(err, FrameBufferError::NotFullCanvas);
        assert!(!fb.has_baseline());
    }

    #[test]
    fn baseline_is_established_once() {
        let mut fb = with_baseline(4, 4, Color::BLACK);
        let err = fb
            .establish_baseline(Rectangle::filled(0, 0, 4, 4, Color::WHITE))
            .unwrap_err();
        assert_eq!(err, FrameBufferError::BaselineExists);
        assert_eq!(fb.pixel(0, 0), Some(Color::BLACK));
    }

    #[test]
    fn partial_rectangle_lands_at_offset() {
        let mut fb = with_baseline(10, 20, Color::BLACK);
        fb.apply_rectangles(&[Rectangle::filled(5, 10, 5, 10, Color::WHITE)])
            .unwrap();

        assert_eq!(fb.pixel(4, 10), Some(Color::BLACK));
        assert_eq!(fb.pixel(5, 9), Some(Color::BLACK));
        assert_eq!(fb.pixel(5, 10), Some(Color::WHITE));
        assert_eq!(fb.pixel(9, 19), Some(Color::WHITE));
    }

    #[test]
    fn later_rectangle_wins_on_overlap() {
        let mut fb = with_baseline(8, 8, Color::BLACK);
        fb.apply_rectangles(&[
            Rectangle::filled(0, 0, 6, 6, RED),
            Rectangle::filled(3, 3, 5, 5, BLUE),
        ])
        .unwrap();

        for y in 3..6 {
            for x in 3..6 {
                assert_eq!(fb.pixel(x, y), Some(BLUE), "overlap pixel ({x},{y})");
            }
        }
        assert_eq!(fb.pixel(0, 0), Some(RED));
        assert_eq!(fb.pixel(7, 7), Some(BLUE));
        assert_eq!(fb.pixel(7, 0), Some(Color::BLACK));
    }

    #[test]
    fn out_of_bounds_update_leaves_buffer_untouched() {
        let mut fb = with_baseline(10, 20, Color::BLACK);
        let err = fb
            .apply_rectangles(&[
                Rectangle::filled(0, 0, 2, 2, RED),
                Rectangle::filled(8, 0, 5, 1, RED),
            ])
            .unwrap_err();

        assert!(matches!(err, FrameBufferError::OutOfBounds { x: 8, .. }));
        assert_eq!(fb.pixel(0, 0), Some(Color::BLACK));
    }

    #[test]
    fn coordinate_overflow_is_out_of_bounds() {
        let mut fb = with_baseline(4, 4, Color::BLACK);
        let err = fb
            .apply_rectangles(&[Rectangle::new(u32::MAX, 0, 2, 1, vec![RED; 2])])
            .unwrap_err();
        assert!(matches!(err, FrameBufferError::OutOfBounds { .. }));
    }

    #[test]
    fn pixel_count_must_match_dimensions() {
        let mut fb = with_baseline(4, 4, Color::BLACK);
        let err = fb
            .apply_rectangles(&[Rectangle::new(0, 0, 2, 2, vec![RED; 3])])
            .unwrap_err();
        assert_eq!(
            err,
            FrameBufferError::PixelCountMismatch {
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn snapshot_is_independent_of_later_merges() {
        let mut fb = with_baseline(2, 2, Color::BLACK);
        let before = fb.snapshot().unwrap();
        fb.apply_rectangles(&[Rectangle::filled(0, 0, 2, 2, Color::WHITE)])
            .unwrap();

        assert_eq!(before.pixel(1, 1), Color::BLACK);
        assert_eq!(fb.snapshot().unwrap().pixel(1, 1), Color::WHITE);
    }
}
