//! Shared types for the capture pipeline.
//!
//! These mirror what a remote-framebuffer session delivers once the
//! pixel format has been negotiated: raw RGB rectangles, update
//! requests, and the server message envelope.

// ── Color ────────────────────────────────────────────────────────

/// An opaque RGB pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Clear the lowest `shift[c]` bits of each channel `c` (R, G, B).
    pub(crate) const fn reduce(self, shift: [u32; 3]) -> Self {
        Self {
            r: self.r & (0xFFu8 << shift[0]),
            g: self.g & (0xFFu8 << shift[1]),
            b: self.b & (0xFFu8 << shift[2]),
        }
    }
}

// ── Rectangle ────────────────────────────────────────────────────

/// A region of raw pixels, row-major, `width * height` entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rectangle {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Color>,
}

impl Rectangle {
    pub fn new(x: u32, y: u32, width: u32, height: u32, pixels: Vec<Color>) -> Self {
        Self {
            x,
            y,
            width,
            height,
            pixels,
        }
    }

    /// A rectangle where every pixel has the same color.
    pub fn filled(x: u32, y: u32, width: u32, height: u32, color: Color) -> Self {
        let count = width as usize * height as usize;
        Self::new(x, y, width, height, vec![color; count])
    }

    /// Whether this rectangle covers an entire `width × height` canvas.
    pub fn is_full_canvas(&self, width: u32, height: u32) -> bool {
        self.x == 0 && self.y == 0 && self.width == width && self.height == height
    }

    /// Pixel row `row` of this rectangle.
    pub fn row(&self, row: u32) -> &[Color] {
        let start = row as usize * self.width as usize;
        &self.pixels[start..start + self.width as usize]
    }
}

// ── UpdateRequest ────────────────────────────────────────────────

/// A framebuffer update request sent to the server.
///
/// `incremental = false` asks for the complete region; `true` asks only
/// for what changed since the last update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateRequest {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub incremental: bool,
}

impl UpdateRequest {
    pub fn full_canvas(width: u32, height: u32, incremental: bool) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
            incremental,
        }
    }
}

// ── Server messages ──────────────────────────────────────────────

/// One framebuffer update: rectangles in draw order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateMessage {
    pub rects: Vec<Rectangle>,
}

impl UpdateMessage {
    pub fn new(rects: Vec<Rectangle>) -> Self {
        Self { rects }
    }
}

/// Messages a server may push on the inbound channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    FramebufferUpdate(UpdateMessage),
    Bell,
    ServerCutText(String),
}

impl ServerMessage {
    /// Short name used in logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::FramebufferUpdate(_) => "framebuffer update",
            ServerMessage::Bell => "bell",
            ServerMessage::ServerCutText(_) => "server cut text",
        }
    }
}

impl From<UpdateMessage> for ServerMessage {
    fn from(msg: UpdateMessage) -> Self {
        ServerMessage::FramebufferUpdate(msg)
    }
}
