//! Software-rendered overlay drawn on top of each camera frame.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ VOLUME: 62%                                  │
//! │                                              │
//! │              ● index tip (blue)              │
//! │               \                              │
//! │                \  pinch line (cyan)          │
//! │                 ● thumb tip (green)          │
//! │           [landmark skeleton]                │
//! │                                              │
//! │ q=quit                                       │
//! └──────────────────────────────────────────────┘
//! ```

use pinch_map::{PinchReading, Point};

use crate::camera::Frame;
use crate::landmarks::{HandLandmarks, HAND_CONNECTIONS};

// ════════════════════════════════════════════════════════════════════════════
// Colors / sizes
// ════════════════════════════════════════════════════════════════════════════

pub const INDEX_TIP_COLOR: u32 = 0xFF0000FF;  // blue
pub const THUMB_TIP_COLOR: u32 = 0xFF00FF00;  // green
pub const PINCH_LINE_COLOR: u32 = 0xFF00FFFF; // cyan
pub const TEXT_COLOR:      u32 = 0xFF00FF00;
pub const LANDMARK_COLOR:  u32 = 0xFFFF0000;  // red
pub const BONE_COLOR:      u32 = 0xFFFFFFFF;
const LEGEND_COLOR:        u32 = 0xFFCCCCCC;

pub const TIP_RADIUS:       i32   = 10;
const LANDMARK_RADIUS:      i32   = 2;
const BONE_THICKNESS:       i32   = 2;
const PINCH_LINE_THICKNESS: i32   = 2;
const TEXT_SCALE:           usize = 4;
/// Baseline of the volume readout.
pub const TEXT_ORIGIN: (usize, usize) = (10, 50);

// ════════════════════════════════════════════════════════════════════════════
// Canvas
// ════════════════════════════════════════════════════════════════════════════

/// ARGB pixel buffer the overlay is drawn into and the preview displays.
#[derive(Clone, Debug)]
pub struct Canvas {
    pub width:  usize,
    pub height: usize,
    pub buf:    Vec<u32>,
}

impl Canvas {
    #[cfg(test)]
    pub fn new(width: usize, height: usize, color: u32) -> Self {
        Canvas { width, height, buf: vec![color; width * height] }
    }

    pub fn from_frame(frame: &Frame) -> Self {
        Canvas { width: frame.width, height: frame.height, buf: frame.to_argb() }
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        if x < self.width && y < self.height {
            Some(self.buf[y * self.width + x])
        } else {
            None
        }
    }

    // ── High-level overlay ────────────────────────────────────────────────

    /// Landmark skeleton: bones as lines, joints as dots.
    pub fn draw_hand(&mut self, hand: &HandLandmarks) {
        let pts = hand.to_pixels(self.width, self.height);
        for &(a, b) in HAND_CONNECTIONS.iter() {
            self.draw_line(pts[a], pts[b], BONE_THICKNESS, BONE_COLOR);
        }
        for &p in pts.iter() {
            self.fill_circle(p, LANDMARK_RADIUS, LANDMARK_COLOR);
        }
    }

    /// Fingertip markers and the line between them.
    pub fn draw_pinch(&mut self, reading: &PinchReading) {
        self.fill_circle(reading.index, TIP_RADIUS, INDEX_TIP_COLOR);
        self.fill_circle(reading.thumb, TIP_RADIUS, THUMB_TIP_COLOR);
        self.draw_line(reading.index, reading.thumb, PINCH_LINE_THICKNESS, PINCH_LINE_COLOR);
    }

    /// `Volume: N%` with its baseline at [`TEXT_ORIGIN`].
    pub fn draw_volume_text(&mut self, percent: u8) {
        let (x, baseline) = TEXT_ORIGIN;
        let top = baseline.saturating_sub(5 * TEXT_SCALE);
        self.draw_label(&format!("Volume: {}%", percent), x, top, TEXT_SCALE, TEXT_COLOR);
    }

    pub fn draw_legend(&mut self, text: &str) {
        let y = self.height.saturating_sub(5 * 2 + 8);
        self.draw_label(text, 10, y, 2, LEGEND_COLOR);
    }

    // ── Primitive drawing helpers ─────────────────────────────────────────

    pub fn set_pixel(&mut self, x: i32, y: i32, color: u32) {
        if x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height {
            self.buf[y as usize * self.width + x as usize] = color;
        }
    }

    pub fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        for row in y..(y + h).min(self.height) {
            for col in x..(x + w).min(self.width) {
                self.buf[row * self.width + col] = color;
            }
        }
    }

    pub fn fill_circle(&mut self, c: Point, r: i32, color: u32) {
        let r2 = r * r;
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy <= r2 {
                    self.set_pixel(c.x + dx, c.y + dy, color);
                }
            }
        }
    }

    /// Bresenham line, thickened by stamping a square brush.
    pub fn draw_line(&mut self, a: Point, b: Point, thickness: i32, color: u32) {
        let half = (thickness.max(1) - 1) / 2;
        let extra = (thickness.max(1) - 1) - half;
        let (mut x, mut y) = (a.x, a.y);
        let dx = (b.x - a.x).abs();
        let dy = -(b.y - a.y).abs();
        let sx = if a.x < b.x { 1 } else { -1 };
        let sy = if a.y < b.y { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            for oy in -half..=extra {
                for ox in -half..=extra {
                    self.set_pixel(x + ox, y + oy, color);
                }
            }
            if x == b.x && y == b.y { break; }
            let e2 = 2 * err;
            if e2 >= dy { err += dy; x += sx; }
            if e2 <= dx { err += dx; y += sy; }
        }
    }

    /// Minimal bitmap font: 3×5 glyphs, each bit drawn as a `scale`² block.
    pub fn draw_label(&mut self, text: &str, x: usize, y: usize, scale: usize, color: u32) {
        let scale = scale.max(1);
        let mut cx = x;
        for ch in text.chars() {
            let glyph = char_glyph(ch);
            for (row, &bits) in glyph.iter().enumerate() {
                for col in 0..3usize {
                    if bits & (1 << (2 - col)) != 0 {
                        self.fill_rect(cx + col * scale, y + row * scale, scale, scale, color);
                    }
                }
            }
            cx += 4 * scale; // 3 wide + 1 gap
            if cx + 4 * scale > self.width { break; }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Minimal 3×5 bitmap font
// ────────────────────────────────────────────────────────────────────────────

fn char_glyph(c: char) -> [u8; 5] {
    match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'a' | 'A' => [0b111, 0b101, 0b111, 0b101, 0b101],
        'c' | 'C' => [0b111, 0b100, 0b100, 0b100, 0b111],
        'e' | 'E' => [0b111, 0b100, 0b111, 0b100, 0b111],
        'h' | 'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'i' | 'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'l' | 'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'm' | 'M' => [0b101, 0b111, 0b101, 0b101, 0b101],
        'n' | 'N' => [0b111, 0b101, 0b101, 0b101, 0b101],
        'o' | 'O' => [0b111, 0b101, 0b101, 0b101, 0b111],
        'q' | 'Q' => [0b111, 0b101, 0b101, 0b111, 0b001],
        't' | 'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'u' | 'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'v' | 'V' => [0b101, 0b101, 0b101, 0b010, 0b010],
        '%' => [0b101, 0b001, 0b010, 0b100, 0b101],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        ' ' => [0b000, 0b000, 0b000, 0b000, 0b000],
        _   => [0b000, 0b000, 0b010, 0b000, 0b000], // fallback dot
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
