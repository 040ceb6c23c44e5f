//! Raster types shared by every effect and sink.
//!
//! A [`Frame`] is the immutable unit handed to a display sink. Effects build
//! frames through a [`Canvas`], which owns a mutable pixel buffer and clips
//! every primitive to its bounds.

mod canvas;

use serde::{Deserialize, Serialize};

pub use canvas::Canvas;

/// 24-bit colour, one byte per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#RRGGBB` or `RRGGBB`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self::new(r, g, b))
    }

    /// Builds a colour from floating point channels in `[0, 1]`.
    pub fn from_unit(r: f32, g: f32, b: f32) -> Self {
        Self::new(unit_to_byte(r), unit_to_byte(g), unit_to_byte(b))
    }

    /// Multiplies every channel by `factor`, clamped to `[0, 1]`.
    pub fn scale(self, factor: f32) -> Self {
        let factor = if factor.is_finite() {
            factor.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self::new(
            (self.r as f32 * factor) as u8,
            (self.g as f32 * factor) as u8,
            (self.b as f32 * factor) as u8,
        )
    }

    pub fn saturating_add(self, other: Rgb) -> Self {
        Self::new(
            self.r.saturating_add(other.r),
            self.g.saturating_add(other.g),
            self.b.saturating_add(other.b),
        )
    }

    /// Linear blend between `self` and `other`; `t` is clamped to `[0, 1]`.
    pub fn lerp(self, other: Rgb, t: f32) -> Self {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t) as u8;
        Self::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }

    pub fn is_black(self) -> bool {
        self == Self::BLACK
    }
}

fn unit_to_byte(value: f32) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    (value.clamp(0.0, 1.0) * 255.0) as u8
}

/// Fully rendered raster destined for a display sink.
///
/// Frames are immutable: the only way to obtain one is to finish a
/// [`Canvas`], and each frame owns its own pixel storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    pixels: Vec<Rgb>,
}

impl Frame {
    /// An all-black frame of the given size.
    pub fn blank(width: usize, height: usize) -> Self {
        Canvas::new(width, height).into_frame()
    }

    pub(crate) fn from_parts(width: usize, height: usize, pixels: Vec<Rgb>) -> Self {
        debug_assert_eq!(width * height, pixels.len());
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y * self.width + x).copied()
    }

    /// Row-major pixel slice.
    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Rgb]> {
        self.pixels.chunks(self.width.max(1))
    }

    /// Packed `RGBRGB...` bytes, row-major.
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 3);
        for px in &self.pixels {
            bytes.extend_from_slice(&[px.r, px.g, px.b]);
        }
        bytes
    }

    /// Number of pixels that are not black.
    pub fn lit_count(&self) -> usize {
        self.pixels.iter().filter(|px| !px.is_black()).count()
    }

    /// Returns a copy with every pixel scaled by `brightness`.
    pub fn scaled(&self, brightness: f32) -> Frame {
        Frame {
            width: self.width,
            height: self.height,
            pixels: self.pixels.iter().map(|px| px.scale(brightness)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colours() {
        assert_eq!(Rgb::from_hex("#DE183C"), Some(Rgb::new(0xDE, 0x18, 0x3C)));
        assert_eq!(Rgb::from_hex("0c79bb"), Some(Rgb::new(0x0C, 0x79, 0xBB)));
        assert_eq!(Rgb::from_hex("#12345"), None);
        assert_eq!(Rgb::from_hex("#zz0000"), None);
    }

    #[test]
    fn scaling_and_blending_stay_in_range() {
        let c = Rgb::new(200, 100, 50);
        assert_eq!(c.scale(0.5), Rgb::new(100, 50, 25));
        assert_eq!(c.scale(7.0), c);
        assert_eq!(c.scale(f32::NAN), Rgb::BLACK);
        assert_eq!(Rgb::BLACK.lerp(Rgb::WHITE, 2.0), Rgb::WHITE);
        assert_eq!(
            Rgb::new(250, 10, 0).saturating_add(Rgb::new(10, 10, 0)),
            Rgb::new(255, 20, 0)
        );
    }

    #[test]
    fn frame_accessors_respect_bounds() {
        let mut canvas = Canvas::new(4, 3);
        canvas.set(3, 2, Rgb::WHITE);
        let frame = canvas.into_frame();

        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 3);
        assert_eq!(frame.pixel(3, 2), Some(Rgb::WHITE));
        assert_eq!(frame.pixel(4, 0), None);
        assert_eq!(frame.lit_count(), 1);
        assert_eq!(frame.to_rgb_bytes().len(), 4 * 3 * 3);
        assert_eq!(frame.rows().count(), 3);
    }
}
