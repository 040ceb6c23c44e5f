//! Colour tables: fire palettes, text colour schemes and the accent palettes
//! the geometric effects draw from.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{render::Rgb, LedMatrixError};

/// Palette styles for the fire effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FireStyle {
    Classic,
    Blue,
    Purple,
}

impl FireStyle {
    pub const ALL: [FireStyle; 3] = [FireStyle::Classic, FireStyle::Blue, FireStyle::Purple];

    pub fn name(self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Blue => "blue",
            Self::Purple => "purple",
        }
    }
}

impl FromStr for FireStyle {
    type Err = LedMatrixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "classic" => Ok(Self::Classic),
            "blue" => Ok(Self::Blue),
            "purple" => Ok(Self::Purple),
            _ => Err(LedMatrixError::UnknownPalette(s.to_string())),
        }
    }
}

/// 256-entry heat-to-colour table.
///
/// Every table is injective, so [`FirePalette::index_of`] inverts
/// [`FirePalette::color`] exactly.
#[derive(Debug, Clone)]
pub struct FirePalette {
    style: FireStyle,
    colors: Vec<Rgb>,
}

impl FirePalette {
    pub fn new(style: FireStyle) -> Self {
        let colors = (0..=255u8).map(|i| fire_entry(style, i)).collect();
        Self { style, colors }
    }

    pub fn style(&self) -> FireStyle {
        self.style
    }

    pub fn color(&self, index: u8) -> Rgb {
        self.colors[index as usize]
    }

    pub fn index_of(&self, color: Rgb) -> Option<u8> {
        self.colors
            .iter()
            .position(|c| *c == color)
            .and_then(|i| u8::try_from(i).ok())
    }
}

fn fire_entry(style: FireStyle, i: u8) -> Rgb {
    let i = i as u16;
    let byte = |v: u16| v.min(255) as u8;
    match style {
        // black -> red -> orange -> yellow -> white
        FireStyle::Classic => match i {
            0..=63 => Rgb::new(byte(i * 4), 0, 0),
            64..=127 => Rgb::new(255, byte((i - 64) * 2), 0),
            128..=191 => Rgb::new(255, byte(128 + (i - 128) * 2), 0),
            _ => Rgb::new(255, 255, byte((i - 192) * 4 + 3)),
        },
        FireStyle::Blue => match i {
            0..=63 => Rgb::new(0, 0, byte(i * 2)),
            64..=127 => Rgb::new(0, byte((i - 64) * 2 + 2), byte(128 + (i - 64) * 2)),
            _ => Rgb::new(byte((i - 128) * 2), byte((i - 128) * 2), 255),
        },
        FireStyle::Purple => match i {
            0..=63 => Rgb::new(byte(i), 0, byte(i * 2)),
            64..=127 => Rgb::new(byte(64 + (i - 64) * 2), 0, byte(128 + (i - 64) * 2)),
            _ => Rgb::new(byte(192 + (i - 128) / 2), byte((i - 128) * 2), 255),
        },
    }
}

/// Glow/main/background triple used by text rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextScheme {
    pub glow: Rgb,
    pub main: Rgb,
    pub background: Rgb,
}

pub const TEXT_SCHEMES: [&str; 7] = ["blue", "green", "red", "purple", "yellow", "cyan", "white"];

impl TextScheme {
    pub fn named(name: &str) -> crate::Result<Self> {
        let (glow, main) = match name.to_ascii_lowercase().as_str() {
            "blue" => (Rgb::new(0, 50, 100), Rgb::new(0, 200, 255)),
            "green" => (Rgb::new(0, 50, 0), Rgb::new(0, 255, 0)),
            "red" => (Rgb::new(50, 0, 0), Rgb::new(255, 0, 0)),
            "purple" => (Rgb::new(50, 0, 50), Rgb::new(255, 0, 255)),
            "yellow" => (Rgb::new(50, 50, 0), Rgb::new(255, 255, 0)),
            "cyan" => (Rgb::new(0, 50, 50), Rgb::new(0, 255, 255)),
            "white" => (Rgb::new(50, 50, 50), Rgb::new(255, 255, 255)),
            _ => return Err(LedMatrixError::UnknownPalette(name.to_string())),
        };
        Ok(Self {
            glow,
            main,
            background: Rgb::BLACK,
        })
    }
}

/// Accent colours used by the fireworks bursts.
pub const FIREWORK_COLORS: [Rgb; 6] = [
    Rgb::new(237, 52, 65),
    Rgb::new(255, 214, 48),
    Rgb::new(50, 159, 227),
    Rgb::new(8, 172, 126),
    Rgb::new(222, 217, 223),
    Rgb::new(254, 77, 3),
];

/// Accent colours cycled by the square morph.
pub const MORPH_COLORS: [Rgb; 6] = [
    Rgb::new(0xDE, 0x18, 0x3C),
    Rgb::new(0xF2, 0xB5, 0x41),
    Rgb::new(0x0C, 0x79, 0xBB),
    Rgb::new(0xEC, 0x4E, 0x20),
    Rgb::new(0x00, 0x91, 0x6E),
    Rgb::new(0xF6, 0x54, 0xA9),
];

/// HSV to RGB with all components in `[0, 1]`. Hue wraps.
pub fn hsv(h: f32, s: f32, v: f32) -> Rgb {
    let h = if h.is_finite() { h.rem_euclid(1.0) * 6.0 } else { 0.0 };
    let s = crate::easing::clamp_unit(s);
    let v = crate::easing::clamp_unit(v);
    let sector = h.floor();
    let f = h - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    let (r, g, b) = match sector as u8 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    Rgb::from_unit(r, g, b)
}

/// Cosine gradient `a + b * cos(2pi * (c * t + d))` per channel.
pub fn cosine_gradient(t: f32, a: [f32; 3], b: [f32; 3], c: [f32; 3], d: [f32; 3]) -> [f32; 3] {
    let mut out = [0.0; 3];
    for i in 0..3 {
        out[i] = a[i] + b[i] * (std::f32::consts::TAU * (c[i] * t + d[i])).cos();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fire_palettes_round_trip_every_index() {
        for style in FireStyle::ALL {
            let palette = FirePalette::new(style);
            for i in 0..=255u8 {
                let color = palette.color(i);
                assert_eq!(palette.index_of(color), Some(i), "{style:?} index {i}");
            }
        }
    }

    #[test]
    fn fire_palettes_start_dark_and_end_bright() {
        for style in FireStyle::ALL {
            let palette = FirePalette::new(style);
            assert_eq!(palette.color(0), Rgb::BLACK);
            let top = palette.color(255);
            assert!(top.r as u16 + top.g as u16 + top.b as u16 > 600, "{style:?}");
        }
    }

    #[test]
    fn parses_palette_names() {
        assert_eq!("Blue".parse::<FireStyle>().unwrap(), FireStyle::Blue);
        let err = "green".parse::<FireStyle>().unwrap_err();
        assert!(matches!(err, LedMatrixError::UnknownPalette(name) if name == "green"));
    }

    #[test]
    fn text_schemes_cover_documented_names() {
        for name in TEXT_SCHEMES {
            assert!(TextScheme::named(name).is_ok(), "{name}");
        }
        assert!(TextScheme::named("orange").is_err());
    }

    #[test]
    fn hsv_primary_hues() {
        assert_eq!(hsv(0.0, 1.0, 1.0), Rgb::new(255, 0, 0));
        assert_eq!(hsv(1.0 / 3.0, 1.0, 1.0).g, 255);
        assert_eq!(hsv(2.0 / 3.0, 1.0, 1.0).b, 255);
        assert_eq!(hsv(0.5, 0.0, 0.0), Rgb::BLACK);
    }
}
