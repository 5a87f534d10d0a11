//! Color types for brushgrid.
//!
//! Palettes are authored as `#rrggbb` strings and stored as [`Srgb`]. Brush
//! layer tints are jittered in [`Hsb`] (hue in degrees, saturation and
//! brightness in percent), the color model the painting was designed in.

use crate::error::GridError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// sRGB color with components in [0, 1].
///
/// Serializes as a hex string `"#rrggbb"`; the round-trip is quantized to
/// 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Srgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

/// Hue / saturation / brightness. `h` in [0, 360), `s` and `b` in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsb {
    pub h: f64,
    pub s: f64,
    pub b: f64,
}

impl Srgb {
    pub const BLACK: Srgb = Srgb {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    /// Parses `"#ff00aa"` or `"ff00aa"` (case insensitive).
    pub fn from_hex(hex: &str) -> Result<Srgb, GridError> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(GridError::InvalidColor(format!(
                "expected 6 hex digits, got '{hex}'"
            )));
        }
        let channel = |range: std::ops::Range<usize>, name: &str| {
            u8::from_str_radix(&hex[range], 16)
                .map_err(|e| GridError::InvalidColor(format!("invalid {name} component: {e}")))
        };
        let r = channel(0..2, "red")?;
        let g = channel(2..4, "green")?;
        let b = channel(4..6, "blue")?;
        Ok(Srgb::from_rgb8([r, g, b]))
    }

    /// Builds a color from 8-bit channels.
    pub fn from_rgb8(rgb: [u8; 3]) -> Srgb {
        Srgb {
            r: rgb[0] as f64 / 255.0,
            g: rgb[1] as f64 / 255.0,
            b: rgb[2] as f64 / 255.0,
        }
    }

    /// Quantizes to 8-bit channels with rounding.
    pub fn to_rgb8(self) -> [u8; 3] {
        let q = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b)]
    }

    /// Formats as lowercase `"#rrggbb"`.
    pub fn to_hex(self) -> String {
        let [r, g, b] = self.to_rgb8();
        format!("#{r:02x}{g:02x}{b:02x}")
    }

    /// Rec.601 luma in [0, 1]; used to order swatches from light to dark.
    pub fn luma(self) -> f64 {
        0.299 * self.r + 0.587 * self.g + 0.114 * self.b
    }

    pub fn to_hsb(self) -> Hsb {
        let max = self.r.max(self.g).max(self.b);
        let min = self.r.min(self.g).min(self.b);
        let delta = max - min;
        let h = if delta < 1e-12 {
            0.0
        } else if max == self.r {
            60.0 * ((self.g - self.b) / delta).rem_euclid(6.0)
        } else if max == self.g {
            60.0 * ((self.b - self.r) / delta + 2.0)
        } else {
            60.0 * ((self.r - self.g) / delta + 4.0)
        };
        let s = if max <= 0.0 { 0.0 } else { delta / max };
        Hsb {
            h: h.rem_euclid(360.0),
            s: s * 100.0,
            b: max * 100.0,
        }
    }
}

impl Hsb {
    /// Converts to sRGB. Hue wraps; saturation and brightness are clamped.
    pub fn to_srgb(self) -> Srgb {
        let h = self.h.rem_euclid(360.0) / 60.0;
        let s = (self.s / 100.0).clamp(0.0, 1.0);
        let v = (self.b / 100.0).clamp(0.0, 1.0);
        let c = v * s;
        let x = c * (1.0 - (h.rem_euclid(2.0) - 1.0).abs());
        let (r, g, b) = match h as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let m = v - c;
        Srgb {
            r: r + m,
            g: g + m,
            b: b + m,
        }
    }

    /// Shifts each component by the given deltas.
    pub fn shifted(self, dh: f64, ds: f64, db: f64) -> Hsb {
        Hsb {
            h: self.h + dh,
            s: self.s + ds,
            b: self.b + db,
        }
    }
}

impl Serialize for Srgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Srgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Srgb::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
