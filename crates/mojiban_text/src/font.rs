//! Font descriptor
//!
//! A logical font plus the fill and border styling used when its glyphs are
//! rasterized. Descriptors are plain values: they are copied into cache keys
//! and tags and never mutated once used as a key.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Largest em height a glyph is rasterized at
pub const MAX_FONT_SIZE: i32 = 1024;

/// Largest border a glyph is composed with
pub const MAX_BORDER_WIDTH: i32 = 64;

/// Packed 32-bit ARGB color (`0xAARRGGBB`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(pub u32);

impl Color {
    pub const WHITE: Color = Color(0xFFFF_FFFF);
    pub const BLACK: Color = Color(0xFF00_0000);
    pub const TRANSPARENT: Color = Color(0);

    /// Create a color from alpha, red, green and blue components
    pub const fn from_argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Color(((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    /// Create an opaque color
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self::from_argb(0xFF, r, g, b)
    }

    pub const fn a(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub const fn r(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn b(self) -> u8 {
        self.0 as u8
    }

    /// Linear interpolation between two colors, `t` clamped to `0.0..=1.0`
    pub fn lerp(self, other: Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        let mix = |from: u8, to: u8| -> u8 {
            (from as f32 + (to as f32 - from as f32) * t).round() as u8
        };
        Color::from_argb(
            mix(self.a(), other.a()),
            mix(self.r(), other.r()),
            mix(self.g(), other.g()),
            mix(self.b(), other.b()),
        )
    }

    /// Components as `[r, g, b, a]`
    pub fn to_rgba(self) -> [u8; 4] {
        [self.r(), self.g(), self.b(), self.a()]
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

/// Border drawn around each glyph
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BorderKind {
    #[default]
    None,
    /// Outline on every side of the glyph
    Full,
    /// Offset copy of the glyph below and to the right
    Shadow,
}

impl BorderKind {
    /// Parse the identifier used in markup (`none`, `full`, `shadow`)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "none" => Some(BorderKind::None),
            "full" => Some(BorderKind::Full),
            "shadow" => Some(BorderKind::Shadow),
            _ => None,
        }
    }
}

/// Logical font and glyph styling
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct FontDescriptor {
    /// Family name, or one of the generic names `sans-serif`, `serif`, `monospace`
    pub face: Arc<str>,
    /// Em height in pixels
    pub size: i32,
    /// Weight (100-900, where 400 is normal, 700 is bold)
    pub weight: i32,
    pub italic: bool,
    pub underline: bool,
    /// Character set hint carried for cache identity
    pub charset: u8,
    /// Fill color at the top of the glyph cell
    pub color_top: Color,
    /// Fill color at the bottom of the glyph cell
    pub color_bottom: Color,
    pub border: BorderKind,
    /// Border width in pixels
    pub border_width: i32,
    pub border_color: Color,
}

impl Default for FontDescriptor {
    fn default() -> Self {
        Self {
            face: Arc::from("sans-serif"),
            size: 20,
            weight: 400,
            italic: false,
            underline: false,
            charset: 0,
            color_top: Color::WHITE,
            color_bottom: Color::WHITE,
            border: BorderKind::None,
            border_width: 0,
            border_color: Color::BLACK,
        }
    }
}

impl FontDescriptor {
    /// Set the family name
    pub fn with_face(mut self, face: &str) -> Self {
        self.face = Arc::from(face);
        self
    }

    /// Set the em height in pixels
    pub fn with_size(mut self, size: i32) -> Self {
        self.size = size;
        self
    }

    /// Set both fill colors
    pub fn with_color(mut self, color: Color) -> Self {
        self.color_top = color;
        self.color_bottom = color;
        self
    }

    /// Set the border kind, width and color
    pub fn with_border(mut self, border: BorderKind, width: i32, color: Color) -> Self {
        self.border = border;
        self.border_width = width;
        self.border_color = color;
        self
    }

    /// Em height clamped to what the rasterizers accept
    pub fn pixel_size(&self) -> i32 {
        self.size.clamp(1, MAX_FONT_SIZE)
    }

    /// Border width that actually contributes to the glyph footprint
    pub fn effective_border_width(&self) -> i32 {
        match self.border {
            BorderKind::None => 0,
            BorderKind::Full | BorderKind::Shadow => self.border_width.clamp(0, MAX_BORDER_WIDTH),
        }
    }

    /// Font used for ruby annotations above text set in this font
    pub fn ruby_font(&self) -> FontDescriptor {
        let mut font = self.clone();
        font.size = (self.size / 2).max(1);
        font.border_width = self.border_width / 2;
        font.underline = false;
        font
    }
}
