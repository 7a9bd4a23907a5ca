//! Glyph rasterization
//!
//! [`Rasterizer`] is the seam to the font service: it turns one character in
//! one font style into a finished texture plus metrics. Implementations are
//! not required to be reentrant; the renderer serializes every call.
//!
//! Two implementations are provided: [`SwashRasterizer`] renders real font
//! outlines with swash, and [`FixedPitchRasterizer`] produces box glyphs with
//! a constant advance, which is what tests and headless tools use.

use crate::cache::{GlyphBitmap, GlyphMetrics, Size};
use crate::compose::{compose_glyph, Coverage};
use crate::font::{FontDescriptor, MAX_FONT_SIZE};
use crate::registry::FontRegistry;
use crate::TextError;
use rustc_hash::FxHashSet;
use std::path::Path;
use swash::scale::{Render, ScaleContext, Source};
use swash::zeno::Format;
use thiserror::Error;

/// Per-character rasterization failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RasterizeError {
    #[error("Font not found: {0}")]
    FontNotFound(String),

    #[error("Glyph not found for character {0:?}")]
    GlyphNotFound(char),

    #[error("Invalid font data")]
    InvalidFontData,
}

/// Finished glyph as produced by a rasterizer
#[derive(Debug, Clone)]
pub struct RasterizedGlyph {
    pub bitmap: GlyphBitmap,
    pub metrics: GlyphMetrics,
    /// Advance box
    pub size: Size,
    /// Bounding box including the border
    pub max_size: Size,
}

/// Font service used on a glyph cache miss
pub trait Rasterizer: Send {
    fn rasterize(
        &mut self,
        code: char,
        font: &FontDescriptor,
    ) -> std::result::Result<RasterizedGlyph, RasterizeError>;

    /// Make the faces in a font file available to later rasterization
    fn register_font_file(&mut self, path: &Path) -> crate::Result<()> {
        Err(TextError::FontLoadError(format!(
            "This rasterizer cannot load font files ({:?})",
            path
        )))
    }
}

/// Rasterizer with a constant advance for every printable character
///
/// Printable characters become a filled box, whitespace stays blank. The cell
/// height equals the font size.
#[derive(Debug, Clone)]
pub struct FixedPitchRasterizer {
    advance: i32,
    missing: FxHashSet<char>,
}

impl FixedPitchRasterizer {
    pub fn new(advance: i32) -> Self {
        Self {
            advance: advance.clamp(0, MAX_FONT_SIZE),
            missing: FxHashSet::default(),
        }
    }

    /// Report these characters as unavailable
    pub fn with_missing(mut self, chars: impl IntoIterator<Item = char>) -> Self {
        self.missing.extend(chars);
        self
    }

    pub fn advance(&self) -> i32 {
        self.advance
    }
}

impl Rasterizer for FixedPitchRasterizer {
    fn rasterize(
        &mut self,
        code: char,
        font: &FontDescriptor,
    ) -> std::result::Result<RasterizedGlyph, RasterizeError> {
        if self.missing.contains(&code) {
            return Err(RasterizeError::GlyphNotFound(code));
        }

        let size = font.pixel_size();
        let descent = size / 5;
        let ascent = size - descent;

        let coverage = if code.is_whitespace() || self.advance < 3 {
            Coverage::default()
        } else {
            let width = (self.advance - 2) as u32;
            let height = (size - 2).max(1) as u32;
            Coverage {
                width,
                height,
                left: 1,
                top: ascent - 1,
                data: vec![255; width as usize * height as usize],
            }
        };

        Ok(compose_glyph(&coverage, self.advance, ascent, descent, font))
    }
}

/// Outline rasterizer over system and registered fonts
pub struct SwashRasterizer {
    registry: FontRegistry,
    context: ScaleContext,
}

impl SwashRasterizer {
    /// Create a rasterizer over the system fonts
    pub fn new() -> Self {
        Self::with_registry(FontRegistry::new())
    }

    pub fn with_registry(registry: FontRegistry) -> Self {
        Self {
            registry,
            context: ScaleContext::new(),
        }
    }

    pub fn registry(&self) -> &FontRegistry {
        &self.registry
    }
}

impl Default for SwashRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Rasterizer for SwashRasterizer {
    fn rasterize(
        &mut self,
        code: char,
        font: &FontDescriptor,
    ) -> std::result::Result<RasterizedGlyph, RasterizeError> {
        let face = self
            .registry
            .resolve(font)
            .map_err(|e| RasterizeError::FontNotFound(e.to_string()))?;
        let font_ref = swash::FontRef::from_index(face.data(), face.index() as usize)
            .ok_or(RasterizeError::InvalidFontData)?;

        let glyph_id = font_ref.charmap().map(code);
        if glyph_id == 0 {
            return Err(RasterizeError::GlyphNotFound(code));
        }

        // Scale from font units to pixels
        let size = font.pixel_size() as f32;
        let metrics = font_ref.metrics(&[]);
        let scale = size / metrics.units_per_em as f32;
        let ascent = (metrics.ascent * scale).round() as i32;
        let descent = (metrics.descent.abs() * scale).round() as i32;
        let advance = (font_ref.glyph_metrics(&[]).advance_width(glyph_id) * scale).round() as i32;

        let mut scaler = self.context.builder(font_ref).size(size).build();
        let mut render = Render::new(&[Source::Outline]);
        render.format(Format::Alpha);

        // Blank glyphs (like space) have no image but keep their advance
        let coverage = match render.render(&mut scaler, glyph_id) {
            Some(image) => Coverage {
                width: image.placement.width,
                height: image.placement.height,
                left: image.placement.left,
                top: image.placement.top,
                data: image.data,
            },
            None => Coverage::default(),
        };

        Ok(compose_glyph(&coverage, advance, ascent, descent, font))
    }

    fn register_font_file(&mut self, path: &Path) -> crate::Result<()> {
        self.registry.register_font_file(path)
    }
}
