//! Markup text layout engine
//!
//! This crate provides:
//! - Inline tag tokenizer and parser (`[font ...]`, `[ruby ...]`, `[r]`)
//! - A bounded glyph cache with recency-based eviction
//! - Width-constrained line layout with ruby annotations and font changes
//! - Glyph bitmap composition (gradient fill, border, shadow, underline)
//! - Glyph rasterization (swash) and font registration (fontdb)
//! - Positioned render objects ready for sprite construction

pub mod cache;
pub mod compose;
pub mod config;
pub mod font;
pub mod layout;
pub mod parser;
pub mod rasterizer;
pub mod registry;
pub mod render_object;
pub mod renderer;
pub mod scanner;
pub mod tag;
pub mod text;

pub use cache::{CacheKey, Glyph, GlyphBitmap, GlyphCache, GlyphMetrics, Size, MAX_CACHE_SIZE};
pub use config::RendererConfig;
pub use font::{BorderKind, Color, FontDescriptor, MAX_BORDER_WIDTH, MAX_FONT_SIZE};
pub use layout::{
    GlyphSource, LayoutConstraints, LineLayoutEngine, Margin, TextAlignment, TextInfo, TextLine,
    VerticalAlignment,
};
pub use parser::{parse_markup, ParsedText};
pub use rasterizer::{
    FixedPitchRasterizer, RasterizeError, RasterizedGlyph, Rasterizer, SwashRasterizer,
};
pub use registry::FontRegistry;
pub use render_object::{GlyphSprite, TextRenderObject};
pub use renderer::{RendererLock, TextRenderer};
pub use scanner::{Cursor, Scanner, Token, TokenKind};
pub use tag::{FontTag, RubyTag, RubyText, Tag};
pub use text::TextEntity;

use thiserror::Error;

/// Text engine errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TextError {
    /// Malformed literal in the markup (unterminated string, bad numeric prefix, stray character)
    #[error("tokenize error at line {line}: {message} (near {text:?})")]
    Tokenize {
        line: usize,
        text: String,
        message: String,
    },

    /// Unknown tag or malformed parameter list
    #[error("tag parse error at line {line} in [{tag}]: {message}")]
    TagParse {
        tag: String,
        line: usize,
        message: String,
    },

    #[error("Failed to load font: {0}")]
    FontLoadError(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl TextError {
    /// Source line of a markup error, `None` for font and configuration errors
    pub fn line(&self) -> Option<usize> {
        match self {
            TextError::Tokenize { line, .. } | TextError::TagParse { line, .. } => Some(*line),
            TextError::FontLoadError(_) | TextError::Config(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TextError>;
