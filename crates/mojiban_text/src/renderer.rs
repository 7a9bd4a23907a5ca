//! Text renderer
//!
//! The renderer is the application-wide owner of the glyph cache and the
//! rasterizer. Every cache read-modify-write and every rasterizer call runs
//! inside one reentrant critical section: a layout pass holds it for its whole
//! duration and each glyph fetch re-enters it on the same thread, so a glyph is
//! rasterized at most once per cache key even with concurrent callers.

use crate::cache::{CacheKey, Glyph, GlyphCache};
use crate::config::RendererConfig;
use crate::font::{Color, FontDescriptor};
use crate::layout::{GlyphSource, LineLayoutEngine, TextInfo};
use crate::parser::ParsedText;
use crate::rasterizer::Rasterizer;
use crate::render_object::TextRenderObject;
use crate::text::TextEntity;
use crate::Result;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::cell::RefCell;
use std::path::Path;
use std::sync::Arc;

struct RendererState {
    cache: GlyphCache,
    rasterizer: Box<dyn Rasterizer>,
    default_font: FontDescriptor,
    vertex_color: Color,
    /// Bumped whenever cached glyphs may no longer match the fonts
    generation: u64,
}

/// Shared glyph cache, rasterizer and text defaults
pub struct TextRenderer {
    state: ReentrantMutex<RefCell<RendererState>>,
}

/// Critical section over a [`TextRenderer`]
///
/// Renderer methods called on the same thread while this is held re-enter the
/// lock, so several operations can be grouped without other threads
/// interleaving.
pub struct RendererLock<'a> {
    _guard: ReentrantMutexGuard<'a, RefCell<RendererState>>,
}

impl TextRenderer {
    /// Create a renderer with default settings
    pub fn new<R: Rasterizer + 'static>(rasterizer: R) -> Self {
        Self::build(RendererConfig::default(), Box::new(rasterizer))
    }

    /// Create a renderer and register the configured font files
    pub fn with_config<R: Rasterizer + 'static>(
        config: RendererConfig,
        rasterizer: R,
    ) -> Result<Self> {
        let font_files = config.font_files.clone();
        let renderer = Self::build(config, Box::new(rasterizer));
        for path in &font_files {
            renderer.add_font_from_file(path)?;
        }
        Ok(renderer)
    }

    fn build(config: RendererConfig, rasterizer: Box<dyn Rasterizer>) -> Self {
        Self {
            state: ReentrantMutex::new(RefCell::new(RendererState {
                cache: GlyphCache::with_capacity(config.cache_capacity),
                rasterizer,
                default_font: config.default_font,
                vertex_color: config.vertex_color,
                generation: 0,
            })),
        }
    }

    /// Enter the renderer's critical section
    pub fn lock(&self) -> RendererLock<'_> {
        RendererLock {
            _guard: self.state.lock(),
        }
    }

    /// Create a text with the renderer's default font and tint
    pub fn create_text(&self, source: &str) -> TextEntity {
        let guard = self.state.lock();
        let state = guard.borrow();
        let mut text = TextEntity::new(source);
        text.set_font(state.default_font.clone());
        text.set_vertex_color(state.vertex_color);
        text
    }

    /// Parse and lay out a text, surfacing markup errors
    pub fn create_text_info(&self, text: &TextEntity) -> Result<TextInfo> {
        let parsed = text.parse()?;
        Ok(self.layout(&parsed, text))
    }

    /// Lay out already parsed text with the text's font and constraints
    pub fn layout(&self, parsed: &ParsedText, text: &TextEntity) -> TextInfo {
        let _lock = self.lock();
        LineLayoutEngine::new(self, text.constraints()).layout(parsed, text.font())
    }

    /// Re-lay a text from the line holding plain-text offset `dirty_from`
    pub fn relayout(
        &self,
        parsed: &ParsedText,
        text: &TextEntity,
        previous: &TextInfo,
        dirty_from: usize,
    ) -> TextInfo {
        let _lock = self.lock();
        LineLayoutEngine::new(self, text.constraints()).relayout(
            parsed,
            text.font(),
            previous,
            dirty_from,
        )
    }

    /// Build positioned sprites for a laid-out text
    pub fn create_render_object(&self, text: &TextEntity, info: &TextInfo) -> TextRenderObject {
        let _lock = self.lock();
        TextRenderObject::build(
            info,
            text.constraints(),
            text.font(),
            text.vertex_color(),
            text.position(),
            self,
        )
    }

    /// Drop every cached glyph
    pub fn clear_cache(&self) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        state.cache.clear();
        state.generation += 1;
    }

    /// Number of cached glyphs
    pub fn cache_count(&self) -> usize {
        self.state.lock().borrow().cache.len()
    }

    /// Register a font file with the rasterizer and drop stale glyphs
    pub fn add_font_from_file(&self, path: &Path) -> Result<()> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        state.rasterizer.register_font_file(path)?;
        state.cache.clear();
        state.generation += 1;
        Ok(())
    }

    pub fn default_font(&self) -> FontDescriptor {
        self.state.lock().borrow().default_font.clone()
    }

    /// Font given to texts created from now on
    pub fn set_font(&self, font: FontDescriptor) {
        self.state.lock().borrow_mut().default_font = font;
    }

    pub fn vertex_color(&self) -> Color {
        self.state.lock().borrow().vertex_color
    }

    pub fn set_vertex_color(&self, color: Color) {
        self.state.lock().borrow_mut().vertex_color = color;
    }

    /// Changes whenever previously measured layouts may be stale
    pub fn generation(&self) -> u64 {
        self.state.lock().borrow().generation
    }
}

impl GlyphSource for TextRenderer {
    fn glyph(&self, code: char, font: &FontDescriptor) -> Arc<Glyph> {
        let guard = self.state.lock();
        let key = CacheKey::new(code, font.clone());

        if let Some(glyph) = guard.borrow_mut().cache.lookup(&key) {
            tracing::trace!("Glyph cache hit for {:?}", code);
            return glyph;
        }

        let mut state = guard.borrow_mut();
        let glyph = match state.rasterizer.rasterize(code, font) {
            Ok(raster) => Glyph::new(code, raster),
            Err(e) => {
                tracing::debug!("Using placeholder for {:?} in '{}': {}", code, font.face, e);
                Glyph::placeholder(code, font)
            }
        };
        state.cache.insert(key, glyph)
    }
}
