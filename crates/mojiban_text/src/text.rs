//! Text entity
//!
//! A text entity owns a source string with its style defaults and layout
//! constraints, and remembers the last layout it produced. Layout is skipped
//! when neither the text, the style, the constraints nor the renderer's fonts
//! changed since then.

use crate::font::{Color, FontDescriptor};
use crate::layout::{LayoutConstraints, Margin, TextAlignment, TextInfo, VerticalAlignment};
use crate::parser::{parse_markup, ParsedText};
use crate::render_object::TextRenderObject;
use crate::renderer::TextRenderer;
use crate::tag::Tag;
use crate::Result;
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

/// Inputs that determine a layout
#[derive(Debug, Clone, PartialEq)]
struct LayoutSignature {
    text_hash: u64,
    font: FontDescriptor,
    constraints: LayoutConstraints,
    syntactic_analysis: bool,
    generation: u64,
}

impl LayoutSignature {
    /// Same inputs apart from the text itself
    fn same_style(&self, other: &LayoutSignature) -> bool {
        self.font == other.font
            && self.constraints == other.constraints
            && self.syntactic_analysis == other.syntactic_analysis
            && self.generation == other.generation
    }
}

#[derive(Debug, Clone)]
struct CachedLayout {
    signature: LayoutSignature,
    parsed: ParsedText,
    info: TextInfo,
}

/// Markup text with style and layout constraints
#[derive(Debug, Clone)]
pub struct TextEntity {
    text: String,
    text_hash: u64,
    font: FontDescriptor,
    position: [f32; 2],
    constraints: LayoutConstraints,
    vertex_color: Color,
    syntactic_analysis: bool,
    cached: Option<CachedLayout>,
}

impl TextEntity {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            text_hash: hash_text(text),
            font: FontDescriptor::default(),
            position: [0.0, 0.0],
            constraints: LayoutConstraints::default(),
            vertex_color: Color::WHITE,
            syntactic_analysis: true,
            cached: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.text_hash = hash_text(text);
    }

    /// Content hash used for change detection
    pub fn text_hash(&self) -> u64 {
        self.text_hash
    }

    pub fn font(&self) -> &FontDescriptor {
        &self.font
    }

    pub fn set_font(&mut self, font: FontDescriptor) {
        self.font = font;
    }

    pub fn position(&self) -> [f32; 2] {
        self.position
    }

    pub fn set_position(&mut self, x: f32, y: f32) {
        self.position = [x, y];
    }

    pub fn constraints(&self) -> &LayoutConstraints {
        &self.constraints
    }

    pub fn set_constraints(&mut self, constraints: LayoutConstraints) {
        self.constraints = constraints;
    }

    pub fn set_max_width(&mut self, width: i32) {
        self.constraints.max_width = width;
    }

    pub fn set_max_height(&mut self, height: i32) {
        self.constraints.max_height = height;
    }

    pub fn set_side_pitch(&mut self, pitch: f32) {
        self.constraints.side_pitch = pitch;
    }

    pub fn set_line_pitch(&mut self, pitch: f32) {
        self.constraints.line_pitch = pitch;
    }

    pub fn set_fixed_width(&mut self, width: f32) {
        self.constraints.fixed_width = width;
    }

    pub fn set_margin(&mut self, margin: Margin) {
        self.constraints.margin = margin;
    }

    pub fn set_horizontal_alignment(&mut self, alignment: TextAlignment) {
        self.constraints.horizontal_alignment = alignment;
    }

    pub fn set_vertical_alignment(&mut self, alignment: VerticalAlignment) {
        self.constraints.vertical_alignment = alignment;
    }

    pub fn vertex_color(&self) -> Color {
        self.vertex_color
    }

    pub fn set_vertex_color(&mut self, color: Color) {
        self.vertex_color = color;
    }

    pub fn is_syntactic_analysis(&self) -> bool {
        self.syntactic_analysis
    }

    /// Enable or disable tag parsing; when disabled the source is plain text
    pub fn set_syntactic_analysis(&mut self, enable: bool) {
        self.syntactic_analysis = enable;
    }

    /// Plain text and tags of the source
    pub fn parse(&self) -> Result<ParsedText> {
        if self.syntactic_analysis {
            parse_markup(&self.text, &self.font)
        } else {
            Ok(ParsedText::plain(&self.text))
        }
    }

    /// Last layout, if any
    pub fn text_info(&self) -> Option<&TextInfo> {
        self.cached.as_ref().map(|cached| &cached.info)
    }

    /// Lay out the text, reusing the previous layout when nothing changed
    ///
    /// Markup errors are logged and the raw source is laid out instead.
    pub fn create_text_info(&mut self, renderer: &TextRenderer) -> TextInfo {
        let signature = self.signature(renderer);
        if let Some(cached) = &self.cached {
            if cached.signature == signature {
                return cached.info.clone();
            }
        }

        let parsed = self.parse_or_raw();
        let info = renderer.layout(&parsed, self);
        self.store(signature, parsed, &info);
        info
    }

    /// Replace the text and re-lay only the lines from the first change on
    ///
    /// Falls back to a full layout when the style, constraints or fonts
    /// changed since the previous layout.
    pub fn update_text(&mut self, renderer: &TextRenderer, text: &str) -> TextInfo {
        self.set_text(text);
        let signature = self.signature(renderer);
        let Some(previous) = self.cached.take() else {
            return self.create_text_info(renderer);
        };
        if previous.signature == signature {
            self.cached = Some(previous);
            return self.create_text_info(renderer);
        }
        if !previous.signature.same_style(&signature) {
            return self.create_text_info(renderer);
        }

        let parsed = self.parse_or_raw();
        let dirty_from = first_difference(&previous.parsed, &parsed);
        let info = renderer.relayout(&parsed, self, &previous.info, dirty_from);
        self.store(signature, parsed, &info);
        info
    }

    /// Lay out (if needed) and build positioned sprites
    pub fn create_render_object(&mut self, renderer: &TextRenderer) -> TextRenderObject {
        let info = self.create_text_info(renderer);
        renderer.create_render_object(self, &info)
    }

    fn parse_or_raw(&self) -> ParsedText {
        self.parse().unwrap_or_else(|e| {
            tracing::warn!("Rendering raw text after markup error: {}", e);
            ParsedText::plain(&self.text)
        })
    }

    fn signature(&self, renderer: &TextRenderer) -> LayoutSignature {
        LayoutSignature {
            text_hash: self.text_hash,
            font: self.font.clone(),
            constraints: self.constraints.clone(),
            syntactic_analysis: self.syntactic_analysis,
            generation: renderer.generation(),
        }
    }

    fn store(&mut self, signature: LayoutSignature, parsed: ParsedText, info: &TextInfo) {
        self.cached = Some(CachedLayout {
            signature,
            parsed,
            info: info.clone(),
        });
    }
}

fn hash_text(text: &str) -> u64 {
    let mut hasher = FxHasher::default();
    text.hash(&mut hasher);
    hasher.finish()
}

/// First plain-text offset whose layout may differ between two parses
fn first_difference(old: &ParsedText, new: &ParsedText) -> usize {
    let chars = old
        .chars()
        .iter()
        .zip(new.chars())
        .take_while(|(a, b)| a == b)
        .count();
    let same_tags = old
        .tags()
        .iter()
        .zip(new.tags())
        .take_while(|(a, b)| a == b)
        .count();
    let tag_change = [old.tags().get(same_tags), new.tags().get(same_tags)]
        .into_iter()
        .flatten()
        .map(Tag::anchor)
        .min()
        .unwrap_or(usize::MAX);
    chars.min(tag_change)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::FixedPitchRasterizer;

    fn renderer() -> TextRenderer {
        TextRenderer::new(FixedPitchRasterizer::new(10))
    }

    #[test]
    fn test_hash_follows_text() {
        let mut text = TextEntity::new("abc");
        let hash = text.text_hash();
        text.set_text("abd");
        assert_ne!(text.text_hash(), hash);
        text.set_text("abc");
        assert_eq!(text.text_hash(), hash);
    }

    #[test]
    fn test_unchanged_text_reuses_layout() {
        let renderer = renderer();
        let mut text = TextEntity::new("hello");
        let first = text.create_text_info(&renderer);
        renderer.set_font(FontDescriptor::default().with_size(99));
        let second = text.create_text_info(&renderer);
        assert_eq!(first, second);
    }

    #[test]
    fn test_constraint_change_relays() {
        let renderer = renderer();
        let mut text = TextEntity::new("abcdef");
        assert_eq!(text.create_text_info(&renderer).line_count(), 1);
        text.set_max_width(30);
        assert_eq!(text.create_text_info(&renderer).line_count(), 2);
    }

    #[test]
    fn test_cache_clear_invalidates_layout() {
        let renderer = renderer();
        let mut text = TextEntity::new("abc");
        text.create_text_info(&renderer);
        renderer.clear_cache();
        text.create_text_info(&renderer);
        assert_eq!(renderer.cache_count(), 3, "layout ran again after the clear");
    }

    #[test]
    fn test_markup_error_falls_back_to_raw_text() {
        let renderer = renderer();
        let mut text = TextEntity::new("a[bogus]b");
        let info = text.create_text_info(&renderer);
        assert_eq!(info.text(), "a[bogus]b");
        assert!(info.lines[0].tags.is_empty());
    }

    #[test]
    fn test_syntactic_analysis_off_keeps_markup() {
        let renderer = renderer();
        let mut text = TextEntity::new("[font size=30]x");
        text.set_syntactic_analysis(false);
        let info = text.create_text_info(&renderer);
        assert_eq!(info.text(), "[font size=30]x");
        assert_eq!(text.parse().unwrap().tags().len(), 0);
    }

    #[test]
    fn test_update_text_relays_from_change() {
        let renderer = renderer();
        let mut text = TextEntity::new("abcdefghi");
        text.set_max_width(30);
        let before = text.create_text_info(&renderer);
        assert_eq!(before.line_count(), 3);

        let after = text.update_text(&renderer, "abcdefghiXY");
        assert!(after.auto_indent);
        assert_eq!(after.valid_range(), 2..4);
        assert_eq!(after.lines[..2], before.lines[..2]);

        let mut fresh = TextEntity::new("abcdefghiXY");
        fresh.set_max_width(30);
        assert_eq!(fresh.create_text_info(&renderer).lines, after.lines);
    }

    #[test]
    fn test_update_text_with_new_style_is_full_layout() {
        let renderer = renderer();
        let mut text = TextEntity::new("abc");
        text.create_text_info(&renderer);
        text.set_font(FontDescriptor::default().with_size(40));
        let info = text.update_text(&renderer, "abcd");
        assert!(!info.auto_indent);
        assert_eq!(info.lines[0].height, 40);
    }

    #[test]
    fn test_first_difference_considers_tags() {
        let font = FontDescriptor::default();
        let old = parse_markup("abc[font size=30]def", &font).unwrap();
        let new = parse_markup("abc[font size=31]def", &font).unwrap();
        assert_eq!(first_difference(&old, &new), 3);

        let appended = parse_markup("abc[font size=30]defg", &font).unwrap();
        assert_eq!(first_difference(&old, &appended), 6);
    }

    #[test]
    fn test_render_object_uses_entity_position() {
        let renderer = renderer();
        let mut text = TextEntity::new("ab");
        text.set_position(3.0, 4.0);
        let object = text.create_render_object(&renderer);
        assert_eq!(object.position, [3.0, 4.0]);
        assert_eq!(object.sprites.len(), 2);
    }
}
