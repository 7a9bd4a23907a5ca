//! Line layout engine
//!
//! Walks the plain text of a [`ParsedText`] one character at a time, applies
//! font tags as their anchors are reached, measures each character through a
//! [`GlyphSource`] and breaks lines on explicit newlines and on the width
//! limit. Ruby annotations are measured as independent nested layouts.
//!
//! Alignment and margins are not applied here. Lines only carry sizes; origins
//! are resolved when a render object is built, so re-aligning never requires
//! re-measuring.

use crate::cache::Glyph;
use crate::font::FontDescriptor;
use crate::parser::ParsedText;
use crate::tag::{RubyTag, RubyText, Tag};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;

/// Horizontal alignment of lines inside the text box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlignment {
    #[default]
    Left,
    Center,
    Right,
}

/// Vertical alignment of the line block inside the text box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlignment {
    #[default]
    Top,
    Center,
    Bottom,
}

/// Inner padding of the text box in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Margin {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// Size limits and spacing for a layout pass
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConstraints {
    /// Box width in pixels (0 = no wrapping)
    pub max_width: i32,
    /// Box height in pixels (0 = unbounded)
    pub max_height: i32,
    /// Extra spacing after every character
    pub side_pitch: f32,
    /// Extra spacing between lines
    pub line_pitch: f32,
    /// Advance used for every character instead of the glyph's (0 = off)
    pub fixed_width: f32,
    pub horizontal_alignment: TextAlignment,
    pub vertical_alignment: VerticalAlignment,
    pub margin: Margin,
}

impl LayoutConstraints {
    /// Width available to line content, if wrapping is enabled
    pub fn available_width(&self) -> Option<f32> {
        (self.max_width > 0)
            .then(|| (self.max_width - self.margin.left - self.margin.right).max(0) as f32)
    }

    /// Height available to line content, if bounded
    pub fn available_height(&self) -> Option<f32> {
        (self.max_height > 0)
            .then(|| (self.max_height - self.margin.top - self.margin.bottom).max(0) as f32)
    }
}

/// One laid-out row
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextLine {
    /// Sum of advances and pitches
    pub width: f32,
    /// Tallest glyph bounding box, border included
    pub height: i32,
    /// Spacing after every character of this line
    pub side_pitch: f32,
    /// Offset of the first code in the plain text
    pub start: usize,
    pub codes: Vec<char>,
    /// Tags anchored inside this line, anchors relative to `start`
    pub tags: Vec<Tag>,
}

impl TextLine {
    fn new(start: usize, side_pitch: f32) -> Self {
        Self {
            start,
            side_pitch,
            ..Default::default()
        }
    }

    /// Plain-text offset one past the last code
    pub fn end(&self) -> usize {
        self.start + self.codes.len()
    }

    pub fn text(&self) -> String {
        self.codes.iter().collect()
    }
}

/// Measured layout of one text
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextInfo {
    /// Widest line
    pub total_width: f32,
    /// Line heights plus line pitch between lines
    pub total_height: f32,
    /// First line produced by the pass that built this info
    pub valid_start: usize,
    /// One past the last line produced by that pass
    pub valid_end: usize,
    /// Built incrementally on top of an earlier layout
    pub auto_indent: bool,
    pub lines: Vec<TextLine>,
}

impl TextInfo {
    fn from_lines(lines: Vec<TextLine>, valid_start: usize, line_pitch: f32, auto_indent: bool) -> Self {
        let total_width = lines.iter().map(|l| l.width).fold(0.0, f32::max);
        let gaps = lines.len().saturating_sub(1) as f32;
        let total_height = lines.iter().map(|l| l.height as f32).sum::<f32>() + line_pitch * gaps;
        Self {
            total_width,
            total_height,
            valid_start: valid_start.min(lines.len()),
            valid_end: lines.len(),
            auto_indent,
            lines,
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn valid_range(&self) -> Range<usize> {
        self.valid_start..self.valid_end
    }

    /// Index of the line holding plain-text offset `offset`
    pub fn line_containing(&self, offset: usize) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| line.start <= offset && offset < line.end())
    }

    /// Concatenated codes of every line
    pub fn text(&self) -> String {
        self.lines.iter().flat_map(|line| line.codes.iter()).collect()
    }
}

/// Provider of measured glyphs, usually the renderer's cache
pub trait GlyphSource {
    fn glyph(&self, code: char, font: &FontDescriptor) -> Arc<Glyph>;
}

/// Line breaking state for one pass
struct Walk {
    side_pitch: f32,
    line_pitch: f32,
    available_height: Option<f32>,
    lines: Vec<TextLine>,
    kept: usize,
    used_height: f32,
    current: TextLine,
    has_printable: bool,
}

impl Walk {
    fn new(constraints: &LayoutConstraints, kept: Vec<TextLine>, start: usize) -> Self {
        let gaps = kept.len().saturating_sub(1) as f32;
        let used_height =
            kept.iter().map(|l| l.height as f32).sum::<f32>() + constraints.line_pitch * gaps;
        Self {
            side_pitch: constraints.side_pitch,
            line_pitch: constraints.line_pitch,
            available_height: constraints.available_height(),
            kept: kept.len(),
            lines: kept,
            used_height,
            current: TextLine::new(start, constraints.side_pitch),
            has_printable: false,
        }
    }

    /// Move the current line into the result; false once the height limit is hit
    fn finish(&mut self, next_start: usize) -> bool {
        let line = std::mem::replace(
            &mut self.current,
            TextLine::new(next_start, self.side_pitch),
        );
        self.has_printable = false;

        let gap = if self.lines.is_empty() { 0.0 } else { self.line_pitch };
        let needed = self.used_height + gap + line.height as f32;
        if let Some(limit) = self.available_height {
            if !self.lines.is_empty() && needed > limit {
                return false;
            }
        }
        self.used_height = needed;
        self.lines.push(line);
        true
    }
}

/// Breaks parsed text into measured lines
pub struct LineLayoutEngine<'a, G: GlyphSource + ?Sized> {
    glyphs: &'a G,
    constraints: &'a LayoutConstraints,
}

impl<'a, G: GlyphSource + ?Sized> LineLayoutEngine<'a, G> {
    pub fn new(glyphs: &'a G, constraints: &'a LayoutConstraints) -> Self {
        Self {
            glyphs,
            constraints,
        }
    }

    /// Lay out the whole text
    pub fn layout(&self, parsed: &ParsedText, default_font: &FontDescriptor) -> TextInfo {
        let lines = self.walk(parsed, default_font, 0, Vec::new());
        TextInfo::from_lines(lines, 0, self.constraints.line_pitch, false)
    }

    /// Re-lay the text from the line of `previous` that contains the last
    /// character before `dirty_from`
    ///
    /// That line's wrap point depended on the character at `dirty_from`, so it
    /// is re-laid too. Earlier lines are reused unchanged; the caller guarantees
    /// the text before `dirty_from` and the constraints did not change. The
    /// result's valid range covers the re-laid lines only.
    pub fn relayout(
        &self,
        parsed: &ParsedText,
        default_font: &FontDescriptor,
        previous: &TextInfo,
        dirty_from: usize,
    ) -> TextInfo {
        let first_dirty = previous
            .line_containing(dirty_from.saturating_sub(1))
            .unwrap_or_else(|| previous.lines.len().saturating_sub(1));
        let start = previous.lines.get(first_dirty).map_or(0, |line| line.start);
        let kept = previous.lines[..first_dirty.min(previous.lines.len())].to_vec();

        let lines = self.walk(parsed, default_font, start, kept);
        TextInfo::from_lines(lines, first_dirty, self.constraints.line_pitch, true)
    }

    fn walk(
        &self,
        parsed: &ParsedText,
        default_font: &FontDescriptor,
        start: usize,
        kept: Vec<TextLine>,
    ) -> Vec<TextLine> {
        let chars = parsed.chars();
        let tags = parsed.tags();
        let start = start.min(chars.len());
        let available_width = self.constraints.available_width();

        let mut font = font_at(tags, start, default_font);
        let mut walk = Walk::new(self.constraints, kept, start);
        let mut next_tag = tags.partition_point(|tag| tag.anchor() < start);
        // Ruby base runs are never split by a width wrap
        let mut protected_until = start;

        for (i, &code) in chars.iter().enumerate().skip(start) {
            let mut pending = Vec::new();
            while let Some(tag) = tags.get(next_tag).filter(|tag| tag.anchor() <= i) {
                next_tag += 1;
                let mut tag = tag.clone();
                match &mut tag {
                    Tag::Font(font_tag) => font = font_tag.font.clone(),
                    Tag::Ruby(ruby) => {
                        let end = (i + ruby.base_len()).min(chars.len());
                        let base_width = self.measure(&chars[i..end], &font);
                        if let Some(limit) = available_width {
                            if !walk.current.codes.is_empty()
                                && walk.current.width + base_width > limit
                                && !self.close_line(&mut walk, &font, i)
                            {
                                return walk.lines;
                            }
                        }
                        protected_until = end;
                        ruby.annotation = Some(Box::new(self.annotate(ruby, &font, base_width)));
                    }
                }
                pending.push(tag);
            }

            let glyph = (!code.is_control()).then(|| self.glyphs.glyph(code, &font));
            let step = glyph
                .as_ref()
                .map_or(0.0, |g| self.advance(g) + self.constraints.side_pitch);

            if let Some(limit) = available_width {
                if glyph.is_some()
                    && i >= protected_until
                    && !walk.current.codes.is_empty()
                    && walk.current.width + step > limit
                    && !self.close_line(&mut walk, &font, i)
                {
                    return walk.lines;
                }
            }

            let line_start = walk.current.start;
            walk.current.tags.extend(pending.into_iter().map(|mut tag| {
                tag.set_anchor(tag.anchor() - line_start);
                tag
            }));
            walk.current.codes.push(code);
            walk.current.width += step;
            if let Some(glyph) = &glyph {
                walk.current.height = walk.current.height.max(glyph.max_size().height);
                walk.has_printable = true;
            }

            if code == '\n' && !self.close_line(&mut walk, &font, i + 1) {
                return walk.lines;
            }
        }

        // Tags anchored at the very end of the text join the last line, and
        // keep one empty line alive when the plain text is empty
        let trailing = &tags[next_tag.min(tags.len())..];
        if let Some(last) = trailing.iter().rev().find_map(|tag| match tag {
            Tag::Font(font_tag) => Some(&font_tag.font),
            Tag::Ruby(_) => None,
        }) {
            font = last.clone();
        }
        let open_line = !walk.current.codes.is_empty()
            || (chars.last() == Some(&'\n') && walk.current.start == chars.len())
            || (chars.is_empty() && !trailing.is_empty());
        if open_line {
            let line_start = walk.current.start;
            walk.current
                .tags
                .extend(trailing.iter().map(|tag| tag.rebased(line_start)));
            self.close_line(&mut walk, &font, chars.len());
        } else if walk.lines.len() > walk.kept {
            if let Some(last) = walk.lines.last_mut() {
                let line_start = last.start;
                last.tags
                    .extend(trailing.iter().map(|tag| tag.rebased(line_start)));
            }
        }

        walk.lines
    }

    fn close_line(&self, walk: &mut Walk, font: &FontDescriptor, next_start: usize) -> bool {
        if !walk.has_printable {
            let space = self.glyphs.glyph(' ', font);
            walk.current.height = walk.current.height.max(space.max_size().height);
        }
        walk.finish(next_start)
    }

    fn advance(&self, glyph: &Glyph) -> f32 {
        if self.constraints.fixed_width > 0.0 {
            self.constraints.fixed_width
        } else {
            glyph.size().width as f32
        }
    }

    /// Width a run of codes takes on a line
    fn measure(&self, codes: &[char], font: &FontDescriptor) -> f32 {
        codes
            .iter()
            .filter(|code| !code.is_control())
            .map(|&code| self.advance(&self.glyphs.glyph(code, font)) + self.constraints.side_pitch)
            .sum()
    }

    /// Lay out a ruby annotation over a base run of `base_width`
    fn annotate(&self, tag: &RubyTag, font: &FontDescriptor, base_width: f32) -> RubyText {
        let ruby_font = font.ruby_font();
        let constraints = LayoutConstraints::default();
        let engine = LineLayoutEngine::new(self.glyphs, &constraints);
        let mut info = engine.layout(&ParsedText::plain(&tag.ruby), &ruby_font);

        let ruby_width = info.total_width;
        let count = info.lines.first().map_or(0, |line| {
            line.codes.iter().filter(|code| !code.is_control()).count()
        });

        // A narrow annotation is spread over the base, a wide one is centred
        let offset_x = if ruby_width < base_width && count > 0 {
            let pitch = (base_width - ruby_width) / count as f32;
            if let Some(line) = info.lines.first_mut() {
                line.side_pitch += pitch;
                line.width += pitch * count as f32;
            }
            info.total_width = info.lines.iter().map(|l| l.width).fold(0.0, f32::max);
            pitch / 2.0
        } else {
            (base_width - ruby_width) / 2.0
        };

        RubyText {
            font: ruby_font,
            info,
            base_width: base_width.round() as i32,
            offset_x,
        }
    }
}

/// Font in effect just before plain-text offset `offset`
fn font_at(tags: &[Tag], offset: usize, default_font: &FontDescriptor) -> FontDescriptor {
    tags.iter()
        .take_while(|tag| tag.anchor() < offset)
        .filter_map(|tag| match tag {
            Tag::Font(font_tag) => Some(&font_tag.font),
            Tag::Ruby(_) => None,
        })
        .last()
        .cloned()
        .unwrap_or_else(|| default_font.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{GlyphBitmap, GlyphMetrics, Size};
    use crate::parser::parse_markup;
    use crate::rasterizer::RasterizedGlyph;

    /// Advance is half the font size, height the font size plus border
    struct HalfEm;

    impl GlyphSource for HalfEm {
        fn glyph(&self, code: char, font: &FontDescriptor) -> Arc<Glyph> {
            let border = font.effective_border_width();
            Arc::new(Glyph::new(
                code,
                RasterizedGlyph {
                    bitmap: GlyphBitmap::empty(),
                    metrics: GlyphMetrics::default(),
                    size: Size::new(font.size / 2, font.size),
                    max_size: Size::new(font.size / 2 + border * 2, font.size + border * 2),
                },
            ))
        }
    }

    fn lay(source: &str, constraints: &LayoutConstraints) -> TextInfo {
        let font = FontDescriptor::default();
        let parsed = parse_markup(source, &font).unwrap();
        LineLayoutEngine::new(&HalfEm, constraints).layout(&parsed, &font)
    }

    fn width(max_width: i32) -> LayoutConstraints {
        LayoutConstraints {
            max_width,
            ..Default::default()
        }
    }

    fn texts(info: &TextInfo) -> Vec<String> {
        info.lines.iter().map(TextLine::text).collect()
    }

    #[test]
    fn test_width_wrap_fills_each_line() {
        // Default font: advance 10
        let info = lay("abcdefghijklmnopqrstuvw", &width(100));
        assert_eq!(texts(&info), ["abcdefghij", "klmnopqrst", "uvw"]);
        assert_eq!(info.total_width, 100.0);
        assert_eq!(info.lines[2].width, 30.0);
        assert_eq!(info.lines[1].start, 10);
        assert_eq!(info.valid_range(), 0..3);
        assert!(!info.auto_indent);
    }

    #[test]
    fn test_no_wrap_without_max_width() {
        let info = lay("abcdefghijklmnopqrstuvw", &LayoutConstraints::default());
        assert_eq!(info.line_count(), 1);
        assert_eq!(info.total_width, 230.0);
    }

    #[test]
    fn test_newline_closes_line_and_stays_in_codes() {
        let info = lay("ab\ncd", &width(0));
        assert_eq!(texts(&info), ["ab\n", "cd"]);
        assert_eq!(info.lines[0].width, 20.0);
        assert_eq!(info.text(), "ab\ncd");
    }

    #[test]
    fn test_trailing_newline_adds_empty_line() {
        let info = lay("ab\n", &LayoutConstraints::default());
        assert_eq!(texts(&info), ["ab\n", ""]);
        assert_eq!(info.lines[1].height, 20, "empty line takes the height of a space");
        assert_eq!(info.total_height, 40.0);
    }

    #[test]
    fn test_empty_text_has_no_lines() {
        let info = lay("", &width(100));
        assert_eq!(info.line_count(), 0);
        assert_eq!(info.total_width, 0.0);
        assert_eq!(info.total_height, 0.0);
    }

    #[test]
    fn test_tags_without_text_keep_an_empty_line() {
        let info = lay("[font size=30]", &LayoutConstraints::default());
        assert_eq!(texts(&info), [""]);
        assert_eq!(info.lines[0].tags.len(), 1);
        assert_eq!(info.lines[0].height, 30, "empty line uses the tagged font");

        let info = lay("ab\n[font size=30]", &LayoutConstraints::default());
        assert_eq!(texts(&info), ["ab\n", ""]);
        assert_eq!(info.lines[1].tags.len(), 1);
        assert_eq!(info.lines[1].height, 30);
    }

    #[test]
    fn test_side_pitch_counts_toward_wrap() {
        let constraints = LayoutConstraints {
            max_width: 100,
            side_pitch: 2.0,
            ..Default::default()
        };
        let info = lay("abcdefghijkl", &constraints);
        assert_eq!(texts(&info), ["abcdefgh", "ijkl"]);
        assert_eq!(info.lines[0].width, 96.0);
        assert_eq!(info.lines[0].side_pitch, 2.0);
    }

    #[test]
    fn test_margin_narrows_available_width() {
        let constraints = LayoutConstraints {
            max_width: 100,
            margin: Margin {
                left: 20,
                right: 20,
                ..Default::default()
            },
            ..Default::default()
        };
        let info = lay("abcdefghij", &constraints);
        assert_eq!(texts(&info), ["abcdef", "ghij"]);
    }

    #[test]
    fn test_fixed_width_overrides_advance() {
        let constraints = LayoutConstraints {
            fixed_width: 5.0,
            ..Default::default()
        };
        let info = lay("[font size=60]abcd", &constraints);
        assert_eq!(info.lines[0].width, 20.0);
        assert_eq!(info.lines[0].height, 60);
    }

    #[test]
    fn test_overwide_glyph_gets_own_line() {
        let info = lay("a[font size=100]b", &width(30));
        assert_eq!(texts(&info), ["a", "b"]);
        assert_eq!(info.lines[1].width, 50.0);
    }

    #[test]
    fn test_line_height_and_line_pitch() {
        let constraints = LayoutConstraints {
            line_pitch: 4.0,
            ..Default::default()
        };
        let info = lay("a[font size=40]b\nc", &constraints);
        assert_eq!(info.lines[0].height, 40);
        assert_eq!(info.lines[1].height, 40, "font persists across lines");
        assert_eq!(info.total_height, 84.0);
    }

    #[test]
    fn test_border_adds_to_line_height() {
        let info = lay("[font border=full bw=3]a", &LayoutConstraints::default());
        assert_eq!(info.lines[0].height, 26);
        assert_eq!(info.lines[0].width, 10.0, "border does not change the advance");
    }

    #[test]
    fn test_font_tag_rebased_to_its_line() {
        let info = lay("abc[font size=30]de", &width(30));
        assert_eq!(texts(&info), ["abc", "de"]);
        assert!(info.lines[0].tags.is_empty());
        assert_eq!(info.lines[1].tags.len(), 1);
        assert_eq!(info.lines[1].tags[0].anchor(), 0);
        assert_eq!(info.lines[1].width, 30.0);
    }

    #[test]
    fn test_trailing_tag_joins_last_line() {
        let info = lay("ab[font size=30]", &LayoutConstraints::default());
        assert_eq!(info.line_count(), 1);
        assert_eq!(info.lines[0].tags.len(), 1);
        assert_eq!(info.lines[0].tags[0].anchor(), 2);
    }

    #[test]
    fn test_control_characters_are_zero_width() {
        let info = lay("a\tb", &LayoutConstraints::default());
        assert_eq!(info.lines[0].codes, vec!['a', '\t', 'b']);
        assert_eq!(info.lines[0].width, 20.0);
    }

    #[test]
    fn test_ruby_run_wraps_as_a_unit() {
        let info = lay("ab[ruby rb='cde' rt='x']f", &width(40));
        assert_eq!(texts(&info), ["ab", "cdef"]);
        assert_eq!(info.lines[1].tags[0].anchor(), 0);

        let info = lay("ab[ruby rb='cde' rt='x']f", &width(50));
        assert_eq!(texts(&info), ["abcde", "f"]);
    }

    #[test]
    fn test_ruby_run_is_never_split() {
        let info = lay("[ruby rb='abcdef' rt='x']g", &width(40));
        assert_eq!(texts(&info), ["abcdef", "g"]);
        assert_eq!(info.lines[0].width, 60.0);
    }

    fn annotation(info: &TextInfo) -> &RubyText {
        info.lines
            .iter()
            .flat_map(|line| line.tags.iter())
            .find_map(|tag| match tag {
                Tag::Ruby(ruby) => ruby.annotation.as_deref(),
                Tag::Font(_) => None,
            })
            .expect("ruby annotation")
    }

    #[test]
    fn test_narrow_ruby_is_spread_over_base() {
        let info = lay("[ruby rb='漢字' rt='かな']", &LayoutConstraints::default());
        let ruby = annotation(&info);
        assert_eq!(ruby.font.size, 10);
        assert_eq!(ruby.base_width, 20);
        // Two glyphs of advance 5 spread over 20 pixels
        assert_eq!(ruby.info.lines[0].side_pitch, 5.0);
        assert_eq!(ruby.info.lines[0].width, 20.0);
        assert_eq!(ruby.offset_x, 2.5);
    }

    #[test]
    fn test_wide_ruby_is_centred() {
        let info = lay("[ruby rb='漢字' rt='ひらがなかな']", &LayoutConstraints::default());
        let ruby = annotation(&info);
        assert_eq!(ruby.info.total_width, 30.0);
        assert_eq!(ruby.info.lines[0].side_pitch, 0.0);
        assert_eq!(ruby.offset_x, -5.0);
    }

    #[test]
    fn test_ruby_does_not_change_line_width() {
        let info = lay("a[ruby rb='漢字' rt='ひらがなかなかな']b", &LayoutConstraints::default());
        assert_eq!(info.lines[0].width, 40.0);
        assert_eq!(info.lines[0].height, 20);
    }

    #[test]
    fn test_max_height_truncates_lines() {
        let constraints = LayoutConstraints {
            max_height: 50,
            ..Default::default()
        };
        let info = lay("a\nb\nc\nd", &constraints);
        assert_eq!(texts(&info), ["a\n", "b\n"]);
        assert_eq!(info.total_height, 40.0);
    }

    #[test]
    fn test_max_height_keeps_first_line() {
        let constraints = LayoutConstraints {
            max_height: 5,
            ..Default::default()
        };
        let info = lay("a\nb", &constraints);
        assert_eq!(texts(&info), ["a\n"]);
    }

    #[test]
    fn test_relayout_of_appended_text_matches_full_layout() {
        let font = FontDescriptor::default();
        let constraints = width(30);
        let engine = LineLayoutEngine::new(&HalfEm, &constraints);

        let before = engine.layout(&ParsedText::plain("abcdefghij"), &font);
        assert_eq!(before.line_count(), 4);

        let after_text = ParsedText::plain("abcdefghijXY");
        let incremental = engine.relayout(&after_text, &font, &before, 10);
        let full = engine.layout(&after_text, &font);

        assert_eq!(incremental.lines, full.lines);
        assert_eq!(incremental.total_height, full.total_height);
        assert_eq!(incremental.valid_range(), 3..4);
        assert!(incremental.auto_indent);
    }

    #[test]
    fn test_relayout_keeps_lines_before_dirty_line() {
        let font = FontDescriptor::default();
        let constraints = width(30);
        let engine = LineLayoutEngine::new(&HalfEm, &constraints);

        let before = engine.layout(&ParsedText::plain("abcdefghij"), &font);
        let edited = ParsedText::plain("abcdeXghij");
        let incremental = engine.relayout(&edited, &font, &before, 5);

        assert_eq!(incremental.valid_range(), 1..4);
        assert_eq!(incremental.lines[0], before.lines[0]);
        assert_eq!(incremental.lines[1].text(), "deX");
    }

    #[test]
    fn test_relayout_restores_font_at_restart() {
        let font = FontDescriptor::default();
        let constraints = width(60);
        let engine = LineLayoutEngine::new(&HalfEm, &constraints);

        let parsed = parse_markup("[font size=40]abcd", &font).unwrap();
        let before = engine.layout(&parsed, &font);
        assert_eq!(texts(&before), ["abc", "d"]);

        let incremental = engine.relayout(&parsed, &font, &before, 4);
        assert_eq!(incremental.valid_range(), 1..2);
        assert_eq!(incremental.lines, before.lines);
    }

    #[test]
    fn test_relayout_revisits_wrap_before_change() {
        let font = FontDescriptor::default();
        let constraints = width(40);
        let engine = LineLayoutEngine::new(&HalfEm, &constraints);

        let before = engine.layout(&parse_markup("abc[font size=80]d", &font).unwrap(), &font);
        assert_eq!(texts(&before), ["abc", "d"]);

        // A smaller glyph at the start of the second line now fits on the first
        let edited = parse_markup("abc[font size=20]d", &font).unwrap();
        let incremental = engine.relayout(&edited, &font, &before, 3);
        let full = engine.layout(&edited, &font);
        assert_eq!(texts(&full), ["abcd"]);
        assert_eq!(incremental.lines, full.lines);
        assert_eq!(incremental.valid_range(), 0..1);
    }
}
