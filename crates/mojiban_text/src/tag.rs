//! Inline tags
//!
//! Tags are anchored to a character offset in the plain text produced by the
//! parser. A font tag changes the font from its anchor onward; a ruby tag
//! places an annotation above the base text that starts at its anchor.

use crate::font::FontDescriptor;
use crate::layout::TextInfo;

/// A style or annotation directive anchored in the plain text
#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    Font(FontTag),
    Ruby(RubyTag),
}

impl Tag {
    /// Character offset this tag applies from
    pub fn anchor(&self) -> usize {
        match self {
            Tag::Font(tag) => tag.anchor,
            Tag::Ruby(tag) => tag.anchor,
        }
    }

    pub fn set_anchor(&mut self, anchor: usize) {
        match self {
            Tag::Font(tag) => tag.anchor = anchor,
            Tag::Ruby(tag) => tag.anchor = anchor,
        }
    }

    /// Copy of this tag with its anchor moved by `-base`
    pub fn rebased(&self, base: usize) -> Tag {
        let mut tag = self.clone();
        tag.set_anchor(self.anchor().saturating_sub(base));
        tag
    }

    /// Tag name as written in markup
    pub fn name(&self) -> &'static str {
        match self {
            Tag::Font(_) => "font",
            Tag::Ruby(_) => "ruby",
        }
    }
}

/// Font change
#[derive(Debug, Clone, PartialEq)]
pub struct FontTag {
    pub anchor: usize,
    /// Complete font in effect from the anchor
    pub font: FontDescriptor,
    /// Pixel offset applied to glyphs drawn in this font
    pub offset: [f32; 2],
}

/// Ruby annotation over a run of base text
#[derive(Debug, Clone, PartialEq)]
pub struct RubyTag {
    pub anchor: usize,
    /// Base text (also present in the plain text at `anchor`)
    pub text: String,
    /// Annotation text
    pub ruby: String,
    pub left_margin: i32,
    pub top_margin: i32,
    /// Measured annotation, filled in by layout
    pub annotation: Option<Box<RubyText>>,
}

impl RubyTag {
    pub fn new(anchor: usize, text: impl Into<String>, ruby: impl Into<String>) -> Self {
        Self {
            anchor,
            text: text.into(),
            ruby: ruby.into(),
            left_margin: 0,
            top_margin: 0,
            annotation: None,
        }
    }

    /// Number of base characters covered by the annotation
    pub fn base_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Annotation text laid out independently of the line that owns it
#[derive(Debug, Clone, PartialEq)]
pub struct RubyText {
    pub font: FontDescriptor,
    pub info: TextInfo,
    /// Width of the base run the annotation sits over
    pub base_width: i32,
    /// Horizontal position of the annotation relative to the start of the base run
    pub offset_x: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebased_moves_anchor_only() {
        let tag = Tag::Ruby(RubyTag::new(7, "漢字", "かんじ"));
        let local = tag.rebased(5);
        assert_eq!(local.anchor(), 2);
        assert_eq!(tag.anchor(), 7);
        match local {
            Tag::Ruby(ruby) => {
                assert_eq!(ruby.text, "漢字");
                assert_eq!(ruby.base_len(), 2);
            }
            Tag::Font(_) => panic!("rebase changed the tag kind"),
        }
    }

    #[test]
    fn test_tag_names() {
        let font = Tag::Font(FontTag {
            anchor: 0,
            font: FontDescriptor::default(),
            offset: [0.0, 0.0],
        });
        assert_eq!(font.name(), "font");
        assert_eq!(Tag::Ruby(RubyTag::new(0, "a", "b")).name(), "ruby");
    }
}
