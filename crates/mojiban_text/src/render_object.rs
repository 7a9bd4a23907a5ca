//! Positioned render objects
//!
//! Turns a measured [`TextInfo`] into sprites: one per visible character, with
//! its bounds and the glyph texture shared with the cache. Alignment and
//! margins are resolved here. Ruby annotations become child objects placed
//! above their base run.

use crate::cache::GlyphBitmap;
use crate::font::{BorderKind, Color, FontDescriptor};
use crate::layout::{GlyphSource, LayoutConstraints, TextAlignment, TextInfo, VerticalAlignment};
use crate::tag::{RubyText, Tag};
use std::sync::Arc;

/// One glyph quad
#[derive(Debug, Clone)]
pub struct GlyphSprite {
    pub code: char,
    /// Position and size in pixels (x, y, width, height), relative to the owning object
    pub bounds: [f32; 4],
    pub texture: Arc<GlyphBitmap>,
    /// Vertex tint (RGBA, 0.0-1.0)
    pub color: [f32; 4],
}

/// Sprites of one text plus nested annotation objects
#[derive(Debug, Clone, Default)]
pub struct TextRenderObject {
    /// Origin of this object, relative to its parent
    pub position: [f32; 2],
    pub sprites: Vec<GlyphSprite>,
    pub children: Vec<TextRenderObject>,
}

impl TextRenderObject {
    /// Lay out sprites for `info` inside the box described by `constraints`
    pub fn build<G: GlyphSource + ?Sized>(
        info: &TextInfo,
        constraints: &LayoutConstraints,
        default_font: &FontDescriptor,
        vertex_color: Color,
        position: [f32; 2],
        glyphs: &G,
    ) -> Self {
        let mut object = TextRenderObject {
            position,
            ..Default::default()
        };
        let color = normalized(vertex_color);
        let margin = constraints.margin;

        let box_width = constraints
            .available_width()
            .unwrap_or(info.total_width);
        let box_height = constraints
            .available_height()
            .unwrap_or(info.total_height);

        let mut line_top = margin.top as f32
            + match constraints.vertical_alignment {
                VerticalAlignment::Top => 0.0,
                VerticalAlignment::Center => (box_height - info.total_height) / 2.0,
                VerticalAlignment::Bottom => box_height - info.total_height,
            };

        let mut font = default_font.clone();
        let mut offset = [0.0f32; 2];

        for line in &info.lines {
            let printable = line.codes.iter().any(|code| !code.is_control());
            // The pitch after the last character is not part of the visible run
            let visible = if printable {
                line.width - line.side_pitch
            } else {
                0.0
            };
            let mut x = margin.left as f32
                + match constraints.horizontal_alignment {
                    TextAlignment::Left => 0.0,
                    TextAlignment::Center => (box_width - visible) / 2.0,
                    TextAlignment::Right => box_width - visible,
                };
            let line_bottom = line_top + line.height as f32;

            let mut next_tag = 0;
            for (j, &code) in line.codes.iter().enumerate() {
                while let Some(tag) = line.tags.get(next_tag).filter(|tag| tag.anchor() <= j) {
                    next_tag += 1;
                    match tag {
                        Tag::Font(font_tag) => {
                            font = font_tag.font.clone();
                            offset = font_tag.offset;
                        }
                        Tag::Ruby(ruby) => {
                            if let Some(annotation) = &ruby.annotation {
                                let origin = [
                                    x + ruby.left_margin as f32 + annotation.offset_x,
                                    line_top - annotation.info.total_height - ruby.top_margin as f32,
                                ];
                                object.children.push(Self::annotation(
                                    annotation,
                                    vertex_color,
                                    origin,
                                    glyphs,
                                ));
                            }
                        }
                    }
                }

                if code.is_control() {
                    continue;
                }

                let glyph = glyphs.glyph(code, &font);
                let size = glyph.size();
                let max_size = glyph.max_size();
                let advance = if constraints.fixed_width > 0.0 {
                    constraints.fixed_width
                } else {
                    size.width as f32
                };
                let cell_offset = if constraints.fixed_width > 0.0 {
                    (constraints.fixed_width - size.width as f32) / 2.0
                } else {
                    0.0
                };
                // A full border pads the texture on the left
                let pad = match font.border {
                    BorderKind::Full => font.effective_border_width() as f32,
                    BorderKind::None | BorderKind::Shadow => 0.0,
                };

                let texture = glyph.texture();
                if !texture.is_empty() {
                    object.sprites.push(GlyphSprite {
                        code,
                        bounds: [
                            x + cell_offset - pad + offset[0],
                            line_bottom - max_size.height as f32 + offset[1],
                            texture.width() as f32,
                            texture.height() as f32,
                        ],
                        texture: Arc::clone(texture),
                        color,
                    });
                }

                x += advance + line.side_pitch;
            }

            // Tags anchored past the last code (end of text)
            for tag in &line.tags[next_tag.min(line.tags.len())..] {
                if let Tag::Font(font_tag) = tag {
                    font = font_tag.font.clone();
                    offset = font_tag.offset;
                }
            }

            line_top = line_bottom + constraints.line_pitch;
        }

        object
    }

    fn annotation<G: GlyphSource + ?Sized>(
        annotation: &RubyText,
        vertex_color: Color,
        position: [f32; 2],
        glyphs: &G,
    ) -> Self {
        Self::build(
            &annotation.info,
            &LayoutConstraints::default(),
            &annotation.font,
            vertex_color,
            position,
            glyphs,
        )
    }

    /// Number of sprites including those of children
    pub fn sprite_count(&self) -> usize {
        self.sprites.len() + self.children.iter().map(Self::sprite_count).sum::<usize>()
    }

    /// Every sprite with bounds translated to absolute coordinates
    pub fn flatten(&self) -> Vec<GlyphSprite> {
        let mut out = Vec::with_capacity(self.sprite_count());
        self.flatten_into([0.0, 0.0], &mut out);
        out
    }

    fn flatten_into(&self, parent: [f32; 2], out: &mut Vec<GlyphSprite>) {
        let origin = [parent[0] + self.position[0], parent[1] + self.position[1]];
        out.extend(self.sprites.iter().map(|sprite| {
            let mut sprite = sprite.clone();
            sprite.bounds[0] += origin[0];
            sprite.bounds[1] += origin[1];
            sprite
        }));
        for child in &self.children {
            child.flatten_into(origin, out);
        }
    }
}

fn normalized(color: Color) -> [f32; 4] {
    let [r, g, b, a] = color.to_rgba();
    [
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        a as f32 / 255.0,
    ]
}
