//! Glyph bitmap composition
//!
//! Rasterizers produce a single-channel coverage mask. Composition turns that
//! mask into the final RGBA texture for one font style: vertical gradient
//! fill, optional outline or drop shadow, and underline.
//!
//! The glyph cell is `advance` wide and `ascent + descent` tall with the
//! baseline `ascent` pixels below its top. A full border pads the cell by the
//! border width on every side; a shadow extends it by the border width to the
//! right and bottom.

use crate::cache::{GlyphBitmap, GlyphMetrics, Size};
use crate::font::{BorderKind, Color, FontDescriptor};
use crate::rasterizer::RasterizedGlyph;

/// 8-bit coverage mask positioned relative to the pen origin on the baseline
#[derive(Debug, Clone, Default)]
pub struct Coverage {
    pub width: u32,
    pub height: u32,
    /// Distance from the pen position to the left edge of the mask
    pub left: i32,
    /// Distance from the baseline up to the top edge of the mask
    pub top: i32,
    pub data: Vec<u8>,
}

impl Coverage {
    fn at(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return 0;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
            .unwrap_or(0)
    }
}

/// Single-channel canvas used while composing
struct Mask {
    width: i32,
    height: i32,
    data: Vec<u8>,
}

impl Mask {
    fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width.max(0) as usize * height.max(0) as usize],
        }
    }

    fn get(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return 0;
        }
        self.data[(y * self.width + x) as usize]
    }

    fn max_in(&mut self, x: i32, y: i32, value: u8) {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return;
        }
        let px = &mut self.data[(y * self.width + x) as usize];
        *px = (*px).max(value);
    }

    /// Grow every covered pixel into a disc of `radius`
    ///
    /// Each covered row is spread horizontally by the half-chord of the disc
    /// at every vertical distance, so the cost is linear in the radius.
    fn dilate(&self, radius: i32) -> Mask {
        let mut out = Mask::new(self.width, self.height);
        let width = self.width.max(0) as usize;
        if width == 0 || radius < 0 {
            return out;
        }
        let half_chords: Vec<usize> = (0..=radius)
            .map(|dy| isqrt(radius * radius - dy * dy) as usize)
            .collect();
        let mut spread = vec![0u8; width];

        for y in 0..self.height {
            let row = &self.data[y as usize * width..(y as usize + 1) * width];
            if row.iter().all(|&v| v == 0) {
                continue;
            }
            for dy in 0..=radius {
                sliding_max(row, half_chords[dy as usize], &mut spread);
                let targets = if dy == 0 { [y, -1] } else { [y - dy, y + dy] };
                for target in targets {
                    if target < 0 || target >= self.height {
                        continue;
                    }
                    let start = target as usize * width;
                    for (px, &value) in out.data[start..start + width].iter_mut().zip(&spread) {
                        *px = (*px).max(value);
                    }
                }
            }
        }
        out
    }

    fn shifted(&self, dx: i32, dy: i32) -> Mask {
        let mut out = Mask::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                out.max_in(x + dx, y + dy, self.get(x, y));
            }
        }
        out
    }
}

/// Largest integer whose square does not exceed `n`
fn isqrt(n: i32) -> i32 {
    let mut root = (n.max(0) as f64).sqrt() as i32;
    while root * root > n {
        root -= 1;
    }
    while (root + 1) * (root + 1) <= n {
        root += 1;
    }
    root
}

/// `out[x]` = max of `row[x - reach ..= x + reach]`, clipped to the row
///
/// Block-wise prefix/suffix maxima keep this linear in the row length.
fn sliding_max(row: &[u8], reach: usize, out: &mut [u8]) {
    let n = row.len();
    let window = 2 * reach + 1;
    let padded = n + 2 * reach;
    let value = |i: usize| {
        if i < reach || i >= reach + n {
            0
        } else {
            row[i - reach]
        }
    };

    let mut prefix = vec![0u8; padded];
    let mut suffix = vec![0u8; padded];
    for i in 0..padded {
        prefix[i] = if i % window == 0 {
            value(i)
        } else {
            prefix[i - 1].max(value(i))
        };
    }
    for i in (0..padded).rev() {
        suffix[i] = if i + 1 == padded || (i + 1) % window == 0 {
            value(i)
        } else {
            suffix[i + 1].max(value(i))
        };
    }
    for (x, px) in out.iter_mut().enumerate().take(n) {
        *px = suffix[x].max(prefix[x + 2 * reach]);
    }
}

/// Build the styled texture for one glyph
pub fn compose_glyph(
    coverage: &Coverage,
    advance: i32,
    ascent: i32,
    descent: i32,
    font: &FontDescriptor,
) -> RasterizedGlyph {
    let advance = advance.max(0);
    let cell_height = (ascent + descent).max(1);
    let border = font.effective_border_width();
    let (pad, shadow) = match font.border {
        BorderKind::Full => (border, 0),
        BorderKind::Shadow => (0, border),
        BorderKind::None => (0, 0),
    };

    let content_width = advance.max(coverage.left + coverage.width as i32);
    let width = content_width + pad * 2 + shadow;
    let height = cell_height + pad * 2 + shadow;

    // Fill mask in canvas coordinates
    let mut fill = Mask::new(width, height);
    let origin_x = pad + coverage.left;
    let origin_y = pad + ascent - coverage.top;
    for y in 0..coverage.height as i32 {
        for x in 0..coverage.width as i32 {
            fill.max_in(origin_x + x, origin_y + y, coverage.at(x, y));
        }
    }

    if font.underline && advance > 0 {
        let thickness = (font.pixel_size() / 16).max(1);
        let top = pad + ascent + (descent / 3).max(1);
        for y in top..top + thickness {
            for x in pad..pad + advance {
                fill.max_in(x, y, 255);
            }
        }
    }

    let outline = match font.border {
        BorderKind::Full if border > 0 => Some(fill.dilate(border)),
        BorderKind::Shadow if border > 0 => Some(fill.shifted(border, border)),
        _ => None,
    };

    let mut pixels = Vec::with_capacity(width.max(0) as usize * height.max(0) as usize * 4);
    for y in 0..height {
        let t = if cell_height > 1 {
            (y - pad) as f32 / (cell_height - 1) as f32
        } else {
            0.0
        };
        let fill_color = font.color_top.lerp(font.color_bottom, t);
        for x in 0..width {
            let front = scale_alpha(fill_color, fill.get(x, y));
            let back = match &outline {
                Some(mask) => scale_alpha(font.border_color, mask.get(x, y)),
                None => [0; 4],
            };
            pixels.extend_from_slice(&over(front, back));
        }
    }

    RasterizedGlyph {
        bitmap: GlyphBitmap::new(width.max(0) as u32, height.max(0) as u32, pixels),
        metrics: GlyphMetrics {
            bearing_x: coverage.left,
            bearing_y: coverage.top,
            advance,
            black_box: Size::new(coverage.width as i32, coverage.height as i32),
        },
        size: Size::new(advance, cell_height),
        max_size: Size::new(width, height),
    }
}

/// Hollow box drawn in place of a glyph the rasterizer could not produce
pub fn placeholder(font: &FontDescriptor) -> RasterizedGlyph {
    let size = font.pixel_size().max(2);
    let advance = (size / 2).max(2);
    let descent = size / 5;
    let ascent = size - descent;

    let box_width = (advance - 2).max(1) as u32;
    let box_height = (size - 2).max(1) as u32;
    let mut data = vec![0u8; box_width as usize * box_height as usize];
    for y in 0..box_height {
        for x in 0..box_width {
            if x == 0 || y == 0 || x + 1 == box_width || y + 1 == box_height {
                data[(y * box_width + x) as usize] = 255;
            }
        }
    }

    let coverage = Coverage {
        width: box_width,
        height: box_height,
        left: 1,
        top: ascent - 1,
        data,
    };
    compose_glyph(&coverage, advance, ascent, descent, font)
}

fn scale_alpha(color: Color, coverage: u8) -> [u8; 4] {
    let alpha = (color.a() as u32 * coverage as u32 + 127) / 255;
    [color.r(), color.g(), color.b(), alpha as u8]
}

/// Straight-alpha "over" of `front` onto `back`
fn over(front: [u8; 4], back: [u8; 4]) -> [u8; 4] {
    let fa = front[3] as f32 / 255.0;
    let ba = back[3] as f32 / 255.0;
    let out_a = fa + ba * (1.0 - fa);
    if out_a <= 0.0 {
        return [0; 4];
    }
    let channel = |f: u8, b: u8| -> u8 {
        ((f as f32 * fa + b as f32 * ba * (1.0 - fa)) / out_a).round() as u8
    };
    [
        channel(front[0], back[0]),
        channel(front[1], back[1]),
        channel(front[2], back[2]),
        (out_a * 255.0).round() as u8,
    ]
}
