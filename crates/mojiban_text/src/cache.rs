//! Glyph cache
//!
//! Bounded map from (character, font) to rasterized glyphs. Recency is tracked
//! with a monotonically increasing priority counter and two ordered indexes
//! (priority -> key, key -> priority): every lookup hit moves the entry to a
//! fresh priority, and eviction removes the lowest priority entry, i.e. the
//! least recently touched one. Promotion and eviction are both O(log n).

use crate::font::FontDescriptor;
use crate::rasterizer::RasterizedGlyph;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Maximum number of glyphs kept by a default cache
pub const MAX_CACHE_SIZE: usize = 1 << 14;

/// Integer pixel size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

/// RGBA8 glyph texture (straight alpha, row-major)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GlyphBitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl GlyphBitmap {
    /// Wrap RGBA pixels; the buffer is resized to `width * height * 4` bytes
    pub fn new(width: u32, height: u32, mut pixels: Vec<u8>) -> Self {
        pixels.resize(width as usize * height as usize * 4, 0);
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// `[r, g, b, a]` at `(x, y)`, transparent outside the bitmap
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        if x >= self.width || y >= self.height {
            return [0, 0, 0, 0];
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }
}

/// Outline metrics reported by the rasterizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GlyphMetrics {
    /// Offset from the pen position to the left edge of the outline
    pub bearing_x: i32,
    /// Offset from the baseline to the top edge of the outline
    pub bearing_y: i32,
    pub advance: i32,
    /// Size of the outline's bounding box
    pub black_box: Size,
}

/// One character rasterized in one font style
#[derive(Debug, Clone)]
pub struct Glyph {
    code: char,
    texture: Arc<GlyphBitmap>,
    metrics: GlyphMetrics,
    size: Size,
    max_size: Size,
    placeholder: bool,
}

impl Glyph {
    pub fn new(code: char, raster: RasterizedGlyph) -> Self {
        Self {
            code,
            texture: Arc::new(raster.bitmap),
            metrics: raster.metrics,
            size: raster.size,
            max_size: raster.max_size,
            placeholder: false,
        }
    }

    /// Visible stand-in for a character the rasterizer could not produce
    pub fn placeholder(code: char, font: &FontDescriptor) -> Self {
        let mut glyph = Self::new(code, crate::compose::placeholder(font));
        glyph.placeholder = true;
        glyph
    }

    pub fn code(&self) -> char {
        self.code
    }

    /// Texture shared with the cache and with render objects
    pub fn texture(&self) -> &Arc<GlyphBitmap> {
        &self.texture
    }

    pub fn metrics(&self) -> &GlyphMetrics {
        &self.metrics
    }

    /// Advance box
    pub fn size(&self) -> Size {
        self.size
    }

    /// Bounding box including the border
    pub fn max_size(&self) -> Size {
        self.max_size
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }
}

/// Cache identity of a glyph: character code plus the complete font
#[derive(Debug, Clone)]
pub struct CacheKey {
    code: u32,
    font: FontDescriptor,
}

impl CacheKey {
    pub fn new(code: char, font: FontDescriptor) -> Self {
        Self {
            code: code as u32,
            font,
        }
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn font(&self) -> &FontDescriptor {
        &self.font
    }
}

impl Ord for CacheKey {
    /// Code first, then the glyph styling, then the logical font fields
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (&self.font, &other.font);
        self.code
            .cmp(&other.code)
            .then(a.color_top.cmp(&b.color_top))
            .then(a.color_bottom.cmp(&b.color_bottom))
            .then(a.border.cmp(&b.border))
            .then(a.border_width.cmp(&b.border_width))
            .then(a.border_color.cmp(&b.border_color))
            .then_with(|| {
                a.size
                    .cmp(&b.size)
                    .then(a.weight.cmp(&b.weight))
                    .then(a.italic.cmp(&b.italic))
                    .then(a.underline.cmp(&b.underline))
                    .then(a.charset.cmp(&b.charset))
                    .then_with(|| a.face.cmp(&b.face))
            })
    }
}

impl PartialOrd for CacheKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CacheKey {}

/// Bounded glyph store with least-recently-touched eviction
pub struct GlyphCache {
    capacity: usize,
    priority: u64,
    glyphs: BTreeMap<CacheKey, Arc<Glyph>>,
    priority_to_key: BTreeMap<u64, CacheKey>,
    key_to_priority: BTreeMap<CacheKey, u64>,
}

impl GlyphCache {
    /// Create a cache holding at most [`MAX_CACHE_SIZE`] glyphs
    pub fn new() -> Self {
        Self::with_capacity(MAX_CACHE_SIZE)
    }

    /// Create a cache with a custom bound (at least one entry)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            priority: 0,
            glyphs: BTreeMap::new(),
            priority_to_key: BTreeMap::new(),
            key_to_priority: BTreeMap::new(),
        }
    }

    /// Find a glyph and mark it most recently used
    pub fn lookup(&mut self, key: &CacheKey) -> Option<Arc<Glyph>> {
        let glyph = Arc::clone(self.glyphs.get(key)?);
        self.touch(key);
        Some(glyph)
    }

    /// Store a freshly rasterized glyph, evicting the least recently used
    /// entries while the cache is over capacity
    pub fn insert(&mut self, key: CacheKey, glyph: Glyph) -> Arc<Glyph> {
        let glyph = Arc::new(glyph);
        self.glyphs.insert(key.clone(), Arc::clone(&glyph));
        self.touch(&key);
        self.arrange();
        glyph
    }

    /// Check for a key without changing its recency
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.glyphs.contains_key(key)
    }

    /// Drop every glyph
    pub fn clear(&mut self) {
        self.glyphs.clear();
        self.priority_to_key.clear();
        self.key_to_priority.clear();
        tracing::debug!("Glyph cache cleared");
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn touch(&mut self, key: &CacheKey) {
        if let Some(old) = self.key_to_priority.remove(key) {
            self.priority_to_key.remove(&old);
        }
        self.priority += 1;
        self.priority_to_key.insert(self.priority, key.clone());
        self.key_to_priority.insert(key.clone(), self.priority);
    }

    fn arrange(&mut self) {
        while self.glyphs.len() > self.capacity {
            let Some((_, key)) = self.priority_to_key.pop_first() else {
                break;
            };
            self.key_to_priority.remove(&key);
            self.glyphs.remove(&key);
            tracing::trace!("Evicted glyph U+{:04X}", key.code);
        }
    }
}

impl Default for GlyphCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::{BorderKind, Color};

    fn key(code: u32) -> CacheKey {
        CacheKey::new(
            char::from_u32(0x4E00 + code).unwrap(),
            FontDescriptor::default(),
        )
    }

    fn glyph(code: char) -> Glyph {
        Glyph::new(
            code,
            RasterizedGlyph {
                bitmap: GlyphBitmap::empty(),
                metrics: GlyphMetrics::default(),
                size: Size::new(10, 10),
                max_size: Size::new(10, 10),
            },
        )
    }

    fn insert(cache: &mut GlyphCache, code: u32) {
        let k = key(code);
        let g = glyph(char::from_u32(k.code()).unwrap());
        cache.insert(k, g);
    }

    fn assert_consistent(cache: &GlyphCache) {
        assert_eq!(cache.glyphs.len(), cache.priority_to_key.len());
        assert_eq!(cache.glyphs.len(), cache.key_to_priority.len());
        for (priority, k) in &cache.priority_to_key {
            assert_eq!(cache.key_to_priority.get(k), Some(priority));
            assert!(cache.glyphs.contains_key(k));
        }
    }

    #[test]
    fn test_size_never_exceeds_capacity() {
        let mut cache = GlyphCache::with_capacity(8);
        for code in 0..100 {
            insert(&mut cache, code);
            assert!(cache.len() <= 8);
            assert_consistent(&cache);
        }
        assert_eq!(cache.len(), 8);
    }

    #[test]
    fn test_lookup_returns_same_glyph() {
        let mut cache = GlyphCache::with_capacity(4);
        insert(&mut cache, 1);
        let first = cache.lookup(&key(1)).unwrap();
        let second = cache.lookup(&key(1)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(first.texture(), second.texture()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_eviction_removes_least_recently_touched() {
        let mut cache = GlyphCache::with_capacity(3);
        insert(&mut cache, 1);
        insert(&mut cache, 2);
        insert(&mut cache, 3);

        // 1 becomes the most recent; 2 is now the oldest
        assert!(cache.lookup(&key(1)).is_some());
        insert(&mut cache, 4);

        assert!(cache.contains(&key(1)));
        assert!(!cache.contains(&key(2)));
        assert!(cache.contains(&key(3)));
        assert!(cache.contains(&key(4)));
        assert_consistent(&cache);
    }

    #[test]
    fn test_repeatedly_touched_key_survives_churn() {
        let mut cache = GlyphCache::with_capacity(4);
        insert(&mut cache, 0);
        for code in 1..50 {
            assert!(cache.lookup(&key(0)).is_some(), "key 0 evicted at {code}");
            insert(&mut cache, code);
        }
        assert!(cache.contains(&key(0)));
    }

    #[test]
    fn test_clear_misses_everything() {
        let mut cache = GlyphCache::with_capacity(16);
        for code in 0..10 {
            insert(&mut cache, code);
        }
        cache.clear();
        assert!(cache.is_empty());
        for code in 0..10 {
            assert!(cache.lookup(&key(code)).is_none());
        }
        assert_consistent(&cache);
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(GlyphCache::new().capacity(), MAX_CACHE_SIZE);
        assert_eq!(MAX_CACHE_SIZE, 16384);
        assert_eq!(GlyphCache::with_capacity(0).capacity(), 1);
    }

    #[test]
    fn test_key_equality_covers_every_field() {
        let base = FontDescriptor::default();
        let variants = [
            base.clone().with_face("Other"),
            base.clone().with_size(base.size + 1),
            FontDescriptor {
                weight: 700,
                ..base.clone()
            },
            FontDescriptor {
                italic: true,
                ..base.clone()
            },
            FontDescriptor {
                underline: true,
                ..base.clone()
            },
            FontDescriptor {
                charset: 1,
                ..base.clone()
            },
            FontDescriptor {
                color_top: Color::BLACK,
                ..base.clone()
            },
            FontDescriptor {
                color_bottom: Color::BLACK,
                ..base.clone()
            },
            base.clone().with_border(BorderKind::Full, 0, base.border_color),
            FontDescriptor {
                border_width: 2,
                ..base.clone()
            },
            FontDescriptor {
                border_color: Color::WHITE,
                ..base.clone()
            },
        ];

        let reference = CacheKey::new('a', base.clone());
        assert_eq!(reference, CacheKey::new('a', base.clone()));
        assert_ne!(reference, CacheKey::new('b', base));
        for font in variants {
            let other = CacheKey::new('a', font);
            assert_ne!(reference, other);
            assert_ne!(reference.cmp(&other), Ordering::Equal);
            assert_eq!(reference.cmp(&other), other.cmp(&reference).reverse());
        }
    }

    #[test]
    fn test_key_orders_by_code_first() {
        let red = FontDescriptor::default().with_color(Color::from_rgb(255, 0, 0));
        let blue = FontDescriptor::default().with_color(Color::from_rgb(0, 0, 255));
        assert!(CacheKey::new('a', red) < CacheKey::new('b', blue));
    }
}
