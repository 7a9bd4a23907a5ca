//! Font registry
//!
//! Resolves a [`FontDescriptor`]'s face, weight and italic flag to font data
//! through fontdb. Faces registered from files take part in the same queries
//! as system fonts.

use crate::font::FontDescriptor;
use crate::{Result, TextError};
use fontdb::{Database, Family, Query, Source, Stretch, Style, Weight};
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::Arc;

/// Raw font file bytes plus the face index inside a collection
#[derive(Debug)]
pub struct LoadedFace {
    data: Vec<u8>,
    index: u32,
}

impl LoadedFace {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

type FaceKey = (Arc<str>, i32, bool);

/// fontdb database with a per-style resolution cache
pub struct FontRegistry {
    db: Database,
    /// Resolved faces (Some = found, None = not found)
    faces: FxHashMap<FaceKey, Option<Arc<LoadedFace>>>,
}

impl FontRegistry {
    /// Create a registry and load the system fonts
    pub fn new() -> Self {
        let mut db = Database::new();
        db.load_system_fonts();
        tracing::debug!("Loaded {} system font faces", db.len());
        Self {
            db,
            faces: FxHashMap::default(),
        }
    }

    /// Create a registry that only knows fonts registered explicitly
    pub fn empty() -> Self {
        Self {
            db: Database::new(),
            faces: FxHashMap::default(),
        }
    }

    /// Register every face contained in a font file
    pub fn register_font_file(&mut self, path: &Path) -> Result<()> {
        let before = self.db.len();
        self.db.load_font_file(path).map_err(|e| {
            TextError::FontLoadError(format!("Failed to load font file {:?}: {}", path, e))
        })?;
        let added = self.db.len() - before;
        if added == 0 {
            return Err(TextError::FontLoadError(format!(
                "No font faces found in {:?}",
                path
            )));
        }
        // Earlier misses may now resolve
        self.faces.clear();
        tracing::info!("Registered {} font face(s) from {:?}", added, path);
        Ok(())
    }

    /// Number of faces known to the registry
    pub fn face_count(&self) -> usize {
        self.db.len()
    }

    /// Find the face for a descriptor
    pub fn resolve(&mut self, font: &FontDescriptor) -> Result<Arc<LoadedFace>> {
        let key: FaceKey = (Arc::clone(&font.face), font.weight, font.italic);
        if let Some(cached) = self.faces.get(&key) {
            return cached.clone().ok_or_else(|| not_found(font));
        }

        let resolved = self.query(font).map(Arc::new);
        self.faces.insert(key, resolved.clone());
        resolved.ok_or_else(|| not_found(font))
    }

    fn query(&self, font: &FontDescriptor) -> Option<LoadedFace> {
        let family = match font.face.as_ref() {
            "sans-serif" => Family::SansSerif,
            "serif" => Family::Serif,
            "monospace" => Family::Monospace,
            name => Family::Name(name),
        };
        let families = [family, Family::SansSerif];
        let weight = Weight(font.weight.clamp(1, 1000) as u16);

        let styles: &[Style] = if font.italic {
            &[Style::Italic, Style::Oblique, Style::Normal]
        } else {
            &[Style::Normal]
        };
        let id = styles.iter().find_map(|&style| {
            self.db.query(&Query {
                families: &families,
                weight,
                style,
                stretch: Stretch::Normal,
            })
        })?;

        match self.load_face(id) {
            Ok(face) => Some(face),
            Err(e) => {
                tracing::warn!("Failed to load face for '{}': {}", font.face, e);
                None
            }
        }
    }

    fn load_face(&self, id: fontdb::ID) -> Result<LoadedFace> {
        let (src, index) = self
            .db
            .face_source(id)
            .ok_or_else(|| TextError::FontLoadError("Font source not found".to_string()))?;

        let data = match src {
            Source::File(path) => std::fs::read(&path).map_err(|e| {
                TextError::FontLoadError(format!("Failed to read font file {:?}: {}", path, e))
            })?,
            Source::Binary(arc) => arc.as_ref().as_ref().to_vec(),
            Source::SharedFile(_path, data) => data.as_ref().as_ref().to_vec(),
        };

        Ok(LoadedFace { data, index })
    }
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(font: &FontDescriptor) -> TextError {
    TextError::FontLoadError(format!(
        "Font '{}' (weight={}, italic={}) not found",
        font.face, font.weight, font.italic
    ))
}
