//! Renderer configuration
//!
//! Everything has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! cache_capacity = 4096
//! vertex_color = 0xFFFFFFFF
//! font_files = ["fonts/NotoSansJP-Regular.otf"]
//!
//! [default_font]
//! face = "Noto Sans JP"
//! size = 24
//! border = "full"
//! border_width = 2
//! ```

use crate::cache::MAX_CACHE_SIZE;
use crate::font::{Color, FontDescriptor};
use crate::{Result, TextError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Maximum number of glyphs kept in the cache
    pub cache_capacity: usize,
    /// Tint applied to every sprite
    pub vertex_color: Color,
    /// Font files registered when the renderer is created
    pub font_files: Vec<PathBuf>,
    /// Font given to texts created through the renderer
    pub default_font: FontDescriptor,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            cache_capacity: MAX_CACHE_SIZE,
            vertex_color: Color::WHITE,
            font_files: Vec::new(),
            default_font: FontDescriptor::default(),
        }
    }
}

impl RendererConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| TextError::Config(e.to_string()))
    }

    /// Read a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TextError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| TextError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| TextError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::BorderKind;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = RendererConfig::from_toml_str("").unwrap();
        assert_eq!(config, RendererConfig::default());
        assert_eq!(config.cache_capacity, MAX_CACHE_SIZE);
    }

    #[test]
    fn test_partial_font_inherits_defaults() {
        let config = RendererConfig::from_toml_str(
            r#"
            cache_capacity = 128
            vertex_color = 0x80FF0000
            font_files = ["a.ttf"]

            [default_font]
            face = "Serif Name"
            size = 32
            border = "shadow"
            border_width = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.cache_capacity, 128);
        assert_eq!(config.vertex_color, Color(0x80FF_0000));
        assert_eq!(config.font_files, vec![PathBuf::from("a.ttf")]);
        assert_eq!(&*config.default_font.face, "Serif Name");
        assert_eq!(config.default_font.size, 32);
        assert_eq!(config.default_font.border, BorderKind::Shadow);
        assert_eq!(config.default_font.weight, 400);
    }

    #[test]
    fn test_bad_document_is_config_error() {
        let err = RendererConfig::from_toml_str("cache_capacity = \"many\"").unwrap_err();
        assert!(matches!(err, TextError::Config(_)));
        assert_eq!(err.line(), None);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = RendererConfig::load(Path::new("/nonexistent/mojiban.toml")).unwrap_err();
        assert!(matches!(err, TextError::Config(_)));
    }

    #[test]
    fn test_round_trips_through_toml() {
        let mut config = RendererConfig::default();
        config.default_font = config.default_font.with_size(30);
        let text = config.to_toml().unwrap();
        assert_eq!(RendererConfig::from_toml_str(&text).unwrap(), config);
    }
}
