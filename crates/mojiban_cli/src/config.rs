//! mojiban configuration file handling

use anyhow::{Context, Result};
use mojiban_text::{Color, LayoutConstraints, RendererConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level configuration (mojiban.toml)
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct CliConfig {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default)]
    pub layout: LayoutConstraints,
}

/// PNG output settings
#[derive(Debug, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Background fill (ARGB)
    #[serde(default = "default_background")]
    pub background: Color,
    /// Empty border around the rendered text in pixels
    #[serde(default = "default_padding")]
    pub padding: u32,
}

fn default_background() -> Color {
    Color::from_rgb(0x20, 0x20, 0x28)
}

fn default_padding() -> u32 {
    8
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            background: default_background(),
            padding: default_padding(),
        }
    }
}

impl CliConfig {
    /// Load configuration from a file, or a directory containing mojiban.toml
    pub fn load(path: &Path) -> Result<Self> {
        let config_path = if path.is_dir() {
            path.join("mojiban.toml")
        } else {
            path.to_path_buf()
        };

        if !config_path.exists() {
            anyhow::bail!("No config found at {}", config_path.display());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: CliConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(config)
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}
