//! mojiban CLI
//!
//! Inspect and render markup text from the command line.

mod config;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use config::CliConfig;
use image::{Rgba, RgbaImage};
use mojiban_text::scanner::tokenize_markup;
use mojiban_text::{
    FixedPitchRasterizer, GlyphSprite, SwashRasterizer, Tag, TextAlignment, TextEntity,
    TextRenderObject, TextRenderer,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mojiban")]
#[command(author, version, about = "Markup text layout engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (or directory containing mojiban.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the token stream of the markup
    Tokens(InputArgs),

    /// Print the plain text and the tags found in it
    Parse(InputArgs),

    /// Print the measured lines
    Layout {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        style: StyleArgs,
    },

    /// Render the text into a PNG file
    Render {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        style: StyleArgs,

        /// Output PNG path
        #[arg(short, long, default_value = "mojiban.png")]
        out: PathBuf,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args)]
struct InputArgs {
    /// Markup text (read from --file or stdin when omitted)
    text: Option<String>,

    /// Read the markup from a file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Treat the input as plain text without tags
    #[arg(long)]
    no_markup: bool,
}

#[derive(Args)]
struct StyleArgs {
    /// Use box glyphs with this constant advance instead of system fonts
    #[arg(long, value_name = "ADVANCE")]
    fixed: Option<i32>,

    /// Register additional font files
    #[arg(long = "font-file", value_name = "PATH")]
    font_files: Vec<PathBuf>,

    /// Default font face
    #[arg(long)]
    face: Option<String>,

    /// Default font size in pixels
    #[arg(long)]
    size: Option<i32>,

    /// Wrap width in pixels
    #[arg(long)]
    max_width: Option<i32>,

    /// Box height in pixels
    #[arg(long)]
    max_height: Option<i32>,

    /// Horizontal alignment (left, center, right)
    #[arg(long, value_parser = parse_alignment)]
    align: Option<TextAlignment>,
}

fn parse_alignment(value: &str) -> std::result::Result<TextAlignment, String> {
    match value.to_ascii_lowercase().as_str() {
        "left" => Ok(TextAlignment::Left),
        "center" | "centre" => Ok(TextAlignment::Center),
        "right" => Ok(TextAlignment::Right),
        other => Err(format!("unknown alignment '{}'", other)),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };

    match cli.command {
        Commands::Tokens(input) => cmd_tokens(&input),
        Commands::Parse(input) => cmd_parse(&input, &config),
        Commands::Layout { input, style } => cmd_layout(&input, &style, config),
        Commands::Render { input, style, out } => cmd_render(&input, &style, config, &out),
        Commands::Config => cmd_config(&config),
    }
}

impl InputArgs {
    fn read(&self) -> Result<String> {
        if let Some(text) = &self.text {
            return Ok(text.clone());
        }
        if let Some(path) = &self.file {
            return std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()));
        }
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        Ok(text)
    }
}

fn cmd_tokens(input: &InputArgs) -> Result<()> {
    let source = input.read()?;
    for token in tokenize_markup(&source)? {
        println!("{:<10} {:?}", format!("{:?}", token.kind()), token.element());
    }
    Ok(())
}

fn cmd_parse(input: &InputArgs, config: &CliConfig) -> Result<()> {
    let mut text = TextEntity::new(&input.read()?);
    text.set_font(config.renderer.default_font.clone());
    text.set_syntactic_analysis(!input.no_markup);
    let parsed = text.parse()?;

    println!("text: {:?}", parsed.text());
    for tag in parsed.tags() {
        println!("{}", describe_tag(tag));
    }
    Ok(())
}

fn cmd_layout(input: &InputArgs, style: &StyleArgs, config: CliConfig) -> Result<()> {
    let source = input.read()?;
    let (renderer, mut text) = prepare(&source, input, style, config)?;
    let info = match renderer.create_text_info(&text) {
        Ok(info) => info,
        Err(e) => {
            tracing::warn!("{}", e);
            text.create_text_info(&renderer)
        }
    };

    println!(
        "{} line(s), {:.1} x {:.1}",
        info.line_count(),
        info.total_width,
        info.total_height
    );
    println!("{:>4} {:>8} {:>6} {:>6}  text", "#", "width", "height", "pitch");
    for (index, line) in info.lines.iter().enumerate() {
        println!(
            "{:>4} {:>8.1} {:>6} {:>6.1}  {:?}",
            index,
            line.width,
            line.height,
            line.side_pitch,
            line.text()
        );
        for tag in &line.tags {
            println!("{:>28}{}", "", describe_tag(tag));
        }
    }
    Ok(())
}

fn cmd_render(
    input: &InputArgs,
    style: &StyleArgs,
    config: CliConfig,
    out: &Path,
) -> Result<()> {
    let source = input.read()?;
    let background = config.output.background;
    let padding = config.output.padding;
    let (renderer, mut text) = prepare(&source, input, style, config)?;

    let info = text.create_text_info(&renderer);
    let object = renderer.create_render_object(&text, &info);
    let image = compose_image(&object, text.constraints(), &info, background, padding);
    image
        .save(out)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    info!(
        "Rendered {} sprite(s), {} cached glyph(s)",
        object.sprite_count(),
        renderer.cache_count()
    );
    println!("{} ({}x{})", out.display(), image.width(), image.height());
    Ok(())
}

fn cmd_config(config: &CliConfig) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}

/// Build the renderer and the text entity from config plus command-line overrides
fn prepare(
    source: &str,
    input: &InputArgs,
    style: &StyleArgs,
    config: CliConfig,
) -> Result<(TextRenderer, TextEntity)> {
    let mut renderer_config = config.renderer;
    renderer_config
        .font_files
        .extend(style.font_files.iter().cloned());
    if let Some(face) = &style.face {
        renderer_config.default_font = renderer_config.default_font.with_face(face);
    }
    if let Some(size) = style.size {
        renderer_config.default_font = renderer_config.default_font.with_size(size);
    }

    let renderer = match style.fixed {
        Some(advance) => TextRenderer::with_config(renderer_config, FixedPitchRasterizer::new(advance)),
        None => TextRenderer::with_config(renderer_config, SwashRasterizer::new()),
    }
    .context("Failed to create renderer")?;

    let mut constraints = config.layout;
    if let Some(width) = style.max_width {
        constraints.max_width = width;
    }
    if let Some(height) = style.max_height {
        constraints.max_height = height;
    }
    if let Some(align) = style.align {
        constraints.horizontal_alignment = align;
    }

    let mut text = renderer.create_text(source);
    text.set_constraints(constraints);
    text.set_syntactic_analysis(!input.no_markup);
    Ok((renderer, text))
}

fn describe_tag(tag: &Tag) -> String {
    match tag {
        Tag::Font(font_tag) => {
            let font = &font_tag.font;
            format!(
                "@{} font face={:?} size={} weight={} italic={} underline={} color=#{:08X}/#{:08X} border={:?}:{} offset=({}, {})",
                font_tag.anchor,
                font.face,
                font.size,
                font.weight,
                font.italic,
                font.underline,
                font.color_top.0,
                font.color_bottom.0,
                font.border,
                font.border_width,
                font_tag.offset[0],
                font_tag.offset[1],
            )
        }
        Tag::Ruby(ruby) => {
            let mut line = format!("@{} ruby {:?} over {:?}", ruby.anchor, ruby.ruby, ruby.text);
            if let Some(annotation) = &ruby.annotation {
                line.push_str(&format!(
                    " width={:.1} base={} offset={:.1}",
                    annotation.info.total_width, annotation.base_width, annotation.offset_x
                ));
            }
            line
        }
    }
}

/// Alpha-blend every sprite onto a canvas covering the text box and all sprites
fn compose_image(
    object: &TextRenderObject,
    constraints: &mojiban_text::LayoutConstraints,
    info: &mojiban_text::TextInfo,
    background: mojiban_text::Color,
    padding: u32,
) -> RgbaImage {
    let sprites = object.flatten();

    let box_width = if constraints.max_width > 0 {
        constraints.max_width as f32
    } else {
        info.total_width + (constraints.margin.left + constraints.margin.right) as f32
    };
    let box_height = if constraints.max_height > 0 {
        constraints.max_height as f32
    } else {
        info.total_height + (constraints.margin.top + constraints.margin.bottom) as f32
    };

    let origin = object.position;
    let mut min = [origin[0], origin[1]];
    let mut max = [origin[0] + box_width, origin[1] + box_height];
    for sprite in &sprites {
        min[0] = min[0].min(sprite.bounds[0]);
        min[1] = min[1].min(sprite.bounds[1]);
        max[0] = max[0].max(sprite.bounds[0] + sprite.bounds[2]);
        max[1] = max[1].max(sprite.bounds[1] + sprite.bounds[3]);
    }

    let pad = padding as f32;
    let width = (max[0] - min[0] + pad * 2.0).ceil().max(1.0) as u32;
    let height = (max[1] - min[1] + pad * 2.0).ceil().max(1.0) as u32;
    let [r, g, b, a] = background.to_rgba();
    let mut image = RgbaImage::from_pixel(width, height, Rgba([r, g, b, a]));

    let shift = [pad - min[0], pad - min[1]];
    for sprite in &sprites {
        blit(&mut image, sprite, shift);
    }
    image
}

fn blit(image: &mut RgbaImage, sprite: &GlyphSprite, shift: [f32; 2]) {
    let left = (sprite.bounds[0] + shift[0]).round() as i64;
    let top = (sprite.bounds[1] + shift[1]).round() as i64;
    let texture = &sprite.texture;

    for y in 0..texture.height() {
        for x in 0..texture.width() {
            let px = left + x as i64;
            let py = top + y as i64;
            if px < 0 || py < 0 || px >= image.width() as i64 || py >= image.height() as i64 {
                continue;
            }
            let src = texture.pixel(x, y);
            let alpha = src[3] as f32 / 255.0 * sprite.color[3];
            if alpha <= 0.0 {
                continue;
            }
            let dst = image.get_pixel_mut(px as u32, py as u32);
            for channel in 0..3 {
                let value = src[channel] as f32 * sprite.color[channel];
                dst.0[channel] =
                    (value * alpha + dst.0[channel] as f32 * (1.0 - alpha)).round() as u8;
            }
            dst.0[3] = (255.0 * alpha + dst.0[3] as f32 * (1.0 - alpha)).round() as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_subcommand_parses() {
        let cli = Cli::try_parse_from(["mojiban", "--config", "dir", "config"]).unwrap();
        assert!(matches!(cli.command, Commands::Config));
        assert_eq!(cli.config, Some(PathBuf::from("dir")));
    }

    #[test]
    fn test_printed_config_loads_back() {
        let mut config = CliConfig::default();
        config.layout.max_width = 240;
        let text = config.to_toml().unwrap();
        let back: CliConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.layout.max_width, 240);
    }
}
