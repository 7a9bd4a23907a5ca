//! Markup parser
//!
//! Consumes the scanner's token stream, appending literal text to a plain-text
//! accumulator and turning tag blocks into [`Tag`]s anchored at the offset
//! where they were encountered.
//!
//! # Grammar
//!
//! ```text
//! markup  := (text | newline | tag)*
//! tag     := '[' name param* ']'
//! param   := key ('=' value)? ','?
//! value   := string | int | hex | real | ident | '(' number (',' number)* ')'
//! ```
//!
//! Recognized tags:
//!
//! - `[font size=24 tc=(255,0,0) border=full bw=2]` changes the font from here on
//! - `[ruby rb="漢字" rt="かんじ"]` inserts base text with an annotation
//! - `[ruby rt="かんじ"]漢字[/ruby]` annotates the enclosed text
//! - `[r]` inserts a line break
//!
//! `\[` produces a literal `[`, and HTML character entities in text are decoded.

use crate::font::{BorderKind, Color, FontDescriptor, MAX_BORDER_WIDTH, MAX_FONT_SIZE};
use crate::scanner::{Scanner, Token, TokenKind, ESCAPE, TAG_START};
use crate::tag::{FontTag, RubyTag, Tag};
use crate::{Result, TextError};
use std::sync::Arc;

/// Plain text with the tags anchored in it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedText {
    chars: Vec<char>,
    tags: Vec<Tag>,
}

impl ParsedText {
    pub fn new(chars: Vec<char>, tags: Vec<Tag>) -> Self {
        Self { chars, tags }
    }

    /// Use `text` verbatim with no tags
    pub fn plain(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            tags: Vec::new(),
        }
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    /// Tags in encounter order (anchors non-decreasing)
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

/// Parse markup into plain text and tags.
///
/// Font tags inherit unspecified parameters from the font in effect where they
/// appear, starting from `default_font`.
pub fn parse_markup(source: &str, default_font: &FontDescriptor) -> Result<ParsedText> {
    TagParser::new(source, default_font).parse()
}

/// Value of a tag parameter
#[derive(Debug, Clone, PartialEq)]
enum ParamValue {
    Flag,
    Int(i64),
    Real(f64),
    Str(String),
    Ident(String),
    Tuple(Vec<f64>),
}

impl ParamValue {
    fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Real(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    fn as_real(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Real(v) => Some(*v),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Flag => Some(true),
            ParamValue::Int(v) => Some(*v != 0),
            ParamValue::Ident(name) => match name.to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) | ParamValue::Ident(s) => Some(s),
            _ => None,
        }
    }

    /// `0xRRGGBB` (opaque), `0xAARRGGBB`, `(r, g, b)` or `(r, g, b, a)`
    fn as_color(&self) -> Option<Color> {
        match self {
            ParamValue::Int(v) => {
                let raw = u32::try_from(*v).ok()?;
                Some(if raw <= 0x00FF_FFFF {
                    Color(0xFF00_0000 | raw)
                } else {
                    Color(raw)
                })
            }
            ParamValue::Tuple(values) => {
                let mut channels = [0u8, 0, 0, 255];
                if values.len() != 3 && values.len() != 4 {
                    return None;
                }
                for (channel, value) in channels.iter_mut().zip(values) {
                    if !(0.0..=255.0).contains(value) {
                        return None;
                    }
                    *channel = value.round() as u8;
                }
                let [r, g, b, a] = channels;
                Some(Color::from_argb(a, r, g, b))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Param {
    key: String,
    value: ParamValue,
}

struct TagParser<'a> {
    scanner: Scanner,
    default_font: &'a FontDescriptor,
    font: FontDescriptor,
    offset: [f32; 2],
    chars: Vec<char>,
    tags: Vec<Tag>,
}

impl<'a> TagParser<'a> {
    fn new(source: &str, default_font: &'a FontDescriptor) -> Self {
        Self {
            scanner: Scanner::new(source),
            default_font,
            font: default_font.clone(),
            offset: [0.0, 0.0],
            chars: Vec::new(),
            tags: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<ParsedText> {
        loop {
            self.scanner.set_tag_scan(false);
            let token = self.scanner.next()?.clone();
            match token.kind() {
                TokenKind::Eof => break,
                TokenKind::Newline => self.chars.push('\n'),
                TokenKind::Text => self.push_text(token.element()),
                TokenKind::OpenB => self.parse_tag()?,
                _ => {
                    return Err(self.error(
                        "",
                        self.scanner.current_line(),
                        format!("unexpected token {:?}", token.element()),
                    ))
                }
            }
        }
        Ok(ParsedText::new(self.chars, self.tags))
    }

    fn error(&self, tag: &str, line: usize, message: impl Into<String>) -> TextError {
        TextError::TagParse {
            tag: tag.to_string(),
            line,
            message: message.into(),
        }
    }

    fn push_text(&mut self, raw: &str) {
        self.chars.extend(decode_text(raw).chars());
    }

    /// Next token in tag mode, skipping line breaks inside the tag
    fn next_significant(&mut self) -> Result<Token> {
        loop {
            let token = self.scanner.next()?;
            if token.kind() != TokenKind::Newline {
                return Ok(token.clone());
            }
        }
    }

    fn parse_tag(&mut self) -> Result<()> {
        self.scanner.set_tag_scan(true);
        let line = self.scanner.current_line();
        let token = self.next_significant()?;
        let name = match token.kind() {
            TokenKind::Identifier => token.element().to_ascii_lowercase(),
            TokenKind::Slash => {
                let closed = self.next_significant()?;
                return Err(self.error(
                    closed.element(),
                    line,
                    "close marker without a matching open tag",
                ));
            }
            TokenKind::Eof => return Err(self.error("", line, "unterminated tag")),
            _ => {
                return Err(self.error(
                    token.element(),
                    line,
                    format!("expected a tag name, found {:?}", token.element()),
                ))
            }
        };

        if !matches!(name.as_str(), "font" | "ruby" | "r") {
            return Err(self.error(&name, line, "unknown tag"));
        }

        let params = self.parse_params(&name, line)?;
        match name.as_str() {
            "font" => self.apply_font(params, line),
            "ruby" => self.parse_ruby(params, line),
            _ => {
                if let Some(param) = params.first() {
                    return Err(self.error(
                        &name,
                        line,
                        format!("unexpected parameter '{}'", param.key),
                    ));
                }
                self.chars.push('\n');
                Ok(())
            }
        }
    }

    fn parse_params(&mut self, tag: &str, line: usize) -> Result<Vec<Param>> {
        let mut params = Vec::new();
        loop {
            let token = self.next_significant()?;
            match token.kind() {
                TokenKind::CloseB => return Ok(params),
                TokenKind::Comma => continue,
                TokenKind::Identifier => {
                    let key = token.element().to_ascii_lowercase();
                    let saved = self.scanner.cursor();
                    let next = self.next_significant()?;
                    let value = if next.kind() == TokenKind::Equal {
                        self.parse_value(tag, &key, line)?
                    } else {
                        self.scanner.set_cursor(saved);
                        ParamValue::Flag
                    };
                    params.push(Param { key, value });
                }
                TokenKind::Eof => return Err(self.error(tag, line, "unterminated tag")),
                _ => {
                    return Err(self.error(
                        tag,
                        line,
                        format!("unexpected {:?} in parameter list", token.element()),
                    ))
                }
            }
        }
    }

    fn parse_value(&mut self, tag: &str, key: &str, line: usize) -> Result<ParamValue> {
        let token = self.next_significant()?;
        let out_of_range =
            |parser: &Self| parser.error(tag, line, format!("value of '{key}' is out of range"));
        match token.kind() {
            TokenKind::String => Ok(ParamValue::Str(
                token.string().unwrap_or_default().to_string(),
            )),
            TokenKind::Int | TokenKind::Hex => token
                .integer()
                .map(ParamValue::Int)
                .ok_or_else(|| out_of_range(self)),
            TokenKind::Real => token
                .real()
                .map(ParamValue::Real)
                .ok_or_else(|| out_of_range(self)),
            TokenKind::Identifier => Ok(ParamValue::Ident(token.element().to_string())),
            TokenKind::OpenP => {
                let mut values = Vec::new();
                loop {
                    let item = self.next_significant()?;
                    match item.kind() {
                        TokenKind::Int | TokenKind::Hex | TokenKind::Real => {
                            values.push(item.real().ok_or_else(|| out_of_range(self))?)
                        }
                        TokenKind::Comma => continue,
                        TokenKind::CloseP if !values.is_empty() => break,
                        _ => {
                            return Err(self.error(
                                tag,
                                line,
                                format!("malformed tuple for '{key}'"),
                            ))
                        }
                    }
                }
                Ok(ParamValue::Tuple(values))
            }
            _ => Err(self.error(tag, line, format!("missing value for '{key}'"))),
        }
    }

    fn apply_font(&mut self, params: Vec<Param>, line: usize) -> Result<()> {
        let invalid = |parser: &Self, key: &str| {
            parser.error("font", line, format!("invalid value for '{key}'"))
        };

        let mut font = self.font.clone();
        let mut offset = self.offset;
        let clear = params
            .iter()
            .any(|p| matches!(p.key.as_str(), "clear" | "cl") && p.value.as_bool() == Some(true));
        if clear {
            font = self.default_font.clone();
            offset = [0.0, 0.0];
        }

        for param in &params {
            let key = param.key.as_str();
            let value = &param.value;
            match key {
                "clear" | "cl" => {}
                "face" | "name" => {
                    let face = value.as_str().ok_or_else(|| invalid(self, key))?;
                    font.face = Arc::from(face);
                }
                "size" | "sz" => {
                    font.size = value
                        .as_int()
                        .filter(|v| (1..=MAX_FONT_SIZE as i64).contains(v))
                        .ok_or_else(|| invalid(self, key))? as i32;
                }
                "weight" => {
                    font.weight = value
                        .as_int()
                        .filter(|v| (0..=1000).contains(v))
                        .ok_or_else(|| invalid(self, key))? as i32;
                }
                "bold" | "b" => {
                    let bold = value.as_bool().ok_or_else(|| invalid(self, key))?;
                    font.weight = if bold { 700 } else { 400 };
                }
                "italic" | "it" => {
                    font.italic = value.as_bool().ok_or_else(|| invalid(self, key))?;
                }
                "underline" | "ul" => {
                    font.underline = value.as_bool().ok_or_else(|| invalid(self, key))?;
                }
                "charset" => {
                    font.charset = value
                        .as_int()
                        .and_then(|v| u8::try_from(v).ok())
                        .ok_or_else(|| invalid(self, key))?;
                }
                "top_color" | "tc" => {
                    font.color_top = value.as_color().ok_or_else(|| invalid(self, key))?;
                }
                "bottom_color" | "bc" => {
                    font.color_bottom = value.as_color().ok_or_else(|| invalid(self, key))?;
                }
                "color" | "c" => {
                    let color = value.as_color().ok_or_else(|| invalid(self, key))?;
                    font.color_top = color;
                    font.color_bottom = color;
                }
                "border" => {
                    font.border = value
                        .as_str()
                        .and_then(BorderKind::from_name)
                        .ok_or_else(|| invalid(self, key))?;
                }
                "border_width" | "bw" => {
                    font.border_width = value
                        .as_int()
                        .filter(|v| (0..=MAX_BORDER_WIDTH as i64).contains(v))
                        .ok_or_else(|| invalid(self, key))? as i32;
                }
                "border_color" | "oc" => {
                    font.border_color = value.as_color().ok_or_else(|| invalid(self, key))?;
                }
                "offset_x" | "ox" => {
                    offset[0] = value.as_real().ok_or_else(|| invalid(self, key))? as f32;
                }
                "offset_y" | "oy" => {
                    offset[1] = value.as_real().ok_or_else(|| invalid(self, key))? as f32;
                }
                _ => {
                    return Err(self.error(
                        "font",
                        line,
                        format!("unknown parameter '{key}'"),
                    ))
                }
            }
        }

        self.font = font.clone();
        self.offset = offset;
        self.tags.push(Tag::Font(FontTag {
            anchor: self.chars.len(),
            font,
            offset,
        }));
        Ok(())
    }

    fn parse_ruby(&mut self, params: Vec<Param>, line: usize) -> Result<()> {
        let anchor = self.chars.len();
        let mut base = None;
        let mut ruby = None;
        let mut left_margin = 0;
        let mut top_margin = 0;

        for param in &params {
            let key = param.key.as_str();
            let invalid = || self.error("ruby", line, format!("invalid value for '{key}'"));
            match key {
                "rb" | "base" => base = Some(decode_text(param.value.as_str().ok_or_else(invalid)?)),
                "rt" | "ruby" => ruby = Some(decode_text(param.value.as_str().ok_or_else(invalid)?)),
                "left" | "ml" => {
                    left_margin = param
                        .value
                        .as_int()
                        .and_then(|v| i32::try_from(v).ok())
                        .ok_or_else(invalid)?
                }
                "top" | "mt" => {
                    top_margin = param
                        .value
                        .as_int()
                        .and_then(|v| i32::try_from(v).ok())
                        .ok_or_else(invalid)?
                }
                _ => {
                    return Err(self.error(
                        "ruby",
                        line,
                        format!("unknown parameter '{key}'"),
                    ))
                }
            }
        }

        let ruby = ruby.ok_or_else(|| self.error("ruby", line, "missing ruby text (rt)"))?;
        let text = match base {
            Some(base) => {
                self.chars.extend(base.chars());
                base
            }
            None => self.parse_ruby_scope(line)?,
        };
        if text.is_empty() {
            return Err(self.error("ruby", line, "empty base text"));
        }

        self.tags.push(Tag::Ruby(RubyTag {
            anchor,
            text,
            ruby,
            left_margin,
            top_margin,
            annotation: None,
        }));
        Ok(())
    }

    /// Collect base text up to the `[/ruby]` close marker
    fn parse_ruby_scope(&mut self, line: usize) -> Result<String> {
        let mut base = String::new();
        loop {
            self.scanner.set_tag_scan(false);
            let token = self.scanner.next()?.clone();
            match token.kind() {
                TokenKind::Text => base.push_str(&decode_text(token.element())),
                TokenKind::Newline => {
                    return Err(self.error("ruby", line, "line break inside ruby base text"))
                }
                TokenKind::Eof => return Err(self.error("ruby", line, "missing [/ruby]")),
                TokenKind::OpenB => {
                    self.scanner.set_tag_scan(true);
                    let inner_line = self.scanner.current_line();
                    let slash = self.next_significant()?;
                    let name = self.next_significant()?;
                    if slash.kind() != TokenKind::Slash
                        || !name.element().eq_ignore_ascii_case("ruby")
                    {
                        return Err(self.error(
                            "ruby",
                            inner_line,
                            "tags cannot be nested inside ruby text",
                        ));
                    }
                    if self.next_significant()?.kind() != TokenKind::CloseB {
                        return Err(self.error("ruby", inner_line, "malformed [/ruby]"));
                    }
                    break;
                }
                _ => {
                    return Err(self.error(
                        "ruby",
                        line,
                        format!("unexpected token {:?}", token.element()),
                    ))
                }
            }
        }
        self.chars.extend(base.chars());
        Ok(base)
    }
}

/// Unescape the tag start sign and decode HTML character entities
fn decode_text(raw: &str) -> String {
    let mut escape = String::with_capacity(2);
    escape.push(ESCAPE);
    escape.push(TAG_START);
    let unescaped = raw.replace(&escape, &TAG_START.to_string());
    html_escape::decode_html_entities(&unescaped).into_owned()
}
