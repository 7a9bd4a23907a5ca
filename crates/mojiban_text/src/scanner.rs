//! Markup tokenizer
//!
//! Scans a character buffer into typed tokens. The scanner has two modes:
//! literal text mode, which captures maximal runs of text up to the next tag
//! start sign (`[`), and tag mode, which recognizes identifiers, numbers,
//! string literals and punctuation inside a tag. The parser switches modes
//! with [`Scanner::set_tag_scan`].
//!
//! Newlines are significant in both modes: they are emitted as
//! [`TokenKind::Newline`] tokens and advance the line counter.

use crate::{Result, TextError};

/// Tag start sign in literal text
pub const TAG_START: char = '[';
/// Escape character that makes the following tag start sign literal
pub const ESCAPE: char = '\\';

/// Kind of a scanned token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// No token scanned yet
    Unknown,
    Eof,
    Newline,

    Identifier,
    Int,
    Hex,
    Real,
    String,

    OpenP,
    CloseP,
    OpenB,
    CloseB,
    OpenC,
    CloseC,
    Sharp,
    Slash,

    Comma,
    Equal,
    Colon,
    Semicolon,

    /// Run of literal text (escapes kept verbatim)
    Text,
}

/// A scanned token and the raw text it was scanned from
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    kind: TokenKind,
    element: String,
}

impl Token {
    pub fn new(kind: TokenKind, element: impl Into<String>) -> Self {
        Self {
            kind,
            element: element.into(),
        }
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Raw captured text
    pub fn element(&self) -> &str {
        &self.element
    }

    /// Integer value of an `Int`, `Hex` or `Real` token (reals are truncated)
    pub fn integer(&self) -> Option<i64> {
        match self.kind {
            TokenKind::Int => self.element.parse().ok(),
            TokenKind::Hex => {
                let (negative, digits) = match self.element.strip_prefix('-') {
                    Some(rest) => (true, rest),
                    None => (false, self.element.trim_start_matches('+')),
                };
                let digits = digits
                    .strip_prefix("0x")
                    .or_else(|| digits.strip_prefix("0X"))?;
                let value = i64::from_str_radix(digits, 16).ok()?;
                Some(if negative { -value } else { value })
            }
            TokenKind::Real => self.real().map(|v| v as i64),
            _ => None,
        }
    }

    /// Real value of any numeric token
    pub fn real(&self) -> Option<f64> {
        match self.kind {
            TokenKind::Real | TokenKind::Int => self.element.parse().ok(),
            TokenKind::Hex => self.integer().map(|v| v as f64),
            _ => None,
        }
    }

    /// Boolean value: `true`/`false` identifiers or any integer (non-zero is true)
    pub fn boolean(&self) -> Option<bool> {
        match self.kind {
            TokenKind::Identifier => match self.element.to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            TokenKind::Int | TokenKind::Hex => self.integer().map(|v| v != 0),
            _ => None,
        }
    }

    /// Contents of a string literal without its delimiters, or the text of a text run
    pub fn string(&self) -> Option<&str> {
        match self.kind {
            TokenKind::String => {
                let mut chars = self.element.chars();
                let first = chars.next()?;
                let inner = &self.element[first.len_utf8()..];
                inner.strip_suffix(first)
            }
            TokenKind::Text => Some(&self.element),
            _ => None,
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        (self.kind == TokenKind::Identifier).then_some(self.element.as_str())
    }
}

/// Saved scanner position, used for backtracking
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    pos: usize,
    line: usize,
    token: Token,
}

impl Cursor {
    /// Character offset of the saved position
    pub fn position(&self) -> usize {
        self.pos
    }
}

/// Restartable tokenizer over a character buffer
pub struct Scanner {
    buffer: Vec<char>,
    pos: usize,
    line: usize,
    token: Token,
    tag_scan: bool,
}

impl Scanner {
    /// Create a scanner in literal text mode
    pub fn new(source: &str) -> Self {
        Self::from_chars(source.chars().collect())
    }

    pub fn from_chars(buffer: Vec<char>) -> Self {
        Self {
            buffer,
            pos: 0,
            line: 1,
            token: Token::new(TokenKind::Unknown, ""),
            tag_scan: false,
        }
    }

    /// Current token (`Unknown` before the first [`Scanner::next`])
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Scan the next token and make it current
    pub fn next(&mut self) -> Result<&Token> {
        let token = if self.tag_scan {
            self.scan_tag()?
        } else {
            self.scan_text()?
        };
        self.token = token;
        Ok(&self.token)
    }

    /// True while input remains and the end of input has not been reached
    pub fn has_next(&self) -> bool {
        self.pos < self.buffer.len() && self.token.kind != TokenKind::Eof
    }

    /// Switch between tag syntax scanning (`true`) and literal text scanning (`false`)
    pub fn set_tag_scan(&mut self, enable: bool) {
        self.tag_scan = enable;
    }

    pub fn is_tag_scan(&self) -> bool {
        self.tag_scan
    }

    pub fn cursor(&self) -> Cursor {
        Cursor {
            pos: self.pos,
            line: self.line,
            token: self.token.clone(),
        }
    }

    pub fn set_cursor(&mut self, cursor: Cursor) {
        self.pos = cursor.pos.min(self.buffer.len());
        self.line = cursor.line;
        self.token = cursor.token;
    }

    /// Rewind to the beginning of the buffer
    pub fn reset(&mut self) {
        self.pos = 0;
        self.line = 1;
        self.token = Token::new(TokenKind::Unknown, "");
    }

    /// Character offset of the scan position
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Line tracked while scanning (1-based)
    pub fn current_line(&self) -> usize {
        self.line
    }

    /// Line of the current position, recomputed from the start of the buffer
    pub fn search_current_line(&self) -> usize {
        self.line_at_offset(self.pos)
    }

    /// Line of a saved cursor, recomputed from the start of the buffer
    pub fn line_at(&self, cursor: &Cursor) -> usize {
        self.line_at_offset(cursor.pos)
    }

    fn line_at_offset(&self, offset: usize) -> usize {
        let end = offset.min(self.buffer.len());
        1 + self.buffer[..end].iter().filter(|&&c| c == '\n').count()
    }

    /// Scan the remaining input in the current mode, including the final `Eof`
    pub fn tokens(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next()?.clone();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn peek(&self, index: usize) -> Option<char> {
        self.buffer.get(self.pos + index).copied()
    }

    fn is_newline_start(&self) -> bool {
        match self.peek(0) {
            Some('\n') => true,
            Some('\r') => self.peek(1) == Some('\n'),
            _ => false,
        }
    }

    fn scan_newline(&mut self) -> Token {
        if self.peek(0) == Some('\r') {
            self.pos += 1;
        }
        self.pos += 1;
        self.line += 1;
        Token::new(TokenKind::Newline, "\n")
    }

    fn error(&self, start: usize, message: impl Into<String>) -> TextError {
        let text: String = self.buffer[start.min(self.buffer.len())..]
            .iter()
            .take_while(|&&c| c != '\n')
            .take(32)
            .collect();
        TextError::Tokenize {
            line: self.line,
            text,
            message: message.into(),
        }
    }

    fn scan_text(&mut self) -> Result<Token> {
        let Some(c) = self.peek(0) else {
            return Ok(Token::new(TokenKind::Eof, ""));
        };
        if self.is_newline_start() {
            return Ok(self.scan_newline());
        }
        if c == TAG_START {
            self.pos += 1;
            return Ok(Token::new(TokenKind::OpenB, "["));
        }

        let start = self.pos;
        while let Some(c) = self.peek(0) {
            if c == TAG_START || self.is_newline_start() {
                break;
            }
            if c == ESCAPE && self.peek(1) == Some(TAG_START) {
                self.pos += 2;
                continue;
            }
            self.pos += 1;
        }
        let text: String = self.buffer[start..self.pos].iter().collect();
        Ok(Token::new(TokenKind::Text, text))
    }

    fn skip_space(&mut self) {
        while let Some(c) = self.peek(0) {
            let skippable = c == ' ' || c == '\t' || (c == '\r' && self.peek(1) != Some('\n'));
            if !skippable {
                break;
            }
            self.pos += 1;
        }
    }

    fn scan_tag(&mut self) -> Result<Token> {
        self.skip_space();
        let Some(c) = self.peek(0) else {
            return Ok(Token::new(TokenKind::Eof, ""));
        };
        if self.is_newline_start() {
            return Ok(self.scan_newline());
        }

        let punctuation = match c {
            '(' => Some(TokenKind::OpenP),
            ')' => Some(TokenKind::CloseP),
            '[' => Some(TokenKind::OpenB),
            ']' => Some(TokenKind::CloseB),
            '{' => Some(TokenKind::OpenC),
            '}' => Some(TokenKind::CloseC),
            '#' => Some(TokenKind::Sharp),
            '/' => Some(TokenKind::Slash),
            ',' => Some(TokenKind::Comma),
            '=' => Some(TokenKind::Equal),
            ':' => Some(TokenKind::Colon),
            ';' => Some(TokenKind::Semicolon),
            _ => None,
        };
        if let Some(kind) = punctuation {
            self.pos += 1;
            return Ok(Token::new(kind, c.to_string()));
        }

        if c == '"' || c == '\'' {
            return self.scan_string(c);
        }

        let starts_number = c.is_ascii_digit()
            || ((c == '-' || c == '+' || c == '.')
                && self.peek(1).is_some_and(|n| n.is_ascii_digit()))
            || ((c == '-' || c == '+')
                && self.peek(1) == Some('.')
                && self.peek(2).is_some_and(|n| n.is_ascii_digit()));
        if starts_number {
            return self.scan_number();
        }

        if c.is_alphabetic() || c == '_' {
            let start = self.pos;
            while self
                .peek(0)
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
            {
                self.pos += 1;
            }
            let ident: String = self.buffer[start..self.pos].iter().collect();
            return Ok(Token::new(TokenKind::Identifier, ident));
        }

        Err(self.error(self.pos, format!("unexpected character '{}'", c)))
    }

    fn scan_string(&mut self, delimiter: char) -> Result<Token> {
        let start = self.pos;
        let Some(len) = self.buffer[start + 1..].iter().position(|&c| c == delimiter) else {
            return Err(self.error(start, "unterminated string literal"));
        };
        let end = start + 1 + len + 1;
        let newlines = self.buffer[start..end].iter().filter(|&&c| c == '\n').count();
        let element: String = self.buffer[start..end].iter().collect();
        self.pos = end;
        self.line += newlines;
        Ok(Token::new(TokenKind::String, element))
    }

    fn scan_number(&mut self) -> Result<Token> {
        let start = self.pos;
        if matches!(self.peek(0), Some('-') | Some('+')) {
            self.pos += 1;
        }

        let kind = if self.peek(0) == Some('0') && matches!(self.peek(1), Some('x') | Some('X')) {
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek(0).is_some_and(|c| c.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            if self.pos == digits_start {
                return Err(self.error(start, "hex literal without digits"));
            }
            TokenKind::Hex
        } else {
            let mut kind = TokenKind::Int;
            while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
            if self.peek(0) == Some('.') && self.peek(1).is_some_and(|c| c.is_ascii_digit()) {
                kind = TokenKind::Real;
                self.pos += 1;
                while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
            if matches!(self.peek(0), Some('e') | Some('E')) {
                self.pos += 1;
                if matches!(self.peek(0), Some('-') | Some('+')) {
                    self.pos += 1;
                }
                if !self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
                    return Err(self.error(start, "malformed exponent"));
                }
                while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
                kind = TokenKind::Real;
            }
            kind
        };

        if self
            .peek(0)
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            return Err(self.error(start, "invalid numeric literal"));
        }

        let element: String = self.buffer[start..self.pos].iter().collect();
        Ok(Token::new(kind, element))
    }
}

/// Tokenize markup, switching to tag mode after `[` and back after `]`
pub fn tokenize_markup(source: &str) -> Result<Vec<Token>> {
    let mut scanner = Scanner::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = scanner.next()?.clone();
        match token.kind() {
            TokenKind::OpenB => scanner.set_tag_scan(true),
            TokenKind::CloseB => scanner.set_tag_scan(false),
            _ => {}
        }
        let done = token.kind() == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind()).collect()
    }

    #[test]
    fn test_text_and_newlines() {
        let tokens = Scanner::new("Hello\nWorld").tokens().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::new(TokenKind::Text, "Hello"),
                Token::new(TokenKind::Newline, "\n"),
                Token::new(TokenKind::Text, "World"),
                Token::new(TokenKind::Eof, ""),
            ]
        );
    }

    #[test]
    fn test_crlf_is_one_newline() {
        let mut scanner = Scanner::new("a\r\nb");
        let tokens = scanner.tokens().unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Text,
                TokenKind::Newline,
                TokenKind::Text,
                TokenKind::Eof
            ]
        );
        assert_eq!(scanner.current_line(), 2);
    }

    #[test]
    fn test_text_run_stops_at_tag_start() {
        let mut scanner = Scanner::new("ab[font]");
        assert_eq!(scanner.next().unwrap().element(), "ab");
        assert_eq!(scanner.next().unwrap().kind(), TokenKind::OpenB);
    }

    #[test]
    fn test_escaped_tag_start_stays_in_text_run() {
        let tokens = Scanner::new("a\\[b]c").tokens().unwrap();
        assert_eq!(tokens[0], Token::new(TokenKind::Text, "a\\[b]c"));
        assert_eq!(tokens[1].kind(), TokenKind::Eof);
    }

    #[test]
    fn test_spaces_are_literal_in_text_mode() {
        let tokens = Scanner::new("  two words ").tokens().unwrap();
        assert_eq!(tokens[0].element(), "  two words ");
    }

    #[test]
    fn test_tag_mode_tokens() {
        let mut scanner = Scanner::new("font size=20, tc=0xFF00FF ox=-1.5 face=\"MS Gothic\"]");
        scanner.set_tag_scan(true);
        let tokens = scanner.tokens().unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::Int,
                TokenKind::Comma,
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::Hex,
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::Real,
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::String,
                TokenKind::CloseB,
                TokenKind::Eof,
            ]
        );
        assert_eq!(tokens[3].integer(), Some(20));
        assert_eq!(tokens[7].integer(), Some(0xFF00FF));
        assert_eq!(tokens[10].real(), Some(-1.5));
        assert_eq!(tokens[13].string(), Some("MS Gothic"));
    }

    #[test]
    fn test_punctuation_kinds() {
        let mut scanner = Scanner::new("(){}[]#/,=:;");
        scanner.set_tag_scan(true);
        let tokens = scanner.tokens().unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::OpenP,
                TokenKind::CloseP,
                TokenKind::OpenC,
                TokenKind::CloseC,
                TokenKind::OpenB,
                TokenKind::CloseB,
                TokenKind::Sharp,
                TokenKind::Slash,
                TokenKind::Comma,
                TokenKind::Equal,
                TokenKind::Colon,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_real_literal_forms() {
        let mut scanner = Scanner::new("1.25 2e3 .5 -3E-2");
        scanner.set_tag_scan(true);
        let tokens = scanner.tokens().unwrap();
        assert!(tokens[..4].iter().all(|t| t.kind() == TokenKind::Real));
        assert_eq!(tokens[0].real(), Some(1.25));
        assert_eq!(tokens[1].real(), Some(2000.0));
        assert_eq!(tokens[2].real(), Some(0.5));
        assert_eq!(tokens[3].real(), Some(-0.03));
    }

    #[test]
    fn test_string_delimiter_is_not_escapable() {
        let mut scanner = Scanner::new("'it\\'s'");
        scanner.set_tag_scan(true);
        let token = scanner.next().unwrap().clone();
        assert_eq!(token.kind(), TokenKind::String);
        assert_eq!(token.string(), Some("it\\"));
        assert_eq!(scanner.next().unwrap().kind(), TokenKind::Identifier);
    }

    #[test]
    fn test_unterminated_string_is_an_error() {
        let mut scanner = Scanner::new("\n rt=\"abc");
        scanner.set_tag_scan(true);
        assert_eq!(scanner.next().unwrap().kind(), TokenKind::Newline);
        scanner.next().unwrap();
        scanner.next().unwrap();
        let err = scanner.next().unwrap_err();
        match err {
            TextError::Tokenize { line, text, .. } => {
                assert_eq!(line, 2);
                assert_eq!(text, "\"abc");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_bad_numeric_prefix_is_an_error() {
        for source in ["0x", "0xZZ", "0b101", "12px", "1e"] {
            let mut scanner = Scanner::new(source);
            scanner.set_tag_scan(true);
            assert!(
                matches!(scanner.next(), Err(TextError::Tokenize { .. })),
                "{source:?} should fail to tokenize"
            );
        }
    }

    #[test]
    fn test_unexpected_character_is_an_error() {
        let mut scanner = Scanner::new("@");
        scanner.set_tag_scan(true);
        assert!(scanner.next().is_err());
    }

    #[test]
    fn test_cursor_backtracking() {
        let mut scanner = Scanner::new("key value");
        scanner.set_tag_scan(true);
        scanner.next().unwrap();
        let saved = scanner.cursor();
        assert_eq!(scanner.next().unwrap().element(), "value");
        scanner.set_cursor(saved.clone());
        assert_eq!(scanner.token().element(), "key");
        assert_eq!(scanner.next().unwrap().element(), "value");
        assert_eq!(saved.position(), 3);
    }

    #[test]
    fn test_line_queries() {
        let mut scanner = Scanner::new("a\nb\nc");
        scanner.next().unwrap();
        let first = scanner.cursor();
        scanner.tokens().unwrap();
        assert_eq!(scanner.current_line(), 3);
        assert_eq!(scanner.search_current_line(), 3);
        assert_eq!(scanner.line_at(&first), 1);
    }

    #[test]
    fn test_has_next() {
        let mut scanner = Scanner::new("ab");
        assert!(scanner.has_next());
        scanner.next().unwrap();
        assert!(!scanner.has_next());
        assert!(!Scanner::new("").has_next());
    }

    #[test]
    fn test_tokenize_markup_switches_modes() {
        let tokens = tokenize_markup("x [r] y").unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Text,
                TokenKind::OpenB,
                TokenKind::Identifier,
                TokenKind::CloseB,
                TokenKind::Text,
                TokenKind::Eof,
            ]
        );
        assert_eq!(tokens[4].element(), " y");
    }

    #[test]
    fn test_boolean_values() {
        assert_eq!(Token::new(TokenKind::Identifier, "TRUE").boolean(), Some(true));
        assert_eq!(Token::new(TokenKind::Int, "0").boolean(), Some(false));
        assert_eq!(Token::new(TokenKind::String, "\"x\"").boolean(), None);
    }
}
