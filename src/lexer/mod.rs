mod token;

pub use token::*;

use crate::{
    error::{EngineError, EngineResult, ErrorKind},
    position::Position,
};

/// Tag name of the raw construct; its body is lexed literally.
const RAW_TAG: &str = "prompty.raw";

/// Streams a template source into tokens.
///
/// The delimiter pair is configurable; the default is `{~` / `~}`. The lexer
/// scans bytes, tracking 1-indexed line and column, and is deterministic:
/// the same input and delimiters always produce the same token sequence.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    source: &'a str,
    open_delim: &'a str,
    close_delim: &'a str,
    cursor: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, open_delim: &'a str, close_delim: &'a str) -> Self {
        Self {
            source,
            open_delim,
            close_delim,
            cursor: 0,
            line: 1,
            column: 1,
            tokens: vec![],
        }
    }

    /// Start lexing at a byte offset (used to skip past front matter).
    /// Line and column are derived from the skipped prefix.
    pub fn with_start(mut self, offset: usize) -> Self {
        let prefix = &self.source[..offset];
        self.cursor = offset;
        self.line = 1 + prefix.bytes().filter(|byte| *byte == b'\n').count();
        self.column = match prefix.rfind('\n') {
            Some(newline) => offset - newline,
            None => offset + 1,
        };
        self
    }

    pub fn lex(mut self) -> EngineResult<Vec<Token>> {
        let mut text = String::new();
        let mut text_position = self.position();

        while self.cursor < self.source.len() {
            if self.at_escaped_open_delim() {
                if text.is_empty() {
                    text_position = self.position();
                }
                text.push_str(self.open_delim);
                self.advance(1 + self.open_delim.len());
            } else if self.rest().starts_with(self.open_delim) {
                self.flush_text(&mut text, text_position);
                self.lex_tag()?;
                text_position = self.position();
            } else {
                if text.is_empty() {
                    text_position = self.position();
                }
                let next = self.next_char();
                text.push(next);
                self.advance(next.len_utf8());
            }
        }

        self.flush_text(&mut text, text_position);
        let position = self.position();
        self.tokens.push(Token::new(TokenKind::Eof, "", position));

        Ok(self.tokens)
    }

    fn lex_tag(&mut self) -> EngineResult<()> {
        let open_position = self.position();
        self.advance(self.open_delim.len());

        let closing = self.rest().starts_with('/');
        if closing {
            self.tokens.push(Token::new(
                TokenKind::BlockCloseDelim,
                format!("{}/", self.open_delim),
                open_position,
            ));
            self.advance(1);
        } else {
            self.tokens.push(Token::new(
                TokenKind::OpenTagDelim,
                self.open_delim,
                open_position,
            ));
        }

        self.skip_tag_whitespace();
        let name = self.lex_tag_name()?;

        if closing {
            self.skip_tag_whitespace();
            if !self.rest().starts_with(self.close_delim) {
                return Err(EngineError::at(
                    ErrorKind::ParseLexical,
                    format!("unterminated closing tag '{name}'"),
                    open_position,
                ));
            }
            self.push_delim(TokenKind::CloseTagDelim, self.close_delim.len());
            return Ok(());
        }

        loop {
            self.skip_tag_whitespace();

            if self.rest().starts_with('/') && self.rest()[1..].starts_with(self.close_delim) {
                self.push_delim(TokenKind::SelfCloseDelim, 1 + self.close_delim.len());
                return Ok(());
            }

            if self.rest().starts_with(self.close_delim) {
                self.push_delim(TokenKind::CloseTagDelim, self.close_delim.len());
                if name == RAW_TAG {
                    self.lex_raw_body(open_position)?;
                }
                return Ok(());
            }

            if self.cursor >= self.source.len() {
                return Err(EngineError::at(
                    ErrorKind::ParseLexical,
                    format!("unterminated tag '{name}'"),
                    open_position,
                ));
            }

            self.lex_attribute()?;
        }
    }

    fn lex_tag_name(&mut self) -> EngineResult<String> {
        let position = self.position();
        let mut name = String::new();

        while let Some(next) = self.rest().chars().next() {
            let valid = if name.is_empty() {
                next.is_ascii_alphabetic() || next == '_'
            } else {
                next.is_ascii_alphanumeric() || next == '_' || next == '.'
            };

            if !valid {
                break;
            }

            name.push(next);
            self.advance(1);
        }

        if name.is_empty() {
            return Err(EngineError::at(
                ErrorKind::ParseLexical,
                "invalid tag name",
                position,
            ));
        }

        self.tokens
            .push(Token::new(TokenKind::TagName, &name, position));

        Ok(name)
    }

    fn lex_attribute(&mut self) -> EngineResult<()> {
        let name_position = self.position();
        let mut name = String::new();

        while let Some(next) = self.rest().chars().next() {
            let valid = if name.is_empty() {
                next.is_ascii_alphabetic() || next == '_'
            } else {
                next.is_ascii_alphanumeric() || next == '_'
            };

            if !valid {
                break;
            }

            name.push(next);
            self.advance(1);
        }

        if name.is_empty() {
            return Err(EngineError::at(
                ErrorKind::ParseLexical,
                "unexpected character in tag",
                name_position,
            ));
        }

        self.tokens
            .push(Token::new(TokenKind::AttributeName, &name, name_position));

        self.skip_tag_whitespace();
        if !self.rest().starts_with('=') {
            return Err(EngineError::at(
                ErrorKind::ParseLexical,
                format!("expected '=' after attribute '{name}'"),
                self.position(),
            ));
        }
        self.push_delim(TokenKind::Equals, 1);

        self.skip_tag_whitespace();
        let quote = match self.rest().chars().next() {
            Some(quote @ ('"' | '\'')) => quote,
            _ => {
                return Err(EngineError::at(
                    ErrorKind::ParseLexical,
                    format!("expected quoted value for attribute '{name}'"),
                    self.position(),
                ))
            }
        };

        let value_position = self.position();
        self.advance(1);
        let value = self.lex_quoted(quote, value_position)?;
        self.tokens
            .push(Token::new(TokenKind::AttributeValue, value, value_position));

        Ok(())
    }

    fn lex_quoted(&mut self, quote: char, start: Position) -> EngineResult<String> {
        let mut value = String::new();

        loop {
            let Some(next) = self.rest().chars().next() else {
                return Err(EngineError::at(
                    ErrorKind::ParseLexical,
                    "unterminated string literal",
                    start,
                ));
            };

            if next == quote {
                self.advance(1);
                return Ok(value);
            }

            if next == '\\' {
                let escaped = self.rest().chars().nth(1);
                match escaped {
                    Some(escaped) if escaped == quote || escaped == '\\' => {
                        value.push(escaped);
                        self.advance(1 + escaped.len_utf8());
                    }
                    _ => {
                        return Err(EngineError::at(
                            ErrorKind::ParseLexical,
                            "invalid escape in string literal",
                            self.position(),
                        ))
                    }
                }
                continue;
            }

            value.push(next);
            self.advance(next.len_utf8());
        }
    }

    /// Literal scan of a raw body: only the exact closing sequence ends it,
    /// and a literal nested raw opener is rejected.
    fn lex_raw_body(&mut self, open_position: Position) -> EngineResult<()> {
        let closer = format!("{}/{}{}", self.open_delim, RAW_TAG, self.close_delim);
        let nested = format!("{}{}{}", self.open_delim, RAW_TAG, self.close_delim);

        let mut content = String::new();
        let mut content_position = self.position();

        loop {
            if self.rest().starts_with(&closer) {
                self.flush_text(&mut content, content_position);

                let position = self.position();
                self.tokens.push(Token::new(
                    TokenKind::BlockCloseDelim,
                    format!("{}/", self.open_delim),
                    position,
                ));
                self.advance(self.open_delim.len() + 1);

                let name_position = self.position();
                self.tokens
                    .push(Token::new(TokenKind::TagName, RAW_TAG, name_position));
                self.advance(RAW_TAG.len());

                self.push_delim(TokenKind::CloseTagDelim, self.close_delim.len());
                return Ok(());
            }

            if self.rest().starts_with(&nested) {
                return Err(EngineError::at(
                    ErrorKind::ParseStructural,
                    "raw blocks cannot be nested",
                    self.position(),
                ));
            }

            if self.cursor >= self.source.len() {
                return Err(EngineError::at(
                    ErrorKind::ParseLexical,
                    "unterminated raw block",
                    open_position,
                ));
            }

            if content.is_empty() {
                content_position = self.position();
            }
            let next = self.next_char();
            content.push(next);
            self.advance(next.len_utf8());
        }
    }

    fn flush_text(&mut self, text: &mut String, position: Position) {
        if !text.is_empty() {
            self.tokens
                .push(Token::new(TokenKind::Text, std::mem::take(text), position));
        }
    }

    fn push_delim(&mut self, kind: TokenKind, length: usize) {
        let position = self.position();
        let value = self.source[self.cursor..self.cursor + length].to_owned();
        self.tokens.push(Token::new(kind, value, position));
        self.advance(length);
    }

    fn at_escaped_open_delim(&self) -> bool {
        self.rest().starts_with('\\') && self.rest()[1..].starts_with(self.open_delim)
    }

    fn skip_tag_whitespace(&mut self) {
        while let Some(next) = self.rest().chars().next() {
            if !next.is_whitespace() {
                break;
            }
            self.advance(next.len_utf8());
        }
    }

    fn rest(&self) -> &str {
        &self.source[self.cursor..]
    }

    fn next_char(&self) -> char {
        // Callers only invoke this after checking the cursor is in bounds.
        self.rest().chars().next().unwrap_or('\0')
    }

    fn position(&self) -> Position {
        Position::new(self.cursor, self.line, self.column)
    }

    /// Advance the cursor by `count` bytes, tracking line and column.
    /// A newline byte resets the column to 1 and increments the line.
    fn advance(&mut self, count: usize) {
        for byte in self.source.as_bytes()[self.cursor..self.cursor + count].iter() {
            if *byte == b'\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.cursor += count;
    }
}
