use crate::error::{EngineError, EngineResult, ErrorKind};

use super::token::{ExprToken, ExprTokenKind};

/// Tokenizes the text of an expression attribute.
#[derive(Debug, Clone)]
pub struct ExprLexer<'a> {
    source: &'a str,
    cursor: usize,
    tokens: Vec<ExprToken>,
}

impl<'a> ExprLexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            cursor: 0,
            tokens: vec![],
        }
    }

    pub fn lex(mut self) -> EngineResult<Vec<ExprToken>> {
        while self.cursor < self.source.len() {
            self.skip_whitespace();
            if self.cursor >= self.source.len() {
                break;
            }

            let offset = self.cursor;
            let next = self.peek();

            match next {
                '|' | '&' | '=' | '!' | '<' | '>' => self.lex_operator()?,
                '(' => self.push_simple(ExprTokenKind::LParen, "(", 1),
                ')' => self.push_simple(ExprTokenKind::RParen, ")", 1),
                ',' => self.push_simple(ExprTokenKind::Comma, ",", 1),
                '"' | '\'' => self.lex_string(next)?,
                '0'..='9' => self.lex_number(false)?,
                '-' => {
                    if matches!(self.source[self.cursor + 1..].chars().next(), Some('0'..='9')) {
                        self.lex_number(true)?;
                    } else {
                        return Err(self.unexpected(offset));
                    }
                }
                'a'..='z' | 'A'..='Z' | '_' => self.lex_ident(),
                _ => return Err(self.unexpected(offset)),
            }
        }

        self.tokens
            .push(ExprToken::new(ExprTokenKind::Eof, "", self.cursor));

        Ok(self.tokens)
    }

    fn lex_operator(&mut self) -> EngineResult<()> {
        let offset = self.cursor;
        let rest = self.rest();

        let (kind, text) = if rest.starts_with("||") {
            (ExprTokenKind::Or, "||")
        } else if rest.starts_with("&&") {
            (ExprTokenKind::And, "&&")
        } else if rest.starts_with("==") {
            (ExprTokenKind::EqEq, "==")
        } else if rest.starts_with("!=") {
            (ExprTokenKind::NotEq, "!=")
        } else if rest.starts_with("<=") {
            (ExprTokenKind::Le, "<=")
        } else if rest.starts_with(">=") {
            (ExprTokenKind::Ge, ">=")
        } else if rest.starts_with('<') {
            (ExprTokenKind::Lt, "<")
        } else if rest.starts_with('>') {
            (ExprTokenKind::Gt, ">")
        } else if rest.starts_with('!') {
            (ExprTokenKind::Bang, "!")
        } else {
            return Err(self.unexpected(offset));
        };

        self.push_simple(kind, text, text.len());
        Ok(())
    }

    fn lex_string(&mut self, quote: char) -> EngineResult<()> {
        let offset = self.cursor;
        self.cursor += 1;

        let mut value = String::new();
        loop {
            let Some(next) = self.rest().chars().next() else {
                return Err(EngineError::new(
                    ErrorKind::ExprParse,
                    format!("unterminated string literal at offset {offset}"),
                ));
            };

            if next == quote {
                self.cursor += 1;
                break;
            }

            if next == '\\' {
                match self.rest().chars().nth(1) {
                    Some(escaped) if escaped == quote || escaped == '\\' => {
                        value.push(escaped);
                        self.cursor += 1 + escaped.len_utf8();
                    }
                    _ => {
                        return Err(EngineError::new(
                            ErrorKind::ExprParse,
                            format!("invalid escape at offset {}", self.cursor),
                        ))
                    }
                }
                continue;
            }

            value.push(next);
            self.cursor += next.len_utf8();
        }

        self.tokens
            .push(ExprToken::new(ExprTokenKind::Str, value, offset));
        Ok(())
    }

    fn lex_number(&mut self, negative: bool) -> EngineResult<()> {
        let offset = self.cursor;
        if negative {
            self.cursor += 1;
        }

        let mut is_float = false;
        while let Some(next) = self.rest().chars().next() {
            match next {
                '0'..='9' => self.cursor += 1,
                '.' if !is_float
                    && matches!(
                        self.source[self.cursor + 1..].chars().next(),
                        Some('0'..='9')
                    ) =>
                {
                    is_float = true;
                    self.cursor += 1;
                }
                _ => break,
            }
        }

        let kind = if is_float {
            ExprTokenKind::Float
        } else {
            ExprTokenKind::Int
        };
        self.tokens
            .push(ExprToken::new(kind, &self.source[offset..self.cursor], offset));
        Ok(())
    }

    fn lex_ident(&mut self) {
        let offset = self.cursor;

        while let Some(next) = self.rest().chars().next() {
            if next.is_ascii_alphanumeric() || next == '_' || next == '.' {
                self.cursor += 1;
            } else {
                break;
            }
        }

        let text = &self.source[offset..self.cursor];
        let kind = match text {
            "true" => ExprTokenKind::True,
            "false" => ExprTokenKind::False,
            "nil" | "null" => ExprTokenKind::Nil,
            _ => ExprTokenKind::Ident,
        };

        self.tokens.push(ExprToken::new(kind, text, offset));
    }

    fn push_simple(&mut self, kind: ExprTokenKind, text: &str, length: usize) {
        self.tokens.push(ExprToken::new(kind, text, self.cursor));
        self.cursor += length;
    }

    fn unexpected(&self, offset: usize) -> EngineError {
        let found = self.source[offset..].chars().next().unwrap_or('\0');
        EngineError::new(
            ErrorKind::ExprParse,
            format!("unexpected character '{found}' at offset {offset}"),
        )
    }

    fn rest(&self) -> &str {
        &self.source[self.cursor..]
    }

    fn peek(&self) -> char {
        self.rest().chars().next().unwrap_or('\0')
    }

    fn skip_whitespace(&mut self) {
        while let Some(next) = self.rest().chars().next() {
            if !next.is_whitespace() {
                break;
            }
            self.cursor += next.len_utf8();
        }
    }
}
