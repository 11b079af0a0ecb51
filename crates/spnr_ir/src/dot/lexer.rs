//! Tokenizer for the DOT subset.

use crate::error::DesignError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum TokenKind {
    /// Identifier, numeral or quoted string (quotes removed).
    Id(String),
    Arrow,
    UndirectedEdge,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Equals,
    Semicolon,
    Comma,
    Eof,
}

#[derive(Clone, Debug)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

/// Splits DOT source into tokens, always ending with [`TokenKind::Eof`].
pub(crate) fn lex(source: &str) -> Result<Vec<Token>, DesignError> {
    let mut lexer = Lexer {
        source: source.as_bytes(),
        pos: 0,
        line: 1,
    };
    lexer.lex_all()
}

struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: usize,
}

impl Lexer<'_> {
    fn lex_all(&mut self) -> Result<Vec<Token>, DesignError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments()?;
            if self.pos >= self.source.len() {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    line: self.line,
                });
                return Ok(tokens);
            }
            let line = self.line;
            let kind = self.next_kind()?;
            tokens.push(Token { kind, line });
        }
    }

    fn peek(&self) -> u8 {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        self.source.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn bump(&mut self) -> u8 {
        let b = self.source[self.pos];
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
        }
        b
    }

    fn error(&self, message: impl Into<String>) -> DesignError {
        DesignError::Syntax {
            line: self.line,
            message: message.into(),
        }
    }

    fn at_line_start(&self) -> bool {
        self.source[..self.pos]
            .iter()
            .rev()
            .take_while(|&&b| b != b'\n')
            .all(|b| b.is_ascii_whitespace())
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), DesignError> {
        loop {
            while self.pos < self.source.len() && self.peek().is_ascii_whitespace() {
                self.bump();
            }
            if self.pos >= self.source.len() {
                return Ok(());
            }
            if (self.peek() == b'/' && self.peek_at(1) == b'/')
                || (self.peek() == b'#' && self.at_line_start())
            {
                while self.pos < self.source.len() && self.peek() != b'\n' {
                    self.bump();
                }
                continue;
            }
            if self.peek() == b'/' && self.peek_at(1) == b'*' {
                self.pos += 2;
                loop {
                    if self.pos >= self.source.len() {
                        return Err(self.error("unterminated block comment"));
                    }
                    if self.peek() == b'*' && self.peek_at(1) == b'/' {
                        self.pos += 2;
                        break;
                    }
                    self.bump();
                }
                continue;
            }
            return Ok(());
        }
    }

    fn next_kind(&mut self) -> Result<TokenKind, DesignError> {
        let b = self.peek();
        let single = match b {
            b'{' => Some(TokenKind::LBrace),
            b'}' => Some(TokenKind::RBrace),
            b'[' => Some(TokenKind::LBracket),
            b']' => Some(TokenKind::RBracket),
            b'=' => Some(TokenKind::Equals),
            b';' => Some(TokenKind::Semicolon),
            b',' => Some(TokenKind::Comma),
            _ => None,
        };
        if let Some(kind) = single {
            self.bump();
            return Ok(kind);
        }
        if b == b'-' && self.peek_at(1) == b'>' {
            self.pos += 2;
            return Ok(TokenKind::Arrow);
        }
        if b == b'-' && self.peek_at(1) == b'-' {
            self.pos += 2;
            return Ok(TokenKind::UndirectedEdge);
        }
        if b == b'"' {
            return self.lex_quoted();
        }
        if is_id_char(b) || b == b'-' || b == b'.' {
            let start = self.pos;
            self.bump();
            while is_id_char(self.peek()) || self.peek() == b'.' {
                self.bump();
            }
            let text = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
            return Ok(TokenKind::Id(text));
        }
        Err(self.error(format!("unexpected character '{}'", b as char)))
    }

    fn lex_quoted(&mut self) -> Result<TokenKind, DesignError> {
        self.bump();
        let mut text = Vec::new();
        loop {
            if self.pos >= self.source.len() {
                return Err(self.error("unterminated string"));
            }
            match self.bump() {
                b'"' => break,
                b'\\' if self.peek() == b'"' => {
                    self.bump();
                    text.push(b'"');
                }
                other => text.push(other),
            }
        }
        Ok(TokenKind::Id(String::from_utf8_lossy(&text).into_owned()))
    }
}

fn is_id_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}
