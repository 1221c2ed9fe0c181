//! SQL tokenizer for the restricted dialect.
//!
//! Keywords are case-insensitive; identifiers are `[A-Za-z_][A-Za-z0-9_]*`;
//! `--` line comments are skipped; `==` is accepted for `=` and `<>`
//! normalizes to `!=`.

use crate::error::ObliviousJoinError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Select,
    From,
    Where,
    And,
    As,
    Identifier,
    Number,
    Star,
    Dot,
    Comma,
    Semicolon,
    Plus,
    Minus,
    Eq,
    Ne,
    Ge,
    Gt,
    Le,
    Lt,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: usize,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, position: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            position,
        }
    }
}

pub fn tokenize(sql: &str) -> Result<Vec<Token>, ObliviousJoinError> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos] as char;

        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        // Line comment: -- to end of line.
        if c == '-' && bytes.get(pos + 1) == Some(&b'-') {
            while pos < bytes.len() && bytes[pos] != b'\n' {
                pos += 1;
            }
            continue;
        }

        let start = pos;
        match c {
            '*' => {
                tokens.push(Token::new(TokenKind::Star, "*", start));
                pos += 1;
            }
            '.' => {
                tokens.push(Token::new(TokenKind::Dot, ".", start));
                pos += 1;
            }
            ',' => {
                tokens.push(Token::new(TokenKind::Comma, ",", start));
                pos += 1;
            }
            ';' => {
                tokens.push(Token::new(TokenKind::Semicolon, ";", start));
                pos += 1;
            }
            '+' => {
                tokens.push(Token::new(TokenKind::Plus, "+", start));
                pos += 1;
            }
            '-' => {
                tokens.push(Token::new(TokenKind::Minus, "-", start));
                pos += 1;
            }
            '=' => {
                // `==` is tolerated as plain equality.
                pos += if bytes.get(pos + 1) == Some(&b'=') { 2 } else { 1 };
                tokens.push(Token::new(TokenKind::Eq, "=", start));
            }
            '!' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    tokens.push(Token::new(TokenKind::Ne, "!=", start));
                    pos += 2;
                } else {
                    return Err(ObliviousJoinError::parse(start, "stray '!'"));
                }
            }
            '>' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    tokens.push(Token::new(TokenKind::Ge, ">=", start));
                    pos += 2;
                } else {
                    tokens.push(Token::new(TokenKind::Gt, ">", start));
                    pos += 1;
                }
            }
            '<' => match bytes.get(pos + 1) {
                Some(&b'=') => {
                    tokens.push(Token::new(TokenKind::Le, "<=", start));
                    pos += 2;
                }
                Some(&b'>') => {
                    tokens.push(Token::new(TokenKind::Ne, "!=", start));
                    pos += 2;
                }
                _ => {
                    tokens.push(Token::new(TokenKind::Lt, "<", start));
                    pos += 1;
                }
            },
            _ if c.is_ascii_digit() => {
                while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                    pos += 1;
                }
                tokens.push(Token::new(TokenKind::Number, &sql[start..pos], start));
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                while pos < bytes.len()
                    && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_')
                {
                    pos += 1;
                }
                let word = &sql[start..pos];
                let kind = match word.to_ascii_uppercase().as_str() {
                    "SELECT" => TokenKind::Select,
                    "FROM" => TokenKind::From,
                    "WHERE" => TokenKind::Where,
                    "AND" => TokenKind::And,
                    "AS" => TokenKind::As,
                    _ => TokenKind::Identifier,
                };
                tokens.push(Token::new(kind, word, start));
            }
            _ => {
                return Err(ObliviousJoinError::parse(
                    start,
                    format!("unexpected character '{c}'"),
                ));
            }
        }
    }

    tokens.push(Token::new(TokenKind::Eof, "", bytes.len()));
    Ok(tokens)
}
