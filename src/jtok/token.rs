use heapless::Vec;
use serde::{Deserialize, Serialize};

use super::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    Primitive,
    Object,
    Array,
    String,
}

impl TokenKind {
    pub fn is_container(self) -> bool {
        matches!(self, TokenKind::Object | TokenKind::Array)
    }

    pub fn name(self) -> &'static str {
        match self {
            TokenKind::Primitive => "primitive",
            TokenKind::Object => "object",
            TokenKind::Array => "array",
            TokenKind::String => "string",
        }
    }
}

/// One syntactic unit over the message bytes.
///
/// `end` is exclusive and stays `None` while an object or array is open.
/// String tokens cover the text between the quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: Option<usize>,
    pub size: usize,
}

impl Token {
    pub fn new(kind: TokenKind, start: usize) -> Self {
        Self {
            kind,
            start,
            end: None,
            size: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Byte length of a closed token, zero while open.
    pub fn len(&self) -> usize {
        self.end.map_or(0, |end| end.saturating_sub(self.start))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fixed-size token arena, reset before every parse.
#[derive(Debug, Clone, Default)]
pub struct TokenPool<const N: usize> {
    tokens: Vec<Token, N>,
}

impl<const N: usize> TokenPool<N> {
    pub fn new() -> Self {
        Self { tokens: Vec::new() }
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn as_slice(&self) -> &[Token] {
        &self.tokens
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Token] {
        &mut self.tokens
    }

    pub(crate) fn alloc(&mut self, kind: TokenKind, start: usize) -> Result<usize, ParseError> {
        self.tokens
            .push(Token::new(kind, start))
            .map_err(|_| ParseError::NoMemory)?;
        Ok(self.tokens.len() - 1)
    }

    /// Borrow the pool together with the message it describes.
    pub fn view<'a>(&'a self, src: &'a [u8]) -> Tokens<'a> {
        Tokens::new(src, &self.tokens)
    }
}

/// Read-only view pairing tokens with their source bytes.
#[derive(Debug, Clone, Copy)]
pub struct Tokens<'a> {
    src: &'a [u8],
    tokens: &'a [Token],
}

impl<'a> Tokens<'a> {
    pub fn new(src: &'a [u8], tokens: &'a [Token]) -> Self {
        Self { src, tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn as_slice(&self) -> &'a [Token] {
        self.tokens
    }

    pub fn source(&self) -> &'a [u8] {
        self.src
    }

    pub fn get(&self, index: usize) -> Option<&'a Token> {
        self.tokens.get(index)
    }

    pub fn kind(&self, index: usize) -> Option<TokenKind> {
        self.get(index).map(|tok| tok.kind)
    }

    pub fn kind_name(&self, index: usize) -> Option<&'static str> {
        self.kind(index).map(TokenKind::name)
    }

    pub fn bytes(&self, index: usize) -> Option<&'a [u8]> {
        let tok = self.get(index)?;
        let end = tok.end?;
        self.src.get(tok.start..end)
    }

    pub fn text(&self, index: usize) -> Option<&'a str> {
        core::str::from_utf8(self.bytes(index)?).ok()
    }

    /// Exact comparison: equal only when the lengths match and every byte matches.
    pub fn text_eq(&self, index: usize, s: &str) -> bool {
        self.bytes(index).map_or(false, |bytes| tok_eq(bytes, s))
    }

    /// Direct children of token `index`, in source order.
    ///
    /// Children are found by offset containment, so an object yields its
    /// keys and values as one alternating sequence.
    pub fn children(&self, index: usize) -> Children<'a> {
        let limit = self
            .get(index)
            .map_or(0, |tok| tok.end.unwrap_or(self.src.len()));

        Children {
            tokens: self.tokens,
            next: index + 1,
            limit,
        }
    }
}

pub fn tok_eq(token_bytes: &[u8], s: &str) -> bool {
    token_bytes.len() == s.len() && token_bytes == s.as_bytes()
}

#[derive(Debug, Clone)]
pub struct Children<'a> {
    tokens: &'a [Token],
    next: usize,
    limit: usize,
}

impl<'a> Iterator for Children<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let tok = self.tokens.get(self.next)?;
        if tok.start >= self.limit {
            return None;
        }

        let index = self.next;
        let end = tok.end.unwrap_or(self.limit);

        // Skip this child's own descendants
        let mut next = index + 1;
        while self.tokens.get(next).map_or(false, |t| t.start < end) {
            next += 1;
        }
        self.next = next;

        Some(index)
    }
}
