//! Allocation-free tokenizer for the command grammar.
//!
//! A single left-to-right scan fills a caller-owned [`TokenPool`] with flat
//! [`Token`] records (objects, arrays, strings, primitives). Superior tracking
//! is deliberately loose: after `:` the following value counts as a child of
//! the key before it, and `,` climbs back to the nearest open container.

pub mod parser;
pub mod token;

pub use parser::{is_valid_top_level, parse};
pub use token::{tok_eq, Children, Token, TokenKind, TokenPool, Tokens};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("token pool exhausted")]
    NoMemory,
    #[error("malformed input")]
    Invalid,
    #[error("input ended inside an open token")]
    Incomplete,
}

impl ParseError {
    /// Numeric status used on the wire and in logs.
    pub const fn code(self) -> i32 {
        match self {
            ParseError::NoMemory => -1,
            ParseError::Invalid => -2,
            ParseError::Incomplete => -3,
        }
    }
}
