use super::token::{Token, TokenKind, TokenPool};
use super::ParseError;

/// Per-call scan state.
#[derive(Debug)]
struct Parser {
    pos: usize,
    superior: Option<usize>,
}

/// Tokenize `src` into `pool`, returning the number of tokens produced.
///
/// Scanning stops at the end of `src` or at the first NUL byte. The pool is
/// cleared first; on error it holds whatever was allocated before the
/// failure. A pool exhausted mid-parse keeps the `size` increments already
/// applied to earlier containers.
pub fn parse<const N: usize>(src: &[u8], pool: &mut TokenPool<N>) -> Result<usize, ParseError> {
    pool.clear();
    let mut parser = Parser {
        pos: 0,
        superior: None,
    };

    while let Some(&c) = src.get(parser.pos) {
        if c == 0 {
            break;
        }

        match c {
            b'{' | b'[' => {
                let kind = if c == b'{' { TokenKind::Object } else { TokenKind::Array };
                let index = pool.alloc(kind, parser.pos)?;
                parser.bump_superior(pool);
                parser.superior = Some(index);
            }
            b'}' | b']' => {
                let kind = if c == b'}' { TokenKind::Object } else { TokenKind::Array };
                parser.close(pool, kind)?;
            }
            b'"' => {
                parser.parse_string(src, pool)?;
                parser.bump_superior(pool);
            }
            b'\t' | b'\r' | b'\n' | b' ' => {}
            b':' => {
                parser.superior = pool.len().checked_sub(1);
            }
            b',' => {
                let superior_is_container = parser
                    .superior
                    .and_then(|i| pool.as_slice().get(i))
                    .map_or(true, |tok| tok.kind.is_container());

                if !superior_is_container {
                    if let Some(container) = nearest_open(pool.as_slice(), pool.len(), true) {
                        parser.superior = Some(container);
                    }
                }
            }
            _ => {
                parser.parse_primitive(src, pool)?;
                parser.bump_superior(pool);
            }
        }

        parser.pos += 1;
    }

    if pool.as_slice().iter().any(Token::is_open) {
        return Err(ParseError::Incomplete);
    }

    Ok(pool.len())
}

/// Index of the last open token before `before`; containers only when asked.
fn nearest_open(tokens: &[Token], before: usize, containers_only: bool) -> Option<usize> {
    tokens[..before.min(tokens.len())]
        .iter()
        .rposition(|tok| tok.is_open() && (!containers_only || tok.kind.is_container()))
}

fn is_terminator(c: u8) -> bool {
    matches!(c, b'\t' | b'\r' | b'\n' | b' ' | b',' | b']' | b'}' | b':')
}

impl Parser {
    fn bump_superior<const N: usize>(&self, pool: &mut TokenPool<N>) {
        if let Some(index) = self.superior {
            if let Some(tok) = pool.as_mut_slice().get_mut(index) {
                tok.size += 1;
            }
        }
    }

    fn close<const N: usize>(
        &mut self,
        pool: &mut TokenPool<N>,
        kind: TokenKind,
    ) -> Result<(), ParseError> {
        let open = nearest_open(pool.as_slice(), pool.len(), false).ok_or(ParseError::Invalid)?;

        let tokens = pool.as_mut_slice();
        if tokens[open].kind != kind {
            return Err(ParseError::Invalid);
        }
        tokens[open].end = Some(self.pos + 1);

        self.superior = nearest_open(tokens, open, false);
        Ok(())
    }

    /// Leaves `pos` on the closing quote.
    fn parse_string<const N: usize>(
        &mut self,
        src: &[u8],
        pool: &mut TokenPool<N>,
    ) -> Result<(), ParseError> {
        let start = self.pos;
        let mut pos = start + 1;

        while let Some(&c) = src.get(pos) {
            if c == 0 {
                break;
            }

            if c == b'"' {
                let index = pool.alloc(TokenKind::String, start + 1)?;
                pool.as_mut_slice()[index].end = Some(pos);
                self.pos = pos;
                return Ok(());
            }

            if c == b'\\' {
                pos += 1;
                match src.get(pos).copied() {
                    Some(b'"' | b'/' | b'\\' | b'b' | b'f' | b'r' | b'n' | b't') => {}
                    Some(b'u') => {
                        pos += 1;
                        let mut digits = 0;
                        while digits < 4 {
                            match src.get(pos).copied() {
                                None | Some(0) => break,
                                Some(h) if h.is_ascii_hexdigit() => {
                                    pos += 1;
                                    digits += 1;
                                }
                                Some(_) => return Err(ParseError::Invalid),
                            }
                        }
                        // Back onto the last consumed byte
                        pos -= 1;
                    }
                    _ => return Err(ParseError::Invalid),
                }
            }

            pos += 1;
        }

        Err(ParseError::Incomplete)
    }

    /// Leaves `pos` on the last byte of the primitive.
    fn parse_primitive<const N: usize>(
        &mut self,
        src: &[u8],
        pool: &mut TokenPool<N>,
    ) -> Result<(), ParseError> {
        let start = self.pos;
        let mut pos = start;

        loop {
            match src.get(pos).copied() {
                None | Some(0) => return Err(ParseError::Incomplete),
                Some(c) if is_terminator(c) => break,
                Some(c) if !(32..127).contains(&c) => return Err(ParseError::Invalid),
                Some(_) => pos += 1,
            }
        }

        let index = pool.alloc(TokenKind::Primitive, start)?;
        pool.as_mut_slice()[index].end = Some(pos);
        self.pos = pos - 1;
        Ok(())
    }
}

/// Protocol gate: an object whose first member is a string key.
///
/// A two-token sequence may instead carry an array in second position.
pub fn is_valid_top_level(tokens: &[Token]) -> bool {
    if tokens.len() < 2 || tokens[0].kind != TokenKind::Object {
        return false;
    }

    match tokens[1].kind {
        TokenKind::String => true,
        TokenKind::Array => tokens.len() == 2,
        _ => false,
    }
}
