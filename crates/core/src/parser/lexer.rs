//! Tokenizer shared by the object parser and the content-stream parser.
//!
//! Every token carries its byte span so that callers can splice the
//! underlying bytes without re-serializing anything.

use crate::error::{PdfError, Result};
use std::ops::Range;

/// Declares [`Keyword`] from one table so that parsing and printing
/// cannot drift apart.
macro_rules! keywords {
    ($($variant:ident = $bytes:literal),* $(,)?) => {
        /// Bare word or delimiter. Operators in the table get their own
        /// variant; anything else is kept as [`Keyword::Unknown`].
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum Keyword {
            $($variant,)*
            Unknown(Vec<u8>),
        }

        impl Keyword {
            pub fn from_bytes(b: &[u8]) -> Self {
                match b {
                    $($bytes => Self::$variant,)*
                    _ => Self::Unknown(b.to_vec()),
                }
            }

            pub fn as_bytes(&self) -> &[u8] {
                match self {
                    $(Self::$variant => $bytes,)*
                    Self::Unknown(bytes) => bytes.as_slice(),
                }
            }
        }
    };
}

keywords! {
    ArrayStart = b"[", ArrayEnd = b"]", DictStart = b"<<", DictEnd = b">>",
    BraceOpen = b"{", BraceClose = b"}",
    True = b"true", False = b"false", Null = b"null",

    // file structure
    Obj = b"obj", EndObj = b"endobj", R = b"R", Stream = b"stream",
    EndStream = b"endstream", Xref = b"xref", Trailer = b"trailer",
    StartXref = b"startxref",

    // graphics state; lowercase operators get a doubled name
    Qq = b"q", Q = b"Q", Cm = b"cm", Ww = b"w", J = b"J", Jj = b"j",
    M = b"M", D = b"d", Ri = b"ri", I = b"i", Gs = b"gs",

    // path construction and painting
    Mm = b"m", L = b"l", C = b"c", V = b"v", Y = b"y", H = b"h", Re = b"re",
    S = b"S", Ss = b"s", F = b"F", Ff = b"f", FStar = b"f*",
    B = b"B", BStar = b"B*", Bb = b"b", BbStar = b"b*", N = b"n",
    WClip = b"W", WStar = b"W*",

    // text
    BT = b"BT", ET = b"ET",
    Tc = b"Tc", Tw = b"Tw", Tz = b"Tz", TL = b"TL", Tf = b"Tf", Tr = b"Tr", Ts = b"Ts",
    Td = b"Td", TD = b"TD", Tm = b"Tm", TStar = b"T*",
    Tj = b"Tj", TJ = b"TJ", Quote = b"'", DoubleQuote = b"\"",

    // colour
    CS = b"CS", Cs = b"cs", SC = b"SC", SCN = b"SCN", Sc = b"sc", Scn = b"scn",
    G = b"G", Gg = b"g", RG = b"RG", Rg = b"rg", K = b"K", Kk = b"k",

    // external and inline images, shading
    Do = b"Do", BI = b"BI", ID = b"ID", EI = b"EI", Sh = b"sh",

    // marked content
    MP = b"MP", DP = b"DP", BMC = b"BMC", BDC = b"BDC", EMC = b"EMC",

    // Type 3 glyph metrics and compatibility sections
    D0 = b"d0", D1 = b"d1", BX = b"BX", EX = b"EX",
}

impl Keyword {
    /// Operators that end a path, painting it or not.
    pub const fn is_path_paint(&self) -> bool {
        matches!(self, Self::S | Self::Ss | Self::N) || self.is_fill()
    }

    /// Path painting with a fill, alone or combined with a stroke.
    pub const fn is_fill(&self) -> bool {
        matches!(
            self,
            Self::F | Self::Ff | Self::FStar | Self::B | Self::BStar | Self::Bb | Self::BbStar
        )
    }

    pub const fn is_text_show(&self) -> bool {
        matches!(self, Self::Tj | Self::TJ | Self::Quote | Self::DoubleQuote)
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.as_bytes()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Real(f64),
    Bool(bool),
    /// `/Name`, escapes decoded.
    Literal(String),
    Keyword(Keyword),
    /// Literal `(...)` or hex `<...>` string, decoded to bytes.
    String(Vec<u8>),
}

/// Tokenizer over a borrowed byte slice.
pub struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub const fn new(data: &'a [u8]) -> Self {
        Self::at(data, 0)
    }

    /// Lexer positioned at `pos`.
    pub const fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub const fn tell(&self) -> usize {
        self.pos
    }

    pub const fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn remaining(&self) -> &'a [u8] {
        self.data.get(self.pos..).unwrap_or_default()
    }

    fn peek(&self) -> Option<u8> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.data.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    /// The six PDF whitespace bytes, NUL and form feed included.
    pub const fn is_whitespace(b: u8) -> bool {
        matches!(b, b'\0' | b'\t' | b'\n' | b'\x0c' | b'\r' | b' ')
    }

    pub const fn is_delimiter(b: u8) -> bool {
        matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
    }

    const fn ends_word(b: u8) -> bool {
        Self::is_whitespace(b) || Self::is_delimiter(b)
    }

    /// Skip whitespace and `%` comments.
    pub fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                Some(b'%') => {
                    let rest = self.remaining();
                    let eol = rest.iter().position(|&c| c == b'\r' || c == b'\n');
                    self.pos += eol.unwrap_or(rest.len());
                }
                Some(b) if Self::is_whitespace(b) => self.pos += 1,
                _ => return,
            }
        }
    }

    /// Byte encoded by the `#xx` at the current position.
    fn hex_escape(&self) -> Option<u8> {
        let high = hex_value(self.peek_at(1)?)?;
        let low = hex_value(self.peek_at(2)?)?;
        Some((high << 4) | low)
    }

    /// `/Name` with `#xx` escapes. A `#` not followed by two hex digits is
    /// kept as is.
    fn parse_literal(&mut self) -> Token {
        self.pos += 1;
        let mut name = Vec::new();
        while let Some(b) = self.peek() {
            if Self::ends_word(b) {
                break;
            }
            let escaped = if b == b'#' { self.hex_escape() } else { None };
            match escaped {
                Some(byte) => {
                    name.push(byte);
                    self.pos += 3;
                }
                None => {
                    name.push(b);
                    self.pos += 1;
                }
            }
        }
        Token::Literal(name_from_bytes(&name))
    }

    /// Parse a number (integer or real)
    fn parse_number(&mut self) -> Result<Token> {
        let start = self.pos;
        let mut has_dot = false;

        if matches!(self.peek(), Some(b'+') | Some(b'-')) {
            self.advance();
        }

        while let Some(b) = self.peek() {
            if b.is_ascii_digit() {
                self.advance();
            } else if b == b'.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        let s = std::str::from_utf8(&self.data[start..self.pos]).map_err(|_| {
            PdfError::TokenError {
                pos: start,
                msg: "invalid number".into(),
            }
        })?;
        let s = s.strip_prefix('+').unwrap_or(s);

        if has_dot {
            // "5." and "-.5" are legal PDF reals
            let normalized = if s.ends_with('.') {
                format!("{s}0")
            } else {
                s.to_string()
            };
            let val: f64 = normalized.parse().map_err(|_| PdfError::TokenError {
                pos: start,
                msg: format!("invalid real: {s}"),
            })?;
            Ok(Token::Real(val))
        } else {
            match s.parse::<i64>() {
                Ok(val) => Ok(Token::Int(val)),
                // Out-of-range integers degrade to reals
                Err(_) => s.parse::<f64>().map(Token::Real).map_err(|_| {
                    PdfError::TokenError {
                        pos: start,
                        msg: format!("invalid int: {s}"),
                    }
                }),
            }
        }
    }

    /// Parse a literal string (...)
    fn parse_string(&mut self) -> Result<Token> {
        self.advance(); // Skip '('
        let mut result = Vec::new();
        let mut depth = 1;

        while depth > 0 {
            match self.advance() {
                Some(b'(') => {
                    depth += 1;
                    result.push(b'(');
                }
                Some(b')') => {
                    depth -= 1;
                    if depth > 0 {
                        result.push(b')');
                    }
                }
                Some(b'\\') => match self.advance() {
                    Some(b'n') => result.push(b'\n'),
                    Some(b'r') => result.push(b'\r'),
                    Some(b't') => result.push(b'\t'),
                    Some(b'b') => result.push(0x08),
                    Some(b'f') => result.push(0x0c),
                    Some(b'(') => result.push(b'('),
                    Some(b')') => result.push(b')'),
                    Some(b'\\') => result.push(b'\\'),
                    Some(b'\r') => {
                        // Line continuation
                        if self.peek() == Some(b'\n') {
                            self.advance();
                        }
                    }
                    Some(b'\n') => {}
                    Some(c) if (b'0'..b'8').contains(&c) => {
                        let mut octal = (c - b'0') as u32;
                        for _ in 0..2 {
                            match self.peek() {
                                Some(d) if (b'0'..b'8').contains(&d) => {
                                    self.advance();
                                    octal = octal * 8 + (d - b'0') as u32;
                                }
                                _ => break,
                            }
                        }
                        result.push((octal & 0xFF) as u8);
                    }
                    Some(c) => result.push(c),
                    None => return Err(PdfError::UnexpectedEof),
                },
                Some(c) => result.push(c),
                None => return Err(PdfError::UnexpectedEof),
            }
        }

        Ok(Token::String(result))
    }

    /// Parse a hex string <...>
    fn parse_hex_string(&mut self) -> Result<Token> {
        self.advance(); // Skip '<'
        let mut result = Vec::new();
        let mut pending: Option<u8> = None;

        loop {
            match self.advance() {
                Some(b'>') => break,
                Some(c) if Self::is_whitespace(c) => {}
                Some(c) => {
                    let nibble = hex_value(c).ok_or_else(|| PdfError::TokenError {
                        pos: self.pos - 1,
                        msg: "invalid character in hex string".into(),
                    })?;
                    if let Some(high) = pending.take() {
                        result.push((high << 4) | nibble);
                    } else {
                        pending = Some(nibble);
                    }
                }
                None => return Err(PdfError::UnexpectedEof),
            }
        }

        // Odd digit count: the last nibble is padded with zero
        if let Some(high) = pending {
            result.push(high << 4);
        }

        Ok(Token::String(result))
    }

    /// Parse a keyword
    fn parse_keyword(&mut self) -> Token {
        let start = self.pos;

        while let Some(b) = self.peek() {
            if Self::ends_word(b) {
                break;
            }
            self.advance();
        }

        match &self.data[start..self.pos] {
            b"true" => Token::Bool(true),
            b"false" => Token::Bool(false),
            bytes => Token::Keyword(Keyword::from_bytes(bytes)),
        }
    }

    /// Get next token together with its byte span.
    pub fn next_token(&mut self) -> Option<Result<(Range<usize>, Token)>> {
        self.skip_whitespace();

        let start = self.pos;
        let b = self.peek()?;

        let result = match b {
            b'/' => Ok(self.parse_literal()),
            b'(' => self.parse_string(),
            b'<' => {
                if self.peek_at(1) == Some(b'<') {
                    self.pos += 2;
                    Ok(Token::Keyword(Keyword::DictStart))
                } else {
                    self.parse_hex_string()
                }
            }
            b'>' => {
                if self.peek_at(1) == Some(b'>') {
                    self.pos += 2;
                    Ok(Token::Keyword(Keyword::DictEnd))
                } else {
                    Err(PdfError::TokenError {
                        pos: start,
                        msg: "unbalanced '>'".into(),
                    })
                }
            }
            b')' => Err(PdfError::TokenError {
                pos: start,
                msg: "unbalanced ')'".into(),
            }),
            b'[' => {
                self.advance();
                Ok(Token::Keyword(Keyword::ArrayStart))
            }
            b']' => {
                self.advance();
                Ok(Token::Keyword(Keyword::ArrayEnd))
            }
            b'{' => {
                self.advance();
                Ok(Token::Keyword(Keyword::BraceOpen))
            }
            b'}' => {
                self.advance();
                Ok(Token::Keyword(Keyword::BraceClose))
            }
            b'+' | b'-' | b'.' => {
                let next = if b == b'.' {
                    self.peek_at(1)
                } else {
                    match self.peek_at(1) {
                        Some(b'.') => self.peek_at(2),
                        other => other,
                    }
                };
                if next.is_some_and(|c| c.is_ascii_digit()) {
                    self.parse_number()
                } else {
                    Ok(self.parse_keyword())
                }
            }
            c if c.is_ascii_digit() => self.parse_number(),
            _ => Ok(self.parse_keyword()),
        };

        // Guarantee progress on error so callers never spin
        if result.is_err() && self.pos == start {
            self.pos += 1;
        }

        Some(result.map(|token| (start..self.pos, token)))
    }

    /// Skip the binary payload of an inline image.
    ///
    /// Must be called right after the `ID` keyword. Consumes the single
    /// whitespace byte after `ID`, then scans for an `EI` that is preceded
    /// by whitespace and followed by whitespace or end of data. Returns the
    /// position just past `EI`.
    pub fn skip_inline_image(&mut self) -> Result<usize> {
        if self.peek().is_some_and(Self::is_whitespace) {
            self.pos += 1;
        }
        let data = self.data;
        let mut i = self.pos;
        while i + 1 < data.len() {
            if data[i] == b'E'
                && data[i + 1] == b'I'
                && i > 0
                && Self::is_whitespace(data[i - 1])
                && data.get(i + 2).is_none_or(|&c| Self::is_whitespace(c))
            {
                self.pos = i + 2;
                return Ok(self.pos);
            }
            i += 1;
        }
        Err(PdfError::TokenError {
            pos: self.pos,
            msg: "inline image without EI".into(),
        })
    }
}

const fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Decode name bytes. Names are byte sequences; non-UTF-8 bytes are mapped
/// through Latin-1 so the conversion is lossless and reversible.
pub(crate) fn name_from_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(data: &[u8]) -> Vec<Token> {
        let mut lexer = Lexer::new(data);
        let mut out = Vec::new();
        while let Some(tok) = lexer.next_token() {
            out.push(tok.unwrap().1);
        }
        out
    }

    #[test]
    fn test_keyword_from_bytes_known() {
        assert_eq!(Keyword::from_bytes(b"obj"), Keyword::Obj);
        assert_eq!(Keyword::from_bytes(b"R"), Keyword::R);
        assert_eq!(Keyword::from_bytes(b"re"), Keyword::Re);
        assert_eq!(Keyword::from_bytes(b"f*"), Keyword::FStar);
        assert_eq!(Keyword::from_bytes(b"'"), Keyword::Quote);
    }

    #[test]
    fn test_keyword_round_trip() {
        for kw in [b"Tj".as_slice(), b"W*", b"scn", b"BDC", b"xyz"] {
            assert_eq!(Keyword::from_bytes(kw).as_bytes(), kw);
        }
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            tokens(b"1 -2 +3 .5 -.25 4. 1.5"),
            vec![
                Token::Int(1),
                Token::Int(-2),
                Token::Int(3),
                Token::Real(0.5),
                Token::Real(-0.25),
                Token::Real(4.0),
                Token::Real(1.5),
            ]
        );
    }

    #[test]
    fn test_strings_and_names() {
        assert_eq!(
            tokens(b"(a\\(b\\)c) <48 65 6C6C 6F> /A#20B /x#zz"),
            vec![
                Token::String(b"a(b)c".to_vec()),
                Token::String(b"Hello".to_vec()),
                Token::Literal("A B".into()),
                Token::Literal("x#zz".into()),
            ]
        );
    }

    #[test]
    fn test_nested_parens_and_octal() {
        assert_eq!(
            tokens(b"(x(y)z\\101)"),
            vec![Token::String(b"x(y)zA".to_vec())]
        );
    }

    #[test]
    fn test_spans_cover_token_bytes() {
        let data = b"  0 0 10 10 re\nf";
        let mut lexer = Lexer::new(data);
        let mut spans = Vec::new();
        while let Some(tok) = lexer.next_token() {
            spans.push(tok.unwrap().0);
        }
        assert_eq!(&data[spans[4].clone()], b"re");
        assert_eq!(&data[spans[5].clone()], b"f");
        assert_eq!(spans[0], 2..3);
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            tokens(b"% comment\n1 %x\n2"),
            vec![Token::Int(1), Token::Int(2)]
        );
    }

    #[test]
    fn test_unterminated_string_is_error() {
        let mut lexer = Lexer::new(b"(abc");
        assert!(matches!(
            lexer.next_token(),
            Some(Err(PdfError::UnexpectedEof))
        ));
    }

    #[test]
    fn test_skip_inline_image() {
        let data = b"ID \x00EI\xffEIx EI Q";
        let mut lexer = Lexer::at(data, 2);
        let end = lexer.skip_inline_image().unwrap();
        assert_eq!(&data[..end], b"ID \x00EI\xffEIx EI");
    }
}
