//! PDF parser - converts lexer tokens to PDF objects.

use super::lexer::{Keyword, Lexer, Token};
use crate::error::{PdfError, Result};
use crate::model::{PDFDict, PDFObjRef, PDFObject};
use std::ops::Range;

/// Deepest array/dictionary nesting accepted before giving up.
pub const MAX_NESTING: usize = 256;

type Spanned = (Range<usize>, Token);

/// PDF Parser - parses PDF object syntax
///
/// Uses [`Lexer`] for tokenization and builds PDF objects,
/// handling indirect references (num num R) appropriately.
pub struct PDFParser<'a> {
    base: Lexer<'a>,
    /// Lookahead buffer for tokens
    lookahead: Vec<Spanned>,
    depth: usize,
}

impl<'a> PDFParser<'a> {
    pub const fn new(data: &'a [u8]) -> Self {
        Self::at(data, 0)
    }

    /// Parser positioned at `pos`.
    pub const fn at(data: &'a [u8], pos: usize) -> Self {
        Self {
            base: Lexer::at(data, pos),
            lookahead: Vec::new(),
            depth: 0,
        }
    }

    /// Position of the next unread token (lookahead included).
    pub fn tell(&self) -> usize {
        self.lookahead
            .last()
            .map_or_else(|| self.base.tell(), |(span, _)| span.start)
    }

    /// Reposition the parser and drop any lookahead.
    pub fn seek(&mut self, pos: usize) {
        self.lookahead.clear();
        self.base.set_pos(pos);
    }

    /// Get next token (from lookahead or lexer)
    pub fn next_token(&mut self) -> Result<Option<Spanned>> {
        if let Some(tok) = self.lookahead.pop() {
            return Ok(Some(tok));
        }
        self.base.next_token().transpose()
    }

    /// Skip inline image data; see [`Lexer::skip_inline_image`].
    pub fn skip_inline_image(&mut self) -> Result<usize> {
        let pos = self.tell();
        self.seek(pos);
        self.base.skip_inline_image()
    }

    /// Push token back to lookahead
    fn push_back(&mut self, tok: Spanned) {
        self.lookahead.push(tok);
    }

    /// Parse next PDF object
    pub fn parse_object(&mut self) -> Result<PDFObject> {
        let token = self.next_token()?.ok_or(PdfError::UnexpectedEof)?;
        self.token_to_object(token)
    }

    /// Convert an already-read token to a PDF object, reading further
    /// tokens for arrays, dictionaries and references.
    pub(crate) fn token_to_object(&mut self, (span, token): Spanned) -> Result<PDFObject> {
        match token {
            Token::Int(n) => {
                // Could be start of indirect reference: objid genno R
                if let Some(tok2) = self.next_token()? {
                    if let Token::Int(m) = tok2.1 {
                        if let Some(tok3) = self.next_token()? {
                            if matches!(tok3.1, Token::Keyword(Keyword::R)) {
                                return Ok(PDFObject::Ref(make_ref(n, m, span.start)?));
                            }
                            // Not R, push back both
                            self.push_back(tok3);
                        }
                    }
                    self.push_back(tok2);
                }
                Ok(PDFObject::Int(n))
            }
            Token::Real(n) => Ok(PDFObject::Real(n)),
            Token::Bool(b) => Ok(PDFObject::Bool(b)),
            Token::Literal(s) => Ok(PDFObject::Name(s)),
            Token::String(s) => Ok(PDFObject::String(s)),
            Token::Keyword(Keyword::Null) => Ok(PDFObject::Null),
            Token::Keyword(Keyword::True) => Ok(PDFObject::Bool(true)),
            Token::Keyword(Keyword::False) => Ok(PDFObject::Bool(false)),
            Token::Keyword(Keyword::ArrayStart) => self.nested(span.start, Self::parse_array),
            Token::Keyword(Keyword::DictStart) => self.nested(span.start, Self::parse_dict),
            // Other keywords are errors in object context
            Token::Keyword(kw) => Err(PdfError::TokenError {
                pos: span.start,
                msg: format!("unexpected keyword: {kw}"),
            }),
        }
    }

    fn nested(
        &mut self,
        pos: usize,
        parse: fn(&mut Self) -> Result<PDFObject>,
    ) -> Result<PDFObject> {
        if self.depth >= MAX_NESTING {
            return Err(PdfError::ResourceLimitExceeded(format!(
                "object nesting deeper than {MAX_NESTING} at offset {pos}"
            )));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Parse array contents until ]
    fn parse_array(&mut self) -> Result<PDFObject> {
        let mut arr = Vec::new();

        loop {
            let token = self.next_token()?.ok_or(PdfError::UnexpectedEof)?;
            if matches!(token.1, Token::Keyword(Keyword::ArrayEnd)) {
                break;
            }
            arr.push(self.token_to_object(token)?);
        }

        Ok(PDFObject::Array(arr))
    }

    /// Parse dict contents until >>
    fn parse_dict(&mut self) -> Result<PDFObject> {
        Ok(PDFObject::Dict(self.parse_dict_body()?))
    }

    /// Parse key/value pairs up to and including `>>`.
    pub fn parse_dict_body(&mut self) -> Result<PDFDict> {
        let mut dict = PDFDict::new();

        loop {
            let (span, token) = self.next_token()?.ok_or(PdfError::UnexpectedEof)?;

            // Key must be a literal name
            let key = match token {
                Token::Keyword(Keyword::DictEnd) => break,
                Token::Literal(name) => name,
                _ => {
                    return Err(PdfError::TokenError {
                        pos: span.start,
                        msg: "expected name as dict key".into(),
                    });
                }
            };

            let value = self.parse_object()?;
            dict.insert(key, value);
        }

        Ok(dict)
    }
}

fn make_ref(objid: i64, genno: i64, pos: usize) -> Result<PDFObjRef> {
    match (u32::try_from(objid), u32::try_from(genno)) {
        (Ok(objid), Ok(genno)) if objid > 0 => Ok(PDFObjRef::new(objid, genno)),
        _ => Err(PdfError::TokenError {
            pos,
            msg: format!("invalid reference {objid} {genno} R"),
        }),
    }
}
