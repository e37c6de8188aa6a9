//! Content stream parsing.
//!
//! Groups operands with the operator that consumes them and records the
//! byte range each group occupies, so that a group can later be cut out of
//! the stream without re-serializing its neighbours.

use crate::error::{PdfError, Result};
use crate::model::{PDFDict, PDFObject};
use crate::parser::{Keyword, PDFParser, Token};
use smallvec::SmallVec;
use std::ops::Range;

/// Operand list; six covers every fixed-arity operator (`cm`, `c`, `Tm`).
pub type Operands = SmallVec<[PDFObject; 6]>;

/// One operator with its operands.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentOperator {
    pub op: Keyword,
    pub operands: Operands,
    /// Bytes from the first operand through the operator
    pub range: Range<usize>,
}

impl ContentOperator {
    /// Inline image dictionary, for `BI ... ID ... EI` groups.
    pub fn inline_image_dict(&self) -> Option<&PDFDict> {
        match (&self.op, self.operands.first()) {
            (Keyword::BI, Some(PDFObject::Dict(d))) => Some(d),
            _ => None,
        }
    }
}

/// Parse a content stream into operators.
///
/// An inline image becomes one `BI` operator whose single operand is the
/// image dictionary and whose range runs through `EI`. Operands left over
/// at the end of the stream are dropped. Syntax errors are reported as
/// [`PdfError::MalformedContentStream`].
pub fn parse_content(data: &[u8]) -> Result<Vec<ContentOperator>> {
    parse_inner(data).map_err(PdfError::in_content_stream)
}

fn parse_inner(data: &[u8]) -> Result<Vec<ContentOperator>> {
    let mut parser = PDFParser::new(data);
    let mut ops = Vec::new();
    let mut operands = Operands::new();
    let mut start: Option<usize> = None;

    while let Some((span, token)) = parser.next_token()? {
        let kw = match token {
            Token::Keyword(kw) if is_operator(&kw) => kw,
            other => {
                start.get_or_insert(span.start);
                let obj = parser.token_to_object((span, other))?;
                operands.push(obj);
                continue;
            }
        };

        if kw == Keyword::BI {
            let op_start = start.take().unwrap_or(span.start);
            let dict = parse_inline_image_dict(&mut parser)?;
            let end = parser.skip_inline_image()?;
            operands.clear();
            ops.push(ContentOperator {
                op: Keyword::BI,
                operands: SmallVec::from_elem(PDFObject::Dict(dict), 1),
                range: op_start..end,
            });
            continue;
        }

        ops.push(ContentOperator {
            op: kw,
            operands: std::mem::take(&mut operands),
            range: start.take().unwrap_or(span.start)..span.end,
        });
    }

    Ok(ops)
}

/// Keywords that end an operand group.
fn is_operator(kw: &Keyword) -> bool {
    !matches!(
        kw,
        Keyword::ArrayStart
            | Keyword::ArrayEnd
            | Keyword::DictStart
            | Keyword::DictEnd
            | Keyword::True
            | Keyword::False
            | Keyword::Null
    )
}

/// Key/value pairs between `BI` and `ID`.
fn parse_inline_image_dict(parser: &mut PDFParser<'_>) -> Result<PDFDict> {
    let mut dict = PDFDict::new();
    loop {
        let (span, token) = parser.next_token()?.ok_or_else(|| {
            PdfError::MalformedContentStream("inline image without ID".into())
        })?;
        let key = match token {
            Token::Keyword(Keyword::ID) => return Ok(dict),
            Token::Literal(name) => name,
            _ => {
                return Err(PdfError::TokenError {
                    pos: span.start,
                    msg: "expected name in inline image dictionary".into(),
                });
            }
        };
        let value = parser.parse_object()?;
        dict.insert(key, value);
    }
}
