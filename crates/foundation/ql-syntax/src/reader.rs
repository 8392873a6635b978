//! Reader for the canonical textual form
//!
//! The reader turns text into syntax trees. It understands atoms (bare or
//! quoted), parenthesised compounds with `:key` and `:key value` flags,
//! `;` line comments, and `{ ... }` blocks. Blocks are not read eagerly: each
//! one becomes a [`LazyForm`] headed by `{...}` that parses its contents as
//! `sexps` on first use.
//!
//! The reader is itself the [`Grammar`] behind the blocks it creates, with two
//! productions: `sexp` (exactly one datum) and `sexps` (any number of data,
//! wrapped in a `(@ ...)` compound).

use crate::error::SyntaxError;
use crate::hygiene::SymbolName;
use crate::lazy::{Grammar, LazyForm, Replacements, ReparseRequest};
use crate::node::SyntaxNode;
use ql_span::{Provenance, SourceId, Span};
use std::sync::Arc;

/// Production reading a single datum
pub const SEXP: &str = "sexp";
/// Production reading a sequence of data
pub const SEXPS: &str = "sexps";
/// Discriminator of deferred blocks
pub const BLOCK_WHAT: &str = "{...}";

/// Grammar for the canonical textual form
#[derive(Debug, Clone, Copy, Default)]
pub struct Reader;

impl Reader {
    /// Read every datum in `source` as a `(@ ...)` compound
    ///
    /// # Errors
    ///
    /// Returns [`SyntaxError::Read`] if the text is malformed.
    pub fn read_all(source: &SourceId) -> Result<SyntaxNode, SyntaxError> {
        let range = whole(source)?;
        Self.parse(&ReparseRequest {
            production: SEXPS,
            range: &range,
            replacements: None,
        })
    }

    /// Read the single datum in `source`
    ///
    /// # Errors
    ///
    /// Returns [`SyntaxError::Read`] if the text is malformed or does not
    /// hold exactly one datum.
    pub fn read_one(source: &SourceId) -> Result<SyntaxNode, SyntaxError> {
        let range = whole(source)?;
        Self.parse(&ReparseRequest {
            production: SEXP,
            range: &range,
            replacements: None,
        })
    }
}

fn whole(source: &SourceId) -> Result<Provenance, SyntaxError> {
    let Some(file) = source.source_file() else {
        return Err(SyntaxError::Read {
            message: format!("source `{}` has no text", source.label()),
            provenance: Provenance::new(source.clone(), Span::default()),
        });
    };
    Ok(Provenance::new(source.clone(), Span::new(0, file.text().len() as u32)))
}

impl Grammar for Reader {
    fn parse(&self, request: &ReparseRequest<'_>) -> Result<SyntaxNode, SyntaxError> {
        let Some(source) = request.range.source.as_ref() else {
            return Err(SyntaxError::Read {
                message: "cannot read text with no source".to_string(),
                provenance: request.range.clone(),
            });
        };
        let text = source.source_file().map_or("", |file| file.text());
        let mut cursor = Cursor {
            text,
            pos: request.range.span.start as usize,
            end: (request.range.span.end as usize).min(text.len()),
            source,
            replacements: request.replacements,
        };
        match request.production {
            SEXP => {
                cursor.skip_trivia();
                let datum = cursor.datum()?;
                cursor.skip_trivia();
                if !cursor.at_end() {
                    return Err(cursor.error("expected a single datum"));
                }
                Ok(datum)
            }
            SEXPS => cursor.sequence(),
            other => Err(SyntaxError::Read {
                message: format!("unknown production `{other}`"),
                provenance: request.range.clone(),
            }),
        }
    }
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
    end: usize,
    source: &'a SourceId,
    replacements: Option<&'a Replacements>,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<char> {
        if self.at_end() {
            return None;
        }
        self.text[self.pos..self.end].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.end
    }

    fn provenance(&self, start: usize, end: usize) -> Provenance {
        Provenance::new(self.source.clone(), Span::new(start as u32, end as u32))
    }

    fn error(&self, message: &str) -> SyntaxError {
        SyntaxError::Read {
            message: message.to_string(),
            provenance: self.provenance(self.pos, self.pos),
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.bump();
            } else if ch == ';' {
                while let Some(next) = self.bump() {
                    if next == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    /// Data up to the end of the range, as `(@ ...)`
    fn sequence(&mut self) -> Result<SyntaxNode, SyntaxError> {
        let start = self.pos;
        let mut parts = vec![SyntaxNode::atom_str("@")];
        loop {
            self.skip_trivia();
            if self.at_end() {
                break;
            }
            parts.push(self.datum()?);
        }
        Ok(SyntaxNode::compound(
            self.provenance(start, self.end),
            parts,
            Vec::new(),
        ))
    }

    fn datum(&mut self) -> Result<SyntaxNode, SyntaxError> {
        let start = self.pos;
        let node = match self.peek() {
            None => return Err(self.error("unexpected end of input")),
            Some('(') => self.compound()?,
            Some('{') => self.block()?,
            Some('"') => self.quoted()?,
            Some(')' | '}') => return Err(self.error("unexpected closing delimiter")),
            Some(_) => self.bare()?,
        };
        let range = self.provenance(start, self.pos);
        match self.replacements.and_then(|replacements| replacements.find(&range)) {
            Some(replacement) => Ok(replacement.clone()),
            None => Ok(node),
        }
    }

    fn compound(&mut self) -> Result<SyntaxNode, SyntaxError> {
        let start = self.pos;
        self.bump();
        let mut parts = Vec::new();
        let mut flags = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                None => return Err(self.error("unclosed `(`")),
                Some(')') => {
                    self.bump();
                    break;
                }
                Some(':') => flags.push(self.flag()?),
                Some(_) => parts.push(self.datum()?),
            }
        }
        Ok(SyntaxNode::compound(
            self.provenance(start, self.pos),
            parts,
            flags,
        ))
    }

    /// `:key`, `:key value`, or `:(key values...)`
    fn flag(&mut self) -> Result<SyntaxNode, SyntaxError> {
        let start = self.pos;
        self.bump();
        if self.peek() == Some('(') {
            return self.compound();
        }
        let key = match self.peek() {
            Some('"') => self.quoted()?,
            Some(ch) if !ch.is_whitespace() && !is_delimiter(ch) => self.bare()?,
            _ => return Err(self.error("expected a flag name after `:`")),
        };
        self.skip_trivia();
        match self.peek() {
            None | Some(')' | ':') => Ok(key),
            Some(_) => {
                let value = self.datum()?;
                Ok(SyntaxNode::compound(
                    self.provenance(start, self.pos),
                    vec![key, value],
                    Vec::new(),
                ))
            }
        }
    }

    fn block(&mut self) -> Result<SyntaxNode, SyntaxError> {
        let start = self.pos;
        self.bump();
        let inner_start = self.pos;
        let mut depth = 1_usize;
        let mut inner_end = None;
        while let Some(ch) = self.peek() {
            match ch {
                '"' => {
                    self.quoted()?;
                    continue;
                }
                ';' => {
                    self.skip_trivia();
                    continue;
                }
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        inner_end = Some(self.pos);
                        self.bump();
                        break;
                    }
                }
                _ => {}
            }
            self.bump();
        }
        let Some(inner_end) = inner_end else {
            return Err(SyntaxError::Read {
                message: "unclosed `{`".to_string(),
                provenance: self.provenance(start, self.pos),
            });
        };
        let what = SyntaxNode::atom(
            SymbolName::new(BLOCK_WHAT),
            self.provenance(start, inner_start),
        );
        let form = LazyForm::new(
            what,
            SEXPS,
            self.provenance(inner_start, inner_end),
            self.provenance(start, self.pos),
            Arc::new(Reader),
        )
        .with_replacements(self.replacements.cloned());
        Ok(SyntaxNode::lazy(form))
    }

    fn quoted(&mut self) -> Result<SyntaxNode, SyntaxError> {
        let start = self.pos;
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(SyntaxError::Read {
                        message: "unterminated string".to_string(),
                        provenance: self.provenance(start, self.pos),
                    });
                }
                Some('"') => break,
                Some('\\') => match self.bump() {
                    Some(escaped) => text.push(escaped),
                    None => return Err(self.error("unterminated escape")),
                },
                Some(ch) => text.push(ch),
            }
        }
        Ok(SyntaxNode::atom(
            SymbolName::new(&text),
            self.provenance(start, self.pos),
        ))
    }

    fn bare(&mut self) -> Result<SyntaxNode, SyntaxError> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() || is_delimiter(ch) {
                break;
            }
            self.bump();
        }
        if self.pos == start {
            return Err(self.error("expected an atom"));
        }
        Ok(SyntaxNode::atom(
            SymbolName::new(&self.text[start..self.pos]),
            self.provenance(start, self.pos),
        ))
    }
}

fn is_delimiter(ch: char) -> bool {
    matches!(ch, '(' | ')' | '{' | '}' | '"' | ';')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lazy::Replacement;
    use crate::node::Encoding;
    use expect_test::expect;
    use ql_span::FileId;

    fn source(text: &str) -> SourceId {
        SourceId::file(FileId::new(0), "reader.ql", text)
    }

    #[test]
    fn test_read_compound_with_flags() {
        let node = Reader::read_one(&source("(var x :static :align 8)"));
        let node = node.ok();
        expect![[r#"Some(SyntaxNode((var x :static :align 8)))"#]].assert_eq(&format!("{node:?}"));
        let node = node.unwrap_or_else(|| SyntaxNode::list([]));
        assert!(node.flag("static").ok().flatten().is_some());
        assert_eq!(node.provenance().span, Span::new(0, 24));
    }

    #[test]
    fn test_read_all_wraps_in_block() {
        let node = Reader::read_all(&source("; leading comment\n(f \"two words\")\nx"));
        expect![[r#"
            (@
              (f "two words")
              x
            )"#]]
        .assert_eq(&node.map(|node| node.to_string()).unwrap_or_default());
    }

    #[test]
    fn test_blocks_are_deferred() {
        let file = source("(fun f () {(g x) (h y)})");
        let node = Reader::read_one(&file).ok();
        let body = node.as_ref().and_then(|node| node.part(3).ok().flatten().cloned());
        let Some(body) = body else {
            panic!("missing block");
        };
        assert_eq!(body.encoding(), Encoding::Lazy);
        assert_eq!(body.to_string(), "({...} ...)");
        assert_eq!(body.provenance().span, Span::new(10, 23));

        assert_eq!(body.num_parts().ok(), Some(3));
        expect![[r#"
            =(@
              (g x)
              (h y)
            )"#]]
        .assert_eq(&body.to_string());
    }

    #[test]
    fn test_replacements_substitute_ranges() {
        let file = source("{(g x) (h y)}");
        let replacement = SyntaxNode::atom_str("spliced");
        let replacements = Replacements::new(vec![Replacement {
            range: Provenance::new(file.clone(), Span::new(7, 12)),
            node: replacement,
        }]);
        let request = ReparseRequest {
            production: SEXPS,
            range: &Provenance::new(file, Span::new(1, 12)),
            replacements: Some(&replacements),
        };
        let parsed = Reader.parse(&request).map(|node| node.to_string());
        expect![[r#"
            (@
              (g x)
              spliced
            )"#]]
        .assert_eq(&parsed.unwrap_or_default());
    }

    #[test]
    fn test_read_errors() {
        let unclosed = Reader::read_one(&source("(f x"));
        assert!(matches!(unclosed, Err(SyntaxError::Read { ref message, .. }) if message == "unclosed `(`"));

        let stray = Reader::read_all(&source("x )"));
        assert!(matches!(stray, Err(SyntaxError::Read { .. })));

        let unknown = Reader.parse(&ReparseRequest {
            production: "type",
            range: &Provenance::new(source("x"), Span::new(0, 1)),
            replacements: None,
        });
        assert!(matches!(unknown, Err(SyntaxError::Read { ref message, .. }) if message == "unknown production `type`"));
    }
}
