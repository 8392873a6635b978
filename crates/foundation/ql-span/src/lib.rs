//! Source identities, spans and provenance ranges
//!
//! Every syntax node carries a [`Provenance`]: an optional [`SourceId`] plus a
//! byte [`Span`] into the text behind that source. A source is either a real
//! file, a synthetic buffer, or the product of a macro expansion. Expansion
//! sources point back at the text their offsets refer to (`origin`) and at the
//! call site that produced them, which is what error messages walk to print
//! the expansion backtrace.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter;
use std::ops::Range;
use std::ptr;
use std::sync::Arc;

/// A unique identifier for a source file
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct FileId(pub u32);

impl FileId {
    /// Create a file id
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

/// A byte offset span in a source file
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// Inclusive start offset
    pub start: u32,
    /// Exclusive end offset
    pub end: u32,
}

impl Span {
    /// Create a span; `start` must not exceed `end`
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "span start {start} past end {end}");
        Self { start, end }
    }

    /// The span as a `usize` range
    pub fn range(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }

    /// Length in bytes
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Whether the span covers no bytes
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Smallest span covering both spans
    #[must_use]
    pub fn cover(self, other: Self) -> Self {
        Self::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// A loaded source buffer
#[derive(Debug)]
pub struct SourceFile {
    id: FileId,
    name: String,
    text: Arc<str>,
    line_starts: Vec<u32>,
}

impl SourceFile {
    /// Wrap `text` under `name`
    pub fn new(id: FileId, name: impl Into<String>, text: impl Into<Arc<str>>) -> Self {
        let text = text.into();
        let line_starts = iter::once(0)
            .chain(
                text.match_indices('\n')
                    .map(|(offset, _)| offset as u32 + 1),
            )
            .collect();
        Self {
            id,
            name: name.into(),
            text,
            line_starts,
        }
    }

    /// File id
    pub fn id(&self) -> FileId {
        self.id
    }

    /// Display name of the file
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text covered by `span`, if it lies on character boundaries
    pub fn slice(&self, span: Span) -> Option<&str> {
        self.text.get(span.range())
    }

    /// One-based line and column of `offset`
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let column = offset - self.line_starts[line];
        (line as u32 + 1, column + 1)
    }
}

/// What produced the text behind a [`SourceId`]
#[derive(Debug)]
pub enum SourceKind {
    /// Text read from a file
    File(SourceFile),
    /// Text with no backing file (built-ins, generated code)
    Synthetic(String),
    /// Nodes produced by a macro expansion
    Expansion(ExpansionOf),
}

/// One macro expansion event
#[derive(Debug, Clone)]
pub struct ExpansionOf {
    /// Source whose text the expanded offsets still refer to
    pub origin: SourceId,
    /// Name of the macro that was expanded
    pub macro_name: String,
    /// Where the macro was invoked
    pub call_site: Provenance,
}

/// Opaque source identity, compared by identity only
#[derive(Clone)]
pub struct SourceId(Arc<SourceKind>);

impl SourceId {
    /// A source backed by file text
    pub fn file(id: FileId, name: impl Into<String>, text: impl Into<Arc<str>>) -> Self {
        Self(Arc::new(SourceKind::File(SourceFile::new(id, name, text))))
    }

    /// A source with no text
    pub fn synthetic(label: impl Into<String>) -> Self {
        Self(Arc::new(SourceKind::Synthetic(label.into())))
    }

    /// A fresh source for one expansion event
    pub fn expansion(expansion: ExpansionOf) -> Self {
        Self(Arc::new(SourceKind::Expansion(expansion)))
    }

    /// What this source is
    pub fn kind(&self) -> &SourceKind {
        &self.0
    }

    /// The file whose text this source's offsets index, following expansion
    /// origins
    pub fn source_file(&self) -> Option<&SourceFile> {
        match self.kind() {
            SourceKind::File(file) => Some(file),
            SourceKind::Synthetic(_) => None,
            SourceKind::Expansion(expansion) => expansion.origin.source_file(),
        }
    }

    /// Enclosing expansions, innermost first
    pub fn backtrace(&self) -> Vec<&ExpansionOf> {
        let mut chain = Vec::new();
        let mut current = Some(self);
        while let Some(source) = current {
            let SourceKind::Expansion(expansion) = source.kind() else {
                break;
            };
            chain.push(expansion);
            current = expansion.call_site.source.as_ref();
        }
        chain
    }

    /// Short label used in locations
    pub fn label(&self) -> &str {
        match self.kind() {
            SourceKind::File(file) => file.name(),
            SourceKind::Synthetic(label) => label,
            SourceKind::Expansion(expansion) => expansion.origin.label(),
        }
    }
}

impl PartialEq for SourceId {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for SourceId {}

impl Hash for SourceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        ptr::hash(Arc::as_ptr(&self.0), state);
    }
}

impl fmt::Debug for SourceId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            SourceKind::File(file) => write!(formatter, "File({})", file.name()),
            SourceKind::Synthetic(label) => write!(formatter, "Synthetic({label})"),
            SourceKind::Expansion(expansion) => {
                write!(formatter, "Expansion({})", expansion.macro_name)
            }
        }
    }
}

/// A (source, begin, end) range attached to a syntax node
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Provenance {
    /// Backing source; `None` means unknown
    pub source: Option<SourceId>,
    /// Offsets into the source text
    pub span: Span,
}

impl Provenance {
    /// A range with no source
    pub fn unknown() -> Self {
        Self::default()
    }

    /// A range in `source`
    pub fn new(source: SourceId, span: Span) -> Self {
        Self {
            source: Some(source),
            span,
        }
    }

    /// Whether the source is unknown
    pub fn is_unknown(&self) -> bool {
        self.source.is_none()
    }

    /// Whether the range covers no text
    pub fn is_empty(&self) -> bool {
        self.span.is_empty()
    }

    /// Whether both ranges have the same known source
    pub fn same_source(&self, other: &Self) -> bool {
        matches!((&self.source, &other.source), (Some(left), Some(right)) if left == right)
    }

    /// The same offsets under another source identity
    #[must_use]
    pub fn with_source(&self, source: Option<SourceId>) -> Self {
        Self {
            source,
            span: self.span,
        }
    }

    /// Smallest range covering both, when they share a source
    pub fn union(&self, other: &Self) -> Option<Self> {
        self.same_source(other).then(|| Self {
            source: self.source.clone(),
            span: self.span.cover(other.span),
        })
    }

    /// Covered source text
    pub fn text(&self) -> Option<&str> {
        self.source.as_ref()?.source_file()?.slice(self.span)
    }

    /// `name:line:col` of the start of the range
    pub fn location(&self) -> Option<String> {
        let source = self.source.as_ref()?;
        match source.source_file() {
            Some(file) => {
                let (line, column) = file.line_col(self.span.start);
                Some(format!("{}:{line}:{column}", file.name()))
            }
            None => Some(source.label().to_string()),
        }
    }

    /// First line of the covered text, trimmed and cut to `max_len` chars
    pub fn sample(&self, max_len: usize) -> Option<String> {
        self.text().map(|text| sample(text, max_len))
    }

    /// `location: "sample"`, or `<unknown>` when there is no source
    pub fn sample_w_loc(&self, max_len: usize) -> String {
        match (self.location(), self.sample(max_len)) {
            (Some(location), Some(sample)) => format!("{location}: \"{sample}\""),
            (Some(location), None) => location,
            _ => "<unknown>".to_string(),
        }
    }

    /// Render `message` at this range with its expansion backtrace, one line
    /// per enclosing expansion
    pub fn describe(&self, message: &str, sample_len: usize) -> String {
        let mut out = match self.location() {
            Some(location) => format!("{location}: {message}\n"),
            None => format!("{message}\n"),
        };
        if let Some(sample) = self.sample(sample_len) {
            out.push_str(&format!("  \"{sample}\"\n"));
        }
        if let Some(source) = &self.source {
            for expansion in source.backtrace() {
                out.push_str(&format!(
                    "  in expansion of {} (macro \"{}\")\n",
                    expansion.call_site.sample_w_loc(sample_len),
                    expansion.macro_name
                ));
            }
        }
        out
    }
}

/// Leading whitespace is skipped, the sample stops at the first newline, and
/// anything cut short ends in `...`
fn sample(text: &str, max_len: usize) -> String {
    let trimmed = text.trim_start();
    let mut out = String::new();
    let mut chars = trimmed.chars().peekable();
    let mut taken = 0;
    while let Some(&next) = chars.peek() {
        if next == '\n' || taken == max_len {
            break;
        }
        out.push(next);
        chars.next();
        taken += 1;
    }
    if chars.peek().is_some() {
        let keep = max_len.saturating_sub(3).min(taken);
        out = out.chars().take(keep).collect();
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(text: &str) -> SourceId {
        SourceId::file(FileId::new(0), "test.ql", text)
    }

    #[test]
    fn test_union_requires_same_source() {
        let file = source("abcdefghijkl");
        let left = Provenance::new(file.clone(), Span::new(0, 5));
        let right = Provenance::new(file, Span::new(5, 9));
        assert_eq!(left.union(&right).map(|prov| prov.span), Some(Span::new(0, 9)));

        let other = Provenance::new(source("abcdefghijkl"), Span::new(9, 12));
        assert!(left.union(&other).is_none());
        assert!(left.union(&Provenance::unknown()).is_none());
    }

    #[test]
    fn test_line_col() {
        let file = SourceFile::new(FileId::new(1), "a.ql", "ab\ncd\n\nef");
        assert_eq!(file.line_col(0), (1, 1));
        assert_eq!(file.line_col(3), (2, 1));
        assert_eq!(file.line_col(4), (2, 2));
        assert_eq!(file.line_col(7), (4, 1));
    }

    #[test]
    fn test_sample_truncates() {
        assert_eq!(sample("   (foo bar)", 20), "(foo bar)");
        assert_eq!(sample("(foo bar)\n(baz)", 20), "(foo bar)...");
        assert_eq!(sample("abcdefghijklmnopqrstuvwxyz", 10), "abcdefg...");
        assert_eq!(sample("abcdefghij", 10), "abcdefghij");
    }

    #[test]
    fn test_describe_walks_backtrace() {
        let file = source("(swap a b)\n(let tmp a)");
        let call_site = Provenance::new(file.clone(), Span::new(0, 10));
        let expanded = SourceId::expansion(ExpansionOf {
            origin: file,
            macro_name: "swap".to_string(),
            call_site,
        });
        let prov = Provenance::new(expanded, Span::new(11, 22));
        let rendered = prov.describe("unbound name", 20);
        assert_eq!(
            rendered,
            "test.ql:2:1: unbound name\n  \"(let tmp a)\"\n  in expansion of test.ql:1:1: \"(swap a b)\" (macro \"swap\")\n"
        );
    }

    #[test]
    fn test_source_identity() {
        let first = source("x");
        let second = source("x");
        assert_eq!(first, first.clone());
        assert_ne!(first, second);
    }
}
