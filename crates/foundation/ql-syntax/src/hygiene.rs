//! Hygiene marks and marked names

use ql_intern::Name;
use std::fmt;
use std::iter;
use std::num::NonZeroU64;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MARK: AtomicU64 = AtomicU64::new(1);

/// Token minted once per macro expansion event
///
/// Marks compare by identity only. There is no ordering between them.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Mark(NonZeroU64);

impl Mark {
    /// Mint a mark distinct from every other mark in the process
    pub fn fresh() -> Self {
        let raw = NEXT_MARK.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }
}

impl fmt::Debug for Mark {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "Mark#{}", self.0)
    }
}

/// Marks on a name, outermost (most recent renaming) first
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Marks(Option<Arc<[Mark]>>);

impl Marks {
    /// No marks
    pub fn none() -> Self {
        Self(None)
    }

    /// Whether no renaming has been applied
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Marks in order, outermost first
    pub fn as_slice(&self) -> &[Mark] {
        self.0.as_deref().unwrap_or_default()
    }

    /// The most recent mark
    pub fn outermost(&self) -> Option<Mark> {
        self.as_slice().first().copied()
    }

    /// These marks with `mark` applied on the outside
    #[must_use]
    pub fn with_outer(&self, mark: Mark) -> Self {
        let marks: Vec<Mark> = iter::once(mark)
            .chain(self.as_slice().iter().copied())
            .collect();
        Self(Some(marks.into()))
    }

    /// These marks with the outermost one removed
    #[must_use]
    pub fn without_outermost(&self) -> Self {
        match self.as_slice() {
            [] | [_] => Self::none(),
            [_, rest @ ..] => Self(Some(rest.into())),
        }
    }
}

impl fmt::Debug for Marks {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.as_slice()).finish()
    }
}

/// How two names are compared during lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Text and the full mark sequence must match
    #[default]
    Normal,
    /// Only the text must match
    StripMarks,
}

/// Identifier text plus the hygienic renamings applied to it
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SymbolName {
    text: Name,
    marks: Marks,
}

impl SymbolName {
    /// An unmarked name
    pub fn new(text: &str) -> Self {
        Self::from_name(ql_intern::intern(text))
    }

    /// An unmarked name from an interned handle
    pub fn from_name(text: Name) -> Self {
        Self {
            text,
            marks: Marks::none(),
        }
    }

    /// A name with explicit marks
    pub fn with_marks(text: Name, marks: Marks) -> Self {
        Self { text, marks }
    }

    /// Interned text
    pub fn name(&self) -> Name {
        self.text
    }

    /// Text without marks
    pub fn text(&self) -> &'static str {
        ql_intern::resolve(self.text)
    }

    /// Applied marks
    pub fn marks(&self) -> &Marks {
        &self.marks
    }

    /// Whether any mark has been applied
    pub fn is_marked(&self) -> bool {
        !self.marks.is_empty()
    }

    /// This name renamed by one more expansion
    #[must_use]
    pub fn add_mark(&self, mark: Mark) -> Self {
        Self {
            text: self.text,
            marks: self.marks.with_outer(mark),
        }
    }

    /// This name with its most recent renaming undone
    #[must_use]
    pub fn strip_outer(&self) -> Self {
        Self {
            text: self.text,
            marks: self.marks.without_outermost(),
        }
    }

    /// This name with all marks removed
    #[must_use]
    pub fn stripped(&self) -> Self {
        Self::from_name(self.text)
    }

    /// Compare under `strategy`
    pub fn matches(&self, other: &Self, strategy: Strategy) -> bool {
        match strategy {
            Strategy::Normal => self == other,
            Strategy::StripMarks => self.text == other.text,
        }
    }
}

impl From<&str> for SymbolName {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl fmt::Display for SymbolName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.text())
    }
}

impl fmt::Debug for SymbolName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.text())?;
        for mark in self.marks.as_slice() {
            write!(formatter, "'{}", mark.0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marks_are_unique() {
        let first = Mark::fresh();
        let second = Mark::fresh();
        assert_ne!(first, second);
        assert_eq!(first, first);
    }

    #[test]
    fn test_mark_sensitive_equality() {
        let plain = SymbolName::new("x");
        let marked = plain.add_mark(Mark::fresh());
        let other = plain.add_mark(Mark::fresh());

        assert!(!plain.matches(&marked, Strategy::Normal));
        assert!(!marked.matches(&other, Strategy::Normal));
        assert!(plain.matches(&marked, Strategy::StripMarks));
        assert!(marked.matches(&other, Strategy::StripMarks));
        assert!(!plain.matches(&SymbolName::new("y"), Strategy::StripMarks));
    }

    #[test]
    fn test_marks_outermost_first() {
        let inner = Mark::fresh();
        let outer = Mark::fresh();
        let name = SymbolName::new("tmp").add_mark(inner).add_mark(outer);
        assert_eq!(name.marks().as_slice(), &[outer, inner]);
        assert_eq!(name.marks().outermost(), Some(outer));

        let once = name.strip_outer();
        assert_eq!(once.marks().as_slice(), &[inner]);
        assert_eq!(once.strip_outer(), SymbolName::new("tmp"));
        assert_eq!(name.stripped(), SymbolName::new("tmp"));
    }
}
