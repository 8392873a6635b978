//! Namespaces that partition the symbol space

use ql_intern::Name;
use std::fmt;

/// A namespace keyed by name
///
/// The same text may be bound independently in different namespaces: a
/// struct tag and a variable may share a name, and modules live apart from
/// ordinary definitions.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(Name);

impl Namespace {
    /// Namespace named `text`
    pub fn new(text: &str) -> Self {
        Self(ql_intern::intern(text))
    }

    /// Ordinary definitions: variables, functions, types, macros
    pub fn default_ns() -> Self {
        Self::new("default")
    }

    /// Modules and other outer-level containers
    pub fn outer() -> Self {
        Self::new("outer")
    }

    /// Inner-namespace objects named by the backtick form
    pub fn inner() -> Self {
        Self::new("inner")
    }

    /// Struct, union and enum tags
    pub fn tag() -> Self {
        Self::new("tag")
    }

    /// Labels
    pub fn label() -> Self {
        Self::new("label")
    }

    /// Name of the namespace
    pub fn text(self) -> &'static str {
        ql_intern::resolve(self.0)
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::default_ns()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.text())
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "Namespace({})", self.text())
    }
}
