//! String interning for identifier text
//!
//! The interner is process-wide: names are interned once and live for the
//! whole compilation, so resolving a [`Name`] hands back a `&'static str` and
//! syntax nodes can render themselves without threading an interner through
//! every call.

pub use lasso::Spur as Name;
use lasso::ThreadedRodeo;
use std::sync::LazyLock;

static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::new);

/// Intern `text`, returning its stable handle
pub fn intern(text: &str) -> Name {
    INTERNER.get_or_intern(text)
}

/// Intern a string that already lives for the whole process
pub fn intern_static(text: &'static str) -> Name {
    INTERNER.get_or_intern_static(text)
}

/// Handle for `text` if it has been interned before
pub fn get(text: &str) -> Option<Name> {
    INTERNER.get(text)
}

/// Text behind `name`
pub fn resolve(name: Name) -> &'static str {
    INTERNER.resolve(&name)
}
