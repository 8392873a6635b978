//! Error types for symbol resolution

use crate::namespace::Namespace;
use crate::symbol::SymbolKind;
use miette::Diagnostic;
use ql_span::Provenance;
use ql_syntax::SyntaxError;
use thiserror::Error;

/// Errors that occur while resolving a reference
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum ResolveError {
    /// Nothing visible matches the reference
    #[error("symbol not found: `{name}`")]
    #[diagnostic(code(resolve::symbol_not_found))]
    SymbolNotFound {
        /// Rendered reference
        name: String,
        /// Namespace that was searched
        namespace: Namespace,
        /// Range of the reference
        provenance: Provenance,
    },

    /// The reference resolved to a symbol of the wrong kind
    #[error("wrong kind of symbol: expected {expected}, found {found} `{name}`")]
    #[diagnostic(code(resolve::wrong_symbol_kind))]
    WrongSymbolKind {
        /// Rendered reference
        name: String,
        /// Kind the caller asked for
        expected: SymbolKind,
        /// Kind that was found
        found: SymbolKind,
        /// Range of the reference
        provenance: Provenance,
    },

    /// A qualified, fluid or namespace form had the wrong shape
    #[error("malformed `{form}` form: {message}")]
    #[diagnostic(code(resolve::malformed_form))]
    MalformedForm {
        /// Head of the form
        form: String,
        /// What was expected
        message: String,
        /// Range of the form
        provenance: Provenance,
    },

    /// A scope already binds the name
    #[error("`{name}` is already defined in namespace `{namespace}`")]
    #[diagnostic(code(resolve::duplicate_definition))]
    DuplicateDefinition {
        /// Name being defined
        name: String,
        /// Namespace of both definitions
        namespace: Namespace,
        /// Second definition
        provenance: Provenance,
        /// First definition
        previous: Provenance,
    },

    /// A deferred form could not be forced
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] SyntaxError),
}

impl ResolveError {
    /// Whether a soft lookup may turn this error into an absent result
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SymbolNotFound { .. })
    }

    /// Range the error points at
    pub fn provenance(&self) -> &Provenance {
        match self {
            Self::SymbolNotFound { provenance, .. }
            | Self::WrongSymbolKind { provenance, .. }
            | Self::MalformedForm { provenance, .. }
            | Self::DuplicateDefinition { provenance, .. } => provenance,
            Self::Syntax(error) => error.provenance(),
        }
    }

    /// Message with location, sample, and expansion backtrace
    pub fn render(&self, sample_len: usize) -> String {
        self.provenance().describe(&self.to_string(), sample_len)
    }
}
