//! Macro expansion error types

use miette::Diagnostic;
use ql_resolve::ResolveError;
use ql_span::Provenance;
use ql_syntax::SyntaxError;
use thiserror::Error;

/// Error type for macro expansion
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum ExpandError {
    /// Expansions nested deeper than the configured limit
    #[error("macro recursion limit of {limit} exceeded expanding `{macro_name}`")]
    #[diagnostic(code(expand::recursion_limit), help("raise `expansion.max_depth` if this is intended"))]
    RecursionLimit {
        /// Macro being expanded when the limit was hit
        macro_name: String,
        /// Configured limit
        limit: usize,
        /// Call site
        provenance: Provenance,
    },

    /// Wrong number of arguments in a macro call
    #[error("macro `{macro_name}` takes {expected} argument(s) but {found} were given")]
    #[diagnostic(code(expand::arity_mismatch))]
    ArityMismatch {
        /// Macro name
        macro_name: String,
        /// Declared parameter count
        expected: usize,
        /// Arguments at the call site
        found: usize,
        /// Call site
        provenance: Provenance,
    },

    /// A `macro` form could not be turned into a definition
    #[error("invalid macro definition: {message}")]
    #[diagnostic(code(expand::invalid_definition))]
    InvalidDefinition {
        /// What was wrong
        message: String,
        /// The definition form
        provenance: Provenance,
    },

    /// Resolving a macro head failed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolve(#[from] ResolveError),

    /// Forcing a deferred form failed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] SyntaxError),

    /// The configuration document was rejected
    #[error("invalid configuration: {message}")]
    #[diagnostic(code(expand::config))]
    Config {
        /// Parser message
        message: String,
    },
}

impl ExpandError {
    /// Range the error points at, if any
    pub fn provenance(&self) -> Option<&Provenance> {
        match self {
            Self::RecursionLimit { provenance, .. }
            | Self::ArityMismatch { provenance, .. }
            | Self::InvalidDefinition { provenance, .. } => Some(provenance),
            Self::Resolve(error) => Some(error.provenance()),
            Self::Syntax(error) => Some(error.provenance()),
            Self::Config { .. } => None,
        }
    }

    /// Message with location, sample, and expansion backtrace
    pub fn render(&self, sample_len: usize) -> String {
        match self.provenance() {
            Some(provenance) => provenance.describe(&self.to_string(), sample_len),
            None => format!("{self}\n"),
        }
    }
}
