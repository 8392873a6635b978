//! Syntax-layer errors

use miette::Diagnostic;
use ql_span::Provenance;
use thiserror::Error;

/// Errors raised while reading or reparsing syntax
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum SyntaxError {
    /// A deferred form could not be parsed under its production
    #[error("cannot parse deferred form as `{production}`: {reason}")]
    #[diagnostic(code(syntax::parse_deferred))]
    ParseDeferred {
        /// Production that was requested
        production: String,
        /// Why the grammar rejected the text
        reason: String,
        /// Outer range of the deferred form
        provenance: Provenance,
    },

    /// The reader rejected the input text
    #[error("{message}")]
    #[diagnostic(code(syntax::read))]
    Read {
        /// What went wrong
        message: String,
        /// Where it went wrong
        provenance: Provenance,
    },

    /// A node did not have the shape its head requires
    #[error("malformed `{form}` form: {message}")]
    #[diagnostic(code(syntax::malformed_form))]
    MalformedForm {
        /// Head of the offending form
        form: String,
        /// What was expected
        message: String,
        /// Range of the offending node
        provenance: Provenance,
    },
}

impl SyntaxError {
    /// Range the error points at
    pub fn provenance(&self) -> &Provenance {
        match self {
            Self::ParseDeferred { provenance, .. }
            | Self::Read { provenance, .. }
            | Self::MalformedForm { provenance, .. } => provenance,
        }
    }

    /// Message with location, sample, and expansion backtrace
    pub fn render(&self, sample_len: usize) -> String {
        self.provenance().describe(&self.to_string(), sample_len)
    }
}
