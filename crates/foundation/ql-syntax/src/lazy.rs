//! Deferred reparse of bracketed regions
//!
//! A [`LazyForm`] remembers a region of source text and the grammar
//! production that should be used to parse it, but only parses on first
//! structural access. The parse result is cached and parsing is serialised
//! per form, so the grammar succeeds at most once even when several threads
//! race to force the same form.

use crate::error::SyntaxError;
use crate::node::SyntaxNode;
use ql_span::Provenance;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Node to splice in place of one source sub-range when reparsing
#[derive(Clone, Debug)]
pub struct Replacement {
    /// Range of text the node stands in for
    pub range: Provenance,
    /// Already-built node to use instead of parsing the range
    pub node: SyntaxNode,
}

/// Shared list of [`Replacement`]s
#[derive(Clone, Debug, Default)]
pub struct Replacements(Arc<[Replacement]>);

impl Replacements {
    /// Wrap a list of replacements
    pub fn new(replacements: Vec<Replacement>) -> Self {
        Self(replacements.into())
    }

    /// Node registered for exactly `range`
    pub fn find(&self, range: &Provenance) -> Option<&SyntaxNode> {
        self.0
            .iter()
            .find(|replacement| &replacement.range == range)
            .map(|replacement| &replacement.node)
    }

    /// All replacements
    pub fn iter(&self) -> impl Iterator<Item = &Replacement> {
        self.0.iter()
    }

    /// Number of replacements
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are none
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Replacement> for Replacements {
    fn from_iter<I: IntoIterator<Item = Replacement>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// What a grammar is asked to parse
#[derive(Debug, Clone, Copy)]
pub struct ReparseRequest<'a> {
    /// Production name
    pub production: &'a str,
    /// Text to parse
    pub range: &'a Provenance,
    /// Nodes to substitute for matching sub-ranges
    pub replacements: Option<&'a Replacements>,
}

/// Parses a source range under a named production
pub trait Grammar: Send + Sync {
    /// Parse the requested range
    ///
    /// # Errors
    ///
    /// Returns an error if the text does not match the production or the
    /// production is unknown.
    fn parse(&self, request: &ReparseRequest<'_>) -> Result<SyntaxNode, SyntaxError>;
}

/// A bracketed source region parsed on demand
#[derive(Clone)]
pub struct LazyForm {
    what: SyntaxNode,
    production: Arc<str>,
    inner: Provenance,
    outer: Provenance,
    replacements: Option<Replacements>,
    grammar: Arc<dyn Grammar>,
    cached: Arc<OnceLock<SyntaxNode>>,
    parsing: Arc<Mutex<()>>,
}

impl LazyForm {
    /// Defer parsing `inner` under `production`
    ///
    /// `what` is the discriminator node that names the form before it is
    /// parsed and `outer` is the full bracketed range.
    pub fn new(
        what: SyntaxNode,
        production: &str,
        inner: Provenance,
        outer: Provenance,
        grammar: Arc<dyn Grammar>,
    ) -> Self {
        Self {
            what,
            production: production.into(),
            inner,
            outer,
            replacements: None,
            grammar,
            cached: Arc::new(OnceLock::new()),
            parsing: Arc::new(Mutex::new(())),
        }
    }

    /// Substitute `replacements` when parsing
    #[must_use]
    pub fn with_replacements(mut self, replacements: Option<Replacements>) -> Self {
        self.replacements = replacements;
        self
    }

    /// Discriminator node
    pub fn what(&self) -> &SyntaxNode {
        &self.what
    }

    /// Production the region parses as
    pub fn production(&self) -> &str {
        &self.production
    }

    /// Range of the region's contents
    pub fn inner(&self) -> &Provenance {
        &self.inner
    }

    /// Range of the region including its brackets
    pub fn outer(&self) -> &Provenance {
        &self.outer
    }

    /// Replacements supplied to the grammar
    pub fn replacements(&self) -> Option<&Replacements> {
        self.replacements.as_ref()
    }

    /// Parsed form, if it has been forced already
    pub fn cached(&self) -> Option<&SyntaxNode> {
        self.cached.get()
    }

    /// Parse the region, or return the cached result
    ///
    /// # Errors
    ///
    /// Returns [`SyntaxError::ParseDeferred`] if the grammar rejects the
    /// region. Failures are not cached.
    ///
    /// # Deadlocks
    ///
    /// Parsing holds this form's lock, which is not re-entrant. The grammar
    /// must not force the same form again (directly or through a node that
    /// shares its cache) while parsing it, or the calling thread blocks
    /// forever.
    pub fn instantiate(&self) -> Result<&SyntaxNode, SyntaxError> {
        if let Some(parsed) = self.cached.get() {
            return Ok(parsed);
        }
        let _guard = self.parsing.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(parsed) = self.cached.get() {
            return Ok(parsed);
        }
        tracing::trace!(production = %self.production, what = %self.what, "reparsing deferred form");
        let request = ReparseRequest {
            production: &self.production,
            range: &self.inner,
            replacements: self.replacements.as_ref(),
        };
        let parsed = self
            .grammar
            .parse(&request)
            .map_err(|error| SyntaxError::ParseDeferred {
                production: self.production.to_string(),
                reason: error.to_string(),
                provenance: self.outer.clone(),
            })?;
        Ok(self.cached.get_or_init(|| parsed))
    }

    /// Like [`instantiate`](Self::instantiate) but absent on failure
    pub fn instantiate_no_throw(&self) -> Option<&SyntaxNode> {
        self.instantiate().ok()
    }

    /// Same region with a new discriminator, new replacements and an empty cache
    pub(crate) fn retargeted(&self, what: SyntaxNode, replacements: Option<Replacements>) -> Self {
        Self {
            what,
            production: Arc::clone(&self.production),
            inner: self.inner.clone(),
            outer: self.outer.clone(),
            replacements,
            grammar: Arc::clone(&self.grammar),
            cached: Arc::new(OnceLock::new()),
            parsing: Arc::new(Mutex::new(())),
        }
    }
}

impl fmt::Debug for LazyForm {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("LazyForm")
            .field("what", &self.what)
            .field("production", &self.production)
            .field("outer", &self.outer)
            .field("cached", &self.cached.get())
            .finish_non_exhaustive()
    }
}
