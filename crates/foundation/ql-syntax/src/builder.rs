//! Incremental compound construction

use crate::error::SyntaxError;
use crate::node::{INLINE_MAX, SyntaxNode, flag_key};
use ql_span::Provenance;

const START_CAPACITY: usize = 8;

/// Accumulates parts and flags before a compound is built
///
/// A builder is write-only: nothing can observe the node's layout until
/// [`build`](Self::build) consumes it.
#[derive(Debug, Clone)]
pub struct Builder {
    parts: Vec<SyntaxNode>,
    flags: Vec<SyntaxNode>,
    capacity: usize,
}

impl Builder {
    /// An empty builder
    pub fn new() -> Self {
        Self {
            parts: Vec::with_capacity(START_CAPACITY),
            flags: Vec::new(),
            capacity: START_CAPACITY,
        }
    }

    /// A builder seeded with the parts and flags of `node`
    ///
    /// # Errors
    ///
    /// Returns an error if `node` is a deferred form that fails to parse.
    pub fn from_node(node: &SyntaxNode) -> Result<Self, SyntaxError> {
        let mut builder = Self::new();
        builder.add_parts(node.parts()?.iter().cloned());
        builder.merge_flags(node.flags()?);
        Ok(builder)
    }

    /// Grow the shared budget by doubling until `extra` more children fit
    fn ensure_space(&mut self, extra: usize) {
        let needed = self.parts.len() + self.flags.len() + extra;
        if needed <= self.capacity {
            return;
        }
        while self.capacity < needed {
            self.capacity *= 2;
        }
        let spare = self.capacity - self.parts.len() - self.flags.len();
        self.parts.reserve(spare);
    }

    /// Append a positional child
    pub fn add_part(&mut self, part: SyntaxNode) {
        self.ensure_space(1);
        self.parts.push(part);
    }

    /// Append several positional children
    pub fn add_parts(&mut self, parts: impl IntoIterator<Item = SyntaxNode>) {
        let parts = parts.into_iter();
        self.ensure_space(parts.size_hint().0);
        for part in parts {
            self.add_part(part);
        }
    }

    /// Add a flag unless one with the same key is already present
    ///
    /// Returns whether the flag was added.
    pub fn add_flag(&mut self, flag: SyntaxNode) -> bool {
        let key = flag_key(&flag);
        if key.is_some() && self.flags.iter().any(|existing| flag_key(existing) == key) {
            return false;
        }
        self.ensure_space(1);
        self.flags.push(flag);
        true
    }

    /// Add every flag in `flags` whose key is not yet present
    pub fn merge_flags(&mut self, flags: &[SyntaxNode]) {
        for flag in flags {
            self.add_flag(flag.clone());
        }
    }

    /// Replace all flags
    pub fn set_flags(&mut self, flags: impl IntoIterator<Item = SyntaxNode>) {
        self.flags.clear();
        for flag in flags {
            self.add_flag(flag);
        }
    }

    /// Number of parts so far
    pub fn num_parts(&self) -> usize {
        self.parts.len()
    }

    /// Number of flags so far
    pub fn num_flags(&self) -> usize {
        self.flags.len()
    }

    /// Whether nothing has been added
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty() && self.flags.is_empty()
    }

    /// Build the compound
    ///
    /// Small nodes are copied into the inline layout; larger ones keep the
    /// builder's lists.
    pub fn build(self, provenance: Provenance) -> SyntaxNode {
        if self.parts.len() + self.flags.len() <= INLINE_MAX {
            SyntaxNode::inline(provenance, self.parts, self.flags)
        } else {
            SyntaxNode::growable(provenance, self.parts, self.flags)
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Extend<SyntaxNode> for Builder {
    fn extend<T: IntoIterator<Item = SyntaxNode>>(&mut self, iter: T) {
        self.add_parts(iter);
    }
}
