//! Integration test utilities for the front end
//!
//! [`Frontend`] strings the pieces together the way a driver would: read a
//! file, define and expand its macros, then resolve references against the
//! resulting scope.

use anyhow::{Context as _, Result};
use ql_expand::{ExpandError, FrontendConfig, MacroExpander};
use ql_resolve::{Namespace, Query, ResolveError, Resolver, Symbol, SymbolKind, SymbolRef, SymbolTable};
use ql_span::{FileId, SourceId};
use ql_syntax::{Reader, SymbolName, SyntaxNode};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// A reader, expander and top-level scope sharing one configuration
pub struct Frontend {
    /// Active configuration
    pub config: FrontendConfig,
    /// Expander holding macro mark environments
    pub expander: MacroExpander,
    /// Top-level scope
    pub table: SymbolTable,
    next_file: u32,
}

impl Frontend {
    /// A front end with the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(FrontendConfig::default())
    }

    /// A front end using `config`
    #[must_use]
    pub fn with_config(config: FrontendConfig) -> Self {
        Self {
            expander: MacroExpander::with_config(&config.expansion),
            config,
            table: SymbolTable::new(),
            next_file: 0,
        }
    }

    /// A front end configured from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid
    /// configuration
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Self::with_config(FrontendConfig::from_toml_str(&text)?))
    }

    /// Register source text under `name`
    pub fn add_source(&mut self, name: &str, text: &str) -> SourceId {
        let id = FileId::new(self.next_file);
        self.next_file += 1;
        SourceId::file(id, name, text)
    }

    /// Read a single datum
    ///
    /// # Errors
    ///
    /// Returns an error if the text is malformed
    pub fn read_one(&mut self, name: &str, text: &str) -> Result<SyntaxNode> {
        let source = self.add_source(name, text);
        Ok(Reader::read_one(&source)?)
    }

    /// Read a whole file, define its macros and expand everything else
    ///
    /// # Errors
    ///
    /// Returns the first read, definition or expansion error
    pub fn load_program(&mut self, name: &str, text: &str) -> Result<SyntaxNode, ExpandError> {
        let source = self.add_source(name, text);
        let program = Reader::read_all(&source)?;
        self.expander.expand_program(&program, &mut self.table)
    }

    /// Bind a plain symbol in the top-level scope
    ///
    /// # Errors
    ///
    /// Returns an error if the name is already bound there
    pub fn bind(&mut self, kind: SymbolKind, name: &str) -> Result<SymbolRef> {
        let symbol = Arc::new(Symbol::new(kind, SymbolName::new(name), Namespace::default()));
        self.table.add(Arc::clone(&symbol))?;
        Ok(symbol)
    }

    /// Resolver carrying every mark environment minted so far
    #[must_use]
    pub fn resolver(&self) -> &Resolver {
        self.expander.resolver()
    }

    /// Resolve `node` from `table` in the default namespace
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::SymbolNotFound`] if nothing matches
    pub fn lookup_in(&self, table: &SymbolTable, node: &SyntaxNode) -> Result<SymbolRef, ResolveError> {
        self.resolver()
            .lookup(node, &Query::in_table(Namespace::default(), table))
    }

    /// Resolve `node` from the top-level scope in the default namespace
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::SymbolNotFound`] if nothing matches
    pub fn lookup(&self, node: &SyntaxNode) -> Result<SymbolRef, ResolveError> {
        self.lookup_in(&self.table, node)
    }

    /// Render a resolution error with the configured sample length
    #[must_use]
    pub fn render_resolve(&self, error: &ResolveError) -> String {
        error.render(self.config.diagnostics.sample_len)
    }

    /// Render an expansion error with the configured sample length
    #[must_use]
    pub fn render_expand(&self, error: &ExpandError) -> String {
        error.render(self.config.diagnostics.sample_len)
    }
}

impl Default for Frontend {
    fn default() -> Self {
        Self::new()
    }
}

/// Top-level forms of an `(@ ...)` program, without the head
///
/// # Errors
///
/// Returns an error if the program is a deferred form that fails to parse
pub fn forms(program: &SyntaxNode) -> Result<Vec<SyntaxNode>> {
    Ok(program.args()?.to_vec())
}
