//! Reference resolution over scope chains

use crate::error::ResolveError;
use crate::namespace::Namespace;
use crate::scope::{EMPTY_CHAIN, ScopeChain, SymbolTable};
use crate::symbol::{Symbol, SymbolKind, SymbolRef};
use ql_syntax::{EntityTag, Mark, Strategy, SymbolName, SyntaxNode};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Where and how to look a reference up
#[derive(Debug, Clone, Copy)]
pub struct Query<'a> {
    /// Namespace of the reference
    pub namespace: Namespace,
    /// Innermost binding to search from
    pub start: &'a ScopeChain,
    /// Binding at which the search ends, exclusive; empty searches everything
    pub stop: &'a ScopeChain,
    /// How names are compared
    pub strategy: Strategy,
    /// Kind the result must have, if any
    pub want: Option<SymbolKind>,
}

impl<'a> Query<'a> {
    /// Search all of `start` in `namespace`
    pub fn new(namespace: Namespace, start: &'a ScopeChain) -> Self {
        Self {
            namespace,
            start,
            stop: &EMPTY_CHAIN,
            strategy: Strategy::Normal,
            want: None,
        }
    }

    /// Search everything visible from `table`
    pub fn in_table(namespace: Namespace, table: &'a SymbolTable) -> Self {
        Self::new(namespace, table.front())
    }

    /// Search only the current scope of `table`
    pub fn this_scope(namespace: Namespace, table: &'a SymbolTable) -> Self {
        Self::new(namespace, table.front()).until(table.back())
    }

    /// End the search before `stop`
    #[must_use]
    pub fn until(mut self, stop: &'a ScopeChain) -> Self {
        self.stop = stop;
        self
    }

    /// Compare names with `strategy`
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Require a symbol of `kind`
    #[must_use]
    pub fn wanting(mut self, kind: SymbolKind) -> Self {
        self.want = Some(kind);
        self
    }

    fn bounded(&self) -> bool {
        !self.stop.is_empty()
    }
}

/// Resolves references to symbols
///
/// Beyond the scope chain handed to each query, the resolver remembers the
/// definition-site chain of every hygiene mark it has been told about. A
/// marked name that is not bound where it is used is looked up again, with
/// its newest mark removed, where the macro that introduced it was defined.
#[derive(Debug, Default)]
pub struct Resolver {
    mark_envs: FxHashMap<Mark, ScopeChain>,
}

impl Resolver {
    /// A resolver with no mark environments
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember that names marked with `mark` were written where `env` is
    /// visible
    pub fn bind_mark(&mut self, mark: Mark, env: ScopeChain) {
        self.mark_envs.insert(mark, env);
    }

    /// Definition-site chain of `mark`
    pub fn mark_env(&self, mark: Mark) -> Option<&ScopeChain> {
        self.mark_envs.get(&mark)
    }

    /// Resolve `node`, failing if nothing matches
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::SymbolNotFound`] if nothing matches, and any
    /// error raised while resolving the parts of a compound reference.
    pub fn lookup(&self, node: &SyntaxNode, query: &Query<'_>) -> Result<SymbolRef, ResolveError> {
        match self.lookup_symbol(node, query)? {
            Some(symbol) => Ok(symbol),
            None => {
                tracing::debug!(reference = %node, namespace = %query.namespace, "symbol not found");
                Err(ResolveError::SymbolNotFound {
                    name: node.to_string(),
                    namespace: query.namespace,
                    provenance: node.provenance().clone(),
                })
            }
        }
    }

    /// Resolve `node`, turning "not found" into `None`
    ///
    /// # Errors
    ///
    /// Returns every error except [`ResolveError::SymbolNotFound`].
    pub fn find(&self, node: &SyntaxNode, query: &Query<'_>) -> Result<Option<SymbolRef>, ResolveError> {
        match self.lookup(node, query) {
            Ok(symbol) => Ok(Some(symbol)),
            Err(error) if error.is_not_found() => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Whether `node` resolves to anything
    ///
    /// # Errors
    ///
    /// Returns every error except [`ResolveError::SymbolNotFound`].
    pub fn exists(&self, node: &SyntaxNode, query: &Query<'_>) -> Result<bool, ResolveError> {
        Ok(self.find(node, query)?.is_some())
    }

    fn lookup_symbol(
        &self,
        node: &SyntaxNode,
        query: &Query<'_>,
    ) -> Result<Option<SymbolRef>, ResolveError> {
        if let Some(name) = node.as_atom() {
            return self.lookup_name(name, query, node);
        }
        if let Some(entity) = node.as_entity() {
            if let Some(symbol) = entity.get::<Symbol>(EntityTag::Symbol) {
                return check_kind(symbol, query, node).map(Some);
            }
            if let Some(key) = entity.get_ref::<SymbolName>(EntityTag::SymbolKey) {
                return self.lookup_name(key, query, node);
            }
            return Ok(None);
        }
        if node.is_a("fluid") {
            let [target] = args::<1>(node, "fluid")?;
            let binding = self.lookup(target, &query.wanting(SymbolKind::FluidBinding))?;
            let Some(rebind) = binding.fluid_rebind() else {
                return Ok(None);
            };
            return self.lookup_name(rebind, query, target);
        }
        if node.is_a("`") {
            let [target, selector] = args::<2>(node, "`")?;
            let lookup_ns = Query::new(Namespace::inner(), query.start).wanting(SymbolKind::InnerNamespace);
            let selected = self.lookup(selector, &lookup_ns)?;
            let Some(namespace) = selected.inner_namespace_target() else {
                return Ok(None);
            };
            return self.lookup_symbol(target, &Query { namespace, ..*query });
        }
        if node.is_a("::") {
            let [module_ref, .., member] = node.args()? else {
                return Err(malformed(node, "::", "expected a module and a member"));
            };
            let module_query = Query {
                namespace: Namespace::outer(),
                want: Some(SymbolKind::Module),
                ..*query
            };
            let module = self.lookup(module_ref, &module_query)?;
            let Some(members) = module.module_scope() else {
                return Ok(None);
            };
            let member_query = Query {
                start: members,
                stop: &EMPTY_CHAIN,
                strategy: Strategy::StripMarks,
                ..*query
            };
            return self.lookup_symbol(member, &member_query);
        }
        Ok(None)
    }

    /// Look up a bare name, falling back to mark environments
    fn lookup_name(
        &self,
        name: &SymbolName,
        query: &Query<'_>,
        node: &SyntaxNode,
    ) -> Result<Option<SymbolRef>, ResolveError> {
        if let Some(symbol) = query.start.find(query.stop, name, query.namespace, query.strategy) {
            return check_kind(Arc::clone(symbol), query, node).map(Some);
        }
        if query.strategy != Strategy::Normal || query.bounded() {
            return Ok(None);
        }
        let Some(mark) = name.marks().outermost() else {
            return Ok(None);
        };
        let Some(env) = self.mark_envs.get(&mark) else {
            return Ok(None);
        };
        tracing::trace!(name = ?name, "retrying lookup in mark environment");
        let stripped = name.strip_outer();
        self.lookup_name(&stripped, &Query { start: env, ..*query }, node)
    }
}

fn check_kind(
    symbol: SymbolRef,
    query: &Query<'_>,
    node: &SyntaxNode,
) -> Result<SymbolRef, ResolveError> {
    match query.want {
        Some(expected) if expected != symbol.kind() => Err(ResolveError::WrongSymbolKind {
            name: node.to_string(),
            expected,
            found: symbol.kind(),
            provenance: node.provenance().clone(),
        }),
        _ => Ok(symbol),
    }
}

fn args<'a, const N: usize>(node: &'a SyntaxNode, form: &str) -> Result<&'a [SyntaxNode; N], ResolveError> {
    node.args()?
        .try_into()
        .map_err(|_| malformed(node, form, &format!("expected {N} argument(s)")))
}

fn malformed(node: &SyntaxNode, form: &str, message: &str) -> ResolveError {
    ResolveError::MalformedForm {
        form: form.to_string(),
        message: message.to_string(),
        provenance: node.provenance().clone(),
    }
}
