//! Scope chains and symbol tables
//!
//! A [`ScopeChain`] is a persistent singly linked list of bindings, innermost
//! first. Adding a binding never disturbs existing chains, so a chain
//! captured at a macro's definition site stays valid however much the
//! caller's chain grows afterwards. A [`SymbolTable`] tracks the current
//! scope as the pair `front` (newest binding) and `back` (the chain as it was
//! when the scope was opened).

use crate::error::ResolveError;
use crate::namespace::Namespace;
use crate::symbol::SymbolRef;
use ql_syntax::{Strategy, SymbolName};
use std::fmt;
use std::ptr;
use std::sync::Arc;

/// One binding in a scope chain
pub struct Binding {
    name: SymbolName,
    namespace: Namespace,
    symbol: SymbolRef,
    next: ScopeChain,
}

impl Binding {
    /// Name the symbol is bound under
    pub fn name(&self) -> &SymbolName {
        &self.name
    }

    /// Namespace of the binding
    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Bound symbol
    pub fn symbol(&self) -> &SymbolRef {
        &self.symbol
    }

    fn matches(&self, name: &SymbolName, namespace: Namespace, strategy: Strategy) -> bool {
        self.namespace == namespace && self.name.matches(name, strategy)
    }
}

impl Drop for Binding {
    // Unlink the tail one binding at a time; recursive drops overflow the
    // stack on long chains.
    fn drop(&mut self) {
        let mut next = self.next.0.take();
        while let Some(binding) = next {
            next = match Arc::try_unwrap(binding) {
                Ok(mut owned) => owned.next.0.take(),
                Err(_) => None,
            };
        }
    }
}

/// Persistent list of bindings, innermost first
#[derive(Clone, Default)]
pub struct ScopeChain(Option<Arc<Binding>>);

/// The chain with no bindings
pub static EMPTY_CHAIN: ScopeChain = ScopeChain(None);

impl ScopeChain {
    /// An empty chain
    pub fn new() -> Self {
        Self(None)
    }

    /// This chain with `symbol` bound under its own name and namespace
    #[must_use]
    pub fn bind(&self, symbol: SymbolRef) -> Self {
        let name = symbol.name().clone();
        let namespace = symbol.namespace();
        self.bind_as(name, namespace, symbol)
    }

    /// This chain with `symbol` bound under `name` in `namespace`
    #[must_use]
    pub fn bind_as(&self, name: SymbolName, namespace: Namespace, symbol: SymbolRef) -> Self {
        Self(Some(Arc::new(Binding {
            name,
            namespace,
            symbol,
            next: self.clone(),
        })))
    }

    /// Whether the chain has no bindings
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Whether both chains start at the same binding
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Some(left), Some(right)) => Arc::ptr_eq(left, right),
            (None, None) => true,
            _ => false,
        }
    }

    /// Bindings from innermost outwards
    pub fn iter(&self) -> Bindings<'_> {
        self.iter_until(&EMPTY_CHAIN)
    }

    /// Bindings from innermost outwards, stopping before `stop`
    pub fn iter_until<'a>(&'a self, stop: &'a Self) -> Bindings<'a> {
        Bindings {
            current: self.0.as_deref(),
            stop: stop.0.as_deref(),
        }
    }

    /// First binding of `name` in `namespace` before `stop`
    pub fn find<'a>(
        &'a self,
        stop: &'a Self,
        name: &SymbolName,
        namespace: Namespace,
        strategy: Strategy,
    ) -> Option<&'a SymbolRef> {
        self.iter_until(stop)
            .find(|binding| binding.matches(name, namespace, strategy))
            .map(Binding::symbol)
    }
}

impl fmt::Debug for ScopeChain {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_list()
            .entries(self.iter().map(Binding::name))
            .finish()
    }
}

/// Iterator over a chain's bindings
pub struct Bindings<'a> {
    current: Option<&'a Binding>,
    stop: Option<&'a Binding>,
}

impl<'a> Iterator for Bindings<'a> {
    type Item = &'a Binding;

    fn next(&mut self) -> Option<Self::Item> {
        let binding = self.current?;
        if self.stop.is_some_and(|stop| ptr::eq(stop, binding)) {
            self.current = None;
            return None;
        }
        self.current = binding.next.0.as_deref();
        Some(binding)
    }
}

/// The bindings visible at one point, with the bounds of the current scope
#[derive(Clone, Default, Debug)]
pub struct SymbolTable {
    front: ScopeChain,
    back: ScopeChain,
}

impl SymbolTable {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// A table whose current scope opens on top of `chain`
    pub fn on_top_of(chain: ScopeChain) -> Self {
        Self {
            front: chain.clone(),
            back: chain,
        }
    }

    /// Newest binding
    pub fn front(&self) -> &ScopeChain {
        &self.front
    }

    /// Where the current scope began
    pub fn back(&self) -> &ScopeChain {
        &self.back
    }

    /// A nested scope seeing everything this one does
    #[must_use]
    pub fn new_scope(&self) -> Self {
        Self::on_top_of(self.front.clone())
    }

    /// Bind `symbol` in the current scope
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::DuplicateDefinition`] if the current scope
    /// already binds the same name in the same namespace.
    pub fn add(&mut self, symbol: SymbolRef) -> Result<(), ResolveError> {
        if let Some(previous) =
            self.front
                .find(&self.back, symbol.name(), symbol.namespace(), Strategy::Normal)
        {
            return Err(ResolveError::DuplicateDefinition {
                name: symbol.name().to_string(),
                namespace: symbol.namespace(),
                provenance: symbol.provenance().clone(),
                previous: previous.provenance().clone(),
            });
        }
        self.front = self.front.bind(symbol);
        Ok(())
    }

    /// Bind `symbol` under another name, shadowing freely
    pub fn alias(&mut self, name: SymbolName, namespace: Namespace, symbol: SymbolRef) {
        self.front = self.front.bind_as(name, namespace, symbol);
    }

    /// Whether the current scope binds `name` in `namespace`
    pub fn exists_this_scope(&self, name: &SymbolName, namespace: Namespace) -> bool {
        self.front
            .find(&self.back, name, namespace, Strategy::Normal)
            .is_some()
    }

    /// Whether `name` is visible in `namespace` from this table
    pub fn exists(&self, name: &SymbolName, namespace: Namespace) -> bool {
        self.front
            .find(&EMPTY_CHAIN, name, namespace, Strategy::Normal)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{Symbol, SymbolKind};

    fn var(text: &str) -> SymbolRef {
        Arc::new(Symbol::new(SymbolKind::Variable, SymbolName::new(text), Namespace::default()))
    }

    #[test]
    fn test_chain_is_persistent() {
        let base = ScopeChain::new().bind(var("x"));
        let extended = base.bind(var("y"));
        let names: Vec<_> = extended.iter().map(|binding| binding.name().text()).collect();
        assert_eq!(names, ["y", "x"]);
        assert_eq!(base.iter().count(), 1);
    }

    #[test]
    fn test_iter_until_excludes_stop() {
        let outer = ScopeChain::new().bind(var("x"));
        let inner = outer.bind(var("y")).bind(var("z"));
        let names: Vec<_> = inner
            .iter_until(&outer)
            .map(|binding| binding.name().text())
            .collect();
        assert_eq!(names, ["z", "y"]);
    }

    #[test]
    fn test_long_chain_drops() {
        let symbol = var("x");
        let mut chain = ScopeChain::new();
        for _ in 0..300_000 {
            chain = chain.bind(Arc::clone(&symbol));
        }
        let shared_tail = chain.clone();
        chain = chain.bind(var("y"));
        drop(chain);
        assert_eq!(shared_tail.iter().count(), 300_000);
        drop(shared_tail);
        assert_eq!(Arc::strong_count(&symbol), 1);
    }

    #[test]
    fn test_duplicate_in_same_scope() {
        let mut table = SymbolTable::new();
        assert!(table.add(var("x")).is_ok());
        assert!(matches!(
            table.add(var("x")),
            Err(ResolveError::DuplicateDefinition { .. })
        ));

        let mut nested = table.new_scope();
        assert!(!nested.exists_this_scope(&SymbolName::new("x"), Namespace::default()));
        assert!(nested.exists(&SymbolName::new("x"), Namespace::default()));
        assert!(nested.add(var("x")).is_ok());
        assert!(nested.exists_this_scope(&SymbolName::new("x"), Namespace::default()));
    }

    #[test]
    fn test_namespaces_are_separate() {
        let mut table = SymbolTable::new();
        let tag = Arc::new(Symbol::new(SymbolKind::Type, SymbolName::new("point"), Namespace::tag()));
        assert!(table.add(var("point")).is_ok());
        assert!(table.add(tag).is_ok());
        assert!(table.exists(&SymbolName::new("point"), Namespace::tag()));
        assert!(!table.exists(&SymbolName::new("point"), Namespace::label()));
    }
}
