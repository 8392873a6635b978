//! Symbols bound in scope chains

use crate::namespace::Namespace;
use crate::scope::ScopeChain;
use derive_more::Display;
use ql_span::Provenance;
use ql_syntax::{Entity, EntityTag, SymbolName, SyntaxNode};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_SYMBOL: AtomicU32 = AtomicU32::new(1);

/// Shared handle to a symbol
pub type SymbolRef = Arc<Symbol>;

/// Unique id of a symbol, used to tell same-named symbols apart
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash)]
pub struct SymbolId(u32);

/// What a symbol can be used as
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// A variable
    #[display("variable")]
    Variable,
    /// A function
    #[display("function")]
    Function,
    /// A type
    #[display("type")]
    Type,
    /// A macro
    #[display("macro")]
    Macro,
    /// A module with its own scope chain
    #[display("module")]
    Module,
    /// A namespace object selected with the backtick form
    #[display("namespace")]
    InnerNamespace,
    /// A name whose target is re-pointed by fluid rebinding
    #[display("fluid binding")]
    FluidBinding,
    /// A label
    #[display("label")]
    Label,
    /// Anything else
    #[display("symbol")]
    Other,
}

#[derive(Clone)]
enum Detail {
    Plain,
    Module(ScopeChain),
    InnerNamespace(Namespace),
    FluidBinding(SymbolName),
}

/// A named, classified definition
pub struct Symbol {
    id: SymbolId,
    name: SymbolName,
    namespace: Namespace,
    kind: SymbolKind,
    detail: Detail,
    payload: Option<Arc<dyn Any + Send + Sync>>,
    provenance: Provenance,
}

impl Symbol {
    fn with_detail(kind: SymbolKind, name: SymbolName, namespace: Namespace, detail: Detail) -> Self {
        Self {
            id: SymbolId(NEXT_SYMBOL.fetch_add(1, Ordering::Relaxed)),
            name,
            namespace,
            kind,
            detail,
            payload: None,
            provenance: Provenance::unknown(),
        }
    }

    /// A plain symbol of `kind`
    pub fn new(kind: SymbolKind, name: SymbolName, namespace: Namespace) -> Self {
        Self::with_detail(kind, name, namespace, Detail::Plain)
    }

    /// A module whose members are bound in `scope`
    pub fn module(name: SymbolName, scope: ScopeChain) -> Self {
        Self::with_detail(
            SymbolKind::Module,
            name,
            Namespace::outer(),
            Detail::Module(scope),
        )
    }

    /// A namespace object that selects `target`
    pub fn inner_namespace(name: SymbolName, target: Namespace) -> Self {
        Self::with_detail(
            SymbolKind::InnerNamespace,
            name,
            Namespace::inner(),
            Detail::InnerNamespace(target),
        )
    }

    /// A fluid binding; `(fluid name)` resolves `rebind` instead
    pub fn fluid_binding(name: SymbolName, namespace: Namespace, rebind: SymbolName) -> Self {
        Self::with_detail(
            SymbolKind::FluidBinding,
            name,
            namespace,
            Detail::FluidBinding(rebind),
        )
    }

    /// Attach an arbitrary payload, such as a macro definition
    #[must_use]
    pub fn with_payload<T: Any + Send + Sync>(mut self, payload: T) -> Self {
        self.payload = Some(Arc::new(payload));
        self
    }

    /// Record where the symbol was defined
    #[must_use]
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    /// Unique id
    pub fn id(&self) -> SymbolId {
        self.id
    }

    /// Bound name
    pub fn name(&self) -> &SymbolName {
        &self.name
    }

    /// Namespace the symbol is bound in
    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Kind
    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    /// Definition site
    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Members of a module
    pub fn module_scope(&self) -> Option<&ScopeChain> {
        match &self.detail {
            Detail::Module(scope) => Some(scope),
            _ => None,
        }
    }

    /// Namespace selected by an inner-namespace symbol
    pub fn inner_namespace_target(&self) -> Option<Namespace> {
        match &self.detail {
            Detail::InnerNamespace(target) => Some(*target),
            _ => None,
        }
    }

    /// Current rebinding target of a fluid binding
    pub fn fluid_rebind(&self) -> Option<&SymbolName> {
        match &self.detail {
            Detail::FluidBinding(rebind) => Some(rebind),
            _ => None,
        }
    }

    /// Payload as `T`
    pub fn payload<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.payload.as_ref()?.downcast_ref::<T>()
    }

    /// Short unique label, `name$id`
    pub fn unique_label(&self) -> String {
        format!("{}${}", self.name, self.id)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Symbol")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} {}", self.kind, self.unique_label())
    }
}

/// An entity node standing for an already resolved symbol
pub fn symbol_entity(symbol: &SymbolRef, provenance: Provenance) -> SyntaxNode {
    let payload: Arc<dyn Any + Send + Sync> = Arc::clone(symbol) as Arc<dyn Any + Send + Sync>;
    let entity = Entity::from_shared(EntityTag::Symbol, payload).with_label(symbol.unique_label());
    SyntaxNode::entity(entity, provenance)
}

/// An entity node standing for a name to be resolved later
pub fn key_entity(name: SymbolName, provenance: Provenance) -> SyntaxNode {
    let label = format!("{name:?}");
    SyntaxNode::entity(Entity::new(EntityTag::SymbolKey, name).with_label(label), provenance)
}
