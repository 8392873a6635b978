//! Symbol resolution for the macro-extensible front end
//!
//! References are syntax nodes. A bare atom is looked up by name; an entity
//! may already carry its symbol; and three compound forms change how the
//! lookup proceeds:
//!
//! - `(fluid X)` resolves `X` to a fluid binding and then resolves that
//!   binding's current rebinding target instead.
//! - ``(` X NS)`` resolves `NS` to a namespace object and looks `X` up in
//!   the namespace it selects.
//! - `(:: M ... X)` resolves `M` as a module and looks the last segment up in
//!   the module's own scope, ignoring hygiene marks.
//!
//! Anything else matches nothing. [`Resolver::lookup`] turns that into
//! [`ResolveError::SymbolNotFound`]; [`Resolver::find`] returns `None`.

pub mod error;
pub mod namespace;
pub mod resolver;
pub mod scope;
pub mod symbol;

pub use error::ResolveError;
pub use namespace::Namespace;
pub use resolver::{Query, Resolver};
pub use scope::{Binding, EMPTY_CHAIN, ScopeChain, SymbolTable};
pub use symbol::{Symbol, SymbolId, SymbolKind, SymbolRef, key_entity, symbol_entity};
