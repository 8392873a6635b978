//! Syntax trees for a macro-extensible front end
//!
//! Everything the front end reads or produces is a [`SyntaxNode`]: an atom
//! (a possibly marked name), a compound with ordered parts and keyed flags,
//! an opaque [`Entity`] wrapping a semantic object, or a [`LazyForm`] whose
//! text is parsed only when something looks inside it.
//!
//! Nodes are immutable and shared. New compounds are built with a
//! [`Builder`] or from known lists with [`SyntaxNode::compound`], and whole
//! trees are re-homed under a fresh source identity with [`rewrite`].

pub mod builder;
pub mod entity;
pub mod error;
pub mod hygiene;
pub mod lazy;
pub mod node;
pub mod reader;
pub mod render;
pub mod rewrite;

pub use builder::Builder;
pub use entity::{Entity, EntityTag};
pub use error::SyntaxError;
pub use hygiene::{Mark, Marks, Strategy, SymbolName};
pub use lazy::{Grammar, LazyForm, Replacement, Replacements, ReparseRequest};
pub use node::{Encoding, INLINE_MAX, NodeView, SyntaxNode};
pub use reader::Reader;
pub use rewrite::{RewriteAction, rewrite};
