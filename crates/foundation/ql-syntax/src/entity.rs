//! Opaque semantic payloads embedded in syntax

use derive_more::Display;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Kind of object an [`Entity`] wraps
///
/// The discriminants are stable codes so that later passes can test an
/// entity's kind without downcasting.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum EntityTag {
    /// A recorded error
    #[display("error")]
    Error = 0x1FF,
    /// A resolved symbol
    #[display("symbol")]
    Symbol = 0x2FF,
    /// A symbol-name key standing in for a symbol
    #[display("key")]
    SymbolKey = 0x3FF,
    /// A checked expression
    #[display("exp")]
    Expression = 0x401,
    /// A checked statement
    #[display("stmt")]
    Statement = 0x402,
    /// A type
    #[display("type")]
    Type = 0x5FF,
    /// A handle to a declaration
    #[display("decl")]
    DeclHandle = 0x7FF,
}

impl EntityTag {
    /// Numeric code of the tag
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// A tagged, shared handle to a semantic object
///
/// Entities are never inspected structurally by the syntax layer. Copies
/// share the same payload, so identity survives rewriting.
#[derive(Clone)]
pub struct Entity {
    tag: EntityTag,
    payload: Arc<dyn Any + Send + Sync>,
    label: Option<String>,
}

impl Entity {
    /// Wrap `payload` under `tag`
    pub fn new<T: Any + Send + Sync>(tag: EntityTag, payload: T) -> Self {
        Self::from_shared(tag, Arc::new(payload))
    }

    /// Wrap an already shared payload
    pub fn from_shared(tag: EntityTag, payload: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            tag,
            payload,
            label: None,
        }
    }

    /// Attach a short label shown when the node is rendered
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Kind of payload
    pub fn tag(&self) -> EntityTag {
        self.tag
    }

    /// Rendering label, if any
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The payload as `T`, if the tag is `tag` and the payload has that type
    pub fn get<T: Any + Send + Sync>(&self, tag: EntityTag) -> Option<Arc<T>> {
        if self.tag != tag {
            return None;
        }
        Arc::clone(&self.payload).downcast::<T>().ok()
    }

    /// Borrow the payload as `T`, if the tag is `tag` and the payload has that type
    pub fn get_ref<T: Any + Send + Sync>(&self, tag: EntityTag) -> Option<&T> {
        if self.tag != tag {
            return None;
        }
        self.payload.downcast_ref::<T>()
    }

    /// Whether both entities share one payload
    pub fn same_payload(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Entity")
            .field("tag", &self.tag)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(formatter, "(<{}: {label}>)", self.tag),
            None => write!(formatter, "(<{}>)", self.tag),
        }
    }
}
