//! Immutable syntax nodes
//!
//! A [`SyntaxNode`] is a cheap, shared handle. Logically every node is an
//! atom, a compound (ordered parts plus keyed flags), an entity, or a lazy
//! form that becomes one of the others once forced. Physically compounds
//! come in three layouts picked at construction time; callers only ever see
//! the logical shape through [`SyntaxNode::view`].

use crate::builder::Builder;
use crate::entity::{Entity, EntityTag};
use crate::error::SyntaxError;
use crate::hygiene::{Mark, Strategy, SymbolName};
use crate::lazy::LazyForm;
use ql_intern::Name;
use ql_span::Provenance;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, OnceLock};

/// Most parts plus flags a compound can hold in the inline layout
pub const INLINE_MAX: usize = 15;

/// Physical layout of a node, for diagnostics and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// An atom
    Leaf,
    /// Compound whose part and flag counts are packed into one byte
    Inline,
    /// Compound with parts and flags in one exact-size buffer
    Packed,
    /// Compound built incrementally with separate growable lists
    Growable,
    /// An entity
    Entity,
    /// A deferred reparse
    Lazy,
}

/// Part and flag counts of an inline compound, four bits each
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InlineHeader(u8);

impl InlineHeader {
    fn new(parts: usize, flags: usize) -> Self {
        debug_assert!(parts + flags <= INLINE_MAX);
        Self(((parts as u8) << 4) | flags as u8)
    }

    fn parts(self) -> usize {
        usize::from(self.0 >> 4)
    }

    fn flags(self) -> usize {
        usize::from(self.0 & 0x0F)
    }
}

#[derive(Debug)]
enum Children {
    Inline {
        header: InlineHeader,
        items: Box<[SyntaxNode]>,
    },
    Packed {
        items: Box<[SyntaxNode]>,
        split: usize,
    },
    Growable {
        parts: Vec<SyntaxNode>,
        flags: Vec<SyntaxNode>,
    },
}

impl Children {
    fn from_known(mut parts: Vec<SyntaxNode>, flags: Vec<SyntaxNode>) -> Self {
        let split = parts.len();
        let flag_count = flags.len();
        parts.extend(flags);
        if split + flag_count <= INLINE_MAX {
            Self::Inline {
                header: InlineHeader::new(split, flag_count),
                items: parts.into_boxed_slice(),
            }
        } else {
            Self::Packed {
                items: parts.into_boxed_slice(),
                split,
            }
        }
    }

    fn parts(&self) -> &[SyntaxNode] {
        match self {
            Self::Inline { header, items } => &items[..header.parts()],
            Self::Packed { items, split } => &items[..*split],
            Self::Growable { parts, .. } => parts,
        }
    }

    fn flags(&self) -> &[SyntaxNode] {
        match self {
            Self::Inline { header, items } => {
                &items[header.parts()..header.parts() + header.flags()]
            }
            Self::Packed { items, split } => &items[*split..],
            Self::Growable { flags, .. } => flags,
        }
    }

    fn encoding(&self) -> Encoding {
        match self {
            Self::Inline { .. } => Encoding::Inline,
            Self::Packed { .. } => Encoding::Packed,
            Self::Growable { .. } => Encoding::Growable,
        }
    }

    /// Same layout, every child passed through `map`
    fn map(&self, mut map: impl FnMut(&SyntaxNode) -> SyntaxNode) -> Self {
        match self {
            Self::Inline { header, items } => Self::Inline {
                header: *header,
                items: items.iter().map(&mut map).collect(),
            },
            Self::Packed { items, split } => Self::Packed {
                items: items.iter().map(&mut map).collect(),
                split: *split,
            },
            Self::Growable { parts, flags } => Self::Growable {
                parts: parts.iter().map(&mut map).collect(),
                flags: flags.iter().map(&mut map).collect(),
            },
        }
    }
}

#[derive(Debug)]
enum Repr {
    Atom(SymbolName),
    Compound(Children),
    Entity(Entity),
    Lazy(LazyForm),
}

#[derive(Debug)]
struct NodeData {
    provenance: Provenance,
    computed: OnceLock<Provenance>,
    repr: Repr,
}

/// Logical shape of a node
#[derive(Debug, Clone, Copy)]
pub enum NodeView<'a> {
    /// A possibly marked name
    Atom(&'a SymbolName),
    /// Ordered parts and keyed flags
    Compound {
        /// Positional children
        parts: &'a [SyntaxNode],
        /// Keyed children
        flags: &'a [SyntaxNode],
    },
    /// An opaque semantic object
    Entity(&'a Entity),
}

static COMMON_ATOMS: LazyLock<FxHashMap<&'static str, SyntaxNode>> = LazyLock::new(|| {
    ["@", ".", "@{}", "id"]
        .into_iter()
        .map(|text| {
            let name = SymbolName::from_name(ql_intern::intern_static(text));
            (text, SyntaxNode::atom(name, Provenance::unknown()))
        })
        .collect()
});

static UNKNOWN_WHAT: LazyLock<SymbolName> = LazyLock::new(|| SymbolName::new("<unknown>"));
static ENTITY_WHAT: LazyLock<SymbolName> = LazyLock::new(|| SymbolName::new("<entity>"));

/// Shared, immutable syntax tree node
#[derive(Clone)]
pub struct SyntaxNode(Arc<NodeData>);

impl SyntaxNode {
    fn from_repr(provenance: Provenance, repr: Repr) -> Self {
        Self(Arc::new(NodeData {
            provenance,
            computed: OnceLock::new(),
            repr,
        }))
    }

    /// An atom
    pub fn atom(name: SymbolName, provenance: Provenance) -> Self {
        Self::from_repr(provenance, Repr::Atom(name))
    }

    /// An unmarked atom with no provenance
    ///
    /// The handful of atoms the front end builds constantly (`@`, `.`,
    /// `@{}` and `id`) come back as one shared node.
    pub fn atom_str(text: &str) -> Self {
        match COMMON_ATOMS.get(text) {
            Some(common) => common.clone(),
            None => Self::atom(SymbolName::new(text), Provenance::unknown()),
        }
    }

    /// A compound built from lists whose sizes are already known
    ///
    /// Flags whose key repeats an earlier flag are dropped. An empty
    /// `provenance` is computed from the parts on first request.
    pub fn compound(provenance: Provenance, parts: Vec<SyntaxNode>, flags: Vec<SyntaxNode>) -> Self {
        let flags = dedup_flags(flags);
        Self::from_repr(provenance, Repr::Compound(Children::from_known(parts, flags)))
    }

    /// A compound of `parts` with no flags and no explicit provenance
    pub fn list(parts: impl IntoIterator<Item = SyntaxNode>) -> Self {
        Self::compound(Provenance::unknown(), parts.into_iter().collect(), Vec::new())
    }

    pub(crate) fn growable(
        provenance: Provenance,
        parts: Vec<SyntaxNode>,
        flags: Vec<SyntaxNode>,
    ) -> Self {
        Self::from_repr(
            provenance,
            Repr::Compound(Children::Growable { parts, flags }),
        )
    }

    pub(crate) fn inline(
        provenance: Provenance,
        parts: Vec<SyntaxNode>,
        flags: Vec<SyntaxNode>,
    ) -> Self {
        Self::from_repr(provenance, Repr::Compound(Children::from_known(parts, flags)))
    }

    /// An entity node
    pub fn entity(entity: Entity, provenance: Provenance) -> Self {
        Self::from_repr(provenance, Repr::Entity(entity))
    }

    /// A deferred reparse, located at the form's outer range
    pub fn lazy(form: LazyForm) -> Self {
        let provenance = form.outer().clone();
        Self::from_repr(provenance, Repr::Lazy(form))
    }

    /// Physical layout
    pub fn encoding(&self) -> Encoding {
        match &self.0.repr {
            Repr::Atom(_) => Encoding::Leaf,
            Repr::Compound(children) => children.encoding(),
            Repr::Entity(_) => Encoding::Entity,
            Repr::Lazy(_) => Encoding::Lazy,
        }
    }

    /// Whether both handles refer to the same node
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the node, usable as an identity key
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// Provenance stored on the node itself
    pub fn explicit_provenance(&self) -> &Provenance {
        &self.0.provenance
    }

    /// Source range of the node
    ///
    /// A compound with an empty explicit range derives one from its parts,
    /// once. Parts with no source are skipped. When every remaining part
    /// shares a source the result covers all of them; if any part comes
    /// from a different source the node's own explicit range is used. A
    /// result with no source falls back to the first part's range.
    pub fn provenance(&self) -> &Provenance {
        let data = &*self.0;
        match &data.repr {
            Repr::Compound(children) if data.provenance.is_empty() => data
                .computed
                .get_or_init(|| compute_provenance(&data.provenance, children.parts())),
            _ => &data.provenance,
        }
    }

    /// The deferred form, if this node is one
    pub fn as_lazy(&self) -> Option<&LazyForm> {
        match &self.0.repr {
            Repr::Lazy(form) => Some(form),
            _ => None,
        }
    }

    /// Force a lazy node; any other node is returned as is
    ///
    /// # Errors
    ///
    /// Returns an error if a deferred form fails to parse.
    pub fn forced(&self) -> Result<&Self, SyntaxError> {
        match &self.0.repr {
            Repr::Lazy(form) => form.instantiate()?.forced(),
            _ => Ok(self),
        }
    }

    fn forced_no_throw(&self) -> Option<&Self> {
        match &self.0.repr {
            Repr::Lazy(form) => form.instantiate_no_throw()?.forced_no_throw(),
            _ => Some(self),
        }
    }

    /// Logical shape, forcing deferred forms
    ///
    /// # Errors
    ///
    /// Returns an error if a deferred form fails to parse.
    pub fn view(&self) -> Result<NodeView<'_>, SyntaxError> {
        Ok(self.forced()?.shallow_view())
    }

    /// Logical shape, or `None` if a deferred form fails to parse
    pub fn try_view(&self) -> Option<NodeView<'_>> {
        self.forced_no_throw().map(Self::shallow_view)
    }

    fn shallow_view(&self) -> NodeView<'_> {
        match &self.0.repr {
            Repr::Atom(name) => NodeView::Atom(name),
            Repr::Compound(children) => NodeView::Compound {
                parts: children.parts(),
                flags: children.flags(),
            },
            Repr::Entity(entity) => NodeView::Entity(entity),
            Repr::Lazy(_) => NodeView::Compound {
                parts: &[],
                flags: &[],
            },
        }
    }

    /// Whether the node is an atom; never raises
    pub fn is_simple(&self) -> bool {
        self.as_atom().is_some()
    }

    /// The atom's name, forcing deferred forms without raising
    pub fn as_atom(&self) -> Option<&SymbolName> {
        match self.try_view()? {
            NodeView::Atom(name) => Some(name),
            _ => None,
        }
    }

    /// The entity, if this is one
    pub fn as_entity(&self) -> Option<&Entity> {
        match &self.0.repr {
            Repr::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    /// Whether the node is an entity tagged `tag`
    pub fn is_entity(&self, tag: EntityTag) -> bool {
        self.as_entity().is_some_and(|entity| entity.tag() == tag)
    }

    /// Name identifying what kind of form this is
    ///
    /// An atom names itself; a compound is named by its first part when
    /// that part is an atom. Compounds led by anything else report
    /// `<unknown>`; empty compounds and entities have no name.
    pub fn what(&self) -> Option<&SymbolName> {
        match self.try_view() {
            Some(NodeView::Atom(name)) => Some(name),
            Some(NodeView::Compound { parts, .. }) => {
                let head = parts.first()?;
                Some(head.as_atom().unwrap_or(&UNKNOWN_WHAT))
            }
            Some(NodeView::Entity(_)) => None,
            None => self.as_lazy().and_then(|form| form.what().what()),
        }
    }

    /// Like [`what`](Self::what), but entities report `<entity>` and other
    /// nameless nodes `<unknown>`
    pub fn what_special(&self) -> &SymbolName {
        if self.as_entity().is_some() {
            return &ENTITY_WHAT;
        }
        self.what().unwrap_or(&UNKNOWN_WHAT)
    }

    /// Whether the form is named `text`, ignoring marks
    pub fn is_a(&self, text: &str) -> bool {
        self.what_special().text() == text
    }

    /// Whether the node is the atom `text`, ignoring marks
    pub fn atom_is(&self, text: &str) -> bool {
        self.as_atom().is_some_and(|name| name.text() == text)
    }

    /// Positional children; empty for atoms and entities
    ///
    /// # Errors
    ///
    /// Returns an error if a deferred form fails to parse.
    pub fn parts(&self) -> Result<&[SyntaxNode], SyntaxError> {
        Ok(match self.view()? {
            NodeView::Compound { parts, .. } => parts,
            NodeView::Atom(_) | NodeView::Entity(_) => &[],
        })
    }

    /// Keyed children; empty for atoms and entities
    ///
    /// # Errors
    ///
    /// Returns an error if a deferred form fails to parse.
    pub fn flags(&self) -> Result<&[SyntaxNode], SyntaxError> {
        Ok(match self.view()? {
            NodeView::Compound { flags, .. } => flags,
            NodeView::Atom(_) | NodeView::Entity(_) => &[],
        })
    }

    /// Number of parts
    ///
    /// # Errors
    ///
    /// Returns an error if a deferred form fails to parse.
    pub fn num_parts(&self) -> Result<usize, SyntaxError> {
        Ok(self.parts()?.len())
    }

    /// Number of parts after the head
    ///
    /// # Errors
    ///
    /// Returns an error if a deferred form fails to parse.
    pub fn num_args(&self) -> Result<usize, SyntaxError> {
        Ok(self.parts()?.len().saturating_sub(1))
    }

    /// Part at `index`
    ///
    /// # Errors
    ///
    /// Returns an error if a deferred form fails to parse.
    pub fn part(&self, index: usize) -> Result<Option<&SyntaxNode>, SyntaxError> {
        Ok(self.parts()?.get(index))
    }

    /// Parts after the head
    ///
    /// # Errors
    ///
    /// Returns an error if a deferred form fails to parse.
    pub fn args(&self) -> Result<&[SyntaxNode], SyntaxError> {
        Ok(self.parts()?.get(1..).unwrap_or_default())
    }

    /// Argument at `index`, counting from the part after the head
    ///
    /// # Errors
    ///
    /// Returns an error if a deferred form fails to parse.
    pub fn arg(&self, index: usize) -> Result<Option<&SyntaxNode>, SyntaxError> {
        Ok(self.args()?.get(index))
    }

    /// Flag whose key is `key`; marks on the key are ignored
    ///
    /// # Errors
    ///
    /// Returns an error if a deferred form fails to parse.
    pub fn flag(&self, key: &str) -> Result<Option<&SyntaxNode>, SyntaxError> {
        Ok(self
            .flags()?
            .iter()
            .find(|flag| flag_key(flag).is_some_and(|name| ql_intern::resolve(name) == key)))
    }

    /// Value of the flag `key`: its first argument, or the flag itself for a
    /// bare atom flag
    ///
    /// # Errors
    ///
    /// Returns an error if a deferred form fails to parse.
    pub fn flag_value(&self, key: &str) -> Result<Option<&SyntaxNode>, SyntaxError> {
        let Some(flag) = self.flag(key)? else {
            return Ok(None);
        };
        if flag.is_simple() {
            return Ok(Some(flag));
        }
        flag.arg(0)
    }

    /// The same atom renamed by `mark`; `None` for anything but an atom
    pub fn add_mark(&self, mark: Mark) -> Option<Self> {
        let name = self.as_atom()?;
        Some(Self::atom(
            name.add_mark(mark),
            self.explicit_provenance().clone(),
        ))
    }

    /// Copy of this compound with `flag` added unless its key is present
    ///
    /// # Errors
    ///
    /// Returns an error if a deferred form fails to parse.
    pub fn with_flag(&self, flag: Self) -> Result<Self, SyntaxError> {
        let mut builder = Builder::from_node(self)?;
        builder.add_flag(flag);
        Ok(builder.build(self.explicit_provenance().clone()))
    }

    /// Copy of this compound with its flags replaced by `flags`
    ///
    /// # Errors
    ///
    /// Returns an error if a deferred form fails to parse.
    pub fn with_flags(&self, flags: Vec<Self>) -> Result<Self, SyntaxError> {
        let mut builder = Builder::from_node(self)?;
        builder.set_flags(flags);
        Ok(builder.build(self.explicit_provenance().clone()))
    }

    /// Structural equality: atoms by name, compounds part by part and flag by
    /// flag, entities by shared payload
    ///
    /// # Errors
    ///
    /// Returns an error if a deferred form fails to parse.
    pub fn structural_eq(&self, other: &Self) -> Result<bool, SyntaxError> {
        if self.ptr_eq(other) {
            return Ok(true);
        }
        Ok(match (self.view()?, other.view()?) {
            (NodeView::Atom(left), NodeView::Atom(right)) => left.matches(right, Strategy::Normal),
            (NodeView::Entity(left), NodeView::Entity(right)) => {
                left.tag() == right.tag() && left.same_payload(right)
            }
            (
                NodeView::Compound {
                    parts: left_parts,
                    flags: left_flags,
                },
                NodeView::Compound {
                    parts: right_parts,
                    flags: right_flags,
                },
            ) => all_equal(left_parts, right_parts)? && all_equal(left_flags, right_flags)?,
            _ => false,
        })
    }

    /// Copy with a new provenance source and the same children
    pub(crate) fn with_children_mapped(
        &self,
        provenance: Provenance,
        map: impl FnMut(&Self) -> Self,
    ) -> Self {
        let repr = match &self.0.repr {
            Repr::Atom(name) => Repr::Atom(name.clone()),
            Repr::Compound(children) => Repr::Compound(children.map(map)),
            Repr::Entity(entity) => Repr::Entity(entity.clone()),
            Repr::Lazy(form) => Repr::Lazy(form.clone()),
        };
        Self::from_repr(provenance, repr)
    }

    /// Copy of a lazy node pointing at a retargeted form
    pub(crate) fn with_lazy(provenance: Provenance, form: LazyForm) -> Self {
        Self::from_repr(provenance, Repr::Lazy(form))
    }
}

impl fmt::Debug for SyntaxNode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "SyntaxNode({self})")
    }
}

fn all_equal(left: &[SyntaxNode], right: &[SyntaxNode]) -> Result<bool, SyntaxError> {
    if left.len() != right.len() {
        return Ok(false);
    }
    for (left, right) in left.iter().zip(right) {
        if !left.structural_eq(right)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Key a flag is stored under; `None` unless the flag is an atom or a
/// compound headed by one. Never forces deferred forms.
pub(crate) fn flag_key(flag: &SyntaxNode) -> Option<Name> {
    let head = match &flag.0.repr {
        Repr::Atom(name) => return Some(name.name()),
        Repr::Compound(children) => children.parts().first()?,
        Repr::Entity(_) | Repr::Lazy(_) => return None,
    };
    match &head.0.repr {
        Repr::Atom(name) => Some(name.name()),
        _ => None,
    }
}

fn dedup_flags(flags: Vec<SyntaxNode>) -> Vec<SyntaxNode> {
    let mut kept: Vec<SyntaxNode> = Vec::with_capacity(flags.len());
    for flag in flags {
        let key = flag_key(&flag);
        if key.is_some() && kept.iter().any(|existing| flag_key(existing) == key) {
            continue;
        }
        kept.push(flag);
    }
    kept
}

fn compute_provenance(explicit: &Provenance, parts: &[SyntaxNode]) -> Provenance {
    let mut result = explicit.clone();
    let mut has_range = false;
    for part in parts {
        let other = part.provenance();
        if other.is_unknown() {
            continue;
        }
        if result.is_unknown() {
            result = other.clone();
            has_range = true;
        } else if result.same_source(other) {
            result.span = if has_range {
                result.span.cover(other.span)
            } else {
                other.span
            };
            has_range = true;
        } else {
            result = explicit.clone();
            break;
        }
    }
    if result.is_unknown() {
        if let Some(first) = parts.first() {
            return first.provenance().clone();
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use ql_span::{FileId, SourceId, Span};
    use std::ptr;

    fn file(text: &str) -> SourceId {
        SourceId::file(FileId::new(0), "node.ql", text)
    }

    fn atoms(count: usize) -> Vec<SyntaxNode> {
        (0..count).map(|index| SyntaxNode::atom_str(&format!("a{index}"))).collect()
    }

    #[test]
    fn test_common_atoms_are_shared() {
        let first = SyntaxNode::atom_str("@");
        let second = SyntaxNode::atom_str("@");
        assert!(first.ptr_eq(&second));
        assert!(!SyntaxNode::atom_str("x").ptr_eq(&SyntaxNode::atom_str("x")));
    }

    #[test]
    fn test_inline_header_packs_counts() {
        let header = InlineHeader::new(11, 4);
        assert_eq!(header.parts(), 11);
        assert_eq!(header.flags(), 4);
    }

    #[test]
    fn test_encoding_thresholds_are_invisible() {
        for count in [14, 15, 16] {
            let known = SyntaxNode::list(atoms(count));
            let mut builder = Builder::new();
            builder.add_parts(atoms(count));
            let built = builder.build(Provenance::unknown());

            let expected = if count <= INLINE_MAX {
                (Encoding::Inline, Encoding::Inline)
            } else {
                (Encoding::Packed, Encoding::Growable)
            };
            assert_eq!((known.encoding(), built.encoding()), expected);
            assert_eq!(known.num_parts().ok(), Some(count));
            assert_eq!(known.to_string(), built.to_string());
            assert!(known.structural_eq(&built).unwrap_or(false));
        }
    }

    #[test]
    fn test_provenance_union_of_parts() {
        let source = file("(aaaa bbb ccc)");
        let parts = vec![
            SyntaxNode::atom(SymbolName::new("a"), Provenance::new(source.clone(), Span::new(0, 4))),
            SyntaxNode::atom(SymbolName::new("b"), Provenance::new(source.clone(), Span::new(4, 8))),
            SyntaxNode::atom(SymbolName::new("c"), Provenance::new(source.clone(), Span::new(8, 12))),
        ];
        let node = SyntaxNode::list(parts);
        assert_eq!(node.provenance(), &Provenance::new(source, Span::new(0, 12)));
        assert!(ptr::eq(node.provenance(), node.provenance()));
    }

    #[test]
    fn test_provenance_disagreeing_sources() {
        let first = file("aaaaa");
        let second = file("bbbbbbbbb");
        let parts = vec![
            SyntaxNode::atom(SymbolName::new("a"), Provenance::new(first.clone(), Span::new(0, 5))),
            SyntaxNode::atom(SymbolName::new("b"), Provenance::new(second, Span::new(5, 9))),
        ];

        let anchored = Provenance::new(first.clone(), Span::new(4, 4));
        let node = SyntaxNode::compound(anchored.clone(), parts.clone(), Vec::new());
        assert_eq!(node.provenance(), &anchored);

        let floating = SyntaxNode::list(parts);
        assert_eq!(floating.provenance(), &Provenance::new(first, Span::new(0, 5)));
    }

    #[test]
    fn test_provenance_explicit_wins() {
        let source = file("(x y)");
        let explicit = Provenance::new(source.clone(), Span::new(0, 5));
        let node = SyntaxNode::compound(
            explicit.clone(),
            vec![SyntaxNode::atom(SymbolName::new("x"), Provenance::new(source, Span::new(1, 2)))],
            Vec::new(),
        );
        assert_eq!(node.provenance(), &explicit);
    }

    #[test]
    fn test_what_queries() {
        let call = SyntaxNode::list([SyntaxNode::atom_str("f"), SyntaxNode::atom_str("x")]);
        assert_eq!(call.what().map(SymbolName::text), Some("f"));
        assert!(call.is_a("f"));
        assert_eq!(call.num_args().ok(), Some(1));
        assert!(call.arg(0).ok().flatten().is_some_and(|arg| arg.atom_is("x")));

        let nested = SyntaxNode::list([call.clone()]);
        assert_eq!(nested.what().map(SymbolName::text), Some("<unknown>"));
        assert!(SyntaxNode::list([]).what().is_none());

        let entity = SyntaxNode::entity(Entity::new(EntityTag::Type, ()), Provenance::unknown());
        assert!(entity.what().is_none());
        assert!(entity.is_a("<entity>"));
        assert!(!entity.is_simple());
    }

    #[test]
    fn test_flag_lookup_ignores_marks() {
        let key = SyntaxNode::atom(SymbolName::new("depth").add_mark(Mark::fresh()), Provenance::unknown());
        let flag = SyntaxNode::list([key, SyntaxNode::atom_str("3")]);
        let node = SyntaxNode::compound(Provenance::unknown(), atoms(1), vec![flag]);
        let found = node.flag_value("depth").ok().flatten();
        assert!(found.is_some_and(|value| value.atom_is("3")));
        assert!(node.flag("width").ok().flatten().is_none());
    }

    #[test]
    fn test_known_flags_are_unique() {
        let first = SyntaxNode::list([SyntaxNode::atom_str("a"), SyntaxNode::atom_str("1")]);
        let second = SyntaxNode::list([SyntaxNode::atom_str("a"), SyntaxNode::atom_str("2")]);
        let node = SyntaxNode::compound(Provenance::unknown(), atoms(1), vec![first, second]);
        assert_eq!(node.flags().map(<[SyntaxNode]>::len).ok(), Some(1));
        assert!(node.flag_value("a").ok().flatten().is_some_and(|value| value.atom_is("1")));
    }

    #[test]
    fn test_flags_without_atom_heads_are_kept() {
        let first = SyntaxNode::list([SyntaxNode::list(atoms(1)), SyntaxNode::atom_str("1")]);
        let second = SyntaxNode::list([SyntaxNode::list(atoms(2)), SyntaxNode::atom_str("2")]);
        let node = SyntaxNode::compound(Provenance::unknown(), atoms(1), vec![first, second]);
        assert_eq!(node.flags().map(<[SyntaxNode]>::len).ok(), Some(2));
        assert!(node.flag("<unknown>").ok().flatten().is_none());

        let mut builder = Builder::new();
        builder.add_parts(atoms(1));
        assert!(builder.add_flag(SyntaxNode::list([SyntaxNode::list(atoms(1))])));
        assert!(builder.add_flag(SyntaxNode::list([SyntaxNode::list(atoms(3))])));
        assert_eq!(builder.build(Provenance::unknown()).flags().map(<[SyntaxNode]>::len).ok(), Some(2));
    }

    #[test]
    fn test_add_mark_only_on_atoms() {
        let mark = Mark::fresh();
        let atom = SyntaxNode::atom_str("tmp");
        let marked = atom.add_mark(mark);
        assert!(marked.as_ref().and_then(SyntaxNode::as_atom).is_some_and(SymbolName::is_marked));
        assert!(SyntaxNode::list(atoms(2)).add_mark(mark).is_none());
    }
}
