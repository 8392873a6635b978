//! Provenance rewriting over whole trees

use crate::lazy::Replacements;
use crate::node::{Encoding, SyntaxNode};
use ql_span::SourceId;

/// Decision returned by a rewrite callback for one node
#[derive(Debug, Clone)]
pub enum RewriteAction {
    /// Keep the node and everything below it as is
    Stop,
    /// Copy the node under a new source identity
    Replace {
        /// Source identity for the copy
        source: Option<SourceId>,
        /// Replacement list given to copied deferred forms
        replacements: Option<Replacements>,
    },
}

impl RewriteAction {
    /// Replace the source identity and give deferred forms no replacements
    pub fn retarget(source: SourceId) -> Self {
        Self::Replace {
            source: Some(source),
            replacements: None,
        }
    }
}

/// Copy `node` with provenance sources rewritten by `decide`
///
/// `decide` sees every node once, parents before children. When it answers
/// [`RewriteAction::Stop`] the original node is reused, children included.
/// Deferred forms are never forced: only their discriminator is rewritten,
/// and the copy starts with an empty cache.
pub fn rewrite<F>(node: &SyntaxNode, decide: &mut F) -> SyntaxNode
where
    F: FnMut(&SyntaxNode) -> RewriteAction,
{
    let RewriteAction::Replace {
        source,
        replacements,
    } = decide(node)
    else {
        return node.clone();
    };
    let provenance = node.explicit_provenance().with_source(source);

    if let Some(form) = node.as_lazy() {
        let what = rewrite(form.what(), decide);
        return SyntaxNode::with_lazy(provenance, form.retargeted(what, replacements));
    }
    let is_leaf = matches!(node.encoding(), Encoding::Leaf | Encoding::Entity);
    if is_leaf && node.explicit_provenance() == &provenance {
        return node.clone();
    }
    node.with_children_mapped(provenance, |child| rewrite(child, decide))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, EntityTag};
    use crate::hygiene::SymbolName;
    use crate::lazy::Replacement;
    use crate::reader::Reader;
    use ql_span::{ExpansionOf, FileId, Provenance, Span};
    use std::collections::HashSet;

    fn file() -> SourceId {
        SourceId::file(FileId::new(0), "rewrite.ql", "(a (b c) d)")
    }

    fn at(source: &SourceId, text: &str, start: u32) -> SyntaxNode {
        let end = start + text.len() as u32;
        SyntaxNode::atom(SymbolName::new(text), Provenance::new(source.clone(), Span::new(start, end)))
    }

    fn tree(source: &SourceId) -> SyntaxNode {
        let inner = SyntaxNode::list([at(source, "b", 4), at(source, "c", 6)]);
        SyntaxNode::list([at(source, "a", 1), inner, at(source, "d", 9)])
    }

    fn fresh(source: &SourceId) -> SourceId {
        SourceId::expansion(ExpansionOf {
            origin: source.clone(),
            macro_name: "m".to_string(),
            call_site: Provenance::unknown(),
        })
    }

    fn all_sources(node: &SyntaxNode, out: &mut Vec<Option<SourceId>>) {
        out.push(node.explicit_provenance().source.clone());
        for part in node.parts().unwrap_or_default() {
            all_sources(part, out);
        }
    }

    #[test]
    fn test_rewrite_reaches_every_depth() {
        let source = file();
        let target = fresh(&source);
        let rewritten = rewrite(&tree(&source), &mut |_| RewriteAction::retarget(target.clone()));

        let mut sources = Vec::new();
        all_sources(&rewritten, &mut sources);
        assert_eq!(sources.len(), 6);
        assert!(sources.iter().all(|found| found.as_ref() == Some(&target)));
        assert_eq!(rewritten.provenance().span, Span::new(1, 10));
        assert_eq!(rewritten.to_string(), "(a (b c) d)");
    }

    #[test]
    fn test_stop_returns_original_subtree() {
        let source = file();
        let target = fresh(&source);
        let original = tree(&source);
        let protected = original.part(1).ok().flatten().cloned();
        let protected_id = protected.as_ref().map(SyntaxNode::identity);

        let mut visited = HashSet::new();
        let rewritten = rewrite(&original, &mut |node| {
            visited.insert(node.identity());
            if Some(node.identity()) == protected_id {
                RewriteAction::Stop
            } else {
                RewriteAction::retarget(target.clone())
            }
        });

        let kept = rewritten.part(1).ok().flatten();
        assert!(kept.zip(protected.as_ref()).is_some_and(|(kept, protected)| kept.ptr_eq(protected)));
        assert!(!rewritten.ptr_eq(&original));
        // the stopped node's children are never visited
        assert_eq!(visited.len(), 4);
    }

    #[test]
    fn test_pending_block_is_copied_unforced() {
        let source = SourceId::file(FileId::new(0), "rewrite.ql", "{a b}");
        let Ok(original) = Reader::read_one(&source) else {
            panic!("block should read");
        };
        let target = fresh(&source);
        let spliced = SyntaxNode::atom_str("spliced");
        let replacements = Replacements::new(vec![Replacement {
            range: Provenance::new(source.clone(), Span::new(3, 4)),
            node: spliced.clone(),
        }]);

        let copy = rewrite(&original, &mut |_| RewriteAction::Replace {
            source: Some(target.clone()),
            replacements: Some(replacements.clone()),
        });

        let (Some(before), Some(after)) = (original.as_lazy(), copy.as_lazy()) else {
            panic!("both nodes should stay deferred");
        };
        assert!(before.cached().is_none());
        assert!(after.cached().is_none());
        assert!(before.replacements().is_none());
        let given: Vec<&SyntaxNode> = after
            .replacements()
            .map(|given| given.iter().map(|item| &item.node).collect())
            .unwrap_or_default();
        assert_eq!(given.len(), replacements.len());
        assert!(given.first().is_some_and(|node| node.ptr_eq(&spliced)));
        assert_eq!(after.what().explicit_provenance().source.as_ref(), Some(&target));
        assert_eq!(copy.explicit_provenance().source.as_ref(), Some(&target));
        assert_eq!(before.what().explicit_provenance().source.as_ref(), Some(&source));
    }

    #[test]
    fn test_entity_payload_survives() {
        let source = file();
        let entity = Entity::new(EntityTag::Symbol, 42_u32);
        let node = SyntaxNode::entity(entity, Provenance::new(source.clone(), Span::new(0, 1)));
        let target = fresh(&source);
        let rewritten = rewrite(&node, &mut |_| RewriteAction::retarget(target.clone()));

        assert_eq!(rewritten.explicit_provenance().source.as_ref(), Some(&target));
        let same = rewritten
            .as_entity()
            .zip(node.as_entity())
            .is_some_and(|(left, right)| left.same_payload(right));
        assert!(same);
    }
}
