//! Nodes shared across threads

use ql_span::{FileId, Provenance, SourceId, Span};
use ql_syntax::{Grammar, LazyForm, Reader, ReparseRequest, SyntaxError, SyntaxNode};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

struct CountingReader {
    calls: AtomicUsize,
}

impl Grammar for CountingReader {
    fn parse(&self, request: &ReparseRequest<'_>) -> Result<SyntaxNode, SyntaxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Reader.parse(request)
    }
}

#[test]
fn test_concurrent_forcing_converges() {
    let source = SourceId::file(FileId::new(0), "shared.ql", "{(a b) (c d) (e f)}");
    let grammar = Arc::new(CountingReader {
        calls: AtomicUsize::new(0),
    });
    let form = LazyForm::new(
        SyntaxNode::atom_str("{...}"),
        "sexps",
        Provenance::new(source.clone(), Span::new(1, 18)),
        Provenance::new(source, Span::new(0, 19)),
        Arc::clone(&grammar) as Arc<dyn Grammar>,
    );
    let node = SyntaxNode::lazy(form);

    let identities: Vec<usize> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let node = node.clone();
                scope.spawn(move || node.forced().map(SyntaxNode::identity).unwrap_or(0))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or(0))
            .collect()
    });

    let first = identities[0];
    assert_ne!(first, 0);
    assert!(identities.iter().all(|identity| *identity == first));
    assert_eq!(node.num_parts().ok(), Some(4));
    assert_eq!(grammar.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_provenance_memo_is_stable_across_threads() {
    let source = SourceId::file(FileId::new(1), "memo.ql", "(a b c)");
    let node = Reader::read_one(&source)
        .map(|node| SyntaxNode::list(node.parts().unwrap_or_default().to_vec()))
        .unwrap_or_else(|_| SyntaxNode::list([]));

    let spans: Vec<Span> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| node.provenance().span))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_default())
            .collect()
    });
    assert!(spans.iter().all(|span| *span == Span::new(1, 6)));
}
