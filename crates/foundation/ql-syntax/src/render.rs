//! Textual rendering of syntax trees
//!
//! Rendering never forces a deferred form: a forced one prints as `=` and its
//! parse result, a pending one as `(name ...)`. Compounds led by `@` or by a
//! `{...}` discriminator are laid out one part per line.

use crate::hygiene::SymbolName;
use crate::node::{NodeView, SyntaxNode};
use std::fmt::{self, Write};

const INDENT_STEP: usize = 2;

/// Quote `text` if reading it back would not give the same atom
pub fn escape(text: &str) -> String {
    let needs_quotes = text.is_empty()
        || text.starts_with(':')
        || text
            .chars()
            .any(|ch| ch.is_whitespace() || matches!(ch, '(' | ')' | '{' | '}' | '"' | ';'));
    if !needs_quotes {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        if matches!(ch, '"' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

/// The atom's name, without forcing a deferred form
fn shallow_atom(node: &SyntaxNode) -> Option<&SymbolName> {
    if node.as_lazy().is_some() {
        return None;
    }
    node.as_atom()
}

fn newline_mode(parts: &[SyntaxNode]) -> bool {
    parts
        .first()
        .and_then(shallow_atom)
        .is_some_and(|head| matches!(head.text(), "@" | "{...}"))
}

fn newline(out: &mut impl Write, indent: usize) -> fmt::Result {
    out.write_char('\n')?;
    for _ in 0..indent {
        out.write_char(' ')?;
    }
    Ok(())
}

fn write_node(out: &mut impl Write, node: &SyntaxNode, indent: usize) -> fmt::Result {
    if let Some(form) = node.as_lazy() {
        return match form.cached() {
            Some(parsed) => {
                out.write_char('=')?;
                write_node(out, parsed, indent)
            }
            None => {
                let name = form.what().what().map_or("?", |name| name.text());
                write!(out, "({name} ...)")
            }
        };
    }
    match node.try_view() {
        Some(NodeView::Atom(name)) => out.write_str(&escape(name.text())),
        Some(NodeView::Entity(entity)) => write!(out, "{entity}"),
        Some(NodeView::Compound { parts, flags }) => write_compound(out, parts, flags, indent),
        None => out.write_str("<unparsable>"),
    }
}

fn write_compound(
    out: &mut impl Write,
    parts: &[SyntaxNode],
    flags: &[SyntaxNode],
    indent: usize,
) -> fmt::Result {
    out.write_char('(')?;
    let multiline = newline_mode(parts);
    let inner = if multiline { indent + INDENT_STEP } else { indent };
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            if multiline {
                newline(out, inner)?;
            } else {
                out.write_char(' ')?;
            }
        }
        write_node(out, part, inner)?;
    }
    for (index, flag) in flags.iter().enumerate() {
        if index > 0 || !parts.is_empty() {
            out.write_char(' ')?;
        }
        write_flag(out, flag, inner)?;
    }
    if multiline && parts.len() > 1 {
        newline(out, indent)?;
    }
    out.write_char(')')
}

/// `:key` for a bare flag, `:key value` for a one-argument flag, and `:` plus
/// the whole form otherwise
fn write_flag(out: &mut impl Write, flag: &SyntaxNode, indent: usize) -> fmt::Result {
    out.write_char(':')?;
    if flag.as_lazy().is_some() {
        return write_node(out, flag, indent);
    }
    if let Some(name) = flag.as_atom() {
        return out.write_str(&escape(name.text()));
    }
    if let Some(NodeView::Compound { parts, flags }) = flag.try_view() {
        if let [key, value] = parts {
            if flags.is_empty() {
                if let Some(name) = shallow_atom(key) {
                    write!(out, "{} ", escape(name.text()))?;
                    return write_node(out, value, indent);
                }
            }
        }
    }
    write_node(out, flag, indent)
}

impl fmt::Display for SyntaxNode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_node(formatter, self, 0)
    }
}
