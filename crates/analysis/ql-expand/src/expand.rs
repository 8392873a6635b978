//! Template macro expansion
//!
//! A macro is a list of parameter names and a template. Expanding a call
//! substitutes the call's arguments for the parameters, renames every other
//! atom of the template with a fresh [`Mark`], and rewrites the result's
//! provenance so each copied template node points back at the call site.
//! The mark is bound to the scope chain where the macro was defined, so
//! names the template introduces resolve there rather than at the call site.

use crate::config::ExpansionConfig;
use crate::error::ExpandError;
use ql_resolve::{
    Namespace, Query, ResolveError, Resolver, ScopeChain, Symbol, SymbolKind, SymbolRef,
    SymbolTable,
};
use ql_span::{ExpansionOf, Provenance, SourceId};
use ql_syntax::{Builder, Mark, RewriteAction, Strategy, SymbolName, SyntaxNode, rewrite};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

/// Head of a macro definition form
pub const MACRO_FORM: &str = "macro";

/// A template macro
#[derive(Debug, Clone)]
pub struct MacroDef {
    name: SymbolName,
    params: Vec<SymbolName>,
    template: SyntaxNode,
    def_env: ScopeChain,
}

impl MacroDef {
    /// A macro expanding to `template`, defined where `def_env` is visible
    pub fn new(
        name: SymbolName,
        params: Vec<SymbolName>,
        template: SyntaxNode,
        def_env: ScopeChain,
    ) -> Self {
        Self {
            name,
            params,
            template,
            def_env,
        }
    }

    /// Read a `(macro name (params ...) template)` form
    ///
    /// # Errors
    ///
    /// Returns [`ExpandError::InvalidDefinition`] if the form has the wrong
    /// shape, or a syntax error if a deferred part fails to parse.
    pub fn from_syntax(form: &SyntaxNode, def_env: ScopeChain) -> Result<Self, ExpandError> {
        let invalid = |message: &str| ExpandError::InvalidDefinition {
            message: message.to_string(),
            provenance: form.provenance().clone(),
        };
        if !form.is_a(MACRO_FORM) {
            return Err(invalid("expected a `macro` form"));
        }
        let [name, params, template] = form.args()? else {
            return Err(invalid("expected `(macro name (params ...) template)`"));
        };
        let Some(name) = name.as_atom() else {
            return Err(invalid("macro name must be an atom"));
        };
        if params.is_simple() || params.as_entity().is_some() {
            return Err(invalid("parameters must be a list"));
        }
        let params = params
            .parts()?
            .iter()
            .map(|param| param.as_atom().cloned().ok_or_else(|| invalid("parameters must be atoms")))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(name.clone(), params, template.clone(), def_env))
    }

    /// Macro name
    pub fn name(&self) -> &SymbolName {
        &self.name
    }

    /// Parameter names
    pub fn params(&self) -> &[SymbolName] {
        &self.params
    }

    /// Template
    pub fn template(&self) -> &SyntaxNode {
        &self.template
    }

    /// Scope chain visible where the macro was defined
    pub fn def_env(&self) -> &ScopeChain {
        &self.def_env
    }

    /// A macro symbol carrying this definition
    pub fn into_symbol(self, provenance: Provenance) -> Symbol {
        Symbol::new(SymbolKind::Macro, self.name.clone(), Namespace::default())
            .with_provenance(provenance)
            .with_payload(self)
    }
}

/// Expands macro calls, tracking nesting depth
#[derive(Debug)]
pub struct MacroExpander {
    resolver: Resolver,
    max_depth: usize,
    expansion_stack: Vec<SymbolName>,
}

impl MacroExpander {
    /// An expander with the default configuration
    pub fn new() -> Self {
        Self::with_config(&ExpansionConfig::default())
    }

    /// An expander honouring `config`
    pub fn with_config(config: &ExpansionConfig) -> Self {
        Self {
            resolver: Resolver::new(),
            max_depth: config.max_depth,
            expansion_stack: Vec::new(),
        }
    }

    /// Resolver holding the mark environments of every expansion so far
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Hand the resolver on to later passes
    pub fn into_resolver(self) -> Resolver {
        self.resolver
    }

    /// Bind `def` as a macro in the current scope of `table`
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::DuplicateDefinition`] (wrapped) if the scope
    /// already has a macro or other symbol of that name.
    pub fn define(
        &mut self,
        table: &mut SymbolTable,
        def: MacroDef,
        provenance: Provenance,
    ) -> Result<SymbolRef, ExpandError> {
        tracing::trace!(name = %def.name, params = def.params.len(), "defining macro");
        let symbol = Arc::new(def.into_symbol(provenance));
        table.add(Arc::clone(&symbol))?;
        Ok(symbol)
    }

    /// Read a `macro` form and bind it in the current scope of `table`
    ///
    /// # Errors
    ///
    /// Returns [`ExpandError::InvalidDefinition`] for a malformed form and
    /// any error [`define`](Self::define) returns.
    pub fn define_from_syntax(
        &mut self,
        table: &mut SymbolTable,
        form: &SyntaxNode,
    ) -> Result<SymbolRef, ExpandError> {
        let def = MacroDef::from_syntax(form, table.front().clone())?;
        self.define(table, def, form.provenance().clone())
    }

    /// The macro `node` calls, if its head resolves to one
    ///
    /// Deferred forms are never calls, and are not forced.
    ///
    /// # Errors
    ///
    /// Returns resolution errors other than "not found".
    pub fn macro_call(
        &self,
        node: &SyntaxNode,
        scope: &ScopeChain,
    ) -> Result<Option<SymbolRef>, ExpandError> {
        if node.as_lazy().is_some() || node.as_entity().is_some() || node.is_simple() {
            return Ok(None);
        }
        let Some(head) = node.part(0)?.filter(|head| head.as_lazy().is_none()) else {
            return Ok(None);
        };
        let query = Query::new(Namespace::default(), scope);
        let symbol = match self.resolver.find(head, &query) {
            Ok(symbol) => symbol,
            Err(ResolveError::MalformedForm { .. }) => None,
            Err(error) => return Err(error.into()),
        };
        Ok(symbol.filter(|symbol| symbol.kind() == SymbolKind::Macro))
    }

    /// Expand `node` while its head names a macro
    ///
    /// The result is not a macro call; its parts are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`ExpandError::RecursionLimit`] when expansions nest deeper
    /// than the configured limit, [`ExpandError::ArityMismatch`] for a call
    /// with the wrong number of arguments, and any resolution error.
    pub fn expand(&mut self, node: &SyntaxNode, scope: &ScopeChain) -> Result<SyntaxNode, ExpandError> {
        let base = self.expansion_stack.len();
        let result = self.expand_head(node, scope);
        self.expansion_stack.truncate(base);
        result
    }

    /// Expand every macro call in `node`, outermost first
    ///
    /// Expansions produced inside another expansion count towards the same
    /// depth limit. Deferred forms are left unforced.
    ///
    /// # Errors
    ///
    /// Returns any error [`expand`](Self::expand) returns.
    pub fn expand_all(&mut self, node: &SyntaxNode, scope: &ScopeChain) -> Result<SyntaxNode, ExpandError> {
        let base = self.expansion_stack.len();
        let result = self
            .expand_head(node, scope)
            .and_then(|expanded| self.expand_parts(&expanded, scope));
        self.expansion_stack.truncate(base);
        result
    }

    /// Define the `macro` forms among a program's top-level forms, then
    /// expand the rest
    ///
    /// `program` is an `(@ ...)` sequence as produced by the reader. Macro
    /// definitions are dropped from the result, and each one is visible to
    /// every form after it.
    ///
    /// # Errors
    ///
    /// Returns the first definition or expansion error.
    pub fn expand_program(
        &mut self,
        program: &SyntaxNode,
        table: &mut SymbolTable,
    ) -> Result<SyntaxNode, ExpandError> {
        if !program.is_a("@") {
            return self.expand_all(program, table.front());
        }
        let mut builder = Builder::new();
        for (index, form) in program.parts()?.iter().enumerate() {
            if index == 0 {
                builder.add_part(form.clone());
            } else if form.as_lazy().is_none() && form.is_a(MACRO_FORM) {
                self.define_from_syntax(table, form)?;
            } else {
                builder.add_part(self.expand_all(form, table.front())?);
            }
        }
        builder.merge_flags(program.flags()?);
        Ok(builder.build(program.explicit_provenance().clone()))
    }

    fn expand_head(&mut self, node: &SyntaxNode, scope: &ScopeChain) -> Result<SyntaxNode, ExpandError> {
        let mut current = node.clone();
        while let Some(symbol) = self.macro_call(&current, scope)? {
            if self.expansion_stack.len() >= self.max_depth {
                tracing::debug!(macro_name = %symbol.name(), limit = self.max_depth, "macro recursion limit hit");
                return Err(ExpandError::RecursionLimit {
                    macro_name: symbol.name().to_string(),
                    limit: self.max_depth,
                    provenance: current.provenance().clone(),
                });
            }
            self.expansion_stack.push(symbol.name().clone());
            tracing::debug!(
                macro_name = %symbol.name(),
                depth = self.expansion_stack.len(),
                "expanding macro call"
            );
            current = self.expand_call(&current, &symbol)?;
        }
        Ok(current)
    }

    fn expand_parts(&mut self, node: &SyntaxNode, scope: &ScopeChain) -> Result<SyntaxNode, ExpandError> {
        if node.as_lazy().is_some() || node.as_entity().is_some() || node.is_simple() {
            return Ok(node.clone());
        }
        let parts = node.parts()?;
        let mut expanded = Vec::with_capacity(parts.len());
        let mut changed = false;
        for part in parts {
            let base = self.expansion_stack.len();
            let result = self
                .expand_head(part, scope)
                .and_then(|head| self.expand_parts(&head, scope));
            self.expansion_stack.truncate(base);
            let part_expanded = result?;
            changed |= !part_expanded.ptr_eq(part);
            expanded.push(part_expanded);
        }
        if !changed {
            return Ok(node.clone());
        }
        let mut builder = Builder::new();
        builder.add_parts(expanded);
        builder.merge_flags(node.flags()?);
        Ok(builder.build(node.explicit_provenance().clone()))
    }

    fn expand_call(&mut self, call: &SyntaxNode, symbol: &SymbolRef) -> Result<SyntaxNode, ExpandError> {
        let macro_name = symbol.name().to_string();
        let Some(def) = symbol.payload::<MacroDef>() else {
            return Err(ExpandError::InvalidDefinition {
                message: format!("`{macro_name}` has no template"),
                provenance: call.provenance().clone(),
            });
        };
        let args = call.args()?;
        if args.len() != def.params.len() {
            return Err(ExpandError::ArityMismatch {
                macro_name,
                expected: def.params.len(),
                found: args.len(),
                provenance: call.provenance().clone(),
            });
        }

        let mark = Mark::fresh();
        self.resolver.bind_mark(mark, def.def_env.clone());
        let body = substitute(&def.template, &def.params, args, mark)?;

        let spliced: FxHashSet<usize> = args.iter().map(SyntaxNode::identity).collect();
        let call_site = call.provenance().clone();
        let mut sources: FxHashMap<SourceId, SourceId> = FxHashMap::default();
        let expanded = rewrite(&body, &mut |node| {
            if spliced.contains(&node.identity()) {
                return RewriteAction::Stop;
            }
            let Some(origin) = node.explicit_provenance().source.clone() else {
                return RewriteAction::Replace {
                    source: None,
                    replacements: None,
                };
            };
            let source = sources
                .entry(origin.clone())
                .or_insert_with(|| {
                    SourceId::expansion(ExpansionOf {
                        origin,
                        macro_name: macro_name.clone(),
                        call_site: call_site.clone(),
                    })
                })
                .clone();
            RewriteAction::retarget(source)
        });
        tracing::trace!(macro_name = %macro_name, %expanded, "expanded macro call");
        Ok(expanded)
    }
}

impl Default for MacroExpander {
    fn default() -> Self {
        Self::new()
    }
}

/// Template copy with arguments spliced in for parameters and every other
/// atom renamed by `mark`; deferred template forms are parsed first
fn substitute(
    node: &SyntaxNode,
    params: &[SymbolName],
    args: &[SyntaxNode],
    mark: Mark,
) -> Result<SyntaxNode, ExpandError> {
    if let Some(form) = node.as_lazy() {
        return substitute(form.instantiate()?, params, args, mark);
    }
    if node.as_entity().is_some() {
        return Ok(node.clone());
    }
    if let Some(name) = node.as_atom() {
        let bound = params
            .iter()
            .zip(args)
            .find(|(param, _)| param.matches(name, Strategy::Normal));
        return Ok(match bound {
            Some((_, arg)) => arg.clone(),
            None => node.add_mark(mark).unwrap_or_else(|| node.clone()),
        });
    }
    let mut builder = Builder::new();
    for part in node.parts()? {
        builder.add_part(substitute(part, params, args, mark)?);
    }
    for flag in node.flags()? {
        builder.add_flag(substitute(flag, params, args, mark)?);
    }
    Ok(builder.build(node.explicit_provenance().clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;
    use ql_span::{FileId, SourceKind};
    use ql_syntax::Reader;

    fn read(name: &str, text: &str) -> SyntaxNode {
        Reader::read_one(&SourceId::file(FileId::new(0), name, text)).unwrap_or_else(|error| {
            panic!("read failed: {error}");
        })
    }

    fn define(expander: &mut MacroExpander, table: &mut SymbolTable, text: &str) {
        let form = read("defs.ql", text);
        if let Err(error) = expander.define_from_syntax(table, &form) {
            panic!("definition failed: {error}");
        }
    }

    #[test]
    fn test_substitutes_arguments() {
        let mut expander = MacroExpander::new();
        let mut table = SymbolTable::new();
        define(&mut expander, &mut table, "(macro twice (e) (+ e e))");

        let call = read("use.ql", "(twice (f 1))");
        let expanded = expander.expand(&call, table.front());
        let expanded = expanded.unwrap_or_else(|error| panic!("{error}"));
        expect![[r#"(+ (f 1) (f 1))"#]].assert_eq(&expanded.to_string());

        let argument = call.arg(0).ok().flatten();
        let spliced = expanded.arg(0).ok().flatten();
        assert!(matches!((argument, spliced), (Some(left), Some(right)) if left.ptr_eq(right)));
    }

    #[test]
    fn test_template_atoms_are_marked() {
        let mut expander = MacroExpander::new();
        let mut table = SymbolTable::new();
        define(&mut expander, &mut table, "(macro swap (a b) (let tmp a))");

        let expanded = expander.expand(&read("use.ql", "(swap tmp y)"), table.front());
        let expanded = expanded.unwrap_or_else(|error| panic!("{error}"));
        let parts = expanded.parts().unwrap_or_default();
        let introduced = parts.get(1).and_then(SyntaxNode::as_atom);
        let passed = parts.get(2).and_then(SyntaxNode::as_atom);
        assert!(introduced.is_some_and(SymbolName::is_marked));
        assert!(passed.is_some_and(|name| !name.is_marked()));
        assert!(!introduced.is_some_and(|left| passed.is_some_and(|right| left == right)));
    }

    #[test]
    fn test_provenance_points_at_call_site() {
        let mut expander = MacroExpander::new();
        let mut table = SymbolTable::new();
        define(&mut expander, &mut table, "(macro wrap (x) (box x))");

        let expanded = expander.expand(&read("use.ql", "(wrap 1)"), table.front());
        let expanded = expanded.unwrap_or_else(|error| panic!("{error}"));
        let head = expanded.part(0).ok().flatten().map(SyntaxNode::explicit_provenance);
        let source = head.and_then(|prov| prov.source.clone());
        match source.as_ref().map(SourceId::kind) {
            Some(SourceKind::Expansion(expansion)) => {
                assert_eq!(expansion.macro_name, "wrap");
                assert_eq!(expansion.call_site.text(), Some("(wrap 1)"));
            }
            other => panic!("expected an expansion source, got {other:?}"),
        }
        assert_eq!(head.and_then(Provenance::text), Some("box"));
    }

    #[test]
    fn test_arity_mismatch() {
        let mut expander = MacroExpander::new();
        let mut table = SymbolTable::new();
        define(&mut expander, &mut table, "(macro pair (a b) (cons a b))");
        let result = expander.expand(&read("use.ql", "(pair 1)"), table.front());
        assert!(matches!(
            result,
            Err(ExpandError::ArityMismatch {
                expected: 2,
                found: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_recursion_limit() {
        let config = ExpansionConfig { max_depth: 8 };
        let mut expander = MacroExpander::with_config(&config);
        let mut table = SymbolTable::new();
        define(&mut expander, &mut table, "(macro omega (f) (f f))");
        let result = expander.expand(&read("use.ql", "(omega omega)"), table.front());
        assert!(matches!(result, Err(ExpandError::RecursionLimit { limit: 8, .. })));
        assert!(expander.expansion_stack.is_empty());
    }

    #[test]
    fn test_expand_all_reaches_nested_calls() {
        let mut expander = MacroExpander::new();
        let mut table = SymbolTable::new();
        define(&mut expander, &mut table, "(macro inc (x) (+ x 1))");
        let expanded = expander.expand_all(&read("use.ql", "(f (inc (inc 2)) :k (inc 3))"), table.front());
        let expanded = expanded.unwrap_or_else(|error| panic!("{error}"));
        expect![[r#"(f (+ (+ 2 1) 1) :k (inc 3))"#]].assert_eq(&expanded.to_string());
    }

    #[test]
    fn test_untouched_tree_is_shared() {
        let mut expander = MacroExpander::new();
        let table = SymbolTable::new();
        let node = read("use.ql", "(f (g 1) {h 2})");
        let expanded = expander.expand_all(&node, table.front());
        assert!(expanded.is_ok_and(|expanded| expanded.ptr_eq(&node)));
        assert!(node.part(2).ok().flatten().and_then(SyntaxNode::as_lazy).is_some_and(|form| form.cached().is_none()));
    }

    #[test]
    fn test_template_blocks_are_parsed() {
        let mut expander = MacroExpander::new();
        let mut table = SymbolTable::new();
        define(&mut expander, &mut table, "(macro body (x) {(print x) (done)})");
        let expanded = expander.expand(&read("use.ql", "(body 7)"), table.front());
        let expanded = expanded.unwrap_or_else(|error| panic!("{error}"));
        expect![[r#"
            (@
              (print 7)
              (done)
            )"#]]
        .assert_eq(&expanded.to_string());
    }

    #[test]
    fn test_invalid_definitions() {
        let mut table = SymbolTable::new();
        let mut expander = MacroExpander::new();
        for text in ["(macro m)", "(macro (m) (x) x)", "(macro m x x)", "(macro m ((x)) x)"] {
            let result = expander.define_from_syntax(&mut table, &read("defs.ql", text));
            assert!(
                matches!(result, Err(ExpandError::InvalidDefinition { .. })),
                "{text} should be rejected"
            );
        }
    }

    #[test]
    fn test_program_drops_definitions() {
        let source = SourceId::file(
            FileId::new(0),
            "prog.ql",
            "(macro one () 1)\n(print (one))\n(macro two () (+ (one) (one)))\n(print (two))",
        );
        let program = Reader::read_all(&source).unwrap_or_else(|error| panic!("{error}"));
        let mut expander = MacroExpander::new();
        let mut table = SymbolTable::new();
        let expanded = expander.expand_program(&program, &mut table);
        let expanded = expanded.unwrap_or_else(|error| panic!("{error}"));
        expect![[r#"
            (@
              (print 1)
              (print (+ 1 1))
            )"#]]
        .assert_eq(&expanded.to_string());
    }
}
