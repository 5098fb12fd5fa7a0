//! Document Builder
//!
//! Recursive descent over the token stream. Each element is parsed by one call
//! of [`Builder::children`], which receives the AST node active inside that
//! element as a parameter; the open element is the call frame, so tag balance
//! is checked by returning from the frame that opened it.
//!
//! Directives are handled in place: imports and `ko-lint-*` toggles update the
//! document, `ko-context` opens a type node that stays active for the rest of
//! the enclosing element.

use std::sync::Arc;

use crate::binding_parser::parse_binding_expression;
use crate::context::HandlerRegistry;
use crate::diagnostic::{Diagnostic, DiagnosticKind, Suppression};
use crate::lexer::{Directive, ElementToken, NodeType, Token, Tokenized, TypeReference};
use crate::location::{LineIndex, Location};
use crate::syntax_tree::{Binding, BindingId, BindingNode, Document, NodeId, NodeKind, TypeNode};

/// Deepest element nesting the builder descends into.
pub const MAX_NESTING: usize = 1000;

/// Why the element structure could not be completed.
enum Incomplete<'t> {
    /// End tag without a matching start tag, or the reverse.
    Unbalanced(Option<Location>),
    /// Element opened beyond [`MAX_NESTING`].
    TooDeep(&'t ElementToken),
}

#[derive(Debug)]
pub struct BuildResult {
    /// `None` when the tree could not be completed.
    pub document: Option<Document>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Builds the syntax tree of one tokenized view.
///
/// Diagnostics are returned already filtered by the view's own `ko-lint-*`
/// directives.
pub fn build(
    file_path: &str,
    text: &str,
    tokenized: &Tokenized,
    registry: &HandlerRegistry,
) -> BuildResult {
    let _span = tracing::debug_span!("build", file = file_path).entered();

    let mut builder = Builder {
        tokens: &tokenized.tokens,
        pos: 0,
        document: Document::new(file_path, tokenized.dialect, LineIndex::new(text)),
        diagnostics: Vec::new(),
        suppression: Arc::new(Suppression::new()),
        registry: registry.clone(),
        viewmodels: Vec::new(),
    };

    let root = builder.document.root;
    if let Err(incomplete) = builder.children(root, None, None, 0) {
        match incomplete {
            Incomplete::Unbalanced(location) => {
                tracing::debug!(file = file_path, "unbalanced markup, dropping view");
                builder.report(DiagnosticKind::UnbalancedStartEndTags, location, &[]);
            }
            Incomplete::TooDeep(element) => {
                tracing::debug!(file = file_path, "markup nested too deeply, dropping view");
                let expected = format!("at most {} nested elements", MAX_NESTING);
                builder.report(
                    DiagnosticKind::ParserError,
                    Some(element.location),
                    &[expected.as_str(), element.tag.as_str(), "element"],
                );
            }
        }
        let timeline = builder.document.suppression;
        let diagnostics = builder
            .diagnostics
            .into_iter()
            .filter(|diagnostic| timeline.allows(diagnostic))
            .collect();
        return BuildResult {
            document: None,
            diagnostics,
        };
    }

    builder.finish();
    let Builder {
        document,
        diagnostics,
        ..
    } = builder;
    let diagnostics = diagnostics
        .into_iter()
        .filter(|diagnostic| document.suppression.allows(diagnostic))
        .collect();

    tracing::debug!(
        file = file_path,
        nodes = document.nodes.len(),
        bindings = document.bindings.len(),
        "built syntax tree"
    );
    BuildResult {
        document: Some(document),
        diagnostics,
    }
}

struct Builder<'t> {
    tokens: &'t [Token],
    pos: usize,
    document: Document,
    diagnostics: Vec<Diagnostic>,
    suppression: Arc<Suppression>,
    /// Declared handlers plus the view's imports seen so far.
    registry: HandlerRegistry,
    viewmodels: Vec<TypeReference>,
}

impl<'t> Builder<'t> {
    fn report(&mut self, kind: DiagnosticKind, location: Option<Location>, args: &[&str]) {
        self.diagnostics
            .push(Diagnostic::new(kind, &self.document.file_path, location, args));
    }

    /// Parses the content of one element. `current` is the AST node active for
    /// the content, `context_binding` the binding new bindings nest under, and
    /// `open` the element whose end tag closes this frame (`None` at top
    /// level). `depth` counts the open elements above this frame.
    fn children(
        &mut self,
        mut current: NodeId,
        context_binding: Option<BindingId>,
        open: Option<&'t ElementToken>,
        depth: usize,
    ) -> Result<(), Incomplete<'t>> {
        let tokens = self.tokens;
        while let Some(token) = tokens.get(self.pos) {
            self.pos += 1;
            match token {
                Token::Directive(directive) => {
                    if let Some(node) = self.directive(current, directive) {
                        current = node;
                    }
                }
                Token::Element(element) => match element.node_type {
                    NodeType::End => {
                        return match open {
                            Some(open) if open.tag == element.tag => Ok(()),
                            _ => Err(Incomplete::Unbalanced(Some(element.location))),
                        };
                    }
                    NodeType::Empty => {
                        self.binding_node(current, context_binding, element);
                    }
                    NodeType::Start => {
                        if depth >= MAX_NESTING {
                            return Err(Incomplete::TooDeep(element));
                        }
                        let inner = self.binding_node(current, context_binding, element);
                        let (node, binding) = match inner {
                            Some((node, binding)) => (node, binding.or(context_binding)),
                            None => (current, context_binding),
                        };
                        self.children(node, binding, Some(element), depth + 1)?;
                    }
                },
            }
        }
        match open {
            Some(open) => Err(Incomplete::Unbalanced(Some(open.location))),
            None => Ok(()),
        }
    }

    /// Returns the node that becomes active, if the directive opens one.
    fn directive(&mut self, current: NodeId, directive: &Directive) -> Option<NodeId> {
        match directive {
            Directive::Import(import) => {
                for alias in import.aliases() {
                    self.registry.import(alias);
                }
                self.document.imports.push(import.clone());
                None
            }
            Directive::ViewModel { location, type_ref } => {
                self.viewmodels.push(type_ref.clone());
                let root = self.document.root;
                let NodeKind::Type(root_type) = &mut self.document.node_mut(root).kind else {
                    return None;
                };
                if root_type.type_ref.is_none() {
                    root_type.type_ref = Some(type_ref.clone());
                    root_type.location = Some(*location);
                    return None;
                }
                self.report(
                    DiagnosticKind::MultipleViewmodelReferences,
                    Some(*location),
                    &[],
                );
                Some(self.document.add_node(
                    current,
                    NodeKind::Type(TypeNode {
                        type_ref: Some(type_ref.clone()),
                        is_root: true,
                        location: Some(*location),
                    }),
                ))
            }
            Directive::Context { location, type_ref } => Some(self.document.add_node(
                current,
                NodeKind::Type(TypeNode {
                    type_ref: Some(type_ref.clone()),
                    is_root: false,
                    location: Some(*location),
                }),
            )),
            Directive::Diagnostics {
                location,
                keys,
                enable,
            } => {
                let next = if *enable {
                    self.suppression.enable(keys)
                } else {
                    self.suppression.disable(keys)
                };
                self.suppression = Arc::new(next);
                self.document
                    .suppression
                    .push(location.start(), Arc::clone(&self.suppression));
                None
            }
        }
    }

    /// Creates the binding node for `element` when it carries bindings.
    /// Returns the node and its context-generating binding, if any.
    fn binding_node(
        &mut self,
        current: NodeId,
        context_binding: Option<BindingId>,
        element: &ElementToken,
    ) -> Option<(NodeId, Option<BindingId>)> {
        let file_path = self.document.file_path.clone();
        let mut parsed = Vec::new();
        for data in &element.bindings {
            match parse_binding_expression(&file_path, data) {
                Ok(bindings) => parsed.extend(bindings),
                Err(diagnostic) => self.diagnostics.push(diagnostic),
            }
        }
        if parsed.is_empty() {
            return None;
        }

        if element.is_virtual && parsed.len() > 1 {
            self.report(
                DiagnosticKind::MultipleCommentBindings,
                Some(element.location),
                &[],
            );
        }

        let declared: Vec<&str> = parsed
            .iter()
            .map(|binding| binding.handler.value.as_str())
            .filter(|name| self.registry.is_declared(name))
            .collect();
        let conflicting = declared.len() > 1;
        if conflicting {
            let names = declared.join(", ");
            self.report(
                DiagnosticKind::MultipleContextBindings,
                Some(element.location),
                &[&names],
            );
        }

        let node = self.document.add_node(
            current,
            NodeKind::Binding(BindingNode {
                tag: element.tag.clone(),
                location: element.location,
                bindings: Vec::new(),
                is_virtual: element.is_virtual,
                conflicting,
            }),
        );

        let mut ids = Vec::with_capacity(parsed.len());
        let mut generating = None;
        for binding in parsed {
            let is_context = self.registry.is_context_generating(&binding.handler.value);
            let id = self.document.add_binding(Binding {
                id: BindingId(0),
                handler: binding.handler,
                expression: binding.expression,
                alias: binding.alias,
                node,
                parent: context_binding,
                children: Vec::new(),
            });
            if is_context && generating.is_none() {
                generating = Some(id);
            }
            ids.push(id);
        }
        if let NodeKind::Binding(binding_node) = &mut self.document.node_mut(node).kind {
            binding_node.bindings = ids;
        }
        Some((node, generating))
    }

    fn finish(&mut self) {
        if self.document.viewmodel().is_none() {
            self.report(DiagnosticKind::NoViewmodelReference, None, &[]);
        }
        let viewmodels = std::mem::take(&mut self.viewmodels);
        for type_ref in &viewmodels {
            let root_name = type_ref.root_name();
            if !self.document.is_imported(root_name) {
                self.report(
                    DiagnosticKind::CouldNotFindViewmodel,
                    Some(type_ref.name.location),
                    &[root_name],
                );
            }
        }
    }
}
