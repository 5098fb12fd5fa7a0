//! Iterative Resolution Engine
//!
//! Discovers the binding context of every binding node by asking the type
//! oracle. Each iteration takes the frontier nodes whose enclosing context is
//! already known, probes the members in scope for those contexts, then probes
//! the result type of every binding on those nodes. A binding whose result
//! type differs from its input context spawns a child context for the node's
//! content. Every iteration resolves at least one node, so the frontier only
//! shrinks and the loop runs at most once per level of binding nesting.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::binding_parser::ForeachAlias;
use crate::context::{ContextGraph, ContextId, ContextOrigin, HandlerRegistry};
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::location::Location;
use crate::oracle::{OracleDiagnostic, OracleError, TypeOracle, TypeShape};
use crate::probe::{scope_probe_name, ProbeBuilder, ProbeOutput};
use crate::syntax_tree::{BindingId, Document, NodeId, NodeKind};

/// The context a node is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Assignment {
    Context(ContextId),
    /// No statically known context; nothing below is type checked.
    Unknown,
}

impl Assignment {
    pub fn context(&self) -> Option<ContextId> {
        match self {
            Assignment::Context(id) => Some(*id),
            Assignment::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionStats {
    pub iterations: usize,
    /// Frontier size at the start of each iteration.
    pub frontier_sizes: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct ResolvedView {
    pub contexts: ContextGraph,
    /// Context the bindings of each binding node are evaluated in.
    pub assignments: BTreeMap<NodeId, Assignment>,
    /// Context each binding node hands to its content.
    pub outgoing: BTreeMap<NodeId, Assignment>,
    pub probe: ProbeOutput,
    pub stats: ResolutionStats,
    pub diagnostics: Vec<Diagnostic>,
}

impl ResolvedView {
    pub fn assignment(&self, node: NodeId) -> Option<Assignment> {
        self.assignments.get(&node).copied()
    }
}

/// Resolves every binding node of `document` against `oracle`.
///
/// Only oracle failures are errors; everything else ends up in
/// [`ResolvedView::diagnostics`], filtered by the view's suppression
/// directives.
pub fn resolve<O: TypeOracle>(
    document: &Document,
    registry: &HandlerRegistry,
    oracle: &O,
    type_library: &str,
) -> Result<ResolvedView, OracleError> {
    let _span = tracing::debug_span!("resolve", file = %document.file_path).entered();

    let mut registry = registry.clone();
    let imported = document.imported_handlers();
    for handler in &imported {
        registry.import(handler);
    }

    let mut probe = ProbeBuilder::new(&document.file_path, type_library);
    probe.emit_imports(&document.imports);
    probe.emit_custom_transforms(imported.iter().map(String::as_str));

    let mut engine = Engine {
        document,
        registry,
        oracle,
        probe,
        unit: None,
        contexts: ContextGraph::new(),
        type_contexts: HashMap::new(),
        assignments: BTreeMap::new(),
        outgoing: BTreeMap::new(),
        scopes: HashMap::new(),
        context_types: HashMap::new(),
        diagnostics: Vec::new(),
        stats: ResolutionStats::default(),
    };
    engine.seed_root();

    let mut frontier: BTreeSet<NodeId> = document.binding_nodes().into_iter().collect();
    while !frontier.is_empty() {
        frontier = engine.step(frontier)?;
    }
    engine.finish()
}

struct Engine<'d, O: TypeOracle> {
    document: &'d Document,
    registry: HandlerRegistry,
    oracle: &'d O,
    probe: ProbeBuilder,
    unit: Option<O::Unit>,
    contexts: ContextGraph,
    /// Outgoing context of each type node reached so far.
    type_contexts: HashMap<NodeId, Assignment>,
    assignments: BTreeMap<NodeId, Assignment>,
    outgoing: BTreeMap<NodeId, Assignment>,
    /// Members in scope per context, once probed.
    scopes: HashMap<ContextId, TypeShape>,
    /// Type of each context value, once probed.
    context_types: HashMap<ContextId, TypeShape>,
    diagnostics: Vec<Diagnostic>,
    stats: ResolutionStats,
}

impl<'d, O: TypeOracle> Engine<'d, O> {
    fn report(&mut self, kind: DiagnosticKind, location: Option<Location>, args: &[&str]) {
        self.diagnostics
            .push(Diagnostic::new(kind, &self.document.file_path, location, args));
    }

    fn seed_root(&mut self) {
        let root = self.document.root;
        let assignment = match self.document.viewmodel() {
            Some(type_ref) => {
                let context = self.contexts.create_root(root, Some(type_ref.type_text()));
                self.probe.emit_root_context(context, type_ref);
                Assignment::Context(context)
            }
            None => Assignment::Unknown,
        };
        self.type_contexts.insert(root, assignment);
    }

    /// Context handed to the content of `node`, or `None` while `node` is
    /// still on the frontier. Reaching a type node creates its context.
    fn outgoing_of(&mut self, node: NodeId) -> Option<Assignment> {
        let document = self.document;
        let ast = document.node(node);
        let type_node = match &ast.kind {
            NodeKind::Binding(_) => return self.outgoing.get(&node).copied(),
            NodeKind::Type(type_node) => type_node,
        };
        if let Some(assignment) = self.type_contexts.get(&node) {
            return Some(*assignment);
        }

        let assignment = match (&type_node.type_ref, type_node.is_root) {
            (Some(type_ref), true) => {
                let context = self.contexts.create_root(node, Some(type_ref.type_text()));
                self.probe.emit_root_context(context, type_ref);
                Assignment::Context(context)
            }
            (Some(type_ref), false) => {
                let parent = match ast.parent {
                    Some(parent) => self.outgoing_of(parent)?,
                    None => Assignment::Unknown,
                };
                match parent {
                    Assignment::Context(parent) => {
                        let context = self.contexts.create_child(
                            parent,
                            ContextOrigin::Directive(node),
                            Some(type_ref.type_text()),
                        );
                        self.probe.emit_directive_context(context, type_ref, parent);
                        Assignment::Context(context)
                    }
                    Assignment::Unknown => Assignment::Unknown,
                }
            }
            (None, _) => Assignment::Unknown,
        };
        self.type_contexts.insert(node, assignment);
        Some(assignment)
    }

    fn compile(&mut self) -> Result<(), OracleError> {
        let source = self.probe.commit();
        tracing::trace!(revision = source.revision, "compiling probe");
        let unit = self.oracle.compile(&source, self.unit.take())?;
        self.unit = Some(unit);
        Ok(())
    }

    fn inspect(&self, identifiers: &[String]) -> Result<BTreeMap<String, TypeShape>, OracleError> {
        let unit = self
            .unit
            .as_ref()
            .ok_or_else(|| OracleError::UnknownUnit(self.probe.probe_file().to_string()))?;
        tracing::trace!(count = identifiers.len(), "inspecting probe identifiers");
        self.oracle.inspect(unit, identifiers)
    }

    /// One iteration: resolves the ready part of `frontier` and returns the
    /// rest.
    fn step(&mut self, mut frontier: BTreeSet<NodeId>) -> Result<BTreeSet<NodeId>, OracleError> {
        self.stats.iterations += 1;
        self.stats.frontier_sizes.push(frontier.len());
        let _span = tracing::debug_span!(
            "iteration",
            n = self.stats.iterations,
            frontier = frontier.len()
        )
        .entered();

        let document = self.document;
        let mut ready = Vec::new();
        for node in &frontier {
            let Some(parent) = document.node(*node).parent else {
                continue;
            };
            if let Some(assignment) = self.outgoing_of(parent) {
                ready.push((*node, assignment));
            }
        }

        if ready.is_empty() {
            // Only reachable for a malformed tree.
            tracing::warn!(left = frontier.len(), "no progress, marking the rest unknown");
            for node in frontier {
                self.assignments.insert(node, Assignment::Unknown);
                self.outgoing.insert(node, Assignment::Unknown);
            }
            return Ok(BTreeSet::new());
        }
        for (node, _) in &ready {
            frontier.remove(node);
        }

        self.probe_scopes(&ready)?;

        let mut evaluated = Vec::new();
        for (node, assignment) in &ready {
            self.assignments.insert(*node, *assignment);
            let in_scope = assignment
                .context()
                .and_then(|context| self.scopes.get(&context))
                .filter(|scope| !scope.is_dynamic())
                .cloned();
            let (Some(context), Some(scope)) = (assignment.context(), in_scope) else {
                self.outgoing.insert(*node, Assignment::Unknown);
                continue;
            };
            for binding in self.binding_ids(*node) {
                let binding = document.binding(binding);
                self.probe
                    .emit_transformation(binding, context, scope.members());
            }
            evaluated.push((*node, context));
        }

        if !evaluated.is_empty() {
            self.compile()?;
            let identifiers: Vec<String> = evaluated
                .iter()
                .flat_map(|(node, _)| self.binding_ids(*node))
                .map(|binding| binding.identifier())
                .collect();
            let shapes = self.inspect(&identifiers)?;
            for (node, context) in evaluated {
                let outgoing = self.detect_child_context(node, context, &shapes);
                self.outgoing.insert(node, outgoing);
            }
        }

        tracing::debug!(
            resolved = ready.len(),
            left = frontier.len(),
            contexts = self.contexts.len(),
            revision = self.probe.revisions(),
            "iteration done"
        );
        Ok(frontier)
    }

    fn binding_ids(&self, node: NodeId) -> Vec<BindingId> {
        self.document
            .node(node)
            .as_binding_node()
            .map(|binding_node| binding_node.bindings.clone())
            .unwrap_or_default()
    }

    /// Probes the scope of every context in `ready` not probed before.
    fn probe_scopes(&mut self, ready: &[(NodeId, Assignment)]) -> Result<(), OracleError> {
        let mut pending: Vec<(ContextId, NodeId)> = Vec::new();
        for (node, assignment) in ready {
            if let Assignment::Context(context) = assignment {
                if !self.scopes.contains_key(context)
                    && !pending.iter().any(|(seen, _)| seen == context)
                {
                    pending.push((*context, *node));
                }
            }
        }
        if pending.is_empty() {
            return Ok(());
        }

        for (context, _) in &pending {
            self.probe.emit_scope_probe(*context);
        }
        self.compile()?;
        let identifiers: Vec<String> = pending
            .iter()
            .flat_map(|(context, _)| [scope_probe_name(*context), context.name()])
            .collect();
        let shapes = self.inspect(&identifiers)?;

        for (context, node) in pending {
            let scope = shapes
                .get(&scope_probe_name(context))
                .cloned()
                .unwrap_or(TypeShape::Dynamic);
            let context_type = shapes
                .get(&context.name())
                .cloned()
                .unwrap_or(TypeShape::Dynamic);
            if scope.is_dynamic() {
                let location = self
                    .document
                    .node(node)
                    .as_binding_node()
                    .map(|binding_node| binding_node.location);
                self.report(DiagnosticKind::BindingContextUnknown, location, &[]);
            }
            self.scopes.insert(context, scope);
            self.context_types.insert(context, context_type);
        }
        Ok(())
    }

    /// Decides what `node` hands to its content, spawning a child context when
    /// exactly one binding changes the type of `context`.
    fn detect_child_context(
        &mut self,
        node: NodeId,
        context: ContextId,
        shapes: &BTreeMap<String, TypeShape>,
    ) -> Assignment {
        let document = self.document;
        let Some(binding_node) = document.node(node).as_binding_node() else {
            return Assignment::Context(context);
        };
        let parent_type = self
            .context_types
            .get(&context)
            .and_then(|shape| shape.type_id())
            .map(str::to_string);

        let mut candidates: Vec<(BindingId, TypeShape)> = Vec::new();
        for id in &binding_node.bindings {
            let binding = document.binding(*id);
            if binding.alias == Some(ForeachAlias::Undeterminable) {
                self.report(
                    DiagnosticKind::UnknownScope,
                    Some(binding.handler.location),
                    &[binding.name()],
                );
                continue;
            }
            let shape = shapes
                .get(&binding.identifier())
                .cloned()
                .unwrap_or(TypeShape::Dynamic);
            let changes_type = shape
                .type_id()
                .map(|type_id| Some(type_id) != parent_type.as_deref());
            match changes_type {
                None => self.report(
                    DiagnosticKind::BindingUnknown,
                    Some(binding.handler.location),
                    &[binding.name()],
                ),
                Some(true) => candidates.push((*id, shape)),
                Some(false) => {}
            }
        }

        if binding_node.conflicting {
            return Assignment::Context(context);
        }
        match candidates.len() {
            0 => Assignment::Context(context),
            1 => {
                let (id, shape) = candidates.remove(0);
                let binding = document.binding(id);
                if !self.registry.is_context_generating(binding.name()) {
                    tracing::debug!(
                        handler = binding.name(),
                        "unregistered handler changes the context"
                    );
                }
                let child = self
                    .contexts
                    .create_child(context, ContextOrigin::Binding(id), None);
                self.probe.emit_binding_context(child, binding);
                self.context_types.insert(child, shape);
                Assignment::Context(child)
            }
            _ => {
                self.report(
                    DiagnosticKind::MultipleContextGeneratingBindings,
                    Some(binding_node.location),
                    &[],
                );
                Assignment::Context(context)
            }
        }
    }

    fn finish(mut self) -> Result<ResolvedView, OracleError> {
        if self.probe.has_pending() {
            self.compile()?;
        }
        let unit = self
            .unit
            .as_ref()
            .ok_or_else(|| OracleError::UnknownUnit(self.probe.probe_file().to_string()))?;
        let reported = self.oracle.diagnostics(unit)?;
        tracing::debug!(count = reported.len(), "oracle diagnostics");
        for diagnostic in &reported {
            if let Some(mapped) = self.map_oracle_diagnostic(diagnostic) {
                self.diagnostics.push(mapped);
            }
        }

        let document = self.document;
        let timeline = &document.suppression;
        let diagnostics = self
            .diagnostics
            .into_iter()
            .filter(|diagnostic| timeline.allows(diagnostic))
            .collect();
        Ok(ResolvedView {
            contexts: self.contexts,
            assignments: self.assignments,
            outgoing: self.outgoing,
            probe: self.probe.finish(),
            stats: self.stats,
            diagnostics,
        })
    }

    /// Moves an oracle diagnostic from probe coordinates to the markup. Without
    /// a mapping it stays attached to the file.
    fn map_oracle_diagnostic(&self, diagnostic: &OracleDiagnostic) -> Option<Diagnostic> {
        if diagnostic.file != self.probe.probe_file() {
            tracing::debug!(file = %diagnostic.file, "skipping diagnostic outside the probe");
            return None;
        }
        let map = self.probe.merged_map();
        let location = self.probe.translate(diagnostic.start).and_then(|mapped| {
            if map.sources().get(mapped.source)? != &self.document.file_path {
                return None;
            }
            let text_len = self.document.text().len() as u32;
            let start = mapped.offset.min(text_len);
            let end = if mapped.exact {
                (start + diagnostic.length).min(text_len)
            } else {
                start
            };
            Some(self.document.line_index.location(start, end))
        });
        Some(Diagnostic::from_oracle(
            &self.document.file_path,
            diagnostic.code,
            &diagnostic.message,
            diagnostic.severity,
            location,
        ))
    }
}
