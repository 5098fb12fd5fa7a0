//! Syntax tree of one view.
//!
//! Nodes and bindings live in flat arenas owned by the [`Document`]; parents
//! and children are indices, so the tree never holds reference cycles.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::binding_parser::{BindingExpression, ForeachAlias};
use crate::diagnostic::SuppressionTimeline;
use crate::lexer::{Dialect, Identifier, ImportDirective, TypeReference};
use crate::location::{LineIndex, Location};
use crate::visitor::{walk_children, SyntaxVisitor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BindingId(pub usize);

impl BindingId {
    /// Name of the probe-code value holding this binding's result.
    pub fn identifier(&self) -> String {
        format!("binding_{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Binding {
    pub id: BindingId,
    pub handler: Identifier,
    pub expression: BindingExpression,
    pub alias: Option<ForeachAlias>,
    pub node: NodeId,
    /// Context-generating binding on the nearest enclosing element that has one.
    pub parent: Option<BindingId>,
    pub children: Vec<BindingId>,
}

impl Binding {
    pub fn name(&self) -> &str {
        &self.handler.value
    }

    pub fn identifier(&self) -> String {
        self.id.identifier()
    }
}

/// A point where the ambient context is replaced.
#[derive(Debug, Clone, Serialize)]
pub struct TypeNode {
    pub type_ref: Option<TypeReference>,
    /// Viewmodel declaration (true) or `ko-context` directive (false).
    pub is_root: bool,
    pub location: Option<Location>,
}

/// The bindings declared on one element.
#[derive(Debug, Clone, Serialize)]
pub struct BindingNode {
    pub tag: String,
    pub location: Location,
    pub bindings: Vec<BindingId>,
    pub is_virtual: bool,
    /// More than one declared context handler on this element.
    pub conflicting: bool,
}

#[derive(Debug, Clone, Serialize)]
pub enum NodeKind {
    Type(TypeNode),
    Binding(BindingNode),
}

#[derive(Debug, Clone, Serialize)]
pub struct AstNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub kind: NodeKind,
}

impl AstNode {
    pub fn as_binding_node(&self) -> Option<&BindingNode> {
        match &self.kind {
            NodeKind::Binding(node) => Some(node),
            NodeKind::Type(_) => None,
        }
    }

    pub fn as_type_node(&self) -> Option<&TypeNode> {
        match &self.kind {
            NodeKind::Type(node) => Some(node),
            NodeKind::Binding(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub file_path: String,
    pub dialect: Dialect,
    pub root: NodeId,
    pub nodes: Vec<AstNode>,
    pub bindings: Vec<Binding>,
    pub imports: Vec<ImportDirective>,
    /// Every handler name used anywhere in the view.
    pub binding_names: BTreeSet<String>,
    pub suppression: SuppressionTimeline,
    pub line_index: LineIndex,
}

impl Document {
    pub fn new(file_path: &str, dialect: Dialect, line_index: LineIndex) -> Self {
        let root = AstNode {
            id: NodeId(0),
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Type(TypeNode {
                type_ref: None,
                is_root: true,
                location: None,
            }),
        };
        Self {
            file_path: file_path.to_string(),
            dialect,
            root: NodeId(0),
            nodes: vec![root],
            bindings: Vec::new(),
            imports: Vec::new(),
            binding_names: BTreeSet::new(),
            suppression: SuppressionTimeline::new(),
            line_index,
        }
    }

    pub fn add_node(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(AstNode {
            id,
            parent: Some(parent),
            children: Vec::new(),
            kind,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn add_binding(&mut self, mut binding: Binding) -> BindingId {
        let id = BindingId(self.bindings.len());
        binding.id = id;
        if let Some(parent) = binding.parent {
            self.bindings[parent.0].children.push(id);
        }
        self.binding_names.insert(binding.handler.value.clone());
        self.bindings.push(binding);
        id
    }

    pub fn node(&self, id: NodeId) -> &AstNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut AstNode {
        &mut self.nodes[id.0]
    }

    pub fn binding(&self, id: BindingId) -> &Binding {
        &self.bindings[id.0]
    }

    pub fn text(&self) -> &str {
        self.line_index.text()
    }

    /// The view's declared viewmodel type.
    pub fn viewmodel(&self) -> Option<&TypeReference> {
        self.node(self.root)
            .as_type_node()
            .and_then(|node| node.type_ref.as_ref())
    }

    /// Import aliases that the view also uses as binding handlers.
    pub fn imported_handlers(&self) -> BTreeSet<String> {
        self.imports
            .iter()
            .flat_map(|import| import.aliases())
            .filter(|alias| self.binding_names.contains(*alias))
            .map(str::to_string)
            .collect()
    }

    pub fn is_imported(&self, alias: &str) -> bool {
        self.imports
            .iter()
            .any(|import| import.aliases().any(|name| name == alias))
    }

    /// Binding nodes in document order.
    pub fn binding_nodes(&self) -> Vec<NodeId> {
        let mut collector = BindingNodeCollector { found: Vec::new() };
        collector.visit_document(self);
        collector.found
    }

    /// Number of binding nodes on the path from the root to `id`, inclusive.
    pub fn binding_depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = Some(id);
        while let Some(node) = current {
            if self.node(node).as_binding_node().is_some() {
                depth += 1;
            }
            current = self.node(node).parent;
        }
        depth
    }
}

struct BindingNodeCollector {
    found: Vec<NodeId>,
}

impl SyntaxVisitor for BindingNodeCollector {
    fn visit_binding_node(&mut self, document: &Document, id: NodeId, _node: &BindingNode) {
        self.found.push(id);
        walk_children(self, document, id);
    }
}
