use crate::syntax_tree::{Binding, BindingNode, Document, NodeId, NodeKind, TypeNode};

/// The SyntaxVisitor trait is the single traversal mechanism for view syntax trees.
///
/// Rules:
/// 1. Children are visited in document order.
/// 2. Implementers override `visit_*` methods to add behavior.
/// 3. Implementers call the matching `walk_*` function to keep descending;
///    not calling it prunes the subtree.
pub trait SyntaxVisitor {
    fn visit_document(&mut self, document: &Document) {
        walk_document(self, document);
    }

    fn visit_node(&mut self, document: &Document, id: NodeId) {
        walk_node(self, document, id);
    }

    fn visit_type_node(&mut self, document: &Document, id: NodeId, _node: &TypeNode) {
        walk_children(self, document, id);
    }

    fn visit_binding_node(&mut self, document: &Document, id: NodeId, node: &BindingNode) {
        walk_binding_node(self, document, id, node);
    }

    fn visit_binding(&mut self, _document: &Document, _binding: &Binding) {
        // Leaf, nothing to walk by default
    }
}

pub fn walk_document<V: SyntaxVisitor + ?Sized>(visitor: &mut V, document: &Document) {
    visitor.visit_node(document, document.root);
}

pub fn walk_node<V: SyntaxVisitor + ?Sized>(visitor: &mut V, document: &Document, id: NodeId) {
    match &document.node(id).kind {
        NodeKind::Type(node) => visitor.visit_type_node(document, id, node),
        NodeKind::Binding(node) => visitor.visit_binding_node(document, id, node),
    }
}

pub fn walk_binding_node<V: SyntaxVisitor + ?Sized>(
    visitor: &mut V,
    document: &Document,
    id: NodeId,
    node: &BindingNode,
) {
    for binding in &node.bindings {
        visitor.visit_binding(document, document.binding(*binding));
    }
    walk_children(visitor, document, id);
}

pub fn walk_children<V: SyntaxVisitor + ?Sized>(visitor: &mut V, document: &Document, id: NodeId) {
    for child in &document.node(id).children {
        visitor.visit_node(document, *child);
    }
}
