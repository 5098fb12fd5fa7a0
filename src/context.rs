//! Binding-Context Model
//!
//! Contexts form a forest: one root per viewmodel declaration and one child per
//! context-generating binding (or `ko-context` directive) discovered during
//! resolution. Ids are indices into the graph, so `context_<n>` names are
//! reproducible for a given input.

use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

use crate::syntax_tree::{BindingId, NodeId};

/// Handlers that replace the data scope of their descendants.
pub const STANDARD_CONTEXT_HANDLERS: [&str; 4] = ["foreach", "with", "using", "let"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ContextId(pub usize);

impl ContextId {
    pub fn name(&self) -> String {
        format!("context_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContextOrigin {
    /// A viewmodel declaration.
    Root(NodeId),
    /// A `ko-context` directive.
    Directive(NodeId),
    /// A context-generating binding.
    Binding(BindingId),
}

#[derive(Debug, Clone, Serialize)]
pub struct BindingContext {
    pub id: ContextId,
    /// Declared type text (`typeof vm`, `Item`), when the context has one.
    pub type_assertion: Option<String>,
    pub parent: Option<ContextId>,
    pub children: Vec<ContextId>,
    pub origin: ContextOrigin,
}

impl BindingContext {
    pub fn name(&self) -> String {
        self.id.name()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ContextGraph {
    contexts: Vec<BindingContext>,
    roots: Vec<ContextId>,
}

impl ContextGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_root(&mut self, node: NodeId, type_assertion: Option<String>) -> ContextId {
        let id = ContextId(self.contexts.len());
        self.contexts.push(BindingContext {
            id,
            type_assertion,
            parent: None,
            children: Vec::new(),
            origin: ContextOrigin::Root(node),
        });
        self.roots.push(id);
        id
    }

    /// Spawns a child of `parent`. The parent only ever gains children.
    pub fn create_child(
        &mut self,
        parent: ContextId,
        origin: ContextOrigin,
        type_assertion: Option<String>,
    ) -> ContextId {
        let id = ContextId(self.contexts.len());
        self.contexts.push(BindingContext {
            id,
            type_assertion,
            parent: Some(parent),
            children: Vec::new(),
            origin,
        });
        self.contexts[parent.0].children.push(id);
        id
    }

    pub fn get(&self, id: ContextId) -> &BindingContext {
        &self.contexts[id.0]
    }

    pub fn roots(&self) -> &[ContextId] {
        &self.roots
    }

    pub fn iter(&self) -> impl Iterator<Item = &BindingContext> {
        self.contexts.iter()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: ContextId) -> Vec<ContextId> {
        let mut chain = Vec::new();
        let mut current = self.get(id).parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.get(parent).parent;
        }
        chain
    }

    /// True when a walk from the roots reaches every context exactly once and
    /// every non-root names the context that lists it as a child.
    pub fn is_forest(&self) -> bool {
        let mut seen = HashSet::new();
        let mut stack: Vec<ContextId> = self.roots.clone();
        if stack.iter().any(|root| self.get(*root).parent.is_some()) {
            return false;
        }
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                return false;
            }
            for child in &self.get(id).children {
                if self.get(*child).parent != Some(id) {
                    return false;
                }
                stack.push(*child);
            }
        }
        seen.len() == self.contexts.len()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLER REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// Which binding handlers may create child contexts.
///
/// Standard and configured handlers are known before a view is read; handlers
/// imported by the view are only known once its imports are seen.
#[derive(Debug, Clone)]
pub struct HandlerRegistry {
    declared: BTreeSet<String>,
    imported: BTreeSet<String>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl HandlerRegistry {
    pub fn new(configured: &[String]) -> Self {
        let mut declared: BTreeSet<String> = STANDARD_CONTEXT_HANDLERS
            .iter()
            .map(|name| name.to_string())
            .collect();
        declared.extend(configured.iter().cloned());
        Self {
            declared,
            imported: BTreeSet::new(),
        }
    }

    /// Registers an imported symbol that the view also uses as a handler.
    pub fn import(&mut self, name: &str) {
        if !self.declared.contains(name) {
            self.imported.insert(name.to_string());
        }
    }

    /// Standard or configured; what the static one-per-node check counts.
    pub fn is_declared(&self, name: &str) -> bool {
        self.declared.contains(name)
    }

    pub fn is_context_generating(&self, name: &str) -> bool {
        self.declared.contains(name) || self.imported.contains(name)
    }

    pub fn imported(&self) -> &BTreeSet<String> {
        &self.imported
    }
}
