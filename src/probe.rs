//! Probe code synthesis.
//!
//! Probe code is TypeScript whose only purpose is to let the type oracle
//! answer "what is in scope here" and "what does this binding produce". It is
//! append-only: each revision is the previous revision plus new declarations.
//! Every revision gets its own [`SourceMap`] (prefix to the previous revision,
//! new text to the markup), and the merged map always points straight at the
//! markup.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;

use crate::context::ContextId;
use crate::lexer::{Identifier, ImportDirective, TypeReference};
use crate::location::Location;
use crate::oracle::SourceUnit;
use crate::source_map::{Mapped, PositionChain, SourceMap, SourceMapV3};
use crate::syntax_tree::Binding;

lazy_static! {
    static ref RESERVED_WORDS: HashSet<&'static str> = [
        "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete",
        "do", "else", "enum", "export", "extends", "false", "finally", "for", "function", "if",
        "import", "in", "instanceof", "new", "null", "return", "super", "switch", "this", "throw",
        "true", "try", "typeof", "var", "void", "while", "with", "as", "implements", "interface",
        "let", "package", "private", "protected", "public", "static", "yield", "any", "boolean",
        "constructor", "declare", "get", "module", "require", "number", "set", "string", "symbol",
        "type", "from", "of", "namespace", "maybe", "async", "await", "arguments",
    ]
    .into_iter()
    .collect();
    static ref IDENTIFIER_RE: Regex = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap();
}

pub const DEFAULT_TYPE_LIBRARY: &str = "kolint/context";

/// Members that can be destructured into a local binding.
pub fn is_bindable_member(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name) && !RESERVED_WORDS.contains(name) && !name.starts_with("__")
}

pub fn scope_probe_name(context: ContextId) -> String {
    format!("scope_{}", context.name())
}

/// `value` as a double-quoted TypeScript string literal.
pub fn string_literal(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn scaffold(type_library: &str) -> String {
    [
        format!(
            "import {{ RootBindingContext, ChildBindingContext, StandardBindingContextTransforms, BindingContextTransform }} from {}",
            string_literal(type_library)
        ),
        "type BindingContextTransforms = StandardBindingContextTransforms & CustomBindingTransforms".to_string(),
        "function getBindingContextFactory<K extends keyof BindingContextTransforms>(bindingHandlerName: K) {".to_string(),
        "\tvoid bindingHandlerName".to_string(),
        "\tconst factory: BindingContextTransforms[K] = 0 as any".to_string(),
        "\treturn factory".to_string(),
        "}\n".to_string(),
    ]
    .join("\n")
}

/// Probe text and maps of one view after resolution.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeOutput {
    pub file_path: String,
    pub probe_file: String,
    pub code: String,
    pub revisions: usize,
    pub source_map: SourceMap,
}

impl ProbeOutput {
    pub fn source_map_v3(&self, markup: &str) -> SourceMapV3 {
        self.source_map.to_v3(&self.code, &[markup])
    }
}

#[derive(Debug, Clone)]
pub struct ProbeBuilder {
    markup_file: String,
    probe_file: String,
    text: String,
    pending: String,
    /// (chunk start, chunk end, markup offset, name) of the pending text.
    pending_mappings: Vec<(u32, u32, u32, Option<String>)>,
    chain: PositionChain,
    merged: SourceMap,
    revision: usize,
}

impl ProbeBuilder {
    /// Starts revision 0 with the scaffold.
    pub fn new(markup_file: &str, type_library: &str) -> Self {
        Self {
            markup_file: markup_file.to_string(),
            probe_file: format!("{}.ts", markup_file),
            text: String::new(),
            pending: scaffold(type_library),
            pending_mappings: Vec::new(),
            chain: PositionChain::new(),
            merged: SourceMap::new(""),
            revision: 0,
        }
    }

    fn revision_name(&self, revision: usize) -> String {
        format!("{}#{}", self.probe_file, revision)
    }

    pub fn probe_file(&self) -> &str {
        &self.probe_file
    }

    /// Number of committed revisions.
    pub fn revisions(&self) -> usize {
        self.revision
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn emit(&mut self, text: &str) {
        self.pending.push_str(text);
    }

    /// Emits markup text verbatim and maps it back to `location`.
    pub fn emit_mapped(&mut self, text: &str, location: &Location, name: Option<&str>) {
        self.emit_at(text, location.start(), location.len(), name);
    }

    /// Emits `value` as a string literal mapped onto the quotes around
    /// `location` in the markup.
    fn emit_quoted(&mut self, value: &str, location: &Location) {
        let literal = string_literal(value);
        self.emit_at(&literal, location.start().saturating_sub(1), location.len() + 2, None);
    }

    fn emit_at(&mut self, text: &str, original: u32, original_len: u32, name: Option<&str>) {
        let start = self.pending.len() as u32;
        self.pending.push_str(text);
        let end = self.pending.len() as u32;
        let len = (end - start).min(original_len);
        self.pending_mappings
            .push((start, start + len, original, name.map(str::to_string)));
    }

    /// Adds a one-byte segment at the start of every unmapped stretch of
    /// pending text since `chunk_start`, pointing at `original`. Offsets in
    /// the stretch then translate coarsely to `original` instead of to
    /// whatever was mapped before the chunk.
    fn anchor_unmapped(&mut self, chunk_start: u32, original: u32) {
        let chunk_end = self.pending.len() as u32;
        let first = self
            .pending_mappings
            .partition_point(|mapping| mapping.0 < chunk_start);
        let inner = self.pending_mappings.split_off(first);
        let mut cursor = chunk_start;
        for mapping in inner {
            if mapping.0 > cursor {
                self.pending_mappings.push((cursor, cursor + 1, original, None));
            }
            cursor = cursor.max(mapping.1);
            self.pending_mappings.push(mapping);
        }
        if chunk_end > cursor {
            self.pending_mappings.push((cursor, cursor + 1, original, None));
        }
    }

    fn emit_identifier(&mut self, identifier: &Identifier) {
        self.emit_mapped(&identifier.value, &identifier.location, Some(&identifier.value));
    }

    fn emit_type(&mut self, type_ref: &TypeReference) {
        if !type_ref.is_type {
            self.emit("typeof ");
        }
        self.emit_mapped(&type_ref.name.value, &type_ref.name.location, None);
    }

    pub fn emit_imports(&mut self, imports: &[ImportDirective]) {
        for import in imports {
            if import.is_namespace() {
                self.emit("import * as ");
                self.emit_identifier(&import.symbols[0].alias);
            } else {
                self.emit("import { ");
                for (index, symbol) in import.symbols.iter().enumerate() {
                    if index > 0 {
                        self.emit(", ");
                    }
                    if symbol.name.value == symbol.alias.value {
                        self.emit_identifier(&symbol.name);
                    } else {
                        if symbol.name.location == symbol.alias.location {
                            self.emit(&symbol.name.value);
                        } else {
                            self.emit_identifier(&symbol.name);
                        }
                        self.emit(" as ");
                        self.emit_identifier(&symbol.alias);
                    }
                }
                self.emit(" }");
            }
            self.emit(" from ");
            self.emit_quoted(&import.module_path.value, &import.module_path.location);
            self.emit("\n");
        }
    }

    /// Declares the handlers imported by the view as context transforms.
    pub fn emit_custom_transforms<'h>(&mut self, handlers: impl IntoIterator<Item = &'h str>) {
        self.emit("interface CustomBindingTransforms {\n");
        for handler in handlers {
            self.emit(&format!(
                "{}: BindingContextTransform<{}>\n",
                string_literal(handler),
                handler
            ));
        }
        self.emit("}\n");
    }

    pub fn emit_root_context(&mut self, context: ContextId, type_ref: &TypeReference) {
        self.emit(&format!("const {}: RootBindingContext<", context.name()));
        self.emit_type(type_ref);
        self.emit("> = (undefined as any)\n");
    }

    /// Context opened by a `ko-context` directive.
    pub fn emit_directive_context(
        &mut self,
        context: ContextId,
        type_ref: &TypeReference,
        parent: ContextId,
    ) {
        self.emit(&format!("const {}: ChildBindingContext<", context.name()));
        self.emit_type(type_ref);
        self.emit(&format!(", typeof {}> = (undefined as any)\n", parent.name()));
    }

    /// Context produced by a context-generating binding.
    pub fn emit_binding_context(&mut self, context: ContextId, binding: &Binding) {
        self.emit(&format!(
            "const {} = {}\n",
            context.name(),
            binding.identifier()
        ));
    }

    /// Exposes everything in scope in `context` as one object.
    pub fn emit_scope_probe(&mut self, context: ContextId) {
        let name = context.name();
        self.emit(&format!(
            "const {} = {{ ...{}, ...{}.$data }}\n",
            scope_probe_name(context),
            name,
            name
        ));
    }

    /// Evaluates a binding's expression with the scope members as locals and
    /// passes it through the handler's context transform. Text of the chunk
    /// that is not copied from the markup maps to the binding's handler.
    pub fn emit_transformation(&mut self, binding: &Binding, context: ContextId, members: &[String]) {
        let identifier = binding.identifier();
        let locals: Vec<&str> = members
            .iter()
            .map(String::as_str)
            .filter(|member| is_bindable_member(member))
            .collect();

        let chunk_start = self.pending.len() as u32;
        self.emit(&format!(
            "function transformation_{}($context: typeof {}) {{\n",
            identifier,
            context.name()
        ));
        self.emit(&format!(
            "const {{ {} }} = {{ ...$context, ...$context.$data }}\n",
            locals.join(", ")
        ));
        self.emit("return getBindingContextFactory(");
        self.emit_quoted(&binding.handler.value, &binding.handler.location);
        self.emit(")(");
        self.emit_mapped(&binding.expression.text, &binding.expression.location, None);
        self.emit(", $context)\n}\n");
        self.emit(&format!(
            "const {0} = transformation_{0}({1})\n",
            identifier,
            context.name()
        ));
        self.anchor_unmapped(chunk_start, binding.handler.location.start());
    }

    /// Seals the pending text as a new revision and returns it for
    /// compilation.
    pub fn commit(&mut self) -> SourceUnit {
        let name = self.revision_name(self.revision);
        let mut map = SourceMap::new(&name);
        let prefix = self.text.len() as u32;

        if self.revision > 0 {
            let previous = map.add_source(&self.revision_name(self.revision - 1));
            map.add_mapping((0, prefix), previous, 0, None);
        }
        let markup = map.add_source(&self.markup_file);
        for (start, end, original, name) in self.pending_mappings.drain(..) {
            map.add_mapping((prefix + start, prefix + end), markup, original, name.as_deref());
        }

        self.merged = if self.revision > 0 {
            map.merge_with(&self.merged)
        } else {
            map.clone()
        };
        self.chain.push(map);
        self.text.push_str(&self.pending);
        self.pending.clear();

        tracing::trace!(revision = self.revision, len = self.text.len(), "committed probe revision");
        let unit = SourceUnit {
            name: self.probe_file.clone(),
            text: self.text.clone(),
            revision: self.revision,
        };
        self.revision += 1;
        unit
    }

    /// Markup offset of a position in the latest revision.
    pub fn translate(&self, offset: u32) -> Option<Mapped> {
        self.merged.translate(offset)
    }

    pub fn chain(&self) -> &PositionChain {
        &self.chain
    }

    pub fn merged_map(&self) -> &SourceMap {
        &self.merged
    }

    pub fn finish(self) -> ProbeOutput {
        let mut source_map = self.merged;
        source_map.file = self.probe_file.clone();
        ProbeOutput {
            file_path: self.markup_file,
            probe_file: self.probe_file,
            code: self.text,
            revisions: self.revision,
            source_map,
        }
    }
}
