//! Per-view pipeline and batch linting.
//!
//! `tokenize → build → resolve`, one view at a time. Views are independent,
//! so a batch runs them on the rayon pool and merges the results once every
//! view has reached its fixed point; severity overrides are applied to the
//! merged list so they act on the whole run at once.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::context::HandlerRegistry;
use crate::diagnostic::{apply_severity_overrides, Diagnostic, Severity};
use crate::document_builder::build;
use crate::lexer::{strip_bom, tokenize, LexerOptions, DEFAULT_BINDING_ATTRIBUTE};
use crate::oracle::{OracleError, TypeOracle};
use crate::probe::{ProbeOutput, DEFAULT_TYPE_LIBRARY};
use crate::resolve::{resolve, ResolvedView};
use crate::syntax_tree::Document;

#[derive(Debug, Error)]
pub enum LintError {
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error("invalid lint options: {0}")]
    Options(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LintOptions {
    /// Attribute names read like `data-bind`, in addition to it.
    pub binding_attributes: Vec<String>,
    /// Handlers that create child contexts, in addition to the standard ones.
    pub context_handlers: Vec<String>,
    pub force_xml: bool,
    /// Module the probe scaffold imports its context types from.
    pub type_library: String,
    /// Severity per diagnostic code or name.
    pub severity: HashMap<String, Severity>,
}

impl Default for LintOptions {
    fn default() -> Self {
        Self {
            binding_attributes: Vec::new(),
            context_handlers: Vec::new(),
            force_xml: false,
            type_library: DEFAULT_TYPE_LIBRARY.to_string(),
            severity: HashMap::new(),
        }
    }
}

impl LintOptions {
    pub fn from_json(json: &str) -> Result<Self, LintError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn lexer_options(&self) -> LexerOptions {
        let mut binding_attributes = vec![DEFAULT_BINDING_ATTRIBUTE.to_string()];
        for attribute in &self.binding_attributes {
            if !binding_attributes.contains(attribute) {
                binding_attributes.push(attribute.clone());
            }
        }
        LexerOptions {
            binding_attributes,
            force_xml: self.force_xml,
        }
    }

    pub fn registry(&self) -> HandlerRegistry {
        HandlerRegistry::new(&self.context_handlers)
    }
}

/// One view to lint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub file_path: String,
    pub text: String,
}

impl View {
    pub fn new(file_path: &str, text: &str) -> Self {
        Self {
            file_path: file_path.to_string(),
            text: text.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct ParsedView {
    /// `None` when the markup could not be turned into a tree.
    pub document: Option<Document>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Tokenizes and builds one view without resolving it.
pub fn parse_view(file_path: &str, text: &str, options: &LintOptions) -> ParsedView {
    let text = strip_bom(text);
    let tokenized = match tokenize(file_path, text, &options.lexer_options()) {
        Ok(tokenized) => tokenized,
        Err(diagnostic) => {
            tracing::debug!(file = file_path, "markup rejected by the lexer");
            return ParsedView {
                document: None,
                diagnostics: vec![diagnostic],
            };
        }
    };
    let built = build(file_path, text, &tokenized, &options.registry());
    ParsedView {
        document: built.document,
        diagnostics: built.diagnostics,
    }
}

#[derive(Debug)]
pub struct ViewResult {
    pub file_path: String,
    pub diagnostics: Vec<Diagnostic>,
    /// `None` for views that were dropped or declare no viewmodel.
    pub resolved: Option<ResolvedView>,
}

/// Lints one view. Severity overrides are not applied here.
pub fn lint_view<O: TypeOracle>(
    view: &View,
    oracle: &O,
    options: &LintOptions,
) -> Result<ViewResult, LintError> {
    let ParsedView {
        document,
        mut diagnostics,
    } = parse_view(&view.file_path, &view.text, options);

    let resolved = match document {
        Some(document) if document.viewmodel().is_some() => {
            let resolved = resolve(&document, &options.registry(), oracle, &options.type_library)?;
            diagnostics.extend(resolved.diagnostics.iter().cloned());
            Some(resolved)
        }
        _ => None,
    };

    Ok(ViewResult {
        file_path: view.file_path.clone(),
        diagnostics,
        resolved,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LintResult {
    pub diagnostics: Vec<Diagnostic>,
    pub outputs: Vec<ProbeOutput>,
}

/// Lints every view and merges the results in input order.
///
/// Any oracle failure aborts the whole batch.
pub fn lint_views<O: TypeOracle>(
    views: &[View],
    oracle: &O,
    options: &LintOptions,
) -> Result<LintResult, LintError> {
    let _span = tracing::debug_span!("lint_views", views = views.len()).entered();

    let results = views
        .par_iter()
        .map(|view| lint_view(view, oracle, options))
        .collect::<Result<Vec<_>, _>>()?;

    let mut diagnostics = Vec::new();
    let mut outputs = Vec::new();
    for result in results {
        diagnostics.extend(result.diagnostics);
        if let Some(resolved) = result.resolved {
            outputs.push(resolved.probe);
        }
    }
    let diagnostics = apply_severity_overrides(diagnostics, &options.severity);

    tracing::debug!(
        diagnostics = diagnostics.len(),
        outputs = outputs.len(),
        "lint run complete"
    );
    Ok(LintResult {
        diagnostics,
        outputs,
    })
}
