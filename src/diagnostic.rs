//! Diagnostics
//!
//! The `KO` diagnostic catalogue, the serialized diagnostic record, severity
//! overrides, and the `ko-lint-*` suppression states of a view.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::location::Location;

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC CATALOGUE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    MultipleContextBindings,
    NoViewmodelReference,
    MultipleCommentBindings,
    JavascriptSyntaxError,
    CouldNotFindViewmodel,
    UnbalancedStartEndTags,
    BindingContextUnknown,
    ParserError,
    MultipleContextGeneratingBindings,
    BindingUnknown,
    UnknownScope,
    MultipleViewmodelReferences,
}

impl DiagnosticKind {
    pub const ALL: [DiagnosticKind; 12] = [
        DiagnosticKind::MultipleContextBindings,
        DiagnosticKind::NoViewmodelReference,
        DiagnosticKind::MultipleCommentBindings,
        DiagnosticKind::JavascriptSyntaxError,
        DiagnosticKind::CouldNotFindViewmodel,
        DiagnosticKind::UnbalancedStartEndTags,
        DiagnosticKind::BindingContextUnknown,
        DiagnosticKind::ParserError,
        DiagnosticKind::MultipleContextGeneratingBindings,
        DiagnosticKind::BindingUnknown,
        DiagnosticKind::UnknownScope,
        DiagnosticKind::MultipleViewmodelReferences,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::MultipleContextBindings => "KO0001",
            Self::NoViewmodelReference => "KO0002",
            Self::MultipleCommentBindings => "KO0003",
            Self::JavascriptSyntaxError => "KO0004",
            Self::CouldNotFindViewmodel => "KO0005",
            Self::UnbalancedStartEndTags => "KO0010",
            Self::BindingContextUnknown => "KO0012",
            Self::ParserError => "KO0014",
            Self::MultipleContextGeneratingBindings => "KO0015",
            Self::BindingUnknown => "KO0016",
            Self::UnknownScope => "KO0017",
            Self::MultipleViewmodelReferences => "KO0018",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::MultipleContextBindings => "multiple-context-bindings",
            Self::NoViewmodelReference => "no-viewmodel-reference",
            Self::MultipleCommentBindings => "multiple-comment-bindings",
            Self::JavascriptSyntaxError => "javascript-syntax-error",
            Self::CouldNotFindViewmodel => "could-not-find-viewmodel",
            Self::UnbalancedStartEndTags => "unbalanced-start-end-tags",
            Self::BindingContextUnknown => "binding-context-unknown",
            Self::ParserError => "parser-error",
            Self::MultipleContextGeneratingBindings => "multiple-context-generating-bindings",
            Self::BindingUnknown => "binding-unknown",
            Self::UnknownScope => "unknown-scope",
            Self::MultipleViewmodelReferences => "multiple-viewmodel-references",
        }
    }

    /// Message template; `$0`, `$1`, ... are replaced by positional arguments.
    fn template(&self) -> &'static str {
        match self {
            Self::MultipleContextBindings => {
                "Only one binding-handler per element can create child contexts. Move [$0] into separate elements."
            }
            Self::NoViewmodelReference => "Missing Viewmodel reference",
            Self::MultipleCommentBindings => "Can not have multiple bindings in the same comment.",
            Self::JavascriptSyntaxError => "Syntax error: $0.",
            Self::CouldNotFindViewmodel => "Could not find viewModel '$0'.",
            Self::UnbalancedStartEndTags => {
                "Unbalanced start and/or end tags results in incomplete tree."
            }
            Self::BindingContextUnknown => "Unknown type of binding context",
            Self::ParserError => "Expected $0, got \"$1\" ($2).",
            Self::MultipleContextGeneratingBindings => {
                "Multiple context generating bindings in same node are not allowed."
            }
            Self::BindingUnknown => "Type unknown for binding handler '$0'.",
            Self::UnknownScope => {
                "Scope of binding handler '$0' can not be determined: the 'as' alias must be a string literal."
            }
            Self::MultipleViewmodelReferences => {
                "Multiple viewmodel references in one view are not supported."
            }
        }
    }

    pub fn default_severity(&self) -> Severity {
        match self {
            Self::MultipleCommentBindings
            | Self::CouldNotFindViewmodel
            | Self::MultipleViewmodelReferences => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Off,
    Warning,
    Error,
}

pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut message = template.to_string();
    // Highest index first so `$1` never eats the prefix of `$10`.
    for (index, arg) in args.iter().enumerate().rev() {
        message = message.replace(&format!("${}", index), arg);
    }
    message
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: String,
    pub name: String,
    pub message: String,
    pub severity: Severity,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Diagnostic {
    pub fn new(
        kind: DiagnosticKind,
        file_path: &str,
        location: Option<Location>,
        args: &[&str],
    ) -> Self {
        Self {
            code: kind.code().to_string(),
            name: kind.name().to_string(),
            message: format_message(kind.template(), args),
            severity: kind.default_severity(),
            file_path: file_path.to_string(),
            location,
        }
    }

    /// A type error reported by the oracle against probe code, already
    /// translated to markup coordinates.
    pub fn from_oracle(
        file_path: &str,
        code: u32,
        message: &str,
        severity: Severity,
        location: Option<Location>,
    ) -> Self {
        Self {
            code: format!("TS{}", code),
            name: code.to_string(),
            message: message.to_string(),
            severity,
            file_path: file_path.to_string(),
            location,
        }
    }

    pub fn is(&self, kind: DiagnosticKind) -> bool {
        self.code == kind.code()
    }

    /// True when `key` names this diagnostic by code or by name.
    pub fn matches_key(&self, key: &str) -> bool {
        self.code == key || self.name == key
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(
                f,
                "{}:{}:{} {} {}",
                self.file_path,
                loc.first_line,
                loc.first_column + 1,
                self.code,
                self.message
            ),
            None => write!(f, "{} {} {}", self.file_path, self.code, self.message),
        }
    }
}

/// Applies per-code (or per-name) severity overrides. Diagnostics overridden to
/// [`Severity::Off`] are dropped.
pub fn apply_severity_overrides(
    diagnostics: Vec<Diagnostic>,
    overrides: &HashMap<String, Severity>,
) -> Vec<Diagnostic> {
    diagnostics
        .into_iter()
        .filter_map(|mut diagnostic| {
            let severity = overrides
                .get(&diagnostic.code)
                .or_else(|| overrides.get(&diagnostic.name))
                .copied()
                .unwrap_or(diagnostic.severity);
            if severity == Severity::Off {
                return None;
            }
            diagnostic.severity = severity;
            Some(diagnostic)
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// SUPPRESSION
// ═══════════════════════════════════════════════════════════════════════════════

/// Which diagnostics are silenced at one point of a view.
///
/// Values are never mutated; `ko-lint-disable`/`ko-lint-enable` directives
/// produce a new state that applies from the directive to the end of the
/// document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Suppression {
    disable_all: bool,
    disabled: BTreeSet<String>,
    enabled: BTreeSet<String>,
}

impl Suppression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disables `keys`, or every diagnostic when `keys` is empty.
    pub fn disable(&self, keys: &[String]) -> Self {
        let mut next = self.clone();
        if keys.is_empty() {
            next.disable_all = true;
            next.enabled.clear();
        } else if next.disable_all {
            for key in keys {
                next.enabled.remove(key);
            }
        } else {
            next.disabled.extend(keys.iter().cloned());
        }
        next
    }

    /// Enables `keys`, or every diagnostic when `keys` is empty.
    pub fn enable(&self, keys: &[String]) -> Self {
        let mut next = self.clone();
        if keys.is_empty() {
            next.disable_all = false;
            next.disabled.clear();
        } else if next.disable_all {
            next.enabled.extend(keys.iter().cloned());
        } else {
            for key in keys {
                next.disabled.remove(key);
            }
        }
        next
    }

    pub fn allows(&self, diagnostic: &Diagnostic) -> bool {
        if self.disable_all {
            self.enabled.iter().any(|key| diagnostic.matches_key(key))
        } else {
            !self.disabled.iter().any(|key| diagnostic.matches_key(key))
        }
    }
}

/// Suppression states of one document, ordered by the byte offset of the
/// directive that introduced them.
#[derive(Debug, Clone)]
pub struct SuppressionTimeline {
    marks: Vec<(u32, Arc<Suppression>)>,
}

impl Default for SuppressionTimeline {
    fn default() -> Self {
        Self {
            marks: vec![(0, Arc::new(Suppression::new()))],
        }
    }
}

impl SuppressionTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the state in force from `offset` onward. Offsets must arrive in
    /// document order.
    pub fn push(&mut self, offset: u32, state: Arc<Suppression>) {
        self.marks.push((offset, state));
    }

    pub fn at(&self, offset: u32) -> &Arc<Suppression> {
        let index = self.marks.partition_point(|(mark, _)| *mark <= offset);
        &self.marks[index.saturating_sub(1)].1
    }

    pub fn last(&self) -> &Arc<Suppression> {
        // `marks` always holds the initial state.
        &self.marks[self.marks.len() - 1].1
    }

    pub fn allows(&self, diagnostic: &Diagnostic) -> bool {
        match &diagnostic.location {
            Some(location) => self.at(location.start()).allows(diagnostic),
            None => self.last().allows(diagnostic),
        }
    }
}
