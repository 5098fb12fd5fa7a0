//! # Kolint Native
//!
//! Static checking of Knockout view bindings against the types of their
//! viewmodels, without running the view.
//!
//! ## Pipeline Invariants
//!
//! 1. **Positions**: every location is a half-open byte range plus 1-based
//!    lines and 0-based character columns, always in the original markup.
//!
//! 2. **Lexing**: `lexer::tokenize` never recovers. A malformed construct
//!    rejects the whole view with one `parser-error` (KO0014).
//!
//! 3. **Building**: `document_builder::build` recovers from bad binding text
//!    (KO0004, zero bindings for that attribute) but drops the view on any tag
//!    imbalance (KO0010).
//!
//! 4. **Resolution**: `resolve::resolve` only grows the context forest. Each
//!    iteration resolves every frontier node whose enclosing context is known,
//!    so the frontier shrinks strictly and the loop ends after at most one
//!    iteration per level of binding nesting.
//!
//! 5. **Probe code**: append-only and reproducible. `binding_<n>` and
//!    `context_<n>` come from per-view counters.
//!
//! 6. **Suppression**: `ko-lint-disable`/`ko-lint-enable` apply from the
//!    directive to the end of the view, not to the enclosing element.

pub mod binding_parser;
pub mod context;
pub mod diagnostic;
pub mod document_builder;
pub mod lexer;
pub mod location;
pub mod oracle;
pub mod probe;
pub mod program;
pub mod resolve;
pub mod source_map;
pub mod syntax_tree;
pub mod tracing_config;
pub mod visitor;

#[cfg(test)]
mod test_oracle;

#[cfg(test)]
mod binding_parser_tests;
#[cfg(test)]
mod diagnostic_tests;
#[cfg(test)]
mod lexer_tests;
#[cfg(test)]
mod program_tests;

pub use diagnostic::{Diagnostic, DiagnosticKind, Severity};
pub use location::Location;
pub use oracle::{OracleDiagnostic, OracleError, SourceUnit, TypeOracle, TypeShape};
pub use program::{lint_view, lint_views, parse_view, LintError, LintOptions, LintResult, View};
pub use resolve::{resolve, Assignment, ResolvedView};
pub use tracing_config::init_tracing;
