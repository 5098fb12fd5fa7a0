//! Binding-Expression Parser
//!
//! A binding attribute such as `data-bind="text: name, visible: shown"` is the
//! inside of an object literal. The payload is wrapped as `({` + text + `})`,
//! handed to oxc, and every top-level property becomes one binding. Values are
//! never split further; nested literals stay part of their binding's text.

use oxc_allocator::Allocator;
use oxc_ast::ast::{Expression, ObjectPropertyKind, PropertyKey};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};
use serde::Serialize;

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::lexer::{BindingData, Identifier};
use crate::location::Location;

/// Characters prepended to the payload before parsing (`({`).
const WRAPPER_OFFSET: u32 = 2;

pub const FOREACH_HANDLER: &str = "foreach";

/// The loop-variable alias of a `foreach: { data: …, as: … }` binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ForeachAlias {
    Literal(String),
    /// `as` is present but is not a string literal.
    Undeterminable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BindingExpression {
    pub text: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedBinding {
    pub handler: Identifier,
    pub expression: BindingExpression,
    pub alias: Option<ForeachAlias>,
}

/// Parses one binding payload.
///
/// On a syntax error the whole payload yields no bindings and a
/// `javascript-syntax-error` diagnostic located on the payload.
pub fn parse_binding_expression(
    file_path: &str,
    data: &BindingData,
) -> Result<Vec<ParsedBinding>, Diagnostic> {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_typescript(true).with_module(true);
    let wrapped = format!("({{{}}})", data.text);

    let syntax_error = |message: &str| {
        Diagnostic::new(
            DiagnosticKind::JavascriptSyntaxError,
            file_path,
            Some(data.location),
            &[message],
        )
    };

    let expr = match Parser::new(&allocator, &wrapped, source_type).parse_expression() {
        Ok(expr) => expr,
        Err(errors) => {
            let message = errors
                .first()
                .map(|error| error.to_string())
                .unwrap_or_else(|| "invalid binding".to_string());
            return Err(syntax_error(&message));
        }
    };

    let mut expr = &expr;
    while let Expression::ParenthesizedExpression(paren) = expr {
        expr = &paren.expression;
    }
    let Expression::ObjectExpression(object) = expr else {
        return Err(syntax_error("binding must be a list of 'handler: value' pairs"));
    };

    let mut bindings = Vec::with_capacity(object.properties.len());
    for property in &object.properties {
        let ObjectPropertyKind::ObjectProperty(property) = property else {
            return Err(syntax_error("spread is not allowed in a binding"));
        };
        if property.computed {
            return Err(syntax_error("computed binding names are not allowed"));
        }
        let (name, key_span) = match &property.key {
            PropertyKey::StaticIdentifier(id) => (id.name.to_string(), id.span),
            // Quotes excluded, so the location covers exactly the name.
            PropertyKey::StringLiteral(literal) => (
                literal.value.to_string(),
                Span::new(literal.span.start + 1, literal.span.end.saturating_sub(1)),
            ),
            _ => return Err(syntax_error("binding names must be identifiers or strings")),
        };

        let handler = Identifier {
            value: name,
            location: sub_location(data, key_span),
        };
        let value_span = property.value.span();
        let value_location = sub_location(data, value_span);
        let expression = BindingExpression {
            text: slice(data, value_span).to_string(),
            location: value_location,
        };
        let alias = if handler.value == FOREACH_HANDLER {
            foreach_alias(&property.value)
        } else {
            None
        };
        bindings.push(ParsedBinding {
            handler,
            expression,
            alias,
        });
    }
    Ok(bindings)
}

fn foreach_alias(value: &Expression) -> Option<ForeachAlias> {
    let Expression::ObjectExpression(object) = value else {
        return None;
    };
    object.properties.iter().find_map(|property| {
        let ObjectPropertyKind::ObjectProperty(property) = property else {
            return None;
        };
        let is_as = match &property.key {
            PropertyKey::StaticIdentifier(id) => id.name.as_str() == "as",
            PropertyKey::StringLiteral(literal) => literal.value.as_str() == "as",
            _ => false,
        };
        if !is_as {
            return None;
        }
        Some(match &property.value {
            Expression::StringLiteral(literal) => ForeachAlias::Literal(literal.value.to_string()),
            _ => ForeachAlias::Undeterminable,
        })
    })
}

fn unwrap_span(data: &BindingData, span: Span) -> (usize, usize) {
    let len = data.text.len();
    let start = (span.start.saturating_sub(WRAPPER_OFFSET) as usize).min(len);
    let end = (span.end.saturating_sub(WRAPPER_OFFSET) as usize).clamp(start, len);
    (start, end)
}

fn sub_location(data: &BindingData, span: Span) -> Location {
    let (start, end) = unwrap_span(data, span);
    data.location.relative(&data.text, start, end)
}

fn slice(data: &BindingData, span: Span) -> &str {
    let (start, end) = unwrap_span(data, span);
    &data.text[start..end]
}
