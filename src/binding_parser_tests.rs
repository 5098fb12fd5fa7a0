#[cfg(test)]
mod tests {
    use crate::binding_parser::{parse_binding_expression, ForeachAlias};
    use crate::diagnostic::DiagnosticKind;
    use crate::lexer::{tokenize, BindingData, LexerOptions};
    use crate::location::Location;

    fn payload(markup: &str) -> BindingData {
        let tokens = tokenize("view.html", markup, &LexerOptions::default())
            .unwrap()
            .tokens;
        tokens[0].as_element().unwrap().bindings[0].clone()
    }

    #[test]
    fn test_one_binding_per_property() {
        let data = payload(r#"<div data-bind="text: name, visible: { a: 1 }"></div>"#);
        let bindings = parse_binding_expression("view.html", &data).unwrap();
        assert_eq!(bindings.len(), 2);

        assert_eq!(bindings[0].handler.value, "text");
        assert_eq!(bindings[0].handler.location.range, (16, 20));
        assert_eq!(bindings[0].expression.text, "name");
        assert_eq!(bindings[0].expression.location.range, (22, 26));

        // Nested literals stay in one expression.
        assert_eq!(bindings[1].handler.value, "visible");
        assert_eq!(bindings[1].handler.location.range, (28, 35));
        assert_eq!(bindings[1].expression.text, "{ a: 1 }");
        assert_eq!(bindings[1].expression.location.range, (37, 45));
        assert_eq!(bindings[1].expression.location.first_column, 37);
    }

    #[test]
    fn test_sub_locations_count_lines_within_payload() {
        let data = BindingData {
            text: "text: a,\n  value: b".to_string(),
            location: Location {
                first_line: 3,
                first_column: 10,
                last_line: 4,
                last_column: 10,
                range: (100, 119),
            },
        };
        let bindings = parse_binding_expression("view.html", &data).unwrap();
        assert_eq!(bindings[0].handler.location.first_line, 3);
        assert_eq!(bindings[0].handler.location.first_column, 10);
        assert_eq!(bindings[1].handler.location.first_line, 4);
        assert_eq!(bindings[1].handler.location.first_column, 2);
        assert_eq!(bindings[1].handler.location.range, (111, 116));
        assert_eq!(bindings[1].expression.location.first_column, 9);
    }

    #[test]
    fn test_quoted_handler_name() {
        let data = payload(r#"<div data-bind="'text': name"></div>"#);
        let bindings = parse_binding_expression("view.html", &data).unwrap();
        assert_eq!(bindings[0].handler.value, "text");
        assert_eq!(bindings[0].handler.location.range, (17, 21));
    }

    #[test]
    fn test_shorthand_property() {
        let data = payload(r#"<div data-bind="visible"></div>"#);
        let bindings = parse_binding_expression("view.html", &data).unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].handler.value, "visible");
        assert_eq!(bindings[0].expression.text, "visible");
    }

    #[test]
    fn test_empty_payload_has_no_bindings() {
        let data = payload(r#"<div data-bind=""></div>"#);
        assert!(parse_binding_expression("view.html", &data).unwrap().is_empty());
    }

    #[test]
    fn test_syntax_error_yields_diagnostic() {
        let data = payload(r#"<div data-bind="text: name +"></div>"#);
        let error = parse_binding_expression("view.html", &data).unwrap_err();
        assert!(error.is(DiagnosticKind::JavascriptSyntaxError));
        assert_eq!(error.location, Some(data.location));
        assert!(error.message.starts_with("Syntax error: "));
    }

    #[test]
    fn test_spread_is_rejected() {
        let data = payload(r#"<div data-bind="...all"></div>"#);
        let error = parse_binding_expression("view.html", &data).unwrap_err();
        assert_eq!(error.code, "KO0004");
    }

    #[test]
    fn test_foreach_alias() {
        let literal = payload(r#"<div data-bind="foreach: { data: items, as: 'item' }"></div>"#);
        let bindings = parse_binding_expression("view.html", &literal).unwrap();
        assert_eq!(
            bindings[0].alias,
            Some(ForeachAlias::Literal("item".to_string()))
        );

        let computed = payload(r#"<div data-bind="foreach: { data: items, as: name() }"></div>"#);
        let bindings = parse_binding_expression("view.html", &computed).unwrap();
        assert_eq!(bindings[0].alias, Some(ForeachAlias::Undeterminable));

        let plain = payload(r#"<div data-bind="foreach: items, with: x"></div>"#);
        let bindings = parse_binding_expression("view.html", &plain).unwrap();
        assert_eq!(bindings[0].alias, None);
        assert_eq!(bindings[1].alias, None);
    }
}
