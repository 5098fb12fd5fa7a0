#[cfg(test)]
mod tests {
    use crate::diagnostic::DiagnosticKind;
    use crate::lexer::{
        normalize_void_elements, tokenize, Dialect, Directive, ElementToken, LexerOptions,
        NodeType, Token,
    };

    fn lex(text: &str) -> Vec<Token> {
        tokenize("view.html", text, &LexerOptions::default())
            .unwrap()
            .tokens
    }

    fn element(token: &Token) -> &ElementToken {
        token.as_element().expect("element token")
    }

    fn directive(token: &Token) -> &Directive {
        match token {
            Token::Directive(directive) => directive,
            Token::Element(_) => panic!("expected a directive, got {:?}", token),
        }
    }

    #[test]
    fn test_simple_tag_positions() {
        let tokens = lex("<div></div>");
        assert_eq!(tokens.len(), 2);

        let start = element(&tokens[0]);
        assert_eq!(start.node_type, NodeType::Start);
        assert_eq!(start.tag, "div");
        assert_eq!(start.location.range, (0, 5));
        assert_eq!(start.location.first_line, 1);
        assert_eq!(start.location.first_column, 0);
        assert_eq!(start.location.last_column, 5);
        assert!(start.bindings.is_empty());

        let end = element(&tokens[1]);
        assert_eq!(end.node_type, NodeType::End);
        assert_eq!(end.location.range, (5, 11));
        assert_eq!(end.location.first_column, 5);
        assert_eq!(end.location.last_column, 11);
        assert_eq!(end.location.last_line, 1);
    }

    #[test]
    fn test_binding_payload_location_covers_value() {
        let tokens = lex(r#"<div data-bind="key: value"></div>"#);
        let start = element(&tokens[0]);
        assert_eq!(start.bindings.len(), 1);
        assert_eq!(start.bindings[0].text, "key: value");
        assert_eq!(start.bindings[0].location.range, (16, 26));
        assert_eq!(start.bindings[0].location.first_column, 16);
    }

    #[test]
    fn test_positions_on_later_lines() {
        let tokens = lex("<div>\n  <span data-bind='text: x'></span>\n</div>");
        let span = element(&tokens[1]);
        assert_eq!(span.location.first_line, 2);
        assert_eq!(span.location.first_column, 2);
        let binding = &span.bindings[0];
        assert_eq!(binding.location.first_line, 2);
        assert_eq!(binding.location.first_column, 19);
        let close = element(&tokens[3]);
        assert_eq!(close.location.first_line, 3);
        assert_eq!(close.location.first_column, 0);
    }

    #[test]
    fn test_void_elements_become_empty() {
        let tokens = lex(r#"<img src="a.png"><br></br><p></p>"#);
        let kinds: Vec<(&str, NodeType)> = tokens
            .iter()
            .map(|token| {
                let element = element(token);
                (element.tag.as_str(), element.node_type)
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("img", NodeType::Empty),
                ("br", NodeType::Empty),
                ("p", NodeType::Start),
                ("p", NodeType::End),
            ]
        );
    }

    #[test]
    fn test_void_normalization_is_idempotent() {
        let mut once = lex("<input><hr></hr><div><img></img></div><link/>");
        let before = once.clone();
        normalize_void_elements(&mut once);
        assert_eq!(once, before);

        let mut twice = once.clone();
        normalize_void_elements(&mut twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_xml_keeps_void_names() {
        let tokenized = tokenize(
            "view.xml",
            r#"<?xml version="1.0"?><img></img>"#,
            &LexerOptions::default(),
        )
        .unwrap();
        assert_eq!(tokenized.dialect, Dialect::Xml);
        assert_eq!(tokenized.tokens.len(), 2);
        assert_eq!(element(&tokenized.tokens[0]).node_type, NodeType::Start);
        assert_eq!(element(&tokenized.tokens[1]).node_type, NodeType::End);
    }

    #[test]
    fn test_force_xml_keeps_tag_case() {
        let options = LexerOptions {
            force_xml: true,
            ..LexerOptions::default()
        };
        let tokenized = tokenize("view.xml", "<Item></Item>", &options).unwrap();
        assert_eq!(tokenized.dialect, Dialect::Xml);
        assert_eq!(element(&tokenized.tokens[0]).tag, "Item");
    }

    #[test]
    fn test_html_tags_are_lowercased() {
        let tokens = lex("<DIV></div>");
        assert_eq!(element(&tokens[0]).tag, "div");
        assert_eq!(element(&tokens[1]).tag, "div");
    }

    #[test]
    fn test_bom_is_stripped() {
        let tokens = lex("\u{FEFF}<div></div>");
        assert_eq!(element(&tokens[0]).location.range, (0, 5));
    }

    #[test]
    fn test_script_body_is_raw_text() {
        let tokens = lex("<script>if (a < b && c) {}</script><div></div>");
        let tags: Vec<&str> = tokens.iter().map(|t| element(t).tag.as_str()).collect();
        assert_eq!(tags, vec!["script", "script", "div", "div"]);
    }

    #[test]
    fn test_doctype_and_plain_comments_are_skipped() {
        let tokens = lex("<!DOCTYPE html><!-- plain comment --><p>text</p>");
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn test_configured_binding_attribute() {
        let options = LexerOptions {
            binding_attributes: vec!["data-bind".to_string(), "params".to_string()],
            force_xml: false,
        };
        let tokens = tokenize(
            "view.html",
            r#"<my-widget params="value: x" data-bind="visible: y"></my-widget>"#,
            &options,
        )
        .unwrap()
        .tokens;
        let texts: Vec<&str> = element(&tokens[0])
            .bindings
            .iter()
            .map(|binding| binding.text.as_str())
            .collect();
        assert_eq!(texts, vec!["value: x", "visible: y"]);
    }

    #[test]
    fn test_virtual_elements() {
        let tokens = lex("<!-- ko if: shown --><span></span><!-- /ko -->");
        assert_eq!(tokens.len(), 4);

        let open = element(&tokens[0]);
        assert!(open.is_virtual);
        assert_eq!(open.tag, "ko");
        assert_eq!(open.node_type, NodeType::Start);
        assert_eq!(open.bindings[0].text, "if: shown");
        assert_eq!(open.bindings[0].location.range, (8, 17));

        let close = element(&tokens[3]);
        assert!(close.is_virtual);
        assert_eq!(close.node_type, NodeType::End);
        assert_eq!(close.location.range, (34, 46));
    }

    #[test]
    fn test_named_import_directive() {
        let tokens = lex("<!-- ko-import { name as alias } from 'modulePath' -->");
        let Directive::Import(import) = directive(&tokens[0]) else {
            panic!("expected an import");
        };
        assert_eq!(import.location.range, (5, 50));
        assert_eq!(import.symbols.len(), 1);
        assert_eq!(import.symbols[0].name.value, "name");
        assert_eq!(import.symbols[0].name.location.range, (17, 21));
        assert_eq!(import.symbols[0].alias.value, "alias");
        assert_eq!(import.symbols[0].alias.location.range, (25, 30));
        assert_eq!(import.module_path.value, "modulePath");
        assert_eq!(import.module_path.location.range, (39, 49));
        assert!(!import.is_namespace());
    }

    #[test]
    fn test_default_namespace_and_mixed_imports() {
        let tokens = lex(concat!(
            "<!-- ko-import vm from './viewmodel' -->",
            "<!-- ko-import * as helpers from \"./helpers\" -->",
            "<!-- ko-import base, { a, b as c, } from 'mod' -->",
        ));

        let Directive::Import(default) = directive(&tokens[0]) else {
            panic!("expected an import");
        };
        assert_eq!(default.symbols[0].name.value, "default");
        assert_eq!(default.symbols[0].alias.value, "vm");
        assert_eq!(default.module_path.value, "./viewmodel");

        let Directive::Import(namespace) = directive(&tokens[1]) else {
            panic!("expected an import");
        };
        assert!(namespace.is_namespace());
        assert_eq!(namespace.symbols[0].alias.value, "helpers");

        let Directive::Import(mixed) = directive(&tokens[2]) else {
            panic!("expected an import");
        };
        let aliases: Vec<&str> = mixed.aliases().collect();
        assert_eq!(aliases, vec!["base", "a", "c"]);
        assert_eq!(mixed.symbols[2].name.value, "b");
    }

    #[test]
    fn test_viewmodel_and_context_directives() {
        let tokens = lex(concat!(
            "<!-- ko-viewmodel typeof vm -->",
            "<!-- ko-context Foo.Bar<Baz> -->",
        ));

        let Directive::ViewModel { type_ref, location } = directive(&tokens[0]) else {
            panic!("expected a viewmodel reference");
        };
        assert!(!type_ref.is_type);
        assert_eq!(type_ref.name.value, "vm");
        assert_eq!(type_ref.name.location.range, (25, 27));
        assert_eq!(type_ref.type_text(), "typeof vm");
        assert_eq!(location.range, (5, 27));

        let Directive::Context { type_ref, .. } = directive(&tokens[1]) else {
            panic!("expected a context directive");
        };
        assert!(type_ref.is_type);
        assert_eq!(type_ref.name.value, "Foo.Bar<Baz>");
        assert_eq!(type_ref.root_name(), "Foo");
    }

    #[test]
    fn test_lint_directives() {
        let tokens = lex(concat!(
            "<!-- ko-lint-disable KO0004, binding-unknown -->",
            "<!-- ko-lint-enable -->",
        ));
        let Directive::Diagnostics { keys, enable, .. } = directive(&tokens[0]) else {
            panic!("expected a lint directive");
        };
        assert_eq!(keys, &vec!["KO0004".to_string(), "binding-unknown".to_string()]);
        assert!(!enable);

        let Directive::Diagnostics { keys, enable, .. } = directive(&tokens[1]) else {
            panic!("expected a lint directive");
        };
        assert!(keys.is_empty());
        assert!(enable);
    }

    #[test]
    fn test_unterminated_comment_is_parser_error() {
        let error = tokenize("view.html", "<div><!-- oops", &LexerOptions::default()).unwrap_err();
        assert!(error.is(DiagnosticKind::ParserError));
        assert!(error.message.contains("\"-->\""));
        assert!(error.message.contains("end of input"));
    }

    #[test]
    fn test_unterminated_attribute_value_is_parser_error() {
        let error = tokenize(
            "view.html",
            r#"<div data-bind="text: x></div>"#,
            &LexerOptions::default(),
        )
        .unwrap_err();
        assert!(error.is(DiagnosticKind::ParserError));
        assert!(error.message.contains("unterminated attribute value"));
    }

    #[test]
    fn test_end_tag_without_name_is_parser_error() {
        let error = tokenize("view.html", "<div></ >", &LexerOptions::default()).unwrap_err();
        assert_eq!(error.code, "KO0014");
        assert_eq!(error.location.unwrap().range, (7, 8));
    }

    #[test]
    fn test_malformed_directive_is_parser_error() {
        let error = tokenize(
            "view.html",
            "<!-- ko-import { a from 'x' -->",
            &LexerOptions::default(),
        )
        .unwrap_err();
        assert_eq!(error.message, "Expected \"}\", got \"f\" (directive).");

        let error = tokenize(
            "view.html",
            "<!-- ko-viewmodel typeof -->",
            &LexerOptions::default(),
        )
        .unwrap_err();
        assert!(error.message.contains("identifier"));
    }
}
