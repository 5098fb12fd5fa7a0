#[cfg(test)]
mod tests {
    use crate::diagnostic::Severity;
    use crate::oracle::OracleError;
    use crate::program::{lint_view, lint_views, parse_view, LintError, LintOptions, View};
    use crate::test_oracle::{CannedOracle, CONTEXT_MEMBERS, ROOT_TYPE};

    const ITEM_TYPE: &str = "ChildBindingContext<Item>";

    fn foreach_view(file_path: &str) -> View {
        View::new(
            file_path,
            concat!(
                "<!-- ko-import vm from './vm' --><!-- ko-viewmodel typeof vm -->\n",
                "<ul data-bind=\"foreach: items\">\n",
                "  <li data-bind=\"text: name\"></li>\n",
                "</ul>\n",
            ),
        )
    }

    fn oracle() -> CannedOracle {
        CannedOracle::new()
            .context(0, ROOT_TYPE, &["items"])
            .context(1, ITEM_TYPE, &["name"])
            .known("binding_0", ITEM_TYPE, &CONTEXT_MEMBERS)
            .known("binding_1", ITEM_TYPE, &CONTEXT_MEMBERS)
    }

    fn codes(diagnostics: &[crate::Diagnostic]) -> Vec<&str> {
        diagnostics.iter().map(|d| d.code.as_str()).collect()
    }

    #[test]
    fn test_options_from_json() {
        let options = LintOptions::from_json(
            r#"{"bindingAttributes": ["params"], "contextHandlers": ["component"], "severity": {"KO0016": "warning"}}"#,
        )
        .unwrap();
        assert_eq!(options.type_library, "kolint/context");
        assert!(!options.force_xml);
        assert_eq!(options.severity.get("KO0016"), Some(&Severity::Warning));
        assert_eq!(
            options.lexer_options().binding_attributes,
            vec!["data-bind".to_string(), "params".to_string()]
        );
        let registry = options.registry();
        assert!(registry.is_declared("component"));
        assert!(registry.is_declared("foreach"));

        let defaults = LintOptions::from_json("{}").unwrap();
        assert!(defaults.context_handlers.is_empty());
        assert_eq!(defaults.lexer_options().binding_attributes, vec!["data-bind".to_string()]);

        let invalid = LintOptions::from_json(r#"{"forceXml": "yes"}"#).unwrap_err();
        assert!(matches!(invalid, LintError::Options(_)));
    }

    #[test]
    fn test_parse_view_reports_lexer_errors() {
        let parsed = parse_view("broken.html", "<div><!-- oops", &LintOptions::default());
        assert!(parsed.document.is_none());
        assert_eq!(codes(&parsed.diagnostics), vec!["KO0014"]);
        assert_eq!(parsed.diagnostics[0].file_path, "broken.html");
    }

    #[test]
    fn test_lint_view_resolves_views_with_a_viewmodel() {
        let oracle = oracle();
        let result = lint_view(&foreach_view("list.html"), &oracle, &LintOptions::default()).unwrap();
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        let resolved = result.resolved.unwrap();
        assert_eq!(resolved.contexts.len(), 2);
        assert_eq!(resolved.probe.probe_file, "list.html.ts");
    }

    #[test]
    fn test_views_without_viewmodel_are_not_resolved() {
        let oracle = CannedOracle::unreachable();
        let view = View::new("plain.html", r#"<div data-bind="text: a"></div>"#);
        let result = lint_view(&view, &oracle, &LintOptions::default()).unwrap();
        assert!(result.resolved.is_none());
        assert_eq!(codes(&result.diagnostics), vec!["KO0002"]);
        assert_eq!(oracle.compile_count(), 0);
    }

    #[test]
    fn test_batch_keeps_input_order() {
        let oracle = oracle();
        let views = vec![
            foreach_view("a.html"),
            View::new("b.html", r#"<div data-bind="text: a"></div>"#),
            View::new("c.html", "<div><p></p>"),
            View::new("d.html", "<div><!-- oops"),
            foreach_view("e.html"),
        ];
        let result = lint_views(&views, &oracle, &LintOptions::default()).unwrap();

        assert_eq!(codes(&result.diagnostics), vec!["KO0002", "KO0010", "KO0014"]);
        let files: Vec<&str> = result
            .diagnostics
            .iter()
            .map(|d| d.file_path.as_str())
            .collect();
        assert_eq!(files, vec!["b.html", "c.html", "d.html"]);

        let outputs: Vec<&str> = result
            .outputs
            .iter()
            .map(|output| output.file_path.as_str())
            .collect();
        assert_eq!(outputs, vec!["a.html", "e.html"]);
        // Identical views produce identical probe code.
        assert_eq!(result.outputs[0].revisions, result.outputs[1].revisions);
    }

    #[test]
    fn test_batch_applies_severity_overrides() {
        let mut options = LintOptions::default();
        options
            .severity
            .insert("no-viewmodel-reference".to_string(), Severity::Warning);
        options.severity.insert("KO0010".to_string(), Severity::Off);
        let views = vec![
            View::new("b.html", r#"<div data-bind="text: a"></div>"#),
            View::new("c.html", "<div><p></p>"),
        ];
        let result = lint_views(&views, &oracle(), &options).unwrap();
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].code, "KO0002");
        assert_eq!(result.diagnostics[0].severity, Severity::Warning);
    }

    #[test]
    fn test_unreachable_oracle_fails_the_batch() {
        let oracle = CannedOracle::unreachable();
        let views = vec![
            View::new("b.html", r#"<div data-bind="text: a"></div>"#),
            foreach_view("a.html"),
        ];
        let error = lint_views(&views, &oracle, &LintOptions::default()).unwrap_err();
        assert!(matches!(error, LintError::Oracle(OracleError::Unreachable(_))));
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = lint_views(&[foreach_view("a.html")], &oracle(), &LintOptions::default()).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["outputs"][0]["probeFile"], "a.html.ts");
        assert_eq!(json["outputs"][0]["filePath"], "a.html");
        assert!(json["outputs"][0]["code"].as_str().unwrap().contains("const binding_1"));
        assert_eq!(json["diagnostics"], serde_json::json!([]));
    }
}
